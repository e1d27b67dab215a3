use tracing::{debug, error};

use crate::connection::Connection;
use crate::error::{PgTxError, Result};
use crate::sql::normalize_placeholders;
use crate::types::{BoundParams, QueryResult, RawQueryResult, SqlValue};

/// Turns a failed driver result into a `Database` error.
///
/// The failed result is consumed, so it is released before the error reaches the caller.
pub fn check_result(raw: RawQueryResult) -> Result<RawQueryResult> {
    if !raw.status.is_error() {
        return Ok(raw);
    }
    let message = raw
        .error_message
        .unwrap_or_else(|| format!("command failed with status {:?}", raw.status));
    Err(PgTxError::database(message, raw.sql_state))
}

impl Connection {
    /// Execute a SQL statement with positional parameters.
    ///
    /// `?` placeholders are rewritten to `$n`. Without parameters the statement goes
    /// through the driver's plain exec path.
    ///
    /// # Example
    /// ```ignore
    /// let rows = conn.execute("select name from users where id = ?", &[42.into()]).await?;
    /// ```
    pub async fn execute(&self, sql: &str, binds: &[SqlValue]) -> Result<QueryResult> {
        let sql = normalize_placeholders(sql);
        self.execute_normalized(&sql, binds).await
    }

    pub(crate) async fn execute_normalized(
        &self,
        sql: &str,
        binds: &[SqlValue],
    ) -> Result<QueryResult> {
        let driver = self.driver()?;
        debug!(sql = %sql, binds = binds.len(), "execute");

        let raw = if binds.is_empty() {
            driver.exec(sql).await
        } else {
            let params = BoundParams::bind(binds);
            driver.exec_params(sql, &params).await
        };

        match raw.and_then(check_result) {
            Ok(raw) => Ok(QueryResult::from_raw(raw)),
            Err(e) => {
                error!(error = %e, sql = %sql, "query failed");
                Err(e)
            }
        }
    }

    /// Run a statement whose result carries no data, such as transaction control.
    pub(crate) async fn run_command(&self, sql: &str) -> Result<()> {
        let driver = self.driver()?;
        debug!(sql = %sql, "command");
        driver.exec(sql).await.and_then(check_result).map_err(|e| {
            error!(error = %e, sql = %sql, "command failed");
            e
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExecStatus;

    #[test]
    fn test_successful_results_pass_through() {
        let raw = RawQueryResult::command(2);
        assert_eq!(check_result(raw.clone()).unwrap(), raw);
    }

    #[test]
    fn test_failed_result_becomes_database_error() {
        let raw = RawQueryResult::failed(ExecStatus::FatalError, "relation \"nope\" does not exist")
            .with_sql_state("42P01");
        let err = check_result(raw).unwrap_err();

        assert_eq!(err.sql_state(), Some("42P01"));
        assert_eq!(
            err.to_string(),
            "Database error: relation \"nope\" does not exist"
        );
    }

    #[test]
    fn test_failed_result_without_message() {
        let mut raw = RawQueryResult::empty();
        raw.status = ExecStatus::BadResponse;
        let err = check_result(raw).unwrap_err();
        assert!(matches!(err, PgTxError::Database { .. }));
        assert!(err.to_string().contains("BadResponse"));
    }
}
