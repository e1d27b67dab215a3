use tracing::{debug, error};

use crate::connection::Connection;
use crate::error::Result;
use crate::executor::check_result;
use crate::sql::normalize_placeholders;
use crate::types::{QueryResult, SqlValue};

/// A statement accepted by the server, bound to the connection that prepared it.
pub struct Statement<'c> {
    connection: &'c Connection,
    sql: String,
}

impl<'c> Statement<'c> {
    /// The normalized SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Execute the statement with positional parameters.
    pub async fn execute(&self, binds: &[SqlValue]) -> Result<QueryResult> {
        self.connection.execute_normalized(&self.sql, binds).await
    }
}

impl Connection {
    /// Prepare a statement. The server parses it once here so syntax errors surface
    /// before the first execution.
    pub async fn prepare(&self, sql: &str) -> Result<Statement<'_>> {
        let driver = self.driver()?;
        let sql = normalize_placeholders(sql).into_owned();
        debug!(sql = %sql, "prepare");

        driver.prepare(&sql).await.and_then(check_result).map_err(|e| {
            error!(error = %e, sql = %sql, "prepare failed");
            e
        })?;

        Ok(Statement {
            connection: self,
            sql,
        })
    }
}
