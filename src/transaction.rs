//! Transaction and savepoint control on a `Connection`.
//!
//! The first level is a real `BEGIN`; every deeper level is a savepoint. The
//! connection's nesting depth only changes after the server accepted the statement,
//! and `commit`/`rollback` at depth 0 are no-ops returning `false`.

use futures::future::BoxFuture;
use tracing::{debug, error};

use crate::connection::Connection;
use crate::error::{PgTxError, Result};
use crate::types::{SavepointId, TransactionLevel};

impl Connection {
    /// Open a transaction level.
    ///
    /// At depth 0 this issues `BEGIN` and, unless a savepoint name was given, returns
    /// `TransactionLevel::Top`. Deeper levels (or a named savepoint at depth 0) issue
    /// `SAVEPOINT <id>`, generating the id when none was given.
    pub async fn begin(&mut self, savepoint: Option<&str>) -> Result<TransactionLevel> {
        self.driver()?;
        let requested = savepoint.map(SavepointId::new).transpose()?;

        if self.nesting_depth == 0 {
            self.run_command("BEGIN").await?;
            self.nesting_depth += 1;
            if requested.is_none() {
                return Ok(TransactionLevel::Top);
            }
        }

        let id = requested.unwrap_or_else(SavepointId::generate);
        self.run_command(&format!("SAVEPOINT {}", id)).await?;
        self.nesting_depth += 1;
        Ok(TransactionLevel::Savepoint(id))
    }

    /// Close the innermost level: `COMMIT`, or `RELEASE SAVEPOINT <id>` when named.
    ///
    /// Returns `false` without sending anything when no transaction is open.
    pub async fn commit(&mut self, savepoint: Option<&str>) -> Result<bool> {
        self.driver()?;
        if self.nesting_depth == 0 {
            return Ok(false);
        }
        let sql = match savepoint {
            None => "COMMIT".to_string(),
            Some(name) => format!("RELEASE SAVEPOINT {}", SavepointId::new(name)?),
        };
        self.run_command(&sql).await?;
        self.nesting_depth -= 1;
        Ok(true)
    }

    /// Abort the innermost level: `ROLLBACK`, or `ROLLBACK TO SAVEPOINT <id>` when named.
    ///
    /// Returns `false` without sending anything when no transaction is open.
    pub async fn rollback(&mut self, savepoint: Option<&str>) -> Result<bool> {
        self.driver()?;
        if self.nesting_depth == 0 {
            return Ok(false);
        }
        let sql = match savepoint {
            None => "ROLLBACK".to_string(),
            Some(name) => format!("ROLLBACK TO SAVEPOINT {}", SavepointId::new(name)?),
        };
        self.run_command(&sql).await?;
        self.nesting_depth -= 1;
        Ok(true)
    }

    /// Run `body` inside a transaction level and commit or roll back depending on
    /// its result.
    ///
    /// The outermost call opens a real transaction; nested calls use a savepoint,
    /// generated when `savepoint` is `None`. A savepoint named on the outermost call
    /// is opened inside the transaction and both levels are closed together.
    ///
    /// The body's error is returned unchanged after the rollback. A failing rollback
    /// is logged and does not replace it. A body that opens or closes levels without
    /// balancing them has everything this call opened rolled back, and fails with
    /// `PgTxError::Runtime` if it otherwise succeeded.
    ///
    /// # Example
    /// ```ignore
    /// conn.transaction(None, |conn| Box::pin(async move {
    ///     conn.execute("insert into users(name) values (?)", &["alice".into()]).await?;
    ///     Ok::<_, PgTxError>(())
    /// }))
    /// .await?;
    /// ```
    pub async fn transaction<T, E, F>(
        &mut self,
        savepoint: Option<&str>,
        body: F,
    ) -> std::result::Result<T, E>
    where
        F: Send + for<'c> FnOnce(&'c mut Connection) -> BoxFuture<'c, std::result::Result<T, E>>,
        T: Send,
        E: From<PgTxError> + Send,
    {
        self.driver()?;
        let depth_before = self.nesting_depth;
        let savepoint = match savepoint {
            Some(name) => Some(SavepointId::new(name)?),
            None if depth_before > 0 => Some(SavepointId::generate()),
            None => None,
        };
        let name = savepoint.as_ref().map(SavepointId::as_str);

        // An outermost call with a savepoint can fail after BEGIN went through
        if let Err(e) = self.begin(name).await {
            self.abort_levels(depth_before, name).await;
            return Err(e.into());
        }
        let depth_inside = self.nesting_depth;
        debug!(depth = depth_inside, savepoint = ?name, "transaction body");

        let outcome = body(&mut *self).await;

        if self.nesting_depth != depth_inside {
            let misuse = format!(
                "transaction body left nesting depth at {} (expected {})",
                self.nesting_depth, depth_inside
            );
            error!("{}", misuse);
            self.discard_levels(depth_before, name).await;
            return match outcome {
                Ok(_) => Err(PgTxError::runtime(misuse).into()),
                Err(e) => Err(e),
            };
        }

        match outcome {
            Ok(value) => match self.close_levels(depth_before, name).await {
                Ok(()) => Ok(value),
                Err(e) => {
                    self.abort_levels(depth_before, name).await;
                    Err(e.into())
                }
            },
            Err(e) => {
                self.abort_levels(depth_before, name).await;
                Err(e)
            }
        }
    }

    /// Commits every level opened since `depth_before`, innermost first.
    async fn close_levels(&mut self, depth_before: usize, savepoint: Option<&str>) -> Result<()> {
        while self.nesting_depth > depth_before {
            let target = self.level_savepoint(savepoint);
            self.commit(target).await?;
        }
        Ok(())
    }

    /// Best-effort rollback of every level opened since `depth_before`.
    async fn abort_levels(&mut self, depth_before: usize, savepoint: Option<&str>) {
        while self.nesting_depth > depth_before {
            let target = self.level_savepoint(savepoint);
            if let Err(e) = self.rollback(target).await {
                error!(error = %e, depth = self.nesting_depth, "rollback failed");
                return;
            }
        }
    }

    /// Rolls back everything above `depth_before` after the body lost track of its
    /// levels. One statement discards all savepoints opened after ours, so the depth is
    /// reset directly instead of counted down.
    async fn discard_levels(&mut self, depth_before: usize, savepoint: Option<&str>) {
        if self.nesting_depth <= depth_before {
            return;
        }
        let sql = match savepoint {
            Some(name) if depth_before > 0 => format!("ROLLBACK TO SAVEPOINT {}", name),
            _ => "ROLLBACK".to_string(),
        };
        match self.run_command(&sql).await {
            Ok(()) => self.nesting_depth = depth_before,
            Err(e) => error!(error = %e, depth = self.nesting_depth, "rollback failed"),
        }
    }

    /// The outermost level is the transaction itself; everything above it is the savepoint.
    fn level_savepoint<'s>(&self, savepoint: Option<&'s str>) -> Option<&'s str> {
        if self.nesting_depth == 1 {
            None
        } else {
            savepoint
        }
    }
}
