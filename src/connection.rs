use tracing::{debug, error};

use crate::config::{os_login, ConnectConfig, ConnectOptions};
use crate::drivers::TokioPostgresConnector;
use crate::error::{PgTxError, Result};
use crate::executor::check_result;
use crate::sql;
use crate::traits::{ConnectionStatus, Connector, DatabaseDriver};
use crate::types::{default_notice_processor, NoticeProcessor};

const CLIENT_ENCODING: &str = "UTF8";

/// A single database connection with its transaction nesting state.
///
/// Operations that change transaction state take `&mut self`; share a connection
/// between tasks only behind a lock. The driver is released exactly once, either
/// by `close` or when the connection is dropped.
pub struct Connection {
    driver: Option<Box<dyn DatabaseDriver>>,
    pub(crate) nesting_depth: usize,
}

impl Connection {
    /// Connect to a PostgreSQL database.
    ///
    /// The user defaults to the current OS login when not given.
    ///
    /// # Example
    /// ```ignore
    /// let conn = Connection::connect(ConnectOptions::new("mydb").user("app")).await?;
    /// ```
    pub async fn connect(options: ConnectOptions) -> Result<Self> {
        Self::connect_with(options, &TokioPostgresConnector, os_login).await
    }

    /// Connect through a custom connector, with an explicit default-user provider.
    ///
    /// Options are validated before the connector is touched.
    pub async fn connect_with<C, F>(
        options: ConnectOptions,
        connector: &C,
        default_user: F,
    ) -> Result<Self>
    where
        C: Connector + ?Sized,
        F: FnOnce() -> Option<String>,
    {
        let config = options.resolve(default_user)?;
        Self::open(&config, connector).await
    }

    async fn open<C: Connector + ?Sized>(config: &ConnectConfig, connector: &C) -> Result<Self> {
        debug!(db = %config.db, host = %config.host, port = %config.port, user = %config.user, "connecting");

        let driver = connector.connect(&config.conninfo()).await.map_err(|e| {
            error!(error = %e, db = %config.db, "connection failed");
            e
        })?;

        if driver.status() == ConnectionStatus::Bad {
            let message = driver
                .error_message()
                .unwrap_or_else(|| "connection is in a bad state".to_string());
            driver.finish();
            error!(error = %message, db = %config.db, "connection failed");
            return Err(PgTxError::connection(message));
        }

        driver.set_notice_processor(default_notice_processor());
        let connection = Self::with_driver(driver);
        check_result(
            connection
                .driver()?
                .set_client_encoding(CLIENT_ENCODING)
                .await?,
        )?;

        debug!(db = %config.db, "connected");
        Ok(connection)
    }

    /// Wrap an already open driver.
    /// Useful for testing or using alternative database drivers.
    pub fn with_driver(driver: Box<dyn DatabaseDriver>) -> Self {
        Self {
            driver: Some(driver),
            nesting_depth: 0,
        }
    }

    /// The open driver, or a connection error when the handle was closed.
    pub(crate) fn driver(&self) -> Result<&dyn DatabaseDriver> {
        self.driver
            .as_deref()
            .ok_or_else(|| PgTxError::connection("postgres database is not open"))
    }

    /// Release the connection. Returns whether a connection was open.
    pub fn close(&mut self) -> bool {
        self.nesting_depth = 0;
        match self.driver.take() {
            Some(driver) => {
                driver.finish();
                debug!("connection closed");
                true
            }
            None => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.driver.is_none()
    }

    /// Number of open transaction levels (outer transaction plus savepoints).
    pub fn nesting_depth(&self) -> usize {
        self.nesting_depth
    }

    /// Replace the processor receiving server notices.
    pub fn set_notice_processor(&self, processor: NoticeProcessor) -> Result<()> {
        self.driver()?.set_notice_processor(processor);
        Ok(())
    }

    /// Escape the string form of `text` for interpolation inside a quoted SQL literal.
    ///
    /// Prefer bound parameters; this exists for statements that must be built literally.
    pub fn escape(&self, text: impl std::fmt::Display) -> Result<String> {
        let text = text.to_string();
        self.driver()?.escape(&text).map_err(|e| {
            error!(error = %e, "escape failed");
            e
        })
    }

    /// Quote a name for use as an SQL identifier.
    pub fn quote_identifier(&self, name: &str) -> Result<String> {
        self.driver()?;
        sql::quote_identifier(name)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.finish();
        }
    }
}
