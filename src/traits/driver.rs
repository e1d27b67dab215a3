use async_trait::async_trait;

use crate::error::Result;
use crate::types::{BoundParams, NoticeProcessor, RawQueryResult};

/// Health of a driver connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Ok,
    Bad,
}

/// Trait for database driver implementations.
///
/// A driver owns one live server connection. Command outcomes, including SQL
/// errors, are reported through the status of the returned `RawQueryResult`;
/// `Err` is reserved for failures of the connection itself.
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    fn status(&self) -> ConnectionStatus;

    /// Last diagnostic reported for the connection, if any.
    fn error_message(&self) -> Option<String>;

    /// Execute SQL without parameters.
    async fn exec(&self, sql: &str) -> Result<RawQueryResult>;

    /// Execute SQL with positional parameters ($1, $2, etc.)
    async fn exec_params(&self, sql: &str, params: &BoundParams) -> Result<RawQueryResult>;

    /// Ask the server to parse the statement without running it.
    async fn prepare(&self, sql: &str) -> Result<RawQueryResult>;

    /// Escape text for use inside a single-quoted literal, following the
    /// connection's quoting rules.
    fn escape(&self, text: &str) -> Result<String>;

    fn set_notice_processor(&self, processor: NoticeProcessor);

    async fn set_client_encoding(&self, encoding: &str) -> Result<RawQueryResult>;

    /// Release the connection. Called exactly once per driver.
    fn finish(self: Box<Self>);
}

/// Opens driver connections from a conninfo string.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, conninfo: &str) -> Result<Box<dyn DatabaseDriver>>;
}
