//! pgtx - PostgreSQL adapter with parameterized execution and nested transactions
//!
//! # Example
//! ```ignore
//! use pgtx::{ConnectOptions, Connection, PgTxError};
//!
//! let mut conn = Connection::connect(ConnectOptions::new("mydb").user("app")).await?;
//!
//! conn.transaction(None, |conn| Box::pin(async move {
//!     conn.execute("insert into users(name) values (?)", &["John".into()]).await?;
//!
//!     // Nested levels run inside a savepoint
//!     conn.transaction(None, |conn| Box::pin(async move {
//!         conn.execute("update users set active = ? where name = ?", &[true.into(), "John".into()]).await?;
//!         Ok::<_, PgTxError>(())
//!     }))
//!     .await
//! }))
//! .await?;
//!
//! let row = conn
//!     .execute("select id from users where name = $1", &["John".into()])
//!     .await?
//!     .single_row()?;
//! let id = row.get("id")?;
//! ```

pub mod config;
pub mod drivers;
pub mod error;
pub mod sql;
pub mod traits;
pub mod types;

mod connection;
mod executor;
mod statement;
mod transaction;

// Re-export main types for convenient access
pub use config::{ConnectConfig, ConnectOptions};
pub use connection::Connection;
pub use error::{PgTxError, Result};
pub use executor::check_result;
pub use statement::Statement;
pub use traits::{ConnectionStatus, Connector, DatabaseDriver};
pub use types::{
    BoundParam, BoundParams, ExecStatus, Notice, NoticeProcessor, ParamFormat, QueryResult,
    RawQueryResult, Row, SavepointId, SqlValue, TransactionLevel,
};
