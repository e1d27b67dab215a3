mod bound_params;
mod notice;
mod row;
mod savepoint;
mod sql_value;

pub use bound_params::{BoundParam, BoundParams, ParamFormat};
pub use notice::{default_notice_processor, log_notice, Notice, NoticeProcessor};
pub use row::{ExecStatus, QueryResult, RawQueryResult, Row};
pub use savepoint::{SavepointId, TransactionLevel};
pub use sql_value::SqlValue;
