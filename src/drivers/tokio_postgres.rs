use std::pin::pin;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use bytes::BytesMut;
use futures::{stream, StreamExt};
use tokio::task::JoinHandle;
use tokio_postgres::types::{to_sql_checked, Format, FromSql, IsNull, ToSql, Type};
use tokio_postgres::{AsyncMessage, Client, NoTls, SimpleQueryMessage};
use tracing::{debug, error};

use crate::error::{PgTxError, Result};
use crate::sql::escape_string;
use crate::traits::{ConnectionStatus, Connector, DatabaseDriver};
use crate::types::{
    default_notice_processor, BoundParam, BoundParams, ExecStatus, Notice, NoticeProcessor,
    ParamFormat, RawQueryResult,
};

/// PostgreSQL driver implementation using tokio-postgres.
pub struct TokioPostgresDriver {
    client: Client,
    notice_processor: Arc<RwLock<NoticeProcessor>>,
    last_error: Arc<Mutex<Option<String>>>,
    connection_task: JoinHandle<()>,
}

impl TokioPostgresDriver {
    /// Connect to a PostgreSQL database.
    pub async fn connect(conninfo: &str) -> Result<Self> {
        let (client, mut connection) = tokio_postgres::connect(conninfo, NoTls)
            .await
            .map_err(|e| PgTxError::connection(e.to_string()))?;

        let notice_processor = Arc::new(RwLock::new(default_notice_processor()));
        let last_error = Arc::new(Mutex::new(None));

        // Drive the connection and hand notices to the current processor
        let processor = Arc::clone(&notice_processor);
        let task_error = Arc::clone(&last_error);
        let connection_task = tokio::spawn(async move {
            let mut messages = pin!(stream::poll_fn(move |cx| connection.poll_message(cx)));
            while let Some(message) = messages.next().await {
                match message {
                    Ok(AsyncMessage::Notice(notice)) => {
                        let notice = Notice::new(notice.severity(), notice.message());
                        let current = processor
                            .read()
                            .unwrap_or_else(PoisonError::into_inner)
                            .clone();
                        current(&notice);
                    }
                    Ok(AsyncMessage::Notification(notification)) => {
                        debug!(channel = %notification.channel(), "notification ignored");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "PostgreSQL connection error");
                        *task_error.lock().unwrap_or_else(PoisonError::into_inner) =
                            Some(e.to_string());
                        break;
                    }
                }
            }
        });

        Ok(Self {
            client,
            notice_processor,
            last_error,
            connection_task,
        })
    }
}

#[async_trait]
impl DatabaseDriver for TokioPostgresDriver {
    fn status(&self) -> ConnectionStatus {
        if self.client.is_closed() {
            ConnectionStatus::Bad
        } else {
            ConnectionStatus::Ok
        }
    }

    fn error_message(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn exec(&self, sql: &str) -> Result<RawQueryResult> {
        match self.client.simple_query(sql).await {
            Ok(messages) => Ok(simple_messages_to_raw(messages)),
            Err(e) => failed_result(e),
        }
    }

    async fn exec_params(&self, sql: &str, params: &BoundParams) -> Result<RawQueryResult> {
        let statement = match self.client.prepare(sql).await {
            Ok(statement) => statement,
            Err(e) => return failed_result(e),
        };

        let wire_params: Vec<WireParam<'_>> = params.iter().map(WireParam).collect();
        let param_refs: Vec<&(dyn ToSql + Sync)> = wire_params
            .iter()
            .map(|p| p as &(dyn ToSql + Sync))
            .collect();

        // Commands without a row description report an affected-row count instead
        if statement.columns().is_empty() {
            return match self.client.execute(&statement, &param_refs).await {
                Ok(count) => Ok(RawQueryResult::command(count)),
                Err(e) => failed_result(e),
            };
        }

        let rows = match self.client.query(&statement, &param_refs).await {
            Ok(rows) => rows,
            Err(e) => return failed_result(e),
        };

        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        // Convert rows to nullable text values
        let result_rows = rows
            .iter()
            .map(|row| (0..row.len()).map(|i| row_value_to_text(row, i)).collect())
            .collect();

        Ok(RawQueryResult::new(columns, result_rows))
    }

    async fn prepare(&self, sql: &str) -> Result<RawQueryResult> {
        match self.client.prepare(sql).await {
            Ok(_) => Ok(RawQueryResult::empty()),
            Err(e) => failed_result(e),
        }
    }

    fn escape(&self, text: &str) -> Result<String> {
        // standard_conforming_strings is on for every supported server version
        escape_string(text, true)
    }

    fn set_notice_processor(&self, processor: NoticeProcessor) {
        *self
            .notice_processor
            .write()
            .unwrap_or_else(PoisonError::into_inner) = processor;
    }

    async fn set_client_encoding(&self, encoding: &str) -> Result<RawQueryResult> {
        let sql = format!("SET client_encoding TO '{}'", escape_string(encoding, true)?);
        match self.client.batch_execute(&sql).await {
            Ok(()) => Ok(RawQueryResult::empty()),
            Err(e) => failed_result(e),
        }
    }

    fn finish(self: Box<Self>) {
        let Self {
            client,
            connection_task,
            ..
        } = *self;
        // Dropping the client makes the connection send Terminate and exit
        drop(client);
        drop(connection_task);
        debug!("PostgreSQL connection released");
    }
}

/// Opens `TokioPostgresDriver` connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPostgresConnector;

#[async_trait]
impl Connector for TokioPostgresConnector {
    async fn connect(&self, conninfo: &str) -> Result<Box<dyn DatabaseDriver>> {
        let driver = TokioPostgresDriver::connect(conninfo).await?;
        Ok(Box::new(driver))
    }
}

/// Sends a bound parameter as-is, letting the server infer its type.
#[derive(Debug)]
struct WireParam<'a>(&'a BoundParam);

impl ToSql for WireParam<'_> {
    fn to_sql(
        &self,
        _ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self.0.data() {
            Some(data) => {
                out.extend_from_slice(data);
                Ok(IsNull::No)
            }
            None => Ok(IsNull::Yes),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, _ty: &Type) -> Format {
        match self.0.format() {
            ParamFormat::Text => Format::Text,
            ParamFormat::Binary => Format::Binary,
        }
    }

    to_sql_checked!();
}

/// Undecoded value of any type, used as a last resort.
struct RawValue<'a>(&'a [u8]);

impl<'a> FromSql<'a> for RawValue<'a> {
    fn from_sql(
        _ty: &Type,
        raw: &'a [u8],
    ) -> std::result::Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(RawValue(raw))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn failed_result(e: tokio_postgres::Error) -> Result<RawQueryResult> {
    if e.is_closed() {
        return Err(PgTxError::connection(e.to_string()));
    }
    let raw = match e.as_db_error() {
        Some(db_error) => RawQueryResult::failed(ExecStatus::FatalError, db_error.message())
            .with_sql_state(db_error.code().code()),
        None => RawQueryResult::failed(ExecStatus::FatalError, e.to_string()),
    };
    Ok(raw)
}

fn simple_messages_to_raw(messages: Vec<SimpleQueryMessage>) -> RawQueryResult {
    if messages.is_empty() {
        return RawQueryResult {
            status: ExecStatus::EmptyQuery,
            ..RawQueryResult::empty()
        };
    }

    let mut collector = SimpleResultCollector::default();
    for message in messages {
        match message {
            SimpleQueryMessage::RowDescription(columns) => {
                collector.describe(columns.iter().map(|c| c.name().to_string()).collect());
            }
            SimpleQueryMessage::Row(row) => {
                if !collector.is_described() {
                    let columns = row.columns().iter().map(|c| c.name().to_string());
                    collector.describe(columns.collect());
                }
                collector.push_row(
                    (0..row.len())
                        .map(|i| row.get(i).map(str::to_string))
                        .collect(),
                );
            }
            SimpleQueryMessage::CommandComplete(count) => collector.complete(count),
            _ => {}
        }
    }
    collector.finish()
}

/// Accumulates the messages of a simple query into one result.
///
/// A row description makes the result a row set even when no rows follow.
#[derive(Default)]
struct SimpleResultCollector {
    columns: Option<Vec<String>>,
    rows: Vec<Vec<Option<String>>>,
    rows_affected: Option<u64>,
}

impl SimpleResultCollector {
    fn describe(&mut self, columns: Vec<String>) {
        self.columns = Some(columns);
    }

    fn is_described(&self) -> bool {
        self.columns.is_some()
    }

    fn push_row(&mut self, row: Vec<Option<String>>) {
        self.rows.push(row);
    }

    fn complete(&mut self, rows_affected: u64) {
        self.rows_affected = Some(rows_affected);
    }

    fn finish(self) -> RawQueryResult {
        let mut raw = match self.columns {
            Some(columns) => RawQueryResult::new(columns, self.rows),
            None => RawQueryResult::empty(),
        };
        raw.rows_affected = self.rows_affected;
        raw
    }
}

/// Convert a row value at a given index to its text form, `None` for NULL.
fn row_value_to_text(row: &tokio_postgres::Row, index: usize) -> Option<String> {
    if let Ok(val) = row.try_get::<_, Option<String>>(index) {
        return val;
    }

    if let Ok(val) = row.try_get::<_, Option<i32>>(index) {
        return val.map(|v| v.to_string());
    }

    if let Ok(val) = row.try_get::<_, Option<i64>>(index) {
        return val.map(|v| v.to_string());
    }

    if let Ok(val) = row.try_get::<_, Option<i16>>(index) {
        return val.map(|v| v.to_string());
    }

    // Same spelling the server uses in text results
    if let Ok(val) = row.try_get::<_, Option<bool>>(index) {
        return val.map(|v| if v { "t" } else { "f" }.to_string());
    }

    if let Ok(val) = row.try_get::<_, Option<f64>>(index) {
        return val.map(|v| v.to_string());
    }

    if let Ok(val) = row.try_get::<_, Option<f32>>(index) {
        return val.map(|v| v.to_string());
    }

    // bytea and anything without a decoder are rendered in hex escape form
    row.try_get::<_, Option<RawValue<'_>>>(index)
        .ok()
        .flatten()
        .map(|raw| hex_escape(raw.0))
}

fn hex_escape(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}
