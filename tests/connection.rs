use std::sync::{Arc, Mutex};

use pgtx::drivers::{InMemoryTestDriver, InMemoryTestResponseBuilder};
use pgtx::types::{BoundParam, BoundParams, ExecStatus, Notice, ParamFormat, RawQueryResult};
use pgtx::{ConnectOptions, Connection, PgTxError, SqlValue};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn tester() -> Option<String> {
    Some("tester".to_string())
}

fn connected(driver: &InMemoryTestDriver) -> Connection {
    Connection::with_driver(Box::new(driver.clone()))
}

#[tokio::test]
async fn test_connect_applies_defaults_and_sets_up_session() {
    init_tracing();
    let in_memory_test_driver = InMemoryTestDriver::new();

    let conn = Connection::connect_with(ConnectOptions::new("app"), &in_memory_test_driver, tester)
        .await
        .unwrap();

    assert!(!conn.is_closed());
    assert_eq!(conn.nesting_depth(), 0);
    assert_eq!(
        in_memory_test_driver.conninfos(),
        vec!["dbname='app' user='tester' host='127.0.0.1' port='5432' sslmode='prefer'"]
    );
    assert_eq!(in_memory_test_driver.client_encoding().as_deref(), Some("UTF8"));
    assert!(in_memory_test_driver.has_notice_processor());

    // Session setup is not part of the query log
    in_memory_test_driver.assert_query_count(0);
}

#[tokio::test]
async fn test_connect_without_db_never_reaches_the_driver() {
    let in_memory_test_driver = InMemoryTestDriver::new();

    let options = ConnectOptions {
        user: Some("app".to_string()),
        ..ConnectOptions::default()
    };
    let err = Connection::connect_with(options, &in_memory_test_driver, tester)
        .await
        .err()
        .expect("connect should fail");

    assert!(matches!(err, PgTxError::Configuration(_)));
    assert!(in_memory_test_driver.conninfos().is_empty());
}

#[tokio::test]
async fn test_connect_error_carries_driver_diagnostic() {
    let in_memory_test_driver =
        InMemoryTestDriver::new().with_connect_error("could not connect to server: Connection refused");

    let err = Connection::connect_with(ConnectOptions::new("app"), &in_memory_test_driver, tester)
        .await
        .err()
        .expect("connect should fail");

    match err {
        PgTxError::Connection(message) => assert!(message.contains("Connection refused")),
        other => panic!("Expected Connection error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_bad_status_releases_driver() {
    let in_memory_test_driver =
        InMemoryTestDriver::new().with_bad_status("FATAL:  database \"app\" does not exist");

    let err = Connection::connect_with(ConnectOptions::new("app"), &in_memory_test_driver, tester)
        .await
        .err()
        .expect("connect should fail");

    match err {
        PgTxError::Connection(message) => assert!(message.contains("does not exist")),
        other => panic!("Expected Connection error, got {:?}", other),
    }
    assert_eq!(in_memory_test_driver.finish_count(), 1);
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let in_memory_test_driver = InMemoryTestDriver::new();
    let mut conn = connected(&in_memory_test_driver);

    assert!(conn.close());
    assert!(conn.is_closed());
    assert!(!conn.close());

    drop(conn);
    assert_eq!(in_memory_test_driver.finish_count(), 1);
}

#[tokio::test]
async fn test_drop_releases_driver_once() {
    let in_memory_test_driver = InMemoryTestDriver::new();
    {
        let _conn = connected(&in_memory_test_driver);
    }
    assert_eq!(in_memory_test_driver.finish_count(), 1);
}

#[tokio::test]
async fn test_closed_connection_fails_fast() {
    let in_memory_test_driver = InMemoryTestDriver::new();
    let mut conn = connected(&in_memory_test_driver);
    conn.close();

    let is_connection_error = |err: &PgTxError| matches!(err, PgTxError::Connection(_));

    assert!(is_connection_error(&conn.execute("select 1", &[]).await.unwrap_err()));
    assert!(is_connection_error(&conn.begin(None).await.unwrap_err()));
    assert!(is_connection_error(&conn.commit(None).await.unwrap_err()));
    assert!(is_connection_error(&conn.rollback(None).await.unwrap_err()));
    assert!(is_connection_error(&conn.escape("x").unwrap_err()));
    assert!(is_connection_error(&conn.prepare("select 1").await.err().unwrap()));

    let result: Result<(), PgTxError> = conn
        .transaction(None, |_conn| Box::pin(async move { Ok::<_, PgTxError>(()) }))
        .await;
    assert!(is_connection_error(&result.unwrap_err()));

    in_memory_test_driver.assert_query_count(0);
}

#[tokio::test]
async fn test_execute_sends_null_marker() {
    let in_memory_test_driver = InMemoryTestDriver::new().with_response(
        InMemoryTestResponseBuilder::new()
            .columns(&["?column?"])
            .nullable_row(&[None])
            .build(),
    );
    let conn = connected(&in_memory_test_driver);

    let result = conn.execute("SELECT $1", &[SqlValue::Null]).await.unwrap();

    let expected = BoundParams::from(vec![BoundParam::null()]);
    in_memory_test_driver.assert_last_query("SELECT $1", Some(&expected));

    let last = in_memory_test_driver.last_query().unwrap();
    let param = last.params.as_ref().unwrap().get(0).unwrap();
    assert!(param.is_null());
    assert_eq!(param.len(), 0);

    let row = result.single_row().unwrap();
    assert_eq!(row.get("?column?").unwrap(), None);
}

#[tokio::test]
async fn test_execute_without_binds_uses_plain_exec() {
    let in_memory_test_driver = InMemoryTestDriver::new().with_response(RawQueryResult::command(3));
    let conn = connected(&in_memory_test_driver);

    let result = conn.execute("delete from users", &[]).await.unwrap();

    in_memory_test_driver.assert_last_query("delete from users", None);
    assert_eq!(result.rows_affected(), Some(3));
}

#[tokio::test]
async fn test_execute_binds_text_and_binary() {
    let in_memory_test_driver = InMemoryTestDriver::new();
    let conn = connected(&in_memory_test_driver);

    conn.execute(
        "insert into files(name, size, data) values (?, ?, ?)",
        &["report.pdf".into(), 2048i64.into(), vec![0x25u8, 0x50].into()],
    )
    .await
    .unwrap();

    let last = in_memory_test_driver.last_query().unwrap();
    assert_eq!(
        last.sql,
        "insert into files(name, size, data) values ($1, $2, $3)"
    );

    let params = last.params.unwrap();
    assert_eq!(
        params.formats(),
        vec![ParamFormat::Text, ParamFormat::Text, ParamFormat::Binary]
    );
    assert_eq!(
        params.values(),
        vec![
            Some(&b"report.pdf"[..]),
            Some(&b"2048"[..]),
            Some(&[0x25u8, 0x50][..])
        ]
    );
}

#[tokio::test]
async fn test_execute_surfaces_database_error() {
    init_tracing();
    let in_memory_test_driver = InMemoryTestDriver::new().with_response(
        RawQueryResult::failed(ExecStatus::FatalError, "relation \"missing\" does not exist")
            .with_sql_state("42P01"),
    );
    let conn = connected(&in_memory_test_driver);

    let err = conn.execute("select * from missing", &[]).await.unwrap_err();

    match &err {
        PgTxError::Database { message, sql_state } => {
            assert_eq!(message, "relation \"missing\" does not exist");
            assert_eq!(sql_state.as_deref(), Some("42P01"));
        }
        other => panic!("Expected Database error, got {:?}", other),
    }
    in_memory_test_driver.assert_query_count(1);
}

#[tokio::test]
async fn test_execute_returns_rows() {
    let in_memory_test_driver = InMemoryTestDriver::new().with_response(
        InMemoryTestResponseBuilder::new()
            .columns(&["id", "name"])
            .row(&["1", "Alice"])
            .nullable_row(&[Some("2"), None])
            .build(),
    );
    let conn = connected(&in_memory_test_driver);

    let result = conn
        .execute("select id, name from users where id > ?", &[0.into()])
        .await
        .unwrap();

    assert_eq!(result.columns(), &["id".to_string(), "name".to_string()]);
    let rows = result.rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("name").unwrap(), Some("Alice"));
    assert_eq!(rows[1].get("id").unwrap(), Some("2"));
    assert_eq!(rows[1].get("name").unwrap(), None);
}

#[tokio::test]
async fn test_escape() {
    let in_memory_test_driver = InMemoryTestDriver::new();
    let conn = connected(&in_memory_test_driver);

    assert_eq!(conn.escape("O'Brien").unwrap(), "O''Brien");
    assert_eq!(conn.escape(42).unwrap(), "42");
    assert_eq!(conn.escape("żółw 🐢").unwrap(), "żółw 🐢");
    assert_eq!(conn.escape("a\0b").unwrap(), "a");
    assert_eq!(conn.quote_identifier("order").unwrap(), "\"order\"");
}

#[tokio::test]
async fn test_escape_failure_is_argument_error() {
    let in_memory_test_driver = InMemoryTestDriver::new().with_escape_error("invalid byte sequence");
    let conn = connected(&in_memory_test_driver);

    match conn.escape("abc").unwrap_err() {
        PgTxError::Argument(message) => assert!(message.contains("invalid byte sequence")),
        other => panic!("Expected Argument error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_prepare_and_execute_statement() {
    let in_memory_test_driver = InMemoryTestDriver::new();
    let conn = connected(&in_memory_test_driver);

    let statement = conn
        .prepare("update users set name = ? where id = ?")
        .await
        .unwrap();
    assert_eq!(statement.sql(), "update users set name = $1 where id = $2");
    assert_eq!(
        in_memory_test_driver.prepared_statements(),
        vec!["update users set name = $1 where id = $2"]
    );

    statement
        .execute(&["Bob".into(), 7.into()])
        .await
        .unwrap();

    in_memory_test_driver.assert_last_query(
        "update users set name = $1 where id = $2",
        Some(&BoundParams::bind(&["Bob".into(), 7.into()])),
    );
}

#[tokio::test]
async fn test_prepare_failure() {
    let in_memory_test_driver =
        InMemoryTestDriver::new().with_error_on("selec 1", "syntax error at or near \"selec\"");
    let conn = connected(&in_memory_test_driver);

    let err = conn.prepare("selec 1").await.err().unwrap();
    assert!(matches!(err, PgTxError::Database { .. }));
}

#[tokio::test]
async fn test_notices_reach_custom_processor() {
    let in_memory_test_driver = InMemoryTestDriver::new();
    let conn = Connection::connect_with(ConnectOptions::new("app"), &in_memory_test_driver, tester)
        .await
        .unwrap();

    // Default processor only logs
    assert!(in_memory_test_driver.emit_notice(Notice::new("NOTICE", "table created")));

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    conn.set_notice_processor(Arc::new(move |notice: &Notice| {
        sink.lock().unwrap().push(notice.clone());
    }))
    .unwrap();

    in_memory_test_driver.emit_notice(Notice::new("WARNING", "there is no transaction in progress"));

    assert_eq!(
        *received.lock().unwrap(),
        vec![Notice::new("WARNING", "there is no transaction in progress")]
    );
}
