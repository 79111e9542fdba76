mod common;

use common::{Caps, Leaks, MemDriver, SharedBuf, capture_subscriber};
use futures_util::future::join_all;
use sqleak::{Conn as _, Context, Driver as _, LeakConfig, Rows as _, Stmt as _, TxOptions, Value};
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_millis(100);
const PAST_TIMEOUT: Duration = Duration::from_millis(200);

async fn open_mem(name: &str, caps: Caps, config: LeakConfig) -> (sqleak::Database, MemDriver) {
    let driver = MemDriver::new(caps);
    sqleak::register(name, Arc::new(driver.clone())).unwrap();
    let db = sqleak::open(name, "mem://test", config).await.unwrap();
    (db, driver)
}

#[tokio::test]
async fn leaked_rows_are_logged_with_stack() {
    let buf = SharedBuf::default();
    let _guard = tracing::subscriber::set_default(capture_subscriber(&buf));

    let config = LeakConfig::new().with_timeout(TIMEOUT);
    let (db, _) = open_mem("leak-rows", Caps::all(), config).await;
    let ctx = Context::background();

    let rows = db.query(&ctx, "SELECT id, name FROM users", &[]).await.unwrap();
    tokio::time::sleep(PAST_TIMEOUT).await;

    let output = buf.contents();
    assert!(output.contains("likely resource leak detected: Rows not closed within 100ms"));
    let (_, stack) = output
        .split_once("after opening:\n")
        .expect("stack section");
    assert!(!stack.trim().is_empty());
    assert!(output.contains("WARN"));

    rows.close().await.unwrap();
}

#[tokio::test]
async fn closed_rows_are_not_reported() {
    let leaks = Leaks::default();
    let (db, _) = open_mem("closed-rows", Caps::all(), leaks.config(TIMEOUT)).await;
    let ctx = Context::background();

    let mut rows = db.query(&ctx, "SELECT id, name FROM users", &[]).await.unwrap();
    let mut seen = Vec::new();
    while let Some(row) = rows.next().await.unwrap() {
        seen.push(row);
    }
    rows.close().await.unwrap();

    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1], vec![Value::Int(2), Value::Text("grace".into())]);

    tokio::time::sleep(PAST_TIMEOUT).await;
    assert!(leaks.lines().is_empty());
}

#[tokio::test]
async fn leaked_stmt_with_closed_rows_reports_stmt_only() {
    let leaks = Leaks::default();
    let (db, _) = open_mem("leak-stmt", Caps::none(), leaks.config(TIMEOUT)).await;
    let ctx = Context::background();

    let stmt = db.prepare(&ctx, "SELECT id FROM users").await.unwrap();
    let rows = stmt.query(&ctx, &[]).await.unwrap();
    rows.close().await.unwrap();

    tokio::time::sleep(PAST_TIMEOUT).await;
    let lines = leaks.lines();
    assert_eq!(lines.len(), 1, "{lines:#?}");
    assert!(lines[0].starts_with("likely resource leak detected: Stmt not closed within 100ms"));

    stmt.close().await.unwrap();
}

#[tokio::test]
async fn uncommitted_tx_is_reported() {
    let leaks = Leaks::default();
    let (db, _) = open_mem("leak-tx", Caps::all(), leaks.config(TIMEOUT)).await;
    let ctx = Context::background();

    let committed = db.begin(&ctx, TxOptions::default()).await.unwrap();
    committed.exec(&ctx, "UPDATE users SET seen = 1", &[]).await.unwrap();
    committed.commit().await.unwrap();

    let leaked = db.begin(&ctx, TxOptions::default()).await.unwrap();

    tokio::time::sleep(PAST_TIMEOUT).await;
    let lines = leaks.lines();
    assert_eq!(lines.len(), 1, "{lines:#?}");
    assert!(lines[0].contains("Tx not closed within 100ms"));

    leaked.rollback().await.unwrap();
}

#[tokio::test]
async fn late_close_does_not_report_twice() {
    let leaks = Leaks::default();
    let (db, _) = open_mem("late-close", Caps::all(), leaks.config(TIMEOUT)).await;

    let rows = db
        .query(&Context::background(), "SELECT 1", &[])
        .await
        .unwrap();
    tokio::time::sleep(PAST_TIMEOUT).await;
    rows.close().await.unwrap();
    tokio::time::sleep(PAST_TIMEOUT).await;

    assert_eq!(leaks.lines().len(), 1);
}

#[tokio::test]
async fn concurrent_resources_are_tracked_independently() {
    let leaks = Leaks::default();
    let (db, _) = open_mem("concurrent", Caps::all(), leaks.config(TIMEOUT)).await;
    let ctx = Context::background();

    let opened = join_all((0..8).map(|_| db.query(&ctx, "SELECT 1", &[]))).await;
    let mut kept = Vec::new();
    for (i, rows) in opened.into_iter().enumerate() {
        let rows = rows.unwrap();
        if i % 2 == 0 {
            rows.close().await.unwrap();
        } else {
            kept.push(rows);
        }
    }

    tokio::time::sleep(PAST_TIMEOUT).await;
    let lines = leaks.lines();
    assert_eq!(lines.len(), 4);
    assert!(lines.iter().all(|l| l.contains("Rows not closed")));

    for rows in kept {
        rows.close().await.unwrap();
    }
}

#[tokio::test]
async fn wrapped_driver_can_be_used_directly() {
    let leaks = Leaks::default();
    let original = Arc::new(MemDriver::new(Caps::none()));
    let driver = sqleak::wrap_driver(original.clone(), leaks.config(TIMEOUT));

    let conn = driver.open("mem://direct").await.unwrap();
    let stmt = conn.prepare("SELECT 1").await.unwrap();
    let mut rows = stmt.query(&[]).await.unwrap();
    rows.close().await.unwrap();

    // The original driver still hands out unmonitored resources.
    let raw = original.open("mem://direct").await.unwrap();
    let _raw_stmt = raw.prepare("SELECT 1").await.unwrap();

    tokio::time::sleep(PAST_TIMEOUT).await;
    let lines = leaks.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("Stmt not closed"));
    stmt.close().await.unwrap();
}
