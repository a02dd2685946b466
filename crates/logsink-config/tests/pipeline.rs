// crates/logsink-config/tests/pipeline.rs
// ============================================================================
// Module: Log Pipeline Tests
// Description: End-to-end tests from TOML config to persisted rows.
// Purpose: Validate pipeline wiring, flushing, and shutdown.
// ============================================================================

//! ## Overview
//! Builds [`LogPipeline`] from configuration and checks that emitted events
//! reach the store, diagnostics are routed, and shutdown drains the queue.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::path::Path;
use std::sync::Arc;

use logsink_config::DiagnosticsConfig;
use logsink_config::LogPipeline;
use logsink_config::LogSinkConfig;
use logsink_config::PipelineError;
use logsink_config::build_diagnostics;
use logsink_core::BatchingConfig;
use logsink_core::Level;
use logsink_core::LogEvent;
use logsink_core::MemoryDiagnostics;
use logsink_store_sqlite::SqliteSinkConfig;
use logsink_store_sqlite::SqliteSinkError;
use rusqlite::Connection;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn config_for(dir: &TempDir) -> LogSinkConfig {
    let store = dir.path().join("logs.db");
    LogSinkConfig::from_toml(&format!(
        "[sink]\npath = {:?}\n[batching]\nbatch_size = 2\nperiod_ms = 60000\n[diagnostics]\ntarget \
         = \"none\"\n",
        store.to_string_lossy()
    ))
    .unwrap()
}

fn messages(path: &Path) -> Vec<String> {
    let connection = Connection::open(path).unwrap();
    let mut statement =
        connection.prepare("SELECT RenderedMessage FROM Logs ORDER BY rowid").unwrap();
    statement
        .query_map([], |row| row.get::<_, String>(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn emitted_events_reach_the_store_in_order() {
    let dir = TempDir::new().unwrap();
    let config = config_for(&dir);
    let pipeline = LogPipeline::build(&config).unwrap();
    for index in 0_i64 .. 5 {
        let event = LogEvent::new(Level::Information, "event {N}").with_property("N", index);
        assert!(pipeline.emit(event));
    }
    pipeline.flush().unwrap();
    assert_eq!(messages(&config.sink.path), vec![
        "event 0", "event 1", "event 2", "event 3", "event 4"
    ]);
}

#[test]
fn shutdown_drains_and_closes_the_pipeline() {
    let dir = TempDir::new().unwrap();
    let config = config_for(&dir);
    let diagnostics = Arc::new(MemoryDiagnostics::new());
    let pipeline = LogPipeline::build_with_diagnostics(&config, diagnostics.clone()).unwrap();
    assert!(pipeline.emit(LogEvent::new(Level::Warning, "final")));
    pipeline.shutdown();
    assert_eq!(messages(&pipeline.sink().config().path), vec!["final"]);
    assert!(!pipeline.emit(LogEvent::new(Level::Warning, "ignored")));
    assert!(matches!(pipeline.flush(), Err(PipelineError::Batcher(_))));
    pipeline.shutdown();
    assert!(diagnostics.events().is_empty());
}

#[test]
fn invalid_sink_fails_the_build() {
    let dir = TempDir::new().unwrap();
    let mut sink = SqliteSinkConfig::new(dir.path().join("logs.db"));
    sink.max_store_size_mb = 0;
    let config = LogSinkConfig {
        sink,
        batching: BatchingConfig::default(),
        diagnostics: DiagnosticsConfig::None,
    };
    let Err(err) = LogPipeline::build(&config) else {
        panic!("expected invalid sink to fail");
    };
    assert!(matches!(err, PipelineError::Sink(SqliteSinkError::Config(_))));
}

#[test]
fn file_diagnostics_are_created_on_build() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("diagnostics.jsonl");
    build_diagnostics(&DiagnosticsConfig::File {
        path: path.clone(),
    })
    .unwrap();
    assert!(path.is_file());
    let missing_parent = dir.path().join("absent").join("diagnostics.jsonl");
    assert!(matches!(
        build_diagnostics(&DiagnosticsConfig::File {
            path: missing_parent,
        }),
        Err(PipelineError::Diagnostics(_))
    ));
}
