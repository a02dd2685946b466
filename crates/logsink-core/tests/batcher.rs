// crates/logsink-core/tests/batcher.rs
// ============================================================================
// Module: Periodic Batcher Tests
// Description: Batch sizing, ordering, redelivery, and backpressure tests.
// Purpose: Validate the producer-facing emit/flush/shutdown contract.
// ============================================================================

//! ## Overview
//! Drives [`PeriodicBatcher`] against scripted in-memory writers:
//! - Batches respect `batch_size` and preserve emission order
//! - Failed batches are redelivered and eventually abandoned
//! - Dropped outcomes are not redelivered
//! - A full queue drops events and reports them
//! - A parked retry caps what the worker holds
//! - Shutdown drains the queue and shuts the writer down

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::time::Duration;

use logsink_core::BatchOutcome;
use logsink_core::BatchWriter;
use logsink_core::BatcherError;
use logsink_core::BatchingConfig;
use logsink_core::DiagnosticKind;
use logsink_core::Level;
use logsink_core::LogEvent;
use logsink_core::MemoryDiagnostics;
use logsink_core::PeriodicBatcher;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Writer that records every call and replays scripted outcomes.
#[derive(Default)]
struct ScriptedWriter {
    calls: Mutex<Vec<Vec<String>>>,
    script: Mutex<VecDeque<BatchOutcome>>,
    shut_down: AtomicBool,
}

impl ScriptedWriter {
    fn with_script(outcomes: Vec<BatchOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl BatchWriter for ScriptedWriter {
    fn write_batch(&self, events: &[LogEvent]) -> BatchOutcome {
        self.calls.lock().unwrap().push(events.iter().map(LogEvent::render_message).collect());
        self.script.lock().unwrap().pop_front().unwrap_or(BatchOutcome::Written {
            rows: events.len(),
        })
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}

fn failed() -> BatchOutcome {
    BatchOutcome::Failed {
        error: "store unavailable".to_string(),
    }
}

fn config(batch_size: usize, retry_limit: u32) -> BatchingConfig {
    BatchingConfig {
        batch_size,
        max_buffer_size: 1_000,
        period_ms: 60_000,
        retry_limit,
    }
}

fn event(message: &str) -> LogEvent {
    LogEvent::new(Level::Information, message)
}

fn start(
    config: BatchingConfig,
    writer: &Arc<ScriptedWriter>,
) -> (PeriodicBatcher, Arc<MemoryDiagnostics>) {
    let diagnostics = Arc::new(MemoryDiagnostics::new());
    let batcher = PeriodicBatcher::start(config, writer.clone(), diagnostics.clone()).unwrap();
    (batcher, diagnostics)
}

// ============================================================================
// SECTION: Batching
// ============================================================================

#[test]
fn batches_respect_size_and_order() {
    let writer = Arc::new(ScriptedWriter::default());
    let (batcher, _diagnostics) = start(config(2, 3), &writer);
    for index in 0 .. 5 {
        assert!(batcher.emit(event(&format!("m{index}"))));
    }
    batcher.flush().unwrap();
    assert_eq!(writer.calls(), vec![vec!["m0", "m1"], vec!["m2", "m3"], vec!["m4"]]);
}

#[test]
fn periodic_tick_flushes_partial_batches() {
    let writer = Arc::new(ScriptedWriter::default());
    let mut cfg = config(100, 3);
    cfg.period_ms = 20;
    let (batcher, _diagnostics) = start(cfg, &writer);
    assert!(batcher.emit(event("lonely")));
    let mut waited = Duration::ZERO;
    while writer.calls().is_empty() && waited < Duration::from_secs(5) {
        std::thread::sleep(Duration::from_millis(10));
        waited += Duration::from_millis(10);
    }
    assert_eq!(writer.calls(), vec![vec!["lonely"]]);
}

#[test]
fn invalid_config_is_rejected() {
    let writer = Arc::new(ScriptedWriter::default());
    let diagnostics = Arc::new(MemoryDiagnostics::new());
    let Err(err) = PeriodicBatcher::start(config(0, 3), writer, diagnostics) else {
        panic!("expected zero batch size to fail");
    };
    assert!(matches!(err, BatcherError::Invalid(_)));
}

// ============================================================================
// SECTION: Redelivery
// ============================================================================

#[test]
fn failed_batch_is_redelivered_before_newer_events() {
    let writer = Arc::new(ScriptedWriter::with_script(vec![failed()]));
    let (batcher, diagnostics) = start(config(10, 3), &writer);
    assert!(batcher.emit(event("first")));
    batcher.flush().unwrap();
    assert!(batcher.emit(event("second")));
    batcher.flush().unwrap();
    assert_eq!(writer.calls(), vec![vec!["first"], vec!["first"], vec!["second"]]);
    assert!(diagnostics.events().is_empty());
}

#[test]
fn batch_is_abandoned_after_retry_limit() {
    let writer = Arc::new(ScriptedWriter::with_script(vec![failed(), failed(), failed()]));
    let (batcher, diagnostics) = start(config(10, 1), &writer);
    assert!(batcher.emit(event("doomed")));
    batcher.flush().unwrap();
    batcher.flush().unwrap();
    batcher.flush().unwrap();
    assert_eq!(writer.calls().len(), 2);
    let abandoned =
        diagnostics.kinds_matching(|kind| matches!(kind, DiagnosticKind::BatchAbandoned { .. }));
    assert_eq!(abandoned, vec![DiagnosticKind::BatchAbandoned {
        records: 1,
        attempts: 2,
    }]);
}

#[test]
fn dropped_batches_are_not_redelivered() {
    let writer = Arc::new(ScriptedWriter::with_script(vec![BatchOutcome::Dropped {
        records: 1,
    }]));
    let (batcher, _diagnostics) = start(config(10, 3), &writer);
    assert!(batcher.emit(event("discarded")));
    batcher.flush().unwrap();
    batcher.flush().unwrap();
    assert_eq!(writer.calls(), vec![vec!["discarded"]]);
}

// ============================================================================
// SECTION: Backpressure
// ============================================================================

/// Writer whose first call blocks until released.
struct BlockingWriter {
    gate: Mutex<Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>>,
    written: Mutex<usize>,
}

impl BatchWriter for BlockingWriter {
    fn write_batch(&self, events: &[LogEvent]) -> BatchOutcome {
        let gate = self.gate.lock().unwrap().take();
        if let Some((entered, release)) = gate {
            entered.send(()).unwrap();
            release.recv().unwrap();
        }
        *self.written.lock().unwrap() += events.len();
        BatchOutcome::Written {
            rows: events.len(),
        }
    }
}

#[test]
fn full_queue_drops_new_events() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let writer = Arc::new(BlockingWriter {
        gate: Mutex::new(Some((entered_tx, release_rx))),
        written: Mutex::new(0),
    });
    let diagnostics = Arc::new(MemoryDiagnostics::new());
    let cfg = BatchingConfig {
        batch_size: 1,
        max_buffer_size: 1,
        period_ms: 60_000,
        retry_limit: 0,
    };
    let batcher = PeriodicBatcher::start(cfg, writer.clone(), diagnostics.clone()).unwrap();

    assert!(batcher.emit(event("in flight")));
    entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(batcher.emit(event("queued")));
    assert!(!batcher.emit(event("overflow")));

    release_tx.send(()).unwrap();
    batcher.shutdown();
    assert_eq!(*writer.written.lock().unwrap(), 2);
    let dropped =
        diagnostics.kinds_matching(|kind| matches!(kind, DiagnosticKind::EventDropped { .. }));
    assert_eq!(dropped, vec![DiagnosticKind::EventDropped {
        capacity: 1
    }]);
}

#[test]
fn parked_retry_bounds_events_held_by_worker() {
    let writer = Arc::new(ScriptedWriter::with_script((0 .. 16).map(|_| failed()).collect()));
    let cfg = BatchingConfig {
        batch_size: 1,
        max_buffer_size: 2,
        period_ms: 60_000,
        retry_limit: 100,
    };
    let (batcher, diagnostics) = start(cfg, &writer);
    assert!(batcher.emit(event("stuck")));
    batcher.flush().unwrap();
    for index in 0 .. 10_000 {
        batcher.emit(event(&format!("m{index}")));
    }
    batcher.flush().unwrap();
    batcher.shutdown();

    assert!(writer.calls().iter().all(|call| call == &vec!["stuck"]));
    let dropped = diagnostics
        .kinds_matching(|kind| matches!(kind, DiagnosticKind::EventDropped { .. }))
        .len();
    let abandoned: usize = diagnostics
        .kinds_matching(|kind| matches!(kind, DiagnosticKind::BatchAbandoned { .. }))
        .iter()
        .map(|kind| match kind {
            DiagnosticKind::BatchAbandoned {
                records, ..
            } => *records,
            _ => 0,
        })
        .sum();
    assert_eq!(abandoned, 2);
    assert_eq!(dropped + abandoned, 10_001);
}

// ============================================================================
// SECTION: Shutdown
// ============================================================================

#[test]
fn shutdown_drains_and_closes_writer() {
    let writer = Arc::new(ScriptedWriter::default());
    let (batcher, _diagnostics) = start(config(50, 3), &writer);
    assert!(batcher.emit(event("last words")));
    batcher.shutdown();
    assert_eq!(writer.calls(), vec![vec!["last words"]]);
    assert!(writer.shut_down.load(Ordering::SeqCst));
    assert!(!batcher.emit(event("too late")));
    assert_eq!(batcher.flush(), Err(BatcherError::Closed));
    batcher.shutdown();
}
