// crates/logsink-core/src/diagnostics.rs
// ============================================================================
// Module: Logsink Diagnostics
// Description: Structured self-log events emitted by sinks and batchers.
// Purpose: Surface write/purge failures without propagating them to producers.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Sinks never propagate steady-state failures to the producer. Instead they
//! report them on a [`DiagnosticSink`], a thin self-log channel that
//! deployments route to stderr, a file, or nowhere. Events are serialized as
//! one JSON object per line.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Self-log event kinds.
///
/// # Invariants
/// - Payloads carry counts and error text only, never event contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A batch write failed and was reported to the batcher.
    BatchFailed {
        /// Number of records in the failed batch.
        records: usize,
        /// Failure description.
        error: String,
    },
    /// The store was full with rollover disabled; the batch was discarded.
    BatchDropped {
        /// Number of discarded records.
        records: usize,
    },
    /// The active store was archived and emptied after filling up.
    StoreRolledOver {
        /// Path of the archive copy.
        archive: PathBuf,
    },
    /// A retention purge completed.
    PurgeCompleted {
        /// Rows removed by the purge.
        deleted_rows: usize,
        /// Cutoff timestamp, in the persisted layout.
        cutoff: String,
    },
    /// A retention purge failed; the next tick will run regardless.
    PurgeFailed {
        /// Failure description.
        error: String,
    },
    /// The batcher queue was full and an event was discarded.
    EventDropped {
        /// Configured queue capacity.
        capacity: usize,
    },
    /// The batcher gave up redelivering a batch.
    BatchAbandoned {
        /// Number of abandoned records.
        records: usize,
        /// Delivery attempts made.
        attempts: u32,
    },
}

/// Self-log event envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticEvent {
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Component that emitted the event.
    pub source: &'static str,
    /// Event payload.
    #[serde(flatten)]
    pub kind: DiagnosticKind,
}

impl DiagnosticEvent {
    /// Builds an event stamped with the current wall-clock time.
    #[must_use]
    pub fn now(source: &'static str, kind: DiagnosticKind) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            timestamp_ms,
            source,
            kind,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Destination for self-log events.
pub trait DiagnosticSink: Send + Sync {
    /// Records a diagnostic event. Implementations must not fail loudly.
    fn record(&self, event: &DiagnosticEvent);
}

/// Diagnostic sink that discards all events.
pub struct NoopDiagnostics;

impl DiagnosticSink for NoopDiagnostics {
    fn record(&self, _event: &DiagnosticEvent) {}
}

/// Diagnostic sink that writes JSON lines to stderr.
pub struct StderrDiagnostics;

impl DiagnosticSink for StderrDiagnostics {
    fn record(&self, event: &DiagnosticEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

/// Diagnostic sink that appends JSON lines to a file.
pub struct FileDiagnostics {
    /// Append-mode file handle guarded for concurrent writers.
    file: Mutex<File>,
}

impl FileDiagnostics {
    /// Opens (or creates) the diagnostics file in append mode.
    ///
    /// # Errors
    ///
    /// Returns [`io::Error`] when the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl DiagnosticSink for FileDiagnostics {
    fn record(&self, event: &DiagnosticEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = writeln!(file, "{payload}");
        }
    }
}

/// Diagnostic sink that keeps events in memory.
///
/// Useful for embedding hosts and tests that assert on sink behavior.
#[derive(Default)]
pub struct MemoryDiagnostics {
    /// Captured events in arrival order.
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl MemoryDiagnostics {
    /// Creates an empty in-memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every captured event.
    #[must_use]
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns captured event payloads matching `predicate`.
    #[must_use]
    pub fn kinds_matching(&self, predicate: impl Fn(&DiagnosticKind) -> bool) -> Vec<DiagnosticKind> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| predicate(&event.kind))
            .map(|event| event.kind.clone())
            .collect()
    }
}

impl DiagnosticSink for MemoryDiagnostics {
    fn record(&self, event: &DiagnosticEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event.clone());
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::panic,
        reason = "Test-only assertions are permitted."
    )]

    use std::panic::AssertUnwindSafe;

    use tempfile::TempDir;

    use super::DiagnosticEvent;
    use super::DiagnosticKind;
    use super::DiagnosticSink;
    use super::FileDiagnostics;
    use super::MemoryDiagnostics;

    #[test]
    fn file_diagnostics_appends_json_lines() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("selflog.jsonl");
        let sink = FileDiagnostics::new(&path).unwrap();
        sink.record(&DiagnosticEvent::now(
            "test",
            DiagnosticKind::BatchDropped {
                records: 4,
            },
        ));
        sink.record(&DiagnosticEvent::now(
            "test",
            DiagnosticKind::PurgeFailed {
                error: "locked".to_string(),
            },
        ));
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> =
            content.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["kind"], "batch_dropped");
        assert_eq!(lines[0]["records"], 4);
        assert_eq!(lines[1]["source"], "test");
        assert_eq!(lines[1]["error"], "locked");
    }

    #[test]
    fn file_diagnostics_keeps_writing_after_poisoned_lock() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("selflog.jsonl");
        let sink = FileDiagnostics::new(&path).unwrap();
        let poisoned = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let _guard = sink.file.lock().unwrap();
            panic!("writer died holding the lock");
        }));
        assert!(poisoned.is_err());
        assert!(sink.file.is_poisoned());
        sink.record(&DiagnosticEvent::now(
            "test",
            DiagnosticKind::BatchDropped {
                records: 1,
            },
        ));
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn memory_diagnostics_filters_by_kind() {
        let sink = MemoryDiagnostics::new();
        sink.record(&DiagnosticEvent::now(
            "test",
            DiagnosticKind::EventDropped {
                capacity: 1,
            },
        ));
        sink.record(&DiagnosticEvent::now(
            "test",
            DiagnosticKind::BatchDropped {
                records: 2,
            },
        ));
        let dropped =
            sink.kinds_matching(|kind| matches!(kind, DiagnosticKind::BatchDropped { .. }));
        assert_eq!(dropped, vec![DiagnosticKind::BatchDropped {
            records: 2
        }]);
        assert_eq!(sink.events().len(), 2);
    }
}
