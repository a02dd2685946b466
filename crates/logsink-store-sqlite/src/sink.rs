// crates/logsink-store-sqlite/src/sink.rs
// ============================================================================
// Module: SQLite Log Sink
// Description: Gated batch writes with rollover and scheduled retention.
// Purpose: Persist log batches durably within a bounded store size.
// Dependencies: logsink-core, rusqlite
// ============================================================================

//! ## Overview
//! [`SqliteLogSink`] is the [`BatchWriter`] backed by a single `SQLite` file.
//! Every store-mutating operation (batch writes and retention purges) runs
//! under one per-instance gate with a fresh connection, so at most one
//! transaction is in flight against the store at any time.
//!
//! A write that hits the size limit either discards the batch (rollover
//! disabled) or archives the full store, empties it, and retries the batch
//! exactly once.
//! Security posture: table and column names are validated identifiers; all
//! record values are bound as parameters.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use logsink_core::BatchOutcome;
use logsink_core::BatchWriter;
use logsink_core::DiagnosticEvent;
use logsink_core::DiagnosticKind;
use logsink_core::DiagnosticSink;
use logsink_core::LogEvent;
use logsink_core::format_timestamp;
use logsink_core::now_in_storage_clock;
use rusqlite::Connection;
use time::OffsetDateTime;

use crate::config::RetentionPolicy;
use crate::config::SqliteSinkConfig;
use crate::connection::ensure_parent_dir;
use crate::connection::open_connection;
use crate::error::SqliteSinkError;
use crate::retention::RetentionScheduler;
use crate::retention::purge_older_than;
use crate::retention::retention_cutoff;
use crate::rollover::archive_store;
use crate::rollover::reset_store;
use crate::schema::InsertTemplate;
use crate::schema::LogSchema;
use crate::writer::insert_batch;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Diagnostic source label.
const DIAGNOSTIC_SOURCE: &str = "sqlite-sink";

// ============================================================================
// SECTION: Sink
// ============================================================================

/// `SQLite`-backed log sink.
///
/// # Invariants
/// - The table exists before the first write.
/// - Writes and purges never overlap.
/// - The retention thread, when present, is stopped before the sink is gone.
pub struct SqliteLogSink {
    /// State shared with the retention thread.
    inner: Arc<SinkState>,
    /// Retention thread, present while retention is enabled and running.
    retention: Mutex<Option<RetentionScheduler>>,
}

/// Immutable sink state plus the write gate.
struct SinkState {
    /// Validated configuration.
    config: SqliteSinkConfig,
    /// Resolved column layout.
    schema: LogSchema,
    /// Insert statement for the configured table.
    insert_template: InsertTemplate,
    /// Effective retention policy.
    retention: Option<RetentionPolicy>,
    /// Serializes every store-mutating operation.
    gate: Mutex<()>,
    /// Self-log channel.
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl SqliteLogSink {
    /// Validates `config`, creates the store and table, and starts the
    /// retention thread when retention is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSinkError::Config`] for invalid configuration, or
    /// another [`SqliteSinkError`] when the store cannot be initialized.
    pub fn new(
        config: SqliteSinkConfig,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, SqliteSinkError> {
        config.validate()?;
        let schema = config.schema()?;
        ensure_parent_dir(&config.path)?;
        let connection = open_connection(&config)?;
        schema.ensure_table(&connection, &config.table_name)?;
        drop(connection);

        let insert_template = schema.build_insert_template(&config.table_name);
        let retention = config.retention_policy();
        let inner = Arc::new(SinkState {
            config,
            schema,
            insert_template,
            retention,
            gate: Mutex::new(()),
            diagnostics,
        });
        let scheduler = match retention {
            Some(policy) => {
                let state = Arc::clone(&inner);
                Some(RetentionScheduler::start(policy.check_interval, move || {
                    state.run_retention_tick();
                })?)
            }
            None => None,
        };
        Ok(Self {
            inner,
            retention: Mutex::new(scheduler),
        })
    }

    /// Returns the sink configuration.
    #[must_use]
    pub fn config(&self) -> &SqliteSinkConfig {
        &self.inner.config
    }

    /// Returns the resolved column layout.
    #[must_use]
    pub fn schema(&self) -> &LogSchema {
        &self.inner.schema
    }

    /// Returns the effective retention policy.
    #[must_use]
    pub fn retention_policy(&self) -> Option<RetentionPolicy> {
        self.inner.retention
    }

    /// Purges rows older than the configured retention period.
    ///
    /// Returns `Ok(0)` when retention is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSinkError`] when the purge fails.
    pub fn purge_expired(&self) -> Result<usize, SqliteSinkError> {
        self.inner.purge_expired()
    }

    /// Purges rows whose timestamp sorts before `cutoff`.
    ///
    /// `cutoff` is converted to UTC when UTC storage is configured.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSinkError::Config`] when the schema has no timestamp
    /// column, or another [`SqliteSinkError`] when the purge fails.
    pub fn purge_older_than(&self, cutoff: OffsetDateTime) -> Result<usize, SqliteSinkError> {
        self.inner.purge_older_than(cutoff)
    }

    /// Stops the retention thread. Idempotent.
    ///
    /// A panic on the retention thread is reported as `PurgeFailed`.
    pub fn shutdown(&self) {
        let scheduler = self.retention.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(mut scheduler) = scheduler
            && let Err(err) = scheduler.stop()
        {
            self.inner.record(DiagnosticKind::PurgeFailed {
                error: err.to_string(),
            });
        }
    }
}

impl BatchWriter for SqliteLogSink {
    fn write_batch(&self, events: &[LogEvent]) -> BatchOutcome {
        self.inner.write_batch(events)
    }

    fn shutdown(&self) {
        Self::shutdown(self);
    }
}

impl Drop for SqliteLogSink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// SECTION: Write Path
// ============================================================================

impl SinkState {
    /// Writes a batch under the gate and reports the outcome.
    fn write_batch(&self, events: &[LogEvent]) -> BatchOutcome {
        if events.is_empty() {
            return BatchOutcome::Empty;
        }
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        match self.write_locked(events) {
            Ok(outcome) => outcome,
            Err(err) => {
                let error = err.to_string();
                self.record(DiagnosticKind::BatchFailed {
                    records: events.len(),
                    error: error.clone(),
                });
                BatchOutcome::Failed {
                    error,
                }
            }
        }
    }

    /// Writes a batch; the caller holds the gate.
    fn write_locked(&self, events: &[LogEvent]) -> Result<BatchOutcome, SqliteSinkError> {
        let mut connection = open_connection(&self.config)?;
        self.schema.ensure_table(&connection, &self.config.table_name)?;
        match self.insert(&mut connection, events) {
            Ok(rows) => Ok(BatchOutcome::Written {
                rows,
            }),
            Err(err) if err.is_capacity_exceeded() => self.recover_full_store(&mut connection, events),
            Err(err) => Err(err),
        }
    }

    /// Handles a store-full failure: drop the batch, or archive, reset, and
    /// retry once.
    fn recover_full_store(
        &self,
        connection: &mut Connection,
        events: &[LogEvent],
    ) -> Result<BatchOutcome, SqliteSinkError> {
        if !self.config.allow_rollover {
            self.record(DiagnosticKind::BatchDropped {
                records: events.len(),
            });
            return Ok(BatchOutcome::Dropped {
                records: events.len(),
            });
        }
        let archive = self.roll_over(connection)?;
        let rows = self.insert(connection, events)?;
        Ok(BatchOutcome::RolledOver {
            rows,
            archive,
        })
    }

    /// Archives the active store and empties it.
    fn roll_over(&self, connection: &Connection) -> Result<PathBuf, SqliteSinkError> {
        let stamp = now_in_storage_clock(self.config.store_timestamp_in_utc);
        let archive = archive_store(&self.config.path, stamp)?;
        reset_store(connection, &self.config.table_name)?;
        self.record(DiagnosticKind::StoreRolledOver {
            archive: archive.clone(),
        });
        Ok(archive)
    }

    /// Runs the transactional insert.
    fn insert(&self, connection: &mut Connection, events: &[LogEvent]) -> Result<usize, SqliteSinkError> {
        insert_batch(
            connection,
            &self.schema,
            &self.insert_template,
            events,
            self.config.store_timestamp_in_utc,
        )
    }

    // ========================================================================
    // SECTION: Retention
    // ========================================================================

    /// Scheduler tick: purge and report failures.
    fn run_retention_tick(&self) {
        if let Err(err) = self.purge_expired() {
            self.record(DiagnosticKind::PurgeFailed {
                error: err.to_string(),
            });
        }
    }

    /// Purges rows older than the retention period.
    fn purge_expired(&self) -> Result<usize, SqliteSinkError> {
        let Some(policy) = self.retention else {
            return Ok(0);
        };
        let utc = self.config.store_timestamp_in_utc;
        match retention_cutoff(now_in_storage_clock(utc), policy.period, utc) {
            Some(cutoff) => self.purge_older_than(cutoff),
            None => Ok(0),
        }
    }

    /// Purges rows older than `cutoff` under the gate.
    fn purge_older_than(&self, cutoff: OffsetDateTime) -> Result<usize, SqliteSinkError> {
        let column = self.schema.timestamp_column().ok_or_else(|| {
            SqliteSinkError::Config("purge requires a Timestamp column".to_string())
        })?;
        let cutoff = format_timestamp(cutoff, self.config.store_timestamp_in_utc)
            .map_err(|err| SqliteSinkError::Invalid(err.to_string()))?;
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        let connection = open_connection(&self.config)?;
        let deleted = purge_older_than(&connection, &self.config.table_name, column, &cutoff)?;
        self.record(DiagnosticKind::PurgeCompleted {
            deleted_rows: deleted,
            cutoff,
        });
        Ok(deleted)
    }

    /// Emits a diagnostic event.
    fn record(&self, kind: DiagnosticKind) {
        self.diagnostics.record(&DiagnosticEvent::now(DIAGNOSTIC_SOURCE, kind));
    }
}
