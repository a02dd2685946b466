// crates/logsink-store-sqlite/src/retention.rs
// ============================================================================
// Module: SQLite Sink Retention
// Description: Time-based purge of expired rows and its background schedule.
// Purpose: Bound store growth by age in addition to size.
// Dependencies: rusqlite, time
// ============================================================================

//! ## Overview
//! A purge deletes every row whose timestamp column sorts before the cutoff
//! `now - period`. The persisted layout is fixed-width, so the text
//! comparison is chronological for rows written in the same clock domain.
//! The retention scheduler runs purges on a dedicated thread: once at start,
//! then every check interval until stopped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::mpsc;
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::params;
use time::OffsetDateTime;
use time::UtcOffset;

use crate::error::SqliteSinkError;

// ============================================================================
// SECTION: Purge
// ============================================================================

/// Computes the purge cutoff for `now`, in UTC when `utc` is set.
///
/// Returns `None` when the period reaches past the representable range, in
/// which case nothing can be expired.
#[must_use]
pub fn retention_cutoff(
    now: OffsetDateTime,
    period: Duration,
    utc: bool,
) -> Option<OffsetDateTime> {
    let now = if utc { now.to_offset(UtcOffset::UTC) } else { now };
    let period = time::Duration::try_from(period).ok()?;
    now.checked_sub(period)
}

/// Deletes rows whose `column` sorts before `cutoff` and compacts the file
/// when anything was removed. Returns the number of deleted rows.
///
/// # Errors
///
/// Returns [`SqliteSinkError`] when the delete or compaction fails.
pub fn purge_older_than(
    connection: &Connection,
    table: &str,
    column: &str,
    cutoff: &str,
) -> Result<usize, SqliteSinkError> {
    let deleted = connection
        .execute(&format!("DELETE FROM {table} WHERE {column} < ?1"), params![cutoff])
        .map_err(|err| SqliteSinkError::from_db(&err))?;
    if deleted > 0 {
        connection.execute_batch("VACUUM;").map_err(|err| SqliteSinkError::from_db(&err))?;
    }
    Ok(deleted)
}

// ============================================================================
// SECTION: Scheduler
// ============================================================================

/// Background thread running a purge tick on a fixed interval.
pub(crate) struct RetentionScheduler {
    /// Dropping the sender stops the loop.
    stop: Option<mpsc::Sender<()>>,
    /// Worker thread handle.
    handle: Option<JoinHandle<()>>,
}

impl RetentionScheduler {
    /// Spawns the scheduler thread. The first tick runs immediately.
    pub(crate) fn start<F>(interval: Duration, mut tick: F) -> Result<Self, SqliteSinkError>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("logsink-retention".to_string())
            .spawn(move || {
                loop {
                    tick();
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(|err| SqliteSinkError::Io(err.to_string()))?;
        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Stops the loop and waits for an in-flight tick to finish.
    ///
    /// Returns an error carrying the panic message when the thread panicked.
    pub(crate) fn stop(&mut self) -> Result<(), SqliteSinkError> {
        drop(self.stop.take());
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        handle.join().map_err(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            SqliteSinkError::Io(format!("retention thread panicked: {message}"))
        })
    }
}

impl Drop for RetentionScheduler {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
