// crates/logsink-store-sqlite/src/error.rs
// ============================================================================
// Module: SQLite Sink Errors
// Description: Error taxonomy for the SQLite log sink.
// Purpose: Distinguish configuration, capacity, and transient store failures.
// Dependencies: rusqlite, thiserror
// ============================================================================

//! ## Overview
//! Construction-time problems surface as [`SqliteSinkError::Config`]. On the
//! write path the store-full condition is classified once, at the point the
//! engine reports it, into [`SqliteSinkError::CapacityExceeded`] so the
//! rollover logic can match on it instead of inspecting raw engine codes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rusqlite::ErrorCode;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// SQLite sink errors.
///
/// # Invariants
/// - Error messages avoid embedding log event contents.
/// - `CapacityExceeded` is produced only for the engine's "database or disk
///   is full" result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteSinkError {
    /// Invalid sink configuration; the sink cannot be constructed.
    #[error("sqlite sink config error: {0}")]
    Config(String),
    /// Filesystem error (parent directories, archive copies).
    #[error("sqlite sink io error: {0}")]
    Io(String),
    /// `SQLite` engine error other than a full store.
    #[error("sqlite sink db error: {0}")]
    Db(String),
    /// The store reached its configured maximum page count.
    #[error("sqlite sink store full: {0}")]
    CapacityExceeded(String),
    /// A record could not be converted into column values.
    #[error("sqlite sink invalid record: {0}")]
    Invalid(String),
}

impl SqliteSinkError {
    /// Classifies a `rusqlite` error.
    #[must_use]
    pub fn from_db(err: &rusqlite::Error) -> Self {
        if err.sqlite_error_code() == Some(ErrorCode::DiskFull) {
            Self::CapacityExceeded(err.to_string())
        } else {
            Self::Db(err.to_string())
        }
    }

    /// Returns true for the store-full condition.
    #[must_use]
    pub const fn is_capacity_exceeded(&self) -> bool {
        matches!(self, Self::CapacityExceeded(_))
    }
}
