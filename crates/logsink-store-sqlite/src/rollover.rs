// crates/logsink-store-sqlite/src/rollover.rs
// ============================================================================
// Module: SQLite Sink Rollover
// Description: Archive-and-reset handling for a full store.
// Purpose: Preserve a full store as a sibling file and empty the active one.
// Dependencies: rusqlite, time
// ============================================================================

//! ## Overview
//! When the active store fills up, its file is copied verbatim to a sibling
//! named `<stem>-<yyyyMMdd_HHmmss.ff><ext>` and the active table is emptied
//! and compacted in place. Archives are write-once: this crate never reads,
//! reopens, or deletes them. Two rollovers within the same hundredth of a
//! second overwrite the same archive name.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use rusqlite::Connection;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::error::SqliteSinkError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Archive suffix layout (`yyyyMMdd_HHmmss.ff`).
const ARCHIVE_SUFFIX_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[year][month][day]_[hour][minute][second].[subsecond digits:2]"
);

// ============================================================================
// SECTION: Archive
// ============================================================================

/// Returns the archive path for `active` stamped at `at`.
///
/// # Errors
///
/// Returns [`SqliteSinkError::Config`] when `active` has no file name, or
/// [`SqliteSinkError::Invalid`] when the stamp cannot be formatted.
pub fn archive_path(active: &Path, at: OffsetDateTime) -> Result<PathBuf, SqliteSinkError> {
    let stem = active
        .file_stem()
        .ok_or_else(|| SqliteSinkError::Config("store path has no file name".to_string()))?
        .to_string_lossy();
    let extension =
        active.extension().map(|ext| format!(".{}", ext.to_string_lossy())).unwrap_or_default();
    let suffix =
        at.format(ARCHIVE_SUFFIX_FORMAT).map_err(|err| SqliteSinkError::Invalid(err.to_string()))?;
    Ok(active.with_file_name(format!("{stem}-{suffix}{extension}")))
}

/// Copies the active store to its archive path and returns that path.
///
/// # Errors
///
/// Returns [`SqliteSinkError::Io`] when the copy fails.
pub fn archive_store(active: &Path, at: OffsetDateTime) -> Result<PathBuf, SqliteSinkError> {
    let archive = archive_path(active, at)?;
    fs::copy(active, &archive).map_err(|err| SqliteSinkError::Io(err.to_string()))?;
    Ok(archive)
}

/// Deletes every row from `table` and compacts the file.
///
/// # Errors
///
/// Returns [`SqliteSinkError`] when the delete or compaction fails.
pub fn reset_store(connection: &Connection, table: &str) -> Result<(), SqliteSinkError> {
    connection
        .execute_batch(&format!("DELETE FROM {table}; VACUUM;"))
        .map_err(|err| SqliteSinkError::from_db(&err))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
