// crates/logsink-core/src/writer.rs
// ============================================================================
// Module: Logsink Batch Writer Interface
// Description: The seam between batchers and persistence backends.
// Purpose: Define batch write outcomes and the writer contract.
// Dependencies: std
// ============================================================================

//! ## Overview
//! A [`BatchWriter`] persists one batch of events per call and reports a
//! [`BatchOutcome`]. Writers never return errors to the batcher: failures are
//! recorded on the diagnostic channel and surfaced as
//! [`BatchOutcome::Failed`], leaving redelivery decisions to the caller.
//! Invariants:
//! - A batch is written entirely or not at all.
//! - Empty batches succeed without touching storage.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;

use crate::event::LogEvent;

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Result of a single batch write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// The batch was empty; nothing was written.
    Empty,
    /// Every record was committed.
    Written {
        /// Rows committed.
        rows: usize,
    },
    /// The store filled up, was archived and emptied, and the batch was then
    /// committed to the fresh store.
    RolledOver {
        /// Rows committed after the rollover.
        rows: usize,
        /// Archive copy of the full store.
        archive: PathBuf,
    },
    /// The store was full and rollover is disabled; the batch was accepted
    /// but discarded.
    Dropped {
        /// Records discarded.
        records: usize,
    },
    /// The batch was not written.
    Failed {
        /// Failure description.
        error: String,
    },
}

impl BatchOutcome {
    /// Returns true when the batch should be considered delivered.
    ///
    /// [`BatchOutcome::Dropped`] counts as delivered: redelivering it would
    /// only hit the same full store again.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Returns true when records were accepted but not persisted.
    #[must_use]
    pub const fn is_dropped(&self) -> bool {
        matches!(self, Self::Dropped { .. })
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Persists batches of log events.
pub trait BatchWriter: Send + Sync {
    /// Writes one batch as a single all-or-nothing unit.
    fn write_batch(&self, events: &[LogEvent]) -> BatchOutcome;

    /// Releases background resources held by the writer.
    fn shutdown(&self) {}
}
