// crates/logsink-store-sqlite/src/lib.rs
// ============================================================================
// Module: Logsink SQLite Store
// Description: Durable, size-bounded SQLite persistence for log batches.
// Purpose: Implement the batch writer contract on a single SQLite file.
// Dependencies: logsink-core, rusqlite, serde, thiserror, time
// ============================================================================

//! ## Overview
//! [`SqliteLogSink`] appends log batches to one table of a local `SQLite`
//! file. The file is capped at a configured size; when it fills up the sink
//! archives it beside the active path and starts over, or discards batches
//! when rollover is disabled. An optional retention period purges old rows on
//! a background schedule.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod connection;
pub mod error;
pub mod retention;
pub mod rollover;
pub mod schema;
pub mod sink;
pub mod writer;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::ColumnConfig;
pub use config::MAX_STORE_SIZE_MB;
pub use config::RetentionPolicy;
pub use config::SqliteSinkConfig;
pub use error::SqliteSinkError;
pub use rollover::archive_path;
pub use schema::ColumnSource;
pub use schema::InsertTemplate;
pub use schema::LogSchema;
pub use sink::SqliteLogSink;
