// crates/logsink-core/src/lib.rs
// ============================================================================
// Module: Logsink Core Library
// Description: Event model, batching front end, and sink diagnostics.
// Purpose: Shared types for log producers and persistence backends.
// Dependencies: serde, serde_json, thiserror, time
// ============================================================================

//! ## Overview
//! `logsink-core` defines what a log record is ([`LogEvent`]), how a
//! persistence backend receives records ([`BatchWriter`]), how records are
//! queued and batched on their way there ([`PeriodicBatcher`]), and how
//! backends report failures without crashing producers ([`DiagnosticSink`]).

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod batcher;
pub mod diagnostics;
pub mod event;
pub mod template;
pub mod writer;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use batcher::BatcherError;
pub use batcher::BatchingConfig;
pub use batcher::PeriodicBatcher;
pub use diagnostics::DiagnosticEvent;
pub use diagnostics::DiagnosticKind;
pub use diagnostics::DiagnosticSink;
pub use diagnostics::FileDiagnostics;
pub use diagnostics::MemoryDiagnostics;
pub use diagnostics::NoopDiagnostics;
pub use diagnostics::StderrDiagnostics;
pub use event::Level;
pub use event::LogEvent;
pub use event::PropertyValue;
pub use event::TIMESTAMP_FORMAT;
pub use event::format_timestamp;
pub use event::now_in_storage_clock;
pub use template::render_template;
pub use writer::BatchOutcome;
pub use writer::BatchWriter;
