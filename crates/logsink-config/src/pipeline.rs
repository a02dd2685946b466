// crates/logsink-config/src/pipeline.rs
// ============================================================================
// Module: Logsink Pipeline
// Description: Wiring of diagnostics, SQLite sink, and periodic batcher.
// Purpose: Turn a validated config into a running log pipeline.
// Dependencies: logsink-core, logsink-store-sqlite, thiserror
// ============================================================================

//! ## Overview
//! [`LogPipeline::build`] is the single registration entry point: it selects
//! the diagnostics destination, constructs the [`SqliteLogSink`], and starts a
//! [`PeriodicBatcher`] in front of it. Producers only call
//! [`LogPipeline::emit`]; shutting the pipeline down drains queued events and
//! stops the sink's retention thread.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use logsink_core::BatcherError;
use logsink_core::DiagnosticSink;
use logsink_core::FileDiagnostics;
use logsink_core::LogEvent;
use logsink_core::NoopDiagnostics;
use logsink_core::PeriodicBatcher;
use logsink_core::StderrDiagnostics;
use logsink_store_sqlite::SqliteLogSink;
use logsink_store_sqlite::SqliteSinkError;
use thiserror::Error;

use crate::config::DiagnosticsConfig;
use crate::config::LogSinkConfig;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Pipeline construction and control errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The diagnostics destination could not be opened.
    #[error("diagnostics error: {0}")]
    Diagnostics(String),
    /// The sink could not be constructed.
    #[error(transparent)]
    Sink(#[from] SqliteSinkError),
    /// The batcher could not be started or has shut down.
    #[error(transparent)]
    Batcher(#[from] BatcherError),
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// A running batcher feeding a `SQLite` sink.
pub struct LogPipeline {
    /// Producer-facing queue.
    batcher: PeriodicBatcher,
    /// Store writer behind the batcher.
    sink: Arc<SqliteLogSink>,
}

impl LogPipeline {
    /// Builds the pipeline with the configured diagnostics destination.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when any component fails to start.
    pub fn build(config: &LogSinkConfig) -> Result<Self, PipelineError> {
        let diagnostics = build_diagnostics(&config.diagnostics)?;
        Self::build_with_diagnostics(config, diagnostics)
    }

    /// Builds the pipeline reporting to an explicit diagnostics sink.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when any component fails to start.
    pub fn build_with_diagnostics(
        config: &LogSinkConfig,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, PipelineError> {
        let sink = Arc::new(SqliteLogSink::new(config.sink.clone(), Arc::clone(&diagnostics))?);
        let batcher = PeriodicBatcher::start(config.batching.clone(), sink.clone(), diagnostics)?;
        Ok(Self {
            batcher,
            sink,
        })
    }

    /// Enqueues an event; returns false when it was dropped.
    pub fn emit(&self, event: LogEvent) -> bool {
        self.batcher.emit(event)
    }

    /// Blocks until every queued event has been handed to the sink.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Batcher`] after shutdown.
    pub fn flush(&self) -> Result<(), PipelineError> {
        Ok(self.batcher.flush()?)
    }

    /// Returns the sink behind the batcher.
    #[must_use]
    pub fn sink(&self) -> &SqliteLogSink {
        &self.sink
    }

    /// Drains queued events and stops background threads. Idempotent.
    pub fn shutdown(&self) {
        self.batcher.shutdown();
    }
}

/// Selects the diagnostics sink for the configured destination.
///
/// # Errors
///
/// Returns [`PipelineError::Diagnostics`] when a diagnostics file cannot be
/// opened.
pub fn build_diagnostics(
    config: &DiagnosticsConfig,
) -> Result<Arc<dyn DiagnosticSink>, PipelineError> {
    match config {
        DiagnosticsConfig::None => Ok(Arc::new(NoopDiagnostics)),
        DiagnosticsConfig::Stderr => Ok(Arc::new(StderrDiagnostics)),
        DiagnosticsConfig::File {
            path,
        } => {
            let sink = FileDiagnostics::new(path)
                .map_err(|err| PipelineError::Diagnostics(err.to_string()))?;
            Ok(Arc::new(sink))
        }
    }
}
