// crates/logsink-config/src/lib.rs
// ============================================================================
// Module: Logsink Config Library
// Description: Configuration loading and pipeline registration.
// Purpose: Load validated configuration and wire the log pipeline.
// Dependencies: logsink-core, logsink-store-sqlite, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Loads a [`LogSinkConfig`] from TOML with fail-closed validation and turns
//! it into a running [`LogPipeline`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod pipeline;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::ConfigError;
pub use config::DiagnosticsConfig;
pub use config::LogSinkConfig;
pub use pipeline::LogPipeline;
pub use pipeline::PipelineError;
pub use pipeline::build_diagnostics;
