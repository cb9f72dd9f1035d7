// crates/arc-config/src/lib.rs
// ============================================================================
// Module: Arc Memory Config
// Description: Canonical configuration model, TOML load, and validation.
// Purpose: Give every other crate one place to resolve the arc directory,
//          active repositories, per-ingestor source configuration, sandbox
//          backend selection, simulation timeout, and logging verbosity.
// Dependencies: arc-core, serde, serde_json, toml, thiserror
// ============================================================================

//! ## Overview
//! [`ArcConfig`] is deserialized from TOML and then validated once via
//! [`ArcConfig::validate`]: unknown keys are ignored by `serde`'s normal
//! behavior, but a missing *required* key for an *enabled* ingestor is a
//! [`ConfigError::MissingRequiredKey`] raised before any network call is
//! attempted, via one explicit `validate()` call after deserialization
//! rather than validating field-by-field during `Deserialize`.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod error;
mod ingestors;
mod model;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use error::ConfigError;
pub use ingestors::AdrConfig;
pub use ingestors::CodeHostingConfig;
pub use ingestors::DocPlatformConfig;
pub use ingestors::GitConfig;
pub use ingestors::IngestorToggle;
pub use ingestors::IngestorsConfig;
pub use ingestors::TicketingConfig;
pub use model::ArcConfig;
pub use model::LogVerbosity;
pub use model::SandboxBackend;
pub use model::SimulationConfig;
