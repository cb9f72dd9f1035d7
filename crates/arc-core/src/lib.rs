// crates/arc-core/src/lib.rs
// ============================================================================
// Module: Arc Memory Core
// Description: Canonical graph schema, identity construction, and the shared
//              error taxonomy used across every Arc Memory crate.
// Purpose: Give every other crate a single, dependency-free vocabulary for
//          nodes, edges, identifiers, timestamps, and failure modes.
// Dependencies: serde, serde_json, sha2, md-5, time, thiserror
// ============================================================================

//! ## Overview
//! `arc-core` has no knowledge of SQLite, HTTP, or Git. It defines:
//! - the node/edge property-graph schema,
//! - deterministic identifier construction,
//! - timestamp normalization,
//! - canonical JSON hashing used to bind attestations and manifests to their
//!   inputs,
//! - the closed error taxonomy every crate reports through, and
//! - the backend-agnostic [`interfaces::GraphStore`] and
//!   [`interfaces::Ingestor`] contracts that every other crate implements or
//!   consumes.
//!
//! Every public type here is required to be cheap to clone and trivially
//! serializable: the graph substrate is a persistence boundary, not a
//! behavior-rich domain model.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::edge::Edge;
pub use core::edge::EdgeRel;
pub use core::error::ArcError;
pub use core::error::ArcErrorKind;
pub use core::hashing;
pub use core::hashing::HashAlgorithm;
pub use core::identifiers::NodeId;
pub use core::identifiers::RepoId;
pub use core::manifest::BuildManifest;
pub use core::manifest::IngestorStatus;
pub use core::manifest::IngestorSummary;
pub use core::node::Node;
pub use core::node::NodeSpecialized;
pub use core::node::NodeType;
pub use core::time::Clock;
pub use core::time::SystemClock;
pub use core::time::Timestamp;
pub use core::time::resolve_effective_timestamp;
pub use interfaces::GraphStore;
pub use interfaces::Ingestor;
pub use interfaces::IngestContext;
pub use interfaces::IngestOutput;
pub use interfaces::RepositoryRecord;
pub use interfaces::SourceConfig;
