// crates/arc-simulate/src/lib.rs
// ============================================================================
// Module: Arc Memory Simulation Workflow
// Description: Fault-injection simulation: diff extraction, causal scoping,
//              manifest generation, sandbox execution, risk scoring,
//              explanation, and tamper-evident attestation.
// Purpose: Answer "what will this change break, and how badly" before it
//          ships, backed by a reproducible, replayable record.
// Dependencies: arc-causal, arc-config, arc-core, arc-query, git2, rand,
//               serde, serde_json, serde_yaml, thiserror, time, tracing
// ============================================================================

//! ## Overview
//! A simulation run moves through a fixed pipeline:
//!
//! 1. [`diff::extract_diff`] turns a rev-range into a [`diff::DiffRecord`].
//! 2. [`arc_causal::derive_causal_graph`] plus
//!    [`arc_causal::CausalGraph::scoped_to_files`] restrict the graph to
//!    the diff's blast radius.
//! 3. [`manifest::generate_manifest`] builds the declarative
//!    [`manifest::FaultManifest`] and [`manifest::manifest_hash`] binds it
//!    to a reproducible digest.
//! 4. A [`sandbox::SandboxBackend`] executes the manifest, synthetically
//!    via [`sandbox::MockSandboxBackend`], or for real via
//!    [`sandbox::ProcessSandboxBackend`]'s `docker` CLI calls.
//! 5. [`risk::compute_risk_score`] reduces severity and observed metrics to
//!    a single score.
//! 6. [`arc_query::enhance_explanation`] appends historical context from
//!    similar past runs.
//! 7. [`attestation::write_attestation`] persists the tamper-evident,
//!    append-only record, and [`attestation::build_mutations`] turns it
//!    into the nodes and edges [`workflow::run_simulation_workflow`] writes
//!    to the graph store.
//!
//! [`workflow::run_simulation_workflow`] is the single entry point driving
//! all seven steps; every external effect (the clock, the sandbox, the
//! store) is passed in rather than read ambiently, so the whole pipeline
//! runs deterministically under test.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod attestation;
pub mod diff;
pub mod manifest;
pub mod risk;
pub mod sandbox;
pub mod workflow;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use attestation::Attestation;
pub use attestation::AttestationError;
pub use diff::DiffError;
pub use diff::DiffRecord;
pub use diff::FileChange;
pub use diff::FileStatus;
pub use manifest::FaultManifest;
pub use manifest::ManifestIoError;
pub use manifest::Scenario;
pub use manifest::list_available_scenarios;
pub use manifest::load_manifest_from_path;
pub use manifest::save_manifest_to_path;
pub use risk::compute_risk_score;
pub use sandbox::MockSandboxBackend;
pub use sandbox::ProcessSandboxBackend;
pub use sandbox::SandboxBackend;
pub use sandbox::SandboxOutcome;
pub use workflow::SimulationOutcome;
pub use workflow::SimulationRequest;
pub use workflow::WorkflowError;
pub use workflow::WorkflowState;
pub use workflow::derive_sim_id;
pub use workflow::run_simulation_workflow;
