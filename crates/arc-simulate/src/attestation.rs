// crates/arc-simulate/src/attestation.rs
// ============================================================================
// Module: Attestation
// Description: The tamper-evident record of one completed simulation run,
//              its append-only persistence, and its graph-store mutations.
// Purpose: Bind a simulation's risk score and explanation to the exact
//          manifest and diff that produced it.
// Dependencies: arc-core, serde, serde_json
// ============================================================================

//! ## Overview
//! An [`Attestation`] is written once per `sim_id` to
//! `<attest_dir>/<sim_id>.json` and never overwritten afterward (invariant 6:
//! simulation nodes are immutable; a re-run is a new `sim_id`, not a mutation
//! of an old one). [`write_attestation`] enforces that by refusing to write
//! over an existing file. [`build_mutations`] turns an attestation into the
//! `(Node, Edge)` pairs [`crate::workflow`] persists: a `simulation` node
//! linked via `SIMULATES` to its target commit, `HAS_METRIC`/`MEASURES` to
//! per-metric nodes, and `AFFECTS`/`PREDICTS` to the files and services the
//! causal graph implicated.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use arc_core::Edge;
use arc_core::EdgeRel;
use arc_core::Node;
use arc_core::NodeId;
use arc_core::NodeSpecialized;
use arc_core::NodeType;
use arc_core::Timestamp;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::manifest::Scenario;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Attestation persistence failures.
#[derive(Debug, Error)]
pub enum AttestationError {
    /// An attestation already exists for this `sim_id`; simulation records
    /// are append-only.
    #[error("attestation already exists for sim_id {0}")]
    AlreadyExists(String),
    /// The attestation directory or file could not be written.
    #[error("attestation io error: {0}")]
    Io(String),
    /// The attestation could not be serialized to JSON.
    #[error("attestation serialization error: {0}")]
    Serialize(String),
}

// ============================================================================
// SECTION: Attestation Record
// ============================================================================

/// The complete, tamper-evident record of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attestation {
    /// Opaque simulation identifier, also the node's ID payload.
    pub sim_id: String,
    /// Fault-injection scenario simulated.
    pub scenario: Scenario,
    /// Severity, `0..=100`.
    pub severity: u8,
    /// Source rev-range simulated.
    pub rev_range: String,
    /// Commit this run targets (the end point of `rev_range`).
    pub commit_target: String,
    /// Hex digest of the canonical fault manifest JSON.
    pub manifest_hash: String,
    /// Hex digest of the canonical diff JSON.
    pub diff_hash: String,
    /// Services the causal graph implicated.
    pub affected_services: Vec<String>,
    /// Files the diff touched.
    pub affected_files: Vec<String>,
    /// Metrics observed (or synthesized, on the mock path).
    pub metrics: BTreeMap<String, f64>,
    /// Whether `metrics` came from a live sandbox run.
    pub live: bool,
    /// Computed risk score, `0..=100`.
    pub risk_score: u8,
    /// Human-readable explanation of the predicted impact.
    pub explanation: String,
    /// When this attestation was generated.
    pub timestamp: Timestamp,
}

// ============================================================================
// SECTION: Persistence
// ============================================================================

/// Returns the path an attestation for `sim_id` is stored at under `dir`.
#[must_use]
pub fn attestation_path(dir: &Path, sim_id: &str) -> PathBuf {
    dir.join(format!("{sim_id}.json"))
}

/// Writes `attestation` to `<dir>/<sim_id>.json`.
///
/// # Errors
///
/// Returns [`AttestationError::AlreadyExists`] if a record for this
/// `sim_id` is already present, or [`AttestationError::Io`] /
/// [`AttestationError::Serialize`] on failure.
pub fn write_attestation(dir: &Path, attestation: &Attestation) -> Result<PathBuf, AttestationError> {
    fs::create_dir_all(dir).map_err(|e| AttestationError::Io(e.to_string()))?;
    let path = attestation_path(dir, &attestation.sim_id);
    if path.exists() {
        return Err(AttestationError::AlreadyExists(attestation.sim_id.clone()));
    }
    let bytes = serde_json::to_vec_pretty(attestation).map_err(|e| AttestationError::Serialize(e.to_string()))?;
    fs::write(&path, bytes).map_err(|e| AttestationError::Io(e.to_string()))?;
    Ok(path)
}

/// Reads a previously written attestation back from `<dir>/<sim_id>.json`.
///
/// # Errors
///
/// Returns [`AttestationError::Io`] if the file is missing or unreadable,
/// or [`AttestationError::Serialize`] if it does not parse.
pub fn read_attestation(dir: &Path, sim_id: &str) -> Result<Attestation, AttestationError> {
    let path = attestation_path(dir, sim_id);
    let bytes = fs::read(&path).map_err(|e| AttestationError::Io(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| AttestationError::Serialize(e.to_string()))
}

// ============================================================================
// SECTION: Graph Mutations
// ============================================================================

/// Builds the nodes and edges a completed [`Attestation`] contributes to the
/// graph: one `simulation` node, one `metric` node per observed metric, and
/// the `SIMULATES` / `HAS_METRIC` / `AFFECTS` / `PREDICTS` edges connecting
/// them to the commit, files, and services this run targeted.
#[must_use]
pub fn build_mutations(attestation: &Attestation) -> (Vec<Node>, Vec<Edge>) {
    let sim_id = NodeId::simulation(&attestation.sim_id);
    let mut nodes = Vec::new();
    let mut edges = Vec::new();

    nodes.push(
        Node::new(
            sim_id.clone(),
            NodeType::Simulation,
            NodeSpecialized::Simulation {
                sim_id: attestation.sim_id.clone(),
                rev_range: attestation.rev_range.clone(),
                scenario: attestation.scenario.as_str().to_string(),
                severity: attestation.severity,
                risk_score: attestation.risk_score,
                manifest_hash: attestation.manifest_hash.clone(),
                commit_target: attestation.commit_target.clone(),
                diff_hash: attestation.diff_hash.clone(),
                affected_services: attestation.affected_services.clone(),
            },
        )
        .with_title(format!("simulation {}", attestation.sim_id))
        .with_ts(attestation.timestamp),
    );

    edges.push(Edge::new(sim_id.clone(), NodeId::commit(&attestation.commit_target), EdgeRel::Simulates));

    for (name, value) in &attestation.metrics {
        let metric_id = NodeId::metric(&attestation.sim_id, name);
        nodes.push(Node::new(
            metric_id.clone(),
            NodeType::Metric,
            NodeSpecialized::Metric { name: name.clone(), value: *value, unit: None, service: None },
        ));
        edges.push(Edge::new(sim_id.clone(), metric_id, EdgeRel::Measures));
    }

    for path in &attestation.affected_files {
        edges.push(Edge::new(sim_id.clone(), NodeId::file(path), EdgeRel::Affects));
    }

    for service in &attestation.affected_services {
        let service_id = NodeId::service(service);
        edges.push(Edge::new(sim_id.clone(), service_id.clone(), EdgeRel::Affects));
        edges.push(Edge::new(sim_id.clone(), service_id, EdgeRel::Predicts));
    }

    (nodes, edges)
}
