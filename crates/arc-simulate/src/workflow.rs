// crates/arc-simulate/src/workflow.rs
// ============================================================================
// Module: Simulation Workflow
// Description: The end-to-end state machine that turns a rev-range and
//              scenario into a persisted, attested simulation run.
// Purpose: Tie diff extraction, causal scoping, manifest generation, sandbox
//          execution, risk scoring, explanation, and persistence into one
//          linear pipeline with explicit cancellation semantics.
// Dependencies: arc-causal, arc-config, arc-core, arc-query
// ============================================================================

//! ## Overview
//! [`run_simulation_workflow`] executes states `extract_diff ->
//! analyze_changes -> build_causal_graph -> generate_manifest ->
//! run_simulation -> generate_explanation -> generate_attestation ->
//! persist`, in that order, advancing [`WorkflowState`] from `InProgress`
//! to `Completed` or `Failed`. An empty diff short-circuits after
//! `analyze_changes` with a zero risk score and no sandbox run. A
//! [`Clock`] and wall-clock [`Instant`] deadline are both taken as
//! parameters rather than read ambiently, so the whole pipeline is
//! deterministic and testable without a real clock or sandbox.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::time::Instant;

use arc_config::SimulationConfig;
use arc_core::ArcError;
use arc_core::ArcErrorKind;
use arc_core::Clock;
use arc_core::Timestamp;
use arc_core::interfaces::GraphStore;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::attestation::Attestation;
use crate::attestation::AttestationError;
use crate::attestation::build_mutations;
use crate::attestation::write_attestation;
use crate::diff::DiffError;
use crate::diff::DiffRecord;
use crate::diff::extract_diff;
use crate::manifest::FaultManifest;
use crate::manifest::Scenario;
use crate::manifest::generate_manifest;
use crate::manifest::manifest_hash;
use crate::risk::compute_risk_score;
use crate::sandbox::SandboxBackend;
use crate::sandbox::deadline_from_timeout_ms;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Simulation workflow failures, convertible to [`ArcError`] at the crate
/// boundary so callers can branch on [`arc_core::ArcErrorKind`] uniformly.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Diff extraction failed.
    #[error("diff extraction failed: {0}")]
    Diff(#[from] DiffError),
    /// The requested scenario name is not in the closed enumeration.
    #[error("unknown scenario: {0}")]
    UnknownScenario(String),
    /// A graph store read or write failed.
    #[error("store error: {0}")]
    Store(String),
    /// The sandbox backend failed.
    #[error("sandbox error: {0}")]
    Sandbox(ArcError),
    /// Attestation persistence failed.
    #[error("attestation error: {0}")]
    Attestation(#[from] AttestationError),
    /// The workflow's deadline elapsed before completion.
    #[error("simulation cancelled: deadline elapsed during {0}")]
    Cancelled(&'static str),
}

impl From<WorkflowError> for ArcError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Cancelled(stage) => ArcError::new(ArcErrorKind::Cancelled, format!("cancelled during {stage}")),
            WorkflowError::Sandbox(inner) => inner,
            other => ArcError::new(ArcErrorKind::Sandbox, other.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Request / Outcome
// ============================================================================

/// One simulation run's inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    /// Filesystem path to the repository being simulated against.
    pub repo_path: String,
    /// Rev-range to diff (e.g. `HEAD~1..HEAD`).
    pub rev_range: String,
    /// Fault scenario's wire name (validated against [`Scenario`]).
    pub scenario: String,
    /// Severity, `0..=100`.
    pub severity: u8,
    /// Caller-supplied explanation seed; the causal summary is appended to
    /// it rather than replacing it.
    pub explanation: Option<String>,
    /// A pre-extracted diff to use instead of re-deriving one from
    /// `repo_path`/`rev_range`, for replaying a previously captured run.
    pub diff_path: Option<PathBuf>,
}

/// Derives a `sim_id` from a rev-range by replacing every character outside
/// `[A-Za-z0-9_-]` with `_`. Two runs over the same rev-range therefore
/// collide on the same `sim_id`; re-running an unchanged range is rejected
/// by [`write_attestation`]'s append-only check rather than silently
/// producing a second record for it.
#[must_use]
pub fn derive_sim_id(rev_range: &str) -> String {
    rev_range
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

/// The workflow's linear progress through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// Running; has not yet reached a terminal state.
    InProgress,
    /// Finished successfully; an attestation was written and persisted.
    Completed,
    /// Finished with an error; no attestation was written.
    Failed,
}

/// Result of one [`run_simulation_workflow`] call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutcome {
    /// Terminal state reached.
    pub status: WorkflowState,
    /// The written attestation, present only when `status` is `Completed`.
    pub attestation: Option<Attestation>,
    /// Human-readable failure message, present only when `status` is
    /// `Failed`.
    pub error: Option<String>,
}

// ============================================================================
// SECTION: Workflow
// ============================================================================

/// Runs the full simulation pipeline for `request`.
///
/// On any failure, the pipeline stops immediately, no attestation is
/// written, and a [`SimulationOutcome`] with `status: Failed` is returned.
/// this function does not itself return `Err`; failures are reported in the
/// outcome so callers always get a value to persist or report, matching the
/// state-machine's own `failed` terminal state.
#[instrument(skip(store, sandbox, config, clock), fields(rev_range = %request.rev_range, scenario = %request.scenario))]
#[allow(clippy::too_many_arguments, reason = "each parameter is an independently injected seam (store, sandbox, clock, deadline)")]
pub fn run_simulation_workflow(
    store: &mut dyn GraphStore,
    sandbox: &dyn SandboxBackend,
    attest_dir: &Path,
    config: &SimulationConfig,
    request: &SimulationRequest,
    clock: &dyn Clock,
) -> SimulationOutcome {
    let deadline = deadline_from_timeout_ms(config.timeout_ms);
    match run_inner(store, sandbox, attest_dir, config, request, clock, deadline) {
        Ok(attestation) => SimulationOutcome { status: WorkflowState::Completed, attestation: Some(attestation), error: None },
        Err(err) => {
            warn!(error = %err, "simulation workflow failed");
            SimulationOutcome { status: WorkflowState::Failed, attestation: None, error: Some(err.to_string()) }
        }
    }
}

#[allow(clippy::too_many_arguments, reason = "mirrors run_simulation_workflow's injected seams")]
fn run_inner(
    store: &mut dyn GraphStore,
    sandbox: &dyn SandboxBackend,
    attest_dir: &Path,
    config: &SimulationConfig,
    request: &SimulationRequest,
    clock: &dyn Clock,
    deadline: Instant,
) -> Result<Attestation, WorkflowError> {
    let now = clock.now();
    let sim_id = derive_sim_id(&request.rev_range);

    // extract_diff
    let diff = load_diff(request, now)?;

    if Instant::now() >= deadline {
        return Err(WorkflowError::Cancelled("extract_diff"));
    }

    // analyze_changes: empty diff short-circuits with a zero-risk attestation.
    if diff.is_empty() {
        info!("empty diff, short-circuiting with zero risk score");
        let attestation = Attestation {
            sim_id: sim_id.clone(),
            scenario: parse_scenario(&request.scenario)?,
            severity: request.severity,
            rev_range: diff.range.clone(),
            commit_target: diff.end_commit.clone(),
            manifest_hash: String::new(),
            diff_hash: diff_hash_hex(&diff)?,
            affected_services: Vec::new(),
            affected_files: Vec::new(),
            metrics: std::collections::BTreeMap::new(),
            live: false,
            risk_score: 0,
            explanation: "No files changed in this range; nothing to simulate.".to_string(),
            timestamp: now,
        };
        return persist(store, attest_dir, attestation);
    }

    // build_causal_graph
    let repo_id = store.ensure_repository(&request.repo_path, None).map_err(|e| WorkflowError::Store(e.to_string()))?;
    let full_graph = arc_causal::derive_causal_graph(store, Some(std::slice::from_ref(&repo_id))).map_err(|e| WorkflowError::Store(e.to_string()))?;
    let scope: Vec<String> = diff.files.iter().map(|f| f.path.clone()).collect();
    let scoped_graph = full_graph.scoped_to_files(&scope);
    let affected_services = scoped_graph.known_services().clone();

    if Instant::now() >= deadline {
        return Err(WorkflowError::Cancelled("build_causal_graph"));
    }

    // generate_manifest
    let scenario = parse_scenario(&request.scenario)?;
    let manifest = generate_manifest(&diff, &affected_services, scenario, request.severity);
    let manifest_digest = manifest_hash(&manifest).map_err(|e| WorkflowError::Sandbox(ArcError::new(ArcErrorKind::Sandbox, e.to_string())))?;

    if Instant::now() >= deadline {
        return Err(WorkflowError::Cancelled("generate_manifest"));
    }

    // run_simulation
    let outcome = sandbox.run(&manifest, now, deadline).map_err(WorkflowError::Sandbox)?;
    let risk_score = compute_risk_score(request.severity, &outcome.metrics, outcome.live);

    // generate_explanation
    let explanation = build_explanation(store, request, &manifest, risk_score, outcome.live)?;

    // generate_attestation
    let attestation = Attestation {
        sim_id,
        scenario,
        severity: request.severity,
        rev_range: diff.range.clone(),
        commit_target: diff.end_commit.clone(),
        manifest_hash: manifest_digest.hex,
        diff_hash: diff_hash_hex(&diff)?,
        affected_services: manifest.affected_services.clone(),
        affected_files: manifest.affected_files.clone(),
        metrics: outcome.metrics,
        live: outcome.live,
        risk_score,
        explanation,
        timestamp: now,
    };

    persist(store, attest_dir, attestation)
}

fn load_diff(request: &SimulationRequest, now: Timestamp) -> Result<DiffRecord, WorkflowError> {
    if let Some(path) = &request.diff_path {
        return DiffRecord::load_from_path(path).map_err(WorkflowError::Diff);
    }
    extract_diff(&request.repo_path, &request.rev_range, now).map_err(WorkflowError::Diff)
}

fn parse_scenario(raw: &str) -> Result<Scenario, WorkflowError> {
    Scenario::from_str_relaxed(raw).ok_or_else(|| WorkflowError::UnknownScenario(raw.to_string()))
}

fn diff_hash_hex(diff: &DiffRecord) -> Result<String, WorkflowError> {
    arc_core::hashing::hash_canonical_json(arc_core::HashAlgorithm::Sha256, &diff.canonical_value())
        .map(|d| d.hex)
        .map_err(|e| WorkflowError::Sandbox(ArcError::new(ArcErrorKind::Sandbox, e.to_string())))
}

fn build_explanation(
    store: &dyn GraphStore,
    request: &SimulationRequest,
    manifest: &FaultManifest,
    risk_score: u8,
    live: bool,
) -> Result<String, WorkflowError> {
    let base = request.explanation.clone().unwrap_or_else(|| {
        format!(
            "Simulating {} at severity {} against {} service(s): predicted risk score {risk_score}{}.",
            manifest.scenario.as_str(),
            manifest.severity,
            manifest.affected_services.len(),
            if live { "" } else { " (mock run, no live sandbox)" }
        )
    });

    let context = arc_query::EnhancementContext {
        affected_services: manifest.affected_services.iter().cloned().collect(),
        scenario: Some(manifest.scenario.as_str().to_string()),
        sample_size: arc_query::EnhancementContext::DEFAULT_SAMPLE_SIZE,
    };
    arc_query::enhance_explanation(&base, &context, store).map_err(|e| WorkflowError::Store(e.to_string()))
}

fn persist(store: &mut dyn GraphStore, attest_dir: &Path, attestation: Attestation) -> Result<Attestation, WorkflowError> {
    write_attestation(attest_dir, &attestation)?;
    let (nodes, edges) = build_mutations(&attestation);
    store.add_nodes_and_edges(&nodes, &edges).map_err(|e| WorkflowError::Store(e.to_string()))?;
    Ok(attestation)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::process::Command;
    use std::time::Duration;
    use std::time::Instant;

    use arc_config::SimulationConfig;
    use arc_core::Clock;
    use arc_core::Timestamp;
    use arc_core::interfaces::GraphStore;
    use tempfile::TempDir;

    use super::SimulationRequest;
    use super::WorkflowState;
    use super::run_simulation_workflow;
    use crate::sandbox::MockSandboxBackend;
    use crate::sandbox::SandboxOutcome;
    use crate::sandbox::SandboxBackend;
    use crate::manifest::FaultManifest;

    struct FixedClock(i64);
    impl Clock for FixedClock {
        fn now(&self) -> Timestamp {
            Timestamp::from_unix_millis(self.0)
        }
    }

    struct FailingSandbox;
    impl SandboxBackend for FailingSandbox {
        fn run(&self, _manifest: &FaultManifest, _now: Timestamp, _deadline: Instant) -> Result<SandboxOutcome, arc_core::ArcError> {
            Err(arc_core::ArcError::new(arc_core::ArcErrorKind::Sandbox, "boom"))
        }
    }

    fn init_repo() -> TempDir {
        let dir = TempDir::new().expect("tempdir");
        let run = |args: &[&str]| {
            let status = Command::new("git").args(args).current_dir(dir.path()).status().expect("run git");
            assert!(status.success());
        };
        run(&["init", "-q"]);
        run(&["config", "user.email", "a@example.com"]);
        run(&["config", "user.name", "Alice"]);
        std::fs::write(dir.path().join("checkout.py"), "one\n").expect("write");
        run(&["add", "checkout.py"]);
        run(&["commit", "-q", "-m", "first"]);
        std::fs::write(dir.path().join("checkout.py"), "one\ntwo\n").expect("write");
        run(&["add", "checkout.py"]);
        run(&["commit", "-q", "-m", "second"]);
        dir
    }

    fn in_memory_store() -> arc_store_sqlite::SqliteStore {
        let mut store = arc_store_sqlite::SqliteStore::open_in_memory().expect("open store");
        store.init_schema().expect("init schema");
        store
    }

    fn request(repo: &TempDir) -> SimulationRequest {
        SimulationRequest {
            repo_path: repo.path().to_string_lossy().to_string(),
            rev_range: "HEAD~1..HEAD".to_string(),
            scenario: "network_latency".to_string(),
            severity: 50,
            explanation: None,
            diff_path: None,
        }
    }

    #[test]
    fn completed_run_writes_attestation_with_mock_backend() {
        let repo = init_repo();
        let mut store = in_memory_store();
        let dir = TempDir::new().expect("attest dir");
        let config = SimulationConfig::default();
        let clock = FixedClock(0);
        let sandbox = MockSandboxBackend;

        let outcome = run_simulation_workflow(&mut store, &sandbox, dir.path(), &config, &request(&repo), &clock);

        assert_eq!(outcome.status, WorkflowState::Completed);
        let attestation = outcome.attestation.expect("attestation present");
        assert_eq!(attestation.risk_score, 25);
        assert_eq!(attestation.metrics.get("latency_ms"), Some(&500.0));
        assert_eq!(attestation.metrics.get("error_rate"), Some(&0.05));
    }

    #[test]
    fn sandbox_failure_yields_failed_status_with_no_attestation() {
        let repo = init_repo();
        let mut store = in_memory_store();
        let dir = TempDir::new().expect("attest dir");
        let config = SimulationConfig::default();
        let clock = FixedClock(0);
        let sandbox = FailingSandbox;

        let outcome = run_simulation_workflow(&mut store, &sandbox, dir.path(), &config, &request(&repo), &clock);

        assert_eq!(outcome.status, WorkflowState::Failed);
        assert!(outcome.attestation.is_none());
        assert!(outcome.error.is_some());
    }

    #[test]
    fn empty_rev_range_short_circuits_with_zero_risk() {
        let repo = init_repo();
        let mut store = in_memory_store();
        let dir = TempDir::new().expect("attest dir");
        let config = SimulationConfig::default();
        let clock = FixedClock(0);
        let sandbox = MockSandboxBackend;
        let mut req = request(&repo);
        req.rev_range = "HEAD..HEAD".to_string();

        let outcome = run_simulation_workflow(&mut store, &sandbox, dir.path(), &config, &req, &clock);

        assert_eq!(outcome.status, WorkflowState::Completed);
        let attestation = outcome.attestation.expect("attestation present");
        assert_eq!(attestation.risk_score, 0);
        assert!(attestation.affected_files.is_empty());
    }

    #[test]
    fn unknown_scenario_fails_without_running_sandbox() {
        let repo = init_repo();
        let mut store = in_memory_store();
        let dir = TempDir::new().expect("attest dir");
        let config = SimulationConfig::default();
        let clock = FixedClock(0);
        let sandbox = FailingSandbox;
        let mut req = request(&repo);
        req.scenario = "bogus_scenario".to_string();

        let outcome = run_simulation_workflow(&mut store, &sandbox, dir.path(), &config, &req, &clock);

        assert_eq!(outcome.status, WorkflowState::Failed);
    }

    #[test]
    fn rewriting_same_sim_id_fails_on_second_run() {
        let repo = init_repo();
        let mut store = in_memory_store();
        let dir = TempDir::new().expect("attest dir");
        let config = SimulationConfig::default();
        let clock = FixedClock(0);
        let sandbox = MockSandboxBackend;
        let req = request(&repo);

        let first = run_simulation_workflow(&mut store, &sandbox, dir.path(), &config, &req, &clock);
        assert_eq!(first.status, WorkflowState::Completed);

        let second = run_simulation_workflow(&mut store, &sandbox, dir.path(), &config, &req, &clock);
        assert_eq!(second.status, WorkflowState::Failed);
    }
}
