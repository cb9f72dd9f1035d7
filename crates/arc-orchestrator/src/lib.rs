// crates/arc-orchestrator/src/lib.rs
// ============================================================================
// Module: Build Orchestrator
// Description: Plugin registry, per-ingestor scheduling, and incremental
//              build-manifest bookkeeping.
// Purpose: The single writer through which every ingestor's output is
//          merged into the graph store, so the store never has to reason
//          about concurrent writers.
// Dependencies: arc-config, arc-core, arc-ingest, arc-store-sqlite, rayon
// ============================================================================

//! ## Overview
//! [`BuildOrchestrator`] owns a registry of named [`Ingestor`]
//! implementations, built through [`BuildOrchestratorBuilder`]. A call to
//! [`BuildOrchestrator::run`] loads the prior repository's
//! [`BuildManifest`] (when the request is incremental), runs every
//! *enabled* ingestor, each given the cursor it wrote on its previous run,
//! and merges each ingestor's `(nodes, edges)` into the store one at a
//! time. Ingestors with no network dependency on each other run
//! concurrently; the merge-and-commit step is always sequential, so the
//! store sees one writer. A single ingestor failing does not abort the
//! build: its summary is recorded as `failed` and the remaining ingestors
//! still run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Instant;

use arc_config::IngestorsConfig;
use arc_core::BuildManifest;
use arc_core::GraphStore;
use arc_core::Ingestor;
use arc_core::IngestorStatus;
use arc_core::IngestorSummary;
use arc_core::NodeType;
use arc_core::RepoId;
use arc_core::SourceConfig;
use arc_core::SystemClock;
use arc_core::Timestamp;
use arc_core::interfaces::IngestContext;
use arc_core::interfaces::IngestOutput;
use arc_core::interfaces::StoreError;
use serde_json::Value;
use thiserror::Error;
use tracing::info;
use tracing::instrument;
use tracing::warn;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors the orchestrator itself can raise, distinct from a single
/// ingestor's failure (which is recorded in its [`IngestorSummary`] instead
/// of aborting the build).
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The graph store rejected a merge-and-commit write.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// The persisted build manifest could not be deserialized.
    #[error("corrupt build manifest: {0}")]
    CorruptManifest(String),
}

fn manifest_metadata_key(repo_id: &RepoId) -> String {
    format!("build_manifest:{}", repo_id.as_str())
}

// ============================================================================
// SECTION: Registry Builder
// ============================================================================

/// Builder for a [`BuildOrchestrator`]'s plugin registry.
///
/// # Invariants
/// - Registrations are keyed by [`Ingestor::name`]; a later registration
///   for the same name overwrites the earlier one.
#[derive(Default)]
pub struct BuildOrchestratorBuilder {
    ingestors: BTreeMap<String, Arc<dyn Ingestor + Send + Sync>>,
}

impl BuildOrchestratorBuilder {
    /// Registers an ingestor under its own [`Ingestor::name`].
    #[must_use]
    pub fn ingestor(mut self, ingestor: impl Ingestor + Send + Sync + 'static) -> Self {
        self.ingestors.insert(ingestor.name().to_string(), Arc::new(ingestor));
        self
    }

    /// Builds the orchestrator.
    #[must_use]
    pub fn build(self) -> BuildOrchestrator {
        BuildOrchestrator {
            ingestors: self.ingestors,
        }
    }
}

// ============================================================================
// SECTION: Build Request / Result
// ============================================================================

/// Inputs for one build pass.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Filesystem path to the repository, passed through to every ingestor
    /// that needs one (`git`, `adr`).
    pub repo_path: Option<String>,
    /// Repository this build is scoped to.
    pub repo_id: RepoId,
    /// Per-ingestor enable flags and typed configuration.
    pub ingestors: IngestorsConfig,
    /// Whether to resume from the previously persisted manifest. A cold
    /// build (`false`) ignores any prior cursors and passes every ingestor
    /// an empty `last_processed`.
    pub incremental: bool,
}

/// Outcome of one build pass.
#[derive(Debug, Clone)]
pub struct BuildResult {
    /// One summary per ingestor that was registered and enabled, plus a
    /// `skipped` summary for every registered-but-disabled ingestor.
    pub ingestor_summaries: Vec<IngestorSummary>,
    /// Total nodes committed to the store across every ingestor this run.
    pub total_nodes_added: u64,
    /// Total edges committed to the store across every ingestor this run.
    pub total_edges_added: u64,
    /// The manifest persisted at the end of this build.
    pub build_manifest: BuildManifest,
}

/// One ingestor's raw run outcome, prior to being merged into the store.
struct RunOutcome {
    name: String,
    duration_ms: u64,
    result: Result<IngestOutput, arc_core::ArcError>,
}

// ============================================================================
// SECTION: Build Orchestrator
// ============================================================================

/// Runs every enabled ingestor for a repository and merges their output
/// into a [`GraphStore`] through a single writer.
pub struct BuildOrchestrator {
    ingestors: BTreeMap<String, Arc<dyn Ingestor + Send + Sync>>,
}

impl BuildOrchestrator {
    /// Returns a builder for the plugin registry.
    #[must_use]
    pub fn builder() -> BuildOrchestratorBuilder {
        BuildOrchestratorBuilder::default()
    }

    /// Runs one build pass against `store`.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] when the prior manifest is corrupt or
    /// the store itself rejects the final manifest write. Individual
    /// ingestor failures never surface here; they are recorded as `failed`
    /// summaries in the returned [`BuildResult`] instead.
    #[instrument(skip(self, store, request), fields(repo_id = %request.repo_id.as_str()))]
    pub fn run(&self, store: &mut dyn GraphStore, request: &BuildRequest) -> Result<BuildResult, OrchestratorError> {
        let mut manifest = self.load_manifest(store, request)?;

        let plan = self.build_plan(request, &manifest);
        let outcomes = run_ingestors_concurrently(&plan);

        let mut total_nodes_added = 0u64;
        let mut total_edges_added = 0u64;

        for outcome in outcomes {
            let summary = self.merge_outcome(store, outcome, &mut total_nodes_added, &mut total_edges_added);
            manifest.record(summary);
        }

        for (name, ingestor) in &self.ingestors {
            if plan.iter().any(|(scheduled, _, _)| scheduled == name) {
                continue;
            }
            info!(ingestor = %name, "ingestor disabled, recording as skipped");
            manifest.record(skipped_summary(name, ingestor.as_ref()));
        }

        manifest.built_at = SystemClock.now();
        manifest.node_count = store.node_count()?;
        manifest.edge_count = store.edge_count()?;
        store.save_metadata(&manifest_metadata_key(&request.repo_id), &serde_json::to_value(&manifest).unwrap_or(Value::Null))?;

        Ok(BuildResult {
            ingestor_summaries: manifest.summaries.clone(),
            total_nodes_added,
            total_edges_added,
            build_manifest: manifest,
        })
    }

    fn load_manifest(&self, store: &dyn GraphStore, request: &BuildRequest) -> Result<BuildManifest, OrchestratorError> {
        if !request.incremental {
            return Ok(BuildManifest::new(request.repo_id.as_str(), SystemClock.now()));
        }
        match store.get_metadata(&manifest_metadata_key(&request.repo_id), None)? {
            Some(value) => serde_json::from_value(value).map_err(|err| OrchestratorError::CorruptManifest(err.to_string())),
            None => Ok(BuildManifest::new(request.repo_id.as_str(), SystemClock.now())),
        }
    }

    /// Resolves each enabled, registered ingestor to its
    /// `(source_config, last_processed)` inputs, deterministically ordered
    /// with `git` first (the only dependency-free ingestor every other
    /// plugin's commit-SHA references implicitly assume has already run).
    fn build_plan(&self, request: &BuildRequest, manifest: &BuildManifest) -> Vec<(String, Arc<dyn Ingestor + Send + Sync>, IngestContext)> {
        let mut names: Vec<&String> = self.ingestors.keys().collect();
        names.sort_by_key(|name| (name.as_str() != "git", name.as_str()));

        names
            .into_iter()
            .filter(|name| request.ingestors.enabled.is_enabled(name))
            .filter_map(|name| {
                let ingestor = Arc::clone(self.ingestors.get(name)?);
                let source_config = source_config_for(name, request)?;
                let last_processed = if request.incremental {
                    cursor_for(name, manifest)
                } else {
                    BTreeMap::new()
                };
                let ctx = IngestContext {
                    repo_path: request.repo_path.clone(),
                    repo_id: request.repo_id.clone(),
                    source_config: Some(source_config),
                    last_processed,
                };
                Some((name.clone(), ingestor, ctx))
            })
            .collect()
    }

    fn merge_outcome(
        &self,
        store: &mut dyn GraphStore,
        outcome: RunOutcome,
        total_nodes_added: &mut u64,
        total_edges_added: &mut u64,
    ) -> IngestorSummary {
        match outcome.result {
            Ok(output) => self.commit_output(store, &outcome.name, output, outcome.duration_ms, total_nodes_added, total_edges_added),
            Err(err) => {
                warn!(ingestor = %outcome.name, error = %err, "ingestor run failed");
                IngestorSummary::failed(outcome.name, err.message, outcome.duration_ms)
            }
        }
    }

    fn commit_output(
        &self,
        store: &mut dyn GraphStore,
        name: &str,
        output: IngestOutput,
        duration_ms: u64,
        total_nodes_added: &mut u64,
        total_edges_added: &mut u64,
    ) -> IngestorSummary {
        let nodes_emitted = output.nodes.len() as u64;
        let edges_emitted = output.edges.len() as u64;

        match store.add_nodes_and_edges(&output.nodes, &output.edges) {
            Ok(()) => {
                *total_nodes_added += nodes_emitted;
                *total_edges_added += edges_emitted;
                let cursor = serde_json::to_string(&output.new_last_processed).ok();
                let mut summary = IngestorSummary::success(name, nodes_emitted, edges_emitted, duration_ms);
                if let Some(cursor) = cursor {
                    summary = summary.with_cursor(cursor);
                }
                for partial_error in output.partial_errors {
                    summary = summary.with_partial_error(partial_error);
                }
                summary
            }
            Err(err) => {
                warn!(ingestor = %name, error = %err, "store rejected ingestor output");
                IngestorSummary::failed(name, err.to_string(), duration_ms)
            }
        }
    }
}

fn skipped_summary(name: &str, ingestor: &(dyn Ingestor + Send + Sync)) -> IngestorSummary {
    let _ = ingestor;
    IngestorSummary {
        name: name.to_string(),
        status: IngestorStatus::Skipped,
        nodes_emitted: 0,
        edges_emitted: 0,
        errors: Vec::new(),
        duration_ms: 0,
        next_cursor: None,
    }
}

/// Deserializes the `last_processed` map an ingestor wrote on its previous
/// run back out of the manifest's opaque cursor string for `name`, so it can
/// be handed back to that ingestor unchanged. Returns an empty map when the
/// ingestor has never run, or if a cursor is present but no longer parses
/// (a schema change downstream of the ingestor should not crash the build;
/// it should just cost that one ingestor a cold re-walk).
fn cursor_for(name: &str, manifest: &BuildManifest) -> BTreeMap<String, Value> {
    manifest
        .cursor_for(name)
        .and_then(|cursor| serde_json::from_str(cursor).ok())
        .unwrap_or_default()
}

/// Builds the typed [`SourceConfig`] for a registered ingestor name from
/// the request's configuration, or `None` when the ingestor has no
/// corresponding config section (never the case for the five registry
/// names this crate knows about).
fn source_config_for(name: &str, request: &BuildRequest) -> Option<SourceConfig> {
    let cfg = &request.ingestors;
    match name {
        "git" => Some(SourceConfig::Git {
            max_commits: cfg.git.max_commits,
            days: cfg.git.days,
            last_commit_hash: cfg.git.last_commit_hash.clone(),
        }),
        "adr" => Some(SourceConfig::Adr {
            glob_pattern: cfg.adr.glob_pattern.clone(),
        }),
        "code_hosting" => Some(SourceConfig::CodeHosting {
            token: cfg.code_hosting.token.clone()?,
            cursor: cfg.code_hosting.cursor.clone(),
        }),
        "ticketing" => Some(SourceConfig::Ticketing {
            token: cfg.ticketing.token.clone()?,
            cloud_id: cfg.ticketing.cloud_id.clone()?,
            project_keys: cfg.ticketing.project_keys.clone(),
        }),
        "doc_platform" => {
            let token = cfg.doc_platform.token.clone()?;
            if cfg.doc_platform.database_ids.is_some() || cfg.doc_platform.page_ids.is_some() {
                Some(SourceConfig::DocPlatformRest {
                    token,
                    database_ids: cfg.doc_platform.database_ids.clone(),
                    page_ids: cfg.doc_platform.page_ids.clone(),
                })
            } else {
                Some(SourceConfig::DocPlatformGraphql { token })
            }
        }
        _ => None,
    }
}

/// Runs every planned ingestor concurrently and collects each outcome.
/// Ingestors never touch the store; only the merge step afterward does,
/// so running them off the calling thread is safe regardless of what the
/// store itself requires.
fn run_ingestors_concurrently(plan: &[(String, Arc<dyn Ingestor + Send + Sync>, IngestContext)]) -> Vec<RunOutcome> {
    let outcomes: Mutex<Vec<RunOutcome>> = Mutex::new(Vec::with_capacity(plan.len()));

    rayon::scope(|scope| {
        for (name, ingestor, ctx) in plan {
            let outcomes = &outcomes;
            scope.spawn(move |_| {
                let started = Instant::now();
                let result = ingestor.ingest(ctx);
                let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                let mut guard = outcomes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                guard.push(RunOutcome {
                    name: name.clone(),
                    duration_ms,
                    result,
                });
            });
        }
    });

    let mut outcomes = outcomes.into_inner().unwrap_or_else(std::sync::PoisonError::into_inner);
    outcomes.sort_by(|a, b| a.name.cmp(&b.name));
    outcomes
}

// ============================================================================
// SECTION: Node Type Helper
// ============================================================================

/// Returns the union of node types every registered ingestor may emit, for
/// callers that need to pre-size or validate a schema.
#[must_use]
pub fn all_emittable_node_types(orchestrator: &BuildOrchestrator) -> Vec<NodeType> {
    let mut types: Vec<NodeType> = orchestrator.ingestors.values().flat_map(|ingestor| ingestor.node_types().to_vec()).collect();
    types.sort_by_key(NodeType::tag);
    types.dedup();
    types
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use arc_config::AdrConfig;
    use arc_config::CodeHostingConfig;
    use arc_config::DocPlatformConfig;
    use arc_config::GitConfig;
    use arc_config::IngestorToggle;
    use arc_config::TicketingConfig;
    use arc_core::Edge;
    use arc_core::EdgeRel;
    use arc_core::Node;
    use arc_core::NodeId;
    use arc_core::NodeSpecialized;
    use arc_core::NodeType;
    use arc_core::ArcError;
    use arc_core::interfaces::IngestContext;
    use arc_core::interfaces::IngestOutput;
    use arc_core::interfaces::Ingestor;
    use arc_store_sqlite::SqliteStore;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::sync::Mutex;

    use super::BuildOrchestrator;
    use super::BuildRequest;
    use super::IngestorsConfig;

    struct StubIngestor {
        name: &'static str,
        fail: bool,
        /// Cursor this ingestor reports via `new_last_processed` on a
        /// successful run; empty means it does not support resumption.
        next_cursor: BTreeMap<String, serde_json::Value>,
        /// Every `last_processed` this ingestor was handed, in call order.
        /// Shared so a test can inspect it after the ingestor itself has
        /// been moved into the orchestrator's registry.
        received: Arc<Mutex<Vec<BTreeMap<String, serde_json::Value>>>>,
    }

    impl StubIngestor {
        fn new(name: &'static str, fail: bool) -> Self {
            Self {
                name,
                fail,
                next_cursor: BTreeMap::new(),
                received: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn with_cursor(mut self, key: &str, value: &str) -> Self {
            self.next_cursor.insert(key.to_string(), serde_json::Value::String(value.to_string()));
            self
        }

        fn received_handle(&self) -> Arc<Mutex<Vec<BTreeMap<String, serde_json::Value>>>> {
            Arc::clone(&self.received)
        }
    }

    impl Ingestor for StubIngestor {
        fn name(&self) -> &str {
            self.name
        }

        fn node_types(&self) -> &[NodeType] {
            &[NodeType::File]
        }

        fn edge_types(&self) -> &[EdgeRel] {
            &[EdgeRel::Affects]
        }

        fn ingest(&self, ctx: &IngestContext) -> Result<IngestOutput, ArcError> {
            self.received.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(ctx.last_processed.clone());
            if self.fail {
                return Err(ArcError::new(arc_core::ArcErrorKind::Network, "boom"));
            }
            let node = Node::new(NodeId::file("README.md"), NodeType::File, NodeSpecialized::File {
                path: "README.md".to_string(),
                language: None,
                last_modified: None,
            });
            Ok(IngestOutput {
                nodes: vec![node],
                edges: Vec::new(),
                new_last_processed: self.next_cursor.clone(),
                partial_errors: Vec::new(),
            })
        }
    }

    fn base_config() -> IngestorsConfig {
        IngestorsConfig {
            enabled: IngestorToggle::default(),
            git: GitConfig::default(),
            adr: AdrConfig::default(),
            code_hosting: CodeHostingConfig::default(),
            ticketing: TicketingConfig::default(),
            doc_platform: DocPlatformConfig::default(),
        }
    }

    #[test]
    fn runs_enabled_ingestors_and_commits_their_output() {
        let mut store = SqliteStore::open_in_memory().expect("open store");
        store.init_schema().expect("init schema");
        let repo_id = store.ensure_repository("/tmp/repo", Some("repo")).expect("ensure repository");

        let orchestrator = BuildOrchestrator::builder().ingestor(StubIngestor::new("git", false)).build();

        let request = BuildRequest {
            repo_path: Some("/tmp/repo".to_string()),
            repo_id,
            ingestors: base_config(),
            incremental: false,
        };

        let result = orchestrator.run(&mut store, &request).expect("run build");
        assert_eq!(result.total_nodes_added, 1);
        assert_eq!(result.ingestor_summaries.len(), 1);
        assert!(result.build_manifest.all_clean());
    }

    #[test]
    fn a_failing_ingestor_does_not_abort_the_build() {
        let mut store = SqliteStore::open_in_memory().expect("open store");
        store.init_schema().expect("init schema");
        let repo_id = store.ensure_repository("/tmp/repo", Some("repo")).expect("ensure repository");

        let orchestrator = BuildOrchestrator::builder()
            .ingestor(StubIngestor::new("git", false))
            .ingestor(StubIngestor::new("adr", true))
            .build();

        let request = BuildRequest {
            repo_path: Some("/tmp/repo".to_string()),
            repo_id,
            ingestors: base_config(),
            incremental: false,
        };

        let result = orchestrator.run(&mut store, &request).expect("run build");
        assert_eq!(result.total_nodes_added, 1);
        assert!(!result.build_manifest.all_clean());
    }

    #[test]
    fn disabled_ingestor_is_recorded_as_skipped() {
        let mut store = SqliteStore::open_in_memory().expect("open store");
        store.init_schema().expect("init schema");
        let repo_id = store.ensure_repository("/tmp/repo", Some("repo")).expect("ensure repository");

        let orchestrator = BuildOrchestrator::builder().ingestor(StubIngestor::new("ticketing", false)).build();

        let mut config = base_config();
        config.enabled.0.insert("ticketing".to_string(), false);

        let request = BuildRequest {
            repo_path: Some("/tmp/repo".to_string()),
            repo_id,
            ingestors: config,
            incremental: false,
        };

        let result = orchestrator.run(&mut store, &request).expect("run build");
        assert_eq!(result.total_nodes_added, 0);
        assert_eq!(result.ingestor_summaries.len(), 1);
        assert_eq!(result.ingestor_summaries[0].status, arc_core::IngestorStatus::Skipped);
    }

    #[test]
    fn incremental_run_resumes_from_persisted_cursor() {
        let mut store = SqliteStore::open_in_memory().expect("open store");
        store.init_schema().expect("init schema");
        let repo_id = store.ensure_repository("/tmp/repo", Some("repo")).expect("ensure repository");

        let stub = StubIngestor::new("git", false).with_cursor("last_commit_hash", "sha-1");
        let received = stub.received_handle();
        let orchestrator = BuildOrchestrator::builder().ingestor(stub).build();

        let request = BuildRequest {
            repo_path: Some("/tmp/repo".to_string()),
            repo_id: repo_id.clone(),
            ingestors: base_config(),
            incremental: false,
        };
        orchestrator.run(&mut store, &request).expect("first run");

        let incremental_request = BuildRequest {
            incremental: true,
            ..request
        };
        let second = orchestrator.run(&mut store, &incremental_request).expect("second run");
        assert_eq!(second.build_manifest.cursor_for("git"), Some(r#"{"last_commit_hash":"sha-1"}"#));

        let calls = received.lock().expect("lock received calls");
        assert_eq!(calls.len(), 2, "stub should have been invoked once per build");
        assert!(calls[0].is_empty(), "the cold first run must not hand the ingestor a cursor");
        assert_eq!(
            calls[1].get("last_commit_hash").and_then(|v| v.as_str()),
            Some("sha-1"),
            "the incremental second run must hand the ingestor back the cursor it wrote on the first run"
        );
    }
}
