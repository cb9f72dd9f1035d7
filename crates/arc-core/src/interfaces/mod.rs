// crates/arc-core/src/interfaces/mod.rs
// ============================================================================
// Module: Arc Memory Interfaces
// Description: Backend-agnostic interfaces for storage and ingestion.
// Purpose: Define the contract surfaces every store and ingestor plugin
//          implements, independent of any concrete backend.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Two seams: [`GraphStore`], the database-agnostic adapter the orchestrator
//! writes through, and [`Ingestor`], the plugin contract every source
//! integration implements. Neither trait object is required to be
//! thread-safe for writes; callers serialize writes through the build
//! orchestrator, which owns transaction boundaries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::edge::Edge;
use crate::core::edge::EdgeRel;
use crate::core::error::ArcError;
use crate::core::identifiers::RepoId;
use crate::core::node::Node;
use crate::core::node::NodeType;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Repository Record
// ============================================================================

/// A registered repository row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    /// Deterministic `repository:<md5-hex>` ID.
    pub repo_id: RepoId,
    /// Display name.
    pub name: String,
    /// Absolute filesystem root path.
    pub root_path: String,
    /// Registration timestamp.
    pub added_at: Timestamp,
}

// ============================================================================
// SECTION: Graph Store
// ============================================================================

/// Store errors (`database` kind).
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection could not be established or was lost.
    #[error("store connection error: {0}")]
    Connection(String),
    /// Schema initialization failed.
    #[error("store schema error: {0}")]
    Schema(String),
    /// A write violated a store constraint (e.g. dangling edge endpoint).
    #[error("store constraint violation: {0}")]
    Constraint(String),
    /// Underlying storage engine reported an error.
    #[error("store io error: {0}")]
    Io(String),
    /// The requested repository is not registered.
    #[error("unknown repository: {0}")]
    UnknownRepository(String),
}

impl From<StoreError> for ArcError {
    fn from(err: StoreError) -> Self {
        Self::database(err.to_string()).with_detail("operation", "graph_store")
    }
}

/// Database-agnostic property-graph adapter.
///
/// Implementations are not required to be internally thread-safe for
/// writes: callers serialize writes through the build orchestrator.
pub trait GraphStore {
    /// Initializes the backing schema if it does not already exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Schema`] when schema creation fails.
    fn init_schema(&mut self) -> Result<(), StoreError>;

    /// Writes `nodes` and `edges` in a single transaction. Nodes are
    /// upserted by ID; edges are deduplicated by `(src, dst, relation)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Constraint`] if an edge references a node
    /// absent from both the store and `nodes`, or another [`StoreError`]
    /// variant on I/O failure. On any error the transaction is rolled back.
    fn add_nodes_and_edges(&mut self, nodes: &[Node], edges: &[Edge]) -> Result<(), StoreError>;

    /// Looks up a single node by ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn get_node_by_id(&self, id: &str) -> Result<Option<Node>, StoreError>;

    /// Lists nodes of the given type, optionally restricted to the active
    /// repository filter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn get_nodes_by_type(&self, node_type: &NodeType, repo_filter: Option<&[RepoId]>) -> Result<Vec<Node>, StoreError>;

    /// Lists edges whose source is `id`, optionally filtered by relation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn get_edges_by_src(&self, id: &str, relation: Option<EdgeRel>) -> Result<Vec<Edge>, StoreError>;

    /// Lists edges whose destination is `id`, optionally filtered by
    /// relation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn get_edges_by_dst(&self, id: &str, relation: Option<EdgeRel>) -> Result<Vec<Edge>, StoreError>;

    /// Returns the total node count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn node_count(&self) -> Result<u64, StoreError>;

    /// Returns the total edge count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn edge_count(&self) -> Result<u64, StoreError>;

    /// Saves a key/value metadata entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn save_metadata(&mut self, key: &str, value: &Value) -> Result<(), StoreError>;

    /// Reads a key/value metadata entry, falling back to `default` when
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn get_metadata(&self, key: &str, default: Option<Value>) -> Result<Option<Value>, StoreError>;

    /// Reads every key/value metadata entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn get_all_metadata(&self) -> Result<BTreeMap<String, Value>, StoreError>;

    /// Records the instant a named source was last refreshed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn save_refresh_timestamp(&mut self, source: &str, instant: Timestamp) -> Result<(), StoreError>;

    /// Reads the instant a named source was last refreshed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn get_refresh_timestamp(&self, source: &str) -> Result<Option<Timestamp>, StoreError>;

    /// Reads every recorded source refresh timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn get_all_refresh_timestamps(&self) -> Result<BTreeMap<String, Timestamp>, StoreError>;

    /// Registers `path` as a repository if it is not already registered,
    /// returning its `repo_id` either way.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn ensure_repository(&mut self, path: &str, name: Option<&str>) -> Result<RepoId, StoreError>;

    /// Lists every registered repository.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn list_repositories(&self) -> Result<Vec<RepositoryRecord>, StoreError>;

    /// Sets the active-repositories session filter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownRepository`] if any ID is unregistered.
    fn set_active_repositories(&mut self, ids: &[RepoId]) -> Result<(), StoreError>;

    /// Returns the current active-repositories session filter, or an empty
    /// list when unset (meaning: all repositories).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn get_active_repositories(&self) -> Result<Vec<RepoId>, StoreError>;
}

// ============================================================================
// SECTION: Source Configuration
// ============================================================================

/// Enumerated, typed configuration for one ingestor.
///
/// Unknown keys under a `#[serde(deny_unknown_fields)]`-free object are
/// ignored by construction (extra JSON keys simply fail to map to a field);
/// missing required keys are a deserialization error, surfaced before any
/// network call is attempted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "ingestor", rename_all = "kebab-case")]
pub enum SourceConfig {
    /// Configuration for the `git` ingestor.
    Git {
        /// Maximum number of commits to walk.
        max_commits: Option<u64>,
        /// Maximum age, in days, of commits to walk.
        days: Option<u64>,
        /// Resume point: do not walk past this commit.
        last_commit_hash: Option<String>,
    },
    /// Configuration for the `code-hosting` ingestor.
    CodeHosting {
        /// Bearer token.
        token: String,
        /// Opaque resume cursor from a prior run.
        cursor: Option<String>,
    },
    /// Configuration for the `ticketing` ingestor.
    Ticketing {
        /// Bearer token.
        token: String,
        /// Tenant/cloud identifier.
        cloud_id: String,
        /// Restrict ingestion to these project keys, if set.
        project_keys: Option<Vec<String>>,
    },
    /// Configuration for a GraphQL-based doc platform (Linear-like).
    DocPlatformGraphql {
        /// Bearer token.
        token: String,
    },
    /// Configuration for a REST-based doc platform (Notion-like).
    DocPlatformRest {
        /// Bearer token.
        token: String,
        /// Restrict ingestion to these database IDs, if set.
        database_ids: Option<Vec<String>>,
        /// Restrict ingestion to these page IDs, if set.
        page_ids: Option<Vec<String>>,
    },
    /// Configuration for the `adr` ingestor.
    Adr {
        /// Glob pattern for ADR files, default `**/adr/**/*.md`.
        #[serde(default = "default_adr_glob")]
        glob_pattern: String,
    },
}

fn default_adr_glob() -> String {
    "**/adr/**/*.md".to_string()
}

impl SourceConfig {
    /// Returns the bearer token carried by this configuration, if any.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::CodeHosting { token, .. }
            | Self::Ticketing { token, .. }
            | Self::DocPlatformGraphql { token }
            | Self::DocPlatformRest { token, .. } => Some(token.as_str()),
            Self::Git { .. } | Self::Adr { .. } => None,
        }
    }
}

// ============================================================================
// SECTION: Ingestor
// ============================================================================

/// Inputs handed to an ingestor for one run.
#[derive(Debug, Clone)]
pub struct IngestContext {
    /// Filesystem path to the repository, when the ingestor needs one.
    pub repo_path: Option<String>,
    /// Repository this run is scoped to.
    pub repo_id: RepoId,
    /// Typed configuration for this ingestor.
    pub source_config: Option<SourceConfig>,
    /// Opaque resume state the ingestor itself wrote on its previous run.
    pub last_processed: BTreeMap<String, Value>,
}

/// Output of one ingestor run.
#[derive(Debug, Clone, Default)]
pub struct IngestOutput {
    /// Nodes emitted this run.
    pub nodes: Vec<Node>,
    /// Edges emitted this run.
    pub edges: Vec<Edge>,
    /// Updated resume state to persist for the next run.
    pub new_last_processed: BTreeMap<String, Value>,
    /// Non-fatal, per-item errors encountered (logged and skipped).
    pub partial_errors: Vec<String>,
}

/// A source-integration plugin.
pub trait Ingestor {
    /// Stable registry name (e.g. `"git"`, `"adr"`).
    fn name(&self) -> &str;

    /// Node types this ingestor may emit.
    fn node_types(&self) -> &[NodeType];

    /// Edge relations this ingestor may emit.
    fn edge_types(&self) -> &[EdgeRel];

    /// Runs one ingestion pass.
    ///
    /// # Errors
    ///
    /// Returns [`ArcError`] when the run fails outright (`auth`,
    /// exhausted `rate-limit`, or exhausted `network` retries). Per-item
    /// failures (`parse`) are reported via
    /// [`IngestOutput::partial_errors`] instead of this `Result`.
    fn ingest(&self, ctx: &IngestContext) -> Result<IngestOutput, ArcError>;
}

#[cfg(test)]
mod tests {
    use super::SourceConfig;

    #[test]
    fn adr_glob_defaults_when_absent() {
        let json = serde_json::json!({"ingestor": "adr"});
        let config: SourceConfig = serde_json::from_value(json).expect("deserialize");
        assert_eq!(config, SourceConfig::Adr { glob_pattern: "**/adr/**/*.md".to_string() });
    }

    #[test]
    fn token_accessor_is_none_for_git_and_adr() {
        let git = SourceConfig::Git { max_commits: None, days: None, last_commit_hash: None };
        assert_eq!(git.token(), None);
    }

    #[test]
    fn unknown_keys_are_ignored_by_deserialization() {
        let json = serde_json::json!({
            "ingestor": "git",
            "max_commits": 100,
            "days": null,
            "last_commit_hash": null,
            "unexpected": "value",
        });
        let config: SourceConfig = serde_json::from_value(json).expect("deserialize");
        assert_eq!(
            config,
            SourceConfig::Git {
                max_commits: Some(100),
                days: None,
                last_commit_hash: None
            }
        );
    }
}
