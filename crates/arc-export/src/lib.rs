// crates/arc-export/src/lib.rs
// ============================================================================
// Module: Arc Memory Export Engine
// Description: Change-set slice export: BFS closure over a bounded relation
//              set, always-include-ADRs policy, JSON serialization with
//              type-specific fields promoted, optional gzip and detached
//              signature.
// Purpose: Hand a reviewer or downstream tool a self-contained, dangling-
//          edge-free slice of the graph relevant to one PR or commit.
// Dependencies: arc-core, flate2, serde_json, time
// ============================================================================

//! ## Overview
//! [`export_change_set`] seeds a BFS from the files changed between
//! `merge-base(pr_sha, base_ref)` and `pr_sha`, walks up to `max_hops` hops
//! in both edge directions along [`ALLOWED_RELATIONS`], then unconditionally
//! folds in every `adr` node (ADRs are treated as globally relevant). The
//! resulting [`ExportDocument`] carries only edges whose both endpoints
//! survived into the node set, the round-trip property a consumer depends
//! on (the export closure).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::collections::HashSet;
use std::collections::VecDeque;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use arc_core::Edge;
use arc_core::EdgeRel;
use arc_core::Node;
use arc_core::NodeId;
use arc_core::NodeSpecialized;
use arc_core::NodeType;
use arc_core::Timestamp;
use arc_core::interfaces::GraphStore;
use arc_core::interfaces::StoreError;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use tracing::debug;
use tracing::instrument;

/// Edge relations the export BFS is permitted to cross.
const ALLOWED_RELATIONS: [EdgeRel; 5] = [EdgeRel::Merges, EdgeRel::Mentions, EdgeRel::Decides, EdgeRel::Contains, EdgeRel::DependsOn];

/// Current export file schema version.
pub const SCHEMA_VERSION: &str = "0.2";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Export engine failures.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The graph store could not be read.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// Git repository access or diffing failed.
    #[error("git error: {0}")]
    Git(String),
    /// Writing the export file (or its signature) failed.
    #[error("io error: {0}")]
    Io(String),
    /// `serde_json` encoding failed.
    #[error("encoding error: {0}")]
    Encoding(String),
}

// ============================================================================
// SECTION: Changed-File Diff
// ============================================================================

/// Computes the repository-relative paths that differ between
/// `merge-base(pr_sha, base_ref)` and `pr_sha`.
///
/// # Errors
///
/// Returns [`ExportError::Git`] if the repository cannot be opened, either
/// revision fails to resolve to a commit, or no merge base exists.
pub fn changed_files(repo_path: &str, pr_sha: &str, base_ref: &str) -> Result<Vec<String>, ExportError> {
    let repo = git2::Repository::open(repo_path).map_err(git_err)?;
    let pr_commit = resolve_commit(&repo, pr_sha)?;
    let base_commit = resolve_commit(&repo, base_ref)?;
    let merge_base_oid = repo.merge_base(pr_commit.id(), base_commit.id()).map_err(git_err)?;
    let merge_base_tree = repo.find_commit(merge_base_oid).and_then(|c| c.tree()).map_err(git_err)?;
    let pr_tree = pr_commit.tree().map_err(git_err)?;

    let diff = repo.diff_tree_to_tree(Some(&merge_base_tree), Some(&pr_tree), None).map_err(git_err)?;

    let mut paths = BTreeSet::new();
    diff.foreach(
        &mut |delta, _| {
            if let Some(path) = delta.new_file().path().and_then(|p| p.to_str()) {
                paths.insert(path.to_string());
            }
            true
        },
        None,
        None,
        None,
    )
    .map_err(git_err)?;
    Ok(paths.into_iter().collect())
}

fn resolve_commit<'repo>(repo: &'repo git2::Repository, rev: &str) -> Result<git2::Commit<'repo>, ExportError> {
    repo.revparse_single(rev).and_then(|obj| obj.peel_to_commit()).map_err(git_err)
}

fn git_err(err: git2::Error) -> ExportError {
    ExportError::Git(err.to_string())
}

// ============================================================================
// SECTION: BFS Closure
// ============================================================================

/// Runs the bounded, bidirectional BFS closure from `seed_files`, then folds
/// in every `adr` node unconditionally. Returns the resulting node and edge
/// sets, with every returned edge's endpoints present in the returned nodes.
///
/// # Errors
///
/// Returns [`StoreError`] on store I/O failure.
#[instrument(skip(store))]
pub fn bfs_closure(store: &dyn GraphStore, seed_files: &[String], max_hops: u32) -> Result<(Vec<Node>, Vec<Edge>), StoreError> {
    let mut visited: BTreeSet<String> = BTreeSet::new();
    let mut frontier: VecDeque<(String, u32)> = VecDeque::new();
    for path in seed_files {
        let id = NodeId::file(path).as_str().to_string();
        if visited.insert(id.clone()) {
            frontier.push_back((id, 0));
        }
    }

    while let Some((id, hop)) = frontier.pop_front() {
        if hop >= max_hops {
            continue;
        }
        for relation in ALLOWED_RELATIONS {
            for edge in store.get_edges_by_src(&id, Some(relation))? {
                let neighbor = edge.dst.as_str().to_string();
                if visited.insert(neighbor.clone()) {
                    frontier.push_back((neighbor, hop + 1));
                }
            }
            for edge in store.get_edges_by_dst(&id, Some(relation))? {
                let neighbor = edge.src.as_str().to_string();
                if visited.insert(neighbor.clone()) {
                    frontier.push_back((neighbor, hop + 1));
                }
            }
        }
    }

    for adr in store.get_nodes_by_type(&NodeType::Adr, None)? {
        visited.insert(adr.id.as_str().to_string());
    }

    let mut nodes = Vec::new();
    for id in &visited {
        if let Some(node) = store.get_node_by_id(id)? {
            nodes.push(node);
        }
    }

    let mut seen_edge_keys: HashSet<(String, String, EdgeRel)> = HashSet::new();
    let mut edges = Vec::new();
    for id in &visited {
        for relation in ALLOWED_RELATIONS {
            for edge in store.get_edges_by_src(id, Some(relation))? {
                if visited.contains(edge.dst.as_str()) && seen_edge_keys.insert(edge.key_strings()) {
                    edges.push(edge);
                }
            }
        }
    }

    debug!(nodes = nodes.len(), edges = edges.len(), max_hops, "export bfs closure complete");
    Ok((nodes, edges))
}

/// String-keyed `(src, dst, relation)` helper so edges can be deduplicated in
/// a `HashSet` without requiring `Edge` itself to implement `Hash`.
trait EdgeKeyStrings {
    fn key_strings(&self) -> (String, String, EdgeRel);
}

impl EdgeKeyStrings for Edge {
    fn key_strings(&self) -> (String, String, EdgeRel) {
        (self.src.as_str().to_string(), self.dst.as_str().to_string(), self.relation)
    }
}

// ============================================================================
// SECTION: Export Document
// ============================================================================

/// The `pr` section of an export document.
#[derive(Debug, Clone, Serialize)]
pub struct ExportPr {
    /// Commit SHA the export was generated for.
    pub sha: String,
    /// Repository-relative paths changed in this PR/commit.
    pub changed_files: Vec<String>,
    /// Platform PR number, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<u64>,
    /// PR title, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// PR author, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// Optional extra PR metadata a caller may supply; not derivable from the
/// graph alone.
#[derive(Debug, Clone, Default)]
pub struct PrMetadata {
    /// Platform PR number.
    pub number: Option<u64>,
    /// PR title.
    pub title: Option<String>,
    /// PR author.
    pub author: Option<String>,
}

/// A detached-signature reference embedded in the export document.
#[derive(Debug, Clone, Serialize)]
pub struct SignBlock {
    /// Path to the signature file, relative to the export file.
    pub sig_path: String,
    /// Signing key fingerprint, if the signer reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpg_fpr: Option<String>,
}

/// A complete export document, ready to serialize.
#[derive(Debug, Clone, Serialize)]
pub struct ExportDocument {
    /// Export file schema version (`"0.2"`).
    pub schema_version: String,
    /// RFC 3339 generation timestamp.
    pub generated_at: String,
    /// The PR/commit section.
    pub pr: ExportPr,
    /// Exported nodes, each with type-specific fields promoted and common
    /// fields under `metadata`.
    pub nodes: Vec<Value>,
    /// Exported edges, each with a `metadata` object for edge properties.
    pub edges: Vec<Value>,
    /// Detached signature reference, if the export was signed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign: Option<SignBlock>,
}

// ============================================================================
// SECTION: Signing
// ============================================================================

/// External detached-signing collaborator. The export engine assumes only
/// `sign(file) -> sig_path`; key management and the signing tool itself are
/// external.
pub trait Signer {
    /// Signs `file_path`, returning the path to the detached signature file.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Io`] on signing failure.
    fn sign(&self, file_path: &Path) -> Result<String, ExportError>;

    /// Returns the signing key fingerprint, if meaningful for this signer.
    fn key_fingerprint(&self) -> Option<String> {
        None
    }
}

// ============================================================================
// SECTION: Export Entry Point
// ============================================================================

/// Builds an export document for `pr_sha` against `base_ref`.
///
/// `generated_at` is supplied by the caller rather than read from the wall
/// clock here, so the document's timestamp is reproducible under test.
///
/// # Errors
///
/// Returns [`ExportError::Git`] on diff failure or [`ExportError::Store`] on
/// graph read failure.
#[instrument(skip(store, pr_metadata))]
pub fn export_change_set(store: &dyn GraphStore, repo_path: &str, pr_sha: &str, base_ref: &str, max_hops: u32, pr_metadata: PrMetadata, generated_at: Timestamp) -> Result<ExportDocument, ExportError> {
    let files = changed_files(repo_path, pr_sha, base_ref)?;
    let (nodes, edges) = bfs_closure(store, &files, max_hops)?;

    let node_values = nodes.iter().map(node_to_json).collect();
    let edge_values = edges.iter().map(edge_to_json).collect();

    Ok(ExportDocument {
        schema_version: SCHEMA_VERSION.to_string(),
        generated_at: generated_at.to_iso8601().unwrap_or_default(),
        pr: ExportPr {
            sha: pr_sha.to_string(),
            changed_files: files,
            number: pr_metadata.number,
            title: pr_metadata.title,
            author: pr_metadata.author,
        },
        nodes: node_values,
        edges: edge_values,
        sign: None,
    })
}

/// Signs and writes `document` to `path`. If `path` ends in `.gz`, the JSON
/// body is gzip-compressed before writing; if `signer` is given, the
/// (uncompressed) JSON is signed first and the document's `sign` block is
/// populated before the final write.
///
/// # Errors
///
/// Returns [`ExportError::Encoding`] if serialization fails,
/// [`ExportError::Io`] on write or signing failure.
pub fn write_export(mut document: ExportDocument, path: &Path, signer: Option<&dyn Signer>) -> Result<(), ExportError> {
    if let Some(signer) = signer {
        let unsigned_json = serde_json::to_vec_pretty(&document).map_err(|e| ExportError::Encoding(e.to_string()))?;
        let staging_path = staging_path_for(path);
        std::fs::write(&staging_path, &unsigned_json).map_err(|e| ExportError::Io(e.to_string()))?;
        let sig_path = signer.sign(&staging_path)?;
        document.sign = Some(SignBlock {
            sig_path,
            gpg_fpr: signer.key_fingerprint(),
        });
        let _ = std::fs::remove_file(&staging_path);
    }

    let json = serde_json::to_vec_pretty(&document).map_err(|e| ExportError::Encoding(e.to_string()))?;

    if path.extension().and_then(|ext| ext.to_str()) == Some("gz") {
        let file = std::fs::File::create(path).map_err(|e| ExportError::Io(e.to_string()))?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(&json).map_err(|e| ExportError::Io(e.to_string()))?;
        encoder.finish().map_err(|e| ExportError::Io(e.to_string()))?;
    } else {
        std::fs::write(path, &json).map_err(|e| ExportError::Io(e.to_string()))?;
    }
    Ok(())
}

fn staging_path_for(path: &Path) -> PathBuf {
    let mut staging = path.to_path_buf();
    let mut file_name = staging.file_name().and_then(|n| n.to_str()).unwrap_or("export").to_string();
    file_name.push_str(".presign");
    staging.set_file_name(file_name);
    staging
}

// ============================================================================
// SECTION: Node/Edge JSON Conversion
// ============================================================================

/// Converts a node to its export JSON shape: `id`, `type`, type-specific
/// fields promoted to the top level, and a `metadata` object for the
/// common fields (`title`, `body`, `timestamp`) plus `extra`.
fn node_to_json(node: &Node) -> Value {
    let mut obj = Map::new();
    obj.insert("id".to_string(), Value::String(node.id.as_str().to_string()));
    obj.insert("type".to_string(), Value::String(node.node_type.tag()));
    for (key, value) in specialized_fields(&node.specialized) {
        obj.insert(key, value);
    }

    let mut metadata = Map::new();
    if let Some(title) = &node.title {
        metadata.insert("title".to_string(), Value::String(title.clone()));
    }
    if let Some(body) = &node.body {
        metadata.insert("body".to_string(), Value::String(body.clone()));
    }
    if let Some(ts) = arc_core::resolve_effective_timestamp(node)
        && let Some(iso) = ts.to_iso8601()
    {
        metadata.insert("timestamp".to_string(), Value::String(iso));
    }
    for (key, value) in &node.extra {
        metadata.entry(key.clone()).or_insert_with(|| value.clone());
    }
    obj.insert("metadata".to_string(), Value::Object(metadata));

    Value::Object(obj)
}

/// Converts an edge to its export JSON shape: `src`, `dst`, `type` (the
/// relation's wire label), and a `metadata` object for edge properties.
fn edge_to_json(edge: &Edge) -> Value {
    let mut obj = Map::new();
    obj.insert("src".to_string(), Value::String(edge.src.as_str().to_string()));
    obj.insert("dst".to_string(), Value::String(edge.dst.as_str().to_string()));
    obj.insert("type".to_string(), Value::String(edge.relation.label().to_string()));
    obj.insert("metadata".to_string(), Value::Object(edge.properties.clone()));
    Value::Object(obj)
}

/// Returns the type-specific fields for a node's specialization, promoted
/// to flat `(key, value)` pairs for [`node_to_json`].
fn specialized_fields(specialized: &NodeSpecialized) -> Vec<(String, Value)> {
    match specialized {
        NodeSpecialized::File { path, language, last_modified } => vec![
            ("path".to_string(), Value::String(path.clone())),
            ("language".to_string(), opt_string(language.clone())),
            ("last_modified".to_string(), opt_ts(*last_modified)),
        ],
        NodeSpecialized::Commit { sha, author, files } => vec![
            ("sha".to_string(), Value::String(sha.clone())),
            ("author".to_string(), Value::String(author.clone())),
            ("files".to_string(), string_vec(files)),
        ],
        NodeSpecialized::Pr {
            number,
            state,
            url,
            merged_at,
            merged_by,
            merged_commit_sha,
        } => vec![
            ("number".to_string(), Value::from(*number)),
            ("state".to_string(), Value::String(state.clone())),
            ("url".to_string(), Value::String(url.clone())),
            ("merged_at".to_string(), opt_ts(*merged_at)),
            ("merged_by".to_string(), opt_string(merged_by.clone())),
            ("merged_commit_sha".to_string(), opt_string(merged_commit_sha.clone())),
        ],
        NodeSpecialized::Issue { number, state, closed_at, labels } => vec![
            ("number".to_string(), Value::from(*number)),
            ("state".to_string(), Value::String(state.clone())),
            ("closed_at".to_string(), opt_ts(*closed_at)),
            ("labels".to_string(), string_vec(labels)),
        ],
        NodeSpecialized::Adr { status, decision_makers, path } => vec![
            ("status".to_string(), Value::String(status.clone())),
            ("decision_makers".to_string(), string_vec(decision_makers)),
            ("path".to_string(), Value::String(path.clone())),
        ],
        NodeSpecialized::Simulation {
            sim_id,
            rev_range,
            scenario,
            severity,
            risk_score,
            manifest_hash,
            commit_target,
            diff_hash,
            affected_services,
        } => vec![
            ("sim_id".to_string(), Value::String(sim_id.clone())),
            ("rev_range".to_string(), Value::String(rev_range.clone())),
            ("scenario".to_string(), Value::String(scenario.clone())),
            ("severity".to_string(), Value::from(*severity)),
            ("risk_score".to_string(), Value::from(*risk_score)),
            ("manifest_hash".to_string(), Value::String(manifest_hash.clone())),
            ("commit_target".to_string(), Value::String(commit_target.clone())),
            ("diff_hash".to_string(), Value::String(diff_hash.clone())),
            ("affected_services".to_string(), string_vec(affected_services)),
        ],
        NodeSpecialized::Metric { name, value, unit, service } => vec![
            ("name".to_string(), Value::String(name.clone())),
            ("value".to_string(), Value::from(*value)),
            ("unit".to_string(), opt_string(unit.clone())),
            ("service".to_string(), opt_string(service.clone())),
        ],
        NodeSpecialized::Generic => Vec::new(),
    }
}

fn opt_string(value: Option<String>) -> Value {
    value.map_or(Value::Null, Value::String)
}

fn opt_ts(value: Option<Timestamp>) -> Value {
    value.and_then(Timestamp::to_iso8601).map_or(Value::Null, Value::String)
}

fn string_vec(values: &[String]) -> Value {
    Value::Array(values.iter().cloned().map(Value::String).collect())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::process::Command;

    use arc_core::Edge;
    use arc_core::EdgeRel;
    use arc_core::Node;
    use arc_core::NodeId;
    use arc_core::NodeSpecialized;
    use arc_core::NodeType;
    use arc_core::RepoId;
    use arc_core::RepositoryRecord;
    use arc_core::Timestamp;
    use arc_core::interfaces::GraphStore;
    use arc_core::interfaces::StoreError;
    use serde_json::Value;
    use tempfile::TempDir;

    use super::bfs_closure;
    use super::changed_files;

    #[derive(Default)]
    struct FakeStore {
        nodes: Vec<Node>,
        edges: Vec<Edge>,
    }

    impl GraphStore for FakeStore {
        fn init_schema(&mut self) -> Result<(), StoreError> {
            Ok(())
        }

        fn add_nodes_and_edges(&mut self, nodes: &[Node], edges: &[Edge]) -> Result<(), StoreError> {
            self.nodes.extend(nodes.iter().cloned());
            self.edges.extend(edges.iter().cloned());
            Ok(())
        }

        fn get_node_by_id(&self, id: &str) -> Result<Option<Node>, StoreError> {
            Ok(self.nodes.iter().find(|n| n.id.as_str() == id).cloned())
        }

        fn get_nodes_by_type(&self, node_type: &NodeType, _repo_filter: Option<&[RepoId]>) -> Result<Vec<Node>, StoreError> {
            Ok(self.nodes.iter().filter(|n| &n.node_type == node_type).cloned().collect())
        }

        fn get_edges_by_src(&self, id: &str, relation: Option<EdgeRel>) -> Result<Vec<Edge>, StoreError> {
            Ok(self.edges.iter().filter(|e| e.src.as_str() == id && relation.is_none_or(|r| e.relation == r)).cloned().collect())
        }

        fn get_edges_by_dst(&self, id: &str, relation: Option<EdgeRel>) -> Result<Vec<Edge>, StoreError> {
            Ok(self.edges.iter().filter(|e| e.dst.as_str() == id && relation.is_none_or(|r| e.relation == r)).cloned().collect())
        }

        fn node_count(&self) -> Result<u64, StoreError> {
            Ok(self.nodes.len() as u64)
        }

        fn edge_count(&self) -> Result<u64, StoreError> {
            Ok(self.edges.len() as u64)
        }

        fn save_metadata(&mut self, _key: &str, _value: &Value) -> Result<(), StoreError> {
            Ok(())
        }

        fn get_metadata(&self, _key: &str, default: Option<Value>) -> Result<Option<Value>, StoreError> {
            Ok(default)
        }

        fn get_all_metadata(&self) -> Result<BTreeMap<String, Value>, StoreError> {
            Ok(BTreeMap::new())
        }

        fn save_refresh_timestamp(&mut self, _source: &str, _instant: Timestamp) -> Result<(), StoreError> {
            Ok(())
        }

        fn get_refresh_timestamp(&self, _source: &str) -> Result<Option<Timestamp>, StoreError> {
            Ok(None)
        }

        fn get_all_refresh_timestamps(&self) -> Result<BTreeMap<String, Timestamp>, StoreError> {
            Ok(BTreeMap::new())
        }

        fn ensure_repository(&mut self, path: &str, _name: Option<&str>) -> Result<RepoId, StoreError> {
            Ok(RepoId::from_absolute_path(path))
        }

        fn list_repositories(&self) -> Result<Vec<RepositoryRecord>, StoreError> {
            Ok(Vec::new())
        }

        fn set_active_repositories(&mut self, _ids: &[RepoId]) -> Result<(), StoreError> {
            Ok(())
        }

        fn get_active_repositories(&self) -> Result<Vec<RepoId>, StoreError> {
            Ok(Vec::new())
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
        std::fs::write(dir.path().join("a.py"), "one\n").expect("write file");
        run(&["add", "a.py"]);
        run(&["commit", "-q", "-m", "base"]);
        run(&["tag", "base"]);
        std::fs::write(dir.path().join("a.py"), "one\ntwo\n").expect("write file");
        run(&["add", "a.py"]);
        run(&["commit", "-q", "-m", "head"]);
        run(&["tag", "head"]);
        dir
    }

    #[test]
    fn changed_files_reports_paths_touched_since_base() {
        let dir = init_repo();
        let repo_path = dir.path().to_string_lossy().to_string();
        let files = changed_files(&repo_path, "head", "base").expect("diff");
        assert_eq!(files, vec!["a.py".to_string()]);
    }

    #[test]
    fn bfs_closure_includes_slice_nodes_and_only_internal_edges() {
        let file = Node::new(
            NodeId::file("src/a.py"),
            NodeType::File,
            NodeSpecialized::File {
                path: "src/a.py".to_string(),
                language: None,
                last_modified: None,
            },
        );
        let pr = Node::new(
            NodeId::pr_opaque("10"),
            NodeType::Pr,
            NodeSpecialized::Pr {
                number: 10,
                state: "merged".to_string(),
                url: "https://example.com/10".to_string(),
                merged_at: None,
                merged_by: None,
                merged_commit_sha: None,
            },
        );
        let commit = Node::new(
            NodeId::commit("def456"),
            NodeType::Commit,
            NodeSpecialized::Commit {
                sha: "def456".to_string(),
                author: "alice".to_string(),
                files: vec!["src/a.py".to_string()],
            },
        );
        let unrelated_commit = Node::new(
            NodeId::commit("zzz"),
            NodeType::Commit,
            NodeSpecialized::Commit {
                sha: "zzz".to_string(),
                author: "bob".to_string(),
                files: Vec::new(),
            },
        );

        let edges = vec![
            Edge::new(pr.id.clone(), file.id.clone(), EdgeRel::Mentions),
            Edge::new(pr.id.clone(), commit.id.clone(), EdgeRel::Merges),
        ];
        let store = FakeStore {
            nodes: vec![file.clone(), pr.clone(), commit.clone(), unrelated_commit],
            edges,
        };

        let (nodes, edges) = bfs_closure(&store, &["src/a.py".to_string()], 1).expect("bfs");
        let ids: std::collections::BTreeSet<_> = nodes.iter().map(|n| n.id.as_str().to_string()).collect();
        assert!(ids.contains(file.id.as_str()));
        assert!(ids.contains(pr.id.as_str()));
        assert!(ids.contains(commit.id.as_str()));
        assert!(!ids.contains("commit:zzz"));
        assert_eq!(edges.len(), 2);
        for edge in &edges {
            assert!(ids.contains(edge.src.as_str()));
            assert!(ids.contains(edge.dst.as_str()));
        }
    }

    #[test]
    fn bfs_closure_always_includes_adrs() {
        let adr = Node::new(
            NodeId::adr("0001.md"),
            NodeType::Adr,
            NodeSpecialized::Adr {
                status: "Accepted".to_string(),
                decision_makers: Vec::new(),
                path: "adr/0001.md".to_string(),
            },
        );
        let store = FakeStore {
            nodes: vec![adr.clone()],
            edges: Vec::new(),
        };

        let (nodes, _edges) = bfs_closure(&store, &[], 1).expect("bfs");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, adr.id);
    }

    #[test]
    fn bfs_closure_stops_at_hop_bound() {
        let a = Node::new(NodeId::file("a"), NodeType::File, NodeSpecialized::File { path: "a".to_string(), language: None, last_modified: None });
        let b = Node::new(NodeId::pr_opaque("1"), NodeType::Pr, NodeSpecialized::Pr { number: 1, state: "open".to_string(), url: String::new(), merged_at: None, merged_by: None, merged_commit_sha: None });
        let c = Node::new(NodeId::issue("gh", 1), NodeType::Issue, NodeSpecialized::Issue { number: 1, state: "open".to_string(), closed_at: None, labels: Vec::new() });
        let edges = vec![Edge::new(b.id.clone(), a.id.clone(), EdgeRel::Mentions), Edge::new(b.id.clone(), c.id.clone(), EdgeRel::Mentions)];
        let store = FakeStore { nodes: vec![a.clone(), b.clone(), c], edges };

        let (nodes, _edges) = bfs_closure(&store, &["a".to_string()], 1).expect("bfs");
        let ids: std::collections::BTreeSet<_> = nodes.iter().map(|n| n.id.as_str().to_string()).collect();
        assert!(ids.contains(a.id.as_str()));
        assert!(ids.contains(b.id.as_str()));
        assert!(!ids.contains("issue:gh:1"));
    }
}
