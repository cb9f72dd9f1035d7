// crates/arc-trace/src/lib.rs
// ============================================================================
// Module: Arc Memory Trace Engine
// Description: Line-level blame followed by a bounded BFS through
//              MERGES/MENTIONS/DECIDES edges, surfacing the PRs, issues,
//              and ADRs behind a line of code.
// Purpose: Answer "why does this line look like this" without the caller
//          having to know the graph's edge shapes.
// Dependencies: arc-core, git2
// ============================================================================

//! ## Overview
//! [`trace_history_for_file_line`] resolves `file_path:line_number` to a
//! commit via [`blame::blame_commit_for_line`] (cached by [`TraceEngine`]'s
//! bounded [`cache::BlameCache`]), then walks:
//!
//! - hop 0: the commit's merging PR(s), via inbound `MERGES` edges (a PR
//!   node carries the outbound `MERGES` edge to the commit it merged).
//! - hop 1 from a PR: issues it mentions, via outbound `MENTIONS` edges.
//! - hop 1 from an issue: ADRs that decided something about it, via
//!   inbound `DECIDES` edges.
//!
//! Traversal stops once `max_results` nodes are collected or the fixed
//! three-level structure is exhausted; results are returned sorted by
//! timestamp descending (nodes with no resolvable timestamp sort last,
//! never as a false "oldest"/"newest" sentinel, see
//! [`arc_core::resolve_effective_timestamp`]).

// ============================================================================
// SECTION: Modules
// ============================================================================

mod blame;
mod cache;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;

use arc_core::ArcError;
use arc_core::EdgeRel;
use arc_core::NodeId;
use arc_core::Timestamp;
use arc_core::interfaces::GraphStore;
use arc_core::interfaces::StoreError;
use arc_core::resolve_effective_timestamp;
use tracing::debug;
use tracing::instrument;

pub use cache::BlameCache;
pub use cache::BlameKey;

/// Default bound on the number of blame results the engine retains.
const DEFAULT_CACHE_CAPACITY: usize = 512;
/// Fixed depth of the commit -> PR -> issue -> ADR walk.
const MAX_TRACE_HOPS: usize = 3;

// ============================================================================
// SECTION: Trace Result
// ============================================================================

/// One entry in a trace result: `{type, id, title, timestamp}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceResult {
    /// Node type tag (`"commit"`, `"pr"`, `"issue"`, `"adr"`).
    pub node_type: String,
    /// Node ID.
    pub id: String,
    /// Display title, if any.
    pub title: Option<String>,
    /// Effective timestamp, if resolvable.
    pub timestamp: Option<Timestamp>,
}

// ============================================================================
// SECTION: Trace Engine
// ============================================================================

/// Stateful wrapper around [`trace_history_for_file_line`] that owns a
/// bounded, process-local blame cache so repeated traces over the same
/// line avoid re-running `git blame`.
pub struct TraceEngine {
    cache: Mutex<BlameCache>,
}

impl TraceEngine {
    /// Builds a trace engine with the default cache capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Builds a trace engine with an explicit cache capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: Mutex::new(BlameCache::new(capacity)),
        }
    }

    /// Traces `file_path:line_number`'s history, as
    /// [`trace_history_for_file_line`], but reusing this engine's blame
    /// cache across calls.
    ///
    /// # Errors
    ///
    /// Returns [`ArcError`] on blame failure or [`StoreError`] (wrapped)
    /// on graph read failure.
    #[instrument(skip(self, store), fields(file_path, line_number))]
    pub fn trace(&self, repo_path: &str, store: &dyn GraphStore, file_path: &str, line_number: u32, max_results: usize) -> Result<Vec<TraceResult>, TraceError> {
        let key = BlameKey::new(repo_path, file_path, line_number);
        let sha = {
            let mut cache = self.cache.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(cached) = cache.get(&key) {
                cached
            } else {
                let resolved = blame::blame_commit_for_line(repo_path, file_path, line_number)?;
                cache.put(key, resolved.clone());
                resolved
            }
        };
        walk_from_commit(store, &sha, max_results)
    }
}

impl Default for TraceEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Trace engine failures.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// Blame resolution failed (no such file/line, or the repository could
    /// not be opened).
    #[error("blame failed: {0}")]
    Blame(#[from] ArcError),
    /// The graph store could not be read.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Stateless Entry Point
// ============================================================================

/// Traces `file_path:line_number`'s history with no cache reuse across
/// calls (equivalent to a fresh [`TraceEngine`] per call).
///
/// # Errors
///
/// Returns [`TraceError`] on blame failure or graph read failure.
pub fn trace_history_for_file_line(repo_path: &str, store: &dyn GraphStore, file_path: &str, line_number: u32, max_results: usize) -> Result<Vec<TraceResult>, TraceError> {
    let sha = blame::blame_commit_for_line(repo_path, file_path, line_number)?;
    walk_from_commit(store, &sha, max_results)
}

// ============================================================================
// SECTION: BFS Walk
// ============================================================================

/// Runs the bounded commit -> PR -> issue -> ADR walk from `sha`.
fn walk_from_commit(store: &dyn GraphStore, sha: &str, max_results: usize) -> Result<Vec<TraceResult>, TraceError> {
    let mut results = Vec::new();
    if max_results == 0 {
        return Ok(results);
    }

    let commit_id = NodeId::commit(sha);
    push_node(store, &mut results, commit_id.as_str())?;
    if results.len() >= max_results {
        return Ok(sort_descending(truncate(results, max_results)));
    }

    // Hop 0 -> 1: PRs that merged this commit (inbound MERGES on the commit).
    let pr_ids = neighbor_ids(store.get_edges_by_dst(commit_id.as_str(), Some(EdgeRel::Merges))?, Endpoint::Src);
    let mut issue_ids = Vec::new();
    for pr_id in &pr_ids {
        if push_node(store, &mut results, pr_id)? && results.len() >= max_results {
            return Ok(sort_descending(truncate(results, max_results)));
        }
        // Hop 1 -> 2: issues the PR mentions (outbound MENTIONS on the PR).
        for issue_id in neighbor_ids(store.get_edges_by_src(pr_id, Some(EdgeRel::Mentions))?, Endpoint::Dst) {
            issue_ids.push(issue_id);
        }
    }

    for issue_id in &issue_ids {
        if push_node(store, &mut results, issue_id)? && results.len() >= max_results {
            return Ok(sort_descending(truncate(results, max_results)));
        }
        // Hop 2 -> 3: ADRs that decided something about the issue
        // (inbound DECIDES on the issue).
        for adr_id in neighbor_ids(store.get_edges_by_dst(issue_id, Some(EdgeRel::Decides))?, Endpoint::Src) {
            if push_node(store, &mut results, &adr_id)? && results.len() >= max_results {
                return Ok(sort_descending(truncate(results, max_results)));
            }
        }
    }

    debug!(hops = MAX_TRACE_HOPS, results = results.len(), "trace walk complete");
    Ok(sort_descending(truncate(results, max_results)))
}

/// Which endpoint of a matched edge names the neighbor node.
#[derive(Clone, Copy)]
enum Endpoint {
    Src,
    Dst,
}

/// Extracts the neighbor-side IDs from a batch of matched edges.
fn neighbor_ids(edges: Vec<arc_core::Edge>, endpoint: Endpoint) -> Vec<String> {
    edges
        .into_iter()
        .map(|edge| match endpoint {
            Endpoint::Src => edge.src.as_str().to_string(),
            Endpoint::Dst => edge.dst.as_str().to_string(),
        })
        .collect()
}

/// Looks up `id` and, if present and not already collected, appends a
/// [`TraceResult`] for it. Returns whether a node was appended.
fn push_node(store: &dyn GraphStore, results: &mut Vec<TraceResult>, id: &str) -> Result<bool, StoreError> {
    if results.iter().any(|r| r.id == id) {
        return Ok(false);
    }
    let Some(node) = store.get_node_by_id(id)? else {
        return Ok(false);
    };
    results.push(TraceResult {
        node_type: node.node_type.tag(),
        id: node.id.as_str().to_string(),
        title: node.title.clone(),
        timestamp: resolve_effective_timestamp(&node),
    });
    Ok(true)
}

/// Truncates `results` to `max_results`, keeping the earliest-discovered
/// entries (BFS priority order).
fn truncate(mut results: Vec<TraceResult>, max_results: usize) -> Vec<TraceResult> {
    results.truncate(max_results);
    results
}

/// Sorts by timestamp descending; entries with no timestamp sort after
/// every timestamped entry (never treated as oldest or newest by value).
fn sort_descending(mut results: Vec<TraceResult>) -> Vec<TraceResult> {
    results.sort_by(|a, b| match (a.timestamp, b.timestamp) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    results
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

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

    use super::walk_from_commit;

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

    fn fixture() -> FakeStore {
        let commit = Node::new(
            NodeId::commit("abc123"),
            NodeType::Commit,
            NodeSpecialized::Commit {
                sha: "abc123".to_string(),
                author: "alice".to_string(),
                files: vec!["x.py".to_string()],
            },
        )
        .with_ts(Timestamp::from_unix_millis(1));
        let pr = Node::new(
            NodeId::pr_opaque("42"),
            NodeType::Pr,
            NodeSpecialized::Pr {
                number: 42,
                state: "merged".to_string(),
                url: "https://example.com/42".to_string(),
                merged_at: None,
                merged_by: None,
                merged_commit_sha: Some("abc123".to_string()),
            },
        )
        .with_ts(Timestamp::from_unix_millis(2));
        let issue = Node::new(
            NodeId::issue("github", 123),
            NodeType::Issue,
            NodeSpecialized::Issue {
                number: 123,
                state: "closed".to_string(),
                closed_at: None,
                labels: Vec::new(),
            },
        )
        .with_ts(Timestamp::from_unix_millis(3));
        let adr = Node::new(
            NodeId::adr("0001-auth.md"),
            NodeType::Adr,
            NodeSpecialized::Adr {
                status: "Accepted".to_string(),
                decision_makers: Vec::new(),
                path: "adr/0001-auth.md".to_string(),
            },
        )
        .with_ts(Timestamp::from_unix_millis(4));

        let edges = vec![
            Edge::new(pr.id.clone(), commit.id.clone(), EdgeRel::Merges),
            Edge::new(pr.id.clone(), issue.id.clone(), EdgeRel::Mentions),
            Edge::new(adr.id.clone(), issue.id.clone(), EdgeRel::Decides),
        ];
        FakeStore {
            nodes: vec![commit, pr, issue, adr],
            edges,
        }
    }

    #[test]
    fn walk_returns_commit_pr_issue_for_max_results_three() {
        let store = fixture();
        let results = walk_from_commit(&store, "abc123", 3).expect("walk");
        assert_eq!(results.len(), 3);
        let types: Vec<&str> = results.iter().map(|r| r.node_type.as_str()).collect();
        assert!(types.contains(&"commit"));
        assert!(types.contains(&"pr"));
        assert!(types.contains(&"issue"));
        assert!(!types.contains(&"adr"));
    }

    #[test]
    fn walk_includes_adr_when_max_results_allows() {
        let store = fixture();
        let results = walk_from_commit(&store, "abc123", 4).expect("walk");
        assert_eq!(results.len(), 4);
        assert!(results.iter().any(|r| r.node_type == "adr"));
    }

    #[test]
    fn results_are_sorted_by_timestamp_descending() {
        let store = fixture();
        let results = walk_from_commit(&store, "abc123", 4).expect("walk");
        let timestamps: Vec<_> = results.iter().map(|r| r.timestamp).collect();
        let mut sorted = timestamps.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(timestamps, sorted);
    }

    #[test]
    fn unknown_commit_yields_empty_results() {
        let store = fixture();
        let results = walk_from_commit(&store, "doesnotexist", 3).expect("walk");
        assert!(results.is_empty());
    }

    #[test]
    fn zero_max_results_yields_empty_without_touching_store() {
        let store = fixture();
        let results = walk_from_commit(&store, "abc123", 0).expect("walk");
        assert!(results.is_empty());
    }
}
