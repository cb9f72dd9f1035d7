// crates/arc-ingest/src/git.rs
// ============================================================================
// Module: Git Ingestor
// Description: Walks a repository's commit graph into `commit`/`file`
//              nodes and `AFFECTS` edges.
// Purpose: The only ingestor required to be fully offline and deterministic
//          no network I/O, no wall-clock reads beyond what Git
//          itself recorded on each commit.
// Dependencies: arc-core, git2
// ============================================================================

//! ## Overview
//! `git` walks commits reachable from `HEAD` in reverse-topological,
//! time-ordered order, stopping at the first of: `max_commits` commits
//! walked, a commit older than `days`, or the previously recorded
//! `last_commit_hash` (the resume point: commits at or before it were
//! already ingested on a prior run). Each commit becomes a `commit` node;
//! every path its tree diff touches against its first parent becomes a
//! `file` node, linked by an `AFFECTS` edge (the closed edge-relation set
//! in `arc-core` has no separate `MODIFIES` label, so "commit modifies
//! file" is represented as `AFFECTS`).

// ============================================================================
// SECTION: Imports
// ============================================================================

use arc_core::ArcError;
use arc_core::ArcErrorKind;
use arc_core::Edge;
use arc_core::EdgeRel;
use arc_core::Node;
use arc_core::NodeId;
use arc_core::NodeSpecialized;
use arc_core::NodeType;
use arc_core::Timestamp;
use arc_core::interfaces::IngestContext;
use arc_core::interfaces::IngestOutput;
use arc_core::interfaces::Ingestor;
use arc_core::interfaces::SourceConfig;
use git2::Repository;
use git2::Sort;
use tracing::debug;
use tracing::instrument;
use tracing::warn;

/// Node types the `git` ingestor may emit.
const NODE_TYPES: [NodeType; 2] = [NodeType::Commit, NodeType::File];
/// Edge relations the `git` ingestor may emit.
const EDGE_TYPES: [EdgeRel; 1] = [EdgeRel::Affects];
/// Default cap on commits walked per run when `max_commits` is unset.
const DEFAULT_MAX_COMMITS: u64 = 5_000;

/// Ingests a repository's commit history.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitIngestor;

impl Ingestor for GitIngestor {
    fn name(&self) -> &str {
        "git"
    }

    fn node_types(&self) -> &[NodeType] {
        &NODE_TYPES
    }

    fn edge_types(&self) -> &[EdgeRel] {
        &EDGE_TYPES
    }

    #[instrument(skip(self, ctx), fields(ingestor = "git"))]
    fn ingest(&self, ctx: &IngestContext) -> Result<IngestOutput, ArcError> {
        let repo_path = ctx
            .repo_path
            .as_deref()
            .ok_or_else(|| ArcError::new(ArcErrorKind::Parse, "git ingestor requires repo_path").with_detail("source", "git"))?;

        let (max_commits, days, last_commit_hash) = match &ctx.source_config {
            Some(SourceConfig::Git { max_commits, days, last_commit_hash }) => {
                (max_commits.unwrap_or(DEFAULT_MAX_COMMITS), *days, last_commit_hash.clone())
            }
            _ => (DEFAULT_MAX_COMMITS, None, None),
        };
        let stop_at = last_commit_hash.or_else(|| {
            ctx.last_processed
                .get("last_commit_hash")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        });

        let repo = Repository::open(repo_path)
            .map_err(|e| ArcError::new(ArcErrorKind::NotFound, e.to_string()).with_detail("source", "git").with_detail("repo_path", repo_path.to_string()))?;

        let mut revwalk = repo
            .revwalk()
            .map_err(|e| ArcError::new(ArcErrorKind::Database, e.to_string()).with_detail("source", "git"))?;
        revwalk
            .push_head()
            .map_err(|e| ArcError::new(ArcErrorKind::NotFound, e.to_string()).with_detail("source", "git"))?;
        revwalk
            .set_sorting(Sort::TOPOLOGICAL | Sort::TIME)
            .map_err(|e| ArcError::new(ArcErrorKind::Database, e.to_string()).with_detail("source", "git"))?;

        let cutoff = days.map(|d| now_unix_secs() - (d as i64) * 86_400);

        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        let mut partial_errors = Vec::new();
        let mut walked = 0_u64;
        let mut newest_sha: Option<String> = None;

        for oid_result in revwalk {
            if walked >= max_commits {
                break;
            }
            let oid = match oid_result {
                Ok(oid) => oid,
                Err(err) => {
                    partial_errors.push(format!("revwalk error: {err}"));
                    continue;
                }
            };
            let sha = oid.to_string();
            if stop_at.as_deref() == Some(sha.as_str()) {
                break;
            }

            let commit = match repo.find_commit(oid) {
                Ok(commit) => commit,
                Err(err) => {
                    partial_errors.push(format!("commit {sha} unreadable: {err}"));
                    continue;
                }
            };

            let commit_time = commit.time().seconds();
            if let Some(cutoff) = cutoff
                && commit_time < cutoff
            {
                break;
            }

            if newest_sha.is_none() {
                newest_sha = Some(sha.clone());
            }

            let author = commit.author().name().unwrap_or("unknown").to_string();
            let ts = Timestamp::from_unix_millis(commit_time.saturating_mul(1_000));

            let files = match changed_paths(&repo, &commit) {
                Ok(files) => files,
                Err(err) => {
                    partial_errors.push(format!("diff for {sha} failed: {err}"));
                    Vec::new()
                }
            };

            let commit_node = Node::new(
                NodeId::commit(&sha),
                NodeType::Commit,
                NodeSpecialized::Commit {
                    sha: sha.clone(),
                    author,
                    files: files.clone(),
                },
            )
            .with_ts(ts);
            nodes.push(commit_node);

            for path in &files {
                let file_node = Node::new(
                    NodeId::file(path),
                    NodeType::File,
                    NodeSpecialized::File {
                        path: path.clone(),
                        language: detect_language(path),
                        last_modified: Some(ts),
                    },
                )
                .with_ts(ts);
                nodes.push(file_node);
                edges.push(Edge::new(NodeId::commit(&sha), NodeId::file(path), EdgeRel::Affects));
            }

            walked += 1;
        }

        let mut new_last_processed = ctx.last_processed.clone();
        if let Some(sha) = newest_sha.or(stop_at) {
            new_last_processed.insert("last_commit_hash".to_string(), serde_json::Value::String(sha));
        }

        debug!(nodes = nodes.len(), edges = edges.len(), walked, "git ingest complete");
        if !partial_errors.is_empty() {
            warn!(count = partial_errors.len(), "git ingest had partial failures");
        }

        Ok(IngestOutput {
            nodes,
            edges,
            new_last_processed,
            partial_errors,
        })
    }
}

/// Returns the repository-relative paths touched by `commit`, diffed
/// against its first parent (or against an empty tree, for a root commit).
fn changed_paths(repo: &Repository, commit: &git2::Commit<'_>) -> Result<Vec<String>, git2::Error> {
    let tree = commit.tree()?;
    let parent_tree = commit.parent(0).ok().and_then(|p| p.tree().ok());
    let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;

    let mut paths = Vec::new();
    diff.foreach(
        &mut |delta, _| {
            if let Some(path) = delta.new_file().path().and_then(|p| p.to_str()) {
                paths.push(path.to_string());
            }
            true
        },
        None,
        None,
        None,
    )?;
    Ok(paths)
}

/// Guesses a source language from a file extension. Returns `None` for
/// unrecognized or missing extensions rather than guessing.
fn detect_language(path: &str) -> Option<String> {
    let ext = path.rsplit('.').next()?;
    let language = match ext {
        "rs" => "rust",
        "py" => "python",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" => "javascript",
        "go" => "go",
        "java" => "java",
        "rb" => "ruby",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        _ => return None,
    };
    Some(language.to_string())
}

/// Returns the current Unix time in seconds.
fn now_unix_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}

#[cfg(test)]
mod tests {
    use std::process::Command;

    use arc_core::NodeType;
    use arc_core::RepoId;
    use arc_core::interfaces::IngestContext;
    use arc_core::interfaces::Ingestor;
    use tempfile::TempDir;

    use super::GitIngestor;

    /// Initializes a tiny repository with two commits touching one file.
    fn init_repo() -> TempDir {
        let dir = TempDir::new().expect("tempdir");
        let run = |args: &[&str]| {
            let status = Command::new("git").args(args).current_dir(dir.path()).status().expect("run git");
            assert!(status.success());
        };
        run(&["init", "-q"]);
        run(&["config", "user.email", "a@example.com"]);
        run(&["config", "user.name", "Alice"]);
        std::fs::write(dir.path().join("a.py"), "print('hi')\n").expect("write file");
        run(&["add", "a.py"]);
        run(&["commit", "-q", "-m", "first"]);
        std::fs::write(dir.path().join("a.py"), "print('hi again')\n").expect("write file");
        run(&["add", "a.py"]);
        run(&["commit", "-q", "-m", "second"]);
        dir
    }

    #[test]
    fn ingests_commits_and_files_from_a_real_repo() {
        let dir = init_repo();
        let ingestor = GitIngestor;
        let ctx = IngestContext {
            repo_path: Some(dir.path().to_string_lossy().to_string()),
            repo_id: RepoId::from_absolute_path(&dir.path().to_string_lossy()),
            source_config: None,
            last_processed: std::collections::BTreeMap::new(),
        };
        let output = ingestor.ingest(&ctx).expect("ingest");
        let commit_count = output.nodes.iter().filter(|n| n.node_type == NodeType::Commit).count();
        let file_count = output.nodes.iter().filter(|n| n.node_type == NodeType::File).count();
        assert_eq!(commit_count, 2);
        assert_eq!(file_count, 2);
        assert!(output.new_last_processed.contains_key("last_commit_hash"));
    }

    #[test]
    fn missing_repo_path_is_a_parse_error() {
        let ingestor = GitIngestor;
        let ctx = IngestContext {
            repo_path: None,
            repo_id: RepoId::from_absolute_path("/nonexistent"),
            source_config: None,
            last_processed: std::collections::BTreeMap::new(),
        };
        assert!(ingestor.ingest(&ctx).is_err());
    }
}
