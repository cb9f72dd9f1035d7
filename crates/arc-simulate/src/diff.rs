// crates/arc-simulate/src/diff.rs
// ============================================================================
// Module: Diff Extraction
// Description: Parses a Git rev-range into a structured diff record, or
//              loads one a caller serialized to disk on a prior run.
// Purpose: Give the simulation workflow's `analyze_changes` step a stable,
//          serializable shape instead of a live `git2::Diff` borrow.
// Dependencies: arc-core, git2, serde, serde_json
// ============================================================================

//! ## Overview
//! [`extract_diff`] resolves a two-point rev-range (`A..B` or `A...B`,
//! where the latter diffs against the merge base as `git diff` itself
//! does) into a [`DiffRecord`]: per-file insertion/deletion counts and
//! status, the commit count between the two points, and aggregate stats.
//! [`DiffRecord::canonical_value`] excludes the wall-clock `extracted_at`
//! field so `diff_hash` (computed over it) is reproducible for the same
//! underlying range regardless of when the diff was extracted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use arc_core::Timestamp;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use tracing::instrument;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Diff extraction failures.
#[derive(Debug, Error)]
pub enum DiffError {
    /// The rev-range string had neither a `..` nor `...` separator.
    #[error("malformed rev-range: {0}")]
    MalformedRevRange(String),
    /// Git repository access, revision resolution, or diffing failed.
    #[error("git error: {0}")]
    Git(String),
    /// A pre-serialized diff could not be read or parsed.
    #[error("could not load diff from disk: {0}")]
    Load(String),
}

fn git_err(err: git2::Error) -> DiffError {
    DiffError::Git(err.to_string())
}

// ============================================================================
// SECTION: File Change
// ============================================================================

/// A single file's status within a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// File did not exist at the start point.
    Added,
    /// File exists at both points with different contents.
    Modified,
    /// File existed at the start point but not the end point.
    Deleted,
    /// File was renamed between the two points.
    Renamed,
}

impl FileStatus {
    const fn from_delta(status: git2::Delta) -> Self {
        match status {
            git2::Delta::Added | git2::Delta::Copied => Self::Added,
            git2::Delta::Deleted => Self::Deleted,
            git2::Delta::Renamed => Self::Renamed,
            _ => Self::Modified,
        }
    }
}

/// One changed file, with line-level insertion/deletion counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Repository-relative path (the new-side path for renames).
    pub path: String,
    /// Lines inserted.
    pub insertions: usize,
    /// Lines deleted.
    pub deletions: usize,
    /// Change status.
    pub status: FileStatus,
}

// ============================================================================
// SECTION: Diff Record
// ============================================================================

/// Aggregate insertion/deletion/file counts for a [`DiffRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DiffStats {
    /// Total files touched.
    pub files_changed: usize,
    /// Total lines inserted.
    pub insertions: usize,
    /// Total lines deleted.
    pub deletions: usize,
}

/// A structured Git diff over a rev-range, the input to the simulation
/// workflow's `analyze_changes` and `generate_manifest` steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffRecord {
    /// Per-file changes.
    pub files: Vec<FileChange>,
    /// Number of commits between `start_commit` (exclusive) and
    /// `end_commit` (inclusive).
    pub commit_count: usize,
    /// The rev-range string as given.
    pub range: String,
    /// Resolved start-point commit SHA (merge-base, for a `...` range).
    pub start_commit: String,
    /// Resolved end-point commit SHA.
    pub end_commit: String,
    /// Aggregate stats across `files`.
    pub stats: DiffStats,
    /// When this diff was extracted. Excluded from [`Self::canonical_value`]
    /// so `diff_hash` stays reproducible across extractions of the same
    /// range.
    pub timestamp: Timestamp,
}

impl DiffRecord {
    /// Returns the JSON value [`crate::attestation`] hashes into
    /// `diff_hash`: every field except the wall-clock `timestamp`.
    #[must_use]
    pub fn canonical_value(&self) -> Value {
        serde_json::json!({
            "files": self.files,
            "commit_count": self.commit_count,
            "range": self.range,
            "start_commit": self.start_commit,
            "end_commit": self.end_commit,
            "stats": self.stats,
        })
    }

    /// Returns whether this diff touched no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Loads a diff record a prior run serialized to disk.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Load`] if the file cannot be read or does not
    /// parse as a [`DiffRecord`].
    pub fn load_from_path(path: &Path) -> Result<Self, DiffError> {
        let bytes = fs::read(path).map_err(|e| DiffError::Load(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| DiffError::Load(e.to_string()))
    }

    /// Serializes this diff to JSON at `path`, so a later workflow run can
    /// replay `analyze_changes` onward against it via [`Self::load_from_path`]
    /// without re-extracting from Git.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Load`] if serialization or the write fails.
    pub fn save_to_path(&self, path: &Path) -> Result<(), DiffError> {
        let bytes = serde_json::to_vec_pretty(self).map_err(|e| DiffError::Load(e.to_string()))?;
        fs::write(path, bytes).map_err(|e| DiffError::Load(e.to_string()))
    }
}

// ============================================================================
// SECTION: Extraction
// ============================================================================

/// Parses a two-point rev-range. `a...b` diffs `a`'s merge-base with `b`
/// against `b` (matching `git diff a...b`); `a..b` diffs `a` directly
/// against `b`.
fn parse_rev_range(rev_range: &str) -> Result<(&str, &str), DiffError> {
    let trimmed = rev_range.trim();
    if let Some((start, end)) = trimmed.split_once("...") {
        return Ok((start, end));
    }
    if let Some((start, end)) = trimmed.split_once("..") {
        return Ok((start, end));
    }
    Err(DiffError::MalformedRevRange(rev_range.to_string()))
}

/// Extracts a [`DiffRecord`] for `rev_range` (e.g. `HEAD~1..HEAD`) in the
/// repository at `repo_path`.
///
/// # Errors
///
/// Returns [`DiffError::MalformedRevRange`] when `rev_range` has no `..`
/// separator, or [`DiffError::Git`] when the repository cannot be opened,
/// either endpoint fails to resolve, or diffing fails.
#[instrument(skip(repo_path), fields(rev_range))]
pub fn extract_diff(repo_path: &str, rev_range: &str, now: Timestamp) -> Result<DiffRecord, DiffError> {
    let (start_ref, end_ref) = parse_rev_range(rev_range)?;
    let is_merge_base_range = rev_range.trim().contains("...");

    let repo = git2::Repository::open(repo_path).map_err(git_err)?;
    let start_obj = repo.revparse_single(start_ref).and_then(|o| o.peel_to_commit()).map_err(git_err)?;
    let end_obj = repo.revparse_single(end_ref).and_then(|o| o.peel_to_commit()).map_err(git_err)?;

    let start_commit = if is_merge_base_range {
        let base_oid = repo.merge_base(start_obj.id(), end_obj.id()).map_err(git_err)?;
        repo.find_commit(base_oid).map_err(git_err)?
    } else {
        start_obj
    };

    let start_tree = start_commit.tree().map_err(git_err)?;
    let end_tree = end_obj.tree().map_err(git_err)?;
    let mut diff = repo.diff_tree_to_tree(Some(&start_tree), Some(&end_tree), None).map_err(git_err)?;
    diff.find_similar(None).map_err(git_err)?;

    let mut files = Vec::with_capacity(diff.deltas().len());
    for idx in 0..diff.deltas().len() {
        let Some(delta) = diff.get_delta(idx) else { continue };
        let Some(path) = delta.new_file().path().or_else(|| delta.old_file().path()).and_then(|p| p.to_str()) else {
            continue;
        };
        let (insertions, deletions) = git2::Patch::from_diff(&diff, idx)
            .ok()
            .flatten()
            .and_then(|mut patch| patch.line_stats().ok())
            .map_or((0, 0), |(_, ins, del)| (ins, del));

        files.push(FileChange {
            path: path.to_string(),
            insertions,
            deletions,
            status: FileStatus::from_delta(delta.status()),
        });
    }

    let stats = DiffStats {
        files_changed: files.len(),
        insertions: files.iter().map(|f| f.insertions).sum(),
        deletions: files.iter().map(|f| f.deletions).sum(),
    };

    let commit_count = count_commits(&repo, start_commit.id(), end_obj.id())?;

    debug!(files = files.len(), commit_count, "extracted diff");

    Ok(DiffRecord {
        files,
        commit_count,
        range: rev_range.to_string(),
        start_commit: start_commit.id().to_string(),
        end_commit: end_obj.id().to_string(),
        stats,
        timestamp: now,
    })
}

/// Counts commits reachable from `end` but not from `start`.
fn count_commits(repo: &git2::Repository, start: git2::Oid, end: git2::Oid) -> Result<usize, DiffError> {
    let mut revwalk = repo.revwalk().map_err(git_err)?;
    revwalk.push(end).map_err(git_err)?;
    if start != end {
        revwalk.hide(start).map_err(git_err)?;
    }
    Ok(revwalk.count())
}

#[cfg(test)]
mod tests {
    use std::process::Command;

    use arc_core::Timestamp;
    use tempfile::TempDir;

    use super::DiffRecord;
    use super::extract_diff;
    use super::parse_rev_range;

    fn init_repo() -> TempDir {
        let dir = TempDir::new().expect("tempdir");
        let run = |args: &[&str]| {
            let status = Command::new("git").args(args).current_dir(dir.path()).status().expect("run git");
            assert!(status.success());
        };
        run(&["init", "-q"]);
        run(&["config", "user.email", "a@example.com"]);
        run(&["config", "user.name", "Alice"]);
        std::fs::write(dir.path().join("a.py"), "one\n").expect("write");
        run(&["add", "a.py"]);
        run(&["commit", "-q", "-m", "first"]);
        std::fs::write(dir.path().join("a.py"), "one\ntwo\n").expect("write");
        run(&["add", "a.py"]);
        run(&["commit", "-q", "-m", "second"]);
        dir
    }

    #[test]
    fn parses_two_dot_and_three_dot_ranges() {
        assert_eq!(parse_rev_range("HEAD~1..HEAD").unwrap(), ("HEAD~1", "HEAD"));
        assert_eq!(parse_rev_range("main...feature").unwrap(), ("main", "feature"));
    }

    #[test]
    fn rejects_range_with_no_separator() {
        assert!(parse_rev_range("HEAD").is_err());
    }

    #[test]
    fn extracts_modified_file_with_line_stats() {
        let dir = init_repo();
        let diff = extract_diff(&dir.path().to_string_lossy(), "HEAD~1..HEAD", Timestamp::from_unix_millis(0)).expect("extract");
        assert_eq!(diff.files.len(), 1);
        assert_eq!(diff.files[0].path, "a.py");
        assert_eq!(diff.files[0].insertions, 1);
        assert_eq!(diff.commit_count, 1);
    }

    #[test]
    fn canonical_value_excludes_timestamp() {
        let dir = init_repo();
        let a = extract_diff(&dir.path().to_string_lossy(), "HEAD~1..HEAD", Timestamp::from_unix_millis(1)).expect("extract a");
        let b = extract_diff(&dir.path().to_string_lossy(), "HEAD~1..HEAD", Timestamp::from_unix_millis(2)).expect("extract b");
        assert_ne!(a.timestamp, b.timestamp);
        assert_eq!(a.canonical_value(), b.canonical_value());
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = init_repo();
        let diff = extract_diff(&dir.path().to_string_lossy(), "HEAD~1..HEAD", Timestamp::from_unix_millis(0)).expect("extract");
        let path = dir.path().join("diff.json");
        std::fs::write(&path, serde_json::to_vec(&diff).expect("serialize")).expect("write");
        let loaded = DiffRecord::load_from_path(&path).expect("load");
        assert_eq!(loaded, diff);
    }

    #[test]
    fn save_to_path_round_trips() {
        let dir = init_repo();
        let diff = extract_diff(&dir.path().to_string_lossy(), "HEAD~1..HEAD", Timestamp::from_unix_millis(0)).expect("extract");
        let path = dir.path().join("saved-diff.json");
        diff.save_to_path(&path).expect("save");
        let loaded = DiffRecord::load_from_path(&path).expect("load");
        assert_eq!(loaded, diff);
    }
}
