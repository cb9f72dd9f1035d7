// crates/arc-trace/src/blame.rs
// ============================================================================
// Module: Line Blame
// Description: Resolves the commit that last touched a given file/line via
//              `git2`'s blame API (the porcelain-equivalent of
//              `git blame -L <line>,<line>`).
// Purpose: Entry point of the trace: `trace_history_for_file_line` starts
//          from a commit SHA it has to compute itself.
// Dependencies: git2
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use arc_core::ArcError;
use arc_core::ArcErrorKind;
use git2::BlameOptions;
use git2::Repository;

/// Resolves the commit SHA that introduced the current content of
/// `file_path` at `line_number` (one-indexed), in `repo_path`.
///
/// # Errors
///
/// Returns [`ArcError`] with kind [`ArcErrorKind::NotFound`] when the
/// repository cannot be opened or the line has no blame hunk (e.g. the
/// file or line does not exist at `HEAD`).
pub fn blame_commit_for_line(repo_path: &str, file_path: &str, line_number: u32) -> Result<String, ArcError> {
    let repo = Repository::open(repo_path)
        .map_err(|e| ArcError::new(ArcErrorKind::NotFound, e.to_string()).with_detail("source", "git").with_detail("repo_path", repo_path.to_string()))?;

    let mut opts = BlameOptions::new();
    opts.track_copies_same_file(true);

    let blame = repo
        .blame_file(std::path::Path::new(file_path), Some(&mut opts))
        .map_err(|e| ArcError::new(ArcErrorKind::NotFound, e.to_string()).with_detail("source", "git").with_detail("file_path", file_path.to_string()))?;

    let hunk = blame
        .get_line(line_number as usize)
        .ok_or_else(|| ArcError::not_found(format!("no blame hunk for {file_path}:{line_number}")).with_detail("source", "git"))?;

    Ok(hunk.final_commit_id().to_string())
}

#[cfg(test)]
mod tests {
    use std::process::Command;

    use tempfile::TempDir;

    use super::blame_commit_for_line;

    fn init_repo() -> TempDir {
        let dir = TempDir::new().expect("tempdir");
        let run = |args: &[&str]| {
            let status = Command::new("git").args(args).current_dir(dir.path()).status().expect("run git");
            assert!(status.success());
        };
        run(&["init", "-q"]);
        run(&["config", "user.email", "a@example.com"]);
        run(&["config", "user.name", "Alice"]);
        std::fs::write(dir.path().join("x.py"), "line one\nline two\nline three\n").expect("write file");
        run(&["add", "x.py"]);
        run(&["commit", "-q", "-m", "first"]);
        dir
    }

    #[test]
    fn blame_resolves_a_commit_sha_for_an_existing_line() {
        let dir = init_repo();
        let repo_path = dir.path().to_string_lossy().to_string();
        let sha = blame_commit_for_line(&repo_path, "x.py", 2).expect("blame");
        assert_eq!(sha.len(), 40);
    }

    #[test]
    fn blame_fails_for_nonexistent_file() {
        let dir = init_repo();
        let repo_path = dir.path().to_string_lossy().to_string();
        assert!(blame_commit_for_line(&repo_path, "missing.py", 1).is_err());
    }
}
