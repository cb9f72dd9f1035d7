// crates/arc-core/src/core/manifest.rs
// ============================================================================
// Module: Build Manifest
// Description: Per-repository build bookkeeping: ingestor cursors, status,
//              and summaries, persisted across incremental builds.
// Purpose: Let the orchestrator resume each ingestor from where it left off
//          without re-walking history it already ingested.
// Dependencies: serde, serde_json, crate::core::time
// ============================================================================

//! ## Overview
//! A [`BuildManifest`] is the persisted record of the last build for one
//! repository: a cursor per ingestor (an opaque string the ingestor itself
//! defines and interprets: a commit SHA, an ETag, a page token) plus a
//! per-ingestor [`IngestorSummary`]. The orchestrator loads the manifest
//! before a build, passes each ingestor its own cursor, and writes back an
//! updated manifest after the build transaction commits (invariant: a
//! manifest is only persisted once the corresponding graph writes are
//! durable, never before).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Ingestor Status
// ============================================================================

/// Terminal status of a single ingestor's most recent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestorStatus {
    /// Completed without error.
    Success,
    /// Completed with one or more non-fatal item-level failures.
    Partial,
    /// Did not complete; the orchestrator continued with other ingestors.
    Failed,
    /// Skipped because it was not configured or not selected for this build.
    Skipped,
}

// ============================================================================
// SECTION: Ingestor Summary
// ============================================================================

/// Per-ingestor outcome recorded for one build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestorSummary {
    /// Ingestor name (matches its registry key).
    pub name: String,
    /// Terminal status for this run.
    pub status: IngestorStatus,
    /// Nodes emitted this run.
    pub nodes_emitted: u64,
    /// Edges emitted this run.
    pub edges_emitted: u64,
    /// Non-fatal item-level errors encountered, as human-readable messages.
    #[serde(default)]
    pub errors: Vec<String>,
    /// Wall-clock duration of this ingestor's run, in milliseconds.
    pub duration_ms: u64,
    /// Opaque resume cursor this ingestor should be given on its next run,
    /// if it supports incremental resumption.
    pub next_cursor: Option<String>,
}

impl IngestorSummary {
    /// Builds a summary for an ingestor that completed successfully with no
    /// errors.
    #[must_use]
    pub fn success(name: impl Into<String>, nodes_emitted: u64, edges_emitted: u64, duration_ms: u64) -> Self {
        Self {
            name: name.into(),
            status: IngestorStatus::Success,
            nodes_emitted,
            edges_emitted,
            errors: Vec::new(),
            duration_ms,
            next_cursor: None,
        }
    }

    /// Builds a summary for an ingestor that failed before emitting a
    /// complete result.
    #[must_use]
    pub fn failed(name: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            name: name.into(),
            status: IngestorStatus::Failed,
            nodes_emitted: 0,
            edges_emitted: 0,
            errors: vec![error.into()],
            duration_ms,
            next_cursor: None,
        }
    }

    /// Sets the resume cursor, returning `self` for chaining.
    #[must_use]
    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.next_cursor = Some(cursor.into());
        self
    }

    /// Demotes a successful summary to [`IngestorStatus::Partial`] and
    /// records one non-fatal error, returning `self` for chaining.
    #[must_use]
    pub fn with_partial_error(mut self, error: impl Into<String>) -> Self {
        if self.status == IngestorStatus::Success {
            self.status = IngestorStatus::Partial;
        }
        self.errors.push(error.into());
        self
    }
}

// ============================================================================
// SECTION: Build Manifest
// ============================================================================

/// Persisted build bookkeeping for one repository.
///
/// # Invariants
/// - `cursors` keys are ingestor names; an ingestor absent from `cursors`
///   has never completed a run for this repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildManifest {
    /// Schema version of this manifest shape.
    pub schema_version: u32,
    /// Repository this manifest describes.
    pub repo_id: String,
    /// Timestamp of the build this manifest reflects.
    pub built_at: Timestamp,
    /// Resume cursor per ingestor name.
    #[serde(default)]
    pub cursors: BTreeMap<String, String>,
    /// Per-ingestor summary for the most recent build.
    #[serde(default)]
    pub summaries: Vec<IngestorSummary>,
    /// Total node row count immediately after this build's transaction
    /// committed (invariant 7: must equal the store's actual count).
    #[serde(default)]
    pub node_count: u64,
    /// Total edge row count immediately after this build's transaction
    /// committed (invariant 7: must equal the store's actual count).
    #[serde(default)]
    pub edge_count: u64,
}

impl BuildManifest {
    /// Current manifest schema version.
    pub const SCHEMA_VERSION: u32 = 1;

    /// Builds an empty manifest for a repository that has never been built.
    #[must_use]
    pub fn new(repo_id: impl Into<String>, built_at: Timestamp) -> Self {
        Self {
            schema_version: Self::SCHEMA_VERSION,
            repo_id: repo_id.into(),
            built_at,
            cursors: BTreeMap::new(),
            summaries: Vec::new(),
            node_count: 0,
            edge_count: 0,
        }
    }

    /// Returns the resume cursor for `ingestor`, if one was recorded.
    #[must_use]
    pub fn cursor_for(&self, ingestor: &str) -> Option<&str> {
        self.cursors.get(ingestor).map(String::as_str)
    }

    /// Applies one ingestor's summary to this manifest: records its cursor
    /// (if any) and appends (replacing any prior entry for the same name)
    /// its summary.
    pub fn record(&mut self, summary: IngestorSummary) {
        if let Some(cursor) = &summary.next_cursor {
            self.cursors.insert(summary.name.clone(), cursor.clone());
        }
        self.summaries.retain(|existing| existing.name != summary.name);
        self.summaries.push(summary);
    }

    /// Returns whether every recorded summary reached
    /// [`IngestorStatus::Success`] or [`IngestorStatus::Skipped`].
    #[must_use]
    pub fn all_clean(&self) -> bool {
        self.summaries
            .iter()
            .all(|s| matches!(s.status, IngestorStatus::Success | IngestorStatus::Skipped))
    }
}

#[cfg(test)]
mod tests {
    use super::BuildManifest;
    use super::IngestorStatus;
    use super::IngestorSummary;
    use crate::core::time::Timestamp;

    #[test]
    fn record_updates_cursor_and_replaces_prior_summary() {
        let mut manifest = BuildManifest::new("repo-a", Timestamp::from_unix_millis(0));
        manifest.record(IngestorSummary::success("git", 10, 5, 100).with_cursor("sha-1"));
        assert_eq!(manifest.cursor_for("git"), Some("sha-1"));

        manifest.record(IngestorSummary::success("git", 2, 1, 50).with_cursor("sha-2"));
        assert_eq!(manifest.cursor_for("git"), Some("sha-2"));
        assert_eq!(manifest.summaries.len(), 1);
    }

    #[test]
    fn all_clean_is_false_when_any_ingestor_failed() {
        let mut manifest = BuildManifest::new("repo-a", Timestamp::from_unix_millis(0));
        manifest.record(IngestorSummary::success("git", 1, 1, 10));
        manifest.record(IngestorSummary::failed("adr", "glob error", 5));
        assert!(!manifest.all_clean());
    }

    #[test]
    fn partial_error_demotes_status_once() {
        let summary = IngestorSummary::success("git", 1, 1, 10).with_partial_error("bad commit");
        assert_eq!(summary.status, IngestorStatus::Partial);
        assert_eq!(summary.errors.len(), 1);
    }
}
