// crates/arc-core/src/core/identifiers.rs
// ============================================================================
// Module: Arc Memory Identifiers
// Description: Deterministic, stable node and repository identifiers.
// Purpose: Give every node a string ID whose shape is `<type-tag>:<payload>`
//          and that is a pure function of the node's semantic identity.
// Dependencies: md-5
// ============================================================================

//! ## Overview
//! Node IDs are never generated from counters or wall-clock state: rebuilding
//! the same input must yield the same ID (invariant 1 of the graph store).
//! [`NodeId`] is an opaque, serializable wrapper around the canonical string
//! form; constructors encode the per-type ID grammar so callers cannot build
//! a malformed ID by hand.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Node Identifier
// ============================================================================

/// Opaque node identifier of the form `<type-tag>:<payload>`.
///
/// # Invariants
/// - Stable across rebuilds: identical semantic identity yields an identical
///   string.
/// - Never reused across unrelated node types (the tag prefix disambiguates).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Wraps an already-constructed canonical ID string.
    ///
    /// Prefer the typed constructors below; this exists for deserializing
    /// IDs read back from storage or an export file.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the `<type-tag>` prefix, if the ID contains a `:` separator.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.0.split_once(':').map(|(tag, _)| tag)
    }

    /// Commit node ID: `commit:<sha>`.
    #[must_use]
    pub fn commit(sha: &str) -> Self {
        Self(format!("commit:{sha}"))
    }

    /// File node ID: `file:<repo-relative-path>`.
    #[must_use]
    pub fn file(repo_relative_path: &str) -> Self {
        Self(format!("file:{repo_relative_path}"))
    }

    /// PR node ID keyed by platform and number: `pr:<platform>:<number>`.
    #[must_use]
    pub fn pr_numbered(platform: &str, number: u64) -> Self {
        Self(format!("pr:{platform}:{number}"))
    }

    /// PR node ID keyed by an opaque platform identifier: `pr:<opaque-id>`.
    #[must_use]
    pub fn pr_opaque(opaque_id: &str) -> Self {
        Self(format!("pr:{opaque_id}"))
    }

    /// Issue node ID: `issue:<platform>:<number>`.
    #[must_use]
    pub fn issue(platform: &str, number: u64) -> Self {
        Self(format!("issue:{platform}:{number}"))
    }

    /// ADR node ID: `adr:<basename>`.
    #[must_use]
    pub fn adr(basename: &str) -> Self {
        Self(format!("adr:{basename}"))
    }

    /// Document node ID: `document:<platform>:<id>`.
    #[must_use]
    pub fn document(platform: &str, id: &str) -> Self {
        Self(format!("document:{platform}:{id}"))
    }

    /// Simulation node ID: `simulation:<sim_id>`.
    #[must_use]
    pub fn simulation(sim_id: &str) -> Self {
        Self(format!("simulation:{sim_id}"))
    }

    /// Metric node ID: `metric:<sim_id>:<name>`.
    #[must_use]
    pub fn metric(sim_id: &str, name: &str) -> Self {
        Self(format!("metric:{sim_id}:{name}"))
    }

    /// Service node ID: `service:<name>`.
    #[must_use]
    pub fn service(name: &str) -> Self {
        Self(format!("service:{name}"))
    }

    /// Component node ID: `component:<name>`.
    #[must_use]
    pub fn component(name: &str) -> Self {
        Self(format!("component:{name}"))
    }

    /// Jira-style project node ID: `jira:project:<key>`.
    #[must_use]
    pub fn jira_project(key: &str) -> Self {
        Self(format!("jira:project:{key}"))
    }

    /// Jira-style issue node ID: `jira:issue:<key>`.
    #[must_use]
    pub fn jira_issue(key: &str) -> Self {
        Self(format!("jira:issue:{key}"))
    }

    /// Linear-style document node ID: `linear:<uuid>`.
    #[must_use]
    pub fn linear(uuid: &str) -> Self {
        Self(format!("linear:{uuid}"))
    }

    /// Notion-style document node ID: `notion:<object-type>:<notion-uuid>`.
    #[must_use]
    pub fn notion(object_type: &str, notion_uuid: &str) -> Self {
        Self(format!("notion:{object_type}:{notion_uuid}"))
    }

    /// Reasoning-graph node ID: `reasoning:<subtype>:<id>`.
    #[must_use]
    pub fn reasoning(subtype: &str, id: &str) -> Self {
        Self(format!("reasoning:{subtype}:{id}"))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::from_raw(value)
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self::from_raw(value)
    }
}

// ============================================================================
// SECTION: Repository Identifier
// ============================================================================

/// Repository identifier: `repository:<md5-hex-of-absolute-path>`.
///
/// # Invariants
/// - Deterministic: the same absolute path always yields the same ID.
/// - The absolute path itself is not recoverable from the ID; callers must
///   consult the `repositories` table for `root_path`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoId(String);

impl RepoId {
    /// Builds a repository ID from an absolute filesystem path.
    #[must_use]
    pub fn from_absolute_path(absolute_path: &str) -> Self {
        let digest = md5::Md5::compute_hex(absolute_path.as_bytes());
        Self(format!("repository:{digest}"))
    }

    /// Wraps an already-constructed `repository:<hex>` ID.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Minimal MD5 facade so call sites read as `md5::Md5::compute_hex(..)`
/// rather than reaching for the `md-5` crate's `Digest` trait directly.
mod md5 {
    use md5::Digest;
    use md5::Md5 as RawMd5;

    /// Thin wrapper exposing a single hex-digest convenience function.
    pub struct Md5;

    impl Md5 {
        /// Computes the lowercase hex MD5 digest of `bytes`.
        pub fn compute_hex(bytes: &[u8]) -> String {
            let mut hasher = RawMd5::new();
            hasher.update(bytes);
            let digest = hasher.finalize();
            hex::encode(digest)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::NodeId;
    use super::RepoId;

    #[test]
    fn node_id_constructors_follow_type_tag_payload_shape() {
        assert_eq!(NodeId::commit("abc123").as_str(), "commit:abc123");
        assert_eq!(NodeId::file("src/a.py").as_str(), "file:src/a.py");
        assert_eq!(NodeId::pr_numbered("github", 42).as_str(), "pr:github:42");
        assert_eq!(NodeId::adr("0001-auth.md").as_str(), "adr:0001-auth.md");
        assert_eq!(NodeId::metric("sim_1", "latency_ms").as_str(), "metric:sim_1:latency_ms");
    }

    #[test]
    fn node_id_tag_extracts_prefix() {
        assert_eq!(NodeId::commit("abc123").tag(), Some("commit"));
    }

    #[test]
    fn repo_id_is_deterministic_for_identical_paths() {
        let a = RepoId::from_absolute_path("/home/user/project");
        let b = RepoId::from_absolute_path("/home/user/project");
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("repository:"));
    }

    #[test]
    fn repo_id_differs_for_distinct_paths() {
        let a = RepoId::from_absolute_path("/home/user/project-a");
        let b = RepoId::from_absolute_path("/home/user/project-b");
        assert_ne!(a, b);
    }
}
