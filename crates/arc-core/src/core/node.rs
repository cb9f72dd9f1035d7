// crates/arc-core/src/core/node.rs
// ============================================================================
// Module: Arc Memory Node Schema
// Description: Closed node-type enumeration and the property-graph node
//              record, including type-specialized attributes.
// Purpose: One typed representation for every tag family the graph stores.
// Dependencies: serde, serde_json, crate::core::identifiers, crate::core::time
// ============================================================================

//! ## Overview
//! A node is identified by a [`NodeId`] of the form `<type-tag>:<payload>`
//! and carries the attributes common to every node plus, when the
//! type has one, a [`NodeSpecialized`] payload. Reasoning-graph nodes
//! (`reasoning:question:*` and friends) are accepted as opaque.
//! [`NodeSpecialized::Reasoning`] carries only a free-form subtype tag and
//! lets the `extra` map hold whatever an external generator produced; this
//! crate neither generates nor validates their content.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::identifiers::NodeId;
use crate::core::identifiers::RepoId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Node Type
// ============================================================================

/// Closed set of node tag families.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// A file tracked in a repository.
    File,
    /// A Git commit.
    Commit,
    /// A pull/merge request.
    Pr,
    /// An issue or ticket.
    Issue,
    /// An architectural decision record.
    Adr,
    /// A document from a doc platform (Linear-, Notion-like).
    Document,
    /// A free-form concept extracted during enrichment.
    Concept,
    /// A logical code component.
    Component,
    /// A deployable service.
    Service,
    /// A registered repository (multi-repo partitioning).
    Repository,
    /// A recorded simulation run.
    Simulation,
    /// A numeric metric observed during a simulation.
    Metric,
    /// A fault injected by a simulation scenario.
    Fault,
    /// A free-form annotation attached to another node.
    Annotation,
    /// A reasoning-graph node produced by an external generator; `String`
    /// carries the subtype (`question`, `alternative`, `step`, ...).
    Reasoning(String),
}

impl NodeType {
    /// Returns the `<type-tag>` this node type serializes as in a [`NodeId`].
    #[must_use]
    pub fn tag(&self) -> String {
        match self {
            Self::File => "file".to_string(),
            Self::Commit => "commit".to_string(),
            Self::Pr => "pr".to_string(),
            Self::Issue => "issue".to_string(),
            Self::Adr => "adr".to_string(),
            Self::Document => "document".to_string(),
            Self::Concept => "concept".to_string(),
            Self::Component => "component".to_string(),
            Self::Service => "service".to_string(),
            Self::Repository => "repository".to_string(),
            Self::Simulation => "simulation".to_string(),
            Self::Metric => "metric".to_string(),
            Self::Fault => "fault".to_string(),
            Self::Annotation => "annotation".to_string(),
            Self::Reasoning(subtype) => format!("reasoning:{subtype}"),
        }
    }

    /// Reconstructs a [`NodeType`] from its [`Self::tag`] string.
    ///
    /// Returns `None` for an unrecognized tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "file" => Self::File,
            "commit" => Self::Commit,
            "pr" => Self::Pr,
            "issue" => Self::Issue,
            "adr" => Self::Adr,
            "document" => Self::Document,
            "concept" => Self::Concept,
            "component" => Self::Component,
            "service" => Self::Service,
            "repository" => Self::Repository,
            "simulation" => Self::Simulation,
            "metric" => Self::Metric,
            "fault" => Self::Fault,
            "annotation" => Self::Annotation,
            other => {
                let subtype = other.strip_prefix("reasoning:")?;
                Self::Reasoning(subtype.to_string())
            }
        })
    }
}

// ============================================================================
// SECTION: Type-Specialized Attributes
// ============================================================================

/// Type-specialized attributes for a node, or [`Generic`] for
/// node types with no required specialization.
///
/// [`Generic`]: NodeSpecialized::Generic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeSpecialized {
    /// A file node's specialization.
    File {
        /// Repository-relative path.
        path: String,
        /// Detected source language, if any.
        language: Option<String>,
        /// Last modification timestamp.
        last_modified: Option<Timestamp>,
    },
    /// A commit node's specialization.
    Commit {
        /// Commit SHA (also embedded in the node ID).
        sha: String,
        /// Commit author identity (name or handle).
        author: String,
        /// Repository-relative paths touched by the commit.
        files: Vec<String>,
    },
    /// A pull/merge request node's specialization.
    Pr {
        /// Platform-assigned PR number.
        number: u64,
        /// Current PR state (platform-defined string, e.g. `"open"`).
        state: String,
        /// Canonical URL to the PR.
        url: String,
        /// Merge timestamp, if merged.
        merged_at: Option<Timestamp>,
        /// Identity of the merging actor, if merged.
        merged_by: Option<String>,
        /// SHA of the merge commit, if merged.
        merged_commit_sha: Option<String>,
    },
    /// An issue node's specialization.
    Issue {
        /// Platform-assigned issue number.
        number: u64,
        /// Current issue state.
        state: String,
        /// Close timestamp, if closed.
        closed_at: Option<Timestamp>,
        /// Labels attached to the issue.
        labels: Vec<String>,
    },
    /// An ADR node's specialization.
    Adr {
        /// Decision status (e.g. `"Accepted"`, `"Proposed"`).
        status: String,
        /// Identities of the recorded decision makers.
        decision_makers: Vec<String>,
        /// Repository-relative path to the ADR file.
        path: String,
    },
    /// A simulation node's specialization. Immutable once written
    /// (invariant 6): updates require a new `sim_id`.
    Simulation {
        /// Simulation identifier.
        sim_id: String,
        /// Git revision range simulated.
        rev_range: String,
        /// Fault-injection scenario.
        scenario: String,
        /// Severity, `0..=100`.
        severity: u8,
        /// Risk score, `0..=100`.
        risk_score: u8,
        /// Hex digest of the canonical manifest JSON.
        manifest_hash: String,
        /// Target commit SHA.
        commit_target: String,
        /// Hex digest of the canonical diff JSON.
        diff_hash: String,
        /// Services the simulation predicted as affected.
        affected_services: Vec<String>,
    },
    /// A metric node's specialization.
    Metric {
        /// Metric name.
        name: String,
        /// Metric value.
        value: f64,
        /// Metric unit, if any.
        unit: Option<String>,
        /// Service the metric was collected for, if any.
        service: Option<String>,
    },
    /// No type-specific attributes beyond the common node fields.
    Generic,
}

impl NodeSpecialized {
    /// Returns the timestamp implied by this node's type-specific fields, if
    /// any (`merged_at`, `closed_at`, `last_modified`), for timestamp
    /// normalization.
    #[must_use]
    pub const fn type_specific_timestamp(&self) -> Option<Timestamp> {
        match self {
            Self::File { last_modified, .. } => *last_modified,
            Self::Pr { merged_at, .. } => *merged_at,
            Self::Issue { closed_at, .. } => *closed_at,
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Node
// ============================================================================

/// A node in the property graph.
///
/// # Invariants
/// - `id` is a deterministic function of semantic identity.
/// - `repo_id`, when set, references a row in the `repositories` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique, deterministic node identifier.
    pub id: NodeId,
    /// Node type tag family.
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Optional display title.
    pub title: Option<String>,
    /// Optional free-form body text.
    pub body: Option<String>,
    /// Optional primary timestamp.
    pub ts: Option<Timestamp>,
    /// Arbitrary key/value attributes not promoted to typed fields.
    #[serde(default)]
    pub extra: Map<String, Value>,
    /// Owning repository, when the node is repository-scoped.
    pub repo_id: Option<RepoId>,
    /// Type-specialized attributes.
    pub specialized: NodeSpecialized,
}

impl Node {
    /// Builds a node with no title, body, timestamp, extras, or repository.
    #[must_use]
    pub fn new(id: NodeId, node_type: NodeType, specialized: NodeSpecialized) -> Self {
        Self {
            id,
            node_type,
            title: None,
            body: None,
            ts: None,
            extra: Map::new(),
            repo_id: None,
            specialized,
        }
    }

    /// Sets the display title, returning `self` for chaining.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the primary timestamp, returning `self` for chaining.
    #[must_use]
    pub const fn with_ts(mut self, ts: Timestamp) -> Self {
        self.ts = Some(ts);
        self
    }

    /// Sets the owning repository, returning `self` for chaining.
    #[must_use]
    pub fn with_repo(mut self, repo_id: RepoId) -> Self {
        self.repo_id = Some(repo_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::Node;
    use super::NodeSpecialized;
    use super::NodeType;
    use crate::core::identifiers::NodeId;

    #[test]
    fn node_type_tag_matches_closed_set_spelling() {
        assert_eq!(NodeType::File.tag(), "file");
        assert_eq!(NodeType::Adr.tag(), "adr");
        assert_eq!(NodeType::Reasoning("question".to_string()).tag(), "reasoning:question");
    }

    #[test]
    fn node_type_from_tag_round_trips() {
        assert_eq!(NodeType::from_tag("file"), Some(NodeType::File));
        assert_eq!(
            NodeType::from_tag("reasoning:question"),
            Some(NodeType::Reasoning("question".to_string()))
        );
        assert_eq!(NodeType::from_tag("bogus"), None);
    }

    #[test]
    fn node_round_trips_through_json() {
        let node = Node::new(
            NodeId::commit("abc123"),
            NodeType::Commit,
            NodeSpecialized::Commit {
                sha: "abc123".to_string(),
                author: "alice".to_string(),
                files: vec!["src/a.py".to_string()],
            },
        )
        .with_title("abc123");
        let json = serde_json::to_string(&node).expect("serialize");
        let back: Node = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(node, back);
    }
}
