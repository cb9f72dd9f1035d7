// crates/arc-core/src/core/edge.rs
// ============================================================================
// Module: Arc Memory Edge Schema
// Description: Closed edge-relation enumeration and the edge record.
// Purpose: `(src, dst, relation)` uniqueness is the graph's primary key.
// Dependencies: serde, serde_json, crate::core::identifiers
// ============================================================================

//! ## Overview
//! An edge is `(src_id, dst_id, relation, properties)`.
//! `(src, dst, relation)` is a primary key: re-ingesting the same relation is
//! a no-op (invariant 3), which is what makes ingestor emissions idempotent
//! under deterministic IDs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::identifiers::NodeId;

// ============================================================================
// SECTION: Edge Relation
// ============================================================================

/// Closed set of edge relation labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeRel {
    /// Structural containment (e.g. repository contains file).
    Contains,
    /// Dependency relation (e.g. service depends on service).
    DependsOn,
    /// Membership relation (e.g. issue part of project).
    PartOf,
    /// Change-impact relation (e.g. simulation affects file/service).
    Affects,
    /// Causal attribution (e.g. fault caused by change).
    CausedBy,
    /// A commit was merged via a PR.
    Merges,
    /// A body mentions another entity.
    Mentions,
    /// An ADR decides something about a file.
    Decides,
    /// One entity blocks another.
    Blocks,
    /// Sequential successor relation.
    Follows,
    /// Sequential predecessor relation.
    Precedes,
    /// A simulation has an associated metric.
    HasMetric,
    /// A node has an associated annotation.
    HasAnnotation,
    /// A simulation simulates a commit or PR.
    Simulates,
    /// A simulation measures a metric.
    Measures,
    /// A simulation predicts impact on a service.
    Predicts,
    /// Reasoning: a node reasons about a subject.
    ReasonsAbout,
    /// Reasoning: a question has an alternative.
    HasAlternative,
    /// Reasoning: an alternative has an evaluation criterion.
    HasCriterion,
    /// Reasoning: sequential reasoning step.
    NextStep,
    /// Reasoning: a step has an implication.
    HasImplication,
}

impl EdgeRel {
    /// Returns the wire label exactly as specified, independent of
    /// `serde`'s rename so callers building export JSON by hand can match
    /// it without going through serialization.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Contains => "CONTAINS",
            Self::DependsOn => "DEPENDS_ON",
            Self::PartOf => "PART_OF",
            Self::Affects => "AFFECTS",
            Self::CausedBy => "CAUSED_BY",
            Self::Merges => "MERGES",
            Self::Mentions => "MENTIONS",
            Self::Decides => "DECIDES",
            Self::Blocks => "BLOCKS",
            Self::Follows => "FOLLOWS",
            Self::Precedes => "PRECEDES",
            Self::HasMetric => "HAS_METRIC",
            Self::HasAnnotation => "HAS_ANNOTATION",
            Self::Simulates => "SIMULATES",
            Self::Measures => "MEASURES",
            Self::Predicts => "PREDICTS",
            Self::ReasonsAbout => "REASONS_ABOUT",
            Self::HasAlternative => "HAS_ALTERNATIVE",
            Self::HasCriterion => "HAS_CRITERION",
            Self::NextStep => "NEXT_STEP",
            Self::HasImplication => "HAS_IMPLICATION",
        }
    }
}

// ============================================================================
// SECTION: Edge
// ============================================================================

/// A directed, typed edge in the property graph.
///
/// # Invariants
/// - `(src, dst, relation)` is unique; re-ingesting a duplicate is a no-op.
/// - After a build transaction commits, both endpoints must exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Source node ID.
    pub src: NodeId,
    /// Destination node ID.
    pub dst: NodeId,
    /// Edge relation label.
    pub relation: EdgeRel,
    /// Arbitrary edge properties.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Edge {
    /// Builds an edge with no properties.
    #[must_use]
    pub fn new(src: NodeId, dst: NodeId, relation: EdgeRel) -> Self {
        Self {
            src,
            dst,
            relation,
            properties: Map::new(),
        }
    }

    /// Returns the `(src, dst, relation)` primary key as owned parts.
    #[must_use]
    pub fn key(&self) -> (NodeId, NodeId, EdgeRel) {
        (self.src.clone(), self.dst.clone(), self.relation)
    }
}

#[cfg(test)]
mod tests {
    use super::Edge;
    use super::EdgeRel;
    use crate::core::identifiers::NodeId;

    #[test]
    fn edge_label_uses_screaming_snake_case() {
        assert_eq!(EdgeRel::DependsOn.label(), "DEPENDS_ON");
        assert_eq!(EdgeRel::HasAnnotation.label(), "HAS_ANNOTATION");
    }

    #[test]
    fn edge_key_is_stable_for_equal_edges() {
        let a = Edge::new(NodeId::commit("a"), NodeId::pr_opaque("1"), EdgeRel::Merges);
        let b = Edge::new(NodeId::commit("a"), NodeId::pr_opaque("1"), EdgeRel::Merges);
        assert_eq!(a.key(), b.key());
    }
}
