// crates/arc-query/src/lib.rs
// ============================================================================
// Module: Arc Memory Memory/Query Layer
// Description: Read-only queries over persisted simulations: direct lookup,
//              service/file indices, and Jaccard similarity search.
// Purpose: Let the simulation workflow and external callers ask "what ran
//          against this service" and "what looked like this before" without
//          re-deriving the answer from raw edges each time.
// Dependencies: arc-core
// ============================================================================

//! ## Overview
//! Every simulation node carries its own `affected_services` list in
//! [`arc_core::NodeSpecialized::Simulation`], so similarity search reads
//! node attributes directly rather than re-walking `PREDICTS` edges.
//! [`get_similar_simulations`] ranks by Jaccard overlap of affected-service
//! sets, with optional scenario and severity-band filters.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt::Write as _;

use arc_core::EdgeRel;
use arc_core::Node;
use arc_core::NodeSpecialized;
use arc_core::NodeType;
use arc_core::resolve_effective_timestamp;
use arc_core::interfaces::GraphStore;
use arc_core::interfaces::StoreError;
use tracing::instrument;

// ============================================================================
// SECTION: Direct Lookups
// ============================================================================

/// Looks up a simulation node by its `simulation:<sim_id>` identifier.
///
/// # Errors
///
/// Returns [`StoreError`] on store I/O failure.
pub fn get_simulation_by_id(store: &dyn GraphStore, sim_id: &str) -> Result<Option<Node>, StoreError> {
    store.get_node_by_id(&format!("simulation:{sim_id}"))
}

/// Returns up to `limit` simulations that predicted impact on `service_id`,
/// most recent first.
///
/// # Errors
///
/// Returns [`StoreError`] on store I/O failure.
#[instrument(skip(store))]
pub fn get_simulations_by_service(store: &dyn GraphStore, service_id: &str, limit: usize) -> Result<Vec<Node>, StoreError> {
    let edges = store.get_edges_by_dst(service_id, Some(EdgeRel::Predicts))?;
    let mut sims = Vec::new();
    for edge in edges {
        if let Some(node) = store.get_node_by_id(edge.src.as_str())? {
            sims.push(node);
        }
    }
    sort_recent_first(&mut sims);
    sims.truncate(limit);
    Ok(sims)
}

/// Returns up to `limit` simulations that recorded impact on `file_id`,
/// most recent first.
///
/// # Errors
///
/// Returns [`StoreError`] on store I/O failure.
#[instrument(skip(store))]
pub fn get_simulations_by_file(store: &dyn GraphStore, file_id: &str, limit: usize) -> Result<Vec<Node>, StoreError> {
    let edges = store.get_edges_by_dst(file_id, Some(EdgeRel::Affects))?;
    let mut sims = Vec::new();
    for edge in edges {
        if let Some(node) = store.get_node_by_id(edge.src.as_str())?
            && node.node_type == NodeType::Simulation
        {
            sims.push(node);
        }
    }
    sort_recent_first(&mut sims);
    sims.truncate(limit);
    Ok(sims)
}

/// Returns every metric node a simulation measured, via its `MEASURES`
/// edges.
///
/// # Errors
///
/// Returns [`StoreError`] on store I/O failure.
#[instrument(skip(store))]
pub fn get_simulation_metrics(store: &dyn GraphStore, sim_id: &str) -> Result<Vec<Node>, StoreError> {
    let sim_node_id = format!("simulation:{sim_id}");
    let edges = store.get_edges_by_src(&sim_node_id, Some(EdgeRel::Measures))?;
    let mut metrics = Vec::new();
    for edge in edges {
        if let Some(node) = store.get_node_by_id(edge.dst.as_str())? {
            metrics.push(node);
        }
    }
    Ok(metrics)
}

/// Sorts `nodes` by effective timestamp descending; nodes with no
/// resolvable timestamp sort last.
fn sort_recent_first(nodes: &mut [Node]) {
    nodes.sort_by(|a, b| match (resolve_effective_timestamp(a), resolve_effective_timestamp(b)) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

// ============================================================================
// SECTION: Similarity Search
// ============================================================================

/// Inclusive severity band filter for [`get_similar_simulations`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeverityRange {
    /// Lower bound, inclusive.
    pub min: u8,
    /// Upper bound, inclusive.
    pub max: u8,
}

impl SeverityRange {
    /// Returns whether `severity` falls within this band.
    #[must_use]
    pub const fn contains(&self, severity: u8) -> bool {
        severity >= self.min && severity <= self.max
    }
}

/// One similarity search result: the simulation plus its overlap with the
/// query's affected-service set.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarSimulation {
    /// The matched simulation node.
    pub node: Node,
    /// Count of services shared between the query and this simulation.
    pub overlap: usize,
    /// Jaccard similarity: `|intersection| / |union|`.
    pub jaccard: f64,
}

/// Finds past simulations whose affected-service set overlaps
/// `affected_services`, optionally restricted to a `scenario` and/or
/// `severity_range`, ranked by overlap size descending (ties broken by
/// Jaccard similarity descending) and truncated to `limit`.
///
/// # Errors
///
/// Returns [`StoreError`] on store I/O failure.
#[instrument(skip(store, affected_services))]
pub fn get_similar_simulations(store: &dyn GraphStore, affected_services: &BTreeSet<String>, scenario: Option<&str>, severity_range: Option<SeverityRange>, limit: usize) -> Result<Vec<SimilarSimulation>, StoreError> {
    let candidates = store.get_nodes_by_type(&NodeType::Simulation, None)?;

    let mut scored: Vec<SimilarSimulation> = candidates
        .into_iter()
        .filter_map(|node| {
            let NodeSpecialized::Simulation {
                scenario: node_scenario,
                severity: node_severity,
                ref affected_services_list,
                ..
            } = node.specialized
            else {
                return None;
            };
            if let Some(wanted) = scenario
                && wanted != node_scenario
            {
                return None;
            }
            if let Some(range) = severity_range
                && !range.contains(node_severity)
            {
                return None;
            }

            let candidate_set: BTreeSet<String> = affected_services_list.iter().cloned().collect();
            let overlap = affected_services.intersection(&candidate_set).count();
            let union = affected_services.union(&candidate_set).count();
            let jaccard = if union == 0 { 0.0 } else { overlap as f64 / union as f64 };

            Some(SimilarSimulation { node, overlap, jaccard })
        })
        .collect();

    scored.sort_by(|a, b| b.overlap.cmp(&a.overlap).then_with(|| b.jaccard.partial_cmp(&a.jaccard).unwrap_or(std::cmp::Ordering::Equal)));
    scored.truncate(limit);
    Ok(scored)
}

// ============================================================================
// SECTION: Explanation Enhancement
// ============================================================================

/// Query context for [`enhance_explanation`]: the change under
/// consideration, described the same way a simulation manifest would be.
#[derive(Debug, Clone, Default)]
pub struct EnhancementContext {
    /// Services the pending simulation affects.
    pub affected_services: BTreeSet<String>,
    /// Scenario of the pending simulation, if filtering by it.
    pub scenario: Option<String>,
    /// How many historical simulations to summarize.
    pub sample_size: usize,
}

impl EnhancementContext {
    /// Default sample size when unset (`0`).
    pub const DEFAULT_SAMPLE_SIZE: usize = 5;
}

/// Appends a historical-context paragraph to `text`, summarizing the
/// average risk score of past simulations similar to `context`. Returns
/// `text` unchanged (no paragraph appended) when no similar simulations are
/// found.
///
/// # Errors
///
/// Returns [`StoreError`] on store I/O failure.
#[instrument(skip(store, text, context))]
pub fn enhance_explanation(text: &str, context: &EnhancementContext, store: &dyn GraphStore) -> Result<String, StoreError> {
    let sample_size = if context.sample_size == 0 { EnhancementContext::DEFAULT_SAMPLE_SIZE } else { context.sample_size };
    let similar = get_similar_simulations(store, &context.affected_services, context.scenario.as_deref(), None, sample_size)?;

    if similar.is_empty() {
        return Ok(text.to_string());
    }

    let risk_scores: Vec<u8> = similar
        .iter()
        .filter_map(|s| match s.node.specialized {
            NodeSpecialized::Simulation { risk_score, .. } => Some(risk_score),
            _ => None,
        })
        .collect();
    let average_risk = if risk_scores.is_empty() {
        0.0
    } else {
        f64::from(risk_scores.iter().map(|&r| u32::from(r)).sum::<u32>()) / risk_scores.len() as f64
    };

    let sim_ids: Vec<&str> = similar.iter().map(|s| s.node.id.as_str()).collect();

    let mut enhanced = text.to_string();
    let _ = write!(
        enhanced,
        "\n\nHistorical context: {count} similar past simulation(s) averaged a risk score of {average_risk:.1}. Most similar: {ids}.",
        count = similar.len(),
        ids = sim_ids.join(", "),
    );
    Ok(enhanced)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::collections::BTreeSet;

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

    use super::EnhancementContext;
    use super::SeverityRange;
    use super::enhance_explanation;
    use super::get_similar_simulations;
    use super::get_simulation_by_id;
    use super::get_simulation_metrics;
    use super::get_simulations_by_service;

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

    fn sim_node(sim_id: &str, scenario: &str, severity: u8, risk_score: u8, affected_services: &[&str]) -> Node {
        Node::new(
            NodeId::simulation(sim_id),
            NodeType::Simulation,
            NodeSpecialized::Simulation {
                sim_id: sim_id.to_string(),
                rev_range: "HEAD~1..HEAD".to_string(),
                scenario: scenario.to_string(),
                severity,
                risk_score,
                manifest_hash: "hash".to_string(),
                commit_target: "abc".to_string(),
                diff_hash: "diffhash".to_string(),
                affected_services: affected_services.iter().map(|s| (*s).to_string()).collect(),
            },
        )
    }

    #[test]
    fn get_simulation_by_id_finds_the_node() {
        let node = sim_node("sim1", "network_latency", 50, 25, &["a"]);
        let store = FakeStore { nodes: vec![node.clone()], edges: Vec::new() };
        let found = get_simulation_by_id(&store, "sim1").expect("lookup").expect("present");
        assert_eq!(found.id, node.id);
    }

    #[test]
    fn similar_simulations_rank_by_overlap_size() {
        let sim_ab = sim_node("sim_ab", "network_latency", 50, 25, &["A", "B"]);
        let sim_ac = sim_node("sim_ac", "network_latency", 50, 25, &["A", "C"]);
        let sim_de = sim_node("sim_de", "network_latency", 50, 25, &["D", "E"]);
        let store = FakeStore {
            nodes: vec![sim_ab.clone(), sim_ac.clone(), sim_de],
            edges: Vec::new(),
        };

        let query: BTreeSet<String> = ["A", "B", "C"].into_iter().map(String::from).collect();
        let results = get_similar_simulations(&store, &query, None, None, 2).expect("similar");
        assert_eq!(results.len(), 2);
        let ids: BTreeSet<String> = results.iter().map(|r| r.node.id.as_str().to_string()).collect();
        assert!(ids.contains(sim_ab.id.as_str()));
        assert!(ids.contains(sim_ac.id.as_str()));
        assert!(results[0].overlap >= results[1].overlap);
    }

    #[test]
    fn severity_range_filters_out_of_band_simulations() {
        let low = sim_node("low", "cpu_stress", 10, 5, &["A"]);
        let high = sim_node("high", "cpu_stress", 90, 45, &["A"]);
        let store = FakeStore { nodes: vec![low, high.clone()], edges: Vec::new() };

        let query: BTreeSet<String> = ["A"].into_iter().map(String::from).collect();
        let results = get_similar_simulations(&store, &query, None, Some(SeverityRange { min: 80, max: 100 }), 10).expect("similar");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].node.id, high.id);
    }

    #[test]
    fn enhance_explanation_appends_average_risk_paragraph() {
        let sim_a = sim_node("sim_a", "network_latency", 50, 20, &["A"]);
        let sim_b = sim_node("sim_b", "network_latency", 50, 40, &["A"]);
        let store = FakeStore { nodes: vec![sim_a, sim_b], edges: Vec::new() };

        let context = EnhancementContext {
            affected_services: ["A"].into_iter().map(String::from).collect(),
            scenario: None,
            sample_size: 0,
        };
        let enhanced = enhance_explanation("base explanation", &context, &store).expect("enhance");
        assert!(enhanced.starts_with("base explanation"));
        assert!(enhanced.contains("risk score of 30.0"));
    }

    #[test]
    fn enhance_explanation_is_unchanged_with_no_similar_simulations() {
        let store = FakeStore::default();
        let context = EnhancementContext::default();
        let enhanced = enhance_explanation("base explanation", &context, &store).expect("enhance");
        assert_eq!(enhanced, "base explanation");
    }

    #[test]
    fn get_simulations_by_service_follows_predicts_edges_most_recent_first() {
        let older = sim_node("older", "cpu_stress", 10, 5, &["A"]).with_ts(Timestamp::from_unix_millis(1));
        let newer = sim_node("newer", "cpu_stress", 20, 10, &["A"]).with_ts(Timestamp::from_unix_millis(2));
        let edges = vec![
            Edge::new(older.id.clone(), NodeId::service("A"), EdgeRel::Predicts),
            Edge::new(newer.id.clone(), NodeId::service("A"), EdgeRel::Predicts),
        ];
        let store = FakeStore { nodes: vec![older.clone(), newer.clone()], edges };

        let results = get_simulations_by_service(&store, "service:A", 10).expect("query");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, newer.id);
        assert_eq!(results[1].id, older.id);
    }

    #[test]
    fn get_simulation_metrics_follows_measures_edges() {
        let sim = sim_node("sim1", "cpu_stress", 50, 25, &["A"]);
        let metric = Node::new(
            NodeId::metric("sim1", "latency_ms"),
            NodeType::Metric,
            NodeSpecialized::Metric {
                name: "latency_ms".to_string(),
                value: 500.0,
                unit: Some("ms".to_string()),
                service: Some("A".to_string()),
            },
        );
        let edges = vec![Edge::new(sim.id.clone(), metric.id.clone(), EdgeRel::Measures)];
        let store = FakeStore { nodes: vec![sim, metric.clone()], edges };

        let metrics = get_simulation_metrics(&store, "sim1").expect("metrics");
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].id, metric.id);
    }
}
