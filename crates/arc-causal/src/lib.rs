// crates/arc-causal/src/lib.rs
// ============================================================================
// Module: Arc Memory Causal Derivation
// Description: Pure projection of the full graph to a causal sub-graph
//              indexed by file path, plus a diff-scoped restriction.
// Purpose: Answer "which services does this file affect, and what do those
//          services affect downstream" without mutating the store.
// Dependencies: arc-core, tracing
// ============================================================================

//! ## Overview
//! The causal sub-graph's principal map is `file_path -> [service_ids]`,
//! derived from `CONTAINS` edges a service node holds to the files it owns.
//! A second map, `service -> downstream_services`, follows `DEPENDS_ON`
//! edges between services. Derivation reads the graph store but never
//! writes to it. Files with no owning service fall back to a path-segment
//! heuristic (first path component matched against a known service name),
//! used by callers such as the simulation workflow's change-impact step.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use arc_core::EdgeRel;
use arc_core::NodeType;
use arc_core::RepoId;
use arc_core::interfaces::GraphStore;
use arc_core::interfaces::StoreError;
use tracing::debug;
use tracing::instrument;

// ============================================================================
// SECTION: Causal Graph
// ============================================================================

/// A causal sub-graph: which services a file affects, and which services
/// those services affect in turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CausalGraph {
    /// `file_path -> [service name]`, derived from service `CONTAINS` edges.
    file_to_services: BTreeMap<String, Vec<String>>,
    /// `service name -> [downstream service name]`, derived from service
    /// `DEPENDS_ON` edges.
    service_dependencies: BTreeMap<String, Vec<String>>,
    /// Every known service name, used by the path-segment heuristic to
    /// avoid guessing a name the graph has never seen.
    known_services: BTreeSet<String>,
}

impl CausalGraph {
    /// Returns the services that own `file_path`, or an empty slice when
    /// the file has no explicit owner.
    #[must_use]
    pub fn services_for_file(&self, file_path: &str) -> &[String] {
        self.file_to_services.get(file_path).map_or(&[], Vec::as_slice)
    }

    /// Returns the services `service` directly depends on downstream.
    #[must_use]
    pub fn downstream_services(&self, service: &str) -> &[String] {
        self.service_dependencies.get(service).map_or(&[], Vec::as_slice)
    }

    /// Returns the full transitive downstream closure of `service`,
    /// guarding against dependency cycles.
    #[must_use]
    pub fn transitive_downstream(&self, service: &str) -> BTreeSet<String> {
        let mut visited = BTreeSet::new();
        let mut stack = vec![service.to_string()];
        while let Some(current) = stack.pop() {
            for next in self.downstream_services(&current) {
                if visited.insert(next.clone()) {
                    stack.push(next.clone());
                }
            }
        }
        visited
    }

    /// Falls back to a path-segment heuristic when a file has no explicit
    /// service owner: the first path segment, if it names a known service.
    #[must_use]
    pub fn classify_file_heuristically(&self, file_path: &str) -> Option<String> {
        let first_segment = file_path.split('/').next()?;
        self.known_services.contains(first_segment).then(|| first_segment.to_string())
    }

    /// Resolves the services affected by `file_path`: explicit ownership
    /// first, then the path-segment heuristic, then nothing.
    #[must_use]
    pub fn resolve_file_services(&self, file_path: &str) -> Vec<String> {
        let explicit = self.services_for_file(file_path);
        if !explicit.is_empty() {
            return explicit.to_vec();
        }
        self.classify_file_heuristically(file_path).into_iter().collect()
    }

    /// Restricts this causal graph to the files in `scope`, keeping only
    /// the services those files own and their downstream dependencies,
    /// the "diff-scoped causal sub-graph" the simulation workflow builds
    /// from a change set.
    #[must_use]
    pub fn scoped_to_files(&self, scope: &[String]) -> Self {
        let mut file_to_services = BTreeMap::new();
        let mut services = BTreeSet::new();
        for file_path in scope {
            let resolved = self.resolve_file_services(file_path);
            if !resolved.is_empty() {
                services.extend(resolved.iter().cloned());
                file_to_services.insert(file_path.clone(), resolved);
            }
        }

        let mut service_dependencies = BTreeMap::new();
        let mut frontier: Vec<String> = services.iter().cloned().collect();
        while let Some(service) = frontier.pop() {
            let downstream = self.downstream_services(&service).to_vec();
            for next in &downstream {
                if services.insert(next.clone()) {
                    frontier.push(next.clone());
                }
            }
            service_dependencies.insert(service, downstream);
        }

        Self {
            file_to_services,
            service_dependencies,
            known_services: services,
        }
    }

    /// Every service name this causal graph knows about, scoped or not.
    #[must_use]
    pub fn known_services(&self) -> &BTreeSet<String> {
        &self.known_services
    }
}

// ============================================================================
// SECTION: Derivation
// ============================================================================

/// Derives the full causal graph from the store: every `Service` node's
/// `CONTAINS` edges (files it owns) and `DEPENDS_ON` edges (downstream
/// services), optionally restricted to `repo_filter`.
///
/// # Errors
///
/// Returns [`StoreError`] on store I/O failure.
#[instrument(skip(store))]
pub fn derive_causal_graph(store: &dyn GraphStore, repo_filter: Option<&[RepoId]>) -> Result<CausalGraph, StoreError> {
    let services = store.get_nodes_by_type(&NodeType::Service, repo_filter)?;

    let mut file_to_services: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut service_dependencies = BTreeMap::new();
    let mut known_services = BTreeSet::new();

    for service in &services {
        let Some(service_name) = service.id.as_str().strip_prefix("service:") else {
            continue;
        };
        known_services.insert(service_name.to_string());

        let owned_files = store.get_edges_by_src(service.id.as_str(), Some(EdgeRel::Contains))?;
        for edge in &owned_files {
            if let Some(path) = edge.dst.as_str().strip_prefix("file:") {
                file_to_services.entry(path.to_string()).or_default().push(service_name.to_string());
            }
        }

        let downstream = store.get_edges_by_src(service.id.as_str(), Some(EdgeRel::DependsOn))?;
        let downstream_names: Vec<String> = downstream
            .iter()
            .filter_map(|edge| edge.dst.as_str().strip_prefix("service:").map(str::to_string))
            .collect();
        service_dependencies.insert(service_name.to_string(), downstream_names);
    }

    debug!(
        services = services.len(),
        files = file_to_services.len(),
        "derived causal graph"
    );
    Ok(CausalGraph {
        file_to_services,
        service_dependencies,
        known_services,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
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

    use super::CausalGraph;
    use super::derive_causal_graph;

    /// Minimal in-memory [`GraphStore`] stand-in: only the read paths
    /// `derive_causal_graph` touches are exercised.
    #[derive(Default)]
    struct FakeStore {
        nodes: Vec<Node>,
        edges: RefCell<Vec<Edge>>,
    }

    impl FakeStore {
        fn with_nodes(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
            Self {
                nodes,
                edges: RefCell::new(edges),
            }
        }
    }

    impl GraphStore for FakeStore {
        fn init_schema(&mut self) -> Result<(), StoreError> {
            Ok(())
        }

        fn add_nodes_and_edges(&mut self, nodes: &[Node], edges: &[Edge]) -> Result<(), StoreError> {
            self.nodes.extend(nodes.iter().cloned());
            self.edges.borrow_mut().extend(edges.iter().cloned());
            Ok(())
        }

        fn get_node_by_id(&self, id: &str) -> Result<Option<Node>, StoreError> {
            Ok(self.nodes.iter().find(|n| n.id.as_str() == id).cloned())
        }

        fn get_nodes_by_type(&self, node_type: &NodeType, _repo_filter: Option<&[RepoId]>) -> Result<Vec<Node>, StoreError> {
            Ok(self.nodes.iter().filter(|n| &n.node_type == node_type).cloned().collect())
        }

        fn get_edges_by_src(&self, id: &str, relation: Option<EdgeRel>) -> Result<Vec<Edge>, StoreError> {
            Ok(self
                .edges
                .borrow()
                .iter()
                .filter(|e| e.src.as_str() == id && relation.is_none_or(|r| e.relation == r))
                .cloned()
                .collect())
        }

        fn get_edges_by_dst(&self, _id: &str, _relation: Option<EdgeRel>) -> Result<Vec<Edge>, StoreError> {
            Ok(Vec::new())
        }

        fn node_count(&self) -> Result<u64, StoreError> {
            Ok(self.nodes.len() as u64)
        }

        fn edge_count(&self) -> Result<u64, StoreError> {
            Ok(self.edges.borrow().len() as u64)
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

    fn service_node(name: &str) -> Node {
        Node::new(NodeId::service(name), NodeType::Service, NodeSpecialized::Generic).with_title(name)
    }

    #[test]
    fn derives_file_to_service_map_from_contains_edges() {
        let payments = service_node("payments");
        let billing = service_node("billing");
        let edges = vec![
            Edge::new(payments.id.clone(), NodeId::file("payments/charge.py"), EdgeRel::Contains),
            Edge::new(billing.id.clone(), NodeId::file("billing/invoice.py"), EdgeRel::Contains),
            Edge::new(payments.id.clone(), billing.id.clone(), EdgeRel::DependsOn),
        ];
        let store = FakeStore::with_nodes(vec![payments, billing], edges);

        let graph = derive_causal_graph(&store, None).expect("derive");
        assert_eq!(graph.services_for_file("payments/charge.py"), ["payments"]);
        assert_eq!(graph.downstream_services("payments"), ["billing"]);
        assert!(graph.downstream_services("billing").is_empty());
    }

    #[test]
    fn transitive_downstream_follows_chain_and_avoids_cycles() {
        let a = service_node("a");
        let b = service_node("b");
        let c = service_node("c");
        let edges = vec![
            Edge::new(a.id.clone(), b.id.clone(), EdgeRel::DependsOn),
            Edge::new(b.id.clone(), c.id.clone(), EdgeRel::DependsOn),
            Edge::new(c.id.clone(), a.id.clone(), EdgeRel::DependsOn),
        ];
        let store = FakeStore::with_nodes(vec![a, b, c], edges);
        let graph = derive_causal_graph(&store, None).expect("derive");

        let downstream = graph.transitive_downstream("a");
        assert!(downstream.contains("b"));
        assert!(downstream.contains("c"));
        assert_eq!(downstream.len(), 2);
    }

    #[test]
    fn unowned_file_falls_back_to_path_segment_heuristic() {
        let payments = service_node("payments");
        let store = FakeStore::with_nodes(vec![payments], Vec::new());
        let graph = derive_causal_graph(&store, None).expect("derive");

        assert_eq!(graph.resolve_file_services("payments/new_file.py"), vec!["payments".to_string()]);
        assert!(graph.resolve_file_services("unrelated/new_file.py").is_empty());
    }

    #[test]
    fn scoped_to_files_keeps_only_reachable_services() {
        let a = service_node("a");
        let b = service_node("b");
        let unrelated = service_node("unrelated");
        let edges = vec![
            Edge::new(a.id.clone(), NodeId::file("a/x.py"), EdgeRel::Contains),
            Edge::new(a.id.clone(), b.id.clone(), EdgeRel::DependsOn),
            Edge::new(unrelated.id.clone(), NodeId::file("unrelated/y.py"), EdgeRel::Contains),
        ];
        let store = FakeStore::with_nodes(vec![a, b, unrelated], edges);
        let graph = derive_causal_graph(&store, None).expect("derive");

        let scoped = graph.scoped_to_files(&["a/x.py".to_string()]);
        assert!(scoped.known_services().contains("a"));
        assert!(scoped.known_services().contains("b"));
        assert!(!scoped.known_services().contains("unrelated"));
    }

    #[test]
    fn empty_graph_resolves_nothing() {
        let graph = CausalGraph::default();
        assert!(graph.resolve_file_services("any/path.py").is_empty());
    }
}
