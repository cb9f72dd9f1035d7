// crates/arc-ingest/src/ticketing.rs
// ============================================================================
// Module: Ticketing Ingestor
// Description: Jira-like ingestor: REST pagination over projects and
//              JQL-filtered issues, with typed link-relation edges.
// Purpose: The second network-backed ingestor; incremental runs
//          narrow the JQL clause by `updated >=` rather than paging a
//          GraphQL cursor.
// Dependencies: arc-core
// ============================================================================

//! ## Overview
//! `ticketing` lists projects (optionally restricted to
//! `source_config.project_keys`), then for each project pages through
//! `search_issues` with a JQL clause of `project = <key>` narrowed by
//! `AND updated >= <last_processed.last_updated>` on incremental runs.
//! Each issue becomes a `jira_project`-scoped `issue` node with a `PART_OF`
//! edge to its project; `issuelinks` become `BLOCKS`, `DEPENDS_ON`, or
//! `MENTIONS` edges depending on the Jira link-type name, mirroring the
//! original implementation's keyword match on the link type and its
//! inward/outward descriptions.

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
use serde_json::Value;
use tracing::debug;
use tracing::instrument;

use crate::mention::extract_mentions;
use crate::retry::HttpClientConfig;
use crate::retry::RetryingClient;

/// Node types the `ticketing` ingestor may emit.
const NODE_TYPES: [NodeType; 1] = [NodeType::Issue];
/// Edge relations the `ticketing` ingestor may emit.
const EDGE_TYPES: [EdgeRel; 4] = [EdgeRel::PartOf, EdgeRel::Blocks, EdgeRel::DependsOn, EdgeRel::Mentions];
/// Page size for `search_issues` pagination.
const MAX_RESULTS: u32 = 100;

/// Ingests projects and issues from a Jira-like ticketing platform.
#[derive(Debug, Default, Clone, Copy)]
pub struct TicketingIngestor;

impl Ingestor for TicketingIngestor {
    fn name(&self) -> &str {
        "ticketing"
    }

    fn node_types(&self) -> &[NodeType] {
        &NODE_TYPES
    }

    fn edge_types(&self) -> &[EdgeRel] {
        &EDGE_TYPES
    }

    #[instrument(skip(self, ctx), fields(ingestor = "ticketing"))]
    fn ingest(&self, ctx: &IngestContext) -> Result<IngestOutput, ArcError> {
        let Some(SourceConfig::Ticketing { token, cloud_id, project_keys }) = &ctx.source_config else {
            return Err(ArcError::new(ArcErrorKind::Parse, "ticketing ingestor requires Ticketing source_config")
                .with_detail("source", "ticketing"));
        };

        let client = RetryingClient::new(HttpClientConfig::default(), token.clone())?;
        let base = format!("https://api.atlassian.com/ex/jira/{cloud_id}/rest/api/3");

        let project_keys = match project_keys {
            Some(keys) => keys.clone(),
            None => fetch_project_keys(&client, &base)?,
        };

        let last_updated = ctx
            .last_processed
            .get("last_updated")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        let mut partial_errors = Vec::new();
        let mut newest_updated = last_updated.clone();

        for project_key in &project_keys {
            nodes.push(project_node(project_key));

            let mut jql = format!("project = {project_key}");
            if let Some(since) = &last_updated {
                jql.push_str(&format!(" AND updated >= '{since}'"));
            }

            let issues = fetch_all_issues(&client, &base, &jql)?;
            for issue in &issues {
                match build_issue_node(issue, project_key) {
                    Some((node, project_edge, link_edges, mention_edges, updated)) => {
                        if let Some(updated) = &updated
                            && newest_updated.as_deref().is_none_or(|current| updated.as_str() > current)
                        {
                            newest_updated = Some(updated.clone());
                        }
                        nodes.push(node);
                        edges.push(project_edge);
                        edges.extend(link_edges);
                        edges.extend(mention_edges);
                    }
                    None => partial_errors.push(format!("issue in project {project_key} missing required fields")),
                }
            }
        }

        let mut new_last_processed = ctx.last_processed.clone();
        if let Some(updated) = newest_updated {
            new_last_processed.insert("last_updated".to_string(), Value::String(updated));
        }

        debug!(nodes = nodes.len(), edges = edges.len(), "ticketing ingest complete");
        Ok(IngestOutput {
            nodes,
            edges,
            new_last_processed,
            partial_errors,
        })
    }
}

/// Builds the `jira_project` node for `project_key`. Carries no
/// type-specific attributes; downstream consumers read its ID only.
fn project_node(project_key: &str) -> Node {
    Node::new(NodeId::jira_project(project_key), NodeType::Component, NodeSpecialized::Generic).with_title(project_key)
}

/// Lists every project key visible to the configured credentials.
fn fetch_project_keys(client: &RetryingClient, base: &str) -> Result<Vec<String>, ArcError> {
    let response = client.get_json(&format!("{base}/project/search"))?;
    let keys = response
        .get("values")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.get("key").and_then(Value::as_str).map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    Ok(keys)
}

/// Pages through `search_issues` for `jql` until exhausted.
fn fetch_all_issues(client: &RetryingClient, base: &str, jql: &str) -> Result<Vec<Value>, ArcError> {
    let mut issues = Vec::new();
    let mut start_at = 0_u32;
    loop {
        let url = format!(
            "{base}/search?jql={}&startAt={start_at}&maxResults={MAX_RESULTS}",
            urlencode(jql)
        );
        let response = client.get_json(&url)?;
        let page = response.get("issues").and_then(Value::as_array).cloned().unwrap_or_default();
        let total = response.get("total").and_then(Value::as_u64).unwrap_or(0);
        let page_len = page.len();
        issues.extend(page);
        start_at += u32::try_from(page_len).unwrap_or(0);
        if page_len == 0 || u64::from(start_at) >= total {
            break;
        }
    }
    Ok(issues)
}

/// Minimal query-string percent-encoding sufficient for JQL clauses (spaces,
/// quotes, and comparison operators).
fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Converts a REST issue payload into its node, `PART_OF` edge to its
/// project, derived link edges, and `MENTIONS` edges, plus its updated
/// timestamp string for incremental resume.
fn build_issue_node(issue: &Value, project_key: &str) -> Option<(Node, Edge, Vec<Edge>, Vec<Edge>, Option<String>)> {
    let key = issue.get("key").and_then(Value::as_str)?;
    let fields = issue.get("fields").cloned().unwrap_or(Value::Null);
    let summary = fields.get("summary").and_then(Value::as_str).unwrap_or_default().to_string();
    let description = fields.get("description").and_then(Value::as_str).unwrap_or_default().to_string();
    let created = fields.get("created").and_then(Value::as_str).and_then(Timestamp::parse_iso8601);
    let updated_raw = fields.get("updated").and_then(Value::as_str).map(str::to_string);
    let status = fields
        .get("status")
        .and_then(|s| s.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("Unknown")
        .to_string();
    let labels = fields
        .get("labels")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let issue_number = key.rsplit('-').next().and_then(|n| n.parse::<u64>().ok()).unwrap_or(0);

    let node_id = NodeId::jira_issue(key);
    let mut node = Node::new(
        node_id.clone(),
        NodeType::Issue,
        NodeSpecialized::Issue {
            number: issue_number,
            state: status,
            closed_at: None,
            labels,
        },
    )
    .with_title(summary);
    if let Some(ts) = created {
        node = node.with_ts(ts);
    }
    node.body = Some(description.clone());

    let project_edge = Edge::new(node_id.clone(), NodeId::jira_project(project_key), EdgeRel::PartOf);
    let link_edges = process_issue_links(&node_id, &fields);
    let mention_edges: Vec<Edge> = extract_mentions(&description)
        .into_iter()
        .filter_map(|mention| match mention {
            crate::mention::Mention::TicketKey(other_key) if other_key != key => {
                Some(Edge::new(node_id.clone(), NodeId::jira_issue(&other_key), EdgeRel::Mentions))
            }
            _ => None,
        })
        .collect();

    Some((node, project_edge, link_edges, mention_edges, updated_raw))
}

/// Derives `BLOCKS`/`DEPENDS_ON`/`MENTIONS` edges from an issue's
/// `issuelinks` field, for both its inward and outward linked issues.
fn process_issue_links(source_id: &NodeId, fields: &Value) -> Vec<Edge> {
    let mut edges = Vec::new();
    let Some(links) = fields.get("issuelinks").and_then(Value::as_array) else {
        return edges;
    };
    for link in links {
        let link_type = link.get("type").cloned().unwrap_or(Value::Null);
        let type_name = link_type.get("name").and_then(Value::as_str).unwrap_or("relates to");
        let inward = link_type.get("inward").and_then(Value::as_str).unwrap_or("relates to");
        let outward = link_type.get("outward").and_then(Value::as_str).unwrap_or("relates to");
        let rel = map_link_type_to_edge_rel(type_name, inward, outward);

        if let Some(target_key) = link.get("inwardIssue").and_then(|i| i.get("key")).and_then(Value::as_str) {
            edges.push(Edge::new(source_id.clone(), NodeId::jira_issue(target_key), rel));
        }
        if let Some(target_key) = link.get("outwardIssue").and_then(|i| i.get("key")).and_then(Value::as_str) {
            edges.push(Edge::new(source_id.clone(), NodeId::jira_issue(target_key), rel));
        }
    }
    edges
}

/// Maps a Jira issue-link type name (and its inward/outward descriptions)
/// to the closed `EdgeRel` set.
fn map_link_type_to_edge_rel(type_name: &str, inward: &str, outward: &str) -> EdgeRel {
    let type_lower = type_name.to_lowercase();
    let inward_lower = inward.to_lowercase();
    let outward_lower = outward.to_lowercase();
    if type_lower.contains("blocks") || inward_lower.contains("is blocked by") || outward_lower.contains("blocks") {
        return EdgeRel::Blocks;
    }
    if type_lower.contains("depends") || inward_lower.contains("depends on") || outward_lower.contains("is depended on by") {
        return EdgeRel::DependsOn;
    }
    EdgeRel::Mentions
}

#[cfg(test)]
mod tests {
    use super::map_link_type_to_edge_rel;
    use super::urlencode;
    use arc_core::EdgeRel;

    #[test]
    fn blocks_link_type_maps_to_blocks_edge() {
        assert_eq!(map_link_type_to_edge_rel("Blocks", "is blocked by", "blocks"), EdgeRel::Blocks);
    }

    #[test]
    fn depends_link_type_maps_to_depends_on_edge() {
        assert_eq!(map_link_type_to_edge_rel("Dependency", "depends on", "is depended on by"), EdgeRel::DependsOn);
    }

    #[test]
    fn unrelated_link_type_defaults_to_mentions() {
        assert_eq!(map_link_type_to_edge_rel("Relates", "relates to", "relates to"), EdgeRel::Mentions);
    }

    #[test]
    fn urlencode_escapes_spaces_and_quotes() {
        assert_eq!(urlencode("project = 'ARC'"), "project%20%3D%20%27ARC%27");
    }
}
