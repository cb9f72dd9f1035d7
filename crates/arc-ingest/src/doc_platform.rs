// crates/arc-ingest/src/doc_platform.rs
// ============================================================================
// Module: Doc-Platform Ingestor
// Description: Linear-like (GraphQL) and Notion-like (REST, block-tree
//              flattening) document ingestors behind one `Ingestor`.
// Purpose: The third network-backed ingestor; dispatches on which
//          `SourceConfig` variant the orchestrator supplies so one plugin
//          registration covers either backend.
// Dependencies: arc-core
// ============================================================================

//! ## Overview
//! Linear-like platforms are walked with a single paginated GraphQL query
//! over `issues` (Linear models documents as issues; this ingestor emits
//! them as `document` nodes rather than `issue` nodes, since doc-platform
//! content is knowledge, not a project-tracking record). Notion-like
//! platforms are walked with REST: each page's block children are fetched
//! and flattened to Markdown text, and parent/child relationships (page
//! under database, or page under page) become `CONTAINS` edges.

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

/// Node types the `doc_platform` ingestor may emit.
const NODE_TYPES: [NodeType; 1] = [NodeType::Document];
/// Edge relations the `doc_platform` ingestor may emit.
const EDGE_TYPES: [EdgeRel; 2] = [EdgeRel::Mentions, EdgeRel::Contains];

/// Ingests documents from a GraphQL (Linear-like) or REST (Notion-like)
/// doc platform, dispatching on the configured [`SourceConfig`] variant.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocPlatformIngestor;

impl Ingestor for DocPlatformIngestor {
    fn name(&self) -> &str {
        "doc_platform"
    }

    fn node_types(&self) -> &[NodeType] {
        &NODE_TYPES
    }

    fn edge_types(&self) -> &[EdgeRel] {
        &EDGE_TYPES
    }

    #[instrument(skip(self, ctx), fields(ingestor = "doc_platform"))]
    fn ingest(&self, ctx: &IngestContext) -> Result<IngestOutput, ArcError> {
        match &ctx.source_config {
            Some(SourceConfig::DocPlatformGraphql { token }) => ingest_linear_like(ctx, token),
            Some(SourceConfig::DocPlatformRest { token, database_ids, page_ids }) => {
                ingest_notion_like(ctx, token, database_ids.as_deref(), page_ids.as_deref())
            }
            _ => Err(ArcError::new(
                ArcErrorKind::Parse,
                "doc_platform ingestor requires DocPlatformGraphql or DocPlatformRest source_config",
            )
            .with_detail("source", "doc_platform")),
        }
    }
}

// ============================================================================
// SECTION: Linear-Like Backend
// ============================================================================

/// GraphQL query for one page of issues-as-documents, matching the fields
/// every node builder needs.
const LINEAR_ISSUES_QUERY: &str = "query($cursor: String) { issues(first: 50, after: $cursor) { pageInfo { hasNextPage endCursor } nodes { id identifier title description url createdAt archivedAt } } }";

/// Walks a Linear-like GraphQL API, emitting one `document` node per issue.
fn ingest_linear_like(ctx: &IngestContext, token: &str) -> Result<IngestOutput, ArcError> {
    let client = RetryingClient::new(HttpClientConfig::default(), token)?;
    let url = "https://api.linear.app/graphql";

    let mut cursor = ctx
        .last_processed
        .get("cursor")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let mut partial_errors = Vec::new();

    loop {
        let body = serde_json::json!({
            "query": LINEAR_ISSUES_QUERY,
            "variables": { "cursor": cursor },
        });
        let response = client.post_json(url, &body)?;
        let connection = response.get("data").and_then(|d| d.get("issues")).cloned().unwrap_or(Value::Null);
        let items = connection.get("nodes").and_then(Value::as_array).cloned().unwrap_or_default();

        for item in &items {
            match build_linear_node(item) {
                Some((node, body_text)) => {
                    let node_id = node.id.clone();
                    nodes.push(node);
                    for mention in extract_mentions(&body_text) {
                        if let crate::mention::Mention::TicketKey(key) = mention {
                            edges.push(Edge::new(node_id.clone(), NodeId::jira_issue(&key), EdgeRel::Mentions));
                        }
                    }
                }
                None => partial_errors.push("linear issue missing required fields".to_string()),
            }
        }

        let has_next = connection
            .get("pageInfo")
            .and_then(|p| p.get("hasNextPage"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !has_next {
            break;
        }
        cursor = connection
            .get("pageInfo")
            .and_then(|p| p.get("endCursor"))
            .and_then(Value::as_str)
            .map(str::to_string);
    }

    let mut new_last_processed = ctx.last_processed.clone();
    if let Some(cursor) = cursor {
        new_last_processed.insert("cursor".to_string(), Value::String(cursor));
    }

    debug!(nodes = nodes.len(), edges = edges.len(), "doc_platform (linear) ingest complete");
    Ok(IngestOutput {
        nodes,
        edges,
        new_last_processed,
        partial_errors,
    })
}

/// Converts a Linear GraphQL issue node into a `document` [`Node`] plus its
/// description text for mention extraction.
fn build_linear_node(item: &Value) -> Option<(Node, String)> {
    let id = item.get("id").and_then(Value::as_str)?;
    let title = item.get("title").and_then(Value::as_str).unwrap_or_default().to_string();
    let description = item.get("description").and_then(Value::as_str).unwrap_or_default().to_string();
    let created_at = item.get("createdAt").and_then(Value::as_str).and_then(Timestamp::parse_iso8601);

    let mut node = Node::new(NodeId::linear(id), NodeType::Document, NodeSpecialized::Generic).with_title(title);
    if let Some(ts) = created_at {
        node = node.with_ts(ts);
    }
    node.body = Some(description.clone());
    Some((node, description))
}

// ============================================================================
// SECTION: Notion-Like Backend
// ============================================================================

/// Block types the Markdown flattener understands; any other block type
/// contributes no text.
const TEXT_BLOCK_TYPES: [&str; 8] = [
    "paragraph",
    "heading_1",
    "heading_2",
    "heading_3",
    "bulleted_list_item",
    "numbered_list_item",
    "to_do",
    "quote",
];

/// Walks a Notion-like REST API, emitting one `document` node per page,
/// restricted to `database_ids`/`page_ids` when given.
fn ingest_notion_like(
    ctx: &IngestContext,
    token: &str,
    database_ids: Option<&[String]>,
    page_ids: Option<&[String]>,
) -> Result<IngestOutput, ArcError> {
    let client = RetryingClient::new(HttpClientConfig::default(), token)?;
    let base = "https://api.notion.com/v1";

    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let mut partial_errors = Vec::new();

    let resolved_page_ids: Vec<String> = match page_ids {
        Some(ids) => ids.to_vec(),
        None => Vec::new(),
    };
    for page_id in &resolved_page_ids {
        match fetch_page(&client, base, page_id) {
            Ok((node, parent_edge, _)) => {
                nodes.push(node);
                edges.extend(parent_edge);
            }
            Err(err) => partial_errors.push(format!("page {page_id}: {err}")),
        }
    }

    if let Some(database_ids) = database_ids {
        for database_id in database_ids {
            match fetch_database(&client, base, database_id) {
                Ok((db_node, db_edges, page_summaries)) => {
                    let db_id = db_node.id.clone();
                    nodes.push(db_node);
                    edges.extend(db_edges);
                    for page_id in page_summaries {
                        match fetch_page(&client, base, &page_id) {
                            Ok((node, _, _)) => {
                                edges.push(Edge::new(db_id.clone(), node.id.clone(), EdgeRel::Contains));
                                nodes.push(node);
                            }
                            Err(err) => partial_errors.push(format!("page {page_id}: {err}")),
                        }
                    }
                }
                Err(err) => partial_errors.push(format!("database {database_id}: {err}")),
            }
        }
    }

    debug!(nodes = nodes.len(), edges = edges.len(), "doc_platform (notion) ingest complete");
    Ok(IngestOutput {
        nodes,
        edges,
        new_last_processed: ctx.last_processed.clone(),
        partial_errors,
    })
}

/// Fetches one Notion page's metadata and block content, returning its
/// `document` node, its parent-containment edge (if any), and raw body.
fn fetch_page(client: &RetryingClient, base: &str, page_id: &str) -> Result<(Node, Option<Edge>, String), ArcError> {
    let page = client.get_json(&format!("{base}/pages/{page_id}"))?;
    let title = extract_notion_title(&page, "properties");
    let created_at = page.get("created_time").and_then(Value::as_str).and_then(Timestamp::parse_iso8601);
    let updated_at = page.get("last_edited_time").and_then(Value::as_str).and_then(Timestamp::parse_iso8601);
    let url = page.get("url").and_then(Value::as_str).map(str::to_string);

    let body = fetch_page_blocks_as_markdown(client, base, page_id)?;

    let node_id = NodeId::notion("page", page_id);
    let mut node = Node::new(node_id, NodeType::Document, NodeSpecialized::Generic).with_title(title);
    if let Some(ts) = created_at.or(updated_at) {
        node = node.with_ts(ts);
    }
    node.body = Some(body.clone());
    if let Some(url) = url {
        node.extra.insert("url".to_string(), Value::String(url));
    }

    let parent_edge = parent_containment_edge(&page, node.id.clone());
    Ok((node, parent_edge, body))
}

/// Fetches one Notion database's metadata, its parent-containment edge, and
/// the page IDs belonging to it.
fn fetch_database(client: &RetryingClient, base: &str, database_id: &str) -> Result<(Node, Vec<Edge>, Vec<String>), ArcError> {
    let database = client.get_json(&format!("{base}/databases/{database_id}"))?;
    let title = extract_notion_title(&database, "title");
    let created_at = database.get("created_time").and_then(Value::as_str).and_then(Timestamp::parse_iso8601);
    let url = database.get("url").and_then(Value::as_str).map(str::to_string);

    let node_id = NodeId::notion("database", database_id);
    let mut node = Node::new(node_id.clone(), NodeType::Document, NodeSpecialized::Generic).with_title(title.clone());
    if let Some(ts) = created_at {
        node = node.with_ts(ts);
    }
    node.body = Some(format!("Notion Database: {title}"));
    if let Some(url) = url {
        node.extra.insert("url".to_string(), Value::String(url));
    }

    let mut edges = Vec::new();
    if let Some(parent_edge) = parent_containment_edge(&database, node_id) {
        edges.push(parent_edge);
    }

    let query = client.post_json(&format!("{base}/databases/{database_id}/query"), &Value::Object(serde_json::Map::new()))?;
    let page_ids = query
        .get("results")
        .and_then(Value::as_array)
        .map(|results| results.iter().filter_map(|r| r.get("id").and_then(Value::as_str).map(str::to_string)).collect())
        .unwrap_or_default();

    Ok((node, edges, page_ids))
}

/// Fetches a page's (or block's) children and flattens recognized text
/// block types into Markdown-ish plain text, one line per block.
fn fetch_page_blocks_as_markdown(client: &RetryingClient, base: &str, block_id: &str) -> Result<String, ArcError> {
    let response = client.get_json(&format!("{base}/blocks/{block_id}/children"))?;
    let blocks = response.get("results").and_then(Value::as_array).cloned().unwrap_or_default();

    let mut lines = Vec::new();
    for block in &blocks {
        let Some(block_type) = block.get("type").and_then(Value::as_str) else {
            continue;
        };
        if !TEXT_BLOCK_TYPES.contains(&block_type) {
            continue;
        }
        let content = block.get(block_type).cloned().unwrap_or(Value::Null);
        let rich_text = content.get("rich_text").and_then(Value::as_array).cloned().unwrap_or_default();
        let text = rich_text_to_markdown(&rich_text);
        if !text.is_empty() {
            lines.push(text);
        }
    }
    Ok(lines.join("\n"))
}

/// Concatenates a Notion `rich_text` array's plain-text segments.
fn rich_text_to_markdown(rich_text: &[Value]) -> String {
    rich_text
        .iter()
        .filter_map(|segment| segment.get("plain_text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("")
}

/// Extracts a page or database title from Notion's `title`-typed property
/// array, looked up under `title_key` (`"properties"` for pages carries a
/// nested `title`-typed property; `"title"` for databases is top-level).
fn extract_notion_title(object: &Value, title_key: &str) -> String {
    if title_key == "title" {
        let rich_text = object.get("title").and_then(Value::as_array).cloned().unwrap_or_default();
        return rich_text_to_markdown(&rich_text);
    }
    let Some(properties) = object.get("properties").and_then(Value::as_object) else {
        return "Untitled".to_string();
    };
    for property in properties.values() {
        if property.get("type").and_then(Value::as_str) == Some("title")
            && let Some(rich_text) = property.get("title").and_then(Value::as_array)
        {
            let title = rich_text_to_markdown(rich_text);
            if !title.is_empty() {
                return title;
            }
        }
    }
    "Untitled".to_string()
}

/// Builds a `CONTAINS` edge from a Notion object's `parent` field to
/// `child_id`, when the parent is itself a page or database Notion tracks.
fn parent_containment_edge(object: &Value, child_id: NodeId) -> Option<Edge> {
    let parent = object.get("parent")?;
    let parent_type = parent.get("type").and_then(Value::as_str)?;
    let (notion_type, parent_id) = match parent_type {
        "database_id" => ("database", parent.get("database_id").and_then(Value::as_str)?),
        "page_id" => ("page", parent.get("page_id").and_then(Value::as_str)?),
        _ => return None,
    };
    Some(Edge::new(NodeId::notion(notion_type, parent_id), child_id, EdgeRel::Contains))
}

#[cfg(test)]
mod tests {
    use super::extract_notion_title;
    use super::rich_text_to_markdown;
    use serde_json::json;

    #[test]
    fn rich_text_concatenates_plain_text_segments() {
        let rich_text = json!([{"plain_text": "Hello, "}, {"plain_text": "world"}]);
        assert_eq!(rich_text_to_markdown(rich_text.as_array().expect("array")), "Hello, world");
    }

    #[test]
    fn database_title_reads_top_level_title_array() {
        let database = json!({"title": [{"plain_text": "Roadmap"}]});
        assert_eq!(extract_notion_title(&database, "title"), "Roadmap");
    }

    #[test]
    fn page_title_reads_nested_title_property() {
        let page = json!({
            "properties": {
                "Name": {"type": "title", "title": [{"plain_text": "Design doc"}]}
            }
        });
        assert_eq!(extract_notion_title(&page, "properties"), "Design doc");
    }

    #[test]
    fn missing_title_property_falls_back_to_untitled() {
        let page = json!({"properties": {}});
        assert_eq!(extract_notion_title(&page, "properties"), "Untitled");
    }
}
