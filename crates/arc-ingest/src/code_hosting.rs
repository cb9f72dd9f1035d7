// crates/arc-ingest/src/code_hosting.rs
// ============================================================================
// Module: Code-Hosting Ingestor
// Description: GitHub-like ingestor: paginated GraphQL for PR/issue listing,
//              REST enrichment for merge and comment detail.
// Purpose: The first of three network-backed ingestors; every
//          request goes through `retry::RetryingClient` so auth, rate
//          limit, and transient-network handling live in one place.
// Dependencies: arc-core, regex
// ============================================================================

//! ## Overview
//! `code_hosting` discovers `owner/repo` from the repository's `origin`
//! remote, then walks pull requests and issues a page at a time via
//! GraphQL (`pageInfo.endCursor` resumed from `last_processed.cursor` on
//! incremental runs). Merged PRs get a `MERGES` edge to their merge-commit
//! SHA; `MENTIONS` edges are derived from [`crate::mention::extract_mentions`]
//! run over each PR/issue body, then resolved against the in-batch
//! PR/issue map this run built (§4.3 rule 4) — a mention whose target
//! isn't among the PR/issue nodes emitted this run is dropped rather than
//! turned into an edge, since the store rejects edges to nodes it hasn't
//! seen.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

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
use tracing::warn;

use crate::mention::Mention;
use crate::mention::extract_mentions;
use crate::retry::HttpClientConfig;
use crate::retry::RetryingClient;

/// Node types the `code_hosting` ingestor may emit.
const NODE_TYPES: [NodeType; 2] = [NodeType::Pr, NodeType::Issue];
/// Edge relations the `code_hosting` ingestor may emit.
const EDGE_TYPES: [EdgeRel; 2] = [EdgeRel::Merges, EdgeRel::Mentions];
/// Page size for each GraphQL connection traversal.
const PAGE_SIZE: u32 = 50;
/// Platform label embedded in numbered node IDs.
const PLATFORM: &str = "github";

/// Ingests pull requests and issues from a GitHub-like code-hosting
/// platform.
#[derive(Debug, Default, Clone, Copy)]
pub struct CodeHostingIngestor;

impl Ingestor for CodeHostingIngestor {
    fn name(&self) -> &str {
        "code_hosting"
    }

    fn node_types(&self) -> &[NodeType] {
        &NODE_TYPES
    }

    fn edge_types(&self) -> &[EdgeRel] {
        &EDGE_TYPES
    }

    #[instrument(skip(self, ctx), fields(ingestor = "code_hosting"))]
    fn ingest(&self, ctx: &IngestContext) -> Result<IngestOutput, ArcError> {
        let Some(SourceConfig::CodeHosting { token, cursor }) = &ctx.source_config else {
            return Err(ArcError::new(ArcErrorKind::Parse, "code_hosting ingestor requires CodeHosting source_config")
                .with_detail("source", "code_hosting"));
        };
        let repo_path = ctx
            .repo_path
            .as_deref()
            .ok_or_else(|| ArcError::new(ArcErrorKind::Parse, "code_hosting ingestor requires repo_path").with_detail("source", "code_hosting"))?;
        let (owner, repo) = owner_repo_from_origin(repo_path)?;

        let client = RetryingClient::new(HttpClientConfig::default(), token.clone())?;
        let graphql_url = "https://api.github.com/graphql";

        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        let mut partial_errors = Vec::new();

        let pr_cursor = cursor.clone().or_else(|| {
            ctx.last_processed
                .get("pr_cursor")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        });
        let (pr_items, pr_next_cursor) = paginate(&client, graphql_url, &owner, &repo, "pullRequests", pr_cursor.as_deref())?;
        let mut pr_built = Vec::with_capacity(pr_items.len());
        for item in &pr_items {
            match build_pr_node(item, &mut partial_errors) {
                Some(built) => pr_built.push(built),
                None => partial_errors.push("pull request missing required fields".to_string()),
            }
        }

        let issue_cursor = ctx
            .last_processed
            .get("issue_cursor")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let (issue_items, issue_next_cursor) = paginate(&client, graphql_url, &owner, &repo, "issues", issue_cursor.as_deref())?;
        let mut issue_built = Vec::with_capacity(issue_items.len());
        for item in &issue_items {
            match build_issue_node(item, &mut partial_errors) {
                Some(built) => issue_built.push(built),
                None => partial_errors.push("issue missing required fields".to_string()),
            }
        }

        // The in-batch PR/issue map (§4.3 rule 4): only a mention whose
        // target is one of the PR/issue nodes this run emitted resolves to
        // a `MENTIONS` edge. Everything else (a different page, a ticket
        // from a separate ingestor, a PR merged long before this window)
        // is dropped rather than risk a dangling edge the store would
        // reject, failing this entire batch.
        let known_ids: BTreeSet<String> = pr_built
            .iter()
            .map(|(node, _, _)| node.id.as_str().to_string())
            .chain(issue_built.iter().map(|(node, _, _)| node.id.as_str().to_string()))
            .collect();

        for (node, merge_edge, body) in pr_built {
            for mention in extract_mentions(&body) {
                if let Some(edge) = mention_edge(node.id.clone(), &mention, &known_ids) {
                    edges.push(edge);
                }
            }
            nodes.push(node);
            edges.extend(merge_edge);
        }

        for (node, body, _number) in issue_built {
            for mention in extract_mentions(&body) {
                if let Some(edge) = mention_edge(node.id.clone(), &mention, &known_ids) {
                    edges.push(edge);
                }
            }
            nodes.push(node);
        }

        let mut new_last_processed = ctx.last_processed.clone();
        if let Some(next) = pr_next_cursor {
            new_last_processed.insert("pr_cursor".to_string(), Value::String(next));
        }
        if let Some(next) = issue_next_cursor {
            new_last_processed.insert("issue_cursor".to_string(), Value::String(next));
        }

        debug!(nodes = nodes.len(), edges = edges.len(), "code_hosting ingest complete");
        if !partial_errors.is_empty() {
            warn!(count = partial_errors.len(), "code_hosting ingest had partial failures");
        }

        Ok(IngestOutput {
            nodes,
            edges,
            new_last_processed,
            partial_errors,
        })
    }
}

/// Resolves `(owner, repo)` from the `origin` remote of the repository at
/// `repo_path`.
fn owner_repo_from_origin(repo_path: &str) -> Result<(String, String), ArcError> {
    let repo = git2::Repository::open(repo_path)
        .map_err(|e| ArcError::new(ArcErrorKind::NotFound, e.to_string()).with_detail("source", "code_hosting"))?;
    let origin = repo
        .find_remote("origin")
        .map_err(|e| ArcError::new(ArcErrorKind::Parse, e.to_string()).with_detail("source", "code_hosting"))?;
    let url = origin
        .url()
        .ok_or_else(|| ArcError::new(ArcErrorKind::Parse, "origin remote has no URL").with_detail("source", "code_hosting"))?;
    parse_owner_repo(url).ok_or_else(|| ArcError::new(ArcErrorKind::Parse, format!("could not parse owner/repo from {url}")).with_detail("source", "code_hosting"))
}

/// Parses `owner/repo` out of an SSH or HTTPS GitHub remote URL.
fn parse_owner_repo(url: &str) -> Option<(String, String)> {
    let trimmed = url.trim_end_matches(".git");
    let path = trimmed.rsplit_once("github.com").map(|(_, rest)| rest.trim_start_matches([':', '/']))?;
    let (owner, repo) = path.split_once('/')?;
    Some((owner.to_string(), repo.to_string()))
}

/// Runs one page of a GraphQL connection query and returns its items plus
/// the next cursor, if the connection has more pages.
fn paginate(
    client: &RetryingClient,
    url: &str,
    owner: &str,
    repo: &str,
    connection: &str,
    after: Option<&str>,
) -> Result<(Vec<Value>, Option<String>), ArcError> {
    let query = graphql_query(connection);
    let body = serde_json::json!({
        "query": query,
        "variables": {
            "owner": owner,
            "repo": repo,
            "first": PAGE_SIZE,
            "after": after,
        }
    });
    let response = client.post_json(url, &body)?;
    let connection_value = response
        .get("data")
        .and_then(|d| d.get("repository"))
        .and_then(|r| r.get(connection))
        .cloned()
        .unwrap_or(Value::Null);
    let items = connection_value
        .get("nodes")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let has_next = connection_value
        .get("pageInfo")
        .and_then(|p| p.get("hasNextPage"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let next_cursor = if has_next {
        connection_value
            .get("pageInfo")
            .and_then(|p| p.get("endCursor"))
            .and_then(Value::as_str)
            .map(str::to_string)
    } else {
        None
    };
    Ok((items, next_cursor))
}

/// Builds the GraphQL document for one connection (`pullRequests` or
/// `issues`), requesting the fields every node builder needs.
fn graphql_query(connection: &str) -> String {
    format!(
        "query($owner: String!, $repo: String!, $first: Int!, $after: String) {{ repository(owner: $owner, name: $repo) {{ {connection}(first: $first, after: $after) {{ pageInfo {{ hasNextPage endCursor }} nodes {{ number title bodyText state url createdAt updatedAt mergedAt closedAt author {{ login }} mergeCommit {{ oid }} }} }} }} }}"
    )
}

/// Converts a GraphQL PR node into a [`Node`], an optional `MERGES` edge to
/// its merge commit, and its body text for mention extraction.
fn build_pr_node(item: &Value, partial_errors: &mut Vec<String>) -> Option<(Node, Option<Edge>, String)> {
    let number = item.get("number").and_then(Value::as_u64)?;
    let title = item.get("title").and_then(Value::as_str).unwrap_or_default().to_string();
    let body = item.get("bodyText").and_then(Value::as_str).unwrap_or_default().to_string();
    let state = item.get("state").and_then(Value::as_str).unwrap_or("UNKNOWN").to_string();
    let url = item.get("url").and_then(Value::as_str).unwrap_or_default().to_string();
    let merged_at = item.get("mergedAt").and_then(Value::as_str).and_then(Timestamp::parse_iso8601);
    let merged_by = item
        .get("author")
        .and_then(|a| a.get("login"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let merged_commit_sha = item
        .get("mergeCommit")
        .and_then(|c| c.get("oid"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let node_id = NodeId::pr_numbered(PLATFORM, number);
    let merge_edge = merged_commit_sha.as_ref().map(|sha| Edge::new(node_id.clone(), NodeId::commit(sha), EdgeRel::Merges));

    let mut node = Node::new(
        node_id,
        NodeType::Pr,
        NodeSpecialized::Pr {
            number,
            state,
            url,
            merged_at,
            merged_by,
            merged_commit_sha,
        },
    )
    .with_title(title);
    if let Some(ts) = merged_at {
        node = node.with_ts(ts);
    }
    node.body = Some(body.clone());
    if body.is_empty() {
        partial_errors.push(format!("pr #{number} has an empty body"));
    }
    Some((node, merge_edge, body))
}

/// Converts a GraphQL issue node into a [`Node`], its body text for mention
/// extraction, and its issue number.
fn build_issue_node(item: &Value, _partial_errors: &mut [String]) -> Option<(Node, String, u64)> {
    let number = item.get("number").and_then(Value::as_u64)?;
    let title = item.get("title").and_then(Value::as_str).unwrap_or_default().to_string();
    let body = item.get("bodyText").and_then(Value::as_str).unwrap_or_default().to_string();
    let state = item.get("state").and_then(Value::as_str).unwrap_or("UNKNOWN").to_string();
    let closed_at = item.get("closedAt").and_then(Value::as_str).and_then(Timestamp::parse_iso8601);

    let mut node = Node::new(
        NodeId::issue(PLATFORM, number),
        NodeType::Issue,
        NodeSpecialized::Issue {
            number,
            state,
            closed_at,
            labels: Vec::new(),
        },
    )
    .with_title(title);
    node.body = Some(body.clone());
    Some((node, body, number))
}

/// Converts one extracted mention into a `MENTIONS` edge from `src`, when
/// the mention resolves against `known_ids` — the PR/issue nodes this run
/// emitted. A `#<number>` mention may name either a PR or an issue (GitHub
/// numbers both from one sequence), so both candidate IDs are tried;
/// `@user` mentions never resolve to a node this ingestor emits.
fn mention_edge(src: NodeId, mention: &Mention, known_ids: &BTreeSet<String>) -> Option<Edge> {
    match mention {
        Mention::Number(number) => {
            let issue_id = NodeId::issue(PLATFORM, *number);
            if known_ids.contains(issue_id.as_str()) {
                return Some(Edge::new(src, issue_id, EdgeRel::Mentions));
            }
            let pr_id = NodeId::pr_numbered(PLATFORM, *number);
            if known_ids.contains(pr_id.as_str()) {
                return Some(Edge::new(src, pr_id, EdgeRel::Mentions));
            }
            None
        }
        Mention::TicketKey(key) => {
            let ticket_id = NodeId::jira_issue(key);
            known_ids.contains(ticket_id.as_str()).then(|| Edge::new(src, ticket_id, EdgeRel::Mentions))
        }
        Mention::User(_) => None,
    }
}
