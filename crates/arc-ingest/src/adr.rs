// crates/arc-ingest/src/adr.rs
// ============================================================================
// Module: ADR Ingestor
// Description: Walks a repository's architectural-decision-record files
//              into `adr` nodes and `DECIDES` edges.
// Purpose: The second offline, deterministic ingestor: no network
//          I/O, resume state keyed by per-file modification time rather
//          than a commit hash.
// Dependencies: arc-core, glob, serde_yaml
// ============================================================================

//! ## Overview
//! ADR files are discovered by glob (default `**/adr/**/*.md`) under
//! `repo_path`. Each file's frontmatter is parsed three ways, in order:
//! YAML between `---` markers, then `>` blockquote `**Key** Value` / `Key:
//! Value` pairs, then an empty map when neither is present. The title
//! comes from the first `#` heading, falling back to `"Untitled ADR"`.
//! A parse failure on one file is recorded in
//! [`arc_core::interfaces::IngestOutput::partial_errors`] and that file is
//! skipped; the run as a whole still succeeds. `DECIDES` edges are derived
//! by scanning the body for inline-code and markdown-link file references
//! (§4.3: "emit ... `DECIDES` edges to referenced files") and keeping only
//! the ones that resolve to a real file under `repo_path`; an ADR with no
//! resolvable reference emits no edge at all.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

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
use regex::Regex;
use serde_json::Value;
use tracing::debug;
use tracing::instrument;
use tracing::warn;

/// Node types the `adr` ingestor may emit.
const NODE_TYPES: [NodeType; 1] = [NodeType::Adr];
/// Edge relations the `adr` ingestor may emit.
const EDGE_TYPES: [EdgeRel; 1] = [EdgeRel::Decides];
/// Default glob pattern when none is configured.
const DEFAULT_GLOB: &str = "**/adr/**/*.md";

/// Ingests architectural decision records from a repository tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct AdrIngestor;

impl Ingestor for AdrIngestor {
    fn name(&self) -> &str {
        "adr"
    }

    fn node_types(&self) -> &[NodeType] {
        &NODE_TYPES
    }

    fn edge_types(&self) -> &[EdgeRel] {
        &EDGE_TYPES
    }

    #[instrument(skip(self, ctx), fields(ingestor = "adr"))]
    fn ingest(&self, ctx: &IngestContext) -> Result<IngestOutput, ArcError> {
        let repo_path = ctx
            .repo_path
            .as_deref()
            .ok_or_else(|| ArcError::new(ArcErrorKind::Parse, "adr ingestor requires repo_path").with_detail("source", "adr"))?;

        let glob_pattern = match &ctx.source_config {
            Some(SourceConfig::Adr { glob_pattern }) => glob_pattern.clone(),
            _ => DEFAULT_GLOB.to_string(),
        };

        let previously_processed = previously_processed_files(ctx);

        let pattern = format!("{}/{glob_pattern}", repo_path.trim_end_matches('/'));
        let candidates = glob::glob(&pattern)
            .map_err(|e| ArcError::new(ArcErrorKind::Parse, e.to_string()).with_detail("source", "adr").with_detail("pattern", pattern.clone()))?;

        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        let mut partial_errors = Vec::new();
        let mut processed_files = BTreeMap::new();

        for entry in candidates {
            let path = match entry {
                Ok(path) => path,
                Err(err) => {
                    partial_errors.push(format!("glob error: {err}"));
                    continue;
                }
            };
            let rel_path = match path.strip_prefix(repo_path) {
                Ok(rel) => rel.to_string_lossy().to_string(),
                Err(_) => path.to_string_lossy().to_string(),
            };

            let mtime_iso = match file_mtime_iso(&path) {
                Ok(ts) => ts,
                Err(err) => {
                    partial_errors.push(format!("{rel_path}: {err}"));
                    continue;
                }
            };
            if let Some(previous) = previously_processed.get(&rel_path)
                && previous.as_str() >= mtime_iso.as_str()
            {
                continue;
            }

            match process_adr_file(&path, &rel_path, repo_path, ctx) {
                Ok((node, file_edges)) => {
                    nodes.push(node);
                    edges.extend(file_edges);
                    processed_files.insert(rel_path, Value::String(mtime_iso));
                }
                Err(err) => {
                    warn!(path = %rel_path, error = %err, "failed to parse adr");
                    partial_errors.push(format!("{rel_path}: {err}"));
                }
            }
        }

        let mut new_last_processed = ctx.last_processed.clone();
        let mut files_map = previously_processed;
        files_map.extend(processed_files);
        new_last_processed.insert(
            "files".to_string(),
            Value::Object(files_map.into_iter().collect()),
        );

        debug!(nodes = nodes.len(), edges = edges.len(), "adr ingest complete");
        Ok(IngestOutput {
            nodes,
            edges,
            new_last_processed,
            partial_errors,
        })
    }
}

/// Returns the `rel_path -> iso_mtime` map recorded on the previous run, if
/// any.
fn previously_processed_files(ctx: &IngestContext) -> BTreeMap<String, Value> {
    ctx.last_processed
        .get("files")
        .and_then(|v| v.as_object())
        .map(|obj| obj.clone().into_iter().collect())
        .unwrap_or_default()
}

/// Reads, parses, and converts one ADR file into its node and the
/// `DECIDES` edges to the files its body references.
fn process_adr_file(path: &Path, rel_path: &str, repo_path: &str, ctx: &IngestContext) -> Result<(Node, Vec<Edge>), String> {
    let content = std::fs::read_to_string(path).map_err(|e| format!("read failed: {e}"))?;
    let frontmatter = parse_adr_frontmatter(&content);
    let title = parse_adr_title(&content);

    let status = frontmatter
        .get("status")
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown")
        .to_string();
    let decision_makers = frontmatter
        .get("decision_makers")
        .map(|v| match v {
            Value::Array(items) => items.iter().filter_map(|i| i.as_str().map(str::to_string)).collect(),
            Value::String(s) => vec![s.clone()],
            _ => Vec::new(),
        })
        .unwrap_or_default();
    let ts = frontmatter
        .get("date")
        .and_then(|v| v.as_str())
        .and_then(Timestamp::parse_iso8601);

    let basename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| rel_path.to_string());

    let mut node = Node::new(
        NodeId::adr(&basename),
        NodeType::Adr,
        NodeSpecialized::Adr {
            status,
            decision_makers,
            path: rel_path.to_string(),
        },
    )
    .with_title(title)
    .with_repo(ctx.repo_id.clone());
    if let Some(ts) = ts {
        node = node.with_ts(ts);
    }
    node.body = Some(content.clone());

    let adr_id = NodeId::adr(&basename);
    let edges = referenced_files(&content, repo_path)
        .into_iter()
        .map(|file_path| Edge::new(adr_id.clone(), NodeId::file(&file_path), EdgeRel::Decides))
        .collect();
    Ok((node, edges))
}

#[allow(clippy::expect_used, reason = "pattern is a compile-time literal; failure would be a build-breaking typo, not a runtime condition")]
static BACKTICK_PATH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([A-Za-z0-9_./-]+\.[A-Za-z0-9]{1,8})`").expect("valid regex"));
#[allow(clippy::expect_used, reason = "pattern is a compile-time literal; failure would be a build-breaking typo, not a runtime condition")]
static MARKDOWN_LINK_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\]\(([A-Za-z0-9_./-]+\.[A-Za-z0-9]{1,8})\)").expect("valid regex"));

/// Scans an ADR body for inline-code (`` `src/a.py` ``) and markdown-link
/// (`[text](src/a.py)`) file references, keeping only the ones that resolve
/// to a real file under `repo_path`, and returns their repository-relative
/// paths (deduplicated, first-seen order).
fn referenced_files(body: &str, repo_path: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    let candidates = BACKTICK_PATH_RE.captures_iter(body).chain(MARKDOWN_LINK_PATH_RE.captures_iter(body));
    for capture in candidates {
        let candidate = capture[1].trim_start_matches("./");
        if Path::new(repo_path).join(candidate).is_file() && seen.insert(candidate.to_string()) {
            out.push(candidate.to_string());
        }
    }
    out
}

/// Parses frontmatter from an ADR body: YAML between `---` markers, then
/// `>` blockquote key/value pairs, then an empty map.
fn parse_adr_frontmatter(content: &str) -> serde_json::Map<String, Value> {
    if let Some(yaml) = extract_yaml_frontmatter(content)
        && let Ok(parsed) = serde_yaml::from_str::<Value>(&yaml)
        && let Value::Object(map) = parsed
    {
        return map;
    }
    parse_blockquote_frontmatter(content)
}

/// Extracts the raw text between a leading pair of `---` lines, if present.
fn extract_yaml_frontmatter(content: &str) -> Option<String> {
    let mut lines = content.lines();
    if lines.next()?.trim() != "---" {
        return None;
    }
    let mut body = Vec::new();
    for line in lines {
        if line.trim() == "---" {
            return Some(body.join("\n"));
        }
        body.push(line);
    }
    None
}

/// Parses `> **Key** Value` and `> Key: Value` blockquote lines at the top
/// of the body into a key/value map.
fn parse_blockquote_frontmatter(content: &str) -> serde_json::Map<String, Value> {
    let mut map = serde_json::Map::new();
    let mut in_blockquote = false;
    for raw_line in content.lines() {
        let line = raw_line.trim();
        if let Some(stripped) = line.strip_prefix('>') {
            in_blockquote = true;
            let stripped = stripped.trim();
            if let Some((key, value)) = parse_bold_key_value(stripped).or_else(|| parse_colon_key_value(stripped)) {
                map.insert(key, Value::String(value));
            }
        } else if in_blockquote && line.is_empty() {
            continue;
        } else if in_blockquote {
            break;
        }
    }
    map
}

/// Parses a `**Key** Value` line into `(key, value)`, lower-casing and
/// underscoring the key.
fn parse_bold_key_value(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix("**")?;
    let (key, rest) = rest.split_once("**")?;
    Some((normalize_key(key), rest.trim().to_string()))
}

/// Parses a `Key: Value` line into `(key, value)`.
fn parse_colon_key_value(line: &str) -> Option<(String, String)> {
    let (key, value) = line.split_once(':')?;
    Some((normalize_key(key), value.trim().to_string()))
}

/// Lower-cases and replaces spaces with underscores, matching the
/// frontmatter key normalization every parse path applies.
fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace(' ', "_")
}

/// Returns the title from the first `#` heading, or `"Untitled ADR"`.
fn parse_adr_title(content: &str) -> String {
    for line in content.lines() {
        if let Some(heading) = line.trim().strip_prefix("# ") {
            return heading.trim().to_string();
        }
    }
    "Untitled ADR".to_string()
}

/// Returns a file's modification time as an RFC 3339 string.
fn file_mtime_iso(path: &Path) -> Result<String, String> {
    let metadata = std::fs::metadata(path).map_err(|e| format!("stat failed: {e}"))?;
    let modified = metadata.modified().map_err(|e| format!("mtime unavailable: {e}"))?;
    let millis = modified
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|e| format!("mtime before epoch: {e}"))?
        .as_millis();
    let ts = Timestamp::from_unix_millis(i64::try_from(millis).unwrap_or(i64::MAX));
    ts.to_iso8601().ok_or_else(|| "mtime out of range".to_string())
}
