// crates/arc-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Graph Store
// Description: `GraphStore` implementation backed by a single SQLite file.
// Purpose: Persist nodes, edges, metadata, refresh timestamps, and the
//          repository registry with transactional, invariant-checked
//          writes.
// Dependencies: arc-core, rusqlite, serde_json
// ============================================================================

//! ## Overview
//! Every write goes through [`SqliteStore::add_nodes_and_edges`], which opens
//! one transaction, upserts nodes by ID, validates that every edge endpoint
//! exists (either in this batch or already committed), deduplicates edges by
//! `(src, dst, relation)`, and commits atomically. A failure at any step
//! rolls back the whole transaction (invariant 2: no dangling edges survive
//! a commit).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use arc_core::Clock;
use arc_core::Edge;
use arc_core::EdgeRel;
use arc_core::GraphStore;
use arc_core::Node;
use arc_core::NodeId;
use arc_core::NodeSpecialized;
use arc_core::NodeType;
use arc_core::RepoId;
use arc_core::RepositoryRecord;
use arc_core::SystemClock;
use arc_core::Timestamp;
use arc_core::interfaces::StoreError;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use tracing::instrument;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Schema version for the on-disk layout this module writes.
pub const SCHEMA_VERSION: i64 = 1;
/// Default `SQLite` busy timeout, in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u32 = 5_000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Crate-local `SQLite` store errors, converted to
/// [`arc_core::interfaces::StoreError`] at the crate boundary.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// The underlying `SQLite` driver reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A node or edge payload failed to (de)serialize as JSON.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// An edge referenced a node absent from both the batch and the store.
    #[error("dangling edge: {src} -{relation}-> {dst}")]
    DanglingEdge {
        /// Edge source ID.
        src: String,
        /// Edge destination ID.
        dst: String,
        /// Edge relation label.
        relation: String,
    },
    /// A node's `repo_id` referenced an unregistered repository.
    #[error("node '{node_id}' references unregistered repository '{repo_id}'")]
    UnregisteredRepository {
        /// Offending node ID.
        node_id: String,
        /// Unregistered repository ID.
        repo_id: String,
    },
    /// `set_active_repositories` was given an ID not present in the
    /// repository registry.
    #[error("unknown repository: {0}")]
    UnknownRepository(String),
    /// The active-repositories lock was poisoned by a panicking holder.
    #[error("active repository lock poisoned")]
    LockPoisoned,
}

impl From<SqliteStoreError> for StoreError {
    fn from(err: SqliteStoreError) -> Self {
        match err {
            SqliteStoreError::DanglingEdge { .. } | SqliteStoreError::UnregisteredRepository { .. } => {
                Self::Constraint(err.to_string())
            }
            SqliteStoreError::UnknownRepository(id) => Self::UnknownRepository(id),
            SqliteStoreError::Sqlite(_) | SqliteStoreError::Serde(_) | SqliteStoreError::LockPoisoned => {
                Self::Io(err.to_string())
            }
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Embedded single-file `SQLite` backing for [`arc_core::GraphStore`].
///
/// # Invariants
/// - `active_repositories` is a process-local session filter; it is not
///   persisted across reopens.
pub struct SqliteStore {
    /// Open connection to the backing `SQLite` file.
    conn: Connection,
    /// Clock used for repository registration timestamps.
    clock: Arc<dyn Clock>,
    /// Active-repositories session filter (empty means unscoped).
    active_repositories: Mutex<Vec<RepoId>>,
}

/// Intermediate representation of a node's non-ID columns.
struct NodeColumns {
    /// Serialized [`NodeType::tag`].
    type_tag: String,
    /// Display title.
    title: Option<String>,
    /// Free-form body text.
    body: Option<String>,
    /// Primary timestamp, as Unix epoch milliseconds.
    ts: Option<i64>,
    /// JSON-encoded `extra` map.
    extra: String,
    /// Owning repository ID, if any.
    repo_id: Option<String>,
    /// JSON-encoded [`NodeSpecialized`].
    specialized: String,
}

impl SqliteStore {
    /// Opens (creating if absent) a `SQLite` store at `path` using the
    /// system wall clock for repository registration timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] if the file cannot be opened or its
    /// pragmas cannot be set.
    pub fn open(path: &Path) -> Result<Self, SqliteStoreError> {
        Self::open_with_clock(path, Arc::new(SystemClock))
    }

    /// Opens a `SQLite` store with an explicit [`Clock`], so tests and the
    /// simulation workflow can supply a deterministic stand-in.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] if the file cannot be opened or its
    /// pragmas cannot be set.
    pub fn open_with_clock(path: &Path, clock: Arc<dyn Clock>) -> Result<Self, SqliteStoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "busy_timeout", DEFAULT_BUSY_TIMEOUT_MS)?;
        conn.pragma_update(None, "foreign_keys", "OFF")?;
        Ok(Self {
            conn,
            clock,
            active_repositories: Mutex::new(Vec::new()),
        })
    }

    /// Opens an in-memory store, used by tests and short-lived query
    /// sessions that do not need durability.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] if pragmas cannot be set.
    pub fn open_in_memory() -> Result<Self, SqliteStoreError> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "OFF")?;
        Ok(Self {
            conn,
            clock: Arc::new(SystemClock),
            active_repositories: Mutex::new(Vec::new()),
        })
    }

    /// Creates every table this store uses, if absent.
    fn create_tables(&self) -> Result<(), SqliteStoreError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS nodes (
                id TEXT PRIMARY KEY,
                type_tag TEXT NOT NULL,
                title TEXT,
                body TEXT,
                ts INTEGER,
                extra TEXT NOT NULL,
                repo_id TEXT,
                specialized TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_nodes_type ON nodes(type_tag);
            CREATE INDEX IF NOT EXISTS idx_nodes_repo ON nodes(repo_id);

            CREATE TABLE IF NOT EXISTS edges (
                src TEXT NOT NULL,
                dst TEXT NOT NULL,
                relation TEXT NOT NULL,
                properties TEXT NOT NULL,
                PRIMARY KEY (src, dst, relation)
            );
            CREATE INDEX IF NOT EXISTS idx_edges_src ON edges(src, relation);
            CREATE INDEX IF NOT EXISTS idx_edges_dst ON edges(dst, relation);

            CREATE TABLE IF NOT EXISTS repositories (
                repo_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                root_path TEXT NOT NULL,
                added_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS refresh_timestamps (
                source TEXT PRIMARY KEY,
                instant INTEGER NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Serializes a [`Node`] to its non-ID column tuple.
    fn node_columns(node: &Node) -> Result<NodeColumns, SqliteStoreError> {
        Ok(NodeColumns {
            type_tag: node.node_type.tag(),
            title: node.title.clone(),
            body: node.body.clone(),
            ts: node.ts.map(Timestamp::as_unix_millis),
            extra: serde_json::to_string(&node.extra)?,
            repo_id: node.repo_id.as_ref().map(|r| r.as_str().to_string()),
            specialized: serde_json::to_string(&node.specialized)?,
        })
    }

    /// Reconstructs a [`Node`] from an ID and its already-read columns.
    fn node_from_columns(id: String, columns: NodeColumns) -> Result<Node, SqliteStoreError> {
        let node_type = NodeType::from_tag(&columns.type_tag).ok_or(SqliteStoreError::Sqlite(
            rusqlite::Error::InvalidColumnType(0, "type_tag".to_string(), rusqlite::types::Type::Text),
        ))?;
        let specialized: NodeSpecialized = serde_json::from_str(&columns.specialized)?;
        let extra = serde_json::from_str(&columns.extra)?;
        Ok(Node {
            id: NodeId::from_raw(id),
            node_type,
            title: columns.title,
            body: columns.body,
            ts: columns.ts.map(Timestamp::from_unix_millis),
            extra,
            repo_id: columns.repo_id.map(RepoId::from_raw),
            specialized,
        })
    }

    /// Returns whether `repo_id` is registered.
    fn repository_exists(&self, repo_id: &str) -> Result<bool, SqliteStoreError> {
        let exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM repositories WHERE repo_id = ?1",
                params![repo_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(exists.is_some())
    }

    /// Resolves the effective repository filter for a read: the explicit
    /// `repo_filter` argument if given, else the active-repositories
    /// session filter, else unscoped.
    fn effective_repo_filter(&self, repo_filter: Option<&[RepoId]>) -> Result<Vec<RepoId>, SqliteStoreError> {
        if let Some(filter) = repo_filter {
            return Ok(filter.to_vec());
        }
        self.active_repositories.lock().map(|g| g.clone()).map_err(|_| SqliteStoreError::LockPoisoned)
    }
}

// ============================================================================
// SECTION: GraphStore Implementation
// ============================================================================

impl GraphStore for SqliteStore {
    fn init_schema(&mut self) -> Result<(), StoreError> {
        self.create_tables().map_err(Into::into)
    }

    #[instrument(skip(self, nodes, edges), fields(node_count = nodes.len(), edge_count = edges.len()))]
    fn add_nodes_and_edges(&mut self, nodes: &[Node], edges: &[Edge]) -> Result<(), StoreError> {
        let tx = self.conn.transaction().map_err(SqliteStoreError::from)?;

        for node in nodes {
            if let Some(repo_id) = &node.repo_id {
                let exists: Option<i64> = tx
                    .query_row(
                        "SELECT 1 FROM repositories WHERE repo_id = ?1",
                        params![repo_id.as_str()],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(SqliteStoreError::from)?;
                if exists.is_none() {
                    return Err(SqliteStoreError::UnregisteredRepository {
                        node_id: node.id.as_str().to_string(),
                        repo_id: repo_id.as_str().to_string(),
                    }
                    .into());
                }
            }
            let columns = SqliteStore::node_columns(node).map_err(StoreError::from)?;
            tx.execute(
                "INSERT INTO nodes (id, type_tag, title, body, ts, extra, repo_id, specialized)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                    type_tag = excluded.type_tag,
                    title = excluded.title,
                    body = excluded.body,
                    ts = excluded.ts,
                    extra = excluded.extra,
                    repo_id = excluded.repo_id,
                    specialized = excluded.specialized",
                params![
                    node.id.as_str(),
                    columns.type_tag,
                    columns.title,
                    columns.body,
                    columns.ts,
                    columns.extra,
                    columns.repo_id,
                    columns.specialized,
                ],
            )
            .map_err(SqliteStoreError::from)?;
        }

        let batch_ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        for edge in edges {
            for endpoint in [edge.src.as_str(), edge.dst.as_str()] {
                if batch_ids.contains(endpoint) {
                    continue;
                }
                let exists: Option<i64> = tx
                    .query_row("SELECT 1 FROM nodes WHERE id = ?1", params![endpoint], |row| row.get(0))
                    .optional()
                    .map_err(SqliteStoreError::from)?;
                if exists.is_none() {
                    return Err(SqliteStoreError::DanglingEdge {
                        src: edge.src.as_str().to_string(),
                        dst: edge.dst.as_str().to_string(),
                        relation: edge.relation.label().to_string(),
                    }
                    .into());
                }
            }

            let properties = serde_json::to_string(&edge.properties).map_err(SqliteStoreError::from)?;
            tx.execute(
                "INSERT OR IGNORE INTO edges (src, dst, relation, properties) VALUES (?1, ?2, ?3, ?4)",
                params![edge.src.as_str(), edge.dst.as_str(), edge.relation.label(), properties],
            )
            .map_err(SqliteStoreError::from)?;
        }

        tx.commit().map_err(SqliteStoreError::from)?;
        debug!(nodes = nodes.len(), edges = edges.len(), "committed build transaction");
        Ok(())
    }

    fn get_node_by_id(&self, id: &str) -> Result<Option<Node>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT type_tag, title, body, ts, extra, repo_id, specialized FROM nodes WHERE id = ?1",
                params![id],
                |row| {
                    Ok(NodeColumns {
                        type_tag: row.get(0)?,
                        title: row.get(1)?,
                        body: row.get(2)?,
                        ts: row.get(3)?,
                        extra: row.get(4)?,
                        repo_id: row.get(5)?,
                        specialized: row.get(6)?,
                    })
                },
            )
            .optional()
            .map_err(SqliteStoreError::from)?;

        row.map(|columns| SqliteStore::node_from_columns(id.to_string(), columns).map_err(Into::into))
            .transpose()
    }

    fn get_nodes_by_type(&self, node_type: &NodeType, repo_filter: Option<&[RepoId]>) -> Result<Vec<Node>, StoreError> {
        let filter = self.effective_repo_filter(repo_filter).map_err(StoreError::from)?;
        let tag = node_type.tag();

        let mut stmt = if filter.is_empty() {
            self.conn
                .prepare("SELECT id, title, body, ts, extra, repo_id, specialized FROM nodes WHERE type_tag = ?1")
                .map_err(SqliteStoreError::from)?
        } else {
            self.conn
                .prepare(&format!(
                    "SELECT id, title, body, ts, extra, repo_id, specialized FROM nodes
                     WHERE type_tag = ?1 AND repo_id IN ({})",
                    filter.iter().map(|_| "?").collect::<Vec<_>>().join(",")
                ))
                .map_err(SqliteStoreError::from)?
        };

        let filter_strs: Vec<String> = filter.iter().map(|r| r.as_str().to_string()).collect();
        let mut bound: Vec<&dyn rusqlite::ToSql> = vec![&tag];
        for s in &filter_strs {
            bound.push(s);
        }

        let rows = stmt
            .query_map(bound.as_slice(), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    NodeColumns {
                        type_tag: tag.clone(),
                        title: row.get(1)?,
                        body: row.get(2)?,
                        ts: row.get(3)?,
                        extra: row.get(4)?,
                        repo_id: row.get(5)?,
                        specialized: row.get(6)?,
                    },
                ))
            })
            .map_err(SqliteStoreError::from)?;

        let mut out = Vec::new();
        for row in rows {
            let (id, columns) = row.map_err(SqliteStoreError::from)?;
            out.push(SqliteStore::node_from_columns(id, columns).map_err(StoreError::from)?);
        }
        Ok(out)
    }

    fn get_edges_by_src(&self, id: &str, relation: Option<EdgeRel>) -> Result<Vec<Edge>, StoreError> {
        query_edges(&self.conn, "src", id, relation)
    }

    fn get_edges_by_dst(&self, id: &str, relation: Option<EdgeRel>) -> Result<Vec<Edge>, StoreError> {
        query_edges(&self.conn, "dst", id, relation)
    }

    fn node_count(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))
            .map_err(SqliteStoreError::from)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn edge_count(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))
            .map_err(SqliteStoreError::from)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn save_metadata(&mut self, key: &str, value: &Value) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(value).map_err(SqliteStoreError::from)?;
        self.conn
            .execute(
                "INSERT INTO metadata (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, encoded],
            )
            .map_err(SqliteStoreError::from)?;
        Ok(())
    }

    fn get_metadata(&self, key: &str, default: Option<Value>) -> Result<Option<Value>, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT value FROM metadata WHERE key = ?1", params![key], |row| row.get(0))
            .optional()
            .map_err(SqliteStoreError::from)?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw).map_err(SqliteStoreError::from)?)),
            None => Ok(default),
        }
    }

    fn get_all_metadata(&self) -> Result<BTreeMap<String, Value>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM metadata").map_err(SqliteStoreError::from)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(SqliteStoreError::from)?;
        let mut out = BTreeMap::new();
        for row in rows {
            let (key, raw) = row.map_err(SqliteStoreError::from)?;
            out.insert(key, serde_json::from_str(&raw).map_err(SqliteStoreError::from)?);
        }
        Ok(out)
    }

    fn save_refresh_timestamp(&mut self, source: &str, instant: Timestamp) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO refresh_timestamps (source, instant) VALUES (?1, ?2)
                 ON CONFLICT(source) DO UPDATE SET instant = excluded.instant",
                params![source, instant.as_unix_millis()],
            )
            .map_err(SqliteStoreError::from)?;
        Ok(())
    }

    fn get_refresh_timestamp(&self, source: &str) -> Result<Option<Timestamp>, StoreError> {
        let millis: Option<i64> = self
            .conn
            .query_row(
                "SELECT instant FROM refresh_timestamps WHERE source = ?1",
                params![source],
                |row| row.get(0),
            )
            .optional()
            .map_err(SqliteStoreError::from)?;
        Ok(millis.map(Timestamp::from_unix_millis))
    }

    fn get_all_refresh_timestamps(&self) -> Result<BTreeMap<String, Timestamp>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT source, instant FROM refresh_timestamps")
            .map_err(SqliteStoreError::from)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(SqliteStoreError::from)?;
        let mut out = BTreeMap::new();
        for row in rows {
            let (source, millis) = row.map_err(SqliteStoreError::from)?;
            out.insert(source, Timestamp::from_unix_millis(millis));
        }
        Ok(out)
    }

    fn ensure_repository(&mut self, path: &str, name: Option<&str>) -> Result<RepoId, StoreError> {
        let repo_id = RepoId::from_absolute_path(path);
        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM repositories WHERE repo_id = ?1",
                params![repo_id.as_str()],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(SqliteStoreError::from)?;
        if exists.is_none() {
            let display_name = name.unwrap_or(path);
            self.conn
                .execute(
                    "INSERT INTO repositories (repo_id, name, root_path, added_at) VALUES (?1, ?2, ?3, ?4)",
                    params![repo_id.as_str(), display_name, path, self.clock.now().as_unix_millis()],
                )
                .map_err(SqliteStoreError::from)?;
        }
        Ok(repo_id)
    }

    fn list_repositories(&self) -> Result<Vec<RepositoryRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT repo_id, name, root_path, added_at FROM repositories ORDER BY added_at")
            .map_err(SqliteStoreError::from)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RepositoryRecord {
                    repo_id: RepoId::from_raw(row.get::<_, String>(0)?),
                    name: row.get(1)?,
                    root_path: row.get(2)?,
                    added_at: Timestamp::from_unix_millis(row.get(3)?),
                })
            })
            .map_err(SqliteStoreError::from)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(SqliteStoreError::from)?);
        }
        Ok(out)
    }

    fn set_active_repositories(&mut self, ids: &[RepoId]) -> Result<(), StoreError> {
        for id in ids {
            if !self.repository_exists(id.as_str()).map_err(StoreError::from)? {
                return Err(SqliteStoreError::UnknownRepository(id.as_str().to_string()).into());
            }
        }
        let mut guard = self.active_repositories.lock().map_err(|_| StoreError::from(SqliteStoreError::LockPoisoned))?;
        *guard = ids.to_vec();
        Ok(())
    }

    fn get_active_repositories(&self) -> Result<Vec<RepoId>, StoreError> {
        self.active_repositories
            .lock()
            .map(|g| g.clone())
            .map_err(|_| StoreError::from(SqliteStoreError::LockPoisoned))
    }
}

/// Shared implementation for `get_edges_by_src`/`get_edges_by_dst`:
/// `column` is `"src"` or `"dst"`.
fn query_edges(conn: &Connection, column: &str, id: &str, relation: Option<EdgeRel>) -> Result<Vec<Edge>, StoreError> {
    let sql = match relation {
        Some(_) => format!("SELECT src, dst, relation, properties FROM edges WHERE {column} = ?1 AND relation = ?2"),
        None => format!("SELECT src, dst, relation, properties FROM edges WHERE {column} = ?1"),
    };
    let mut stmt = conn.prepare(&sql).map_err(SqliteStoreError::from)?;

    let rows = if let Some(relation) = relation {
        stmt.query_map(params![id, relation.label()], edge_from_row)
    } else {
        stmt.query_map(params![id], edge_from_row)
    }
    .map_err(SqliteStoreError::from)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(SqliteStoreError::from)?);
    }
    Ok(out)
}

/// Reconstructs an [`Edge`] from a `(src, dst, relation, properties)` row.
fn edge_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Edge> {
    let src: String = row.get(0)?;
    let dst: String = row.get(1)?;
    let relation_label: String = row.get(2)?;
    let properties_raw: String = row.get(3)?;
    let relation = edge_rel_from_label(&relation_label).unwrap_or(EdgeRel::Affects);
    let properties = serde_json::from_str(&properties_raw).unwrap_or_default();
    Ok(Edge {
        src: NodeId::from_raw(src),
        dst: NodeId::from_raw(dst),
        relation,
        properties,
    })
}

/// Reverses [`EdgeRel::label`].
fn edge_rel_from_label(label: &str) -> Option<EdgeRel> {
    Some(match label {
        "CONTAINS" => EdgeRel::Contains,
        "DEPENDS_ON" => EdgeRel::DependsOn,
        "PART_OF" => EdgeRel::PartOf,
        "AFFECTS" => EdgeRel::Affects,
        "CAUSED_BY" => EdgeRel::CausedBy,
        "MERGES" => EdgeRel::Merges,
        "MENTIONS" => EdgeRel::Mentions,
        "DECIDES" => EdgeRel::Decides,
        "BLOCKS" => EdgeRel::Blocks,
        "FOLLOWS" => EdgeRel::Follows,
        "PRECEDES" => EdgeRel::Precedes,
        "HAS_METRIC" => EdgeRel::HasMetric,
        "HAS_ANNOTATION" => EdgeRel::HasAnnotation,
        "SIMULATES" => EdgeRel::Simulates,
        "MEASURES" => EdgeRel::Measures,
        "PREDICTS" => EdgeRel::Predicts,
        "REASONS_ABOUT" => EdgeRel::ReasonsAbout,
        "HAS_ALTERNATIVE" => EdgeRel::HasAlternative,
        "HAS_CRITERION" => EdgeRel::HasCriterion,
        "NEXT_STEP" => EdgeRel::NextStep,
        "HAS_IMPLICATION" => EdgeRel::HasImplication,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use arc_core::Edge;
    use arc_core::EdgeRel;
    use arc_core::GraphStore;
    use arc_core::Node;
    use arc_core::NodeId;
    use arc_core::NodeSpecialized;
    use arc_core::NodeType;
    use arc_core::RepoId;

    use super::SqliteStore;

    fn commit_node(sha: &str) -> Node {
        Node::new(
            NodeId::commit(sha),
            NodeType::Commit,
            NodeSpecialized::Commit {
                sha: sha.to_string(),
                author: "alice".to_string(),
                files: vec!["a.py".to_string()],
            },
        )
    }

    #[test]
    fn add_then_get_round_trips_a_node() {
        let mut store = SqliteStore::open_in_memory().expect("open");
        store.init_schema().expect("schema");
        let node = commit_node("abc123");
        store.add_nodes_and_edges(&[node.clone()], &[]).expect("write");
        let back = store.get_node_by_id("commit:abc123").expect("read").expect("present");
        assert_eq!(back, node);
    }

    #[test]
    fn dangling_edge_is_rejected_and_rolled_back() {
        let mut store = SqliteStore::open_in_memory().expect("open");
        store.init_schema().expect("schema");
        let edge = Edge::new(NodeId::commit("a"), NodeId::pr_opaque("1"), EdgeRel::Merges);
        let err = store.add_nodes_and_edges(&[], &[edge]);
        assert!(err.is_err());
        assert_eq!(store.node_count().expect("count"), 0);
    }

    #[test]
    fn edge_uniqueness_is_a_no_op_on_reingest() {
        let mut store = SqliteStore::open_in_memory().expect("open");
        store.init_schema().expect("schema");
        let commit = commit_node("a");
        let pr = Node::new(
            NodeId::pr_opaque("1"),
            NodeType::Pr,
            NodeSpecialized::Pr {
                number: 1,
                state: "merged".to_string(),
                url: "https://example.com/1".to_string(),
                merged_at: None,
                merged_by: None,
                merged_commit_sha: Some("a".to_string()),
            },
        );
        let edge = Edge::new(pr.id.clone(), commit.id.clone(), EdgeRel::Merges);
        store
            .add_nodes_and_edges(&[commit.clone(), pr.clone()], &[edge.clone()])
            .expect("first write");
        store.add_nodes_and_edges(&[], &[edge]).expect("reingest");
        assert_eq!(store.edge_count().expect("count"), 1);
    }

    #[test]
    fn node_upsert_preserves_stable_id() {
        let mut store = SqliteStore::open_in_memory().expect("open");
        store.init_schema().expect("schema");
        let mut node = commit_node("a");
        store.add_nodes_and_edges(&[node.clone()], &[]).expect("first");
        node.title = Some("updated".to_string());
        store.add_nodes_and_edges(&[node.clone()], &[]).expect("second");
        assert_eq!(store.node_count().expect("count"), 1);
        let back = store.get_node_by_id("commit:a").expect("read").expect("present");
        assert_eq!(back.title.as_deref(), Some("updated"));
    }

    #[test]
    fn active_repositories_scope_type_queries_when_non_empty() {
        let mut store = SqliteStore::open_in_memory().expect("open");
        store.init_schema().expect("schema");
        let repo_a = store.ensure_repository("/repo-a", None).expect("repo a");
        let repo_b = store.ensure_repository("/repo-b", None).expect("repo b");

        let mut file_a = Node::new(
            NodeId::file("x.py"),
            NodeType::File,
            NodeSpecialized::File {
                path: "x.py".to_string(),
                language: None,
                last_modified: None,
            },
        );
        file_a.repo_id = Some(repo_a.clone());
        let mut file_b = file_a.clone();
        file_b.id = NodeId::file("y.py");
        file_b.repo_id = Some(repo_b);

        store.add_nodes_and_edges(&[file_a, file_b], &[]).expect("write");

        store.set_active_repositories(&[repo_a]).expect("set active");
        let scoped = store.get_nodes_by_type(&NodeType::File, None).expect("query");
        assert_eq!(scoped.len(), 1);

        store.set_active_repositories(&[]).expect("clear active");
        let unscoped = store.get_nodes_by_type(&NodeType::File, None).expect("query");
        assert_eq!(unscoped.len(), 2);
    }

    #[test]
    fn metadata_round_trips_with_default_fallback() {
        let mut store = SqliteStore::open_in_memory().expect("open");
        store.init_schema().expect("schema");
        assert_eq!(
            store.get_metadata("absent", Some(serde_json::json!(1))).expect("default"),
            Some(serde_json::json!(1))
        );
        store.save_metadata("present", &serde_json::json!({"a": 1})).expect("save");
        assert_eq!(
            store.get_metadata("present", None).expect("read"),
            Some(serde_json::json!({"a": 1}))
        );
    }

    #[test]
    fn set_active_repositories_rejects_unknown_id() {
        let mut store = SqliteStore::open_in_memory().expect("open");
        store.init_schema().expect("schema");
        let bogus = RepoId::from_raw("repository:deadbeef");
        assert!(store.set_active_repositories(&[bogus]).is_err());
    }
}
