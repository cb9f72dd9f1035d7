// crates/arc-store-sqlite/src/lib.rs
// ============================================================================
// Module: Arc Memory SQLite Store
// Description: Embedded single-file `GraphStore` implementation.
// Purpose: Give the build orchestrator and every query component a
//          database-agnostic adapter backed by a single `graph.db` file.
// Dependencies: arc-core, rusqlite, serde_json
// ============================================================================

//! ## Overview
//! `SqliteStore` is the reference [`arc_core::GraphStore`] backend: nodes,
//! edges, metadata, refresh timestamps, and the repository registry each
//! live in their own table inside one SQLite file opened in WAL mode.
//! Writes run inside a single transaction per [`SqliteStore::add_nodes_and_edges`]
//! call; the store is not required to be thread-safe for writes (the build
//! orchestrator serializes them).

mod store;

pub use store::SCHEMA_VERSION;
pub use store::SqliteStore;
pub use store::SqliteStoreError;
