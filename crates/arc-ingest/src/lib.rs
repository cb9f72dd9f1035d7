// crates/arc-ingest/src/lib.rs
// ============================================================================
// Module: Arc Memory Ingestor Plugins
// Description: Source-integration plugins: git, adr, code-hosting,
//              ticketing, doc-platform.
// Purpose: Normalize heterogeneous external sources into graph mutations
//          through the shared `arc_core::interfaces::Ingestor` contract.
// Dependencies: arc-core, git2, glob, reqwest, regex, serde_yaml
// ============================================================================

//! ## Overview
//! Every ingestor in this crate is a stateless value implementing
//! [`arc_core::interfaces::Ingestor`]. None of them hold a database
//! connection or mutate the graph directly; they return an
//! [`arc_core::interfaces::IngestOutput`] that the build orchestrator
//! merges and commits. `git` and `adr` are offline and deterministic;
//! `code_hosting`, `ticketing`, and `doc_platform` talk to a remote API
//! over [`retry::RetryingClient`], which centralizes back-off, rate-limit
//! handling, and error classification so each plugin's `ingest` reads as
//! fetch-then-map.

mod adr;
mod code_hosting;
mod doc_platform;
mod git;
mod mention;
mod retry;
mod ticketing;

pub use adr::AdrIngestor;
pub use code_hosting::CodeHostingIngestor;
pub use doc_platform::DocPlatformIngestor;
pub use git::GitIngestor;
pub use mention::Mention;
pub use mention::extract_mentions;
pub use retry::HttpClientConfig;
pub use retry::RetryingClient;
pub use ticketing::TicketingIngestor;
