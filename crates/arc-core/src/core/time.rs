// crates/arc-core/src/core/time.rs
// ============================================================================
// Module: Arc Memory Time Model
// Description: Canonical timestamp representation and normalization.
// Purpose: Provide a single `ts` resolution routine so every reader of the
//          graph agrees on a node's effective timestamp.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Arc Memory's core never reads wall-clock time to decide what a node's
//! timestamp *is*; that would make rebuilds non-reproducible. Wall-clock
//! reads are confined to the [`Clock`] trait, which hosts (the build
//! orchestrator, the simulation workflow) inject explicitly so tests can
//! supply a [`FixedClock`]-style stand-in instead of `SystemClock`.
//!
//! [`resolve_effective_timestamp`] is the single routine that normalizes a
//! node's effective timestamp by checking, in order: the `ts` field, then
//! type-specific fields, then `extra` keys. It returns `None` rather than a
//! hard-coded instant when nothing parses, see `DESIGN.md` for why this
//! departs from the original implementation's occasional placeholder
//! instant.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::node::Node;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Canonical timestamp: milliseconds since the Unix epoch.
///
/// # Invariants
/// - No validation is performed; negative values (pre-1970 sources) are
///   accepted as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Builds a timestamp from Unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as Unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Parses an ISO-8601 / RFC 3339 string, normalizing a trailing `Z` to
    /// UTC as the original implementation's date parsing does.
    #[must_use]
    pub fn parse_iso8601(value: &str) -> Option<Self> {
        let normalized = value.trim();
        let dt = OffsetDateTime::parse(normalized, &Rfc3339).ok()?;
        let millis = dt.unix_timestamp_nanos() / 1_000_000;
        i64::try_from(millis).ok().map(Self)
    }

    /// Formats the timestamp as an RFC 3339 / ISO-8601 string in UTC.
    ///
    /// Returns `None` only if the stored value is out of range for
    /// [`OffsetDateTime`], which cannot happen for any timestamp derived
    /// from [`parse_iso8601`] or [`SystemClock`].
    #[must_use]
    pub fn to_iso8601(self) -> Option<String> {
        let nanos = i128::from(self.0) * 1_000_000;
        OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .ok()
            .and_then(|dt| dt.format(&Rfc3339).ok())
    }
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Explicit clock handle so wall-clock reads are injectable, not ambient.
pub trait Clock: Send + Sync {
    /// Returns the current time as Unix epoch milliseconds.
    fn now(&self) -> Timestamp;
}

/// Wall-clock implementation of [`Clock`] backed by [`SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX));
        Timestamp::from_unix_millis(millis)
    }
}

// ============================================================================
// SECTION: Timestamp Normalization
// ============================================================================

/// Resolves a node's effective timestamp.
///
/// Checks, in order: the node's `ts` field; type-specific fields
/// (`merged_at`, `closed_at`, `last_modified`) carried in
/// [`crate::core::node::NodeSpecialized`]; then `extra` keys (`timestamp`,
/// `created_at`, `updated_at`, `date`). Returns `None` when nothing is
/// present or parseable. Callers (e.g. timeline BFS) must treat `None` as
/// unordered, never as a sentinel "oldest" or "newest" value.
#[must_use]
pub fn resolve_effective_timestamp(node: &Node) -> Option<Timestamp> {
    if let Some(ts) = node.ts {
        return Some(ts);
    }
    if let Some(ts) = node.specialized.type_specific_timestamp() {
        return Some(ts);
    }
    for key in ["timestamp", "created_at", "updated_at", "date"] {
        if let Some(value) = node.extra.get(key).and_then(|v| v.as_str())
            && let Some(ts) = Timestamp::parse_iso8601(value)
        {
            return Some(ts);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::Timestamp;
    use crate::core::node::Node;
    use crate::core::node::NodeSpecialized;
    use crate::core::node::NodeType;
    use crate::core::identifiers::NodeId;
    use crate::core::time::resolve_effective_timestamp;

    #[test]
    fn iso8601_round_trips_through_millis() {
        let ts = Timestamp::parse_iso8601("2023-01-01T00:00:00Z").expect("parse");
        assert_eq!(ts.to_iso8601().as_deref(), Some("2023-01-01T00:00:00Z"));
    }

    #[test]
    fn missing_timestamp_resolves_to_none() {
        let node = Node::new(NodeId::adr("x"), NodeType::Adr, NodeSpecialized::Generic);
        assert_eq!(resolve_effective_timestamp(&node), None);
    }

    #[test]
    fn falls_back_to_extra_created_at() {
        let mut node = Node::new(NodeId::adr("x"), NodeType::Adr, NodeSpecialized::Generic);
        node.extra.insert(
            "created_at".to_string(),
            serde_json::Value::String("2023-05-01T12:00:00Z".to_string()),
        );
        assert!(resolve_effective_timestamp(&node).is_some());
    }
}
