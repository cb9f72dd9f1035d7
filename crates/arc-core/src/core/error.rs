// crates/arc-core/src/core/error.rs
// ============================================================================
// Module: Arc Memory Error Taxonomy
// Description: Closed error-kind enumeration shared across every crate.
// Purpose: Classify failures by kind, so
//          callers can branch on `kind` instead of matching crate-local
//          error types.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Every surfaced error carries a `details` map with at least `source` and
//! `operation` so failures are reproducible without re-running the network
//! call that produced them. Crate-local error enums (e.g. the `SqliteStore`
//! errors in `arc-store-sqlite`) convert into [`ArcError`] at the crate
//! boundary; they are not replaced by it internally.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

// ============================================================================
// SECTION: Error Kind
// ============================================================================

/// Closed error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArcErrorKind {
    /// Missing or invalid credentials for an external source. Fatal to the
    /// ingestor that raised it; other ingestors continue.
    Auth,
    /// Remote quota exhausted; recovered locally by sleep-and-retry, with a
    /// cap after which it is surfaced.
    RateLimit,
    /// Transient transport failure; retried with back-off, surfaced after
    /// the retry ceiling.
    Network,
    /// Malformed external payload or configuration; logged and skipped per
    /// item, the plugin continues.
    Parse,
    /// Explicitly requested entity absent.
    NotFound,
    /// Store I/O or constraint failure; fatal to the current transaction.
    Database,
    /// Sandbox environment creation or execution failure.
    Sandbox,
    /// Cooperative cancellation.
    Cancelled,
}

impl fmt::Display for ArcErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Auth => "auth",
            Self::RateLimit => "rate-limit",
            Self::Network => "network",
            Self::Parse => "parse",
            Self::NotFound => "not-found",
            Self::Database => "database",
            Self::Sandbox => "sandbox",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

// ============================================================================
// SECTION: Error
// ============================================================================

/// A classified Arc Memory error.
///
/// # Invariants
/// - `details` never embeds raw secret material (bearer tokens, signing
///   keys); it carries reproduction context only.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct ArcError {
    /// Taxonomy classification.
    pub kind: ArcErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Reproduction context (`source`, `operation`, and anything else
    /// useful).
    pub details: BTreeMap<String, String>,
}

impl ArcError {
    /// Builds an error with no detail context.
    #[must_use]
    pub fn new(kind: ArcErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    /// Adds a detail entry, returning `self` for chaining.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Convenience constructor for [`ArcErrorKind::Database`].
    #[must_use]
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ArcErrorKind::Database, message)
    }

    /// Convenience constructor for [`ArcErrorKind::NotFound`].
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ArcErrorKind::NotFound, message)
    }

    /// Convenience constructor for [`ArcErrorKind::Parse`].
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ArcErrorKind::Parse, message)
    }

    /// Returns whether this error kind is, in general, safe to retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind, ArcErrorKind::Network | ArcErrorKind::RateLimit)
    }
}

#[cfg(test)]
mod tests {
    use super::ArcError;
    use super::ArcErrorKind;

    #[test]
    fn retryable_kinds_are_network_and_rate_limit_only() {
        assert!(ArcError::new(ArcErrorKind::Network, "x").is_retryable());
        assert!(ArcError::new(ArcErrorKind::RateLimit, "x").is_retryable());
        assert!(!ArcError::new(ArcErrorKind::Auth, "x").is_retryable());
        assert!(!ArcError::new(ArcErrorKind::Database, "x").is_retryable());
    }

    #[test]
    fn details_accumulate_via_chaining() {
        let err = ArcError::new(ArcErrorKind::Network, "timeout")
            .with_detail("source", "github")
            .with_detail("operation", "list_prs");
        assert_eq!(err.details.get("source").map(String::as_str), Some("github"));
    }
}
