// crates/arc-ingest/src/mention.rs
// ============================================================================
// Module: Mention Extraction
// Description: Regex-based extraction of `@user`, `#number`, and
//              `PROJ-123`-style ticket-key mentions from free text.
// Purpose: Shared cross-cutting helper used by every ingestor that emits
//          `MENTIONS` edges.
// Dependencies: regex
// ============================================================================

//! ## Overview
//! Mention extraction is language-agnostic and regex-based, exactly as the
//! original implementation's `jira.py` link-relation handling is: false
//! positives inside code-block examples are expected and accepted.
//! Callers resolve a [`Mention`] against their own in-batch
//! PR/issue/ticket map; this module performs no resolution itself.

use std::sync::LazyLock;

use regex::Regex;

/// A single mention found in a body of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mention {
    /// `@user` handle mention.
    User(String),
    /// `#number` issue/PR mention.
    Number(u64),
    /// `PROJ-123`-style ticket key mention.
    TicketKey(String),
}

#[allow(clippy::expect_used, reason = "pattern is a compile-time literal; failure would be a build-breaking typo, not a runtime condition")]
static USER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([A-Za-z0-9][A-Za-z0-9-]{0,38})").expect("valid regex"));
#[allow(clippy::expect_used, reason = "pattern is a compile-time literal; failure would be a build-breaking typo, not a runtime condition")]
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#(\d+)").expect("valid regex"));
#[allow(clippy::expect_used, reason = "pattern is a compile-time literal; failure would be a build-breaking typo, not a runtime condition")]
static TICKET_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z][A-Z0-9]{1,9}-\d+)\b").expect("valid regex"));

/// Scans `body` for `@user`, `#number`, and `PROJ-123` mentions.
///
/// Matches are returned in the order they appear for each pattern, grouped
/// by pattern (all `@user` matches, then all `#number` matches, then all
/// ticket keys) rather than interleaved by position. Callers only care
/// about the resolved set, not source order.
#[must_use]
pub fn extract_mentions(body: &str) -> Vec<Mention> {
    let mut mentions = Vec::new();
    for capture in USER_RE.captures_iter(body) {
        mentions.push(Mention::User(capture[1].to_string()));
    }
    for capture in NUMBER_RE.captures_iter(body) {
        if let Ok(number) = capture[1].parse::<u64>() {
            mentions.push(Mention::Number(number));
        }
    }
    for capture in TICKET_KEY_RE.captures_iter(body) {
        mentions.push(Mention::TicketKey(capture[1].to_string()));
    }
    mentions
}

#[cfg(test)]
mod tests {
    use super::Mention;
    use super::extract_mentions;

    #[test]
    fn extracts_user_handle() {
        let mentions = extract_mentions("thanks @alice-b for the review");
        assert!(mentions.contains(&Mention::User("alice-b".to_string())));
    }

    #[test]
    fn extracts_issue_number() {
        let mentions = extract_mentions("fixes #123 and relates to #456");
        assert!(mentions.contains(&Mention::Number(123)));
        assert!(mentions.contains(&Mention::Number(456)));
    }

    #[test]
    fn extracts_ticket_key() {
        let mentions = extract_mentions("see PROJ-123 for context");
        assert!(mentions.contains(&Mention::TicketKey("PROJ-123".to_string())));
    }

    #[test]
    fn lowercase_word_with_hyphen_number_is_not_a_ticket_key() {
        let mentions = extract_mentions("not-a-ticket-42 is plain text");
        assert!(!mentions.iter().any(|m| matches!(m, Mention::TicketKey(_))));
    }

    #[test]
    fn empty_body_yields_no_mentions() {
        assert!(extract_mentions("").is_empty());
    }
}
