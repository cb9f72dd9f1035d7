// crates/arc-config/src/ingestors.rs
// ============================================================================
// Module: Ingestor Configuration
// Description: Per-ingestor `source_config` objects plus the
//              enable-flag table the build orchestrator reads.
// Purpose: One typed struct per ingestor so unknown keys are ignored and
//          missing required keys are caught at validation time, not by a
//          network call.
// Dependencies: serde
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::error::ConfigError;

/// Per-ingestor enable flag, keyed by registry name (`"git"`, `"adr"`,
/// `"code_hosting"`, `"ticketing"`, `"doc_platform"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IngestorToggle(pub BTreeMap<String, bool>);

impl IngestorToggle {
    /// Returns whether `name` is enabled, defaulting to `true` when absent
    /// (an ingestor with no explicit entry runs unless turned off).
    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.0.get(name).copied().unwrap_or(true)
    }
}

/// `git` ingestor configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitConfig {
    /// Maximum number of commits to walk.
    pub max_commits: Option<u64>,
    /// Maximum age, in days, of commits to walk.
    pub days: Option<u64>,
    /// Resume point: do not walk past this commit.
    pub last_commit_hash: Option<String>,
}

/// `adr` ingestor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdrConfig {
    /// Glob pattern for ADR files.
    #[serde(default = "default_adr_glob")]
    pub glob_pattern: String,
}

impl Default for AdrConfig {
    fn default() -> Self {
        Self {
            glob_pattern: default_adr_glob(),
        }
    }
}

fn default_adr_glob() -> String {
    "**/adr/**/*.md".to_string()
}

/// `code-hosting` ingestor configuration. `token` is required when
/// the ingestor is enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeHostingConfig {
    /// Bearer token. Required when this ingestor is enabled.
    pub token: Option<String>,
    /// Opaque resume cursor from a prior run.
    pub cursor: Option<String>,
}

/// `ticketing` ingestor configuration. `token` and `cloud_id` are
/// required when the ingestor is enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketingConfig {
    /// Bearer token. Required when this ingestor is enabled.
    pub token: Option<String>,
    /// Tenant/cloud identifier. Required when this ingestor is enabled.
    pub cloud_id: Option<String>,
    /// Restrict ingestion to these project keys, if set.
    pub project_keys: Option<Vec<String>>,
}

/// `doc-platform` ingestor configuration, covering both the
/// GraphQL-based (Linear-like) and REST-based (Notion-like) backends.
/// `token` is required when the ingestor is enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocPlatformConfig {
    /// Bearer token. Required when this ingestor is enabled.
    pub token: Option<String>,
    /// Restrict ingestion to these database IDs (Notion-like backend only).
    pub database_ids: Option<Vec<String>>,
    /// Restrict ingestion to these page IDs (Notion-like backend only).
    pub page_ids: Option<Vec<String>>,
}

/// Aggregate of every ingestor's configuration plus the enable-flag table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestorsConfig {
    /// Per-ingestor enable flags.
    #[serde(default)]
    pub enabled: IngestorToggle,
    /// `git` ingestor configuration.
    #[serde(default)]
    pub git: GitConfig,
    /// `adr` ingestor configuration.
    #[serde(default)]
    pub adr: AdrConfig,
    /// `code-hosting` ingestor configuration.
    #[serde(default)]
    pub code_hosting: CodeHostingConfig,
    /// `ticketing` ingestor configuration.
    #[serde(default)]
    pub ticketing: TicketingConfig,
    /// `doc-platform` ingestor configuration.
    #[serde(default)]
    pub doc_platform: DocPlatformConfig,
}

impl IngestorsConfig {
    /// Validates that every *enabled* ingestor carries its required keys.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequiredKey`] for the first enabled
    /// ingestor found missing a required key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled.is_enabled("code_hosting") && self.code_hosting.token.is_none() {
            return Err(ConfigError::MissingRequiredKey {
                ingestor: "code_hosting".to_string(),
                key: "token".to_string(),
            });
        }
        if self.enabled.is_enabled("ticketing") {
            if self.ticketing.token.is_none() {
                return Err(ConfigError::MissingRequiredKey {
                    ingestor: "ticketing".to_string(),
                    key: "token".to_string(),
                });
            }
            if self.ticketing.cloud_id.is_none() {
                return Err(ConfigError::MissingRequiredKey {
                    ingestor: "ticketing".to_string(),
                    key: "cloud_id".to_string(),
                });
            }
        }
        if self.enabled.is_enabled("doc_platform") && self.doc_platform.token.is_none() {
            return Err(ConfigError::MissingRequiredKey {
                ingestor: "doc_platform".to_string(),
                key: "token".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::IngestorsConfig;
    use super::TicketingConfig;
    use crate::error::ConfigError;

    #[test]
    fn enabled_ingestor_missing_token_is_an_error() {
        let mut config = IngestorsConfig::default();
        config.enabled.0.insert("code_hosting".to_string(), true);
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingRequiredKey {
                ingestor: "code_hosting".to_string(),
                key: "token".to_string(),
            })
        );
    }

    #[test]
    fn disabled_ingestor_is_not_validated() {
        let mut config = IngestorsConfig::default();
        config.enabled.0.insert("ticketing".to_string(), false);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn ticketing_requires_both_token_and_cloud_id() {
        let mut config = IngestorsConfig::default();
        config.enabled.0.insert("ticketing".to_string(), true);
        config.ticketing = TicketingConfig {
            token: Some("t".to_string()),
            cloud_id: None,
            project_keys: None,
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingRequiredKey {
                ingestor: "ticketing".to_string(),
                key: "cloud_id".to_string(),
            })
        );
    }
}
