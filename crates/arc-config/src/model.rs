// crates/arc-config/src/model.rs
// ============================================================================
// Module: Arc Memory Config Model
// Description: Top-level `ArcConfig`: arc directory, active repositories,
//              sandbox backend, simulation timeout, logging verbosity.
// Purpose: One struct loaded once at process start and passed by reference
//          everywhere else (no global mutable config singleton).
// Dependencies: serde, toml, arc-core
// ============================================================================

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::error::ConfigError;
use crate::error::MAX_CONFIG_FILE_BYTES;
use crate::error::MAX_CONFIG_PATH_COMPONENT_LENGTH;
use crate::error::MAX_CONFIG_PATH_LENGTH;
use crate::ingestors::IngestorsConfig;

/// Simulation sandbox backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxBackend {
    /// No sandbox available; `run_simulation` synthesizes a deterministic
    /// mock result from severity.
    #[default]
    Mock,
    /// A real ephemeral single-node cluster backend (exercised only by the
    /// `#[ignore]`-gated `testcontainers` integration test).
    Container,
}

/// Structured-log verbosity, mapped onto a `tracing` `EnvFilter` directive
/// by the orchestrator's telemetry initializer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogVerbosity {
    /// Errors only.
    Error,
    /// Warnings and errors.
    Warn,
    /// Normal operational detail.
    #[default]
    Info,
    /// Verbose, per-item detail (pagination pages, retry attempts).
    Debug,
    /// Maximum detail, including request/response bodies where safe.
    Trace,
}

impl LogVerbosity {
    /// Returns the `tracing` directive string for this verbosity.
    #[must_use]
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Simulation workflow configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Sandbox backend selection.
    #[serde(default)]
    pub sandbox_backend: SandboxBackend,
    /// Global workflow timeout, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Metric sampling interval during a sandbox run, in milliseconds.
    #[serde(default = "default_metric_interval_ms")]
    pub metric_interval_ms: u64,
}

const fn default_timeout_ms() -> u64 {
    5 * 60 * 1000
}

const fn default_metric_interval_ms() -> u64 {
    1_000
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            sandbox_backend: SandboxBackend::default(),
            timeout_ms: default_timeout_ms(),
            metric_interval_ms: default_metric_interval_ms(),
        }
    }
}

impl SimulationConfig {
    /// Validates that the timeout is non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSimulationTimeout`] when `timeout_ms`
    /// is zero.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::InvalidSimulationTimeout);
        }
        Ok(())
    }
}

/// Top-level Arc Memory configuration, loaded once from TOML at process
/// start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArcConfig {
    /// Directory holding `graph.db`, `.attest/`, `sim/`, `log/`.
    #[serde(default = "default_arc_dir")]
    pub arc_dir: String,
    /// Repository root paths registered and active by default.
    #[serde(default)]
    pub active_repositories: Vec<String>,
    /// Per-ingestor configuration and enable flags.
    #[serde(default)]
    pub ingestors: IngestorsConfig,
    /// Simulation workflow configuration.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Structured-log verbosity.
    #[serde(default)]
    pub log_verbosity: LogVerbosity,
}

fn default_arc_dir() -> String {
    "~/.arc".to_string()
}

impl Default for ArcConfig {
    fn default() -> Self {
        Self {
            arc_dir: default_arc_dir(),
            active_repositories: Vec::new(),
            ingestors: IngestorsConfig::default(),
            simulation: SimulationConfig::default(),
            log_verbosity: LogVerbosity::default(),
        }
    }
}

impl ArcConfig {
    /// Loads configuration from `path`, or returns [`Self::default`] when
    /// `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the path is malformed, the file cannot
    /// be read, exceeds the size limit, is not UTF-8, is not valid TOML, or
    /// fails [`Self::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let path_str = path.to_string_lossy();
        if path_str.len() > MAX_CONFIG_PATH_LENGTH {
            return Err(ConfigError::PathTooLong);
        }
        for component in path.components() {
            if component.as_os_str().len() > MAX_CONFIG_PATH_COMPONENT_LENGTH {
                return Err(ConfigError::PathComponentTooLong);
            }
        }

        let bytes = fs::read(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_BYTES {
            return Err(ConfigError::FileTooLarge);
        }
        let text = String::from_utf8(bytes).map_err(|_| ConfigError::NotUtf8)?;

        let config: Self = toml::from_str(&text).map_err(|e| ConfigError::InvalidToml(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field invariants: enabled-ingestor required keys and
    /// simulation timeout bounds.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ingestors.validate()?;
        self.simulation.validate()?;
        Ok(())
    }

    /// Expands `arc_dir`'s leading `~` to the user's home directory, if
    /// present and resolvable; otherwise returns the path unchanged.
    #[must_use]
    pub fn resolved_arc_dir(&self) -> String {
        if let Some(rest) = self.arc_dir.strip_prefix("~/")
            && let Ok(home) = std::env::var("HOME")
        {
            return format!("{home}/{rest}");
        }
        self.arc_dir.clone()
    }
}
