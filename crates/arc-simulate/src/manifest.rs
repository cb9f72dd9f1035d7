// crates/arc-simulate/src/manifest.rs
// ============================================================================
// Module: Fault Manifest
// Description: Builds the declarative fault-injection manifest a sandbox
//              backend executes, and its reproducible content hash.
// Dependencies: arc-core, serde, serde_json, serde_yaml
// ============================================================================

//! ## Overview
//! A [`FaultManifest`] is the closed description of one simulation run: a
//! [`Scenario`] drawn from the fixed enumeration, its severity, and the
//! causal blast radius (affected services and files) the manifest targets.
//! [`generate_manifest`] assembles it from a [`DiffRecord`] and an
//! [`arc_causal::CausalGraph`]; [`manifest_hash`] hashes its canonical JSON
//! so two runs over the same diff and scenario settle on the same
//! `manifest_hash`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use arc_core::hashing::HashAlgorithm;
use arc_core::hashing::HashDigest;
use arc_core::hashing::HashError;
use arc_core::hashing::hash_canonical;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::diff::DiffRecord;

// ============================================================================
// SECTION: Scenario
// ============================================================================

/// The closed set of fault-injection scenarios a sandbox backend knows how
/// to run. Adding a scenario means adding a backend implementation for it;
/// this is deliberately not open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// Injected latency on outbound network calls.
    NetworkLatency,
    /// Injected packet loss on outbound network calls.
    NetworkLoss,
    /// CPU saturation on the affected services' containers.
    CpuStress,
    /// Memory pressure on the affected services' containers.
    MemoryStress,
    /// Disk I/O throttling on the affected services' containers.
    DiskStress,
    /// Kills and restarts a service's pod mid-run.
    PodFailure,
}

impl Scenario {
    /// Parses a scenario from its wire name (e.g. `"network_latency"`).
    #[must_use]
    pub fn from_str_relaxed(s: &str) -> Option<Self> {
        match s {
            "network_latency" => Some(Self::NetworkLatency),
            "network_loss" => Some(Self::NetworkLoss),
            "cpu_stress" => Some(Self::CpuStress),
            "memory_stress" => Some(Self::MemoryStress),
            "disk_stress" => Some(Self::DiskStress),
            "pod_failure" => Some(Self::PodFailure),
            _ => None,
        }
    }

    /// The wire name serialized in manifests and simulation nodes.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NetworkLatency => "network_latency",
            Self::NetworkLoss => "network_loss",
            Self::CpuStress => "cpu_stress",
            Self::MemoryStress => "memory_stress",
            Self::DiskStress => "disk_stress",
            Self::PodFailure => "pod_failure",
        }
    }

    /// A short human-readable description, for callers presenting scenario
    /// choices to an operator (e.g. a CLI's `--scenario` help text).
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::NetworkLatency => "Injects latency on outbound network calls from affected services.",
            Self::NetworkLoss => "Injects packet loss on outbound network calls from affected services.",
            Self::CpuStress => "Saturates CPU on the containers backing affected services.",
            Self::MemoryStress => "Applies memory pressure on the containers backing affected services.",
            Self::DiskStress => "Throttles disk I/O on the containers backing affected services.",
            Self::PodFailure => "Kills and restarts an affected service's pod mid-run.",
        }
    }

    /// The shell command a [`crate::sandbox::ProcessSandboxBackend`] runs
    /// inside the target container to realize this scenario at the given
    /// severity (0-100, linearly scaled into each scenario's native units).
    #[must_use]
    pub fn fault_command(self, severity: u8) -> String {
        let severity = u32::from(severity);
        match self {
            Self::NetworkLatency => {
                format!("tc qdisc add dev eth0 root netem delay {}ms", severity * 10)
            }
            Self::NetworkLoss => {
                format!("tc qdisc add dev eth0 root netem loss {severity}%")
            }
            Self::CpuStress => {
                format!("stress-ng --cpu 0 --cpu-load {severity} --timeout 60s")
            }
            Self::MemoryStress => {
                format!("stress-ng --vm 1 --vm-bytes {severity}% --timeout 60s")
            }
            Self::DiskStress => {
                format!("stress-ng --io 1 --hdd 1 --hdd-bytes {severity}M --timeout 60s")
            }
            Self::PodFailure => "kill 1".to_string(),
        }
    }
}

/// Enumerates the closed set of scenarios with their wire name and a
/// human-readable description, for callers that want to present scenario
/// choices without hard-coding the enumeration themselves.
#[must_use]
pub fn list_available_scenarios() -> Vec<(&'static str, &'static str)> {
    [
        Scenario::NetworkLatency,
        Scenario::NetworkLoss,
        Scenario::CpuStress,
        Scenario::MemoryStress,
        Scenario::DiskStress,
        Scenario::PodFailure,
    ]
    .into_iter()
    .map(|s| (s.as_str(), s.description()))
    .collect()
}

// ============================================================================
// SECTION: Fault Manifest
// ============================================================================

/// The declarative description of one simulation run, handed to a
/// [`crate::sandbox::SandboxBackend`] and persisted to `sim/manifest_<hash>.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultManifest {
    /// The fault scenario to inject.
    pub scenario: Scenario,
    /// Severity on a 0-100 scale.
    pub severity: u8,
    /// Services the causal graph places downstream of the diff.
    pub affected_services: Vec<String>,
    /// Files the diff touched.
    pub affected_files: Vec<String>,
    /// Source rev-range this manifest was generated from.
    pub range: String,
}

impl FaultManifest {
    /// Serializes this manifest to YAML, the on-disk format under
    /// `sim/manifest_<hash>.yaml`.
    ///
    /// # Errors
    ///
    /// Returns an error if YAML serialization fails, which cannot happen
    /// for this type's shape but is surfaced rather than unwrapped.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Failures saving or loading a [`FaultManifest`] to/from disk.
#[derive(Debug, Error)]
pub enum ManifestIoError {
    /// The file could not be read or written.
    #[error("manifest I/O error: {0}")]
    Io(String),
    /// The file's extension-selected format (YAML or JSON) failed to parse
    /// or serialize.
    #[error("manifest (de)serialization error: {0}")]
    Format(String),
}

/// Writes `manifest` to `path`, the `sim/manifest_<hash>.yaml` artifact from
/// the persisted-state layout. The format is selected by `path`'s extension:
/// `.yaml`/`.yml` writes YAML, anything else writes pretty JSON.
///
/// # Errors
///
/// Returns [`ManifestIoError`] if serialization or the write fails.
pub fn save_manifest_to_path(manifest: &FaultManifest, path: &Path) -> Result<(), ManifestIoError> {
    let is_yaml = path.extension().and_then(|e| e.to_str()).is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
    let bytes = if is_yaml {
        manifest.to_yaml().map_err(|e| ManifestIoError::Format(e.to_string()))?.into_bytes()
    } else {
        serde_json::to_vec_pretty(manifest).map_err(|e| ManifestIoError::Format(e.to_string()))?
    };
    fs::write(path, bytes).map_err(|e| ManifestIoError::Io(e.to_string()))
}

/// Loads a [`FaultManifest`] previously written by [`save_manifest_to_path`].
/// The format is selected by `path`'s extension, matching
/// [`save_manifest_to_path`]'s dispatch.
///
/// # Errors
///
/// Returns [`ManifestIoError`] if the file cannot be read or does not parse
/// in the format its extension selects.
pub fn load_manifest_from_path(path: &Path) -> Result<FaultManifest, ManifestIoError> {
    let bytes = fs::read(path).map_err(|e| ManifestIoError::Io(e.to_string()))?;
    let is_yaml = path.extension().and_then(|e| e.to_str()).is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
    if is_yaml {
        serde_yaml::from_slice(&bytes).map_err(|e| ManifestIoError::Format(e.to_string()))
    } else {
        serde_json::from_slice(&bytes).map_err(|e| ManifestIoError::Format(e.to_string()))
    }
}

/// Builds a [`FaultManifest`] from a diff and the causal graph scoped to it.
#[must_use]
pub fn generate_manifest(diff: &DiffRecord, affected_services: &BTreeSet<String>, scenario: Scenario, severity: u8) -> FaultManifest {
    FaultManifest {
        scenario,
        severity,
        affected_services: affected_services.iter().cloned().collect(),
        affected_files: diff.files.iter().map(|f| f.path.clone()).collect(),
        range: diff.range.clone(),
    }
}

/// Hashes a manifest's canonical JSON representation (SHA-256 over sorted
/// object keys) into the `manifest_hash` attached to simulation nodes and
/// attestations. Two manifests with the same fields in any field order hash
/// identically.
///
/// # Errors
///
/// Returns an error if the manifest contains a non-finite float, which
/// cannot occur for this type's all-integer/string/Vec<String> shape.
pub fn manifest_hash(manifest: &FaultManifest) -> Result<HashDigest, HashError> {
    hash_canonical(HashAlgorithm::Sha256, manifest)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use tempfile::TempDir;

    use super::FaultManifest;
    use super::Scenario;
    use super::generate_manifest;
    use super::list_available_scenarios;
    use super::load_manifest_from_path;
    use super::manifest_hash;
    use super::save_manifest_to_path;
    use crate::diff::DiffRecord;
    use crate::diff::DiffStats;

    fn sample_diff() -> DiffRecord {
        DiffRecord {
            files: vec![],
            commit_count: 1,
            range: "HEAD~1..HEAD".to_string(),
            start_commit: "a".to_string(),
            end_commit: "b".to_string(),
            stats: DiffStats::default(),
            timestamp: arc_core::Timestamp::from_unix_millis(0),
        }
    }

    #[test]
    fn scenario_round_trips_through_wire_name() {
        for scenario in [
            Scenario::NetworkLatency,
            Scenario::NetworkLoss,
            Scenario::CpuStress,
            Scenario::MemoryStress,
            Scenario::DiskStress,
            Scenario::PodFailure,
        ] {
            assert_eq!(Scenario::from_str_relaxed(scenario.as_str()), Some(scenario));
        }
    }

    #[test]
    fn unknown_scenario_name_is_rejected() {
        assert_eq!(Scenario::from_str_relaxed("bogus"), None);
    }

    #[test]
    fn manifest_hash_is_stable_across_field_order() {
        let diff = sample_diff();
        let services: BTreeSet<String> = ["checkout".to_string(), "billing".to_string()].into_iter().collect();
        let manifest_a = generate_manifest(&diff, &services, Scenario::NetworkLatency, 50);
        let manifest_b = FaultManifest {
            scenario: manifest_a.scenario,
            severity: manifest_a.severity,
            affected_services: manifest_a.affected_services.clone(),
            affected_files: manifest_a.affected_files.clone(),
            range: manifest_a.range.clone(),
        };
        assert_eq!(manifest_hash(&manifest_a).expect("hash a").hex, manifest_hash(&manifest_b).expect("hash b").hex);
    }

    #[test]
    fn different_severity_changes_the_hash() {
        let diff = sample_diff();
        let services = BTreeSet::new();
        let low = generate_manifest(&diff, &services, Scenario::CpuStress, 10);
        let high = generate_manifest(&diff, &services, Scenario::CpuStress, 90);
        assert_ne!(manifest_hash(&low).expect("hash low").hex, manifest_hash(&high).expect("hash high").hex);
    }

    #[test]
    fn fault_command_scales_with_severity() {
        assert_eq!(Scenario::NetworkLatency.fault_command(50), "tc qdisc add dev eth0 root netem delay 500ms");
        assert_eq!(Scenario::NetworkLoss.fault_command(10), "tc qdisc add dev eth0 root netem loss 10%");
    }

    #[test]
    fn list_available_scenarios_covers_the_closed_enumeration() {
        let scenarios = list_available_scenarios();
        assert_eq!(scenarios.len(), 6);
        assert!(scenarios.iter().any(|(name, _)| *name == "network_latency"));
        assert!(scenarios.iter().all(|(_, desc)| !desc.is_empty()));
    }

    #[test]
    fn manifest_round_trips_through_yaml_path() {
        let diff = sample_diff();
        let services: BTreeSet<String> = ["checkout".to_string()].into_iter().collect();
        let manifest = generate_manifest(&diff, &services, Scenario::PodFailure, 80);
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("manifest_abc.yaml");
        save_manifest_to_path(&manifest, &path).expect("save");
        let loaded = load_manifest_from_path(&path).expect("load");
        assert_eq!(loaded, manifest);
    }

    #[test]
    fn manifest_round_trips_through_json_path() {
        let diff = sample_diff();
        let services = BTreeSet::new();
        let manifest = generate_manifest(&diff, &services, Scenario::DiskStress, 20);
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("manifest_abc.json");
        save_manifest_to_path(&manifest, &path).expect("save");
        let loaded = load_manifest_from_path(&path).expect("load");
        assert_eq!(loaded, manifest);
    }
}
