// crates/arc-simulate/src/risk.rs
// ============================================================================
// Module: Risk Scoring
// Description: Reduces a scenario's severity and observed sandbox metrics to
//              a single 0..=100 risk score.
// Dependencies: none beyond std
// ============================================================================

//! ## Overview
//! With no live sandbox run (`live = false`, the mock path), the score is
//! exactly `severity / 2` and ignores metrics entirely. With a live run, an
//! additional metrics-informed penalty is layered on top, but
//! [`compute_risk_score`] is guaranteed monotonic in `severity` either way:
//! increasing severity never lowers the score.

use std::collections::BTreeMap;

/// Metric key read for the live-path error-rate penalty, if present.
pub const ERROR_RATE_METRIC: &str = "error_rate";

/// Computes a `0..=100` risk score from `severity` and observed `metrics`.
///
/// Without a live sandbox run (`live = false`), returns exactly
/// `severity / 2`, ignoring `metrics`. With a live run, adds an
/// `error_rate`-weighted penalty (`error_rate * 100`, capped so the total
/// never exceeds 100). The penalty term is non-negative, so the result is
/// always monotonic non-decreasing in `severity` for a fixed metric set.
#[must_use]
pub fn compute_risk_score(severity: u8, metrics: &BTreeMap<String, f64>, live: bool) -> u8 {
    let baseline = severity / 2;
    if !live {
        return baseline;
    }
    let error_rate = metrics.get(ERROR_RATE_METRIC).copied().unwrap_or(0.0).clamp(0.0, 1.0);
    #[allow(clippy::cast_possible_truncation, reason = "error_rate clamped to [0,1] before scaling")]
    #[allow(clippy::cast_sign_loss, reason = "error_rate clamped non-negative before scaling")]
    let penalty = (error_rate * 100.0).round() as u8;
    baseline.saturating_add(penalty).min(100)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::compute_risk_score;

    #[test]
    fn mock_path_is_exactly_severity_over_two() {
        let metrics = BTreeMap::new();
        assert_eq!(compute_risk_score(50, &metrics, false), 25);
        assert_eq!(compute_risk_score(0, &metrics, false), 0);
        assert_eq!(compute_risk_score(100, &metrics, false), 50);
    }

    #[test]
    fn mock_path_ignores_metrics() {
        let mut metrics = BTreeMap::new();
        metrics.insert("error_rate".to_string(), 0.9);
        assert_eq!(compute_risk_score(50, &metrics, false), 25);
    }

    #[test]
    fn live_path_adds_error_rate_penalty() {
        let mut metrics = BTreeMap::new();
        metrics.insert("error_rate".to_string(), 0.2);
        assert_eq!(compute_risk_score(50, &metrics, true), 45);
    }

    #[test]
    fn live_path_caps_at_one_hundred() {
        let mut metrics = BTreeMap::new();
        metrics.insert("error_rate".to_string(), 1.0);
        assert_eq!(compute_risk_score(100, &metrics, true), 100);
    }

    #[test]
    fn score_is_monotonic_in_severity() {
        let mut metrics = BTreeMap::new();
        metrics.insert("error_rate".to_string(), 0.05);
        let mut prev = 0;
        for severity in 0..=u8::MAX {
            let score = compute_risk_score(severity, &metrics, true);
            assert!(score >= prev);
            prev = score;
        }
    }
}
