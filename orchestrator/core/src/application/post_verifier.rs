// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Post-execution verification: re-measure the primary anomaly's signal.
//!
//! Error bursts are re-measured over the interval after execution only, scaled
//! to the detector's lookback window, so the errors that triggered the run do
//! not count against the remediation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::anomaly::Anomaly;
use crate::domain::config::{DetectorConfig, VerifierConfig};
use crate::domain::signals::{SignalError, SignalStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostVerification {
    pub verified: bool,
    pub metric: String,
    pub before: f64,
    pub after: Option<f64>,
    pub improvement_percent: f64,
    pub message: String,
}

pub struct PostExecutionVerifier {
    signals: Arc<dyn SignalStore>,
    config: VerifierConfig,
    lookback: Duration,
}

impl PostExecutionVerifier {
    pub fn new(signals: Arc<dyn SignalStore>, config: VerifierConfig, detector: &DetectorConfig) -> Self {
        Self {
            signals,
            config,
            lookback: detector.lookback,
        }
    }

    /// `executed_at` is when the remediation finished; signals observed
    /// before it belong to the "before" measurement.
    pub async fn verify(&self, primary: &Anomaly, executed_at: DateTime<Utc>) -> PostVerification {
        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }

        let before = primary.observed_value;
        let after = match self.measure(primary, executed_at).await {
            Ok(value) => value,
            Err(e) => {
                warn!(metric = %primary.metric, error = %e, "Re-measurement failed");
                None
            }
        };

        let result = evaluate(
            &primary.metric,
            before,
            after,
            self.config.min_improvement_percent,
        );
        info!(
            metric = %result.metric,
            before = result.before,
            after = ?result.after,
            improvement = result.improvement_percent,
            verified = result.verified,
            "Post-execution verification"
        );
        result
    }

    async fn measure(&self, primary: &Anomaly, executed_at: DateTime<Utc>) -> Result<Option<f64>, SignalError> {
        match primary.metric.as_str() {
            "error_rate" => {
                let events = self.signals.query_recent_events(self.lookback).await?;
                let fresh = events.iter().filter(|e| e.timestamp > executed_at).count();
                let elapsed = (Utc::now() - executed_at).to_std().unwrap_or_default();
                Ok(Some(per_window_rate(fresh, elapsed, self.lookback)))
            }
            "incident_severity" => {
                let incidents = self.signals.query_active_incidents().await?;
                let target = primary.id.incident_id();
                let current = incidents
                    .iter()
                    .find(|i| Some(i.id) == target)
                    .map(|i| i.severity.metric_value())
                    .unwrap_or(0.0);
                Ok(Some(current))
            }
            other => self.signals.read_metric(other).await,
        }
    }
}

/// Scale a count observed over `elapsed` to the number expected over
/// `window`. Intervals shorter than a second count as one second.
pub fn per_window_rate(count: usize, elapsed: Duration, window: Duration) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let window = window.as_secs_f64().max(1.0);
    let elapsed = elapsed.as_secs_f64().clamp(1.0, window);
    count as f64 * window / elapsed
}

/// Improvement is `(before - after) / before * 100`; verified when it
/// strictly exceeds `min_improvement_percent`.
pub fn evaluate(metric: &str, before: f64, after: Option<f64>, min_improvement_percent: f64) -> PostVerification {
    let Some(after) = after else {
        return PostVerification {
            verified: false,
            metric: metric.to_string(),
            before,
            after: None,
            improvement_percent: 0.0,
            message: format!("Remediation could not be verified: {} is unreadable.", metric),
        };
    };

    let improvement_percent = if before > 0.0 {
        (before - after) / before * 100.0
    } else {
        0.0
    };
    let verified = improvement_percent > min_improvement_percent;
    let message = if verified {
        format!(
            "Remediation verified: {} improved from {} to {}.",
            metric, before, after
        )
    } else {
        format!(
            "Remediation verification failed: {} went from {} to {}.",
            metric, before, after
        )
    };

    PostVerification {
        verified,
        metric: metric.to_string(),
        before,
        after: Some(after),
        improvement_percent,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_improvement_math() {
        let result = evaluate("latency", 2450.0, Some(98.0), 0.0);
        assert!(result.verified);
        assert!((result.improvement_percent - 96.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_change_is_not_verified() {
        assert!(!evaluate("latency", 100.0, Some(100.0), 0.0).verified);
        assert!(!evaluate("latency", 100.0, Some(120.0), 0.0).verified);
    }

    #[test]
    fn test_threshold_is_strict() {
        assert!(!evaluate("latency", 100.0, Some(50.0), 50.0).verified);
        assert!(evaluate("latency", 100.0, Some(49.0), 50.0).verified);
    }

    #[test]
    fn test_unreadable_metric_is_not_verified() {
        let result = evaluate("latency", 100.0, None, 0.0);
        assert!(!result.verified);
        assert!(result.after.is_none());
    }

    #[test]
    fn test_zero_baseline_is_not_verified() {
        assert!(!evaluate("error_rate", 0.0, Some(0.0), 0.0).verified);
    }

    #[test]
    fn test_per_window_rate_scales_short_intervals() {
        let window = Duration::from_secs(900);
        assert_eq!(per_window_rate(0, Duration::from_millis(10), window), 0.0);
        assert_eq!(per_window_rate(3, Duration::from_secs(90), window), 30.0);
        assert_eq!(per_window_rate(1, Duration::from_millis(10), window), 900.0);
        assert_eq!(per_window_rate(4, Duration::from_secs(3600), window), 4.0);
    }

    #[tokio::test]
    async fn test_error_rate_ignores_errors_before_execution() {
        use crate::domain::anomaly::{AnomalyId, AnomalyKind};
        use crate::domain::signals::SignalEvent;
        use crate::infrastructure::repositories::InMemorySignalStore;

        let store = InMemorySignalStore::new();
        for i in 0..15 {
            store.push_event(SignalEvent::error("api", format!("timeout {}", i)));
        }
        let executed_at = Utc::now();
        let primary = Anomaly::new(
            AnomalyId::new("anom-error-rate"),
            AnomalyKind::Error,
            "error_rate",
            15.0,
            10.0,
            3.0,
            "High error rate detected",
            executed_at,
        );
        let verifier = PostExecutionVerifier::new(
            Arc::new(store.clone()),
            VerifierConfig::default(),
            &DetectorConfig::default(),
        );

        let result = verifier.verify(&primary, executed_at).await;
        assert!(result.verified);
        assert_eq!(result.after, Some(0.0));

        store.push_event(SignalEvent::error("api", "still failing"));
        let result = verifier.verify(&primary, executed_at).await;
        assert!(!result.verified);
    }
}
