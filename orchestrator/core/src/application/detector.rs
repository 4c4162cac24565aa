// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Anomaly detection over recent operational signals.

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::anomaly::{Anomaly, AnomalyId, AnomalyKind};
use crate::domain::config::DetectorConfig;
use crate::domain::signals::{IncidentSeverity, IncidentSource, SignalError, SignalStore};

/// Threshold reported on `incident_severity` anomalies.
pub const INCIDENT_SEVERITY_THRESHOLD: f64 = 7.0;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Signal store query failed: {0}")]
    Signals(#[from] SignalError),
}

pub struct AnomalyDetector {
    signals: Arc<dyn SignalStore>,
    config: DetectorConfig,
}

impl AnomalyDetector {
    pub fn new(signals: Arc<dyn SignalStore>, config: DetectorConfig) -> Self {
        Self { signals, config }
    }

    /// Scan recent events and active incidents for threshold breaches.
    pub async fn detect(&self, scope: &str) -> Result<Vec<Anomaly>, DetectorError> {
        let now = Utc::now();
        let events = self.signals.query_recent_events(self.config.lookback).await?;
        let incidents = self.signals.query_active_incidents().await?;

        let mut anomalies = Vec::new();

        let count = events.len();
        if count > self.config.error_count_threshold {
            let minutes = self.config.lookback.as_secs() / 60;
            anomalies.push(Anomaly::new(
                AnomalyId::new(format!("anom-error-rate-{}-{}", scope, now.timestamp_millis())),
                AnomalyKind::Error,
                "error_rate",
                count as f64,
                self.config.error_count_threshold as f64,
                error_burst_severity(count),
                format!("High error rate detected: {} errors in last {} minutes", count, minutes),
                now,
            ));
        }

        let declared = incidents
            .iter()
            .filter(|i| i.severity.is_high() && i.source == IncidentSource::External);
        for incident in declared {
            let score = match incident.severity {
                IncidentSeverity::Sev0 => 9.5,
                _ => 8.0,
            };
            anomalies.push(Anomaly::new(
                AnomalyId::for_incident(incident.id),
                AnomalyKind::Availability,
                "incident_severity",
                incident.severity.metric_value(),
                INCIDENT_SEVERITY_THRESHOLD,
                score,
                format!("Active {} incident: {}", incident.severity, incident.title),
                incident.created_at,
            ));
        }

        if anomalies.is_empty() && self.config.synthetic_fallback {
            let observed = self
                .signals
                .read_metric(&self.config.probe_metric)
                .await?
                .unwrap_or(0.0);
            debug!(metric = %self.config.probe_metric, observed, "No real anomalies, emitting diagnostic probe");
            anomalies.push(
                Anomaly::new(
                    AnomalyId::new(format!("anom-probe-{}", now.timestamp_millis())),
                    AnomalyKind::Performance,
                    self.config.probe_metric.clone(),
                    observed,
                    self.config.probe_threshold,
                    self.config.synthetic_severity,
                    format!(
                        "Diagnostic probe on {}: {} (threshold: {})",
                        self.config.probe_metric, observed, self.config.probe_threshold
                    ),
                    now,
                )
                .into_synthetic(),
            );
        }

        info!(scope, events = count, anomalies = anomalies.len(), "Anomaly scan complete");
        Ok(anomalies)
    }
}

/// `min(9.0, count / 5)`
pub fn error_burst_severity(count: usize) -> f64 {
    (count as f64 / 5.0).min(9.0)
}
