// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Anomaly Domain
//!
//! An [`Anomaly`] is a scored threshold breach produced by the detector. It is
//! immutable once created; later stages reference it by [`AnomalyId`].
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `kind` | Coarse class of the signal (performance, error, ...) |
//! | `observed_value` / `threshold` | The measurement that tripped the detector |
//! | `severity_score` | `0.0 – 10.0`, clamped on construction |
//! | `synthetic` | `true` for the idle-environment diagnostic fallback |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::signals::IncidentId;

const INCIDENT_PREFIX: &str = "anom-incident-";

/// Severity at or above which an anomaly is labelled CRITICAL.
pub const DEFAULT_CRITICAL_SEVERITY: f64 = 8.0;

pub const MAX_SEVERITY: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnomalyId(pub String);

impl AnomalyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn for_incident(incident_id: IncidentId) -> Self {
        Self(format!("{}{}", INCIDENT_PREFIX, incident_id))
    }

    /// The incident an availability anomaly was raised for.
    pub fn incident_id(&self) -> Option<IncidentId> {
        self.0
            .strip_prefix(INCIDENT_PREFIX)
            .and_then(|rest| Uuid::parse_str(rest).ok())
            .map(IncidentId)
    }
}

impl fmt::Display for AnomalyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyKind {
    Performance,
    Error,
    Availability,
    Security,
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AnomalyKind::Performance => "PERFORMANCE",
            AnomalyKind::Error => "ERROR",
            AnomalyKind::Availability => "AVAILABILITY",
            AnomalyKind::Security => "SECURITY",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub id: AnomalyId,
    pub kind: AnomalyKind,
    pub metric: String,
    pub observed_value: f64,
    pub threshold: f64,
    pub severity_score: f64,
    pub description: String,
    pub observed_at: DateTime<Utc>,
    #[serde(default)]
    pub synthetic: bool,
}

impl Anomaly {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: AnomalyId,
        kind: AnomalyKind,
        metric: impl Into<String>,
        observed_value: f64,
        threshold: f64,
        severity_score: f64,
        description: impl Into<String>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind,
            metric: metric.into(),
            observed_value,
            threshold,
            severity_score: clamp_severity(severity_score),
            description: description.into(),
            observed_at,
            synthetic: false,
        }
    }

    /// Marks the anomaly as the detector's diagnostic fallback.
    pub fn into_synthetic(mut self) -> Self {
        self.synthetic = true;
        self
    }

    pub fn is_critical(&self, critical_threshold: f64) -> bool {
        self.severity_score >= critical_threshold
    }
}

pub fn clamp_severity(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, MAX_SEVERITY)
}

/// Highest severity in the list, `None` when empty.
pub fn highest_severity(anomalies: &[Anomaly]) -> Option<f64> {
    anomalies
        .iter()
        .map(|a| a.severity_score)
        .fold(None, |acc, s| match acc {
            Some(max) if max >= s => Some(max),
            _ => Some(s),
        })
}

/// The anomaly whose signal the post-execution verifier re-measures.
pub fn primary_anomaly(anomalies: &[Anomaly]) -> Option<&Anomaly> {
    anomalies.iter().fold(None, |acc: Option<&Anomaly>, a| match acc {
        Some(best) if best.severity_score >= a.severity_score => Some(best),
        _ => Some(a),
    })
}
