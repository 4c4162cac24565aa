// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Operational signals
//!
//! Read-only view of the evidence store: recent error-like events, active
//! incident records and point-in-time metric readings. The detector,
//! reflexors and post-execution verifier all read through [`SignalStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IncidentId(pub Uuid);

impl IncidentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for IncidentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IncidentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IncidentSeverity {
    #[serde(rename = "SEV0")]
    Sev0,
    #[serde(rename = "SEV1")]
    Sev1,
    #[serde(rename = "SEV2")]
    Sev2,
    #[serde(rename = "SEV3")]
    Sev3,
}

impl IncidentSeverity {
    /// High-severity incidents are the ones the detector turns into anomalies.
    pub fn is_high(&self) -> bool {
        matches!(self, IncidentSeverity::Sev0 | IncidentSeverity::Sev1)
    }

    /// Numeric value used as the `incident_severity` metric.
    pub fn metric_value(&self) -> f64 {
        match self {
            IncidentSeverity::Sev0 => 10.0,
            IncidentSeverity::Sev1 => 8.0,
            IncidentSeverity::Sev2 => 5.0,
            IncidentSeverity::Sev3 => 2.0,
        }
    }
}

impl fmt::Display for IncidentSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IncidentSeverity::Sev0 => "SEV0",
            IncidentSeverity::Sev1 => "SEV1",
            IncidentSeverity::Sev2 => "SEV2",
            IncidentSeverity::Sev3 => "SEV3",
        })
    }
}

impl FromStr for IncidentSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SEV0" => Ok(IncidentSeverity::Sev0),
            "SEV1" => Ok(IncidentSeverity::Sev1),
            "SEV2" => Ok(IncidentSeverity::Sev2),
            "SEV3" => Ok(IncidentSeverity::Sev3),
            other => Err(format!("unknown incident severity '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentStatus {
    Investigating,
    Identified,
    Resolved,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Investigating => "INVESTIGATING",
            IncidentStatus::Identified => "IDENTIFIED",
            IncidentStatus::Resolved => "RESOLVED",
        }
    }
}

impl FromStr for IncidentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INVESTIGATING" => Ok(IncidentStatus::Investigating),
            "IDENTIFIED" => Ok(IncidentStatus::Identified),
            "RESOLVED" => Ok(IncidentStatus::Resolved),
            other => Err(format!("unknown incident status '{}'", other)),
        }
    }
}

/// Who opened an incident record.
///
/// The detector only raises anomalies for externally declared incidents. An
/// incident the orchestrator opened is tracked through the signal that caused
/// it, so a later run re-detects that signal instead of its own bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentSource {
    #[default]
    External,
    Orchestrator,
}

impl IncidentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentSource::External => "EXTERNAL",
            IncidentSource::Orchestrator => "ORCHESTRATOR",
        }
    }
}

impl FromStr for IncidentSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EXTERNAL" => Ok(IncidentSource::External),
            "ORCHESTRATOR" => Ok(IncidentSource::Orchestrator),
            other => Err(format!("unknown incident source '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub id: IncidentId,
    pub title: String,
    pub severity: IncidentSeverity,
    pub status: IncidentStatus,
    pub impact: String,
    #[serde(default)]
    pub source: IncidentSource,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl IncidentRecord {
    pub fn open(title: impl Into<String>, severity: IncidentSeverity, impact: impl Into<String>) -> Self {
        Self {
            id: IncidentId::new(),
            title: title.into(),
            severity,
            status: IncidentStatus::Investigating,
            impact: impact.into(),
            source: IncidentSource::External,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    pub fn opened_by_orchestrator(mut self) -> Self {
        self.source = IncidentSource::Orchestrator;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status != IncidentStatus::Resolved
    }
}

/// A recent error-like operational event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub id: Uuid,
    pub source: String,
    pub action: String,
    pub severity: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl SignalEvent {
    pub fn error(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            action: "ERROR".to_string(),
            severity: "error".to_string(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("Signal store unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    Query(String),
}

#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Error-like events observed within `window` of now, newest first.
    async fn query_recent_events(&self, window: Duration) -> Result<Vec<SignalEvent>, SignalError>;

    /// Incidents that are not yet resolved, newest first.
    async fn query_active_incidents(&self) -> Result<Vec<IncidentRecord>, SignalError>;

    /// Current reading of a named metric; `None` when the metric is unknown.
    async fn read_metric(&self, name: &str) -> Result<Option<f64>, SignalError>;
}
