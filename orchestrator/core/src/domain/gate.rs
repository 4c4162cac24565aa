// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Approval Gates
//!
//! ```text
//! NONE ──open──▶ PENDING ──decision──▶ APPROVED | REJECTED
//!                   │
//!                   └──now ≥ expires_at──▶ TIMED_OUT (treated as rejection)
//! ```
//!
//! The gate owner writes `id`, `created_at` and `expires_at`; the approval
//! endpoint writes `status`, `approved_by`, `reason` and `decided_at`, exactly
//! once. `TIMED_OUT` is never stored: a record still `PENDING` past its
//! `expires_at` is expired.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::repository::RepositoryError;
use crate::domain::signals::IncidentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GateId(pub Uuid);

impl GateId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GateId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for GateId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(GateId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatePhase {
    ExecutionGate,
    VerificationGate,
}

impl GatePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatePhase::ExecutionGate => "EXECUTION_GATE",
            GatePhase::VerificationGate => "VERIFICATION_GATE",
        }
    }
}

impl FromStr for GatePhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EXECUTION_GATE" => Ok(GatePhase::ExecutionGate),
            "VERIFICATION_GATE" => Ok(GatePhase::VerificationGate),
            other => Err(format!("unknown gate phase '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateStatus {
    Pending,
    Approved,
    Rejected,
}

impl GateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateStatus::Pending => "PENDING",
            GateStatus::Approved => "APPROVED",
            GateStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, GateStatus::Pending)
    }
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(GateStatus::Pending),
            "APPROVED" => Ok(GateStatus::Approved),
            "REJECTED" => Ok(GateStatus::Rejected),
            other => Err(format!("unknown gate status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalGateRecord {
    pub id: GateId,
    pub incident_id: IncidentId,
    pub phase: GatePhase,
    pub status: GateStatus,
    pub payload: serde_json::Value,
    pub approved_by: Option<String>,
    pub reason: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ApprovalGateRecord {
    pub fn pending(
        incident_id: IncidentId,
        phase: GatePhase,
        payload: serde_json::Value,
        created_at: DateTime<Utc>,
        timeout: std::time::Duration,
    ) -> Self {
        let ttl = chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::MAX);
        let expires_at = created_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            id: GateId::new(),
            incident_id,
            phase,
            status: GateStatus::Pending,
            payload,
            approved_by: None,
            reason: None,
            decided_at: None,
            created_at,
            expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == GateStatus::Pending && now >= self.expires_at
    }

    /// Pending and still within its deadline.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.status == GateStatus::Pending && now < self.expires_at
    }
}

/// How a blocking gate wait ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateOutcome {
    Approved { approved_by: Option<String> },
    Rejected { reason: Option<String> },
    TimedOut,
}

impl GateOutcome {
    pub fn is_approved(&self) -> bool {
        matches!(self, GateOutcome::Approved { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            GateOutcome::Approved { .. } => "approved",
            GateOutcome::Rejected { .. } => "rejected",
            GateOutcome::TimedOut => "timed_out",
        }
    }
}

/// Decision submitted through the approval endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    pub approved: bool,
    #[serde(default)]
    pub decided_by: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl GateDecision {
    pub fn status(&self) -> GateStatus {
        if self.approved {
            GateStatus::Approved
        } else {
            GateStatus::Rejected
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionAck {
    pub gate_id: GateId,
    pub status: GateStatus,
    pub decided_by: Option<String>,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("Gate {0} not found")]
    NotFound(GateId),

    #[error("Gate {id} already decided: {status}")]
    AlreadyDecided { id: GateId, status: GateStatus },

    #[error("Gate {0} expired before a decision was recorded")]
    Expired(GateId),

    #[error("Incident {incident_id} already has an open gate {gate_id}")]
    AlreadyPending {
        incident_id: IncidentId,
        gate_id: GateId,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_expiry_boundary() {
        let created = Utc::now();
        let record = ApprovalGateRecord::pending(
            IncidentId::new(),
            GatePhase::ExecutionGate,
            serde_json::json!({}),
            created,
            Duration::from_secs(2),
        );
        let deadline = created + chrono::Duration::seconds(2);
        assert!(record.is_open(deadline - chrono::Duration::milliseconds(1)));
        assert!(!record.is_open(deadline));
        assert!(record.is_expired(deadline));
    }

    #[test]
    fn test_decided_record_is_never_expired() {
        let created = Utc::now() - chrono::Duration::minutes(10);
        let mut record = ApprovalGateRecord::pending(
            IncidentId::new(),
            GatePhase::ExecutionGate,
            serde_json::json!({}),
            created,
            Duration::from_secs(1),
        );
        record.status = GateStatus::Approved;
        assert!(!record.is_expired(Utc::now()));
        assert!(!record.is_open(Utc::now()));
    }

    #[test]
    fn test_gate_id_round_trips_through_str() {
        let id = GateId::new();
        assert_eq!(id.to_string().parse::<GateId>().unwrap(), id);
        assert!("not-a-uuid".parse::<GateId>().is_err());
    }
}
