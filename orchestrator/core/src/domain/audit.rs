// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Audit trail sink.
//!
//! `append` is synchronous and infallible from the caller's view: a sink
//! that cannot keep up drops records rather than stalling the remediation
//! loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::execution_log::ExecutionLogEntry;
use crate::domain::gate::{GateId, GateStatus};
use crate::domain::signals::IncidentId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditRecord {
    StepRecorded {
        incident_id: Option<IncidentId>,
        entry: ExecutionLogEntry,
    },
    GateOpened {
        incident_id: IncidentId,
        gate_id: GateId,
        opened_at: DateTime<Utc>,
    },
    GateDecided {
        gate_id: GateId,
        status: GateStatus,
        decided_by: Option<String>,
        decided_at: DateTime<Utc>,
    },
    GateTimedOut {
        gate_id: GateId,
        expired_at: DateTime<Utc>,
    },
    IncidentResolved {
        incident_id: IncidentId,
        improvement_percent: f64,
        resolved_at: DateTime<Utc>,
    },
}

impl AuditRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            AuditRecord::StepRecorded { .. } => "step_recorded",
            AuditRecord::GateOpened { .. } => "gate_opened",
            AuditRecord::GateDecided { .. } => "gate_decided",
            AuditRecord::GateTimedOut { .. } => "gate_timed_out",
            AuditRecord::IncidentResolved { .. } => "incident_resolved",
        }
    }
}

pub trait AuditSink: Send + Sync {
    fn append(&self, record: AuditRecord);
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn append(&self, _record: AuditRecord) {}
}
