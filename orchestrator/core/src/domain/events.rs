// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Orchestrator lifecycle phase carried by every [`AgentEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentPhase {
    Idle,
    Detection,
    ProposalFix,
    ExecutionGate,
    Execution,
    VerificationGate,
    Verification,
    Closed,
    Error,
}

impl AgentPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentPhase::Idle => "IDLE",
            AgentPhase::Detection => "DETECTION",
            AgentPhase::ProposalFix => "PROPOSAL_FIX",
            AgentPhase::ExecutionGate => "EXECUTION_GATE",
            AgentPhase::Execution => "EXECUTION",
            AgentPhase::VerificationGate => "VERIFICATION_GATE",
            AgentPhase::Verification => "VERIFICATION",
            AgentPhase::Closed => "CLOSED",
            AgentPhase::Error => "ERROR",
        }
    }
}

impl fmt::Display for AgentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    InProgress,
    PendingHumanApproval,
    Success,
    Failed,
    Rejected,
    NoIssues,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::InProgress => "IN_PROGRESS",
            AgentStatus::PendingHumanApproval => "PENDING_HUMAN_APPROVAL",
            AgentStatus::Success => "SUCCESS",
            AgentStatus::Failed => "FAILED",
            AgentStatus::Rejected => "REJECTED",
            AgentStatus::NoIssues => "NO_ISSUES",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record of the orchestrator's event stream. Never mutated after
/// it has been yielded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    pub phase: AgentPhase,
    pub status: AgentStatus,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl AgentEvent {
    pub fn new(phase: AgentPhase, status: AgentStatus, content: impl Into<String>) -> Self {
        Self {
            phase,
            status,
            content: content.into(),
            metadata: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// `ERROR/FAILED`, `EXECUTION_GATE/REJECTED`, `IDLE/NO_ISSUES` and
    /// `CLOSED/*` end the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            (self.phase, self.status),
            (AgentPhase::Error, _)
                | (AgentPhase::Closed, _)
                | (AgentPhase::Idle, AgentStatus::NoIssues)
                | (AgentPhase::ExecutionGate, AgentStatus::Rejected)
        )
    }

    pub fn label(&self) -> String {
        format!("{}/{}", self.phase, self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = AgentEvent::new(AgentPhase::ExecutionGate, AgentStatus::PendingHumanApproval, "wait")
            .with_metadata(serde_json::json!({"gate_id": "g"}));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["phase"], "EXECUTION_GATE");
        assert_eq!(value["status"], "PENDING_HUMAN_APPROVAL");
        assert_eq!(value["metadata"]["gate_id"], "g");
    }

    #[test]
    fn test_terminal_events() {
        assert!(AgentEvent::new(AgentPhase::Idle, AgentStatus::NoIssues, "").is_terminal());
        assert!(AgentEvent::new(AgentPhase::ExecutionGate, AgentStatus::Rejected, "").is_terminal());
        assert!(!AgentEvent::new(AgentPhase::ExecutionGate, AgentStatus::PendingHumanApproval, "").is_terminal());
        assert!(!AgentEvent::new(AgentPhase::Verification, AgentStatus::Failed, "").is_terminal());
    }
}
