// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Execution Log
//!
//! One [`ExecutionLogEntry`] per attempted plan step. Entries are fully formed
//! before they are appended; the [`ExecutionLog`] offers no way to mutate or
//! reorder what it already holds.
//!
//! An entry is `SUCCESS` only when the rule engine allowed the action, the
//! verification agent approved it and the actuator reported success.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::action::ProposedAction;
use crate::domain::actuator::ActuationOutcome;
use crate::domain::policy::ValidationResult;
use crate::domain::verification::VerificationResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Skipped,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::Skipped => "SKIPPED",
        })
    }
}

/// Which stage stopped the chain at this entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    EvidenceMismatch,
    RuleViolation,
    VerificationRejected,
    ActuatorFailed,
    StepError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub step: u32,
    pub action: ProposedAction,
    pub validation: ValidationResult,
    pub verification: VerificationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub execution_status: ExecutionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted_by: Option<HaltReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actuation: Option<ActuationOutcome>,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionLogEntry {
    pub fn is_success(&self) -> bool {
        self.execution_status == ExecutionStatus::Success
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ExecutionLog {
    entries: Vec<ExecutionLogEntry>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: ExecutionLogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ExecutionLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn any_failed(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.execution_status == ExecutionStatus::Failed)
    }

    /// True when exactly `planned_steps` entries exist and all succeeded.
    pub fn completed(&self, planned_steps: usize) -> bool {
        planned_steps > 0
            && self.entries.len() == planned_steps
            && self.entries.iter().all(ExecutionLogEntry::is_success)
    }

    pub fn all_validated(&self) -> bool {
        self.entries
            .iter()
            .all(|e| e.validation.allowed && e.verification.approved)
    }

    pub fn last(&self) -> Option<&ExecutionLogEntry> {
        self.entries.last()
    }

    pub fn into_entries(self) -> Vec<ExecutionLogEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action::ActionType;

    fn entry(step: u32, status: ExecutionStatus) -> ExecutionLogEntry {
        ExecutionLogEntry {
            step,
            action: ProposedAction::new(ActionType::Restart, "api"),
            validation: ValidationResult::from_violations(vec![]),
            verification: VerificationResult::approved(),
            reasoning: None,
            execution_status: status,
            halted_by: None,
            actuation: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_completed_requires_every_planned_step() {
        let mut log = ExecutionLog::new();
        log.append(entry(1, ExecutionStatus::Success));
        assert!(log.completed(1));
        assert!(!log.completed(2));
        assert!(!ExecutionLog::new().completed(0));
    }

    #[test]
    fn test_failed_entry_never_completes() {
        let mut log = ExecutionLog::new();
        log.append(entry(1, ExecutionStatus::Success));
        log.append(entry(2, ExecutionStatus::Failed));
        assert!(log.any_failed());
        assert!(!log.completed(2));
    }

    #[test]
    fn test_entries_keep_append_order() {
        let mut log = ExecutionLog::new();
        for step in 1..=3 {
            log.append(entry(step, ExecutionStatus::Success));
        }
        let steps: Vec<u32> = log.entries().iter().map(|e| e.step).collect();
        assert_eq!(steps, vec![1, 2, 3]);
    }
}
