// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! CMDP step chain: Retrieve -> Reason -> Constrain -> Verify -> Execute.
//!
//! Steps run strictly in order. The first step that is not executed
//! successfully halts the chain; earlier steps are not rolled back.
//!
//! Decision matrix per step:
//!
//! | Reasoner | Rules | Verifier | Actuator | Status |
//! |----------|-------|----------|----------|--------|
//! | halt | - | - | - | SKIPPED, chain stops |
//! | proceed | denied | - | - | SKIPPED, chain stops |
//! | proceed | allowed | rejected | - | SKIPPED, chain stops |
//! | proceed | allowed | approved | failed | FAILED, chain stops |
//! | proceed | allowed | approved | ok | SUCCESS |

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::executor::Executor;
use crate::application::reasoner::Reasoner;
use crate::application::retriever::EvidenceRetriever;
use crate::application::validation_engine::ValidationEngine;
use crate::application::verification_agent::VerificationAgent;
use crate::domain::audit::{AuditRecord, AuditSink};
use crate::domain::evidence::EvidenceStore;
use crate::domain::execution_log::{ExecutionLog, ExecutionLogEntry, ExecutionStatus, HaltReason};
use crate::domain::plan::Plan;
use crate::domain::policy::ValidationResult;
use crate::domain::signals::IncidentId;
use crate::domain::verification::VerificationResult;

pub struct ChainOutcome {
    pub log: ExecutionLog,
    pub evidence: EvidenceStore,
}

pub struct CmdpChain {
    retriever: Arc<EvidenceRetriever>,
    reasoner: Arc<Reasoner>,
    rules: Arc<ValidationEngine>,
    verifier: Arc<VerificationAgent>,
    executor: Arc<Executor>,
    audit: Arc<dyn AuditSink>,
    default_target: String,
}

impl CmdpChain {
    pub fn new(
        retriever: Arc<EvidenceRetriever>,
        reasoner: Arc<Reasoner>,
        rules: Arc<ValidationEngine>,
        verifier: Arc<VerificationAgent>,
        executor: Arc<Executor>,
        audit: Arc<dyn AuditSink>,
        default_target: impl Into<String>,
    ) -> Self {
        Self {
            retriever,
            reasoner,
            rules,
            verifier,
            executor,
            audit,
            default_target: default_target.into(),
        }
    }

    pub async fn run(&self, plan: &Plan, incident_id: Option<IncidentId>) -> ChainOutcome {
        let mut log = ExecutionLog::new();
        let mut evidence = EvidenceStore::new();

        for step in &plan.steps {
            evidence.merge(self.retriever.retrieve(&step.required_evidence_sources).await);

            let action = step.action.resolve(&self.default_target, &step.description);
            let mut entry = ExecutionLogEntry {
                step: step.sequence_number,
                action: action.clone(),
                validation: ValidationResult::from_violations(vec![]),
                verification: VerificationResult::not_verified(),
                reasoning: None,
                execution_status: ExecutionStatus::Skipped,
                halted_by: None,
                actuation: None,
                timestamp: Utc::now(),
            };

            let verdict = self.reasoner.judge(step, &evidence, &action).await;
            entry.reasoning = Some(verdict.reasoning.clone());
            if !verdict.proceed {
                warn!(step = step.sequence_number, "Evidence does not support the action, halting");
                entry.validation = ValidationResult::denied("Evidence mismatch");
                entry.verification = VerificationResult::rejected(verdict.reasoning);
                entry.halted_by = Some(HaltReason::EvidenceMismatch);
                self.record(&mut log, entry, incident_id);
                break;
            }

            entry.validation = self.rules.validate(&action);
            if !entry.validation.allowed {
                warn!(
                    step = step.sequence_number,
                    violations = ?entry.validation.violations,
                    "Rule-based validation failed, halting"
                );
                entry.halted_by = Some(HaltReason::RuleViolation);
                self.record(&mut log, entry, incident_id);
                break;
            }

            entry.verification = self.verifier.verify(&evidence, &action, self.rules.policy()).await;
            if !entry.verification.approved {
                warn!(
                    step = step.sequence_number,
                    reason = ?entry.verification.reason,
                    "Verification agent rejected action, halting"
                );
                entry.halted_by = Some(HaltReason::VerificationRejected);
                self.record(&mut log, entry, incident_id);
                break;
            }

            info!(step = step.sequence_number, action = %action.summary(), "Step approved by rules and verifier");
            let outcome = self.executor.execute(&action).await;
            let succeeded = outcome.success;
            entry.execution_status = if succeeded {
                ExecutionStatus::Success
            } else {
                entry.halted_by = Some(HaltReason::ActuatorFailed);
                ExecutionStatus::Failed
            };
            entry.actuation = Some(outcome);
            entry.timestamp = Utc::now();
            self.record(&mut log, entry, incident_id);

            if !succeeded {
                break;
            }
        }

        ChainOutcome { log, evidence }
    }

    fn record(&self, log: &mut ExecutionLog, entry: ExecutionLogEntry, incident_id: Option<IncidentId>) {
        metrics::counter!("warden_steps_total", "status" => entry.execution_status.to_string()).increment(1);
        self.audit.append(AuditRecord::StepRecorded {
            incident_id,
            entry: entry.clone(),
        });
        log.append(entry);
    }
}
