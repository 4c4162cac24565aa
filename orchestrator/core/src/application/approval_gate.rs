// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Approval Gate - human-in-the-loop checkpoint
//!
//! [`ApprovalGate`] is used by the orchestrator: it persists a PENDING record
//! and blocks until the record turns terminal or its `expires_at` passes.
//! [`ApprovalService`] is the approval endpoint: it writes the decision
//! fields exactly once and wakes any waiter sharing its [`Notify`].
//!
//! The wait polls the repository so a decision written by another process
//! sharing the store is still observed; the notifier only shortens the delay
//! for in-process decisions. No task is spawned, so dropping the wait future
//! releases everything.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::domain::audit::{AuditRecord, AuditSink, NullAuditSink};
use crate::domain::config::GateConfig;
use crate::domain::gate::{
    ApprovalGateRecord, DecisionAck, GateDecision, GateError, GateId, GateOutcome, GatePhase,
    GateStatus,
};
use crate::domain::repository::GateRepository;
use crate::domain::signals::IncidentId;

pub struct ApprovalGate {
    repository: Arc<dyn GateRepository>,
    config: GateConfig,
    notify: Arc<Notify>,
    audit: Arc<dyn AuditSink>,
}

impl ApprovalGate {
    pub fn new(repository: Arc<dyn GateRepository>, config: GateConfig) -> Self {
        Self {
            repository,
            config,
            notify: Arc::new(Notify::new()),
            audit: Arc::new(NullAuditSink),
        }
    }

    /// Share the early-wakeup notifier of an [`ApprovalService`].
    pub fn with_notifier(mut self, notify: Arc<Notify>) -> Self {
        self.notify = notify;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Persist a PENDING record; at most one open gate per incident.
    pub async fn open(
        &self,
        incident_id: IncidentId,
        phase: GatePhase,
        payload: serde_json::Value,
    ) -> Result<ApprovalGateRecord, GateError> {
        let now = Utc::now();
        if let Some(existing) = self
            .repository
            .find_open_for_incident(incident_id, now)
            .await?
        {
            return Err(GateError::AlreadyPending {
                incident_id,
                gate_id: existing.id,
            });
        }

        let record = ApprovalGateRecord::pending(incident_id, phase, payload, now, self.config.timeout);
        self.repository.create(&record).await?;

        info!(
            gate_id = %record.id,
            incident_id = %incident_id,
            phase = phase.as_str(),
            timeout = ?self.config.timeout,
            "Approval gate opened"
        );
        self.audit.append(AuditRecord::GateOpened {
            incident_id,
            gate_id: record.id,
            opened_at: now,
        });
        Ok(record)
    }

    /// Block until the gate is decided or expires.
    pub async fn wait(&self, gate_id: GateId) -> Result<GateOutcome, GateError> {
        loop {
            // Registered before the read so a decision landing in between
            // still wakes this iteration.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let record = self
                .repository
                .find_by_id(gate_id)
                .await?
                .ok_or(GateError::NotFound(gate_id))?;

            match record.status {
                GateStatus::Approved => {
                    return Ok(GateOutcome::Approved {
                        approved_by: record.approved_by,
                    })
                }
                GateStatus::Rejected => {
                    return Ok(GateOutcome::Rejected {
                        reason: record.reason,
                    })
                }
                GateStatus::Pending => {}
            }

            let now = Utc::now();
            if record.is_expired(now) {
                warn!(gate_id = %gate_id, "Approval gate timed out");
                metrics::counter!("warden_gate_decisions_total", "decision" => "timed_out").increment(1);
                self.audit.append(AuditRecord::GateTimedOut {
                    gate_id,
                    expired_at: record.expires_at,
                });
                return Ok(GateOutcome::TimedOut);
            }

            let remaining = (record.expires_at - now).to_std().unwrap_or(Duration::ZERO);
            let pause = remaining.min(self.config.poll_interval);
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = &mut notified => {}
            }
        }
    }
}

/// The approval endpoint.
pub struct ApprovalService {
    repository: Arc<dyn GateRepository>,
    notify: Arc<Notify>,
    audit: Arc<dyn AuditSink>,
}

impl ApprovalService {
    pub fn new(repository: Arc<dyn GateRepository>) -> Self {
        Self {
            repository,
            notify: Arc::new(Notify::new()),
            audit: Arc::new(NullAuditSink),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn notifier(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    /// Record a decision on a PENDING gate.
    ///
    /// Unknown ids, already-decided gates and expired gates are typed errors;
    /// none of them change stored state, so repeating a call is harmless.
    pub async fn submit_decision(
        &self,
        gate_id: GateId,
        decision: GateDecision,
    ) -> Result<DecisionAck, GateError> {
        let now = Utc::now();
        let record = self
            .repository
            .find_by_id(gate_id)
            .await?
            .ok_or(GateError::NotFound(gate_id))?;

        if record.status.is_terminal() {
            return Err(GateError::AlreadyDecided {
                id: gate_id,
                status: record.status,
            });
        }
        if record.is_expired(now) {
            return Err(GateError::Expired(gate_id));
        }

        let status = decision.status();
        let updated = self
            .repository
            .record_decision(gate_id, status, decision.decided_by.clone(), decision.reason.clone(), now)
            .await?;

        let Some(updated) = updated else {
            // Lost a race with another writer or with the deadline.
            let current = self
                .repository
                .find_by_id(gate_id)
                .await?
                .ok_or(GateError::NotFound(gate_id))?;
            return Err(if current.status.is_terminal() {
                GateError::AlreadyDecided {
                    id: gate_id,
                    status: current.status,
                }
            } else {
                GateError::Expired(gate_id)
            });
        };

        self.notify.notify_waiters();

        let label = if decision.approved { "approved" } else { "rejected" };
        metrics::counter!("warden_gate_decisions_total", "decision" => label).increment(1);
        info!(
            gate_id = %gate_id,
            decision = label,
            decided_by = ?decision.decided_by,
            "Approval gate decided"
        );
        self.audit.append(AuditRecord::GateDecided {
            gate_id,
            status,
            decided_by: updated.approved_by.clone(),
            decided_at: now,
        });

        Ok(DecisionAck {
            gate_id,
            status: updated.status,
            decided_by: updated.approved_by,
            decided_at: updated.decided_at.unwrap_or(now),
        })
    }

    pub async fn list_pending(&self) -> Result<Vec<ApprovalGateRecord>, GateError> {
        Ok(self.repository.list_pending(Utc::now()).await?)
    }

    pub async fn get(&self, gate_id: GateId) -> Result<ApprovalGateRecord, GateError> {
        self.repository
            .find_by_id(gate_id)
            .await?
            .ok_or(GateError::NotFound(gate_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::InMemoryGateRepository;
    use std::time::Instant;

    fn setup(timeout: Duration, poll: Duration) -> (Arc<ApprovalService>, ApprovalGate) {
        let repo: Arc<dyn GateRepository> = Arc::new(InMemoryGateRepository::new());
        let service = Arc::new(ApprovalService::new(repo.clone()));
        let gate = ApprovalGate::new(
            repo,
            GateConfig {
                timeout,
                poll_interval: poll,
            },
        )
        .with_notifier(service.notifier());
        (service, gate)
    }

    fn approve() -> GateDecision {
        GateDecision {
            approved: true,
            decided_by: Some("oncall".into()),
            reason: None,
        }
    }

    #[tokio::test]
    async fn test_second_open_gate_for_incident_is_refused() {
        let (_, gate) = setup(Duration::from_secs(60), Duration::from_secs(1));
        let incident = IncidentId::new();
        gate.open(incident, GatePhase::ExecutionGate, serde_json::json!({}))
            .await
            .unwrap();
        let second = gate
            .open(incident, GatePhase::ExecutionGate, serde_json::json!({}))
            .await;
        assert!(matches!(second, Err(GateError::AlreadyPending { .. })));

        // A different incident is unaffected.
        assert!(gate
            .open(IncidentId::new(), GatePhase::ExecutionGate, serde_json::json!({}))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_decision_wakes_waiter_before_next_poll() {
        let (service, gate) = setup(Duration::from_secs(60), Duration::from_secs(30));
        let record = gate
            .open(IncidentId::new(), GatePhase::ExecutionGate, serde_json::json!({}))
            .await
            .unwrap();

        let id = record.id;
        let submitter = service.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            submitter.submit_decision(id, approve()).await.unwrap();
        });

        let started = Instant::now();
        let outcome = gate.wait(id).await.unwrap();
        assert!(outcome.is_approved());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_repeated_decision_is_typed_and_harmless() {
        let (service, gate) = setup(Duration::from_secs(60), Duration::from_secs(1));
        let record = gate
            .open(IncidentId::new(), GatePhase::ExecutionGate, serde_json::json!({}))
            .await
            .unwrap();

        let ack = service.submit_decision(record.id, approve()).await.unwrap();
        assert_eq!(ack.status, GateStatus::Approved);

        let again = service.submit_decision(record.id, approve()).await;
        assert!(matches!(
            again,
            Err(GateError::AlreadyDecided {
                status: GateStatus::Approved,
                ..
            })
        ));

        let flip = service
            .submit_decision(
                record.id,
                GateDecision {
                    approved: false,
                    decided_by: None,
                    reason: Some("changed my mind".into()),
                },
            )
            .await;
        assert!(flip.is_err());
        assert_eq!(service.get(record.id).await.unwrap().status, GateStatus::Approved);
    }

    #[tokio::test]
    async fn test_unknown_gate_is_not_found() {
        let (service, _) = setup(Duration::from_secs(60), Duration::from_secs(1));
        let result = service.submit_decision(GateId::new(), approve()).await;
        assert!(matches!(result, Err(GateError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_timeout_resolves_to_timed_out_and_blocks_late_decisions() {
        let (service, gate) = setup(Duration::from_millis(300), Duration::from_millis(100));
        let record = gate
            .open(IncidentId::new(), GatePhase::ExecutionGate, serde_json::json!({}))
            .await
            .unwrap();

        let started = Instant::now();
        let outcome = gate.wait(record.id).await.unwrap();
        assert_eq!(outcome, GateOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_millis(300 + 100 + 250));

        let late = service.submit_decision(record.id, approve()).await;
        assert!(matches!(late, Err(GateError::Expired(_))));
        assert!(service.list_pending().await.unwrap().is_empty());
    }
}
