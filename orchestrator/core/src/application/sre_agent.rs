// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! SRE Agent - top-level remediation state machine
//!
//! ```text
//! IDLE -> DETECTION -> { IDLE(no anomalies) | PROPOSAL_FIX }
//!      -> EXECUTION_GATE(PENDING_HUMAN_APPROVAL) -> { REJECTED | EXECUTION }
//!      -> { ERROR | VERIFICATION_GATE -> VERIFICATION } -> { ERROR | CLOSED }
//! ```
//!
//! [`SreAgent::run`] returns a lazy stream of [`AgentEvent`]s for one
//! incident. All per-run state (evidence, execution log, incident id) lives
//! inside that stream; dropping it cancels the run at its current
//! suspension point.

use chrono::Utc;
use futures::stream::BoxStream;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::approval_gate::{ApprovalGate, ApprovalService};
use crate::application::cmdp::CmdpChain;
use crate::application::detector::AnomalyDetector;
use crate::application::executor::Executor;
use crate::application::planner::{PlanGenerator, PlanningContext};
use crate::application::post_verifier::PostExecutionVerifier;
use crate::application::reasoner::Reasoner;
use crate::application::retriever::EvidenceRetriever;
use crate::application::validation_engine::ValidationEngine;
use crate::application::verification_agent::VerificationAgent;
use crate::domain::actuator::Actuator;
use crate::domain::anomaly::{highest_severity, primary_anomaly, Anomaly};
use crate::domain::audit::{AuditRecord, AuditSink};
use crate::domain::config::{AgentConfig, SeverityLabel, WardenSpec};
use crate::domain::events::{AgentEvent, AgentPhase, AgentStatus};
use crate::domain::evidence::Reflexor;
use crate::domain::gate::{GateOutcome, GatePhase};
use crate::domain::llm::LLMProvider;
use crate::domain::policy::PolicyError;
use crate::domain::repository::{GateRepository, IncidentRepository};
use crate::domain::signals::{IncidentSeverity, SignalStore};

/// External collaborators the agent is wired against.
pub struct AgentDependencies {
    pub llm: Arc<dyn LLMProvider>,
    pub signals: Arc<dyn SignalStore>,
    pub incidents: Arc<dyn IncidentRepository>,
    pub gates: Arc<dyn GateRepository>,
    pub actuator: Arc<dyn Actuator>,
    pub audit: Arc<dyn AuditSink>,
    pub reflexors: Vec<Arc<dyn Reflexor>>,
    /// Approval endpoint whose decisions should wake gate waits early.
    pub approvals: Option<Arc<ApprovalService>>,
}

#[derive(Clone)]
pub struct SreAgent {
    detector: Arc<AnomalyDetector>,
    planner: Arc<PlanGenerator>,
    chain: Arc<CmdpChain>,
    gate: Arc<ApprovalGate>,
    post_verifier: Arc<PostExecutionVerifier>,
    incidents: Arc<dyn IncidentRepository>,
    signals: Arc<dyn SignalStore>,
    audit: Arc<dyn AuditSink>,
    config: AgentConfig,
    lookback: std::time::Duration,
}

impl SreAgent {
    pub fn build(spec: &WardenSpec, deps: AgentDependencies) -> Result<Self, PolicyError> {
        let reasoning = &spec.reasoning;
        let rules = Arc::new(ValidationEngine::new(spec.policy.clone())?);
        let retriever = Arc::new(EvidenceRetriever::new(deps.reflexors));

        let planner = Arc::new(PlanGenerator::new(
            deps.llm.clone(),
            reasoning.planner,
            reasoning.call_timeout,
            retriever.catalog(),
        ));
        let chain = Arc::new(CmdpChain::new(
            retriever,
            Arc::new(Reasoner::new(
                deps.llm.clone(),
                reasoning.reasoner,
                reasoning.call_timeout,
            )),
            rules,
            Arc::new(VerificationAgent::new(
                deps.llm,
                reasoning.verifier,
                reasoning.call_timeout,
            )),
            Arc::new(Executor::new(deps.actuator, spec.executor.timeout)),
            deps.audit.clone(),
            spec.agent.default_target.clone(),
        ));

        let mut gate = ApprovalGate::new(deps.gates, spec.gate.clone()).with_audit(deps.audit.clone());
        if let Some(approvals) = &deps.approvals {
            gate = gate.with_notifier(approvals.notifier());
        }

        Ok(Self {
            detector: Arc::new(AnomalyDetector::new(deps.signals.clone(), spec.detector.clone())),
            planner,
            chain,
            gate: Arc::new(gate),
            post_verifier: Arc::new(PostExecutionVerifier::new(
                deps.signals.clone(),
                spec.verifier.clone(),
                &spec.detector,
            )),
            incidents: deps.incidents,
            signals: deps.signals,
            audit: deps.audit,
            config: spec.agent.clone(),
            lookback: spec.detector.lookback,
        })
    }

    /// Run one remediation cycle for `scope`, yielding events as it goes.
    pub fn run(&self, scope: impl Into<String>) -> BoxStream<'static, AgentEvent> {
        let agent = self.clone();
        let scope = scope.into();
        let run_id = Uuid::new_v4();

        Box::pin(async_stream::stream! {
            info!(%run_id, scope = %scope, "Remediation run started");

            let anomalies = match agent.detector.detect(&scope).await {
                Ok(anomalies) => anomalies,
                Err(e) => {
                    yield agent.fail(run_id, e.to_string());
                    return;
                }
            };

            if anomalies.is_empty() {
                finish(run_id, "idle");
                yield AgentEvent::new(
                    AgentPhase::Idle,
                    AgentStatus::NoIssues,
                    "System healthy. No anomalies detected.",
                );
                return;
            }

            let highest = highest_severity(&anomalies).unwrap_or(0.0);
            let label = agent.severity_label(highest);
            yield AgentEvent::new(
                AgentPhase::Detection,
                AgentStatus::Success,
                format!(
                    "**Detected {} anomaly/anomalies**\n\n**Highest Severity:** {:.1}/10 ({})\n\n{}",
                    anomalies.len(),
                    highest,
                    label_str(label),
                    anomalies
                        .iter()
                        .map(|a| format!("- {}", a.description))
                        .collect::<Vec<_>>()
                        .join("\n")
                ),
            )
            .with_metadata(json!({
                "anomalies": anomalies,
                "highest_severity": highest,
                "severity_label": label,
            }));

            yield AgentEvent::new(
                AgentPhase::ProposalFix,
                AgentStatus::InProgress,
                "CMDP Planning: creating a remediation plan...",
            );
            let context = agent.planning_context(&anomalies).await;
            let plan = agent.planner.plan(&context).await;
            yield AgentEvent::new(
                AgentPhase::ProposalFix,
                AgentStatus::Success,
                format!("CMDP Plan Generated:\n\n{}\n\nReasoning: {}", plan.outline(), plan.reasoning),
            )
            .with_metadata(json!({ "plan": plan }));

            let incident = match agent.incidents.find_open().await {
                Ok(Some(incident)) => incident,
                Ok(None) => {
                    let severity = match label {
                        SeverityLabel::Critical => IncidentSeverity::Sev0,
                        SeverityLabel::High => IncidentSeverity::Sev1,
                    };
                    let title = anomalies
                        .first()
                        .map(|a| a.description.clone())
                        .unwrap_or_else(|| "Detected anomaly".to_string());
                    match agent.incidents.open(&title, severity, &scope).await {
                        Ok(incident) => incident,
                        Err(e) => {
                            yield agent.fail(run_id, e.to_string());
                            return;
                        }
                    }
                }
                Err(e) => {
                    yield agent.fail(run_id, e.to_string());
                    return;
                }
            };

            let gate_payload = json!({
                "anomalies": anomalies,
                "plan": plan,
                "highest_severity": highest,
                "severity_label": label,
            });
            let record = match agent.gate.open(incident.id, GatePhase::ExecutionGate, gate_payload).await {
                Ok(record) => record,
                Err(e) => {
                    yield agent.fail(run_id, e.to_string());
                    return;
                }
            };

            yield AgentEvent::new(
                AgentPhase::ExecutionGate,
                AgentStatus::PendingHumanApproval,
                format!(
                    "**Action Required (CMDP):** {} issue(s) detected.\n\n**Severity:** {} ({:.2}/10).\n\n**CMDP Plan:**\n{}\n\n**Reasoning:** {}\n\nWaiting for human approval to execute the plan...",
                    anomalies.len(),
                    label_str(label),
                    highest,
                    plan.outline(),
                    plan.reasoning
                ),
            )
            .with_metadata(json!({
                "gate_id": record.id,
                "incident_id": incident.id,
                "expires_at": record.expires_at,
            }));

            let outcome = match agent.gate.wait(record.id).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    yield agent.fail(run_id, e.to_string());
                    return;
                }
            };

            if !outcome.is_approved() {
                let content = match &outcome {
                    GateOutcome::TimedOut => {
                        "**Approval timed out.**\n\nAgent stopped. Manual intervention required.".to_string()
                    }
                    GateOutcome::Rejected { reason: Some(reason) } => format!(
                        "**Remediation rejected by human operator:** {}\n\nAgent stopped. Manual intervention required.",
                        reason
                    ),
                    _ => "**Remediation rejected by human operator.**\n\nAgent stopped. Manual intervention required.".to_string(),
                };
                finish(run_id, outcome.label());
                yield AgentEvent::new(AgentPhase::ExecutionGate, AgentStatus::Rejected, content)
                    .with_metadata(json!({ "gate_id": record.id, "outcome": outcome }));
                return;
            }

            yield AgentEvent::new(
                AgentPhase::Execution,
                AgentStatus::InProgress,
                "**Executing CMDP Chain:** running plan with validation and verification...",
            );

            let chain = agent.chain.run(&plan, Some(incident.id)).await;
            let executed_at = Utc::now();
            let log = chain.log;
            let completed = log.completed(plan.steps.len());
            yield AgentEvent::new(
                AgentPhase::Execution,
                if completed { AgentStatus::Success } else { AgentStatus::Failed },
                format!(
                    "**CMDP Execution Complete:**\n\n**Steps:** {}/{}\n**Validation:** {}\n**Execution:** {}",
                    log.len(),
                    plan.steps.len(),
                    if log.all_validated() { "All Approved" } else { "Some Rejected" },
                    if completed { "All Succeeded" } else { "Halted" },
                ),
            )
            .with_metadata(json!({
                "execution_log": log,
                "evidence_sources": chain.evidence.sources().collect::<Vec<_>>(),
            }));

            if !completed {
                finish(run_id, "error");
                yield AgentEvent::new(
                    AgentPhase::Error,
                    AgentStatus::Failed,
                    "**Remediation execution failed.**\n\nManual intervention required.",
                );
                return;
            }

            yield AgentEvent::new(
                AgentPhase::VerificationGate,
                AgentStatus::PendingHumanApproval,
                "**Verification Required:** execution completed. Check that metrics improved, the system is stable and no new errors appeared.",
            );

            yield AgentEvent::new(
                AgentPhase::Verification,
                AgentStatus::InProgress,
                "Verifying remediation by re-checking metrics...",
            );

            let Some(primary) = primary_anomaly(&anomalies) else {
                yield agent.fail(run_id, "no primary anomaly to verify".to_string());
                return;
            };
            let verification = agent.post_verifier.verify(primary, executed_at).await;
            yield AgentEvent::new(
                AgentPhase::Verification,
                if verification.verified { AgentStatus::Success } else { AgentStatus::Failed },
                format!(
                    "**Verification Result:**\n\n{}\n\n**Improvement:** {:+.1}%",
                    verification.message, verification.improvement_percent
                ),
            )
            .with_metadata(json!({ "verification": verification }));

            if !verification.verified {
                finish(run_id, "error");
                yield AgentEvent::new(
                    AgentPhase::Error,
                    AgentStatus::Failed,
                    "**Verification failed.**\n\nRemediation did not improve metrics. Manual intervention may be required.",
                );
                return;
            }

            let resolved_at = Utc::now();
            if let Err(e) = agent.incidents.resolve(incident.id, resolved_at).await {
                yield agent.fail(run_id, e.to_string());
                return;
            }
            agent.audit.append(AuditRecord::IncidentResolved {
                incident_id: incident.id,
                improvement_percent: verification.improvement_percent,
                resolved_at,
            });

            finish(run_id, "closed");
            yield AgentEvent::new(
                AgentPhase::Closed,
                AgentStatus::Success,
                format!(
                    "**Incident resolved.**\n\n- Detected {} anomaly/anomalies\n- Executed {} step(s)\n- Verification: {} improved by {:.1}%\n\nIncident {} closed.",
                    anomalies.len(),
                    log.len(),
                    verification.metric,
                    verification.improvement_percent,
                    incident.id
                ),
            )
            .with_metadata(json!({ "incident_id": incident.id }));
        })
    }

    fn severity_label(&self, highest: f64) -> SeverityLabel {
        match self.config.severity_threshold {
            Some(label) => label,
            None if highest >= self.config.critical_severity => SeverityLabel::Critical,
            None => SeverityLabel::High,
        }
    }

    async fn planning_context(&self, anomalies: &[Anomaly]) -> PlanningContext {
        let recent_events = match self.signals.query_recent_events(self.lookback).await {
            Ok(mut events) => {
                events.truncate(10);
                events
            }
            Err(e) => {
                warn!(error = %e, "Could not load recent events for planning context");
                Vec::new()
            }
        };

        let mut metrics = BTreeMap::new();
        for name in &self.config.metrics {
            if let Ok(Some(value)) = self.signals.read_metric(name).await {
                metrics.insert(name.clone(), value);
            }
        }

        PlanningContext {
            anomalies: anomalies.to_vec(),
            recent_events,
            metrics,
        }
    }

    fn fail(&self, run_id: Uuid, message: String) -> AgentEvent {
        warn!(%run_id, error = %message, "Remediation run failed");
        finish(run_id, "error");
        AgentEvent::new(AgentPhase::Error, AgentStatus::Failed, format!("**Error:** {}", message))
            .with_metadata(json!({ "error": message }))
    }
}

fn finish(run_id: Uuid, outcome: &'static str) {
    info!(%run_id, outcome, "Remediation run finished");
    metrics::counter!("warden_runs_total", "outcome" => outcome).increment(1);
}

fn label_str(label: SeverityLabel) -> &'static str {
    match label {
        SeverityLabel::Critical => "CRITICAL",
        SeverityLabel::High => "HIGH",
    }
}
