// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end runs of the remediation loop against in-memory stores.

mod common;

use common::*;
use futures::StreamExt;
use std::time::{Duration, Instant};

use warden_core::domain::audit::AuditRecord;
use warden_core::domain::events::{AgentPhase, AgentStatus};
use warden_core::domain::execution_log::HaltReason;
use warden_core::domain::gate::{GateDecision, GateId};
use warden_core::domain::signals::{IncidentRecord, IncidentSeverity, IncidentStatus, SignalEvent};

fn halt_reasons(records: &[AuditRecord]) -> Vec<Option<HaltReason>> {
    records
        .iter()
        .filter_map(|r| match r {
            AuditRecord::StepRecorded { entry, .. } => Some(entry.halted_by),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_healthy_system_yields_single_idle_event() {
    let mut spec = harness_config();
    spec.detector.synthetic_fallback = false;
    let harness = Harness::new(&spec, ScriptedLlm::cooperative(&restart_plan("checkout-api")));

    let events = harness.run("checkout").await;

    assert_eq!(labels(&events), vec![(AgentPhase::Idle, AgentStatus::NoIssues)]);
    assert_eq!(events[0].content, "System healthy. No anomalies detected.");
    assert_eq!(harness.llm.prompts_containing(PLANNER), 0);
    assert!(harness.actuator.calls().is_empty());
}

#[tokio::test]
async fn test_approved_remediation_closes_incident() {
    let mut harness = Harness::new(&harness_config(), ScriptedLlm::cooperative(&restart_plan("checkout-api")));
    harness.store.set_metric(PROBE_METRIC, 2450.0);
    let approver = decide_next(harness.warden.approvals.clone(), true, None);

    let events = harness.run("checkout").await;

    assert_eq!(
        labels(&events),
        vec![
            (AgentPhase::Detection, AgentStatus::Success),
            (AgentPhase::ProposalFix, AgentStatus::InProgress),
            (AgentPhase::ProposalFix, AgentStatus::Success),
            (AgentPhase::ExecutionGate, AgentStatus::PendingHumanApproval),
            (AgentPhase::Execution, AgentStatus::InProgress),
            (AgentPhase::Execution, AgentStatus::Success),
            (AgentPhase::VerificationGate, AgentStatus::PendingHumanApproval),
            (AgentPhase::Verification, AgentStatus::InProgress),
            (AgentPhase::Verification, AgentStatus::Success),
            (AgentPhase::Closed, AgentStatus::Success),
        ]
    );
    assert!(approver.await.unwrap().is_some());

    let detection = &events[0].metadata;
    assert_eq!(detection["highest_severity"], 8.5);
    assert_eq!(detection["severity_label"], "CRITICAL");

    let verification = &events[8].metadata["verification"];
    assert_eq!(verification["before"], 2450.0);
    assert_eq!(verification["after"], 98.0);
    assert!(verification["improvement_percent"].as_f64().unwrap() > 95.0);

    let calls = harness.actuator.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].target, "checkout-api");

    let incidents = harness.store.incidents();
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].severity, IncidentSeverity::Sev0);
    assert_eq!(incidents[0].status, IncidentStatus::Resolved);

    let audit = harness.drain_audit();
    assert!(audit.iter().any(|r| matches!(r, AuditRecord::GateDecided { .. })));
    assert!(audit.iter().any(|r| matches!(r, AuditRecord::IncidentResolved { .. })));
}

#[tokio::test]
async fn test_gate_is_announced_once_before_any_actuation() {
    let harness = Harness::new(&harness_config(), ScriptedLlm::cooperative(&restart_plan("checkout-api")));
    harness.store.set_metric(PROBE_METRIC, 2450.0);

    let mut stream = harness.warden.agent.run("checkout");
    let mut gate_events = 0;
    let mut phases = Vec::new();
    while let Some(event) = stream.next().await {
        phases.push(event.phase);
        if event.phase == AgentPhase::ExecutionGate {
            gate_events += 1;
            assert!(harness.actuator.calls().is_empty());
            let gate_id: GateId = event.metadata["gate_id"].as_str().unwrap().parse().unwrap();
            harness
                .warden
                .approvals
                .submit_decision(
                    gate_id,
                    GateDecision {
                        approved: true,
                        decided_by: Some("oncall".into()),
                        reason: None,
                    },
                )
                .await
                .unwrap();
        }
    }

    assert_eq!(gate_events, 1);
    let gate_at = phases.iter().position(|p| *p == AgentPhase::ExecutionGate).unwrap();
    let execution_at = phases.iter().position(|p| *p == AgentPhase::Execution).unwrap();
    assert!(gate_at < execution_at);
}

#[tokio::test]
async fn test_rejection_stops_before_execution() {
    let harness = Harness::new(&harness_config(), ScriptedLlm::cooperative(&restart_plan("checkout-api")));
    harness.store.set_metric(PROBE_METRIC, 2450.0);
    let approver = decide_next(harness.warden.approvals.clone(), false, Some("change freeze"));

    let events = harness.run("checkout").await;
    approver.await.unwrap();

    let last = events.last().unwrap();
    assert_eq!((last.phase, last.status), (AgentPhase::ExecutionGate, AgentStatus::Rejected));
    assert!(last.content.contains("change freeze"));
    assert!(events.iter().all(|e| e.phase != AgentPhase::Execution));
    assert!(harness.actuator.calls().is_empty());
    assert!(harness.store.incidents()[0].is_active());
}

#[tokio::test]
async fn test_gate_timeout_ends_run_on_schedule() {
    let mut spec = harness_config();
    spec.gate.timeout = Duration::from_secs(2);
    spec.gate.poll_interval = Duration::from_millis(500);
    let mut harness = Harness::new(&spec, ScriptedLlm::cooperative(&restart_plan("checkout-api")));
    harness.store.set_metric(PROBE_METRIC, 2450.0);

    let mut stream = harness.warden.agent.run("checkout");
    let mut gate_opened = None;
    let mut last = None;
    while let Some(event) = stream.next().await {
        if event.status == AgentStatus::PendingHumanApproval {
            gate_opened = Some(Instant::now());
        }
        last = Some(event);
    }

    let waited = gate_opened.unwrap().elapsed();
    assert!(waited <= Duration::from_millis(2500), "waited {:?}", waited);
    let last = last.unwrap();
    assert_eq!((last.phase, last.status), (AgentPhase::ExecutionGate, AgentStatus::Rejected));
    assert!(last.content.contains("timed out"));
    assert_eq!(last.metadata["outcome"]["outcome"], "TIMED_OUT");
    assert!(harness.actuator.calls().is_empty());
    assert!(harness
        .drain_audit()
        .iter()
        .any(|r| matches!(r, AuditRecord::GateTimedOut { .. })));
}

#[tokio::test]
async fn test_destructive_action_on_production_is_denied() {
    let plan = serde_json::json!({
        "steps": [{
            "step": 1,
            "action": { "type": "ROLLBACK", "target": "prod-orders-db" },
            "reflexors": ["check-metrics"],
            "description": "Roll back the last migration"
        }],
        "reasoning": "Migration correlates with the latency spike"
    })
    .to_string();
    let mut harness = Harness::new(&harness_config(), ScriptedLlm::cooperative(&plan));
    harness.store.set_metric(PROBE_METRIC, 2450.0);
    let approver = decide_next(harness.warden.approvals.clone(), true, None);

    let events = harness.run("orders").await;
    approver.await.unwrap();

    let tail: Vec<_> = labels(&events).into_iter().rev().take(2).collect();
    assert_eq!(
        tail,
        vec![
            (AgentPhase::Error, AgentStatus::Failed),
            (AgentPhase::Execution, AgentStatus::Failed),
        ]
    );
    assert!(harness.actuator.calls().is_empty());
    assert_eq!(harness.llm.prompts_containing(VERIFIER), 0);
    assert_eq!(halt_reasons(&harness.drain_audit()), vec![Some(HaltReason::RuleViolation)]);
}

#[tokio::test]
async fn test_actuator_failure_never_closes() {
    let mut harness = Harness::with_actuator(
        &harness_config(),
        ScriptedLlm::cooperative(&restart_plan("checkout-api")),
        98.0,
        true,
    );
    harness.store.set_metric(PROBE_METRIC, 2450.0);
    let approver = decide_next(harness.warden.approvals.clone(), true, None);

    let events = harness.run("checkout").await;
    approver.await.unwrap();

    assert!(events.iter().all(|e| e.phase != AgentPhase::Closed));
    let last = events.last().unwrap();
    assert_eq!((last.phase, last.status), (AgentPhase::Error, AgentStatus::Failed));
    assert_eq!(halt_reasons(&harness.drain_audit()), vec![Some(HaltReason::ActuatorFailed)]);
    assert!(harness.store.incidents()[0].is_active());
}

/// Unstructured replies: the reasoner proceeds, the verifier rejects.
#[tokio::test]
async fn test_unparsable_replies_proceed_at_reasoner_but_reject_at_verifier() {
    let llm = ScriptedLlm::new()
        .on(PLANNER, restart_plan("checkout-api"))
        .on(REASONER, "The metrics clearly point at the service.")
        .on(VERIFIER, "Looks fine to me overall.");
    let mut harness = Harness::new(&harness_config(), llm);
    harness.store.set_metric(PROBE_METRIC, 2450.0);
    let approver = decide_next(harness.warden.approvals.clone(), true, None);

    let events = harness.run("checkout").await;
    approver.await.unwrap();

    assert_eq!(harness.llm.prompts_containing(VERIFIER), 1);
    assert_eq!(
        halt_reasons(&harness.drain_audit()),
        vec![Some(HaltReason::VerificationRejected)]
    );
    assert!(harness.actuator.calls().is_empty());
    assert_eq!(events.last().unwrap().phase, AgentPhase::Error);
}

#[tokio::test]
async fn test_reasoner_outage_halts_plan() {
    let llm = ScriptedLlm::new()
        .on(PLANNER, restart_plan("checkout-api"))
        .failing_on(REASONER)
        .on(VERIFIER, r#"{"approved": true}"#);
    let mut harness = Harness::new(&harness_config(), llm);
    harness.store.set_metric(PROBE_METRIC, 2450.0);
    let approver = decide_next(harness.warden.approvals.clone(), true, None);

    harness.run("checkout").await;
    approver.await.unwrap();

    assert_eq!(halt_reasons(&harness.drain_audit()), vec![Some(HaltReason::EvidenceMismatch)]);
    assert_eq!(harness.llm.prompts_containing(VERIFIER), 0);
}

#[tokio::test]
async fn test_planner_outage_falls_back_to_default_plan() {
    let llm = ScriptedLlm::new().failing_on(PLANNER);
    let harness = Harness::new(&harness_config(), llm);
    harness.store.set_metric(PROBE_METRIC, 2450.0);
    let approver = decide_next(harness.warden.approvals.clone(), false, None);

    let events = harness.run("checkout").await;
    approver.await.unwrap();

    let proposal = events
        .iter()
        .find(|e| e.phase == AgentPhase::ProposalFix && e.status == AgentStatus::Success)
        .unwrap();
    let plan = &proposal.metadata["plan"];
    assert_eq!(plan["fallback"], true);
    assert_eq!(plan["steps"].as_array().unwrap().len(), 1);
    assert_eq!(plan["steps"][0]["action"], "RESTART");
}

#[tokio::test]
async fn test_unchanged_metric_fails_verification() {
    let harness = Harness::with_actuator(
        &harness_config(),
        ScriptedLlm::cooperative(&restart_plan("checkout-api")),
        2450.0,
        false,
    );
    harness.store.set_metric(PROBE_METRIC, 2450.0);
    let approver = decide_next(harness.warden.approvals.clone(), true, None);

    let events = harness.run("checkout").await;
    approver.await.unwrap();

    let tail: Vec<_> = labels(&events).into_iter().rev().take(2).collect();
    assert_eq!(
        tail,
        vec![
            (AgentPhase::Error, AgentStatus::Failed),
            (AgentPhase::Verification, AgentStatus::Failed),
        ]
    );
    assert_eq!(harness.actuator.calls().len(), 1);
    assert!(harness.store.incidents()[0].is_active());
}

#[tokio::test]
async fn test_error_burst_is_detected_and_reuses_open_incident() {
    let mut spec = harness_config();
    spec.detector.synthetic_fallback = false;
    let harness = Harness::new(&spec, ScriptedLlm::cooperative(&restart_plan("checkout-api")));
    error_burst(&harness.store, "checkout-api", 15);
    let approver = decide_next(harness.warden.approvals.clone(), false, None);

    let events = harness.run("checkout").await;
    approver.await.unwrap();

    assert_eq!(events[0].phase, AgentPhase::Detection);
    assert_eq!(events[0].metadata["severity_label"], "HIGH");
    let incidents = harness.store.incidents();
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].severity, IncidentSeverity::Sev1);

    let approver = decide_next(harness.warden.approvals.clone(), false, None);
    harness.run("checkout").await;
    approver.await.unwrap();
    assert_eq!(harness.store.incidents().len(), 1);
}

#[tokio::test]
async fn test_signal_store_outage_yields_single_error() {
    let harness = Harness::new(&harness_config(), ScriptedLlm::cooperative(&restart_plan("checkout-api")));
    harness.store.set_unavailable(true);

    let events = harness.run("checkout").await;

    assert_eq!(labels(&events), vec![(AgentPhase::Error, AgentStatus::Failed)]);
    assert!(events[0].metadata["error"].is_string());
}

fn verification_of(events: &[warden_core::domain::events::AgentEvent]) -> &serde_json::Value {
    &events
        .iter()
        .find(|e| e.phase == AgentPhase::Verification && e.status != AgentStatus::InProgress)
        .expect("verification result")
        .metadata["verification"]
}

#[tokio::test]
async fn test_error_burst_closes_once_errors_stop() {
    let mut spec = harness_config();
    spec.detector.synthetic_fallback = false;
    let harness = Harness::new(&spec, ScriptedLlm::cooperative(&restart_plan("checkout-api")));
    error_burst(&harness.store, "checkout-api", 15);
    let approver = decide_next(harness.warden.approvals.clone(), true, None);

    let events = harness.run("checkout").await;
    assert!(approver.await.unwrap().is_some());

    assert_eq!(events.last().map(|e| (e.phase, e.status)), Some((AgentPhase::Closed, AgentStatus::Success)));
    let verification = verification_of(&events);
    assert_eq!(verification["metric"], "error_rate");
    assert_eq!(verification["before"], 15.0);
    assert_eq!(verification["after"], 0.0);
    assert_eq!(verification["improvement_percent"], 100.0);

    let incidents = harness.store.incidents();
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].status, IncidentStatus::Resolved);
}

#[tokio::test]
async fn test_error_burst_that_continues_fails_verification() {
    let mut spec = harness_config();
    spec.detector.synthetic_fallback = false;
    spec.verifier.settle_delay = Duration::from_millis(300);
    let harness = Harness::new(&spec, ScriptedLlm::cooperative(&restart_plan("checkout-api")));
    error_burst(&harness.store, "checkout-api", 15);
    // The restart does not help: errors keep arriving while the verifier settles.
    harness.actuator.on_execute(|store| {
        let store = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            store.push_event(SignalEvent::error("checkout-api", "upstream timeout"));
        });
    });
    let approver = decide_next(harness.warden.approvals.clone(), true, None);

    let events = harness.run("checkout").await;
    approver.await.unwrap();

    assert_eq!(events.last().map(|e| (e.phase, e.status)), Some((AgentPhase::Error, AgentStatus::Failed)));
    assert!(verification_of(&events)["after"].as_f64().unwrap() >= 15.0);
    assert!(harness.store.incidents()[0].is_active());
}

#[tokio::test]
async fn test_rejected_run_then_approved_run_closes_the_same_incident() {
    let mut spec = harness_config();
    spec.detector.synthetic_fallback = false;
    let harness = Harness::new(&spec, ScriptedLlm::cooperative(&restart_plan("checkout-api")));
    error_burst(&harness.store, "checkout-api", 15);

    let approver = decide_next(harness.warden.approvals.clone(), false, Some("wait for the deploy"));
    let first = harness.run("checkout").await;
    approver.await.unwrap();
    assert_eq!(first.last().map(|e| e.status), Some(AgentStatus::Rejected));
    assert_eq!(harness.store.incidents().len(), 1);

    let approver = decide_next(harness.warden.approvals.clone(), true, None);
    let second = harness.run("checkout").await;
    assert!(approver.await.unwrap().is_some());

    let anomalies = second[0].metadata["anomalies"].as_array().unwrap();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0]["metric"], "error_rate");
    assert_eq!(second[0].metadata["severity_label"], "HIGH");
    assert_eq!(second.last().map(|e| e.phase), Some(AgentPhase::Closed));

    let incidents = harness.store.incidents();
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].status, IncidentStatus::Resolved);

    // Once the burst ages out, the resolved incident does not bring the run back.
    harness.store.clear_events();
    let third = harness.run("checkout").await;
    assert_eq!(labels(&third), vec![(AgentPhase::Idle, AgentStatus::NoIssues)]);
    assert_eq!(harness.store.incidents().len(), 1);
}

#[tokio::test]
async fn test_declared_incident_closes_after_severity_drops() {
    let mut spec = harness_config();
    spec.detector.synthetic_fallback = false;
    let harness = Harness::new(&spec, ScriptedLlm::cooperative(&restart_plan("checkout-api")));
    let declared = IncidentRecord::open("Primary database unreachable", IncidentSeverity::Sev0, "checkout");
    let declared_id = declared.id;
    harness.store.push_incident(declared);
    harness.actuator.on_execute(move |store| {
        store.set_incident_severity(declared_id, IncidentSeverity::Sev2);
    });
    let approver = decide_next(harness.warden.approvals.clone(), true, None);

    let events = harness.run("checkout").await;
    assert!(approver.await.unwrap().is_some());

    assert_eq!(events[0].metadata["severity_label"], "CRITICAL");
    assert_eq!(events.last().map(|e| e.phase), Some(AgentPhase::Closed));
    let verification = verification_of(&events);
    assert_eq!(verification["metric"], "incident_severity");
    assert_eq!(verification["before"], 10.0);
    assert_eq!(verification["after"], 5.0);

    let incidents = harness.store.incidents();
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].id, declared_id);
    assert_eq!(incidents[0].status, IncidentStatus::Resolved);
}
