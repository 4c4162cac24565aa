// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared fixtures: a prompt-matching LLM, an actuator that moves the probe
//! metric, and a fully wired in-memory `Warden`.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use warden_core::application::repository_factory::Stores;
use warden_core::application::{ApprovalService, Warden};
use warden_core::domain::action::ProposedAction;
use warden_core::domain::actuator::{ActuationOutcome, Actuator, ActuatorError};
use warden_core::domain::audit::AuditRecord;
use warden_core::domain::config::WardenSpec;
use warden_core::domain::events::{AgentEvent, AgentPhase, AgentStatus};
use warden_core::domain::gate::{DecisionAck, GateDecision};
use warden_core::domain::llm::{GenerationOptions, GenerationResponse, LLMError, LLMProvider};
use warden_core::domain::signals::SignalEvent;
use warden_core::infrastructure::audit::ChannelAuditSink;
use warden_core::infrastructure::repositories::InMemorySignalStore;

pub const PLANNER: &str = "Create a plan to resolve";
pub const REASONER: &str = "Does it support the proposed action?";
pub const VERIFIER: &str = "independent Verification Agent";

pub const PROBE_METRIC: &str = "database_query_latency_p99";

enum Reply {
    Text(String),
    Fail,
}

/// Answers each prompt with the first rule whose marker it contains.
#[derive(Default)]
pub struct ScriptedLlm {
    rules: Vec<(&'static str, Reply)>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, marker: &'static str, text: impl Into<String>) -> Self {
        self.rules.push((marker, Reply::Text(text.into())));
        self
    }

    pub fn failing_on(mut self, marker: &'static str) -> Self {
        self.rules.push((marker, Reply::Fail));
        self
    }

    /// Planner returns `plan`; reasoner and verifier both agree.
    pub fn cooperative(plan: &str) -> Self {
        Self::new()
            .on(PLANNER, plan)
            .on(REASONER, r#"{"reasoning": "evidence supports the action", "proceed": true}"#)
            .on(VERIFIER, r#"{"approved": true}"#)
    }

    pub fn prompts_containing(&self, marker: &str) -> usize {
        self.prompts.lock().iter().filter(|p| p.contains(marker)).count()
    }
}

#[async_trait]
impl LLMProvider for ScriptedLlm {
    async fn generate(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError> {
        self.prompts.lock().push(prompt.to_string());
        match self.rules.iter().find(|(marker, _)| prompt.contains(marker)) {
            Some((_, Reply::Text(text))) => Ok(GenerationResponse::text_only("scripted", "test", text.clone())),
            Some((_, Reply::Fail)) => Err(LLMError::Network("connection refused".into())),
            None => Err(LLMError::Provider("no scripted reply".into())),
        }
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        Ok(())
    }
}

type Effect = Box<dyn Fn(&InMemorySignalStore) + Send + Sync>;

/// Records every action and writes `after` to the probe metric, the way a
/// successful remediation would bring latency back down.
pub struct ScriptedActuator {
    store: InMemorySignalStore,
    after: f64,
    fail: bool,
    calls: Mutex<Vec<ProposedAction>>,
    effects: Mutex<Vec<Effect>>,
}

impl ScriptedActuator {
    pub fn calls(&self) -> Vec<ProposedAction> {
        self.calls.lock().clone()
    }

    /// Extra change applied to the store on every successful action.
    pub fn on_execute(&self, effect: impl Fn(&InMemorySignalStore) + Send + Sync + 'static) {
        self.effects.lock().push(Box::new(effect));
    }
}

#[async_trait]
impl Actuator for ScriptedActuator {
    async fn execute(&self, action: &ProposedAction) -> Result<ActuationOutcome, ActuatorError> {
        self.calls.lock().push(action.clone());
        if self.fail {
            return Ok(ActuationOutcome::failed("deployment not found", 1));
        }
        self.store.set_metric(PROBE_METRIC, self.after);
        for effect in self.effects.lock().iter() {
            effect(&self.store);
        }
        Ok(ActuationOutcome::succeeded(format!("applied {}", action.summary())))
    }
}

pub struct Harness {
    pub warden: Warden,
    pub store: InMemorySignalStore,
    pub llm: Arc<ScriptedLlm>,
    pub actuator: Arc<ScriptedActuator>,
    pub audit: mpsc::Receiver<AuditRecord>,
}

impl Harness {
    pub fn new(spec: &WardenSpec, llm: ScriptedLlm) -> Self {
        Self::with_actuator(spec, llm, 98.0, false)
    }

    pub fn with_actuator(spec: &WardenSpec, llm: ScriptedLlm, after: f64, fail: bool) -> Self {
        let stores = Stores::in_memory();
        let store = stores.memory.clone().expect("memory backend");
        let llm = Arc::new(llm);
        let actuator = Arc::new(ScriptedActuator {
            store: store.clone(),
            after,
            fail,
            calls: Mutex::new(Vec::new()),
            effects: Mutex::new(Vec::new()),
        });
        let (sink, audit) = ChannelAuditSink::new(256);
        let warden = Warden::assemble(spec, stores, llm.clone(), actuator.clone(), Arc::new(sink))
            .expect("valid policy");
        Self {
            warden,
            store,
            llm,
            actuator,
            audit,
        }
    }

    /// Drive one run to completion.
    pub async fn run(&self, scope: &str) -> Vec<AgentEvent> {
        tokio::time::timeout(
            Duration::from_secs(20),
            self.warden.agent.run(scope).collect::<Vec<_>>(),
        )
        .await
        .expect("run finished")
    }

    pub fn drain_audit(&mut self) -> Vec<AuditRecord> {
        let mut records = Vec::new();
        while let Ok(record) = self.audit.try_recv() {
            records.push(record);
        }
        records
    }
}

/// Fast gates, diagnostic probe on, and a non-production default target.
pub fn harness_config() -> WardenSpec {
    let mut spec = WardenSpec::default();
    spec.gate.timeout = Duration::from_secs(10);
    spec.gate.poll_interval = Duration::from_millis(50);
    spec.detector.synthetic_fallback = true;
    spec.detector.probe_metric = PROBE_METRIC.to_string();
    spec.agent.default_target = "checkout-api".to_string();
    spec.reasoning.call_timeout = Duration::from_secs(5);
    spec
}

pub fn restart_plan(target: &str) -> String {
    serde_json::json!({
        "steps": [{
            "step": 1,
            "action": { "type": "RESTART", "target": target },
            "reflexors": ["check-metrics", "fetch-logs"],
            "description": "Restart the service after checking metrics"
        }],
        "reasoning": "Latency spike after the last deploy"
    })
    .to_string()
}

/// Decide the first gate that shows up as pending.
pub fn decide_next(
    approvals: Arc<ApprovalService>,
    approved: bool,
    reason: Option<&str>,
) -> JoinHandle<Option<DecisionAck>> {
    let reason = reason.map(str::to_string);
    tokio::spawn(async move {
        for _ in 0..500 {
            let pending = approvals.list_pending().await.ok()?;
            if let Some(gate) = pending.first() {
                let decision = GateDecision {
                    approved,
                    decided_by: Some("oncall".to_string()),
                    reason: reason.clone(),
                };
                return approvals.submit_decision(gate.id, decision).await.ok();
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        None
    })
}

/// Push `count` fresh error events for `source`.
pub fn error_burst(store: &InMemorySignalStore, source: &str, count: usize) {
    for i in 0..count {
        store.push_event(SignalEvent::error(source, format!("upstream timeout {}", i)));
    }
}

pub fn labels(events: &[AgentEvent]) -> Vec<(AgentPhase, AgentStatus)> {
    events.iter().map(|e| (e.phase, e.status)).collect()
}
