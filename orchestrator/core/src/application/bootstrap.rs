// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Process wiring: one [`Warden`] per orchestrator process.

use anyhow::Context;
use std::sync::Arc;

use crate::application::approval_gate::ApprovalService;
use crate::application::repository_factory::{create_stores, Stores};
use crate::application::sre_agent::{AgentDependencies, SreAgent};
use crate::domain::actuator::Actuator;
use crate::domain::audit::AuditSink;
use crate::domain::config::{WardenConfig, WardenSpec};
use crate::domain::llm::LLMProvider;
use crate::domain::policy::PolicyError;
use crate::infrastructure::actuator;
use crate::infrastructure::audit::TracingAuditSink;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::llm::ProviderRegistry;
use crate::infrastructure::reflexors::builtin_reflexors;

#[derive(Clone)]
pub struct Warden {
    pub agent: SreAgent,
    pub approvals: Arc<ApprovalService>,
    pub events: EventBus,
    pub stores: Stores,
}

impl Warden {
    /// Build every collaborator from configuration.
    pub async fn from_config(config: &WardenConfig) -> anyhow::Result<Self> {
        let spec = &config.spec;
        let llm: Arc<dyn LLMProvider> = Arc::new(
            ProviderRegistry::from_config(spec).context("Failed to initialize LLM providers")?,
        );
        let stores = create_stores(&spec.storage).await?;
        let actuator = actuator::from_config(&spec.executor);

        Ok(Self::assemble(spec, stores, llm, actuator, Arc::new(TracingAuditSink))?)
    }

    /// Wire explicit collaborators; tests substitute scripted providers here.
    pub fn assemble(
        spec: &WardenSpec,
        stores: Stores,
        llm: Arc<dyn LLMProvider>,
        actuator: Arc<dyn Actuator>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, PolicyError> {
        let approvals = Arc::new(ApprovalService::new(stores.gates.clone()).with_audit(audit.clone()));
        let reflexors = builtin_reflexors(
            stores.signals.clone(),
            spec.detector.lookback,
            spec.agent.metrics.clone(),
        );

        let agent = SreAgent::build(
            spec,
            AgentDependencies {
                llm,
                signals: stores.signals.clone(),
                incidents: stores.incidents.clone(),
                gates: stores.gates.clone(),
                actuator,
                audit,
                reflexors,
                approvals: Some(approvals.clone()),
            },
        )?;

        Ok(Self {
            agent,
            approvals,
            events: EventBus::with_default_capacity(),
            stores,
        })
    }
}
