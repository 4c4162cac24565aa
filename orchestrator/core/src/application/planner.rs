// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Plan generation.
//!
//! One reasoning call turns the detected anomalies into an ordered list of
//! steps. Planning never fails: a missing, empty or unparsable reply, a
//! timeout or a provider error all yield [`Plan::default_plan`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::application::payload::extract_payload;
use crate::domain::anomaly::Anomaly;
use crate::domain::config::CallSettings;
use crate::domain::llm::{complete_with_timeout, GenerationOptions, LLMProvider};
use crate::domain::plan::{Plan, PlanStep};
use crate::domain::signals::SignalEvent;

/// Ambient context handed to the planner alongside the anomalies.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlanningContext {
    pub anomalies: Vec<Anomaly>,
    pub recent_events: Vec<SignalEvent>,
    pub metrics: BTreeMap<String, f64>,
}

#[derive(Deserialize)]
struct PlanReply {
    #[serde(default)]
    steps: Vec<PlanStep>,
    #[serde(default)]
    reasoning: Option<String>,
}

pub struct PlanGenerator {
    llm: Arc<dyn LLMProvider>,
    settings: CallSettings,
    timeout: Duration,
    /// (name, description) of every registered reflexor.
    reflexors: Vec<(String, String)>,
}

impl PlanGenerator {
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        settings: CallSettings,
        timeout: Duration,
        reflexors: Vec<(String, String)>,
    ) -> Self {
        Self {
            llm,
            settings,
            timeout,
            reflexors,
        }
    }

    pub async fn plan(&self, context: &PlanningContext) -> Plan {
        let prompt = self.build_prompt(context);
        debug!(prompt_len = prompt.len(), "Requesting remediation plan");

        let options = GenerationOptions::new(self.settings.temperature, self.settings.max_tokens);
        let plan = match complete_with_timeout(self.llm.as_ref(), &prompt, &options, self.timeout).await {
            Ok(text) => parse_plan(&text),
            Err(e) => {
                warn!(error = %e, "Plan generation failed, using default plan");
                Plan::default_plan(format!("Default plan generated: {}", e))
            }
        };

        if plan.fallback {
            metrics::counter!("warden_reasoning_fallbacks_total", "site" => "planner").increment(1);
        }
        info!(steps = plan.steps.len(), fallback = plan.fallback, "Plan ready");
        plan
    }

    fn build_prompt(&self, context: &PlanningContext) -> String {
        let context_json =
            serde_json::to_string_pretty(context).unwrap_or_else(|_| "{}".to_string());
        let reflexor_list = self
            .reflexors
            .iter()
            .map(|(name, description)| format!("- {}: {}", name, description))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"You are a Site Reliability Engineer (SRE) using a Constrained Markov Decision Process (CMDP).

Given this context:
{context_json}

Create a plan to resolve this issue as an ordered list of steps.
For each step, name the Reflexors (evidence sources) you need before acting.

Available Reflexors:
{reflexor_list}

Available actions: SCALE, ROLLBACK, RESTART, DELETE_LOGS, PAUSE_PIPELINE.

Output as JSON with this structure:
{{
  "steps": [
    {{
      "step": 1,
      "action": "RESTART",
      "reflexors": ["check-metrics", "fetch-logs"],
      "description": "Check metrics and logs before restarting"
    }}
  ],
  "reasoning": "Why this plan was chosen"
}}"#
        )
    }
}

/// Parse a planner reply, falling back to the default plan.
pub fn parse_plan(text: &str) -> Plan {
    match extract_payload::<PlanReply>(text) {
        Some(reply) if !reply.steps.is_empty() => Plan {
            steps: reply.steps,
            reasoning: reply
                .reasoning
                .unwrap_or_else(|| "No reasoning provided".to_string()),
            fallback: false,
        }
        .normalized(),
        Some(_) => {
            warn!("Planner returned no steps, using default plan");
            Plan::default_plan("Default plan generated: empty step list")
        }
        None => {
            warn!("Planner reply had no usable payload, using default plan");
            Plan::default_plan("Default plan generated")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action::ActionRef;
    use crate::domain::llm::{GenerationResponse, LLMError};
    use async_trait::async_trait;

    struct FixedReply(Result<&'static str, ()>);

    #[async_trait]
    impl LLMProvider for FixedReply {
        async fn generate(
            &self,
            _prompt: &str,
            _options: &GenerationOptions,
        ) -> Result<GenerationResponse, LLMError> {
            match self.0 {
                Ok(text) => Ok(GenerationResponse::text_only("test", "test", text)),
                Err(()) => Err(LLMError::Network("connection refused".into())),
            }
        }

        async fn health_check(&self) -> Result<(), LLMError> {
            Ok(())
        }
    }

    fn generator(reply: Result<&'static str, ()>) -> PlanGenerator {
        PlanGenerator::new(
            Arc::new(FixedReply(reply)),
            CallSettings {
                temperature: 0.1,
                max_tokens: 1000,
            },
            Duration::from_secs(5),
            vec![("check-metrics".into(), "Query metrics".into())],
        )
    }

    #[test]
    fn test_parse_plan_from_prose() {
        let plan = parse_plan(
            r#"Here is my plan: {"steps":[{"step":3,"action":"SCALE_K8S","reflexors":["check-metrics"],"description":"scale out"}],"reasoning":"load"}"#,
        );
        assert!(!plan.fallback);
        assert_eq!(plan.steps[0].sequence_number, 1);
        assert_eq!(plan.steps[0].action, ActionRef::Named("SCALE_K8S".into()));
        assert_eq!(plan.reasoning, "load");
    }

    #[test]
    fn test_empty_steps_fall_back() {
        assert!(parse_plan(r#"{"steps": [], "reasoning": "nothing"}"#).fallback);
        assert!(parse_plan("I would restart it").fallback);
    }

    #[tokio::test]
    async fn test_provider_error_yields_default_plan() {
        let plan = generator(Err(())).plan(&PlanningContext::default()).await;
        assert!(plan.fallback);
        assert_eq!(plan.steps.len(), 1);
    }

    #[tokio::test]
    async fn test_prompt_lists_reflexors() {
        let g = generator(Ok("{}"));
        let prompt = g.build_prompt(&PlanningContext::default());
        assert!(prompt.contains("- check-metrics: Query metrics"));
    }
}
