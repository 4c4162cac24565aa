// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Evidence-vs-action go/no-go check.
//!
//! Failure defaults differ on purpose from the verification agent:
//!
//! | Reply | Verdict |
//! |-------|---------|
//! | JSON with `"proceed": true` | proceed |
//! | JSON without a boolean `true` `proceed` | halt |
//! | No parsable JSON | **proceed** (the verification agent is the final gate) |
//! | Provider error / timeout | halt |

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::application::payload::first_json_object;
use crate::domain::action::ProposedAction;
use crate::domain::config::CallSettings;
use crate::domain::evidence::EvidenceStore;
use crate::domain::llm::{complete_with_timeout, GenerationOptions, LLMProvider};
use crate::domain::plan::PlanStep;
use crate::domain::verification::ReasoningVerdict;

pub struct Reasoner {
    llm: Arc<dyn LLMProvider>,
    settings: CallSettings,
    timeout: Duration,
}

impl Reasoner {
    pub fn new(llm: Arc<dyn LLMProvider>, settings: CallSettings, timeout: Duration) -> Self {
        Self {
            llm,
            settings,
            timeout,
        }
    }

    pub async fn judge(
        &self,
        step: &PlanStep,
        evidence: &EvidenceStore,
        action: &ProposedAction,
    ) -> ReasoningVerdict {
        let prompt = format!(
            r#"You are executing Step {}: "{}".

Here is the Evidence retrieved:
{}

Proposed Action:
{}

Analyze this evidence.
Does it support the proposed action?
If not, you must HALT and re-plan.

Output as JSON: {{ "reasoning": "...", "proceed": true/false }}"#,
            step.sequence_number,
            step.description,
            evidence.to_pretty_json(),
            serde_json::to_string_pretty(action).unwrap_or_default(),
        );

        let options = GenerationOptions::new(self.settings.temperature, self.settings.max_tokens);
        match complete_with_timeout(self.llm.as_ref(), &prompt, &options, self.timeout).await {
            Ok(text) => parse_verdict(&text),
            Err(e) => {
                warn!(step = step.sequence_number, error = %e, "Reasoning call failed, halting plan");
                metrics::counter!("warden_reasoning_fallbacks_total", "site" => "reasoner").increment(1);
                ReasoningVerdict::halt(format!("Reasoning failed: {}", e))
            }
        }
    }
}

pub fn parse_verdict(text: &str) -> ReasoningVerdict {
    match first_json_object(text) {
        Some(object) => {
            let proceed = matches!(object.get("proceed"), Some(Value::Bool(true)));
            let reasoning = object
                .get("reasoning")
                .and_then(Value::as_str)
                .unwrap_or("No reasoning provided")
                .to_string();
            debug!(proceed, "Reasoner verdict parsed");
            ReasoningVerdict { proceed, reasoning }
        }
        None => {
            warn!("Reasoner reply was not parsable, proceeding optimistically");
            metrics::counter!("warden_reasoning_fallbacks_total", "site" => "reasoner").increment(1);
            ReasoningVerdict::proceed("Evidence analysis completed")
        }
    }
}
