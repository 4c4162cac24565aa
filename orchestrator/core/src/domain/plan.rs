// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Remediation plans
//!
//! A [`Plan`] is an ordered list of [`PlanStep`]s produced by the plan
//! generator. Each step names the evidence sources ("reflexors") it needs
//! before its action can be judged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::domain::action::{ActionRef, ActionType};

pub const DEFAULT_PLAN_REFLEXOR: &str = "check-metrics";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    #[serde(alias = "step", default)]
    pub sequence_number: u32,
    pub action: ActionRef,
    #[serde(alias = "reflexors", default)]
    pub required_evidence_sources: BTreeSet<String>,
    #[serde(default)]
    pub description: String,
}

impl PlanStep {
    pub fn new(sequence_number: u32, action: impl Into<ActionRef>, description: &str) -> Self {
        Self {
            sequence_number,
            action: action.into(),
            required_evidence_sources: BTreeSet::new(),
            description: description.to_string(),
        }
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.required_evidence_sources.insert(source.to_string());
        self
    }

    pub fn sources_label(&self) -> String {
        self.required_evidence_sources
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
    #[serde(default)]
    pub reasoning: String,
    /// Set when the generator could not obtain a usable plan and fell back
    /// to the single-step default.
    #[serde(default)]
    pub fallback: bool,
}

impl Plan {
    /// Single-step `RESTART` plan backed by `check-metrics`.
    pub fn default_plan(reason: impl Into<String>) -> Self {
        Self {
            steps: vec![PlanStep::new(
                1,
                ActionRef::Named(ActionType::Restart.as_str().to_string()),
                "Check metrics and restart service if needed",
            )
            .with_source(DEFAULT_PLAN_REFLEXOR)],
            reasoning: reason.into(),
            fallback: true,
        }
    }

    /// Renumbers steps 1..=n in list order.
    pub fn normalized(mut self) -> Self {
        for (index, step) in self.steps.iter_mut().enumerate() {
            step.sequence_number = index as u32 + 1;
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Numbered rendering used in event content.
    pub fn outline(&self) -> String {
        self.steps
            .iter()
            .map(|s| {
                format!(
                    "{}. {} (Reflexors: {})",
                    s.sequence_number,
                    s.description,
                    s.sources_label()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_planner_shape_deserializes() {
        let plan: Plan = serde_json::from_value(json!({
            "steps": [
                {"step": 1, "action": "SCALE_K8S", "reflexors": ["check-metrics", "fetch-logs"], "description": "scale"},
                {"step": 2, "action": {"type": "RESTART", "target": "api"}, "reflexors": []}
            ],
            "reasoning": "latency spike"
        }))
        .unwrap();

        assert_eq!(plan.steps.len(), 2);
        assert!(!plan.fallback);
        assert_eq!(plan.steps[0].sources_label(), "check-metrics, fetch-logs");
        assert_eq!(plan.steps[1].description, "");
    }

    #[test]
    fn test_default_plan_is_flagged() {
        let plan = Plan::default_plan("no payload");
        assert!(plan.fallback);
        assert_eq!(plan.steps.len(), 1);
        assert!(plan.steps[0]
            .required_evidence_sources
            .contains(DEFAULT_PLAN_REFLEXOR));
    }

    #[test]
    fn test_normalized_renumbers() {
        let plan = Plan {
            steps: vec![
                PlanStep::new(7, "RESTART", "a"),
                PlanStep::new(7, "SCALE", "b"),
            ],
            reasoning: String::new(),
            fallback: false,
        }
        .normalized();
        let numbers: Vec<u32> = plan.steps.iter().map(|s| s.sequence_number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }
}
