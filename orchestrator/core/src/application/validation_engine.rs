// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Deterministic rule-based governance.
//!
//! [`ValidationEngine::validate`] is pure: no I/O, no clock, same input and
//! policy always give the same [`ValidationResult`]. It is authoritative; the
//! verification agent only runs when it allows the action.

use regex::Regex;

use crate::domain::action::{ActionType, ProposedAction};
use crate::domain::policy::{GovernancePolicy, PolicyError, ValidationResult};

pub struct ValidationEngine {
    policy: GovernancePolicy,
    secret_patterns: Vec<Regex>,
    production_markers: Vec<String>,
}

impl ValidationEngine {
    pub fn new(policy: GovernancePolicy) -> Result<Self, PolicyError> {
        policy.check_limits()?;
        let secret_patterns = policy
            .secret_patterns
            .iter()
            .map(|p| Regex::new(p).map_err(|e| PolicyError::InvalidPattern(format!("{}: {}", p, e))))
            .collect::<Result<Vec<_>, _>>()?;
        let production_markers = policy
            .production_markers
            .iter()
            .map(|m| m.to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();
        Ok(Self {
            policy,
            secret_patterns,
            production_markers,
        })
    }

    pub fn policy(&self) -> &GovernancePolicy {
        &self.policy
    }

    pub fn validate(&self, action: &ProposedAction) -> ValidationResult {
        let mut violations = Vec::new();

        if action.target.trim().is_empty() {
            violations.push("Action target must not be empty.".to_string());
        }

        match action.action_type {
            ActionType::Scale => self.check_scale(action, &mut violations),
            ActionType::Rollback | ActionType::DeleteLogs => {
                if self.is_production(&action.target) {
                    violations.push(format!(
                        "Dangerous action {} on production target '{}'. Policy forbids modification.",
                        action.action_type, action.target
                    ));
                }
            }
            ActionType::Restart | ActionType::PausePipeline => {}
        }

        if self.contains_secret(action) {
            violations.push("Action params may contain secrets. Policy violation.".to_string());
        }

        ValidationResult::from_violations(violations)
    }

    fn check_scale(&self, action: &ProposedAction, violations: &mut Vec<String>) {
        let max = self.policy.max_scale_factor;
        let Some(scale) = action.scale_value() else {
            violations.push("SCALE requires a numeric \"replicas\" or \"scale_to\" parameter.".to_string());
            return;
        };

        if scale > max {
            violations.push(format!(
                "Requested scale ({}) violates max scale policy ({}).",
                scale, max
            ));
        }
        if scale < 1.0 / max {
            violations.push(format!(
                "Requested scale ({}) violates min scale policy ({}).",
                scale,
                1.0 / max
            ));
        }

        let estimated_cost = scale * self.policy.cost_per_replica;
        if estimated_cost > self.policy.max_spend {
            violations.push(format!(
                "Estimated cost (${}) exceeds limit (${}).",
                estimated_cost, self.policy.max_spend
            ));
        }
    }

    fn is_production(&self, target: &str) -> bool {
        let target = target.to_lowercase();
        self.production_markers.iter().any(|m| target.contains(m.as_str()))
    }

    fn contains_secret(&self, action: &ProposedAction) -> bool {
        if action.parameters.is_empty() || self.secret_patterns.is_empty() {
            return false;
        }
        let serialized = serde_json::to_string(&action.parameters).unwrap_or_default();
        self.secret_patterns.iter().any(|p| p.is_match(&serialized))
    }
}
