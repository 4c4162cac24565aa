// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),
}

/// Governance limits applied by the validation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernancePolicy {
    /// Upper scale bound; the lower bound is its reciprocal.
    pub max_scale_factor: f64,
    pub max_spend: f64,
    pub cost_per_replica: f64,
    /// Case-insensitive substrings that mark a production target.
    pub production_markers: Vec<String>,
    /// Regexes matched against the serialized action parameters.
    pub secret_patterns: Vec<String>,
}

impl Default for GovernancePolicy {
    fn default() -> Self {
        Self {
            max_scale_factor: 10.0,
            max_spend: 10_000.0,
            cost_per_replica: 100.0,
            production_markers: vec!["prod".to_string()],
            secret_patterns: default_secret_patterns(),
        }
    }
}

pub fn default_secret_patterns() -> Vec<String> {
    [
        r"sk-[A-Za-z0-9_\-]{8,}",
        r"(?i)api[_\-]?key",
        r"(?i)password",
        r"(?i)secret",
        r"AKIA[0-9A-Z]{16}",
        r"-----BEGIN [A-Z ]*PRIVATE KEY-----",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

impl GovernancePolicy {
    pub fn check_limits(&self) -> Result<(), PolicyError> {
        if self.max_scale_factor.is_nan() || self.max_scale_factor < 1.0 {
            return Err(PolicyError::InvalidLimit(format!(
                "max_scale_factor must be >= 1 (got {})",
                self.max_scale_factor
            )));
        }
        if self.max_spend.is_nan() || self.max_spend <= 0.0 {
            return Err(PolicyError::InvalidLimit(format!(
                "max_spend must be positive (got {})",
                self.max_spend
            )));
        }
        if self.cost_per_replica.is_nan() || self.cost_per_replica < 0.0 {
            return Err(PolicyError::InvalidLimit(format!(
                "cost_per_replica must not be negative (got {})",
                self.cost_per_replica
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub allowed: bool,
    pub violations: Vec<String>,
}

impl ValidationResult {
    pub fn from_violations(violations: Vec<String>) -> Self {
        Self {
            allowed: violations.is_empty(),
            violations,
        }
    }

    pub fn denied(violation: impl Into<String>) -> Self {
        Self::from_violations(vec![violation.into()])
    }
}
