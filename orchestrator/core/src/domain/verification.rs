// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Verdicts returned by the two reasoning-backed reviewers.

use serde::{Deserialize, Serialize};

/// Outcome of the semantic second opinion on a proposed action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl VerificationResult {
    pub fn approved() -> Self {
        Self {
            approved: true,
            reason: None,
            warning: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            reason: Some(reason.into()),
            warning: None,
        }
    }

    /// Placeholder for steps the verification agent never saw.
    pub fn not_verified() -> Self {
        Self::rejected("Not verified")
    }
}

/// Go/no-go judgement of whether evidence supports a step's action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningVerdict {
    pub proceed: bool,
    pub reasoning: String,
}

impl ReasoningVerdict {
    pub fn proceed(reasoning: impl Into<String>) -> Self {
        Self {
            proceed: true,
            reasoning: reasoning.into(),
        }
    }

    pub fn halt(reasoning: impl Into<String>) -> Self {
        Self {
            proceed: false,
            reasoning: reasoning.into(),
        }
    }
}
