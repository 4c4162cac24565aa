// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Actuator Capability
//!
//! The side-effecting boundary that applies a remediation to real
//! infrastructure. Implementations live in `infrastructure::actuator`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::action::ProposedAction;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuationOutcome {
    pub success: bool,
    pub log: String,
    pub exit_code: i32,
}

impl ActuationOutcome {
    pub fn succeeded(log: impl Into<String>) -> Self {
        Self {
            success: true,
            log: log.into(),
            exit_code: 0,
        }
    }

    pub fn failed(log: impl Into<String>, exit_code: i32) -> Self {
        Self {
            success: false,
            log: log.into(),
            exit_code,
        }
    }
}

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("No command configured for action {0}")]
    Unsupported(String),

    #[error("Command '{0}' is not on the allow-list")]
    Forbidden(String),

    #[error("Failed to spawn actuator process: {0}")]
    Spawn(String),

    #[error("Actuator error: {0}")]
    Other(String),
}

#[async_trait]
pub trait Actuator: Send + Sync {
    async fn execute(&self, action: &ProposedAction) -> Result<ActuationOutcome, ActuatorError>;
}
