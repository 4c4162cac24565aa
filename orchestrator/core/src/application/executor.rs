// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Step executor.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::action::ProposedAction;
use crate::domain::actuator::{ActuationOutcome, Actuator};

/// Exit code recorded when the actuator did not answer in time.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code recorded when the actuator returned an error.
pub const ERROR_EXIT_CODE: i32 = -1;

pub struct Executor {
    actuator: Arc<dyn Actuator>,
    timeout: Duration,
}

impl Executor {
    pub fn new(actuator: Arc<dyn Actuator>, timeout: Duration) -> Self {
        Self { actuator, timeout }
    }

    /// Apply one approved action. Errors and timeouts come back as failed
    /// outcomes so the caller only has one shape to record.
    pub async fn execute(&self, action: &ProposedAction) -> ActuationOutcome {
        match tokio::time::timeout(self.timeout, self.actuator.execute(action)).await {
            Ok(Ok(outcome)) => {
                if outcome.success {
                    info!(action = %action.summary(), exit_code = outcome.exit_code, "Action applied");
                } else {
                    warn!(action = %action.summary(), exit_code = outcome.exit_code, "Action failed");
                }
                outcome
            }
            Ok(Err(e)) => {
                warn!(action = %action.summary(), error = %e, "Actuator error");
                ActuationOutcome::failed(e.to_string(), ERROR_EXIT_CODE)
            }
            Err(_) => {
                warn!(action = %action.summary(), timeout = ?self.timeout, "Actuator timed out");
                ActuationOutcome::failed(
                    format!("Actuator timed out after {:?}", self.timeout),
                    TIMEOUT_EXIT_CODE,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action::ActionType;
    use crate::domain::actuator::ActuatorError;
    use async_trait::async_trait;

    struct Slow;

    #[async_trait]
    impl Actuator for Slow {
        async fn execute(&self, _action: &ProposedAction) -> Result<ActuationOutcome, ActuatorError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ActuationOutcome::succeeded("late"))
        }
    }

    struct Broken;

    #[async_trait]
    impl Actuator for Broken {
        async fn execute(&self, _action: &ProposedAction) -> Result<ActuationOutcome, ActuatorError> {
            Err(ActuatorError::Spawn("no such binary".into()))
        }
    }

    #[tokio::test]
    async fn test_timeout_is_a_failure() {
        let executor = Executor::new(Arc::new(Slow), Duration::from_millis(20));
        let outcome = executor
            .execute(&ProposedAction::new(ActionType::Restart, "api"))
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, TIMEOUT_EXIT_CODE);
    }

    #[tokio::test]
    async fn test_actuator_error_is_a_failure() {
        let executor = Executor::new(Arc::new(Broken), Duration::from_secs(1));
        let outcome = executor
            .execute(&ProposedAction::new(ActionType::Restart, "api"))
            .await;
        assert!(!outcome.success);
        assert!(outcome.log.contains("no such binary"));
    }
}
