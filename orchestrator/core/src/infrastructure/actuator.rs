// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Actuator implementations.
//!
//! [`DryRunActuator`] only logs. [`CommandActuator`] renders a per-action
//! command template and runs it directly (no shell), so substituted values
//! always land in a single argument.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::process::Command;
use tracing::{debug, info};

use crate::domain::action::{ActionType, ProposedAction};
use crate::domain::actuator::{ActuationOutcome, Actuator, ActuatorError};
use crate::domain::config::{ExecutorConfig, ExecutorMode};

/// Logs the action and reports success without touching anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunActuator;

#[async_trait]
impl Actuator for DryRunActuator {
    async fn execute(&self, action: &ProposedAction) -> Result<ActuationOutcome, ActuatorError> {
        info!(action = %action.summary(), "Dry run: action not applied");
        Ok(ActuationOutcome::succeeded(format!(
            "dry-run: would apply {}",
            action.summary()
        )))
    }
}

pub struct CommandActuator {
    commands: BTreeMap<ActionType, String>,
    allowed: Vec<String>,
}

impl CommandActuator {
    pub fn new(commands: BTreeMap<ActionType, String>, allowed: Vec<String>) -> Self {
        Self { commands, allowed }
    }

    /// Split the template on whitespace, then fill placeholders per argument.
    pub fn render(&self, action: &ProposedAction) -> Result<Vec<String>, ActuatorError> {
        let template = self
            .commands
            .get(&action.action_type)
            .ok_or_else(|| ActuatorError::Unsupported(action.action_type.to_string()))?;

        if !valid_target(&action.target) {
            return Err(ActuatorError::Forbidden(format!(
                "target '{}' contains unsupported characters",
                action.target
            )));
        }

        let argv = template
            .split_whitespace()
            .map(|token| {
                fill_placeholders(token, |key| lookup(action, key)).map_err(|key| {
                    ActuatorError::Other(format!(
                        "action {} has no value for '{{{}}}'",
                        action.action_type, key
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let program = argv
            .first()
            .ok_or_else(|| ActuatorError::Unsupported(action.action_type.to_string()))?;
        if !self.allowed.iter().any(|a| a == program) {
            return Err(ActuatorError::Forbidden(program.clone()));
        }
        Ok(argv)
    }
}

#[async_trait]
impl Actuator for CommandActuator {
    async fn execute(&self, action: &ProposedAction) -> Result<ActuationOutcome, ActuatorError> {
        let argv = self.render(action)?;
        debug!(command = ?argv, "Running actuator command");

        let output = Command::new(&argv[0])
            .args(&argv[1..])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ActuatorError::Spawn(format!("{}: {}", argv[0], e)))?;

        let mut log = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !log.is_empty() {
                log.push('\n');
            }
            log.push_str(&stderr);
        }

        let exit_code = output.status.code().unwrap_or(-1);
        Ok(if output.status.success() {
            ActuationOutcome::succeeded(log)
        } else {
            ActuationOutcome::failed(log, exit_code)
        })
    }
}

/// Replace `{name}` placeholders, where `name` is a lowercase identifier.
/// Braces around anything else (JSON literals) are copied through. Returns
/// the first placeholder with no value as the error.
fn fill_placeholders(
    token: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, String> {
    let mut out = String::with_capacity(token.len());
    let mut rest = token;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let name_len = after
            .find(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'))
            .unwrap_or(after.len());
        let name = &after[..name_len];
        let is_placeholder = after[name_len..].starts_with('}')
            && name.starts_with(|c: char| c.is_ascii_lowercase());
        if is_placeholder {
            out.push_str(&lookup(name).ok_or_else(|| name.to_string())?);
            rest = &after[name_len + 1..];
        } else {
            out.push('{');
            rest = after;
        }
    }
    out.push_str(rest);
    Ok(out)
}

fn valid_target(target: &str) -> bool {
    !target.is_empty()
        && target
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':'))
}

fn lookup(action: &ProposedAction, key: &str) -> Option<String> {
    if key == "target" {
        return Some(action.target.clone());
    }
    if let Some(value) = action.parameters.get(key) {
        return Some(render_value(value));
    }
    if key == "replicas" {
        return action.scale_value().map(format_number);
    }
    None
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.as_f64().map(format_number).unwrap_or_else(|| n.to_string()),
        other => other.to_string(),
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Build the actuator selected by the executor config.
pub fn from_config(config: &ExecutorConfig) -> std::sync::Arc<dyn Actuator> {
    match config.mode {
        ExecutorMode::DryRun => std::sync::Arc::new(DryRunActuator),
        ExecutorMode::Command => std::sync::Arc::new(CommandActuator::new(
            config.commands.clone(),
            config.allowed_commands.clone(),
        )),
    }
}
