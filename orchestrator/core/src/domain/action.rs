// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Remediation Actions
//!
//! [`ProposedAction`] is the unit that is validated, verified and executed.
//! Its [`ActionType`] is a closed enum so the validation engine and the
//! actuators match on it exhaustively.
//!
//! Plan steps may name an action symbolically (`"RESTART_SERVICE"`) or carry
//! a fully specified action; [`ActionRef::resolve`] turns either form into a
//! `ProposedAction`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    #[serde(alias = "SCALE_K8S", alias = "SCALE_UP")]
    Scale,
    #[serde(alias = "ROLLBACK_DB")]
    Rollback,
    #[serde(alias = "RESTART_SERVICE")]
    Restart,
    DeleteLogs,
    PausePipeline,
}

impl ActionType {
    pub const ALL: [ActionType; 5] = [
        ActionType::Scale,
        ActionType::Rollback,
        ActionType::Restart,
        ActionType::DeleteLogs,
        ActionType::PausePipeline,
    ];

    /// Parse a symbolic action name as produced by the planner.
    ///
    /// Accepts the canonical names plus the legacy Kubernetes-flavoured
    /// aliases, case-insensitively.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "SCALE" | "SCALE_K8S" | "SCALE_UP" => Some(ActionType::Scale),
            "ROLLBACK" | "ROLLBACK_DB" => Some(ActionType::Rollback),
            "RESTART" | "RESTART_SERVICE" => Some(ActionType::Restart),
            "DELETE_LOGS" => Some(ActionType::DeleteLogs),
            "PAUSE_PIPELINE" => Some(ActionType::PausePipeline),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Scale => "SCALE",
            ActionType::Rollback => "ROLLBACK",
            ActionType::Restart => "RESTART",
            ActionType::DeleteLogs => "DELETE_LOGS",
            ActionType::PausePipeline => "PAUSE_PIPELINE",
        }
    }

    /// Destructive actions are forbidden on production targets.
    pub fn is_destructive(&self) -> bool {
        matches!(self, ActionType::Rollback | ActionType::DeleteLogs)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawProposedAction")]
pub struct ProposedAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub target: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

// Accepts both `{type, target, parameters}` and the `{type, params: {target, ..}}`
// shape some planners emit.
#[derive(Deserialize)]
struct RawProposedAction {
    #[serde(rename = "type")]
    action_type: ActionType,
    #[serde(default)]
    target: Option<String>,
    #[serde(default, alias = "params")]
    parameters: Map<String, Value>,
}

impl From<RawProposedAction> for ProposedAction {
    fn from(raw: RawProposedAction) -> Self {
        let mut parameters = raw.parameters;
        let target = match raw.target {
            Some(t) if !t.trim().is_empty() => t,
            _ => match parameters.remove("target") {
                Some(Value::String(t)) => t,
                _ => String::new(),
            },
        };
        Self {
            action_type: raw.action_type,
            target,
            parameters,
        }
    }
}

impl ProposedAction {
    pub fn new(action_type: ActionType, target: impl Into<String>) -> Self {
        Self {
            action_type,
            target: target.into(),
            parameters: Map::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Requested replica count / scale factor for `SCALE` actions.
    pub fn scale_value(&self) -> Option<f64> {
        ["replicas", "scale_to", "scaleTo"]
            .iter()
            .find_map(|key| self.parameters.get(*key))
            .and_then(|v| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            })
    }

    /// Compact single-line rendering used in event content and logs.
    pub fn summary(&self) -> String {
        format!("{} on '{}'", self.action_type, self.target)
    }
}

/// How a plan step refers to its action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionRef {
    Proposed(ProposedAction),
    Named(String),
}

impl ActionRef {
    /// Resolve to a concrete action.
    ///
    /// Unknown symbolic names fall back to `RESTART`; missing targets are
    /// filled with `default_target`.
    pub fn resolve(&self, default_target: &str, description: &str) -> ProposedAction {
        match self {
            ActionRef::Proposed(action) => {
                let mut action = action.clone();
                if action.target.trim().is_empty() {
                    action.target = default_target.to_string();
                }
                action
            }
            ActionRef::Named(name) => {
                let action_type = ActionType::from_symbol(name).unwrap_or(ActionType::Restart);
                ProposedAction::new(action_type, default_target)
                    .with_parameter("reason", description.to_string())
            }
        }
    }

    pub fn label(&self) -> String {
        match self {
            ActionRef::Proposed(action) => action.action_type.to_string(),
            ActionRef::Named(name) => name.clone(),
        }
    }
}

impl From<&str> for ActionRef {
    fn from(name: &str) -> Self {
        ActionRef::Named(name.to_string())
    }
}

impl From<ProposedAction> for ActionRef {
    fn from(action: ProposedAction) -> Self {
        ActionRef::Proposed(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_symbol_aliases() {
        assert_eq!(ActionType::from_symbol("SCALE_K8S"), Some(ActionType::Scale));
        assert_eq!(ActionType::from_symbol("restart-service"), Some(ActionType::Restart));
        assert_eq!(ActionType::from_symbol("rollback_db"), Some(ActionType::Rollback));
        assert_eq!(ActionType::from_symbol("DROP_TABLE"), None);
    }

    #[test]
    fn test_params_shape_hoists_target() {
        let action: ProposedAction = serde_json::from_value(json!({
            "type": "SCALE_K8S",
            "params": { "target": "api-gateway", "replicas": 4 }
        }))
        .unwrap();
        assert_eq!(action.action_type, ActionType::Scale);
        assert_eq!(action.target, "api-gateway");
        assert_eq!(action.scale_value(), Some(4.0));
        assert!(!action.parameters.contains_key("target"));
    }

    #[test]
    fn test_unknown_named_action_resolves_to_restart() {
        let action = ActionRef::Named("REBOOT_UNIVERSE".into()).resolve("checkout", "restart it");
        assert_eq!(action.action_type, ActionType::Restart);
        assert_eq!(action.target, "checkout");
        assert_eq!(action.parameters["reason"], json!("restart it"));
    }

    #[test]
    fn test_action_ref_untagged_forms() {
        let named: ActionRef = serde_json::from_value(json!("ROLLBACK")).unwrap();
        assert_eq!(named, ActionRef::Named("ROLLBACK".into()));

        let full: ActionRef =
            serde_json::from_value(json!({"type": "PAUSE_PIPELINE", "target": "ci"})).unwrap();
        match full {
            ActionRef::Proposed(a) => assert_eq!(a.action_type, ActionType::PausePipeline),
            other => panic!("expected proposed action, got {:?}", other),
        }
    }

    #[test]
    fn test_scale_value_accepts_numeric_strings() {
        let action = ProposedAction::new(ActionType::Scale, "web").with_parameter("scale_to", "3");
        assert_eq!(action.scale_value(), Some(3.0));
    }
}
