// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Evidence gathered for one incident run.
//!
//! [`EvidenceStore`] is the per-run, in-memory accumulation of reflexor
//! output. Later steps see everything earlier steps gathered; a source fetched
//! again overwrites its previous value.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReflexorError {
    #[error("Unknown reflexor '{0}'")]
    Unknown(String),

    #[error("Reflexor '{name}' failed: {message}")]
    Failed { name: String, message: String },
}

/// A named evidence source a plan step can request.
#[async_trait]
pub trait Reflexor: Send + Sync {
    fn name(&self) -> &str;

    /// One-line description shown to the plan generator.
    fn describe(&self) -> &str;

    async fn fetch(&self) -> Result<Value, ReflexorError>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EvidenceStore {
    entries: BTreeMap<String, Value>,
}

impl EvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, source: impl Into<String>, value: Value) {
        self.entries.insert(source.into(), value);
    }

    pub fn record_error(&mut self, source: impl Into<String>, message: impl Into<String>) {
        self.entries
            .insert(source.into(), json!({ "error": message.into() }));
    }

    /// Additive merge; keys in `other` win.
    pub fn merge(&mut self, other: EvidenceStore) {
        self.entries.extend(other.entries);
    }

    pub fn get(&self, source: &str) -> Option<&Value> {
        self.entries.get(source)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.entries).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_is_additive() {
        let mut store = EvidenceStore::new();
        store.record("check-metrics", json!({"latency": 2450}));

        let mut next = EvidenceStore::new();
        next.record_error("fetch-logs", "store offline");
        store.merge(next);

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("fetch-logs").unwrap()["error"], "store offline");
        assert!(store.get("check-metrics").is_some());
    }
}
