// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Evidence retrieval for a single plan step.

use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::evidence::{EvidenceStore, Reflexor, ReflexorError};

/// Fetches the sources a step declares, concurrently.
///
/// A failing or unknown source is recorded as `{"error": msg}` and never
/// aborts the others.
pub struct EvidenceRetriever {
    reflexors: BTreeMap<String, Arc<dyn Reflexor>>,
}

impl EvidenceRetriever {
    pub fn new(reflexors: Vec<Arc<dyn Reflexor>>) -> Self {
        Self {
            reflexors: reflexors
                .into_iter()
                .map(|r| (r.name().to_string(), r))
                .collect(),
        }
    }

    /// `(name, description)` pairs, sorted by name.
    pub fn catalog(&self) -> Vec<(String, String)> {
        self.reflexors
            .values()
            .map(|r| (r.name().to_string(), r.describe().to_string()))
            .collect()
    }

    pub async fn retrieve(&self, sources: &BTreeSet<String>) -> EvidenceStore {
        let fetches = sources.iter().map(|source| async move {
            let result = match self.reflexors.get(source) {
                Some(reflexor) => reflexor.fetch().await,
                None => Err(ReflexorError::Unknown(source.clone())),
            };
            (source, result)
        });

        let mut evidence = EvidenceStore::new();
        for (source, result) in join_all(fetches).await {
            match result {
                Ok(value) => {
                    debug!(source = %source, "Evidence retrieved");
                    evidence.record(source.clone(), value);
                }
                Err(e) => {
                    warn!(source = %source, error = %e, "Reflexor failed");
                    evidence.record_error(source.clone(), e.to_string());
                }
            }
        }
        evidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct Static(&'static str, Result<Value, &'static str>);

    #[async_trait]
    impl Reflexor for Static {
        fn name(&self) -> &str {
            self.0
        }

        fn describe(&self) -> &str {
            "static"
        }

        async fn fetch(&self) -> Result<Value, ReflexorError> {
            self.1.clone().map_err(|m| ReflexorError::Failed {
                name: self.0.to_string(),
                message: m.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_other_sources() {
        let retriever = EvidenceRetriever::new(vec![
            Arc::new(Static("check-metrics", Ok(json!({"latency": 2450})))),
            Arc::new(Static("fetch-logs", Err("store offline"))),
        ]);
        let sources: BTreeSet<String> = ["check-metrics", "fetch-logs", "analyze-screenshot"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let evidence = retriever.retrieve(&sources).await;

        assert_eq!(evidence.len(), 3);
        assert_eq!(evidence.get("check-metrics").unwrap()["latency"], 2450);
        assert!(evidence.get("fetch-logs").unwrap()["error"]
            .as_str()
            .unwrap()
            .contains("store offline"));
        assert!(evidence.get("analyze-screenshot").unwrap()["error"]
            .as_str()
            .unwrap()
            .contains("Unknown reflexor"));
    }

    #[test]
    fn test_catalog_sorted_by_name() {
        let retriever = EvidenceRetriever::new(vec![
            Arc::new(Static("fetch-logs", Ok(Value::Null))),
            Arc::new(Static("check-metrics", Ok(Value::Null))),
        ]);
        let names: Vec<String> = retriever.catalog().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["check-metrics", "fetch-logs"]);
    }
}
