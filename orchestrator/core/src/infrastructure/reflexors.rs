// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Built-in reflexors over a [`SignalStore`].
//!
//! - `fetch-logs`: the latest recent error events
//! - `check-metrics`: current readings of the configured metric names
//! - `check-incidents`: incidents that are not yet resolved

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::evidence::{Reflexor, ReflexorError};
use crate::domain::signals::{SignalError, SignalStore};

const FETCH_LOGS_LIMIT: usize = 10;

fn failed(name: &str, err: SignalError) -> ReflexorError {
    ReflexorError::Failed {
        name: name.to_string(),
        message: err.to_string(),
    }
}

pub struct FetchLogs {
    signals: Arc<dyn SignalStore>,
    window: Duration,
}

impl FetchLogs {
    pub const NAME: &'static str = "fetch-logs";

    pub fn new(signals: Arc<dyn SignalStore>, window: Duration) -> Self {
        Self { signals, window }
    }
}

#[async_trait]
impl Reflexor for FetchLogs {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn describe(&self) -> &str {
        "Latest error events from the audit log"
    }

    async fn fetch(&self) -> Result<Value, ReflexorError> {
        let mut events = self
            .signals
            .query_recent_events(self.window)
            .await
            .map_err(|e| failed(Self::NAME, e))?;
        events.truncate(FETCH_LOGS_LIMIT);
        Ok(json!({ "count": events.len(), "events": events }))
    }
}

pub struct CheckMetrics {
    signals: Arc<dyn SignalStore>,
    metrics: Vec<String>,
}

impl CheckMetrics {
    pub const NAME: &'static str = "check-metrics";

    pub fn new(signals: Arc<dyn SignalStore>, metrics: Vec<String>) -> Self {
        Self { signals, metrics }
    }
}

#[async_trait]
impl Reflexor for CheckMetrics {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn describe(&self) -> &str {
        "Current system metrics (latency, error rate, CPU)"
    }

    async fn fetch(&self) -> Result<Value, ReflexorError> {
        let mut readings = Map::new();
        for name in &self.metrics {
            let value = self
                .signals
                .read_metric(name)
                .await
                .map_err(|e| failed(Self::NAME, e))?;
            readings.insert(name.clone(), value.map(Value::from).unwrap_or(Value::Null));
        }
        Ok(Value::Object(readings))
    }
}

pub struct CheckIncidents {
    signals: Arc<dyn SignalStore>,
}

impl CheckIncidents {
    pub const NAME: &'static str = "check-incidents";

    pub fn new(signals: Arc<dyn SignalStore>) -> Self {
        Self { signals }
    }
}

#[async_trait]
impl Reflexor for CheckIncidents {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn describe(&self) -> &str {
        "Active incidents and their severity"
    }

    async fn fetch(&self) -> Result<Value, ReflexorError> {
        let incidents = self
            .signals
            .query_active_incidents()
            .await
            .map_err(|e| failed(Self::NAME, e))?;
        Ok(json!({ "count": incidents.len(), "incidents": incidents }))
    }
}

/// The standard reflexor set.
pub fn builtin_reflexors(
    signals: Arc<dyn SignalStore>,
    window: Duration,
    metrics: Vec<String>,
) -> Vec<Arc<dyn Reflexor>> {
    vec![
        Arc::new(FetchLogs::new(signals.clone(), window)),
        Arc::new(CheckMetrics::new(signals.clone(), metrics)),
        Arc::new(CheckIncidents::new(signals)),
    ]
}
