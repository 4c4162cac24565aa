// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Factory
//!
//! Creates concrete store implementations for the configured storage
//! backend. The domain layer only sees the traits.

use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use crate::domain::config::{StorageBackend, StorageConfig};
use crate::domain::repository::{GateRepository, IncidentRepository};
use crate::domain::signals::SignalStore;
use crate::infrastructure::db::Database;
use crate::infrastructure::repositories::{
    InMemoryGateRepository, InMemorySignalStore, PostgresGateRepository, PostgresSignalStore,
};

/// The store handles one orchestrator process needs.
#[derive(Clone)]
pub struct Stores {
    pub signals: Arc<dyn SignalStore>,
    pub incidents: Arc<dyn IncidentRepository>,
    pub gates: Arc<dyn GateRepository>,
    /// Set for the memory backend so callers can seed signals.
    pub memory: Option<InMemorySignalStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        let signals = InMemorySignalStore::new();
        Self {
            signals: Arc::new(signals.clone()),
            incidents: Arc::new(signals.clone()),
            gates: Arc::new(InMemoryGateRepository::new()),
            memory: Some(signals),
        }
    }
}

pub async fn create_stores(config: &StorageConfig) -> anyhow::Result<Stores> {
    match config.backend {
        StorageBackend::Memory => {
            info!("Using in-memory stores");
            Ok(Stores::in_memory())
        }
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("storage.database_url is required for the postgres backend")?;
            let db = Database::new(url).await?;

            let gates = PostgresGateRepository::new(db.get_pool().clone());
            gates.ensure_schema().await.context("Failed to prepare approval_gates")?;
            let signals = Arc::new(PostgresSignalStore::new(db.get_pool().clone()));
            signals.ensure_schema().await.context("Failed to prepare signal tables")?;

            info!("Using PostgreSQL stores");
            Ok(Stores {
                signals: signals.clone(),
                incidents: signals,
                gates: Arc::new(gates),
                memory: None,
            })
        }
    }
}
