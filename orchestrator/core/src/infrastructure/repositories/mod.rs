// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the store traits defined in the domain
//! layer.
//!
//! - [`InMemorySignalStore`] - events, incidents and metric readings; also
//!   the orchestrator's incident repository so both views stay consistent
//! - [`InMemoryGateRepository`] - approval gate records for a single process
//! - [`PostgresGateRepository`] - approval gate records shared with a
//!   separately deployed approval endpoint
//! - [`PostgresSignalStore`] - signals and incidents in PostgreSQL

pub mod postgres_gate;
pub mod postgres_signals;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::gate::{ApprovalGateRecord, GateId, GateStatus};
use crate::domain::repository::{GateRepository, IncidentRepository, RepositoryError};
use crate::domain::signals::{
    IncidentId, IncidentRecord, IncidentSeverity, IncidentStatus, SignalError, SignalEvent,
    SignalStore,
};

pub use postgres_gate::PostgresGateRepository;
pub use postgres_signals::PostgresSignalStore;

#[derive(Default)]
struct SignalState {
    events: Vec<SignalEvent>,
    incidents: Vec<IncidentRecord>,
    metrics: HashMap<String, f64>,
}

/// Signal store held in process memory.
///
/// `set_unavailable(true)` makes every query fail, which is how tests exercise
/// the store-outage paths.
#[derive(Clone, Default)]
pub struct InMemorySignalStore {
    state: Arc<RwLock<SignalState>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemorySignalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_event(&self, event: SignalEvent) {
        self.state.write().events.push(event);
    }

    pub fn push_incident(&self, incident: IncidentRecord) {
        self.state.write().incidents.push(incident);
    }

    pub fn set_metric(&self, name: impl Into<String>, value: f64) {
        self.state.write().metrics.insert(name.into(), value);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Drop every event, e.g. once an error burst has aged out of retention.
    pub fn clear_events(&self) {
        self.state.write().events.clear();
    }

    /// Change an incident's severity the way external incident tooling would.
    pub fn set_incident_severity(&self, id: IncidentId, severity: IncidentSeverity) -> bool {
        match self.state.write().incidents.iter_mut().find(|i| i.id == id) {
            Some(incident) => {
                incident.severity = severity;
                true
            }
            None => false,
        }
    }

    pub fn incidents(&self) -> Vec<IncidentRecord> {
        self.state.read().incidents.clone()
    }

    fn check_available(&self) -> Result<(), SignalError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(SignalError::Unavailable("in-memory store marked unavailable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SignalStore for InMemorySignalStore {
    async fn query_recent_events(&self, window: Duration) -> Result<Vec<SignalEvent>, SignalError> {
        self.check_available()?;
        let cutoff = chrono::Duration::from_std(window)
            .ok()
            .and_then(|w| Utc::now().checked_sub_signed(w))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut events: Vec<SignalEvent> = self
            .state
            .read()
            .events
            .iter()
            .filter(|e| e.timestamp >= cutoff)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(events)
    }

    async fn query_active_incidents(&self) -> Result<Vec<IncidentRecord>, SignalError> {
        self.check_available()?;
        let mut incidents: Vec<IncidentRecord> = self
            .state
            .read()
            .incidents
            .iter()
            .filter(|i| i.is_active())
            .cloned()
            .collect();
        incidents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(incidents)
    }

    async fn read_metric(&self, name: &str) -> Result<Option<f64>, SignalError> {
        self.check_available()?;
        Ok(self.state.read().metrics.get(name).copied())
    }
}

#[async_trait]
impl IncidentRepository for InMemorySignalStore {
    async fn find_open(&self) -> Result<Option<IncidentRecord>, RepositoryError> {
        Ok(self
            .state
            .read()
            .incidents
            .iter()
            .filter(|i| i.is_active())
            .max_by_key(|i| i.created_at)
            .cloned())
    }

    async fn open(
        &self,
        title: &str,
        severity: IncidentSeverity,
        impact: &str,
    ) -> Result<IncidentRecord, RepositoryError> {
        let incident = IncidentRecord::open(title, severity, impact).opened_by_orchestrator();
        self.state.write().incidents.push(incident.clone());
        Ok(incident)
    }

    async fn resolve(&self, id: IncidentId, resolved_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut state = self.state.write();
        let incident = state
            .incidents
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| RepositoryError::NotFound(format!("incident {}", id)))?;
        incident.status = IncidentStatus::Resolved;
        incident.resolved_at = Some(resolved_at);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryGateRepository {
    gates: Arc<RwLock<HashMap<GateId, ApprovalGateRecord>>>,
}

impl InMemoryGateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GateRepository for InMemoryGateRepository {
    async fn create(&self, record: &ApprovalGateRecord) -> Result<(), RepositoryError> {
        self.gates.write().insert(record.id, record.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: GateId) -> Result<Option<ApprovalGateRecord>, RepositoryError> {
        Ok(self.gates.read().get(&id).cloned())
    }

    async fn find_open_for_incident(
        &self,
        incident_id: IncidentId,
        now: DateTime<Utc>,
    ) -> Result<Option<ApprovalGateRecord>, RepositoryError> {
        Ok(self
            .gates
            .read()
            .values()
            .filter(|g| g.incident_id == incident_id && g.is_open(now))
            .max_by_key(|g| g.created_at)
            .cloned())
    }

    async fn record_decision(
        &self,
        id: GateId,
        status: GateStatus,
        decided_by: Option<String>,
        reason: Option<String>,
        decided_at: DateTime<Utc>,
    ) -> Result<Option<ApprovalGateRecord>, RepositoryError> {
        let mut gates = self.gates.write();
        let Some(record) = gates.get_mut(&id) else {
            return Ok(None);
        };
        if !record.is_open(decided_at) {
            return Ok(None);
        }
        record.status = status;
        record.approved_by = decided_by;
        record.reason = reason;
        record.decided_at = Some(decided_at);
        Ok(Some(record.clone()))
    }

    async fn list_pending(&self, now: DateTime<Utc>) -> Result<Vec<ApprovalGateRecord>, RepositoryError> {
        let mut pending: Vec<ApprovalGateRecord> = self
            .gates
            .read()
            .values()
            .filter(|g| g.is_open(now))
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(pending)
    }
}
