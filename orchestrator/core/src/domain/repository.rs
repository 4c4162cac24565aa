// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository interfaces for gate and incident persistence.
//!
//! Implementations live in `infrastructure::repositories`: in-memory stores
//! for development and tests, PostgreSQL for gates shared with a separately
//! deployed approval endpoint.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::gate::{ApprovalGateRecord, GateId, GateStatus};
use crate::domain::signals::{IncidentId, IncidentRecord, IncidentSeverity};

/// Persistence for approval gate records.
#[async_trait]
pub trait GateRepository: Send + Sync {
    async fn create(&self, record: &ApprovalGateRecord) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: GateId) -> Result<Option<ApprovalGateRecord>, RepositoryError>;

    /// The newest PENDING record for the incident that has not expired at `now`.
    async fn find_open_for_incident(
        &self,
        incident_id: IncidentId,
        now: DateTime<Utc>,
    ) -> Result<Option<ApprovalGateRecord>, RepositoryError>;

    /// Compare-and-set the decision fields on a PENDING, unexpired record.
    ///
    /// Returns the updated record, or `None` when the record was not pending
    /// or had already expired at `decided_at`; callers re-read to tell which.
    async fn record_decision(
        &self,
        id: GateId,
        status: GateStatus,
        decided_by: Option<String>,
        reason: Option<String>,
        decided_at: DateTime<Utc>,
    ) -> Result<Option<ApprovalGateRecord>, RepositoryError>;

    /// PENDING records still open at `now`, oldest first.
    async fn list_pending(&self, now: DateTime<Utc>) -> Result<Vec<ApprovalGateRecord>, RepositoryError>;
}

/// Incident bookkeeping owned by the orchestrator.
#[async_trait]
pub trait IncidentRepository: Send + Sync {
    /// The newest incident that is not resolved.
    async fn find_open(&self) -> Result<Option<IncidentRecord>, RepositoryError>;

    async fn open(
        &self,
        title: &str,
        severity: IncidentSeverity,
        impact: &str,
    ) -> Result<IncidentRecord, RepositoryError>;

    async fn resolve(&self, id: IncidentId, resolved_at: DateTime<Utc>) -> Result<(), RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
