// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # PostgreSQL Approval Gate Repository
//!
//! `GateRepository` backed by the `approval_gates` table. The decision write
//! is a single conditional `UPDATE ... RETURNING`, so two approval endpoints
//! racing on the same gate cannot both succeed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::gate::{ApprovalGateRecord, GateId, GatePhase, GateStatus};
use crate::domain::repository::{GateRepository, RepositoryError};
use crate::domain::signals::IncidentId;

const SCHEMA: &str = include_str!("../../../migrations/0001_approval_gates.sql");

const COLUMNS: &str =
    "id, incident_id, phase, status, payload, approved_by, reason, decided_at, created_at, expires_at";

pub struct PostgresGateRepository {
    pool: PgPool,
}

impl PostgresGateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the table and index when missing.
    pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    fn from_row(row: &PgRow) -> Result<ApprovalGateRecord, RepositoryError> {
        let phase: String = row.try_get("phase")?;
        let status: String = row.try_get("status")?;
        Ok(ApprovalGateRecord {
            id: GateId(row.try_get("id")?),
            incident_id: IncidentId(row.try_get("incident_id")?),
            phase: phase
                .parse::<GatePhase>()
                .map_err(RepositoryError::Serialization)?,
            status: status
                .parse::<GateStatus>()
                .map_err(RepositoryError::Serialization)?,
            payload: row.try_get("payload")?,
            approved_by: row.try_get("approved_by")?,
            reason: row.try_get("reason")?,
            decided_at: row.try_get("decided_at")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }
}

#[async_trait]
impl GateRepository for PostgresGateRepository {
    async fn create(&self, record: &ApprovalGateRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO approval_gates (
                id, incident_id, phase, status, payload,
                approved_by, reason, decided_at, created_at, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(record.id.0)
        .bind(record.incident_id.0)
        .bind(record.phase.as_str())
        .bind(record.status.as_str())
        .bind(&record.payload)
        .bind(&record.approved_by)
        .bind(&record.reason)
        .bind(record.decided_at)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: GateId) -> Result<Option<ApprovalGateRecord>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM approval_gates WHERE id = $1", COLUMNS))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::from_row).transpose()
    }

    async fn find_open_for_incident(
        &self,
        incident_id: IncidentId,
        now: DateTime<Utc>,
    ) -> Result<Option<ApprovalGateRecord>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM approval_gates \
             WHERE incident_id = $1 AND status = 'PENDING' AND expires_at > $2 \
             ORDER BY created_at DESC LIMIT 1",
            COLUMNS
        ))
        .bind(incident_id.0)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::from_row).transpose()
    }

    async fn record_decision(
        &self,
        id: GateId,
        status: GateStatus,
        decided_by: Option<String>,
        reason: Option<String>,
        decided_at: DateTime<Utc>,
    ) -> Result<Option<ApprovalGateRecord>, RepositoryError> {
        let row = sqlx::query(&format!(
            "UPDATE approval_gates \
             SET status = $2, approved_by = $3, reason = $4, decided_at = $5 \
             WHERE id = $1 AND status = 'PENDING' AND expires_at > $5 \
             RETURNING {}",
            COLUMNS
        ))
        .bind(id.0)
        .bind(status.as_str())
        .bind(decided_by)
        .bind(reason)
        .bind(decided_at)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::from_row).transpose()
    }

    async fn list_pending(&self, now: DateTime<Utc>) -> Result<Vec<ApprovalGateRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM approval_gates \
             WHERE status = 'PENDING' AND expires_at > $1 \
             ORDER BY created_at ASC",
            COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::from_row).collect()
    }
}
