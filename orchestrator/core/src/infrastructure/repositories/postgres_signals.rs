// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # PostgreSQL Signal Store
//!
//! Reads `signal_events`, `incidents` and `metric_readings`, and owns the
//! orchestrator's writes to `incidents`. Anything that records operational
//! signals (log shippers, alerting hooks) writes to the same tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use std::time::Duration;

use crate::domain::repository::{IncidentRepository, RepositoryError};
use crate::domain::signals::{
    IncidentId, IncidentRecord, IncidentSeverity, IncidentSource, IncidentStatus, SignalError,
    SignalEvent, SignalStore,
};

const SCHEMA: &str = include_str!("../../../migrations/0002_signals.sql");

/// Upper bound on events pulled per query.
const EVENT_LIMIT: i64 = 100;

pub struct PostgresSignalStore {
    pool: PgPool,
}

impl PostgresSignalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    fn incident_from_row(row: &PgRow) -> Result<IncidentRecord, RepositoryError> {
        let severity: String = row.try_get("severity")?;
        let status: String = row.try_get("status")?;
        let source: String = row.try_get("source")?;
        Ok(IncidentRecord {
            id: IncidentId(row.try_get("id")?),
            title: row.try_get("title")?,
            severity: severity
                .parse::<IncidentSeverity>()
                .map_err(RepositoryError::Serialization)?,
            status: status
                .parse::<IncidentStatus>()
                .map_err(RepositoryError::Serialization)?,
            impact: row.try_get("impact")?,
            source: source
                .parse::<IncidentSource>()
                .map_err(RepositoryError::Serialization)?,
            created_at: row.try_get("created_at")?,
            resolved_at: row.try_get("resolved_at")?,
        })
    }

    async fn active_incidents(&self) -> Result<Vec<IncidentRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, severity, status, impact, source, created_at, resolved_at
            FROM incidents
            WHERE status <> 'RESOLVED'
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::incident_from_row).collect()
    }
}

fn query_error(err: impl std::fmt::Display) -> SignalError {
    SignalError::Query(err.to_string())
}

#[async_trait]
impl SignalStore for PostgresSignalStore {
    async fn query_recent_events(&self, window: Duration) -> Result<Vec<SignalEvent>, SignalError> {
        let since = chrono::Duration::from_std(window)
            .ok()
            .and_then(|w| Utc::now().checked_sub_signed(w))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let rows = sqlx::query(
            r#"
            SELECT id, source, action, severity, message, occurred_at
            FROM signal_events
            WHERE occurred_at >= $1
            ORDER BY occurred_at DESC
            LIMIT $2
            "#,
        )
        .bind(since)
        .bind(EVENT_LIMIT)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SignalError::Unavailable(e.to_string()))?;

        rows.iter()
            .map(|row| {
                Ok(SignalEvent {
                    id: row.try_get("id").map_err(query_error)?,
                    source: row.try_get("source").map_err(query_error)?,
                    action: row.try_get("action").map_err(query_error)?,
                    severity: row.try_get("severity").map_err(query_error)?,
                    message: row.try_get("message").map_err(query_error)?,
                    timestamp: row.try_get("occurred_at").map_err(query_error)?,
                })
            })
            .collect()
    }

    async fn query_active_incidents(&self) -> Result<Vec<IncidentRecord>, SignalError> {
        self.active_incidents().await.map_err(query_error)
    }

    async fn read_metric(&self, name: &str) -> Result<Option<f64>, SignalError> {
        let value: Option<f64> = sqlx::query_scalar(
            r#"
            SELECT value FROM metric_readings
            WHERE name = $1
            ORDER BY recorded_at DESC
            LIMIT 1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SignalError::Unavailable(e.to_string()))?;
        Ok(value)
    }
}

#[async_trait]
impl IncidentRepository for PostgresSignalStore {
    async fn find_open(&self) -> Result<Option<IncidentRecord>, RepositoryError> {
        Ok(self.active_incidents().await?.into_iter().next())
    }

    async fn open(
        &self,
        title: &str,
        severity: IncidentSeverity,
        impact: &str,
    ) -> Result<IncidentRecord, RepositoryError> {
        let incident = IncidentRecord::open(title, severity, impact).opened_by_orchestrator();
        sqlx::query(
            r#"
            INSERT INTO incidents (id, title, severity, status, impact, source, created_at, resolved_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(incident.id.0)
        .bind(&incident.title)
        .bind(incident.severity.to_string())
        .bind(incident.status.as_str())
        .bind(&incident.impact)
        .bind(incident.source.as_str())
        .bind(incident.created_at)
        .bind(incident.resolved_at)
        .execute(&self.pool)
        .await?;
        Ok(incident)
    }

    async fn resolve(&self, id: IncidentId, resolved_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE incidents SET status = 'RESOLVED', resolved_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .bind(resolved_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("incident {}", id)));
        }
        Ok(())
    }
}
