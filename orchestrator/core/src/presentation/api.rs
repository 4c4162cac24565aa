// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP API
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Liveness |
//! | POST | `/api/runs` | Start a remediation run, streamed as SSE |
//! | GET | `/api/events` | Live SSE feed of every run's events |
//! | GET | `/api/gates` | Pending approval gates |
//! | GET | `/api/gates/{id}` | One approval gate |
//! | POST | `/api/gates/{id}/decision` | Approve or reject a pending gate |
//!
//! A run lives as long as its response stream: a client that disconnects
//! cancels the run at its current step.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::application::approval_gate::ApprovalService;
use crate::application::sre_agent::SreAgent;
use crate::domain::gate::{GateDecision, GateError, GateId};
use crate::infrastructure::event_bus::{EventBus, RunEvent};

pub struct AppState {
    pub agent: SreAgent,
    pub approvals: Arc<ApprovalService>,
    pub events: EventBus,
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/runs", post(start_run))
        .route("/api/events", get(stream_events))
        .route("/api/gates", get(list_gates))
        .route("/api/gates/{id}", get(get_gate))
        .route("/api/gates/{id}/decision", post(submit_decision))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct StartRunRequest {
    #[serde(default)]
    pub scope: Option<String>,
}

/// Error body: `{"error": <kind>, "message": <text>}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "bad_request",
            message: message.into(),
        }
    }
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        let (status, kind) = match &err {
            GateError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            GateError::AlreadyDecided { .. } => (StatusCode::CONFLICT, "already_decided"),
            GateError::AlreadyPending { .. } => (StatusCode::CONFLICT, "already_pending"),
            GateError::Expired(_) => (StatusCode::GONE, "expired"),
            GateError::Repository(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage"),
        };
        Self {
            status,
            kind,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "error": self.kind, "message": self.message })),
        )
            .into_response()
    }
}

fn parse_gate_id(raw: &str) -> Result<GateId, ApiError> {
    raw.parse::<GateId>()
        .map_err(|_| ApiError::bad_request(format!("'{}' is not a gate id", raw)))
}

fn sse_event(event: &RunEvent) -> Event {
    match Event::default().event(event.event.label()).json_data(event) {
        Ok(sse) => sse,
        Err(e) => Event::default().event("error").data(e.to_string()),
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn start_run(
    State(state): State<Arc<AppState>>,
    body: Option<Json<StartRunRequest>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let scope = body
        .and_then(|Json(req)| req.scope)
        .unwrap_or_else(|| "default".to_string());
    let run_id = Uuid::new_v4();
    info!(%run_id, scope = %scope, "Run requested over HTTP");

    let bus = state.events.clone();
    let stream = state.agent.run(scope.clone()).map(move |event| {
        let tagged = RunEvent {
            run_id,
            scope: scope.clone(),
            event,
        };
        let sse = sse_event(&tagged);
        bus.publish(tagged);
        Ok(sse)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut receiver = state.events.subscribe();
    let stream = async_stream::stream! {
        loop {
            match receiver.recv().await {
                Ok(event) => yield Ok(sse_event(&event)),
                Err(crate::infrastructure::event_bus::EventBusError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn list_gates(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let pending = state.approvals.list_pending().await?;
    Ok(Json(pending))
}

async fn get_gate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.approvals.get(parse_gate_id(&id)?).await?;
    Ok(Json(record))
}

async fn submit_decision(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(decision): Json<GateDecision>,
) -> Result<impl IntoResponse, ApiError> {
    let ack = state
        .approvals
        .submit_decision(parse_gate_id(&id)?, decision)
        .await?;
    Ok(Json(ack))
}
