// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP client for a running `warden serve`.

use anyhow::{anyhow, Context, Result};
use futures::stream::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use warden_core::domain::gate::{ApprovalGateRecord, DecisionAck, GateDecision};
use warden_core::infrastructure::event_bus::RunEvent;

pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return response.json().await.context("Malformed response body");
        }
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("no details");
        let kind = body.get("error").and_then(Value::as_str).unwrap_or("error");
        Err(anyhow!("{} ({}): {}", status, kind, message))
    }

    pub async fn health(&self) -> Result<Value> {
        let response = self
            .http
            .get(self.url("/health"))
            .send()
            .await
            .with_context(|| format!("Server unreachable at {}", self.base_url))?;
        Self::decode(response).await
    }

    pub async fn list_gates(&self) -> Result<Vec<ApprovalGateRecord>> {
        let response = self.http.get(self.url("/api/gates")).send().await?;
        Self::decode(response).await
    }

    pub async fn get_gate(&self, id: &str) -> Result<ApprovalGateRecord> {
        let response = self
            .http
            .get(self.url(&format!("/api/gates/{}", id)))
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn decide(&self, id: &str, decision: &GateDecision) -> Result<DecisionAck> {
        let response = self
            .http
            .post(self.url(&format!("/api/gates/{}/decision", id)))
            .json(decision)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Start a run and follow its SSE stream until the server closes it.
    pub async fn run(&self, scope: &str) -> Result<impl Stream<Item = Result<RunEvent>>> {
        let response = self
            .http
            .post(self.url("/api/runs"))
            .json(&serde_json::json!({ "scope": scope }))
            .send()
            .await
            .with_context(|| format!("Server unreachable at {}", self.base_url))?;
        if !response.status().is_success() {
            return Err(anyhow!("Run request failed: {}", response.status()));
        }

        let bytes = Box::pin(response.bytes_stream());
        Ok(futures::stream::unfold(
            (bytes, Vec::new()),
            |(mut bytes, mut buffer)| async move {
                loop {
                    if let Some(frame) = take_sse_frame(&mut buffer) {
                        let Some(data) = frame else {
                            continue;
                        };
                        let event = serde_json::from_str::<RunEvent>(&data)
                            .with_context(|| format!("Malformed run event: {}", data));
                        return Some((event, (bytes, buffer)));
                    }
                    match bytes.next().await {
                        Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                        Some(Err(e)) => {
                            return Some((Err(anyhow!("Run stream interrupted: {}", e)), (bytes, buffer)))
                        }
                        None => return None,
                    }
                }
            },
        ))
    }
}

/// Split the first complete SSE frame off `buffer`. The inner `None` is a
/// frame without data, such as a keep-alive comment.
pub fn take_sse_frame(buffer: &mut Vec<u8>) -> Option<Option<String>> {
    let end = buffer.windows(2).position(|w| w == b"\n\n")?;
    let frame: Vec<u8> = buffer.drain(..end + 2).collect();
    let frame = String::from_utf8_lossy(&frame);
    let data: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|d| d.strip_prefix(' ').unwrap_or(d))
        .collect();
    Some(if data.is_empty() {
        None
    } else {
        Some(data.join("\n"))
    })
}
