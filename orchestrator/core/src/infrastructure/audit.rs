// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Audit sinks.

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::domain::audit::{AuditRecord, AuditSink};

/// Emits each record as a structured `info!` event on the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn append(&self, record: AuditRecord) {
        match serde_json::to_string(&record) {
            Ok(json) => info!(target: "audit", kind = record.kind(), record = %json, "audit"),
            Err(e) => warn!(target: "audit", kind = record.kind(), error = %e, "Unserializable audit record"),
        }
    }
}

/// Forwards records to a bounded channel; drops them when the consumer lags.
#[derive(Clone)]
pub struct ChannelAuditSink {
    sender: mpsc::Sender<AuditRecord>,
}

impl ChannelAuditSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<AuditRecord>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl AuditSink for ChannelAuditSink {
    fn append(&self, record: AuditRecord) {
        if let Err(e) = self.sender.try_send(record) {
            let kind = match &e {
                mpsc::error::TrySendError::Full(r) | mpsc::error::TrySendError::Closed(r) => r.kind(),
            };
            warn!(kind, error = %e, "Audit record dropped");
        }
    }
}
