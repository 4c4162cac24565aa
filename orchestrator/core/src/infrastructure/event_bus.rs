// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus - fan-out of remediation events
//
// Every event a run yields is also published here so dashboards can follow
// all runs live. In-memory only; subscribers that fall behind lose the
// oldest events.

use crate::domain::events::AgentEvent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

/// An agent event tagged with the run that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub run_id: Uuid,
    pub scope: String,
    #[serde(flatten)]
    pub event: AgentEvent,
}

#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<RunEvent>>,
}

impl EventBus {
    /// Capacity is how many events are buffered before the oldest are dropped.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish(&self, event: RunEvent) {
        debug!(run_id = %event.run_id, event = %event.event.label(), "Publishing event");
        if self.sender.send(event).is_err() {
            debug!("No subscribers listening to event");
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
            run_id: None,
        }
    }

    /// Subscribe to the events of a single run.
    pub fn subscribe_run(&self, run_id: Uuid) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
            run_id: Some(run_id),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

pub struct EventReceiver {
    receiver: broadcast::Receiver<RunEvent>,
    run_id: Option<Uuid>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<RunEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(|e| match e {
                broadcast::error::RecvError::Closed => EventBusError::Closed,
                broadcast::error::RecvError::Lagged(n) => {
                    warn!("Event receiver lagged by {} events", n);
                    EventBusError::Lagged(n)
                }
            })?;

            match self.run_id {
                Some(id) if id != event.run_id => continue,
                _ => return Ok(event),
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}
