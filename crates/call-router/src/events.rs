//! Router event bus
//!
//! Every routing decision is published as a [`RouterEvent`] on a
//! `tokio::sync::broadcast` channel, in the order the decisions are made.
//! Any number of observers (API layers, dashboards, tests) can subscribe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::{CallRouterError, Result};
use crate::types::{AgentId, CallId, ConferenceId};

/// Routing decisions and agent transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouterEvent {
    /// Conference and own participant created for the agent
    AgentOnline { agent: AgentId, conference: ConferenceId },

    /// The agent can take a call
    AgentAvailable { agent: AgentId },

    /// The agent's media session is gone
    AgentOffline { agent: AgentId },

    /// An incoming call went straight to an agent
    CallAnswered { call: CallId, agent: AgentId },

    /// No agent was free; the caller is on hold at `position` (1-based)
    CallQueued { call: CallId, position: usize },

    /// A held caller was taken off the queue and handed to an agent
    CallDequeued { call: CallId, agent: AgentId },

    /// The call is over. `agent` is set when it was bridged to one.
    CallEnded { call: CallId, agent: Option<AgentId> },

    /// Connecting the call into the agent's conference failed
    BridgeFailed { call: CallId, agent: AgentId, reason: String },
}

/// Event with its publication time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub event: RouterEvent,
    pub published_at: DateTime<Utc>,
}

impl TimestampedEvent {
    /// Wire form for observers outside the process
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| CallRouterError::EventBus(format!("failed to encode event: {}", e)))
    }
}

/// Publisher side of the router event bus
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TimestampedEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: RouterEvent) {
        tracing::trace!(?event, "publishing router event");
        let stamped = TimestampedEvent {
            event,
            published_at: Utc::now(),
        };
        let _ = self.sender.send(stamped);
    }

    pub fn subscribe(&self) -> RouterEventSubscriber {
        RouterEventSubscriber::new(self.sender.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Subscriber wrapper for router events
pub struct RouterEventSubscriber {
    receiver: broadcast::Receiver<TimestampedEvent>,
}

impl RouterEventSubscriber {
    pub fn new(receiver: broadcast::Receiver<TimestampedEvent>) -> Self {
        Self { receiver }
    }

    /// Receive the next event
    pub async fn recv(&mut self) -> Result<RouterEvent> {
        self.recv_timestamped().await.map(|stamped| stamped.event)
    }

    pub async fn recv_timestamped(&mut self) -> Result<TimestampedEvent> {
        self.receiver
            .recv()
            .await
            .map_err(|e| CallRouterError::EventBus(format!("Failed to receive event: {}", e)))
    }

    /// Receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<RouterEvent>> {
        match self.receiver.try_recv() {
            Ok(stamped) => Ok(Some(stamped.event)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(e) => Err(CallRouterError::EventBus(format!("Failed to try receive event: {}", e))),
        }
    }

    /// Everything published so far that has not been received yet
    pub fn drain(&mut self) -> Result<Vec<RouterEvent>> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv()? {
            events.push(event);
        }
        Ok(events)
    }
}
