//! Orchestrator data types

use serde::{Deserialize, Serialize};

use super::lanes::Lane;
use crate::types::{AgentId, CallId, ConferenceId, ParticipantId, StreamId};

/// What a browser needs to join its conference after coming online
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineSession {
    pub agent: AgentId,
    pub conference: ConferenceId,
    pub participant: ParticipantId,
    /// WebRTC device endpoint, when configured
    pub websocket_url: Option<String>,
}

/// Point-in-time view of the router
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterStats {
    pub total_agents: usize,
    pub available_agents: usize,
    pub busy_agents: usize,
    pub connecting_agents: usize,
    pub queued_calls: usize,
    pub active_calls: usize,
}

/// Outbound collaborator request decided while the routing state was locked
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    /// Create a phone-side participant and answer the ringing call into it
    Answer {
        call: CallId,
        agent: AgentId,
        conference: ConferenceId,
    },
    /// Play the hold treatment
    Hold { call: CallId },
    /// Create a phone-side participant and move the held call into it
    Redirect {
        call: CallId,
        agent: AgentId,
        conference: ConferenceId,
    },
    Subscribe {
        conference: ConferenceId,
        participant: ParticipantId,
        stream: StreamId,
    },
    EndConference { conference: ConferenceId },
}

impl Action {
    /// Call and agent being bridged, for the two-step handshakes
    pub(crate) fn bridged_call(&self) -> Option<(&CallId, &AgentId)> {
        match self {
            Action::Answer { call, agent, .. } | Action::Redirect { call, agent, .. } => Some((call, agent)),
            _ => None,
        }
    }

    /// Requests touching the same call, or the same conference, keep their order
    pub(crate) fn lane(&self) -> Lane {
        match self {
            Action::Answer { call, .. } | Action::Hold { call } | Action::Redirect { call, .. } => {
                Lane::Call(call.clone())
            }
            Action::Subscribe { conference, .. } | Action::EndConference { conference } => {
                Lane::Conference(conference.clone())
            }
        }
    }
}
