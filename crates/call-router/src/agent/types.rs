//! Agent record

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{AgentId, AgentState, CallId, ConferenceId, ParticipantId, StreamId};

/// An agent and its browser media session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    /// Conference the agent's browser session occupies
    pub conference: Option<ConferenceId>,
    /// The agent's own participant in that conference
    pub participant: Option<ParticipantId>,
    /// The agent's published audio stream
    pub stream: Option<StreamId>,
    /// Call currently bridged to this agent
    pub active_call: Option<CallId>,
    /// Caller legs in the conference and the call each one carries
    pub call_participants: HashMap<ParticipantId, CallId>,
}

impl Agent {
    pub fn new(id: AgentId) -> Self {
        Self {
            id,
            conference: None,
            participant: None,
            stream: None,
            active_call: None,
            call_participants: HashMap::new(),
        }
    }

    pub fn state(&self) -> AgentState {
        match (&self.conference, &self.participant, &self.stream, &self.active_call) {
            (Some(_), Some(_), Some(_), Some(_)) => AgentState::Busy,
            (Some(_), Some(_), Some(_), None) => AgentState::Available,
            (Some(_), Some(_), None, _) => AgentState::Connecting,
            _ => AgentState::Offline,
        }
    }

    /// Connected with a published stream and no call
    pub fn is_available(&self) -> bool {
        self.state() == AgentState::Available
    }

    pub fn is_own_participant(&self, participant: &ParticipantId) -> bool {
        self.participant.as_ref() == Some(participant)
    }

    /// Drop every media and call field, returning the call that was active
    pub(crate) fn disconnect(&mut self) -> Option<CallId> {
        self.conference = None;
        self.participant = None;
        self.stream = None;
        self.call_participants.clear();
        self.active_call.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected_agent() -> Agent {
        let mut agent = Agent::new(AgentId::from("a"));
        agent.conference = Some(ConferenceId::from("conf"));
        agent.participant = Some(ParticipantId::from("p-agent"));
        agent
    }

    #[test]
    fn test_state_follows_fields() {
        let mut agent = Agent::new(AgentId::from("a"));
        assert_eq!(agent.state(), AgentState::Offline);

        agent = connected_agent();
        assert_eq!(agent.state(), AgentState::Connecting);

        agent.stream = Some(StreamId::from("s"));
        assert_eq!(agent.state(), AgentState::Available);
        assert!(agent.is_available());

        agent.active_call = Some(CallId::from("c1"));
        assert_eq!(agent.state(), AgentState::Busy);
        assert!(!agent.is_available());
    }

    #[test]
    fn test_disconnect_clears_everything() {
        let mut agent = connected_agent();
        agent.stream = Some(StreamId::from("s"));
        agent.active_call = Some(CallId::from("c1"));
        agent.call_participants.insert(ParticipantId::from("p-call"), CallId::from("c1"));

        assert_eq!(agent.disconnect(), Some(CallId::from("c1")));
        assert_eq!(agent, Agent::new(AgentId::from("a")));
    }
}
