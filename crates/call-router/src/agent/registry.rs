//! Agent registry
//!
//! Owns every known agent and its media session state. Media notifications are
//! ingested here and turned into [`RegistryEffect`]s for the router to act on;
//! the registry itself never calls a collaborator.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use super::types::Agent;
use crate::error::{CallRouterError, Result};
use crate::types::{AgentId, AgentState, CallId, ConferenceId, ParticipantId, StreamId};

/// What a disconnect left behind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Disconnection {
    /// Conference the agent occupied; the caller should end it
    pub conference: Option<ConferenceId>,
    /// Call that was bridged to the agent and is now dropped
    pub dropped_call: Option<CallId>,
}

/// Consequences of a media event, in the order they must be handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEffect {
    /// The agent may be able to take the next call
    AgentAvailable(AgentId),
    /// The caller leg carrying the agent's active call left the conference
    CallEnded { agent: AgentId, call: CallId },
    /// The agent's own leg left; its fields were reset
    AgentDisconnected { agent: AgentId, dropped_call: Option<CallId> },
    /// Ask the media service to route `stream` to `participant`
    Subscribe {
        conference: ConferenceId,
        participant: ParticipantId,
        stream: StreamId,
    },
    /// Ask the media service to end the conference
    EndConference(ConferenceId),
}

/// Registry of agents in registration order
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: IndexMap<AgentId, Agent>,
    conferences: HashMap<ConferenceId, AgentId>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent in the offline state
    ///
    /// Re-adding a known id resets it in place (it keeps its registration
    /// position) and returns the replaced record.
    pub fn add_agent(&mut self, id: AgentId) -> Option<Agent> {
        let previous = self.agents.insert(id.clone(), Agent::new(id.clone()));
        if let Some(conference) = previous.as_ref().and_then(|agent| agent.conference.as_ref()) {
            self.conferences.remove(conference);
        }
        debug!(agent_id = %id, replaced = previous.is_some(), "agent registered");
        previous
    }

    /// Remove an agent, returning its last record
    pub fn remove_agent(&mut self, id: &AgentId) -> Option<Agent> {
        let removed = self.agents.shift_remove(id);
        if let Some(conference) = removed.as_ref().and_then(|agent| agent.conference.as_ref()) {
            self.conferences.remove(conference);
        }
        if removed.is_some() {
            debug!(agent_id = %id, "agent removed");
        }
        removed
    }

    pub fn get(&self, id: &AgentId) -> Result<&Agent> {
        self.agents
            .get(id)
            .ok_or_else(|| CallRouterError::AgentNotFound(id.clone()))
    }

    pub fn contains(&self, id: &AgentId) -> bool {
        self.agents.contains_key(id)
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn count_in_state(&self, state: AgentState) -> usize {
        self.agents.values().filter(|agent| agent.state() == state).count()
    }

    /// Agent owning a conference
    pub fn agent_for_conference(&self, conference: &ConferenceId) -> Option<&AgentId> {
        self.conferences.get(conference)
    }

    /// Record the conference and participant created for an agent coming online
    ///
    /// Any previous session of the agent is discarded and reported back.
    pub fn record_online(
        &mut self,
        id: &AgentId,
        conference: ConferenceId,
        participant: ParticipantId,
    ) -> Result<Disconnection> {
        let agent = self
            .agents
            .get_mut(id)
            .ok_or_else(|| CallRouterError::AgentNotFound(id.clone()))?;

        let previous = Disconnection {
            conference: agent.conference.clone(),
            dropped_call: agent.disconnect(),
        };
        if let Some(old) = &previous.conference {
            self.conferences.remove(old);
        }

        agent.conference = Some(conference.clone());
        agent.participant = Some(participant);
        self.conferences.insert(conference.clone(), id.clone());

        info!(agent_id = %id, conference = %conference, "agent connecting");
        Ok(previous)
    }

    /// Reset an agent to offline
    ///
    /// The active call, if any, is dropped without notification.
    pub fn take_offline(&mut self, id: &AgentId) -> Result<Disconnection> {
        let agent = self
            .agents
            .get_mut(id)
            .ok_or_else(|| CallRouterError::AgentNotFound(id.clone()))?;

        let disconnection = Disconnection {
            conference: agent.conference.clone(),
            dropped_call: agent.disconnect(),
        };
        if let Some(conference) = &disconnection.conference {
            self.conferences.remove(conference);
        }

        info!(agent_id = %id, dropped_call = ?disconnection.dropped_call, "agent offline");
        Ok(disconnection)
    }

    /// First agent, in registration order, that can take a call
    pub fn get_available_agent(&self) -> Option<&Agent> {
        // No fairness between agents: the earliest registered free agent wins.
        self.agents.values().find(|agent| agent.is_available())
    }

    /// Bind a call to an agent
    ///
    /// Fails with [`CallRouterError::AgentOffline`] unless the agent is
    /// available or busy. Double assignment is not checked here; the call
    /// queue only assigns to agents returned by [`Self::get_available_agent`].
    pub fn assign_call(&mut self, id: &AgentId, call: CallId) -> Result<()> {
        let agent = self
            .agents
            .get_mut(id)
            .ok_or_else(|| CallRouterError::AgentNotFound(id.clone()))?;

        match agent.state() {
            AgentState::Available | AgentState::Busy => {
                debug!(agent_id = %id, call_id = %call, "call assigned");
                agent.active_call = Some(call);
                Ok(())
            }
            AgentState::Offline | AgentState::Connecting => Err(CallRouterError::AgentOffline(id.clone())),
        }
    }

    /// Release a call from an agent
    ///
    /// Returns `true` when the agent's active call was `call` and has been
    /// cleared, meaning the agent should be treated as available again. A
    /// mismatched call id is a no-op.
    pub fn unassign_call(&mut self, id: &AgentId, call: &CallId) -> Result<bool> {
        let agent = self
            .agents
            .get_mut(id)
            .ok_or_else(|| CallRouterError::AgentNotFound(id.clone()))?;

        if agent.active_call.as_ref() == Some(call) {
            agent.active_call = None;
            debug!(agent_id = %id, call_id = %call, "call unassigned");
            Ok(true)
        } else {
            debug!(agent_id = %id, call_id = %call, active = ?agent.active_call, "ignoring stale unassign");
            Ok(false)
        }
    }

    pub fn active_call_id(&self, id: &AgentId) -> Result<Option<CallId>> {
        Ok(self.get(id)?.active_call.clone())
    }

    /// A leg entered an agent's conference
    pub fn handle_participant_joined(
        &mut self,
        conference: &ConferenceId,
        participant: &ParticipantId,
    ) -> Vec<RegistryEffect> {
        let Some(agent) = self.agent_in_conference_mut(conference) else {
            return Vec::new();
        };
        if agent.is_own_participant(participant) {
            return Vec::new();
        }

        match (&agent.active_call, &agent.stream) {
            (Some(call), Some(stream)) => {
                debug!(agent_id = %agent.id, call_id = %call, participant = %participant, "caller leg joined");
                agent.call_participants.insert(participant.clone(), call.clone());
                vec![RegistryEffect::Subscribe {
                    conference: conference.clone(),
                    participant: participant.clone(),
                    stream: stream.clone(),
                }]
            }
            _ => {
                debug!(agent_id = %agent.id, participant = %participant, "leg joined with no active call");
                Vec::new()
            }
        }
    }

    /// A leg left an agent's conference
    pub fn handle_participant_left(
        &mut self,
        conference: &ConferenceId,
        participant: &ParticipantId,
    ) -> Vec<RegistryEffect> {
        let Some(agent) = self.agent_in_conference_mut(conference) else {
            return Vec::new();
        };

        if agent.is_own_participant(participant) {
            let agent_id = agent.id.clone();
            let dropped_call = agent.disconnect();
            self.conferences.remove(conference);
            warn!(agent_id = %agent_id, dropped_call = ?dropped_call, "agent left its conference");
            return vec![
                RegistryEffect::AgentDisconnected { agent: agent_id, dropped_call },
                RegistryEffect::EndConference(conference.clone()),
            ];
        }

        let Some(call) = agent.call_participants.remove(participant) else {
            return Vec::new();
        };
        if agent.active_call.as_ref() != Some(&call) {
            debug!(agent_id = %agent.id, call_id = %call, "stale caller leg left");
            return Vec::new();
        }

        agent.active_call = None;
        info!(agent_id = %agent.id, call_id = %call, "caller left the conference");
        vec![
            RegistryEffect::CallEnded { agent: agent.id.clone(), call },
            RegistryEffect::AgentAvailable(agent.id.clone()),
        ]
    }

    /// A leg published a stream in an agent's conference
    pub fn handle_participant_published(
        &mut self,
        conference: &ConferenceId,
        participant: &ParticipantId,
        stream: &StreamId,
    ) -> Vec<RegistryEffect> {
        let Some(agent) = self.agent_in_conference_mut(conference) else {
            return Vec::new();
        };

        if agent.is_own_participant(participant) {
            agent.stream = Some(stream.clone());
            info!(agent_id = %agent.id, stream = %stream, "agent stream published");
            return vec![RegistryEffect::AgentAvailable(agent.id.clone())];
        }

        match &agent.participant {
            Some(own) => vec![RegistryEffect::Subscribe {
                conference: conference.clone(),
                participant: own.clone(),
                stream: stream.clone(),
            }],
            None => Vec::new(),
        }
    }

    fn agent_in_conference_mut(&mut self, conference: &ConferenceId) -> Option<&mut Agent> {
        match self.conferences.get(conference) {
            Some(id) => self.agents.get_mut(id),
            None => {
                debug!(conference = %conference, "event for unknown conference");
                None
            }
        }
    }
}
