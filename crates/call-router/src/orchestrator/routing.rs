//! Routing decisions
//!
//! Every method here runs with the routing state locked and never awaits. Each
//! one applies an inbound event to the registry and the queue, publishes the
//! resulting [`RouterEvent`]s and returns the collaborator requests to issue
//! once the lock is released.

use tracing::{debug, warn};

use super::types::{Action, RouterStats};
use crate::agent::{AgentRegistry, RegistryEffect};
use crate::collaborators::{MediaEvent, TelephonyEvent};
use crate::config::RouterConfig;
use crate::error::{CallRouterError, Result};
use crate::events::{EventBus, RouterEvent};
use crate::queue::{CallQueue, Placement};
use crate::types::{AgentId, AgentState, CallId, ConferenceId, ParticipantId};

/// Agents and calls, guarded together by the router's lock
#[derive(Debug)]
pub(crate) struct RouterState {
    pub(crate) agents: AgentRegistry,
    pub(crate) queue: CallQueue,
}

impl RouterState {
    pub(crate) fn new(config: &RouterConfig) -> Self {
        Self {
            agents: AgentRegistry::new(),
            queue: CallQueue::new(config.general.ended_call_retention),
        }
    }

    pub(crate) fn add_agent(&mut self, id: AgentId) {
        if let Some(previous) = self.agents.add_agent(id) {
            self.drop_call_silently(previous.active_call.as_ref());
        }
    }

    pub(crate) fn remove_agent(&mut self, id: &AgentId) -> bool {
        match self.agents.remove_agent(id) {
            Some(removed) => {
                self.drop_call_silently(removed.active_call.as_ref());
                true
            }
            None => false,
        }
    }

    /// Returns the conference of a session the agent had before, to be ended
    pub(crate) fn record_online(
        &mut self,
        id: &AgentId,
        conference: ConferenceId,
        participant: ParticipantId,
        bus: &EventBus,
    ) -> Result<Option<ConferenceId>> {
        let previous = self.agents.record_online(id, conference.clone(), participant)?;
        self.drop_call_silently(previous.dropped_call.as_ref());
        bus.publish(RouterEvent::AgentOnline {
            agent: id.clone(),
            conference,
        });
        Ok(previous.conference)
    }

    /// Returns the conference to end
    pub(crate) fn take_offline(&mut self, id: &AgentId, bus: &EventBus) -> Result<Option<ConferenceId>> {
        let disconnection = self.agents.take_offline(id)?;
        self.drop_call_silently(disconnection.dropped_call.as_ref());
        bus.publish(RouterEvent::AgentOffline { agent: id.clone() });
        Ok(disconnection.conference)
    }

    pub(crate) fn on_telephony_event(&mut self, event: TelephonyEvent, bus: &EventBus) -> Result<Vec<Action>> {
        match event {
            TelephonyEvent::IncomingCall { call } => self.on_incoming_call(call, bus),
            TelephonyEvent::CallEnded { call } => self.on_gateway_call_ended(call, bus),
        }
    }

    pub(crate) fn on_media_event(&mut self, event: MediaEvent, bus: &EventBus) -> Result<Vec<Action>> {
        let effects = match &event {
            MediaEvent::ParticipantJoined { conference, participant } => {
                self.agents.handle_participant_joined(conference, participant)
            }
            MediaEvent::ParticipantLeft { conference, participant } => {
                self.agents.handle_participant_left(conference, participant)
            }
            MediaEvent::ParticipantPublished {
                conference,
                participant,
                stream,
            } => self.agents.handle_participant_published(conference, participant, stream),
        };
        self.apply_effects(effects, bus)
    }

    pub(crate) fn on_incoming_call(&mut self, call: CallId, bus: &EventBus) -> Result<Vec<Action>> {
        match self.queue.connect_or_queue_call(&mut self.agents, call.clone())? {
            Placement::Answered { agent } => {
                let conference = agent
                    .conference
                    .ok_or_else(|| CallRouterError::AgentOffline(agent.id.clone()))?;
                bus.publish(RouterEvent::CallAnswered {
                    call: call.clone(),
                    agent: agent.id.clone(),
                });
                Ok(vec![Action::Answer {
                    call,
                    agent: agent.id,
                    conference,
                }])
            }
            Placement::Queued { position } => {
                bus.publish(RouterEvent::CallQueued {
                    call: call.clone(),
                    position,
                });
                Ok(vec![Action::Hold { call }])
            }
        }
    }

    /// The gateway's own disconnect signal
    pub(crate) fn on_gateway_call_ended(&mut self, call: CallId, bus: &EventBus) -> Result<Vec<Action>> {
        if self.queue.abandon_queued_call(&call) {
            bus.publish(RouterEvent::CallEnded { call, agent: None });
            return Ok(Vec::new());
        }

        let assigned = self.queue.get_assigned_agent(&call).cloned();
        let freed = self.queue.disconnect_call(&mut self.agents, &call)?;
        if let Some(agent) = assigned {
            bus.publish(RouterEvent::CallEnded {
                call,
                agent: Some(agent),
            });
        }

        match freed {
            Some(agent) => self.on_agent_available(&agent, bus),
            None => Ok(Vec::new()),
        }
    }

    /// Give the longest-waiting caller to the agent that just freed up
    pub(crate) fn on_agent_available(&mut self, agent: &AgentId, bus: &EventBus) -> Result<Vec<Action>> {
        bus.publish(RouterEvent::AgentAvailable { agent: agent.clone() });

        let Some(call) = self.queue.get_next_active_call_id(&mut self.agents)? else {
            return Ok(Vec::new());
        };
        let assigned = self
            .queue
            .get_assigned_agent(&call)
            .cloned()
            .ok_or_else(|| CallRouterError::internal(format!("dequeued call {} has no agent", call)))?;
        if &assigned != agent {
            debug!(call_id = %call, agent_id = %assigned, "dequeued call went to an earlier registered agent");
        }
        let conference = self
            .agents
            .get(&assigned)?
            .conference
            .clone()
            .ok_or_else(|| CallRouterError::AgentOffline(assigned.clone()))?;

        bus.publish(RouterEvent::CallDequeued {
            call: call.clone(),
            agent: assigned.clone(),
        });
        Ok(vec![Action::Redirect {
            call,
            agent: assigned,
            conference,
        }])
    }

    /// Undo the assignment of a call whose bridge handshake failed
    pub(crate) fn release_failed_bridge(
        &mut self,
        call: &CallId,
        agent: &AgentId,
        reason: &str,
        bus: &EventBus,
    ) -> Result<Vec<Action>> {
        bus.publish(RouterEvent::BridgeFailed {
            call: call.clone(),
            agent: agent.clone(),
            reason: reason.to_string(),
        });
        match self.queue.disconnect_call(&mut self.agents, call)? {
            Some(freed) => self.on_agent_available(&freed, bus),
            None => Ok(Vec::new()),
        }
    }

    pub(crate) fn stats(&self) -> RouterStats {
        RouterStats {
            total_agents: self.agents.len(),
            available_agents: self.agents.count_in_state(AgentState::Available),
            busy_agents: self.agents.count_in_state(AgentState::Busy),
            connecting_agents: self.agents.count_in_state(AgentState::Connecting),
            queued_calls: self.queue.queued_len(),
            active_calls: self.queue.active_len(),
        }
    }

    fn apply_effects(&mut self, effects: Vec<RegistryEffect>, bus: &EventBus) -> Result<Vec<Action>> {
        let mut actions = Vec::new();
        for effect in effects {
            match effect {
                RegistryEffect::AgentAvailable(agent) => {
                    actions.extend(self.on_agent_available(&agent, bus)?);
                }
                RegistryEffect::CallEnded { agent, call } => {
                    self.queue.mark_ended(&call);
                    bus.publish(RouterEvent::CallEnded {
                        call,
                        agent: Some(agent),
                    });
                }
                RegistryEffect::AgentDisconnected { agent, dropped_call } => {
                    self.drop_call_silently(dropped_call.as_ref());
                    bus.publish(RouterEvent::AgentOffline { agent });
                }
                RegistryEffect::Subscribe {
                    conference,
                    participant,
                    stream,
                } => actions.push(Action::Subscribe {
                    conference,
                    participant,
                    stream,
                }),
                RegistryEffect::EndConference(conference) => {
                    actions.push(Action::EndConference { conference });
                }
            }
        }
        Ok(actions)
    }

    /// Forget the routing entry of a call lost with its agent; no requeue, no event
    fn drop_call_silently(&mut self, call: Option<&CallId>) {
        if let Some(call) = call {
            warn!(call_id = %call, "dropping call together with its agent");
            self.queue.mark_ended(call);
        }
    }
}
