//! # Call Queue
//!
//! Keeps the routing state of every call in a single table and the FIFO order of
//! callers on hold. Agent selection is delegated to the [`AgentRegistry`] passed
//! into each operation; the queue never talks to a collaborator.

use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use tracing::{debug, info};

use crate::agent::{Agent, AgentRegistry};
use crate::error::{CallRouterError, Result};
use crate::types::{AgentId, CallId, CallState};

/// Outcome of placing an incoming call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Assigned to `agent`; the call should be answered into its conference
    Answered { agent: Agent },
    /// No agent free; the caller should hear the hold treatment
    Queued { position: usize },
}

/// Routing table for calls
#[derive(Debug)]
pub struct CallQueue {
    calls: HashMap<CallId, CallState>,
    waiting: VecDeque<CallId>,
    /// Ended calls, oldest first, bounded by `ended_retention`
    ended: VecDeque<CallId>,
    ended_retention: usize,
}

impl Default for CallQueue {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl CallQueue {
    /// Create a queue remembering at most `ended_retention` finished calls
    pub fn new(ended_retention: usize) -> Self {
        Self {
            calls: HashMap::new(),
            waiting: VecDeque::new(),
            ended: VecDeque::new(),
            ended_retention: ended_retention.max(1),
        }
    }

    /// Answer the call with the first available agent, or put it on hold
    ///
    /// A call that is still queued or assigned is rejected with
    /// [`CallRouterError::DuplicateCall`].
    pub fn connect_or_queue_call(&mut self, agents: &mut AgentRegistry, call: CallId) -> Result<Placement> {
        if matches!(
            self.calls.get(&call),
            Some(CallState::Queued { .. } | CallState::Assigned { .. })
        ) {
            return Err(CallRouterError::DuplicateCall(call));
        }

        let available = agents.get_available_agent().map(|agent| agent.id.clone());
        match available {
            Some(agent_id) => {
                self.assign(agents, &agent_id, call.clone())?;
                info!(call_id = %call, agent_id = %agent_id, "assigning call to agent");
                let agent = agents.get(&agent_id)?.clone();
                Ok(Placement::Answered { agent })
            }
            None => {
                self.forget_ended(&call);
                self.calls.insert(call.clone(), CallState::Queued { since: Utc::now() });
                self.waiting.push_back(call.clone());
                let position = self.waiting.len();
                info!(call_id = %call, position, "adding call to the queue");
                Ok(Placement::Queued { position })
            }
        }
    }

    /// Release an assigned call from its agent
    ///
    /// Returns the agent that was freed by this call. Calls that are queued,
    /// ended or unknown are left alone.
    pub fn disconnect_call(&mut self, agents: &mut AgentRegistry, call: &CallId) -> Result<Option<AgentId>> {
        let Some(agent_id) = self.get_assigned_agent(call).cloned() else {
            debug!(call_id = %call, "disconnect for call with no agent");
            return Ok(None);
        };

        self.mark_ended(call);
        match agents.unassign_call(&agent_id, call) {
            Ok(true) => Ok(Some(agent_id)),
            Ok(false) | Err(CallRouterError::AgentNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Remove a caller who hung up while still on hold
    ///
    /// Returns `true` if the call was waiting.
    pub fn abandon_queued_call(&mut self, call: &CallId) -> bool {
        if !self.calls.get(call).is_some_and(CallState::is_queued) {
            return false;
        }
        self.waiting.retain(|waiting| waiting != call);
        self.mark_ended(call);
        info!(call_id = %call, "caller abandoned the queue");
        true
    }

    pub fn get_assigned_agent(&self, call: &CallId) -> Option<&AgentId> {
        self.calls.get(call).and_then(CallState::assigned_agent)
    }

    /// Hand the longest-waiting call to the first available agent
    ///
    /// Does nothing and returns `None` when the queue is empty or no agent is
    /// available. Popping and assigning happen together.
    pub fn get_next_active_call_id(&mut self, agents: &mut AgentRegistry) -> Result<Option<CallId>> {
        let Some(call) = self.waiting.front().cloned() else {
            debug!("no other calls on the queue at this time");
            return Ok(None);
        };
        let Some(agent_id) = agents.get_available_agent().map(|agent| agent.id.clone()) else {
            return Ok(None);
        };

        self.assign(agents, &agent_id, call.clone())?;
        self.waiting.pop_front();
        info!(call_id = %call, agent_id = %agent_id, "new active call for agent");
        Ok(Some(call))
    }

    /// Mark a call ended without touching any agent
    ///
    /// Used when the agent side already let go of the call.
    pub fn mark_ended(&mut self, call: &CallId) -> Option<CallState> {
        let previous = self.calls.insert(call.clone(), CallState::Ended);
        if previous.as_ref().is_some_and(CallState::is_queued) {
            self.waiting.retain(|waiting| waiting != call);
        }
        if previous != Some(CallState::Ended) {
            self.ended.push_back(call.clone());
            while self.ended.len() > self.ended_retention {
                if let Some(oldest) = self.ended.pop_front() {
                    if self.calls.get(&oldest) == Some(&CallState::Ended) {
                        self.calls.remove(&oldest);
                    }
                }
            }
        }
        previous
    }

    /// Current state; unknown calls report [`CallState::Ended`]
    pub fn call_state(&self, call: &CallId) -> CallState {
        self.calls.get(call).cloned().unwrap_or(CallState::Ended)
    }

    /// Calls on hold, longest waiting first
    pub fn waiting_calls(&self) -> impl Iterator<Item = &CallId> {
        self.waiting.iter()
    }

    pub fn queued_len(&self) -> usize {
        self.waiting.len()
    }

    /// Calls currently assigned, with their agents
    pub fn active_calls(&self) -> impl Iterator<Item = (&CallId, &AgentId)> {
        self.calls
            .iter()
            .filter_map(|(call, state)| state.assigned_agent().map(|agent| (call, agent)))
    }

    pub fn active_len(&self) -> usize {
        self.active_calls().count()
    }

    fn assign(&mut self, agents: &mut AgentRegistry, agent_id: &AgentId, call: CallId) -> Result<()> {
        agents.assign_call(agent_id, call.clone())?;
        self.forget_ended(&call);
        self.calls.insert(
            call,
            CallState::Assigned {
                agent: agent_id.clone(),
                since: Utc::now(),
            },
        );
        Ok(())
    }

    /// A reused call id starts over
    fn forget_ended(&mut self, call: &CallId) {
        if self.calls.get(call) == Some(&CallState::Ended) {
            self.ended.retain(|ended| ended != call);
        }
    }
}
