//! Call router core
//!
//! [`CallRouter`] owns the routing state and the collaborator handles. All
//! registry and queue mutations happen under one lock; collaborator requests
//! are issued after the lock is released.

use std::collections::VecDeque;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, info, info_span, warn, Instrument};

use super::lanes::{ActionLanes, Lane};
use super::routing::RouterState;
use super::types::{Action, OnlineSession, RouterStats};
use crate::agent::Agent;
use crate::collaborators::{inbound_channels, InboundReceivers, InboundSenders, MediaConferencing, TelephonyGateway};
use crate::config::RouterConfig;
use crate::error::{CallRouterError, Result};
use crate::events::{EventBus, RouterEventSubscriber};
use crate::types::{AgentId, CallId, CallState, ConferenceId};

/// Routes phone calls to WebRTC agents
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct CallRouter {
    state: Arc<Mutex<RouterState>>,
    media: Arc<dyn MediaConferencing>,
    telephony: Arc<dyn TelephonyGateway>,
    events: EventBus,
    lanes: Arc<ActionLanes>,
    config: Arc<RouterConfig>,
}

impl std::fmt::Debug for CallRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallRouter")
            .field("stats", &self.stats())
            .field("config", &self.config)
            .finish()
    }
}

impl CallRouter {
    pub fn new(
        config: RouterConfig,
        media: Arc<dyn MediaConferencing>,
        telephony: Arc<dyn TelephonyGateway>,
    ) -> Self {
        let events = EventBus::new(config.events.bus_capacity);
        Self {
            state: Arc::new(Mutex::new(RouterState::new(&config))),
            media,
            telephony,
            events,
            lanes: Arc::new(ActionLanes::default()),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Observe routing outcomes
    pub fn subscribe(&self) -> RouterEventSubscriber {
        self.events.subscribe()
    }

    /// Channels sized from configuration; hand the senders to the collaborator
    /// adapters and the receivers to [`CallRouter::run`]
    pub fn inbound_channels(&self) -> (InboundSenders, InboundReceivers) {
        inbound_channels(self.config.events.inbound_capacity)
    }

    // Agent administration

    /// Register a freshly generated agent identity
    pub fn login(&self) -> AgentId {
        let id = AgentId::new();
        self.add_agent(id.clone());
        info!(agent_id = %id, "agent logged in");
        id
    }

    /// Register an agent as offline; an existing registration is replaced
    pub fn add_agent(&self, id: AgentId) {
        debug!(agent_id = %id, "adding agent");
        self.state.lock().add_agent(id);
    }

    /// Forget an agent; its conference is left to whoever owns the session
    pub fn remove_agent(&self, id: &AgentId) -> bool {
        let removed = self.state.lock().remove_agent(id);
        if removed {
            debug!(agent_id = %id, "removed agent");
        }
        removed
    }

    /// Start a conference for the agent's browser and record the session
    ///
    /// The agent becomes available once its browser publishes audio.
    pub async fn bring_online(&self, id: &AgentId) -> Result<OnlineSession> {
        self.connect_agent(id)
            .instrument(info_span!("bring_online", agent_id = %id))
            .await
    }

    async fn connect_agent(&self, id: &AgentId) -> Result<OnlineSession> {
        let known = self.state.lock().agents.contains(id);
        if !known {
            return Err(CallRouterError::AgentNotFound(id.clone()));
        }

        let conference = self.media.start_conference().await?;
        let participant = match self.media.create_participant(&conference).await {
            Ok(participant) => participant,
            Err(e) => {
                self.end_conference_quietly(&conference).await;
                return Err(e);
            }
        };

        let recorded = self
            .state
            .lock()
            .record_online(id, conference.clone(), participant.clone(), &self.events);
        match recorded {
            Ok(Some(previous)) => self.end_conference_quietly(&previous).await,
            Ok(None) => {}
            Err(e) => {
                self.end_conference_quietly(&conference).await;
                return Err(e);
            }
        }

        info!(conference_id = %conference, "agent is connecting");
        Ok(OnlineSession {
            agent: id.clone(),
            conference,
            participant,
            websocket_url: self.config.general.device_websocket_url.clone(),
        })
    }

    /// Drop the agent's session and end its conference
    ///
    /// A call bridged to the agent is dropped with it and not requeued.
    pub async fn take_offline(&self, id: &AgentId) -> Result<()> {
        let conference = self.state.lock().take_offline(id, &self.events)?;
        info!(agent_id = %id, "agent went offline");
        if let Some(conference) = conference {
            self.media.end_conference(&conference).await?;
        }
        Ok(())
    }

    /// Terminate the agent's current call, returning it
    pub async fn hangup(&self, id: &AgentId) -> Result<Option<CallId>> {
        let call = self.get_active_call_id(id)?;
        match &call {
            Some(call) => {
                info!(agent_id = %id, call_id = %call, "agent hung up");
                self.telephony.terminate(call).await?;
            }
            None => debug!(agent_id = %id, "hangup without an active call"),
        }
        Ok(call)
    }

    // Queries

    pub fn get_active_call_id(&self, id: &AgentId) -> Result<Option<CallId>> {
        self.state.lock().agents.active_call_id(id)
    }

    pub fn get_assigned_agent(&self, call: &CallId) -> Option<AgentId> {
        self.state.lock().queue.get_assigned_agent(call).cloned()
    }

    pub fn call_state(&self, call: &CallId) -> CallState {
        self.state.lock().queue.call_state(call)
    }

    pub fn agent(&self, id: &AgentId) -> Result<Agent> {
        self.state.lock().agents.get(id).cloned()
    }

    /// Agents in registration order
    pub fn agents(&self) -> Vec<Agent> {
        self.state.lock().agents.agents().cloned().collect()
    }

    /// Held calls, longest-waiting first
    pub fn waiting_calls(&self) -> Vec<CallId> {
        self.state.lock().queue.waiting_calls().cloned().collect()
    }

    pub fn stats(&self) -> RouterStats {
        self.state.lock().stats()
    }

    // Execution

    /// Run a routing decision against the locked state
    pub(crate) fn plan<F>(&self, decide: F) -> Result<Vec<Action>>
    where
        F: FnOnce(&mut RouterState, &EventBus) -> Result<Vec<Action>>,
    {
        let mut state = self.state.lock();
        decide(&mut state, &self.events)
    }

    /// Issue collaborator requests in order
    ///
    /// A failed answer or redirect releases the agent, terminates the call and
    /// appends whatever the release dispatches. The first failure is returned
    /// after everything has been attempted.
    pub(crate) async fn execute(&self, actions: Vec<Action>) -> Result<()> {
        let mut pending: VecDeque<Action> = actions.into();
        let mut first_error = None;

        while let Some(action) = pending.pop_front() {
            let Err(e) = self.perform(&action).await else {
                continue;
            };
            warn!(?action, error = %e, "collaborator request failed");
            if let Some((call, agent)) = action.bridged_call() {
                pending.extend(self.compensate_failed_bridge(call, agent, &e).await);
            }
            first_error.get_or_insert(e);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Hand collaborator requests to their lanes without waiting for them
    ///
    /// Requests for one call, or one conference, keep their relative order
    /// across dispatches.
    pub(crate) fn dispatch(&self, actions: Vec<Action>) {
        let mut by_lane: IndexMap<Lane, Vec<Action>> = IndexMap::new();
        for action in actions {
            by_lane.entry(action.lane()).or_default().push(action);
        }
        for (lane, actions) in by_lane {
            let router = self.clone();
            self.lanes
                .chain(lane, async move { router.execute_in_lane(actions).await }.in_current_span());
        }
    }

    async fn execute_in_lane(&self, actions: Vec<Action>) {
        for action in actions {
            let Err(e) = self.perform(&action).await else {
                continue;
            };
            warn!(?action, error = %e, "collaborator request failed");
            if let Some((call, agent)) = action.bridged_call() {
                let follow_up = self.compensate_failed_bridge(call, agent, &e).await;
                self.dispatch(follow_up);
            }
        }
    }

    async fn perform(&self, action: &Action) -> Result<()> {
        match action {
            Action::Answer {
                call, conference, ..
            } => {
                let participant = self.media.create_participant(conference).await?;
                debug!(call_id = %call, participant_id = %participant, "answering call");
                self.telephony.answer(call, conference, &participant).await
            }
            Action::Hold { call } => {
                debug!(call_id = %call, "holding call");
                self.telephony.hold(call).await
            }
            Action::Redirect {
                call, conference, ..
            } => {
                let participant = self.media.create_participant(conference).await?;
                debug!(call_id = %call, participant_id = %participant, "redirecting held call");
                self.telephony
                    .redirect_to_conference(call, conference, &participant)
                    .await
            }
            Action::Subscribe {
                conference,
                participant,
                stream,
            } => self.media.subscribe(conference, participant, stream).await,
            Action::EndConference { conference } => self.media.end_conference(conference).await,
        }
    }

    async fn compensate_failed_bridge(
        &self,
        call: &CallId,
        agent: &AgentId,
        error: &CallRouterError,
    ) -> Vec<Action> {
        let released = self.plan(|state, bus| state.release_failed_bridge(call, agent, &error.to_string(), bus));
        if let Err(e) = self.telephony.terminate(call).await {
            warn!(call_id = %call, error = %e, "failed to terminate call after bridge failure");
        }
        released.unwrap_or_else(|e| {
            warn!(call_id = %call, error = %e, "failed to release agent after bridge failure");
            Vec::new()
        })
    }

    async fn end_conference_quietly(&self, conference: &ConferenceId) {
        if let Err(e) = self.media.end_conference(conference).await {
            warn!(conference_id = %conference, error = %e, "failed to end conference");
        }
    }
}
