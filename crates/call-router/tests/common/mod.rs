//! Shared test fixtures: recording fakes for the collaborators

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rvoip_call_router::prelude::*;

/// Requests received by [`FakeMedia`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaOp {
    StartConference(ConferenceId),
    CreateParticipant {
        conference: ConferenceId,
        participant: ParticipantId,
    },
    Subscribe {
        conference: ConferenceId,
        participant: ParticipantId,
        stream: StreamId,
    },
    EndConference(ConferenceId),
}

/// Requests received by [`FakeTelephony`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelephonyOp {
    Answer {
        call: CallId,
        conference: ConferenceId,
        participant: ParticipantId,
    },
    Hold(CallId),
    Redirect {
        call: CallId,
        conference: ConferenceId,
        participant: ParticipantId,
    },
    Terminate(CallId),
}

#[derive(Default)]
pub struct FakeMedia {
    next_id: AtomicUsize,
    ops: Mutex<Vec<MediaOp>>,
    fail_participants: Mutex<bool>,
}

impl FakeMedia {
    pub fn ops(&self) -> Vec<MediaOp> {
        self.ops.lock().clone()
    }

    pub fn clear(&self) {
        self.ops.lock().clear();
    }

    pub fn fail_participants(&self, fail: bool) {
        *self.fail_participants.lock() = fail;
    }

    pub fn ended_conferences(&self) -> Vec<ConferenceId> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                MediaOp::EndConference(conference) => Some(conference),
                _ => None,
            })
            .collect()
    }

    fn next(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl MediaConferencing for FakeMedia {
    async fn start_conference(&self) -> Result<ConferenceId> {
        let conference = ConferenceId::from(self.next("conf"));
        self.ops.lock().push(MediaOp::StartConference(conference.clone()));
        Ok(conference)
    }

    async fn create_participant(&self, conference: &ConferenceId) -> Result<ParticipantId> {
        if *self.fail_participants.lock() {
            return Err(CallRouterError::conference("participant limit reached"));
        }
        let participant = ParticipantId::from(self.next("part"));
        self.ops.lock().push(MediaOp::CreateParticipant {
            conference: conference.clone(),
            participant: participant.clone(),
        });
        Ok(participant)
    }

    async fn subscribe(
        &self,
        conference: &ConferenceId,
        participant: &ParticipantId,
        stream: &StreamId,
    ) -> Result<()> {
        self.ops.lock().push(MediaOp::Subscribe {
            conference: conference.clone(),
            participant: participant.clone(),
            stream: stream.clone(),
        });
        Ok(())
    }

    async fn end_conference(&self, conference: &ConferenceId) -> Result<()> {
        self.ops.lock().push(MediaOp::EndConference(conference.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeTelephony {
    ops: Mutex<Vec<TelephonyOp>>,
    fail_bridges: Mutex<bool>,
    hold_delay: Mutex<Option<Duration>>,
}

impl FakeTelephony {
    pub fn ops(&self) -> Vec<TelephonyOp> {
        self.ops.lock().clone()
    }

    pub fn clear(&self) {
        self.ops.lock().clear();
    }

    /// Make answer and redirect requests fail
    pub fn fail_bridges(&self, fail: bool) {
        *self.fail_bridges.lock() = fail;
    }

    /// Delay every hold request before it is recorded
    pub fn slow_hold(&self, delay: Duration) {
        *self.hold_delay.lock() = Some(delay);
    }

    fn bridge(&self, op: TelephonyOp) -> Result<()> {
        if *self.fail_bridges.lock() {
            return Err(CallRouterError::telephony("gateway rejected the request"));
        }
        self.ops.lock().push(op);
        Ok(())
    }
}

#[async_trait]
impl TelephonyGateway for FakeTelephony {
    async fn answer(
        &self,
        call: &CallId,
        conference: &ConferenceId,
        participant: &ParticipantId,
    ) -> Result<()> {
        self.bridge(TelephonyOp::Answer {
            call: call.clone(),
            conference: conference.clone(),
            participant: participant.clone(),
        })
    }

    async fn hold(&self, call: &CallId) -> Result<()> {
        let delay = *self.hold_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.ops.lock().push(TelephonyOp::Hold(call.clone()));
        Ok(())
    }

    async fn redirect_to_conference(
        &self,
        call: &CallId,
        conference: &ConferenceId,
        participant: &ParticipantId,
    ) -> Result<()> {
        self.bridge(TelephonyOp::Redirect {
            call: call.clone(),
            conference: conference.clone(),
            participant: participant.clone(),
        })
    }

    async fn terminate(&self, call: &CallId) -> Result<()> {
        self.ops.lock().push(TelephonyOp::Terminate(call.clone()));
        Ok(())
    }
}

/// A router wired to recording fakes
pub struct TestRouter {
    pub router: CallRouter,
    pub media: Arc<FakeMedia>,
    pub telephony: Arc<FakeTelephony>,
}

/// An agent that finished coming online
#[derive(Debug, Clone)]
pub struct OnlineAgent {
    pub id: AgentId,
    pub conference: ConferenceId,
    pub participant: ParticipantId,
    pub stream: StreamId,
}

impl TestRouter {
    pub fn new() -> Self {
        let mut config = RouterConfig::default();
        config.general.device_websocket_url = Some("wss://media.example.com/device".to_string());
        Self::with_config(config)
    }

    pub fn with_config(config: RouterConfig) -> Self {
        let media = Arc::new(FakeMedia::default());
        let telephony = Arc::new(FakeTelephony::default());
        let router = CallRouter::new(config, media.clone(), telephony.clone());
        Self {
            router,
            media,
            telephony,
        }
    }

    /// Register, bring online and publish audio for an agent
    pub async fn online_agent(&self, name: &str) -> OnlineAgent {
        let id = AgentId::from(name);
        self.router.add_agent(id.clone());
        let session = self.router.bring_online(&id).await.expect("bring online");
        let stream = StreamId::from(format!("stream-{}", name));
        self.router
            .handle_media_event(MediaEvent::ParticipantPublished {
                conference: session.conference.clone(),
                participant: session.participant.clone(),
                stream: stream.clone(),
            })
            .await
            .expect("publish");
        OnlineAgent {
            id,
            conference: session.conference,
            participant: session.participant,
            stream,
        }
    }

    /// The caller-side participant most recently bridged into `conference`, if any
    pub fn bridged_participant(&self, conference: &ConferenceId) -> Option<ParticipantId> {
        self.telephony.ops().into_iter().rev().find_map(|op| match op {
            TelephonyOp::Answer {
                conference: c,
                participant,
                ..
            }
            | TelephonyOp::Redirect {
                conference: c,
                participant,
                ..
            } if &c == conference => Some(participant),
            _ => None,
        })
    }

    pub fn caller_participant(&self, conference: &ConferenceId) -> ParticipantId {
        self.bridged_participant(conference)
            .expect("no caller bridged into conference")
    }

    /// The caller leg shows up in the agent's conference
    pub async fn caller_joins(&self, agent: &OnlineAgent) -> ParticipantId {
        let participant = self.caller_participant(&agent.conference);
        self.router
            .handle_media_event(MediaEvent::ParticipantJoined {
                conference: agent.conference.clone(),
                participant: participant.clone(),
            })
            .await
            .expect("join");
        participant
    }
}

/// Wait for the next router event, failing after a second
pub async fn next_event(events: &mut RouterEventSubscriber) -> RouterEvent {
    tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("timed out waiting for router event")
        .expect("event bus closed")
}

/// Wait until a matching router event arrives
pub async fn wait_for<F>(events: &mut RouterEventSubscriber, mut matches: F) -> RouterEvent
where
    F: FnMut(&RouterEvent) -> bool,
{
    loop {
        let event = next_event(events).await;
        if matches(&event) {
            return event;
        }
    }
}
