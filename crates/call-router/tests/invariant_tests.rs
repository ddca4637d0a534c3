//! Property tests: random event sequences driven through the router

mod common;

use std::collections::HashSet;

use common::TestRouter;
use proptest::prelude::*;
use rvoip_call_router::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    AddAgent(u8),
    BringOnline(u8),
    Publish(u8),
    CallerJoins(u8),
    CallerLeaves(u8),
    AgentLeaves(u8),
    TakeOffline(u8),
    Hangup(u8),
    Incoming(u8),
    GatewayEnded(u8),
    FailBridges(bool),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        1 => (0..4u8).prop_map(Op::AddAgent),
        1 => (0..4u8).prop_map(Op::BringOnline),
        2 => (0..4u8).prop_map(Op::Publish),
        2 => (0..4u8).prop_map(Op::CallerJoins),
        1 => (0..4u8).prop_map(Op::CallerLeaves),
        1 => (0..4u8).prop_map(Op::AgentLeaves),
        1 => (0..4u8).prop_map(Op::TakeOffline),
        1 => (0..4u8).prop_map(Op::Hangup),
        3 => (0..8u8).prop_map(Op::Incoming),
        2 => (0..8u8).prop_map(Op::GatewayEnded),
        1 => any::<bool>().prop_map(Op::FailBridges),
    ]
}

fn agent(n: u8) -> AgentId {
    AgentId::from(format!("agent-{}", n))
}

fn call(n: u8) -> CallId {
    CallId::from(format!("call-{}", n))
}

/// Conference and own participant of an agent that has a session
fn session(t: &TestRouter, n: u8) -> Option<(ConferenceId, ParticipantId)> {
    let record = t.router.agent(&agent(n)).ok()?;
    Some((record.conference?, record.participant?))
}

async fn apply(t: &TestRouter, op: &Op) {
    // rejected operations are part of the sequence; only the state afterwards matters
    match op {
        Op::AddAgent(n) => t.router.add_agent(agent(*n)),
        Op::BringOnline(n) => {
            let _ = t.router.bring_online(&agent(*n)).await;
        }
        Op::Publish(n) => {
            if let Some((conference, participant)) = session(t, *n) {
                let _ = t
                    .router
                    .handle_media_event(MediaEvent::ParticipantPublished {
                        conference,
                        participant,
                        stream: StreamId::from(format!("stream-{}", n)),
                    })
                    .await;
            }
        }
        Op::CallerJoins(n) | Op::CallerLeaves(n) => {
            let Some((conference, _)) = session(t, *n) else {
                return;
            };
            let Some(participant) = t.bridged_participant(&conference) else {
                return;
            };
            let event = if matches!(op, Op::CallerJoins(_)) {
                MediaEvent::ParticipantJoined { conference, participant }
            } else {
                MediaEvent::ParticipantLeft { conference, participant }
            };
            let _ = t.router.handle_media_event(event).await;
        }
        Op::AgentLeaves(n) => {
            if let Some((conference, participant)) = session(t, *n) {
                let _ = t
                    .router
                    .handle_media_event(MediaEvent::ParticipantLeft { conference, participant })
                    .await;
            }
        }
        Op::TakeOffline(n) => {
            let _ = t.router.take_offline(&agent(*n)).await;
        }
        Op::Hangup(n) => {
            let _ = t.router.hangup(&agent(*n)).await;
        }
        Op::Incoming(n) => {
            let _ = t.router.handle_incoming_call(call(*n)).await;
        }
        Op::GatewayEnded(n) => {
            let _ = t.router.handle_call_ended(call(*n)).await;
        }
        Op::FailBridges(fail) => t.telephony.fail_bridges(*fail),
    }
}

fn check_invariants(router: &CallRouter) -> std::result::Result<(), TestCaseError> {
    let waiting = router.waiting_calls();
    let unique: HashSet<&CallId> = waiting.iter().collect();
    prop_assert_eq!(unique.len(), waiting.len(), "a call is queued twice");
    for call in &waiting {
        prop_assert!(router.call_state(call).is_queued(), "{} is listed but not queued", call);
        prop_assert_eq!(router.get_assigned_agent(call), None);
    }

    let mut active = HashSet::new();
    for record in router.agents() {
        let Some(call) = &record.active_call else {
            continue;
        };
        prop_assert!(active.insert(call.clone()), "{} is bridged to two agents", call);
        prop_assert!(!unique.contains(call), "{} is queued and assigned", call);
        prop_assert_eq!(router.get_assigned_agent(call), Some(record.id.clone()));
        prop_assert_eq!(router.get_active_call_id(&record.id).ok().flatten(), Some(call.clone()));
    }

    let stats = router.stats();
    prop_assert_eq!(stats.active_calls, active.len(), "queue and registry disagree on active calls");
    prop_assert_eq!(stats.queued_calls, waiting.len());
    prop_assert_eq!(stats.total_agents, router.agents().len());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn no_call_is_queued_and_assigned(ops in prop::collection::vec(op(), 1..60)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let t = TestRouter::new();
            for op in &ops {
                apply(&t, op).await;
                check_invariants(&t.router)?;
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
