//! Inbound event handling

use std::future::Future;

use tracing::{debug, info, info_span, warn, Instrument};

use super::core::CallRouter;
use super::types::Action;
use crate::collaborators::{InboundReceivers, MediaEvent, TelephonyEvent};
use crate::error::Result;
use crate::types::CallId;

impl CallRouter {
    /// A phone call started ringing
    pub async fn handle_incoming_call(&self, call: CallId) -> Result<()> {
        let span = info_span!("incoming_call", call_id = %call);
        async move {
            info!("incoming call");
            let actions = self.plan(|state, bus| state.on_incoming_call(call, bus))?;
            self.execute(actions).await
        }
        .instrument(span)
        .await
    }

    /// The gateway reports a call as gone
    pub async fn handle_call_ended(&self, call: CallId) -> Result<()> {
        let span = info_span!("call_ended", call_id = %call);
        async move {
            info!("call ended by gateway");
            let actions = self.plan(|state, bus| state.on_gateway_call_ended(call, bus))?;
            self.execute(actions).await
        }
        .instrument(span)
        .await
    }

    pub async fn handle_telephony_event(&self, event: TelephonyEvent) -> Result<()> {
        match event {
            TelephonyEvent::IncomingCall { call } => self.handle_incoming_call(call).await,
            TelephonyEvent::CallEnded { call } => self.handle_call_ended(call).await,
        }
    }

    pub async fn handle_media_event(&self, event: MediaEvent) -> Result<()> {
        let span = info_span!("media_event", conference_id = %event.conference());
        async move {
            debug!(?event, "media event");
            let actions = self.plan(|state, bus| state.on_media_event(event, bus))?;
            self.execute(actions).await
        }
        .instrument(span)
        .await
    }

    /// Consume inbound events until `shutdown` resolves or both channels close
    ///
    /// Events are applied to the routing state in arrival order. The resulting
    /// collaborator requests run on spawned tasks: requests for the same call
    /// are issued in order, other calls do not wait on them.
    pub async fn run<S>(&self, inbound: InboundReceivers, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        let InboundReceivers {
            mut media,
            mut telephony,
        } = inbound;
        let mut media_open = true;
        let mut telephony_open = true;
        tokio::pin!(shutdown);

        info!("call router started");
        while media_open || telephony_open {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("call router shutting down");
                    break;
                }
                event = media.recv(), if media_open => match event {
                    Some(event) => {
                        info_span!("media_event", conference_id = %event.conference()).in_scope(|| {
                            debug!(?event, "media event");
                            self.dispatch_planned(self.plan(|state, bus| state.on_media_event(event, bus)));
                        });
                    }
                    None => {
                        debug!("media event channel closed");
                        media_open = false;
                    }
                },
                event = telephony.recv(), if telephony_open => match event {
                    Some(event) => {
                        info_span!("telephony_event", call_id = %event.call()).in_scope(|| {
                            info!(?event, "telephony event");
                            self.dispatch_planned(self.plan(|state, bus| state.on_telephony_event(event, bus)));
                        });
                    }
                    None => {
                        debug!("telephony event channel closed");
                        telephony_open = false;
                    }
                },
            }
        }
        Ok(())
    }

    fn dispatch_planned(&self, planned: Result<Vec<Action>>) {
        match planned {
            Ok(actions) => self.dispatch(actions),
            Err(e) => warn!(error = %e, "failed to route event"),
        }
    }
}
