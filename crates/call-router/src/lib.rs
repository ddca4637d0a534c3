//! # RVoIP Call Router
//!
//! Routes inbound phone calls to agents who take them in a browser over WebRTC.
//!
//! Every online agent owns one media conference. A ringing call is bridged into
//! the conference of the first available agent, or held in a first-in-first-out
//! queue until one frees up. The router never touches the network itself: the
//! telephony gateway and the media conferencing service are injected through the
//! [`TelephonyGateway`] and [`MediaConferencing`] traits and report back through
//! [`TelephonyEvent`] and [`MediaEvent`].
//!
//! ## Modules
//!
//! - `agent`: agent registry and the connection lifecycle of each agent
//! - `queue`: the call table and the waiting queue
//! - `orchestrator`: [`CallRouter`], which drives both from inbound events
//! - `events`: broadcast of routing outcomes to observers
//! - `collaborators`: contracts with the gateway and the media service
//! - `config` / `logging`: layered configuration and tracing setup
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rvoip_call_router::prelude::*;
//!
//! # async fn example(
//! #     media: Arc<dyn MediaConferencing>,
//! #     telephony: Arc<dyn TelephonyGateway>,
//! # ) -> Result<()> {
//! let config = RouterConfig::load(None)?;
//! setup_logging(LoggingConfig::from_router_config(&config)?)?;
//!
//! let router = CallRouter::new(config, media, telephony);
//! let (senders, receivers) = router.inbound_channels();
//! // hand `senders` to the gateway and media adapters
//! # drop(senders);
//!
//! let agent = router.login();
//! let session = router.bring_online(&agent).await?;
//! println!("join conference {}", session.conference);
//!
//! router.run(receivers, async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod orchestrator;
pub mod queue;
pub mod types;

pub use agent::{Agent, AgentRegistry, RegistryEffect};
pub use collaborators::{
    inbound_channels, InboundReceivers, InboundSenders, MediaConferencing, MediaEvent, TelephonyEvent,
    TelephonyGateway,
};
pub use config::RouterConfig;
pub use error::{CallRouterError, Result};
pub use events::{EventBus, RouterEvent, RouterEventSubscriber};
pub use orchestrator::{CallRouter, OnlineSession, RouterStats};
pub use queue::{CallQueue, Placement};
pub use types::{AgentId, AgentState, CallId, CallState, ConferenceId, ParticipantId, StreamId};

/// Everything needed to embed the router
pub mod prelude {
    pub use crate::collaborators::{
        InboundReceivers, InboundSenders, MediaConferencing, MediaEvent, TelephonyEvent, TelephonyGateway,
    };
    pub use crate::config::RouterConfig;
    pub use crate::error::{CallRouterError, Result};
    pub use crate::events::{RouterEvent, RouterEventSubscriber};
    pub use crate::logging::{setup_logging, LoggingConfig};
    pub use crate::orchestrator::{CallRouter, OnlineSession, RouterStats};
    pub use crate::types::{AgentId, AgentState, CallId, CallState, ConferenceId, ParticipantId, StreamId};
}
