//! Error types for call routing operations

use thiserror::Error;

use crate::types::{AgentId, CallId};

/// Errors raised by the agent registry, the call queue and the router
///
/// Lookups of unknown agents always surface as [`CallRouterError::AgentNotFound`].
/// Unassigning or disconnecting calls that are already gone is not an error; those
/// paths are no-ops because they represent cleanup races.
///
/// ```
/// use rvoip_call_router::{CallRouterError, AgentId};
///
/// let err = CallRouterError::AgentNotFound(AgentId::from("agent-001"));
/// assert_eq!(err.to_string(), "Agent agent-001 not found");
/// ```
#[derive(Error, Debug)]
pub enum CallRouterError {
    /// An operation referenced an agent id absent from the registry
    #[error("Agent {0} not found")]
    AgentNotFound(AgentId),

    /// A call was assigned to an agent that has no live media session
    #[error("Agent {0} is offline")]
    AgentOffline(AgentId),

    /// The telephony gateway reported the same call twice while it was still routed
    #[error("Call {0} is already being routed")]
    DuplicateCall(CallId),

    /// Media conferencing collaborator failure
    #[error("Conference error: {0}")]
    Conference(String),

    /// Telephony gateway collaborator failure
    #[error("Telephony error: {0}")]
    Telephony(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Router event bus failure (closed or lagging subscriber)
    #[error("Event bus error: {0}")]
    EventBus(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CallRouterError {
    pub fn conference<S: Into<String>>(msg: S) -> Self {
        Self::Conference(msg.into())
    }

    pub fn telephony<S: Into<String>>(msg: S) -> Self {
        Self::Telephony(msg.into())
    }

    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<config::ConfigError> for CallRouterError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CallRouterError>;
