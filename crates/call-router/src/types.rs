//! Identifier and state types shared by the registry, the queue and the router

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Agent identity, issued as a session token when the agent logs in
    AgentId
);
string_id!(
    /// Opaque call identifier issued by the telephony gateway
    CallId
);
string_id!(
    /// Media conference owned by one online agent
    ConferenceId
);
string_id!(
    /// A leg inside a conference: the agent's own, or a bridged caller's
    ParticipantId
);
string_id!(
    /// A published media stream
    StreamId
);

impl AgentId {
    /// Fresh random agent id, used as the browser session token
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Connection state of an agent
///
/// Derived from the agent's media fields rather than stored, so it can never
/// disagree with them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentState {
    /// No conference
    Offline,
    /// Conference and own participant exist, waiting for the agent's stream
    Connecting,
    /// Stream published, no call; eligible for routing
    Available,
    /// A call is assigned
    Busy,
}

/// Routing state of a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallState {
    /// Waiting in the hold queue
    Queued { since: DateTime<Utc> },
    /// Bridged, or being bridged, to an agent
    Assigned { agent: AgentId, since: DateTime<Utc> },
    /// Finished, dropped, or never seen
    Ended,
}

impl CallState {
    pub fn is_queued(&self) -> bool {
        matches!(self, CallState::Queued { .. })
    }

    pub fn assigned_agent(&self) -> Option<&AgentId> {
        match self {
            CallState::Assigned { agent, .. } => Some(agent),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_display_and_convert() {
        let call = CallId::from("c-123");
        assert_eq!(call.to_string(), "c-123");
        assert_eq!(call.as_str(), "c-123");
        assert_eq!(CallId::from("c-123".to_string()), call);
    }

    #[test]
    fn test_new_agent_ids_are_unique() {
        assert_ne!(AgentId::new(), AgentId::new());
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&ConferenceId::from("conf-1")).unwrap();
        assert_eq!(json, "\"conf-1\"");
    }

    #[test]
    fn test_call_state_helpers() {
        let agent = AgentId::from("a");
        let assigned = CallState::Assigned { agent: agent.clone(), since: Utc::now() };
        assert_eq!(assigned.assigned_agent(), Some(&agent));
        assert!(!assigned.is_queued());
        assert!(CallState::Queued { since: Utc::now() }.is_queued());
        assert_eq!(CallState::Ended.assigned_agent(), None);
    }
}
