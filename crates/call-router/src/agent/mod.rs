//! # Agent Management
//!
//! Tracks every agent's browser media session and decides which agent can take
//! a call.
//!
//! An agent moves through these states, derived from its media fields:
//!
//! ```text
//!  Offline ──bring online──▶ Connecting ──own stream published──▶ Available
//!     ▲                                                        │    ▲
//!     │                                                 assign │    │ unassign /
//!     │                                                        ▼    │ caller leaves
//!     └──────── take offline / own leg leaves ──────────────── Busy ┘
//! ```
//!
//! Only `Available` agents are returned by
//! [`AgentRegistry::get_available_agent`], first registered first.

pub mod registry;
pub mod types;

pub use registry::{AgentRegistry, Disconnection, RegistryEffect};
pub use types::Agent;
