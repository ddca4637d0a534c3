//! Routing orchestration
//!
//! Ties the agent registry and the call queue to the telephony gateway and the
//! media conferencing service.
//!
//! ## Flow
//!
//! ```text
//! IncomingCall ──► connect_or_queue_call ──┬─► Answered ─► create participant ─► answer
//!                                           └─► Queued   ─► hold
//!
//! agent available ─► get_next_active_call_id ─► create participant ─► redirect
//! ```
//!
//! Each inbound event is applied in two phases. The routing decision runs
//! synchronously under the state lock and yields a list of collaborator
//! requests; those requests are then awaited with the lock released. Events
//! therefore never interleave inside the registry or the queue, while the
//! collaborators are free to call back into the router.
//!
//! Under [`CallRouter::run`] the requests go to per-call lanes: a call's hold is
//! always issued before its redirect, while unrelated calls proceed in parallel.

mod core;
mod handler;
mod lanes;
mod routing;
pub mod types;

pub use self::core::CallRouter;
pub use types::{OnlineSession, RouterStats};
