//! # Call Queue
//!
//! Decides whether an incoming call is answered now or put on hold, and hands
//! held callers to agents strictly in arrival order.

pub mod manager;

pub use manager::{CallQueue, Placement};
