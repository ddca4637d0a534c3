//! Ordered execution lanes
//!
//! Work chained onto the same [`Lane`] runs strictly in the order it was
//! chained; different lanes run concurrently. Each piece of work is a spawned
//! task that first waits for the previous task of its lane.

use std::collections::HashMap;
use std::future::Future;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::types::{CallId, ConferenceId};

/// What a collaborator request is ordered against
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Lane {
    Call(CallId),
    Conference(ConferenceId),
}

#[derive(Debug, Default)]
pub(crate) struct ActionLanes {
    tails: Mutex<HashMap<Lane, JoinHandle<()>>>,
}

impl ActionLanes {
    /// Spawn `work` behind everything already chained on `lane`
    pub(crate) fn chain<F>(&self, lane: Lane, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tails = self.tails.lock();
        tails.retain(|_, tail| !tail.is_finished());

        let previous = tails.remove(&lane);
        let tail = tokio::spawn(async move {
            if let Some(previous) = previous {
                // a panicked predecessor must not wedge the lane
                let _ = previous.await;
            }
            work.await;
        });
        tails.insert(lane, tail);
    }
}
