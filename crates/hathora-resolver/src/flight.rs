//! Single-flight bookkeeping: one resolution per key at a time.
//!
//! The first caller for a key becomes the leader and runs the resolution.
//! Later callers subscribe to the leader's `watch` channel and receive a
//! clone of its outcome. If the leader goes away without publishing an
//! outcome (dropped or cancelled), the channel closes and a follower
//! takes over as the new leader.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use hathora_model::ProcessId;
use tokio::sync::watch;

use crate::{ResolveError, Resolution};

pub(crate) type Outcome = Result<Resolution, ResolveError>;
type Key = (ProcessId, bool);

#[derive(Debug)]
struct Flight {
    id: u64,
    outcome: watch::Receiver<Option<Outcome>>,
}

#[derive(Debug, Default)]
pub(crate) struct InFlight {
    flights: Mutex<HashMap<Key, Flight>>,
    next_id: AtomicU64,
}

pub(crate) enum Role<'a> {
    Leader(LeaderGuard<'a>),
    Follower(watch::Receiver<Option<Outcome>>),
}

impl InFlight {
    /// Joins the flight for `key`, starting one if none is running.
    pub(crate) fn join(&self, key: Key) -> Role<'_> {
        let mut flights = self.lock();
        if let Some(flight) = flights.get(&key) {
            return Role::Follower(flight.outcome.clone());
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        flights.insert(key.clone(), Flight { id, outcome: rx });
        Role::Leader(LeaderGuard {
            flights: self,
            key,
            id,
            tx,
        })
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Key, Flight>> {
        self.flights.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Held by the leader while it resolves. Removes the flight on drop.
pub(crate) struct LeaderGuard<'a> {
    flights: &'a InFlight,
    key: Key,
    id: u64,
    tx: watch::Sender<Option<Outcome>>,
}

impl LeaderGuard<'_> {
    /// Hands `outcome` to every follower. A cancelled outcome belongs to
    /// the leader's token only, so it is not shared.
    pub(crate) fn finish(self, outcome: &Outcome) {
        if matches!(outcome, Ok(Resolution::Cancelled)) {
            return;
        }
        self.tx.send_replace(Some(outcome.clone()));
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        let mut flights = self.flights.lock();
        // A newer flight may already own the key.
        if flights.get(&self.key).is_some_and(|f| f.id == self.id) {
            flights.remove(&self.key);
        }
    }
}

/// Waits for the leader's outcome. `None` means the leader went away
/// without one.
pub(crate) async fn wait(mut rx: watch::Receiver<Option<Outcome>>) -> Option<Outcome> {
    match rx.wait_for(Option::is_some).await {
        Ok(shared) => shared.clone(),
        Err(_) => None,
    }
}
