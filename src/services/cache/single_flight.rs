//! Collapse concurrent misses for the same token into one upstream call.
//!
//! The first caller for a key spawns the work on the runtime and registers a
//! `watch` receiver in the in-flight map; later callers clone that receiver
//! and wait. The work runs in its own task, so a waiter that gets dropped
//! (client disconnect, request timeout) does not cancel it.
//!
//! The in-flight marker is removed exactly once, by a drop guard owned by the
//! spawned task, before the result is published (also when the task panics).

use std::{collections::HashMap, future::Future, hash::Hash, sync::Arc};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;

/// The shared call ended without publishing a value (the task panicked).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("in-flight call ended without a result")]
pub struct FlightAbandoned;

type InFlight<K, T> = Arc<Mutex<HashMap<K, watch::Receiver<Option<T>>>>>;

pub struct SingleFlight<K, T> {
    inflight: InFlight<K, T>,
}

impl<K, T> Default for SingleFlight<K, T> {
    fn default() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K, T> std::fmt::Debug for SingleFlight<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &self.inflight.lock().len())
            .finish()
    }
}

struct FlightGuard<K: Eq + Hash, T> {
    key: Option<K>,
    inflight: InFlight<K, T>,
}

impl<K: Eq + Hash, T> FlightGuard<K, T> {
    fn release(&mut self) {
        if let Some(key) = self.key.take() {
            self.inflight.lock().remove(&key);
        }
    }
}

impl<K: Eq + Hash, T> Drop for FlightGuard<K, T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<K, T> SingleFlight<K, T>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a call currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inflight.lock().len()
    }

    /// Run `work` for `key` unless a call for `key` is already running, then
    /// wait for whichever call owns the key.
    ///
    /// `work` is only invoked by the caller that starts the flight.
    pub async fn run<F, Fut>(&self, key: K, work: F) -> Result<T, FlightAbandoned>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut rx = {
            let mut inflight = self.inflight.lock();
            match inflight.get(&key) {
                Some(rx) => rx.clone(),
                None => {
                    let (tx, rx) = watch::channel(None);
                    inflight.insert(key.clone(), rx.clone());

                    let mut guard = FlightGuard {
                        key: Some(key),
                        inflight: Arc::clone(&self.inflight),
                    };
                    let fut = work();
                    tokio::spawn(async move {
                        let value = fut.await;
                        guard.release();
                        // no receivers left is fine
                        let _ = tx.send(Some(value));
                    });
                    rx
                }
            }
        };

        let value = rx.wait_for(Option::is_some).await.map_err(|_| FlightAbandoned)?;
        value.clone().ok_or(FlightAbandoned)
    }
}
