//! Single-Flight Module
//!
//! Collapses concurrent loads of the same key into one computation. The
//! first caller registers a shared future; later callers clone and await
//! it, and every waiter observes the same output.

use std::collections::HashMap;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

/// A registered computation that any number of waiters can await.
pub type Flight<T> = Shared<BoxFuture<'static, T>>;

/// Whether a caller started the flight or joined an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Leader,
    Follower,
}

// == Single Flight ==
/// Registry of in-flight computations keyed by cache key.
///
/// The registry only tracks flights. The computation itself must call
/// [`SingleFlight::finish`] once it has published its result, so the next
/// caller for the key starts from scratch.
pub struct SingleFlight<T>
where
    T: Clone,
{
    calls: Mutex<HashMap<String, Flight<T>>>,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    // == Join Or Start ==
    /// Returns the flight registered for `key`, registering the future
    /// produced by `start` if there is none.
    ///
    /// `start` runs under the registry lock and must only build the
    /// future, not poll it.
    pub fn join_or_start<F>(&self, key: &str, start: F) -> (Flight<T>, Role)
    where
        F: FnOnce() -> BoxFuture<'static, T>,
    {
        let mut calls = self.calls.lock();
        if let Some(flight) = calls.get(key) {
            return (flight.clone(), Role::Follower);
        }

        let flight = start().shared();
        calls.insert(key.to_string(), flight.clone());
        (flight, Role::Leader)
    }

    // == Finish ==
    /// Clears the registration for `key`.
    pub fn finish(&self, key: &str) -> bool {
        self.calls.lock().remove(key).is_some()
    }

    /// Number of keys with a registered flight.
    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for SingleFlight<T>
where
    T: Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &self.calls.lock().len())
            .finish()
    }
}
