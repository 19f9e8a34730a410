use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{trace, warn};

use crate::errors::{ChainError, SubscriberError};
use crate::event::Event;

/// Return type of subscriber callbacks.
pub type SubscriberResult = Result<(), SubscriberError>;

type Callback = dyn Fn(&Event) -> SubscriberResult + Send + Sync;

/// Shared handle to an event callback.
///
/// Clones refer to the same callback; [`AguiChain::unsubscribe`](crate::AguiChain::unsubscribe)
/// matches handles by that identity.
#[derive(Clone)]
pub struct Subscriber {
    callback: Arc<Callback>,
}

impl Subscriber {
    /// Wraps a fallible callback. An `Err` aborts the current dispatch pass
    /// and is returned to the caller of the chain operation.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Event) -> SubscriberResult + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    /// Wraps a callback that cannot fail.
    pub fn infallible<F>(callback: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        Self::new(move |event| {
            callback(event);
            Ok(())
        })
    }

    /// True when both handles point at the same callback.
    pub fn same_as(&self, other: &Subscriber) -> bool {
        Arc::ptr_eq(&self.callback, &other.callback)
    }

    fn notify(&self, event: &Event) -> SubscriberResult {
        (self.callback)(event)
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("callback", &Arc::as_ptr(&self.callback).cast::<()>())
            .finish()
    }
}

/// Ordered subscriber registrations; duplicates are kept.
#[derive(Clone, Debug, Default)]
pub(crate) struct SubscriberList {
    entries: Vec<Subscriber>,
}

impl SubscriberList {
    pub(crate) fn push(&mut self, subscriber: Subscriber) {
        self.entries.push(subscriber);
    }

    /// Removes the first registration of `subscriber`. Returns whether one was found.
    pub(crate) fn remove_first(&mut self, subscriber: &Subscriber) -> bool {
        match self.entries.iter().position(|entry| entry.same_as(subscriber)) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Calls every subscriber in registration order, stopping at the first failure.
    pub(crate) fn dispatch(&self, event: &Event) -> Result<(), ChainError> {
        trace!(
            event_type = event.type_name(),
            subscribers = self.entries.len(),
            "dispatching event"
        );
        for (index, subscriber) in self.entries.iter().enumerate() {
            if let Err(err) = subscriber.notify(event) {
                warn!(
                    event_type = event.type_name(),
                    subscriber_index = index,
                    error = %err,
                    "subscriber failed; aborting dispatch"
                );
                return Err(ChainError::subscriber(event.type_name(), err));
            }
        }
        Ok(())
    }
}

/// In-memory recorder of dispatched events.
///
/// Handy for tests and for callers that want to inspect a finished run.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscriber that appends every event it sees to this log.
    pub fn subscriber(&self) -> Subscriber {
        let events = Arc::clone(&self.events);
        Subscriber::infallible(move |event| lock(&events).push(event.clone()))
    }

    /// Snapshot of the recorded events.
    pub fn events(&self) -> Vec<Event> {
        lock(&self.events).clone()
    }

    /// Wire type names of the recorded events, in order.
    pub fn type_names(&self) -> Vec<String> {
        lock(&self.events)
            .iter()
            .map(|event| event.type_name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.events).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.events).is_empty()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}

fn lock(events: &Mutex<Vec<Event>>) -> MutexGuard<'_, Vec<Event>> {
    events.lock().unwrap_or_else(PoisonError::into_inner)
}
