//! # Captured navigation listeners.
//!
//! Application code may subscribe to `hashchange`/`popstate`. Those listeners are
//! captured here instead of firing straight away, and are replayed only once a reroute
//! finished mounting, so they always observe a settled mount state.
//!
//! ## Rules
//! - Adding the same listener (same `Arc`) twice for one kind is a no-op.
//! - A panicking listener is isolated and reported as `ListenerPanicked`; the rest still run.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::apps::Location;
use crate::error::panic_message;
use crate::events::{Bus, Event, EventKind};

/// Kind of navigation event listeners can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationEventKind {
    /// Fragment changed.
    HashChange,
    /// History entry changed.
    PopState,
}

/// Navigation event replayed to captured listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEvent {
    /// Event kind.
    pub kind: NavigationEventKind,
    /// Location after navigation.
    pub location: Location,
    /// What produced the event when the orchestrator synthesized it (e.g. `"pushState"`).
    pub trigger: Option<&'static str>,
}

impl NavigationEvent {
    /// Event coming from the host.
    pub fn new(kind: NavigationEventKind, location: Location) -> Self {
        Self {
            kind,
            location,
            trigger: None,
        }
    }

    /// Tags the event with what produced it.
    pub fn with_trigger(mut self, trigger: &'static str) -> Self {
        self.trigger = Some(trigger);
        self
    }
}

/// Listener callback.
pub type NavigationListener = Arc<dyn Fn(&NavigationEvent) + Send + Sync>;

/// Handle returned when adding a listener; used to remove it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Captured {
    id: ListenerId,
    kind: NavigationEventKind,
    listener: NavigationListener,
}

#[derive(Default)]
pub(crate) struct CapturedListeners {
    next_id: AtomicU64,
    listeners: Mutex<Vec<Captured>>,
}

impl CapturedListeners {
    fn lock(&self) -> MutexGuard<'_, Vec<Captured>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn add(&self, kind: NavigationEventKind, listener: NavigationListener) -> ListenerId {
        let mut listeners = self.lock();
        if let Some(existing) = listeners
            .iter()
            .find(|c| c.kind == kind && Arc::ptr_eq(&c.listener, &listener))
        {
            return existing.id;
        }
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        listeners.push(Captured { id, kind, listener });
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|c| c.id != id);
        listeners.len() != before
    }

    /// Calls every listener for the event kind, in registration order.
    pub(crate) fn dispatch(&self, event: &NavigationEvent, bus: &Bus) {
        let targets: Vec<NavigationListener> = self
            .lock()
            .iter()
            .filter(|c| c.kind == event.kind)
            .map(|c| Arc::clone(&c.listener))
            .collect();

        for listener in targets {
            if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                bus.publish(
                    Event::new(EventKind::ListenerPanicked).with_reason(panic_message(&*payload)),
                );
            }
        }
    }
}
