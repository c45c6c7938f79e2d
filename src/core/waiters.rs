//! # Pending unload requests.
//!
//! At most one waiter exists per application name. Every caller asking to unload the
//! same application awaits the same shared outcome; the unload transition settles it.
//! At most one caller drives an immediate unload for a waiter; the others only await.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tokio::sync::oneshot;

use crate::apps::{AppStatus, ObjectKind, Stage};
use crate::error::{LifecycleError, LifecycleFailure};

pub(crate) type UnloadOutcome = Result<(), LifecycleError>;
pub(crate) type UnloadWait = Shared<BoxFuture<'static, UnloadOutcome>>;

struct Waiter {
    tx: oneshot::Sender<UnloadOutcome>,
    done: UnloadWait,
    claimed: bool,
}

#[derive(Default)]
pub(crate) struct UnloadWaiters {
    inner: Mutex<HashMap<Arc<str>, Waiter>>,
}

impl UnloadWaiters {
    fn lock(&self) -> MutexGuard<'_, HashMap<Arc<str>, Waiter>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    pub(crate) fn get(&self, name: &str) -> Option<UnloadWait> {
        self.lock().get(name).map(|w| w.done.clone())
    }

    /// Returns the existing waiter for `name`, or parks a new one.
    pub(crate) fn get_or_insert(&self, name: &Arc<str>) -> UnloadWait {
        let mut waiters = self.lock();
        if let Some(w) = waiters.get(&**name) {
            return w.done.clone();
        }

        let (tx, rx) = oneshot::channel();
        let detached = Arc::clone(name);
        let done = rx
            .map(move |res| res.unwrap_or_else(|_| Err(detached_error(detached))))
            .boxed()
            .shared();
        waiters.insert(
            Arc::clone(name),
            Waiter {
                tx,
                done: done.clone(),
                claimed: false,
            },
        );
        done
    }

    /// Claims the right to drive the unload for `name`; true for the first caller only.
    pub(crate) fn claim(&self, name: &str) -> bool {
        match self.lock().get_mut(name) {
            Some(w) if !w.claimed => {
                w.claimed = true;
                true
            }
            _ => false,
        }
    }

    /// Removes the waiter for `name` and resolves it; no-op if none is parked.
    pub(crate) fn settle(&self, name: &str, outcome: UnloadOutcome) {
        if let Some(w) = self.lock().remove(name) {
            let _ = w.tx.send(outcome);
        }
    }
}

fn detached_error(name: Arc<str>) -> LifecycleError {
    LifecycleError {
        name,
        object: ObjectKind::Application,
        stage: Stage::Unload,
        status: AppStatus::NotLoaded,
        failure: LifecycleFailure::Detached,
    }
}
