//! # Non-blocking event fan-out to multiple subscribers.
//!
//! [`SubscriberSet`] hands every bus event to one worker per subscriber.
//!
//! ```text
//! emit(event) ─► wants()? ─► [bounded queue] ─► worker ─► on_event()
//!                   │              └─ full/closed ─► SubscriberOverflow
//!                   └─ no ─► skipped                     panic ─► SubscriberPanicked
//! ```
//!
//! Each subscriber sees its events in bus order; there is no ordering across
//! subscribers. `emit()` never waits on a worker.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::error::panic_message;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

/// One subscriber with its queue and worker task.
struct Worker {
    sub: Arc<dyn Subscribe>,
    queue: mpsc::Sender<Arc<Event>>,
    task: JoinHandle<()>,
}

impl Worker {
    fn spawn(sub: Arc<dyn Subscribe>, bus: &Bus) -> Self {
        let (queue, rx) = mpsc::channel(sub.queue_capacity().max(1));
        let task = tokio::spawn(deliver(Arc::clone(&sub), rx, bus.clone()));
        Self { sub, queue, task }
    }

    /// Queues `event`; the error names why it was dropped.
    fn offer(&self, event: &Arc<Event>) -> Result<(), &'static str> {
        if !self.sub.wants(event) {
            return Ok(());
        }
        self.queue
            .try_send(Arc::clone(event))
            .map_err(|err| match err {
                TrySendError::Full(_) => "full",
                TrySendError::Closed(_) => "closed",
            })
    }
}

async fn deliver(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(ev) = rx.recv().await {
        if let Err(payload) = AssertUnwindSafe(sub.on_event(&ev)).catch_unwind().await {
            bus.publish(Event::subscriber_panicked(
                sub.name(),
                panic_message(&*payload),
            ));
        }
    }
}

/// Fan-out coordinator for the orchestrator's subscribers.
pub struct SubscriberSet {
    workers: Vec<Worker>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber; requires a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let workers = subs.into_iter().map(|sub| Worker::spawn(sub, &bus)).collect();
        Self { workers, bus }
    }

    /// Queues `event` for every subscriber that wants it.
    ///
    /// Drops are reported as `SubscriberOverflow`, except drops of overflow events.
    pub fn emit(&self, event: Event) {
        let event = Arc::new(event);
        for worker in &self.workers {
            if let Err(reason) = worker.offer(&event) {
                if event.kind != EventKind::SubscriberOverflow {
                    self.bus
                        .publish(Event::subscriber_overflow(worker.sub.name(), reason));
                }
            }
        }
    }

    /// Closes every queue and waits for the workers to drain them.
    pub async fn shutdown(self) {
        let tasks: Vec<_> = self
            .workers
            .into_iter()
            .map(|Worker { queue, task, .. }| {
                drop(queue);
                task
            })
            .collect();
        for task in tasks {
            let _ = task.await;
        }
    }
}
