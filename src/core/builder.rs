use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::orchestrator::{Orchestrator, Runtime};
use crate::{
    apps::Location,
    core::Config,
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing an [`Orchestrator`] with optional features.
pub struct OrchestratorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    location: Location,
}

impl OrchestratorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            location: Location::default(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (status changes, failures, reroutes)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Sets the initial location (defaults to `http://localhost/`).
    pub fn with_location(mut self, location: impl Into<Location>) -> Self {
        self.location = location.into();
        self
    }

    /// Builds the orchestrator.
    ///
    /// Initializes the event bus, the runtime token and, when subscribers were
    /// given, the subscriber workers plus the bus listener feeding them. The latter
    /// requires a running tokio runtime.
    pub fn build(self) -> Orchestrator {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let runtime_token = CancellationToken::new();

        let listener = if self.subscribers.is_empty() {
            None
        } else {
            let set = SubscriberSet::new(self.subscribers, bus.clone());
            Some(subscriber_listener(set, &bus, runtime_token.clone()))
        };

        let rt = Runtime::new(self.cfg, bus, self.location, runtime_token, listener);
        Orchestrator::from_runtime(Arc::new(rt))
    }
}

/// Forwards bus events to the subscriber set until the runtime token is cancelled,
/// then drains what is left and stops the workers.
fn subscriber_listener(set: SubscriberSet, bus: &Bus, token: CancellationToken) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                ev = rx.recv() => match ev {
                    Ok(ev) => set.emit(ev),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                },
            }
        }
        while let Ok(ev) = rx.try_recv() {
            set.emit(ev);
        }
        set.shutdown().await;
    })
}
