//! # Runtime events emitted by the orchestrator and lifecycle transitions.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Registry events**: applications added or removed
//! - **Lifecycle events**: status changes, slow or timed-out stages, failures
//! - **Reroute events**: start and settlement of a reroute pass, first-mount signals
//! - **Subscriber events**: fan-out problems (panics, overflow)
//!
//! The [`Event`] struct carries additional metadata such as timestamps, application
//! name, object kind, status, stage, reasons and timings.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use appvisor::{AppStatus, Event, EventKind, Stage};
//!
//! let ev = Event::new(EventKind::AppBroken)
//!     .with_app("navbar")
//!     .with_stage(Stage::Mount)
//!     .with_status(AppStatus::SkipBecauseBroken)
//!     .with_reason("boom")
//!     .with_timeout(Duration::from_secs(4));
//!
//! assert_eq!(ev.kind, EventKind::AppBroken);
//! assert_eq!(ev.app.as_deref(), Some("navbar"));
//! assert_eq!(ev.timeout_ms, Some(4000));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::apps::{AppStatus, ObjectKind, Stage};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `app`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `app`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Registry events ===
    /// Application was added to the registry.
    ///
    /// Sets:
    /// - `app`: application name
    AppRegistered,

    /// Application was unloaded and removed from the registry.
    ///
    /// Sets:
    /// - `app`: application name
    AppUnregistered,

    // === Lifecycle events ===
    /// Record moved to a new status.
    ///
    /// Sets:
    /// - `app`: application or parcel name
    /// - `object`: application or parcel
    /// - `status`: new status
    StatusChanged,

    /// Loading failed for a recoverable reason; retried after the cooldown.
    ///
    /// Sets:
    /// - `app`, `object`, `stage = Load`
    /// - `status`: `LOAD_ERROR`
    /// - `reason`: failure message
    LoadFailed,

    /// Record was forced into `SKIP_BECAUSE_BROKEN` (or a hard-fail caller was rejected).
    ///
    /// Sets:
    /// - `app`, `object`, `stage`
    /// - `status`: status the record was forced into
    /// - `reason`: failure message
    AppBroken,

    /// A stage is still running past its warning threshold.
    ///
    /// Sets:
    /// - `app`, `object`, `stage`
    /// - `timeout_ms`: hard limit for the stage
    /// - `elapsed_ms`: time spent so far
    TimeoutWarning,

    /// A stage exceeded its hard limit.
    ///
    /// Sets:
    /// - `app`, `object`, `stage`
    /// - `timeout_ms`: hard limit for the stage
    /// - `reason`: `"fail"` when the stage is failed, `"wait"` when it keeps waiting
    TimeoutHit,

    /// Custom props function returned a non-object value.
    ///
    /// Sets:
    /// - `app`: application name
    /// - `reason`: what was returned instead
    InvalidCustomProps,

    // === Reroute events ===
    /// A reroute pass started.
    ///
    /// Sets:
    /// - `reason`: url the pass is computed against
    RerouteStarted,

    /// A reroute pass settled.
    ///
    /// Sets:
    /// - `reason`: comma separated names of mounted applications
    /// - `elapsed_ms`: duration of the pass
    RerouteSettled,

    /// Emitted once per orchestrator, right before the first application mount.
    ///
    /// Sets:
    /// - `app`: application about to mount
    BeforeFirstMount,

    /// Emitted once per orchestrator, after the first successful application mount.
    ///
    /// Sets:
    /// - `app`: mounted application
    FirstMount,

    /// A captured navigation listener panicked.
    ///
    /// Sets:
    /// - `reason`: panic message
    ListenerPanicked,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Application, parcel or subscriber name, if applicable.
    pub app: Option<Arc<str>>,
    /// Whether `app` names an application or a parcel.
    pub object: Option<ObjectKind>,
    /// Status related to the event.
    pub status: Option<AppStatus>,
    /// Lifecycle stage related to the event.
    pub stage: Option<Stage>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Stage limit in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Elapsed time in milliseconds (compact).
    pub elapsed_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            app: None,
            object: None,
            status: None,
            stage: None,
            reason: None,
            timeout_ms: None,
            elapsed_ms: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an application (or parcel/subscriber) name.
    #[inline]
    pub fn with_app(mut self, app: impl Into<Arc<str>>) -> Self {
        self.app = Some(app.into());
        self
    }

    /// Attaches the object kind.
    #[inline]
    pub fn with_object(mut self, object: ObjectKind) -> Self {
        self.object = Some(object);
        self
    }

    /// Attaches a status.
    #[inline]
    pub fn with_status(mut self, status: AppStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches a lifecycle stage.
    #[inline]
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Attaches a stage limit (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches an elapsed time (stored as milliseconds).
    #[inline]
    pub fn with_elapsed(mut self, d: Duration) -> Self {
        self.elapsed_ms = Some(compact_ms(d));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_app(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_app(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}
