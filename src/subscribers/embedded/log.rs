//! # LogWriter: simple event printer
//!
//! A minimal subscriber that prints incoming [`Event`]s to stdout.
//! Use it for tests or demos.
//!
//! ## Example output
//! ```text
//! [registered] app="navbar"
//! [reroute] url="http://localhost/settings"
//! [status] application="navbar" -> LOADING_SOURCE_CODE
//! [before-first-mount] app="navbar"
//! [first-mount] app="navbar"
//! [timeout-warning] parcel="chart" stage=mount elapsed=1000ms limit=4000ms
//! [broken] application="settings" stage=mount status=SKIP_BECAUSE_BROKEN err="boom"
//! [settled] mounted=[navbar] took=3ms
//! ```

use async_trait::async_trait;

use crate::apps::ObjectKind;
use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn object(e: &Event) -> ObjectKind {
    e.object.unwrap_or(ObjectKind::Application)
}

fn app(e: &Event) -> &str {
    e.app.as_deref().unwrap_or("unknown")
}

fn stage(e: &Event) -> String {
    e.stage.map(|s| s.to_string()).unwrap_or_default()
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::AppRegistered => println!("[registered] app={:?}", app(e)),
            EventKind::AppUnregistered => println!("[unregistered] app={:?}", app(e)),
            EventKind::StatusChanged => {
                let status = e.status.map(|s| s.as_str()).unwrap_or("?");
                println!("[status] {}={:?} -> {status}", object(e), app(e));
            }
            EventKind::LoadFailed => {
                println!(
                    "[load-failed] {}={:?} err={:?} (retrying after cooldown)",
                    object(e),
                    app(e),
                    e.reason.as_deref().unwrap_or("")
                );
            }
            EventKind::AppBroken => {
                let status = e.status.map(|s| s.as_str()).unwrap_or("?");
                println!(
                    "[broken] {}={:?} stage={} status={status} err={:?}",
                    object(e),
                    app(e),
                    stage(e),
                    e.reason.as_deref().unwrap_or("")
                );
            }
            EventKind::TimeoutWarning => {
                println!(
                    "[timeout-warning] {}={:?} stage={} elapsed={}ms limit={}ms",
                    object(e),
                    app(e),
                    stage(e),
                    e.elapsed_ms.unwrap_or_default(),
                    e.timeout_ms.unwrap_or_default()
                );
            }
            EventKind::TimeoutHit => {
                println!(
                    "[timeout] {}={:?} stage={} limit={}ms action={}",
                    object(e),
                    app(e),
                    stage(e),
                    e.timeout_ms.unwrap_or_default(),
                    e.reason.as_deref().unwrap_or("")
                );
            }
            EventKind::InvalidCustomProps => {
                println!(
                    "[invalid-custom-props] app={:?} got={}",
                    app(e),
                    e.reason.as_deref().unwrap_or("")
                );
            }
            EventKind::RerouteStarted => {
                println!("[reroute] url={:?}", e.reason.as_deref().unwrap_or(""));
            }
            EventKind::RerouteSettled => {
                println!(
                    "[settled] mounted=[{}] took={}ms",
                    e.reason.as_deref().unwrap_or(""),
                    e.elapsed_ms.unwrap_or_default()
                );
            }
            EventKind::BeforeFirstMount => println!("[before-first-mount] app={:?}", app(e)),
            EventKind::FirstMount => println!("[first-mount] app={:?}", app(e)),
            EventKind::ListenerPanicked => {
                println!(
                    "[listener-panicked] info={}",
                    e.reason.as_deref().unwrap_or("unknown")
                );
            }
            EventKind::SubscriberOverflow => {
                println!(
                    "[subscriber-overflow] subscriber={:?} reason={:?}",
                    e.app, e.reason
                );
            }
            EventKind::SubscriberPanicked => {
                println!(
                    "[subscriber-panicked] subscriber={} info={}",
                    app(e),
                    e.reason.as_deref().unwrap_or("unknown"),
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
