//! # Run one lifecycle stage under its time limits.
//!
//! Executes a [`Lifecycle`] with the record's [`StageTimeout`] and publishes timing
//! events to the record's bus.
//!
//! ```text
//! run(lifecycle) ─┬─ finishes ─────────────────────────────► Ok / Err(Hook)
//!                 ├─ warning_millis elapsed ─► TimeoutWarning (again after backoff)
//!                 └─ millis elapsed ─► TimeoutHit
//!                        ├─ die_on_timeout ─► Err(Timeout)   (work keeps running detached)
//!                        └─ otherwise ─────► keep waiting for the work
//! ```
//!
//! ## Rules
//! - Warnings stop once the hard limit is reached.
//! - A timeout does not cancel the underlying work; it is only no longer awaited.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant};

use crate::apps::{Lifecycle, Props, Record, Stage};
use crate::error::LifecycleFailure;
use crate::events::{Event, EventKind};

/// Runs `lifecycle` for `record` at `stage`, racing it against the stage limits.
pub(crate) async fn run_stage(
    record: &Record,
    stage: Stage,
    lifecycle: Lifecycle,
    props: Props,
) -> Result<(), LifecycleFailure> {
    let limits = record.stage_timeout(stage);
    let mut work = lifecycle.run(props);

    let Some(limit) = limits.limit() else {
        return work.await.map_err(LifecycleFailure::from);
    };

    let started = Instant::now();
    let deadline = started + limit;
    let warnings = limits.warnings();
    let mut warned = 0u32;
    let mut next_warning = warnings
        .map(|w| started + w.next(0))
        .filter(|at| *at < deadline);

    loop {
        tokio::select! {
            biased;
            res = &mut work => return res.map_err(LifecycleFailure::from),
            _ = time::sleep_until(deadline) => {
                let dies = limits.die_on_timeout;
                publish_timeout(record, stage, limit, dies);
                if dies {
                    return Err(LifecycleFailure::Timeout { after: limit });
                }
                return work.await.map_err(LifecycleFailure::from);
            }
            _ = time::sleep_until(next_warning.unwrap_or(deadline)), if next_warning.is_some() => {
                let now = Instant::now();
                publish_warning(record, stage, limit, now - started);
                warned += 1;
                next_warning = warnings
                    .map(|w| now + w.next(warned))
                    .filter(|at| *at < deadline);
            }
        }
    }
}

fn publish_warning(record: &Record, stage: Stage, limit: Duration, elapsed: Duration) {
    record.bus().publish(
        Event::new(EventKind::TimeoutWarning)
            .with_app(Arc::clone(&record.name))
            .with_object(record.object)
            .with_stage(stage)
            .with_timeout(limit)
            .with_elapsed(elapsed),
    );
}

fn publish_timeout(record: &Record, stage: Stage, limit: Duration, dies: bool) {
    record.bus().publish(
        Event::new(EventKind::TimeoutHit)
            .with_app(Arc::clone(&record.name))
            .with_object(record.object)
            .with_stage(stage)
            .with_timeout(limit)
            .with_reason(if dies { "fail" } else { "wait" }),
    );
}
