//! # Mount transition.
//!
//! ```text
//! NOT_MOUNTED ─► MOUNTING ─┬─ ok ──► MOUNTED
//!                          └─ err ─► MOUNTED (forced) ─► unmount ─► SKIP_BECAUSE_BROKEN
//! ```
//!
//! A failed mount is unmounted before the record is marked broken, so partially
//! mounted applications get a chance to clean up. The remedial unmount's own failure
//! is folded into the same broken status.
//!
//! The first mount attempt and the first successful mount of an orchestrator
//! publish `BeforeFirstMount` and `FirstMount`, once each.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::apps::{AppStatus, Props, Record, Stage};
use crate::core::Runtime;
use crate::error::LifecycleError;
use crate::events::{Event, EventKind};
use crate::lifecycles::fail::settle;
use crate::lifecycles::runner::run_stage;
use crate::lifecycles::unmount::unmount_record;

/// One-shot latches for the first-mount signals.
#[derive(Default)]
pub(crate) struct MountSignals {
    before_first: AtomicBool,
    first: AtomicBool,
}

impl MountSignals {
    fn fire(latch: &AtomicBool, kind: EventKind, record: &Record) {
        if !latch.swap(true, Ordering::AcqRel) {
            record
                .bus()
                .publish(Event::new(kind).with_app(Arc::clone(&record.name)));
        }
    }
}

pub(crate) async fn to_mount(
    rt: &Arc<Runtime>,
    record: &Arc<Record>,
    hard_fail: bool,
) -> Result<(), LifecycleError> {
    if record
        .begin(&[AppStatus::NotMounted], AppStatus::Mounting)
        .is_none()
    {
        return Ok(());
    }
    MountSignals::fire(
        &rt.signals.before_first,
        EventKind::BeforeFirstMount,
        record,
    );

    let lifecycle = record.hooks().map(|h| h.mount.clone()).unwrap_or_default();
    let props = Props::for_record(rt, record);

    match run_stage(record, Stage::Mount, lifecycle, props).await {
        Ok(()) => {
            record.set_status(AppStatus::Mounted);
            MountSignals::fire(&rt.signals.first, EventKind::FirstMount, record);
            Ok(())
        }
        Err(failure) => {
            record.set_status(AppStatus::Mounted);
            let _ = unmount_record(rt, record).await;
            settle(
                record,
                Stage::Mount,
                AppStatus::SkipBecauseBroken,
                failure,
                hard_fail,
            )
        }
    }
}
