//! # Unmount transition.
//!
//! ```text
//! MOUNTED ─► UNMOUNTING ─► unmount every owned parcel (concurrently)
//!                      ─► own unmount hooks (always, even if a parcel failed)
//!                            ├─ own hooks failed ─► SKIP_BECAUSE_BROKEN (own error)
//!                            ├─ a parcel failed ──► SKIP_BECAUSE_BROKEN (child error)
//!                            └─ otherwise ────────► NOT_MOUNTED
//! ```

use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;

use crate::apps::{AppStatus, Props, Record, Stage};
use crate::core::Runtime;
use crate::error::{LifecycleError, LifecycleFailure};
use crate::lifecycles::fail::settle;
use crate::lifecycles::runner::run_stage;

/// Boxed because parcels unmount through this function recursively.
pub(crate) fn to_unmount<'a>(
    rt: &'a Arc<Runtime>,
    record: &'a Arc<Record>,
    hard_fail: bool,
) -> BoxFuture<'a, Result<(), LifecycleError>> {
    async move {
        match unmount_record(rt, record).await {
            Ok(()) => Ok(()),
            Err(failure) => settle(
                record,
                Stage::Unmount,
                AppStatus::SkipBecauseBroken,
                failure,
                hard_fail,
            ),
        }
    }
    .boxed()
}

/// Runs the unmount without classifying its failure.
///
/// On failure the record is left in `UNMOUNTING` for the caller to settle.
pub(crate) async fn unmount_record(
    rt: &Arc<Runtime>,
    record: &Arc<Record>,
) -> Result<(), LifecycleFailure> {
    if record
        .begin(&[AppStatus::Mounted], AppStatus::Unmounting)
        .is_none()
    {
        return Ok(());
    }

    let children = record.parcels();
    let child_errors: Vec<String> = join_all(children.iter().map(|p| p.unmount_this_parcel()))
        .await
        .into_iter()
        .filter_map(Result::err)
        .map(|err| err.to_string())
        .collect();

    let lifecycle = record.hooks().map(|h| h.unmount.clone()).unwrap_or_default();
    let props = Props::for_record(rt, record);
    run_stage(record, Stage::Unmount, lifecycle, props).await?;

    if !child_errors.is_empty() {
        return Err(LifecycleFailure::ChildUnmount {
            failed: child_errors.len(),
            message: child_errors.join("; "),
        });
    }
    record.set_status(AppStatus::NotMounted);
    Ok(())
}
