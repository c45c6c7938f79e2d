//! # Bootstrap transition.
//!
//! `NOT_BOOTSTRAPPED ─► BOOTSTRAPPING ─► NOT_MOUNTED`, or `SKIP_BECAUSE_BROKEN` on failure.

use std::sync::Arc;

use crate::apps::{AppStatus, Props, Record, Stage};
use crate::core::Runtime;
use crate::error::LifecycleError;
use crate::lifecycles::fail::settle;
use crate::lifecycles::runner::run_stage;

pub(crate) async fn to_bootstrap(
    rt: &Arc<Runtime>,
    record: &Arc<Record>,
    hard_fail: bool,
) -> Result<(), LifecycleError> {
    if record
        .begin(&[AppStatus::NotBootstrapped], AppStatus::Bootstrapping)
        .is_none()
    {
        return Ok(());
    }

    let lifecycle = record
        .hooks()
        .map(|h| h.bootstrap.clone())
        .unwrap_or_default();
    let props = Props::for_record(rt, record);

    match run_stage(record, Stage::Bootstrap, lifecycle, props).await {
        Ok(()) => {
            record.set_status(AppStatus::NotMounted);
            Ok(())
        }
        Err(failure) => settle(
            record,
            Stage::Bootstrap,
            AppStatus::SkipBecauseBroken,
            failure,
            hard_fail,
        ),
    }
}
