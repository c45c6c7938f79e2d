//! # Unload transition.
//!
//! Only runs for records someone asked to unload (an unload waiter exists).
//!
//! ```text
//! NOT_BOOTSTRAPPED | NOT_MOUNTED   ─► UNLOADING ─► unload hooks ─┬─ ok ──► NOT_LOADED (pristine)
//! LOAD_ERROR | SKIP_BECAUSE_BROKEN                               └─ err ─► SKIP_BECAUSE_BROKEN
//! NOT_LOADED                       ─► waiter settled right away
//! UNLOADING                        ─► joins the waiter
//! anything else                    ─► no-op, the waiter stays parked
//! ```
//!
//! Records without installed capabilities (a failed load) have no hooks to run.
//! The waiter is settled with the outcome; the transition itself never fails.
//! Returns `false` only when the waiter is still parked.

use std::sync::Arc;

use crate::apps::{AppStatus, Props, Record, Stage};
use crate::core::Runtime;
use crate::lifecycles::fail::classify;
use crate::lifecycles::runner::run_stage;

pub(crate) async fn to_unload(rt: &Arc<Runtime>, record: &Arc<Record>) -> bool {
    let Some(waiter) = rt.waiters.get(&record.name) else {
        return true;
    };

    let prev = record.begin(
        &[
            AppStatus::NotBootstrapped,
            AppStatus::NotMounted,
            AppStatus::LoadError,
            AppStatus::SkipBecauseBroken,
        ],
        AppStatus::Unloading,
    );
    if prev.is_none() {
        match record.status() {
            AppStatus::NotLoaded => {
                record.reset();
                rt.waiters.settle(&record.name, Ok(()));
                return true;
            }
            AppStatus::Unloading => {
                let _ = waiter.await;
                return true;
            }
            _ => return false,
        }
    }

    let outcome = match record.hooks() {
        Some(hooks) => {
            let props = Props::for_record(rt, record);
            run_stage(record, Stage::Unload, hooks.unload.clone(), props).await
        }
        None => Ok(()),
    };

    match outcome {
        Ok(()) => {
            record.reset();
            rt.waiters.settle(&record.name, Ok(()));
        }
        Err(failure) => {
            record.clear_hooks();
            let err = classify(record, Stage::Unload, AppStatus::SkipBecauseBroken, failure);
            rt.waiters.settle(&record.name, Err(err));
        }
    }
    true
}
