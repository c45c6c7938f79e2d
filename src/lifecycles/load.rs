//! # Load transition.
//!
//! `NOT_LOADED | LOAD_ERROR ─► LOADING_SOURCE_CODE ─► NOT_BOOTSTRAPPED`
//!
//! The first caller starts the load and parks a shared handle on the record; every
//! concurrent caller awaits the same handle. The handle is cleared once the final
//! status is set.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::time::Instant;

use crate::apps::{AppStatus, LoadedHooks, Props, Record, Stage};
use crate::core::Runtime;
use crate::error::{HookError, LifecycleError, LifecycleFailure};
use crate::lifecycles::fail::classify;
use crate::policies::AppTimeouts;

type Fetched = (LoadedHooks, Option<AppTimeouts>);

/// Loads `record` if it is loadable, or joins the load already in flight.
///
/// With `hard_fail` unset a failed load still resolves `Ok`; the record's status
/// tells what happened.
pub(crate) async fn to_load(
    rt: &Arc<Runtime>,
    record: &Arc<Record>,
    hard_fail: bool,
) -> Result<(), LifecycleError> {
    let pending = record.begin_load(|| {
        let rt = Arc::clone(rt);
        let record = Arc::clone(record);
        async move {
            let result = match fetch_module(&rt, &record).await {
                Ok((hooks, timeouts)) => {
                    record.install(hooks, timeouts);
                    Ok(())
                }
                Err((AppStatus::LoadError, failure)) => {
                    record.mark_load_error(Instant::now());
                    Err(classify(&record, Stage::Load, AppStatus::LoadError, failure))
                }
                Err((status, failure)) => Err(classify(&record, Stage::Load, status, failure)),
            };
            record.finish_load();
            result
        }
        .boxed()
        .shared()
    });

    match pending {
        Some(pending) => match pending.await {
            Err(err) if hard_fail => Err(err),
            _ => Ok(()),
        },
        None => Ok(()),
    }
}

/// Runs the loading function and validates what it produced.
///
/// The error side carries the status the failure maps to.
async fn fetch_module(
    rt: &Arc<Runtime>,
    record: &Arc<Record>,
) -> Result<Fetched, (AppStatus, LifecycleFailure)> {
    let broken = AppStatus::SkipBecauseBroken;
    let props = Props::for_record(rt, record);

    let started = std::panic::catch_unwind(AssertUnwindSafe(|| record.loader.load(props)));
    let fut = match started {
        Ok(Ok(fut)) => fut,
        Ok(Err(e)) => {
            let reason = e.to_string();
            return Err((broken, LifecycleFailure::LoaderContract { reason }));
        }
        Err(payload) => return Err((broken, HookError::from_panic(&*payload).into())),
    };

    let module = match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(module)) => module,
        Ok(Err(e)) => return Err((AppStatus::LoadError, e.into())),
        Err(payload) => return Err((broken, HookError::from_panic(&*payload).into())),
    };

    module
        .into_hooks(record.object)
        .map_err(|reason| (broken, LifecycleFailure::InvalidModule { reason }))
}
