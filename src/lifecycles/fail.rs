//! # Failure classification.
//!
//! Turns a [`LifecycleFailure`] into a [`LifecycleError`], forces the record into
//! the status the failure maps to and reports it on the bus.
//!
//! | Failure                                   | Forced status         | Event        |
//! |-------------------------------------------|-----------------------|--------------|
//! | async load rejection                      | `LOAD_ERROR`          | `LoadFailed` |
//! | loader contract, invalid module, panic    | `SKIP_BECAUSE_BROKEN` | `AppBroken`  |
//! | hook error or timeout at any later stage  | `SKIP_BECAUSE_BROKEN` | `AppBroken`  |
//!
//! Hard-fail callers receive the error; everyone else only observes the status.

use std::sync::Arc;

use crate::apps::{AppStatus, Record, Stage};
use crate::error::{LifecycleError, LifecycleFailure};
use crate::events::{Event, EventKind};

/// Forces `status`, publishes the failure and returns the classified error.
pub(crate) fn classify(
    record: &Record,
    stage: Stage,
    status: AppStatus,
    failure: LifecycleFailure,
) -> LifecycleError {
    record.set_status(status);

    let kind = match status {
        AppStatus::LoadError => EventKind::LoadFailed,
        _ => EventKind::AppBroken,
    };
    record.bus().publish(
        Event::new(kind)
            .with_app(Arc::clone(&record.name))
            .with_object(record.object)
            .with_stage(stage)
            .with_status(status)
            .with_reason(failure.to_string()),
    );

    LifecycleError {
        name: Arc::clone(&record.name),
        object: record.object,
        stage,
        status,
        failure,
    }
}

/// Like [`classify`], but only surfaces the error when `hard_fail` is set.
pub(crate) fn settle(
    record: &Record,
    stage: Stage,
    status: AppStatus,
    failure: LifecycleFailure,
    hard_fail: bool,
) -> Result<(), LifecycleError> {
    let err = classify(record, stage, status, failure);
    if hard_fail {
        Err(err)
    } else {
        Ok(())
    }
}
