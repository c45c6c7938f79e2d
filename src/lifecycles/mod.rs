//! Lifecycle transitions.
//!
//! Each transition claims its source status on the record and is a successful no-op
//! for a record in any other status, so callers may invoke every transition for every
//! candidate without guards.
//!
//! ```text
//! to_load ─► to_bootstrap ─► to_mount ─► to_unmount ─► to_unload
//!                               │            ▲
//!                               └─(failure)──┘
//! ```
//!
//! Internal modules:
//! - [`runner`]: runs one stage under its time limits;
//! - [`fail`]: maps failures to statuses and events;
//! - one module per transition.
//!
//! `hard_fail` selects who sees a failure: the orchestrator passes `false` and
//! only observes statuses; parcel operations pass `true` and get the error.

mod bootstrap;
mod fail;
mod load;
mod mount;
mod runner;
mod unload;
mod unmount;

pub(crate) use bootstrap::to_bootstrap;
pub(crate) use fail::classify;
pub(crate) use load::to_load;
pub(crate) use mount::{to_mount, MountSignals};
pub(crate) use unload::to_unload;
pub(crate) use unmount::to_unmount;

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::apps::{AppModule, AppSpec, AppStatus, HookFn, Lifecycle, LoadFn, Location, Props, Record, TryLoadFn};
    use crate::core::{Config, Orchestrator};
    use crate::error::HookError;
    use crate::policies::AppTimeouts;

    fn quiet() -> Orchestrator {
        Orchestrator::new(Config {
            reroute_on_register: false,
            ..Config::default()
        })
    }

    fn counted(hits: &Arc<AtomicUsize>) -> Lifecycle {
        let hits = Arc::clone(hits);
        Lifecycle::from_hook(HookFn::arc(move |_props: Props| {
            let hits = Arc::clone(&hits);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }))
    }

    fn record(orch: &Orchestrator, spec: AppSpec) -> Arc<Record> {
        let rt = orch.runtime();
        Arc::new(Record::application(spec, AppTimeouts::default(), rt.bus.clone()))
    }

    #[tokio::test]
    async fn test_transitions_outside_source_status_are_noops() {
        let orch = quiet();
        let rt = orch.runtime();
        let loads = Arc::new(AtomicUsize::new(0));
        let hooks = Arc::new(AtomicUsize::new(0));

        let module = AppModule::new()
            .with_bootstrap(counted(&hooks))
            .with_mount(counted(&hooks))
            .with_unmount(counted(&hooks))
            .with_unload(counted(&hooks));
        let calls = Arc::clone(&loads);
        let loader = LoadFn::arc(move |_props: Props| {
            calls.fetch_add(1, Ordering::SeqCst);
            let module = module.clone();
            async move { Ok::<_, HookError>(module) }
        });
        let rec = record(&orch, AppSpec::new("nav", loader, |_: &Location| true));

        to_bootstrap(rt, &rec, true).await.unwrap();
        to_mount(rt, &rec, true).await.unwrap();
        to_unmount(rt, &rec, true).await.unwrap();
        to_unload(rt, &rec).await;
        assert_eq!(rec.status(), AppStatus::NotLoaded);
        assert_eq!(hooks.load(Ordering::SeqCst), 0);

        to_load(rt, &rec, true).await.unwrap();
        to_load(rt, &rec, true).await.unwrap();
        to_mount(rt, &rec, true).await.unwrap();
        assert_eq!(rec.status(), AppStatus::NotBootstrapped);
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        to_bootstrap(rt, &rec, true).await.unwrap();
        to_bootstrap(rt, &rec, true).await.unwrap();
        assert_eq!(rec.status(), AppStatus::NotMounted);

        to_mount(rt, &rec, true).await.unwrap();
        to_mount(rt, &rec, true).await.unwrap();
        to_load(rt, &rec, true).await.unwrap();
        assert_eq!(rec.status(), AppStatus::Mounted);

        to_unmount(rt, &rec, true).await.unwrap();
        to_unload(rt, &rec).await;
        assert_eq!(rec.status(), AppStatus::NotMounted);
        assert_eq!(hooks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_one_call() {
        let orch = quiet();
        let rt = orch.runtime();
        let loads = Arc::new(AtomicUsize::new(0));
        let calls = Arc::clone(&loads);
        let loader = LoadFn::arc(move |_props: Props| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::task::yield_now().await;
                Ok::<_, HookError>(AppModule::new().with_mount(Lifecycle::noop()))
            }
        });
        let rec = record(&orch, AppSpec::new("nav", loader, |_: &Location| true));

        let (a, b) = tokio::join!(to_load(rt, &rec, true), to_load(rt, &rec, true));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(rec.status(), AppStatus::NotBootstrapped);
    }

    #[tokio::test]
    async fn test_loader_contract_violation_breaks() {
        let orch = quiet();
        let rt = orch.runtime();
        let loader = TryLoadFn::arc(|_props: Props| {
            Err::<std::future::Ready<Result<AppModule, HookError>>, _>(HookError::msg(
                "not a module future",
            ))
        });
        let rec = record(&orch, AppSpec::new("nav", loader, |_: &Location| true));

        let err = to_load(rt, &rec, true).await.unwrap_err();
        assert_eq!(err.as_label(), "lifecycle_loader_contract");
        assert_eq!(err.status, AppStatus::SkipBecauseBroken);
        assert_eq!(rec.status(), AppStatus::SkipBecauseBroken);
        assert!(rec.load_error_time().is_none());
    }

    #[tokio::test]
    async fn test_soft_failures_resolve_ok() {
        let orch = quiet();
        let rt = orch.runtime();
        let module = AppModule::new().with_mount(Lifecycle::noop()).with_bootstrap(
            Lifecycle::new(|_props: Props| async { Err(HookError::msg("bad config")) }),
        );
        let rec = record(
            &orch,
            AppSpec::new("nav", crate::apps::Ready::arc(module), |_: &Location| true),
        );

        to_load(rt, &rec, false).await.unwrap();
        to_bootstrap(rt, &rec, false).await.unwrap();
        assert_eq!(rec.status(), AppStatus::SkipBecauseBroken);
    }
}
