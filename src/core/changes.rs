//! # Change-set classifier.
//!
//! One pass over the registry partitions applications into four disjoint queues,
//! each keeping registry order:
//!
//! | Status                               | Condition                         | Queue      |
//! |--------------------------------------|-----------------------------------|------------|
//! | `LOAD_ERROR`                         | active, cooldown elapsed          | load       |
//! | `NOT_LOADED`, `LOADING_SOURCE_CODE`  | active                            | load       |
//! | `NOT_BOOTSTRAPPED`, `NOT_MOUNTED`    | inactive, unload requested        | unload     |
//! | `NOT_BOOTSTRAPPED`, `NOT_MOUNTED`    | active                            | mount      |
//! | `MOUNTED`                            | inactive                          | unmount    |
//! | in-flight statuses, broken           | any                               | (ignored)  |
//!
//! A panicking activity predicate counts as inactive and breaks its application.
//! Broken applications are not evaluated.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::apps::{AppStatus, Location, Record, Stage};
use crate::error::HookError;
use crate::lifecycles::classify;

/// Queues computed for one reroute pass.
#[derive(Default)]
pub(crate) struct AppChanges {
    pub(crate) to_unload: Vec<Arc<Record>>,
    pub(crate) to_unmount: Vec<Arc<Record>>,
    pub(crate) to_load: Vec<Arc<Record>>,
    pub(crate) to_mount: Vec<Arc<Record>>,
}

pub(crate) fn app_changes(
    apps: &[Arc<Record>],
    location: &Location,
    now: Instant,
    cooldown: Duration,
    unload_requested: impl Fn(&str) -> bool,
) -> AppChanges {
    let mut changes = AppChanges::default();

    for app in apps {
        let status = app.status();
        let active = status != AppStatus::SkipBecauseBroken && should_be_active(app, location);

        match status {
            AppStatus::LoadError => {
                let cooled = app
                    .load_error_time()
                    .map_or(true, |at| now.saturating_duration_since(at) >= cooldown);
                if active && cooled {
                    changes.to_load.push(Arc::clone(app));
                }
            }
            AppStatus::NotLoaded | AppStatus::LoadingSourceCode => {
                if active {
                    changes.to_load.push(Arc::clone(app));
                }
            }
            AppStatus::NotBootstrapped | AppStatus::NotMounted => {
                if !active && unload_requested(&app.name) {
                    changes.to_unload.push(Arc::clone(app));
                } else if active {
                    changes.to_mount.push(Arc::clone(app));
                }
            }
            AppStatus::Mounted => {
                if !active {
                    changes.to_unmount.push(Arc::clone(app));
                }
            }
            AppStatus::Bootstrapping
            | AppStatus::Mounting
            | AppStatus::Unmounting
            | AppStatus::Unloading
            | AppStatus::SkipBecauseBroken => {}
        }
    }
    changes
}

/// Evaluates the activity predicate; a panic breaks the application.
pub(crate) fn should_be_active(record: &Record, location: &Location) -> bool {
    let Some(active_when) = &record.active_when else {
        return false;
    };
    match std::panic::catch_unwind(AssertUnwindSafe(|| active_when(location))) {
        Ok(active) => active,
        Err(payload) => {
            classify(
                record,
                Stage::Activity,
                AppStatus::SkipBecauseBroken,
                HookError::from_panic(&*payload).into(),
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::{AppModule, AppSpec, Lifecycle, Ready};
    use crate::events::Bus;
    use crate::policies::AppTimeouts;

    fn app(name: &str, status: AppStatus, active: bool) -> Arc<Record> {
        let spec = AppSpec::new(
            name,
            Ready::arc(AppModule::new().with_mount(Lifecycle::noop())),
            move |_| active,
        );
        let rec = Arc::new(Record::application(spec, AppTimeouts::default(), Bus::new(16)));
        rec.set_status(status);
        rec
    }

    fn names(queue: &[Arc<Record>]) -> Vec<&str> {
        queue.iter().map(|r| &*r.name).collect()
    }

    const COOLDOWN: Duration = Duration::from_millis(200);

    #[test]
    fn test_partitions_by_status_and_activity() {
        let apps = vec![
            app("fresh", AppStatus::NotLoaded, true),
            app("idle", AppStatus::NotLoaded, false),
            app("loading", AppStatus::LoadingSourceCode, true),
            app("ready", AppStatus::NotMounted, true),
            app("parked", AppStatus::NotBootstrapped, false),
            app("leaving", AppStatus::Mounted, false),
            app("staying", AppStatus::Mounted, true),
            app("busy", AppStatus::Mounting, true),
            app("broken", AppStatus::SkipBecauseBroken, true),
        ];
        let changes = app_changes(&apps, &Location::default(), Instant::now(), COOLDOWN, |name| {
            name == "parked"
        });

        assert_eq!(names(&changes.to_load), vec!["fresh", "loading"]);
        assert_eq!(names(&changes.to_mount), vec!["ready"]);
        assert_eq!(names(&changes.to_unmount), vec!["leaving"]);
        assert_eq!(names(&changes.to_unload), vec!["parked"]);
    }

    #[test]
    fn test_inactive_without_waiter_is_left_alone() {
        let apps = vec![app("parked", AppStatus::NotMounted, false)];
        let changes = app_changes(&apps, &Location::default(), Instant::now(), COOLDOWN, |_| false);
        assert!(changes.to_unload.is_empty());
        assert!(changes.to_mount.is_empty());
    }

    #[test]
    fn test_load_error_waits_for_cooldown() {
        let failed = app("flaky", AppStatus::NotLoaded, true);
        let t0 = Instant::now();
        failed.mark_load_error(t0);
        let apps = vec![failed];
        let loc = Location::default();

        let early = app_changes(&apps, &loc, t0 + Duration::from_millis(100), COOLDOWN, |_| false);
        assert!(early.to_load.is_empty());

        let late = app_changes(&apps, &loc, t0 + Duration::from_millis(250), COOLDOWN, |_| false);
        assert_eq!(names(&late.to_load), vec!["flaky"]);
    }

    #[test]
    fn test_panicking_predicate_breaks_app() {
        let spec = AppSpec::new(
            "explodes",
            Ready::arc(AppModule::new().with_mount(Lifecycle::noop())),
            |_| panic!("bad predicate"),
        );
        let rec = Arc::new(Record::application(spec, AppTimeouts::default(), Bus::new(16)));
        rec.set_status(AppStatus::Mounted);

        let changes = app_changes(&[Arc::clone(&rec)], &Location::default(), Instant::now(), COOLDOWN, |_| false);
        assert_eq!(rec.status(), AppStatus::SkipBecauseBroken);
        assert_eq!(names(&changes.to_unmount), vec!["explodes"]);

        let again = app_changes(&[Arc::clone(&rec)], &Location::default(), Instant::now(), COOLDOWN, |_| false);
        assert!(again.to_unmount.is_empty());
    }
}
