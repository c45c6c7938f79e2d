use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use appvisor::{
    AppModule, AppSpec, AppStatus, Config, Event, EventKind, HookError, HookFn, Lifecycle,
    LoadFn, Location, Orchestrator, ParcelConfig, Props, Ready, RegistryError, RuntimeError,
    Stage, UnloadOptions,
};
use serde_json::Map;
use tokio::sync::broadcast;

fn orchestrator() -> Orchestrator {
    Orchestrator::new(Config {
        reroute_on_register: false,
        ..Config::default()
    })
}

fn always(_: &Location) -> bool {
    true
}

fn mount_only() -> AppModule {
    AppModule::new().with_mount(Lifecycle::noop())
}

fn counter(hits: &Arc<AtomicUsize>) -> Lifecycle {
    let hits = Arc::clone(hits);
    Lifecycle::from_hook(HookFn::arc(move |_props: Props| {
        let hits = Arc::clone(&hits);
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }))
}

fn failing(message: &'static str) -> Lifecycle {
    Lifecycle::new(move |_props: Props| async move { Err(HookError::msg(message)) })
}

fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

fn statuses(events: &[Event], name: &str) -> Vec<AppStatus> {
    events
        .iter()
        .filter(|ev| ev.kind == EventKind::StatusChanged && ev.app.as_deref() == Some(name))
        .filter_map(|ev| ev.status)
        .collect()
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let orch = orchestrator();
    orch.register_application(AppSpec::new("nav", Ready::arc(mount_only()), always))
        .unwrap();

    let err = orch
        .register_application(AppSpec::new("nav", Ready::arc(mount_only()), always))
        .unwrap_err();
    assert_eq!(err, RegistryError::DuplicateName { name: "nav".into() });
    assert_eq!(orch.get_app_names(), vec!["nav"]);
}

#[tokio::test]
async fn empty_name_is_rejected() {
    let orch = orchestrator();
    let err = orch
        .register_application(AppSpec::new("", Ready::arc(mount_only()), always))
        .unwrap_err();
    assert_eq!(err, RegistryError::InvalidName);
    assert!(orch.get_app_names().is_empty());
}

#[tokio::test]
async fn unregistering_unknown_name_fails() {
    let orch = orchestrator();
    orch.register_application(AppSpec::new("nav", Ready::arc(mount_only()), always))
        .unwrap();

    let err = orch.unregister_application("missing").await.unwrap_err();
    assert_eq!(
        err,
        RuntimeError::Registry(RegistryError::NotRegistered {
            name: "missing".into()
        })
    );
    assert_eq!(orch.get_app_names(), vec!["nav"]);
}

#[tokio::test]
async fn unregistering_frees_the_name() {
    let orch = orchestrator();
    let unmounts = Arc::new(AtomicUsize::new(0));
    let module = mount_only().with_unmount(counter(&unmounts));
    orch.register_application(AppSpec::new("nav", Ready::arc(module), always))
        .unwrap();
    assert_eq!(orch.reroute().await, vec!["nav"]);

    orch.unregister_application("nav").await.unwrap();
    assert_eq!(orch.get_app_status("nav"), None);
    assert_eq!(unmounts.load(Ordering::SeqCst), 1);

    orch.register_application(AppSpec::new("nav", Ready::arc(mount_only()), always))
        .unwrap();
    assert_eq!(orch.get_app_status("nav"), Some(AppStatus::NotLoaded));
}

#[tokio::test]
async fn mount_without_bootstrap_reaches_mounted_in_one_pass() {
    let orch = orchestrator();
    orch.register_application(AppSpec::new("nav", Ready::arc(mount_only()), always))
        .unwrap();

    let mut rx = orch.subscribe();
    assert_eq!(orch.reroute().await, vec!["nav"]);
    assert_eq!(
        statuses(&drain(&mut rx), "nav"),
        vec![
            AppStatus::LoadingSourceCode,
            AppStatus::NotBootstrapped,
            AppStatus::Bootstrapping,
            AppStatus::NotMounted,
            AppStatus::Mounting,
            AppStatus::Mounted,
        ]
    );
}

#[tokio::test]
async fn module_without_mount_stays_broken() {
    let orch = orchestrator();
    let loads = Arc::new(AtomicUsize::new(0));
    let calls = Arc::clone(&loads);
    let loader = LoadFn::arc(move |_props: Props| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Ok::<_, HookError>(AppModule::new()) }
    });
    orch.register_application(AppSpec::new("empty", loader, always))
        .unwrap();

    let mut rx = orch.subscribe();
    assert!(orch.reroute().await.is_empty());
    assert_eq!(orch.get_app_status("empty"), Some(AppStatus::SkipBecauseBroken));

    let broken = drain(&mut rx)
        .into_iter()
        .find(|ev| ev.kind == EventKind::AppBroken)
        .unwrap();
    assert_eq!(broken.app.as_deref(), Some("empty"));

    orch.navigate_to_url("/elsewhere").await;
    orch.reroute().await;
    assert_eq!(orch.get_app_status("empty"), Some(AppStatus::SkipBecauseBroken));
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_mount_is_unmounted_then_broken() {
    let orch = orchestrator();
    let unmounts = Arc::new(AtomicUsize::new(0));
    let module = AppModule::new()
        .with_mount(failing("no root element"))
        .with_unmount(counter(&unmounts));
    orch.register_application(AppSpec::new("dash", Ready::arc(module), always))
        .unwrap();

    let mut rx = orch.subscribe();
    assert!(orch.reroute().await.is_empty());

    let seen = statuses(&drain(&mut rx), "dash");
    let tail = &seen[seen.len() - 4..];
    assert_eq!(
        tail,
        [
            AppStatus::Mounted,
            AppStatus::Unmounting,
            AppStatus::NotMounted,
            AppStatus::SkipBecauseBroken,
        ]
    );
    assert_eq!(unmounts.load(Ordering::SeqCst), 1);

    orch.reroute().await;
    assert_eq!(unmounts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_cleanup_after_failed_mount_is_reported_once() {
    let orch = orchestrator();
    let module = AppModule::new()
        .with_mount(failing("mount boom"))
        .with_unmount(failing("unmount boom"));
    orch.register_application(AppSpec::new("dash", Ready::arc(module), always))
        .unwrap();

    let mut rx = orch.subscribe();
    orch.reroute().await;

    let broken: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter(|ev| ev.kind == EventKind::AppBroken)
        .collect();
    assert_eq!(broken.len(), 1);
    assert_eq!(broken[0].stage, Some(Stage::Mount));
    assert_eq!(broken[0].reason.as_deref(), Some("mount boom"));
    assert_eq!(orch.get_app_status("dash"), Some(AppStatus::SkipBecauseBroken));
}

#[tokio::test]
async fn broken_app_runs_its_unload_hook_on_unregister() {
    let orch = orchestrator();
    let unloads = Arc::new(AtomicUsize::new(0));
    let module = AppModule::new()
        .with_mount(failing("no root element"))
        .with_unload(counter(&unloads));
    orch.register_application(AppSpec::new("dash", Ready::arc(module), always))
        .unwrap();
    orch.reroute().await;
    assert_eq!(orch.get_app_status("dash"), Some(AppStatus::SkipBecauseBroken));

    orch.unregister_application("dash").await.unwrap();
    assert_eq!(unloads.load(Ordering::SeqCst), 1);
    assert_eq!(orch.get_app_status("dash"), None);
}

#[tokio::test(start_paused = true)]
async fn unregister_during_mount_unmounts_before_removal() {
    let orch = orchestrator();
    let unmounts = Arc::new(AtomicUsize::new(0));
    let module = AppModule::new()
        .with_mount(Lifecycle::new(|_props: Props| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(())
        }))
        .with_unmount(counter(&unmounts));
    orch.register_application(AppSpec::new("slow", Ready::arc(module), always))
        .unwrap();

    let (_, unregistered) = tokio::join!(orch.reroute(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(orch.get_app_status("slow"), Some(AppStatus::Mounting));
        orch.unregister_application("slow").await
    });

    assert_eq!(unregistered, Ok(()));
    assert_eq!(unmounts.load(Ordering::SeqCst), 1);
    assert_eq!(orch.get_app_status("slow"), None);
    assert!(orch.get_mounted_apps().is_empty());
}

#[tokio::test(start_paused = true)]
async fn load_error_is_retried_after_cooldown() {
    let orch = orchestrator();
    let loads = Arc::new(AtomicUsize::new(0));
    let calls = Arc::clone(&loads);
    let loader = LoadFn::arc(move |_props: Props| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err::<AppModule, _>(HookError::msg("network down")) }
    });
    orch.register_application(AppSpec::new("remote", loader, always))
        .unwrap();

    let mut rx = orch.subscribe();
    orch.reroute().await;
    assert_eq!(orch.get_app_status("remote"), Some(AppStatus::LoadError));
    assert!(drain(&mut rx)
        .iter()
        .any(|ev| ev.kind == EventKind::LoadFailed));

    tokio::time::advance(Duration::from_millis(100)).await;
    orch.reroute().await;
    assert_eq!(loads.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_millis(150)).await;
    orch.reroute().await;
    assert_eq!(loads.load(Ordering::SeqCst), 2);
    assert_eq!(orch.get_app_status("remote"), Some(AppStatus::LoadError));
}

#[tokio::test]
async fn concurrent_unloads_share_one_operation() {
    let orch = orchestrator();
    let unloads = Arc::new(AtomicUsize::new(0));
    let module = mount_only().with_unload(counter(&unloads));
    orch.register_application(AppSpec::new("nav", Ready::arc(module), always))
        .unwrap();
    orch.reroute().await;

    let (a, b) = tokio::join!(
        orch.unload_application("nav", UnloadOptions::default()),
        orch.unload_application("nav", UnloadOptions::default()),
    );
    assert_eq!(a, Ok(()));
    assert_eq!(b, Ok(()));
    assert_eq!(unloads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn waiting_unload_resolves_when_app_leaves() {
    let orch = orchestrator();
    let unloads = Arc::new(AtomicUsize::new(0));
    let module = mount_only().with_unload(counter(&unloads));
    orch.register_application(AppSpec::new("home", Ready::arc(module), |loc: &Location| {
        loc.pathname() == "/"
    }))
    .unwrap();
    orch.reroute().await;

    let waiting = orch.unload_application(
        "home",
        UnloadOptions {
            wait_for_unmount: true,
        },
    );
    let (outcome, mounted) = tokio::join!(waiting, orch.navigate_to_url("/away"));
    assert_eq!(outcome, Ok(()));
    assert!(mounted.is_empty());
    assert_eq!(unloads.load(Ordering::SeqCst), 1);
    assert_eq!(orch.get_app_status("home"), Some(AppStatus::NotLoaded));
}

#[tokio::test]
async fn parent_unmounts_parcels_first_and_still_cleans_up() {
    let orch = orchestrator();
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    let parcel_module = |label: &'static str, fail: bool| {
        let order = Arc::clone(&order);
        AppModule::new()
            .with_mount(Lifecycle::noop())
            .with_unmount(Lifecycle::new(move |_props: Props| {
                let order = Arc::clone(&order);
                async move {
                    order.lock().unwrap().push(label);
                    if fail {
                        Err(HookError::msg("widget stuck"))
                    } else {
                        Ok(())
                    }
                }
            }))
    };
    let good = parcel_module("good", false);
    let bad = parcel_module("bad", true);

    let parent_order = Arc::clone(&order);
    let module = AppModule::new()
        .with_mount(Lifecycle::new(move |props: Props| {
            let (good, bad) = (good.clone(), bad.clone());
            async move {
                for module in [good, bad] {
                    let parcel = props
                        .mount_parcel(ParcelConfig::new(module), Map::new())
                        .map_err(|e| HookError::msg(e.to_string()))?;
                    parcel
                        .mount_promise()
                        .await
                        .map_err(|e| HookError::msg(e.to_string()))?;
                }
                Ok::<(), HookError>(())
            }
        }))
        .with_unmount(Lifecycle::new(move |_props: Props| {
            let order = Arc::clone(&parent_order);
            async move {
                order.lock().unwrap().push("parent");
                Ok(())
            }
        }));
    orch.register_application(AppSpec::new("shell", Ready::arc(module), |loc: &Location| {
        loc.pathname() == "/"
    }))
    .unwrap();
    assert_eq!(orch.reroute().await, vec!["shell"]);

    let mut rx = orch.subscribe();
    assert!(orch.navigate_to_url("/away").await.is_empty());

    let order = order.lock().unwrap().clone();
    assert_eq!(order.len(), 3);
    assert_eq!(order[2], "parent");
    assert!(order[..2].contains(&"good") && order[..2].contains(&"bad"));
    assert_eq!(orch.get_app_status("shell"), Some(AppStatus::SkipBecauseBroken));

    let broken: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter(|ev| ev.kind == EventKind::AppBroken)
        .collect();
    let shell = broken
        .iter()
        .find(|ev| ev.app.as_deref() == Some("shell"))
        .unwrap();
    let reason = shell.reason.as_deref().unwrap();
    assert!(reason.starts_with("1 child parcel(s) failed to unmount"));
    assert!(reason.contains("widget stuck"));
}

#[tokio::test]
async fn panicking_predicate_breaks_only_its_app() {
    let orch = orchestrator();
    orch.register_application(AppSpec::new("ok", Ready::arc(mount_only()), always))
        .unwrap();
    orch.register_application(AppSpec::new(
        "explodes",
        Ready::arc(mount_only()),
        |_: &Location| -> bool { panic!("bad predicate") },
    ))
    .unwrap();

    assert_eq!(orch.reroute().await, vec!["ok"]);
    assert_eq!(orch.get_app_status("explodes"), Some(AppStatus::SkipBecauseBroken));
}

#[tokio::test]
async fn custom_props_reach_hooks_without_shadowing_name() {
    let orch = orchestrator();
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);
    let module = AppModule::new().with_mount(Lifecycle::new(move |props: Props| {
        let record = Arc::clone(&record);
        async move {
            record
                .lock()
                .unwrap()
                .push((props.get("name"), props.get("theme")));
            Ok(())
        }
    }));
    let custom = serde_json::json!({ "name": "spoofed", "theme": "dark" })
        .as_object()
        .cloned()
        .unwrap();
    orch.register_application(
        AppSpec::new("nav", Ready::arc(module), always).with_custom_props(custom),
    )
    .unwrap();

    orch.reroute().await;
    assert_eq!(
        *seen.lock().unwrap(),
        vec![(
            Some(serde_json::json!("nav")),
            Some(serde_json::json!("dark"))
        )]
    );
}
