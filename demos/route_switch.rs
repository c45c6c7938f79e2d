//! # Example: Route Switch
//!
//! Three applications share one host:
//! - `navbar` is always active;
//! - `settings` is active under `/settings` and mounts a `clock` parcel;
//! - `reports` is active under `/reports`, but its mount fails.
//!
//! Navigating between routes shows applications leaving before others arrive, the
//! parcel unmounting with its owner, and a broken application being isolated.
//!
//! Run with: `cargo run --example route_switch --features logging`

use std::sync::Arc;
use std::time::Duration;

use appvisor::{
    AppModule, AppSpec, Config, HookError, Lifecycle, LoadFn, LogWriter, Location, Orchestrator,
    ParcelConfig, Props, Ready, Subscribe,
};
use serde_json::{json, Map};

fn clock() -> AppModule {
    AppModule::new()
        .with_mount(Lifecycle::new(|props: Props| async move {
            println!("  <{}> ticking", props.name());
            Ok::<(), HookError>(())
        }))
        .with_unmount(Lifecycle::new(|props: Props| async move {
            println!("  <{}> stopped", props.name());
            Ok::<(), HookError>(())
        }))
}

fn settings() -> AppModule {
    AppModule::new()
        .with_bootstrap(Lifecycle::new(|props: Props| async move {
            println!("  <{}> bootstrap theme={:?}", props.name(), props.get("theme"));
            Ok::<(), HookError>(())
        }))
        .with_mount(Lifecycle::new(|props: Props| async move {
            let parcel = props
                .mount_parcel(ParcelConfig::new(clock()).with_name("clock"), Map::new())
                .map_err(|e| HookError::msg(e.to_string()))?;
            parcel
                .mount_promise()
                .await
                .map_err(|e| HookError::msg(e.to_string()))
        }))
        .with_unmount(Lifecycle::noop())
}

fn reports() -> AppModule {
    AppModule::new().with_mount(Lifecycle::new(|_props: Props| async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Err(HookError::msg("chart library missing"))
    }))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cfg = Config {
        reroute_on_register: false,
        ..Config::default()
    };
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let orch = Orchestrator::builder(cfg)
        .with_subscribers(subs)
        .with_location("http://localhost/")
        .build();

    orch.register_application(AppSpec::new(
        "navbar",
        Ready::arc(AppModule::new().with_mount(Lifecycle::noop())),
        |_: &Location| true,
    ))?;

    let settings_loader = LoadFn::arc(|_props: Props| async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok::<_, HookError>(settings())
    });
    let theme = json!({ "theme": "dark" }).as_object().cloned().unwrap_or_default();
    orch.register_application(
        AppSpec::new("settings", settings_loader, |loc: &Location| {
            loc.pathname().starts_with("/settings")
        })
        .with_custom_props(theme),
    )?;

    orch.register_application(AppSpec::new(
        "reports",
        Ready::arc(reports()),
        |loc: &Location| loc.pathname().starts_with("/reports"),
    ))?;

    for url in ["/", "/settings/profile", "/reports", "/settings"] {
        let mounted = orch.navigate_to_url(url).await;
        println!("==> {url}: mounted {mounted:?}");
    }

    orch.unregister_application("settings").await?;
    println!("==> registered: {:?}", orch.get_app_names());

    orch.shutdown().await;
    Ok(())
}
