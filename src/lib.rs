//! # appvisor
//!
//! **Appvisor** drives the lifecycles of independently developed applications that
//! share one host and are activated by the current location.
//!
//! Each application is registered with a loading function and an activity
//! predicate. On every routing event the orchestrator works out which applications
//! must leave and which must arrive, then moves each one through
//! load → bootstrap → mount → unmount → unload. Applications can mount nested
//! lifecycle scopes ("parcels") of their own.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   AppSpec    │   │   AppSpec    │   │   AppSpec    │
//!     │ (loader,     │   │ (loader,     │   │ (loader,     │
//!     │  predicate)  │   │  predicate)  │   │  predicate)  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Orchestrator                                                     │
//! │  - Registry (ordered records, unique names)                       │
//! │  - Location + captured navigation listeners                       │
//! │  - Unload waiters                                                 │
//! │  - Bus (broadcast events)                                         │
//! └──────┬────────────────────────────────────────────────────────────┘
//!        │ reroute()
//!        ▼
//!   app_changes() ──► to_unmount / to_unload ─┐
//!                 ──► to_load / to_bootstrap ─┴─► to_mount ─► listeners replayed
//!                                                   │
//!                                                   └─► parcels (hard-fail chains)
//!
//!  transitions ── publish(Event) ──► Bus ──► subscriber_listener ──► SubscriberSet
//!                                                              ┌─────────┼─────────┐
//!                                                              ▼         ▼         ▼
//!                                                           worker1   worker2   workerN
//! ```
//!
//! ### Status model
//! ```text
//! NOT_LOADED ─► LOADING_SOURCE_CODE ─┬─► NOT_BOOTSTRAPPED ─► BOOTSTRAPPING ─► NOT_MOUNTED
//!     ▲                              └─► LOAD_ERROR (retried after cooldown)      │  ▲
//!     │                                                                  MOUNTING │  │ UNMOUNTING
//!     └──────────────── UNLOADING ◄── NOT_MOUNTED                                 ▼  │
//!                                                                             MOUNTED
//! any failure outside loading ─► SKIP_BECAUSE_BROKEN (ignored until unloaded or re-registered)
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                              |
//! |-------------------|---------------------------------------------------------------|-------------------------------------------------|
//! | **Orchestration** | Registration, reroute, navigation, unload.                    | [`Orchestrator`], [`OrchestratorBuilder`]       |
//! | **Applications**  | Loading functions, modules and lifecycle hooks.               | [`AppSpec`], [`AppModule`], [`Lifecycle`]       |
//! | **Parcels**       | Nested lifecycle scopes owned by an application.              | [`ParcelConfig`], [`ParcelHandle`]              |
//! | **Policies**      | Per-stage time limits and warning spacing.                    | [`AppTimeouts`], [`StageTimeout`]               |
//! | **Subscriber API**| Observe status changes, failures and reroutes.                | [`Subscribe`], [`Event`]                        |
//! | **Errors**        | Typed errors for registration and lifecycle failures.         | [`RegistryError`], [`LifecycleError`]           |
//! | **Configuration** | Centralize runtime settings.                                  | [`Config`]                                      |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use appvisor::{AppModule, AppSpec, Config, HookError, Lifecycle, Location, Orchestrator, Props, Ready};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let orch = Orchestrator::new(Config::default());
//!
//!     let module = AppModule::new().with_mount(Lifecycle::new(|props: Props| async move {
//!         println!("mounted {}", props.name());
//!         Ok::<(), HookError>(())
//!     }));
//!     orch.register_application(AppSpec::new("settings", Ready::arc(module), |loc: &Location| {
//!         loc.pathname().starts_with("/settings")
//!     }))
//!     .expect("valid registration");
//!
//!     let mounted = orch.navigate_to_url("/settings/profile").await;
//!     assert_eq!(mounted, vec!["settings"]);
//!     orch.shutdown().await;
//! }
//! ```
mod apps;
mod core;
mod error;
mod events;
mod lifecycles;
mod parcels;
mod policies;
mod subscribers;

// ---- Public re-exports ----

pub use apps::{
    ActivityFn, AppModule, AppSpec, AppStatus, CustomProps, CustomPropsFn, Hook, HookFn,
    HookFuture, HookRef, Lifecycle, Load, LoadFn, LoadFuture, LoaderRef, Location, ObjectKind,
    Props, Ready, Stage, TryLoadFn,
};
pub use core::{
    Config, ListenerId, NavigationEvent, NavigationEventKind, NavigationListener, Orchestrator,
    OrchestratorBuilder, UnloadOptions,
};
pub use error::{HookError, LifecycleError, LifecycleFailure, RegistryError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use parcels::{ParcelConfig, ParcelHandle, ParcelPromise};
pub use policies::{AppTimeouts, BackoffPolicy, StageTimeout};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
