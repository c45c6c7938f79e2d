//! # Orchestrator: registry, reroute loop and the public API.
//!
//! The [`Orchestrator`] is a cheap-to-clone handle over one runtime instance. It owns
//! the event bus, the application registry, pending unload waiters, captured
//! navigation listeners and the current location. Several orchestrators can live in
//! one process; they share nothing.
//!
//! ## Reroute
//! ```text
//! trigger (register / navigate / manual)
//!    └─► RerouteStarted
//!    └─► app_changes(registry snapshot, location)
//!          ├─ to_unmount ─► unmount ─► unload      ┐
//!          ├─ to_unload  ─► unload                 ├─ concurrently
//!          ├─ to_load    ─► load ─► bootstrap      │
//!          └─ to_mount   ─► bootstrap              ┘
//!    └─► mount every load/mount candidate still active (concurrently)
//!    └─► replay captured navigation listeners
//!    └─► RerouteSettled ─► names of mounted applications
//! ```
//!
//! ## Rules
//! - A reroute never fails; per-application failures end up in statuses and events.
//! - Within one pass every unmount and unload completes before the first mount starts.
//! - Overlapping passes are allowed; each transition is gated on its source status.
//! - Only explicit calls (`unregister_application`, `unload_application`, parcel
//!   operations) return lifecycle errors to their caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use futures::future::{join, join_all};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::builder::OrchestratorBuilder;
use super::changes::{app_changes, should_be_active};
use super::navigation::{
    CapturedListeners, ListenerId, NavigationEvent, NavigationEventKind, NavigationListener,
};
use super::registry::Registry;
use super::waiters::UnloadWaiters;
use crate::apps::{AppSpec, AppStatus, Location, Record};
use crate::core::Config;
use crate::error::{RegistryError, RuntimeError};
use crate::events::{Bus, Event, EventKind};
use crate::lifecycles::{
    to_bootstrap, to_load, to_mount, to_unload, to_unmount, MountSignals,
};

/// Options for [`Orchestrator::unload_application`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UnloadOptions {
    /// Park the request until the application is unmounted by a reroute instead of
    /// unmounting it right away.
    pub wait_for_unmount: bool,
}

/// State shared by every handle of one orchestrator.
pub(crate) struct Runtime {
    pub(crate) cfg: Config,
    pub(crate) bus: Bus,
    pub(crate) registry: Registry,
    pub(crate) waiters: UnloadWaiters,
    pub(crate) listeners: CapturedListeners,
    pub(crate) signals: MountSignals,
    pub(crate) token: CancellationToken,
    location: RwLock<Location>,
    next_parcel_id: AtomicU64,
    subscriber_listener: Mutex<Option<JoinHandle<()>>>,
}

impl Runtime {
    pub(crate) fn new(
        cfg: Config,
        bus: Bus,
        location: Location,
        token: CancellationToken,
        subscriber_listener: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            cfg,
            bus,
            registry: Registry::default(),
            waiters: UnloadWaiters::default(),
            listeners: CapturedListeners::default(),
            signals: MountSignals::default(),
            token,
            location: RwLock::new(location),
            next_parcel_id: AtomicU64::new(0),
            subscriber_listener: Mutex::new(subscriber_listener),
        }
    }

    /// Current location.
    pub(crate) fn location(&self) -> Location {
        self.location
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_location(&self, next: Location) -> bool {
        let mut current = self.location.write().unwrap_or_else(PoisonError::into_inner);
        if *current == next {
            return false;
        }
        *current = next;
        true
    }

    pub(crate) fn next_parcel_id(&self) -> u64 {
        self.next_parcel_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Handle to one orchestrator instance.
///
/// Cloning is cheap; all clones drive the same registry.
#[derive(Clone)]
pub struct Orchestrator {
    rt: Arc<Runtime>,
}

impl Orchestrator {
    /// Creates an orchestrator without subscribers at `http://localhost/`.
    pub fn new(cfg: Config) -> Self {
        OrchestratorBuilder::new(cfg).build()
    }

    /// Returns a builder for an orchestrator with subscribers or a custom location.
    pub fn builder(cfg: Config) -> OrchestratorBuilder {
        OrchestratorBuilder::new(cfg)
    }

    pub(crate) fn from_runtime(rt: Arc<Runtime>) -> Self {
        Self { rt }
    }

    pub(crate) fn runtime(&self) -> &Arc<Runtime> {
        &self.rt
    }

    /// Registers an application.
    ///
    /// The registry is left untouched when the `AppSpec` is rejected. With
    /// [`Config::reroute_on_register`] set (and a tokio runtime available) a reroute
    /// is spawned afterwards.
    pub fn register_application(&self, spec: AppSpec) -> Result<(), RegistryError> {
        spec.validate()?;
        let record = Arc::new(Record::application(
            spec,
            self.rt.cfg.timeouts,
            self.rt.bus.clone(),
        ));
        let name = Arc::clone(&record.name);
        self.rt.registry.insert(record)?;

        self.rt
            .bus
            .publish(Event::new(EventKind::AppRegistered).with_app(name));
        if self.rt.cfg.reroute_on_register {
            self.spawn_reroute();
        }
        Ok(())
    }

    /// Unmounts and unloads an application, then removes it from the registry.
    ///
    /// Once this resolves the name can be registered again.
    pub async fn unregister_application(&self, name: &str) -> Result<(), RuntimeError> {
        if self.rt.registry.get(name).is_none() {
            return Err(RegistryError::NotRegistered { name: name.into() }.into());
        }
        self.unload_application(name, UnloadOptions::default()).await?;

        if self.rt.registry.remove(name) {
            self.rt
                .bus
                .publish(Event::new(EventKind::AppUnregistered).with_app(name));
        }
        Ok(())
    }

    /// Returns an application to `NOT_LOADED` so its next activation loads it again.
    ///
    /// Concurrent requests for the same name share one unload, driven by the first
    /// immediate request. With `wait_for_unmount` the request resolves once a later
    /// reroute finds the application inactive and unloads it.
    pub async fn unload_application(
        &self,
        name: &str,
        opts: UnloadOptions,
    ) -> Result<(), RuntimeError> {
        let record = self
            .rt
            .registry
            .get(name)
            .ok_or_else(|| RegistryError::NotRegistered { name: name.into() })?;
        let wait = self.rt.waiters.get_or_insert(&record.name);
        if opts.wait_for_unmount || !self.rt.waiters.claim(&record.name) {
            return wait.await.map_err(RuntimeError::from);
        }

        // A transition still in flight is awaited, then the app is unmounted again.
        loop {
            record.settled().await;
            let _ = to_unmount(&self.rt, &record, false).await;
            if to_unload(&self.rt, &record).await {
                break;
            }
        }

        let outcome = wait.await.map_err(RuntimeError::from);
        self.spawn_reroute();
        outcome
    }

    /// Brings mounted applications in line with the current location.
    ///
    /// Returns the names of the mounted applications once the pass settled.
    pub async fn reroute(&self) -> Vec<String> {
        self.reroute_with(None).await
    }

    /// Moves to `url` (resolved against the current location) and reroutes.
    ///
    /// Captured `popstate` listeners (or `hashchange` ones, when only the fragment
    /// changed) are replayed once mounting finished.
    pub async fn navigate_to_url(&self, url: &str) -> Vec<String> {
        let current = self.rt.location();
        let next = current.resolve(url);
        if !self.rt.set_location(next.clone()) && self.rt.cfg.url_reroute_only {
            return self.get_mounted_apps();
        }

        let event = if strip_hash(current.href()) == strip_hash(next.href()) {
            NavigationEvent::new(NavigationEventKind::HashChange, next)
        } else {
            NavigationEvent::new(NavigationEventKind::PopState, next).with_trigger("pushState")
        };
        self.reroute_with(Some(event)).await
    }

    /// Applies a navigation event coming from the host and reroutes.
    pub async fn handle_navigation(&self, event: NavigationEvent) -> Vec<String> {
        self.rt.set_location(event.location.clone());
        self.reroute_with(Some(event)).await
    }

    async fn reroute_with(&self, event: Option<NavigationEvent>) -> Vec<String> {
        let rt = &self.rt;
        let started = Instant::now();
        let location = rt.location();
        rt.bus
            .publish(Event::new(EventKind::RerouteStarted).with_reason(location.href()));

        let changes = app_changes(
            &rt.registry.snapshot(),
            &location,
            Instant::now(),
            rt.cfg.load_retry_cooldown,
            |name| rt.waiters.contains(name),
        );

        let leave = join(
            join_all(changes.to_unmount.iter().map(|record| async move {
                let _ = to_unmount(rt, record, false).await;
                to_unload(rt, record).await;
            })),
            join_all(changes.to_unload.iter().map(|record| to_unload(rt, record))),
        );
        let prepare = join(
            join_all(changes.to_load.iter().map(|record| async move {
                let _ = to_load(rt, record, false).await;
                if should_be_active(record, &rt.location()) {
                    let _ = to_bootstrap(rt, record, false).await;
                }
            })),
            join_all(
                changes
                    .to_mount
                    .iter()
                    .map(|record| to_bootstrap(rt, record, false)),
            ),
        );
        join(leave, prepare).await;

        let now = rt.location();
        let mounts = changes
            .to_load
            .iter()
            .chain(changes.to_mount.iter())
            .filter(|record| should_be_active(record, &now))
            .map(|record| to_mount(rt, record, false));
        join_all(mounts).await;

        if let Some(event) = event {
            rt.listeners.dispatch(&event, &rt.bus);
        }

        let mounted = self.get_mounted_apps();
        rt.bus.publish(
            Event::new(EventKind::RerouteSettled)
                .with_reason(mounted.join(","))
                .with_elapsed(started.elapsed()),
        );
        mounted
    }

    /// Spawns a reroute that stops early if the orchestrator shuts down.
    fn spawn_reroute(&self) {
        let Ok(handle) = Handle::try_current() else {
            return;
        };
        let this = self.clone();
        let token = self.rt.token.clone();
        handle.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = this.reroute() => {}
            }
        });
    }

    /// Names of the applications whose activity predicate matches `location`.
    pub fn check_activity_functions(&self, location: &Location) -> Vec<String> {
        self.rt
            .registry
            .snapshot()
            .iter()
            .filter(|record| should_be_active(record, location))
            .map(|record| record.name.to_string())
            .collect()
    }

    /// Status of a registered application, `None` if the name is unknown.
    pub fn get_app_status(&self, name: &str) -> Option<AppStatus> {
        self.rt.registry.get(name).map(|record| record.status())
    }

    /// Names of the applications currently `MOUNTED`, in registration order.
    pub fn get_mounted_apps(&self) -> Vec<String> {
        self.rt
            .registry
            .snapshot()
            .iter()
            .filter(|record| record.status() == AppStatus::Mounted)
            .map(|record| record.name.to_string())
            .collect()
    }

    /// Names of all registered applications, in registration order.
    pub fn get_app_names(&self) -> Vec<String> {
        self.rt.registry.names()
    }

    /// Current location.
    pub fn location(&self) -> Location {
        self.rt.location()
    }

    /// Raw receiver over every event published by this orchestrator.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.rt.bus.subscribe()
    }

    /// Captures a navigation listener; it fires after each reroute driven by a
    /// navigation event of that kind.
    pub fn add_navigation_listener(
        &self,
        kind: NavigationEventKind,
        listener: NavigationListener,
    ) -> ListenerId {
        self.rt.listeners.add(kind, listener)
    }

    /// Removes a captured listener; returns whether it was present.
    pub fn remove_navigation_listener(&self, id: ListenerId) -> bool {
        self.rt.listeners.remove(id)
    }

    /// Cancels background work and waits for subscribers to drain.
    ///
    /// In-flight hooks are not interrupted. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.rt.token.cancel();
        let listener = self
            .rt
            .subscriber_listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(listener) = listener {
            let _ = listener.await;
        }
    }
}

fn strip_hash(href: &str) -> &str {
    href.split('#').next().unwrap_or(href)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::{AppModule, HookFn, Lifecycle, Props, Ready};
    use std::sync::atomic::AtomicUsize;

    fn quiet() -> Config {
        Config {
            reroute_on_register: false,
            ..Config::default()
        }
    }

    fn counting_app(name: &str, prefix: &'static str, mounts: Arc<AtomicUsize>) -> AppSpec {
        let module = AppModule::new().with_mount(HookFn::arc(move |_props: Props| {
            let mounts = Arc::clone(&mounts);
            async move {
                mounts.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));
        AppSpec::new(name, Ready::arc(module), move |loc: &Location| {
            loc.pathname().starts_with(prefix)
        })
    }

    #[tokio::test]
    async fn test_navigation_swaps_applications() {
        let orch = Orchestrator::new(quiet());
        let mounts = Arc::new(AtomicUsize::new(0));
        orch.register_application(counting_app("home", "/home", Arc::clone(&mounts)))
            .unwrap();
        orch.register_application(counting_app("about", "/about", Arc::clone(&mounts)))
            .unwrap();

        assert!(orch.reroute().await.is_empty());
        assert_eq!(orch.get_app_status("home"), Some(AppStatus::NotLoaded));

        assert_eq!(orch.navigate_to_url("/home").await, vec!["home"]);
        assert_eq!(orch.navigate_to_url("/about").await, vec!["about"]);
        assert_eq!(orch.get_app_status("home"), Some(AppStatus::NotMounted));
        assert_eq!(mounts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_listeners_replay_after_mount() {
        let orch = Orchestrator::new(quiet());
        orch.register_application(counting_app("home", "/home", Arc::new(AtomicUsize::new(0))))
            .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let probe = orch.clone();
        let log = Arc::clone(&seen);
        orch.add_navigation_listener(
            NavigationEventKind::PopState,
            Arc::new(move |ev: &NavigationEvent| {
                let mounted = probe.get_mounted_apps();
                log.lock()
                    .unwrap()
                    .push((ev.trigger, ev.location.pathname().to_string(), mounted));
            }),
        );

        orch.navigate_to_url("/home").await;
        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![(Some("pushState"), "/home".to_string(), vec!["home".to_string()])]
        );
    }

    #[tokio::test]
    async fn test_hash_only_navigation_is_hashchange() {
        let orch = Orchestrator::new(quiet());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        orch.add_navigation_listener(
            NavigationEventKind::HashChange,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        orch.navigate_to_url("/page").await;
        orch.navigate_to_url("#section").await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(orch.location().hash(), "#section");
    }

    #[tokio::test]
    async fn test_url_reroute_only_skips_same_url() {
        let orch = Orchestrator::new(Config {
            url_reroute_only: true,
            ..quiet()
        });
        let mut rx = orch.subscribe();
        orch.navigate_to_url("http://localhost/").await;
        assert!(rx.try_recv().is_err());

        orch.navigate_to_url("/next").await;
        assert_eq!(rx.try_recv().unwrap().kind, EventKind::RerouteStarted);
    }

    #[tokio::test]
    async fn test_first_mount_signals_fire_once() {
        let orch = Orchestrator::new(quiet());
        orch.register_application(counting_app("a", "/", Arc::new(AtomicUsize::new(0))))
            .unwrap();
        orch.register_application(AppSpec::new(
            "b",
            Ready::arc(AppModule::new().with_mount(Lifecycle::noop())),
            |loc: &Location| loc.pathname() == "/b",
        ))
        .unwrap();

        let mut rx = orch.subscribe();
        orch.reroute().await;
        orch.navigate_to_url("/b").await;

        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        let count = |kind| kinds.iter().filter(|k| **k == kind).count();
        assert_eq!(count(EventKind::BeforeFirstMount), 1);
        assert_eq!(count(EventKind::FirstMount), 1);
    }

    #[tokio::test]
    async fn test_register_spawns_reroute() {
        let orch = Orchestrator::new(Config::default());
        let mut rx = orch.subscribe();
        orch.register_application(counting_app("root", "/", Arc::new(AtomicUsize::new(0))))
            .unwrap();

        loop {
            let ev = rx.recv().await.unwrap();
            if ev.kind == EventKind::RerouteSettled {
                assert_eq!(ev.reason.as_deref(), Some("root"));
                break;
            }
        }
        assert_eq!(orch.get_app_status("root"), Some(AppStatus::Mounted));
        orch.shutdown().await;
    }
}
