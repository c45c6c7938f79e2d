//! # Per-application (and per-parcel) mutable record.
//!
//! A [`Record`] is shared as `Arc<Record>` between the registry, in-flight
//! transitions and parcel handles. Its mutable part lives behind a short-lived
//! `std::sync::Mutex`; guards are never held across an `.await`.
//!
//! ## Rules
//! - Every status change goes through the record and publishes `StatusChanged`.
//! - Transitions claim their source status atomically with [`Record::begin`]; a record
//!   in any other status makes the transition a no-op.
//! - At most one load is in flight per record; concurrent callers share it.
//! - [`Record::settled`] observes the same status changes through a `watch` channel.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

use futures::future::{BoxFuture, Shared};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::apps::{
    ActivityFn, AppSpec, AppStatus, CustomProps, LoadedHooks, LoaderRef, ObjectKind, Stage,
};
use crate::error::LifecycleError;
use crate::events::{Bus, Event, EventKind};
use crate::parcels::{ParcelHandle, ParcelShared};
use crate::policies::{AppTimeouts, StageTimeout};

/// Shared handle to the in-flight load of a record.
pub(crate) type PendingLoad = Shared<BoxFuture<'static, Result<(), LifecycleError>>>;

struct RecordState {
    status: AppStatus,
    hooks: Option<Arc<LoadedHooks>>,
    timeouts: AppTimeouts,
    load_error_time: Option<Instant>,
    pending_load: Option<PendingLoad>,
}

pub(crate) struct Record {
    pub(crate) name: Arc<str>,
    pub(crate) object: ObjectKind,
    pub(crate) loader: LoaderRef,
    pub(crate) active_when: Option<ActivityFn>,
    pub(crate) custom_props: CustomProps,
    base_timeouts: AppTimeouts,
    bus: Bus,
    status_tx: watch::Sender<AppStatus>,
    state: Mutex<RecordState>,
    parcels: Mutex<BTreeMap<u64, ParcelHandle>>,
    handle: OnceLock<Weak<ParcelShared>>,
}

impl Record {
    fn new(
        name: Arc<str>,
        object: ObjectKind,
        loader: LoaderRef,
        active_when: Option<ActivityFn>,
        custom_props: CustomProps,
        timeouts: AppTimeouts,
        bus: Bus,
    ) -> Self {
        Self {
            name,
            object,
            loader,
            active_when,
            custom_props,
            base_timeouts: timeouts,
            bus,
            status_tx: watch::channel(AppStatus::NotLoaded).0,
            state: Mutex::new(RecordState {
                status: AppStatus::NotLoaded,
                hooks: None,
                timeouts,
                load_error_time: None,
                pending_load: None,
            }),
            parcels: Mutex::new(BTreeMap::new()),
            handle: OnceLock::new(),
        }
    }

    /// Record for a registered application; `defaults` apply unless the `AppSpec` overrides them.
    pub(crate) fn application(spec: AppSpec, defaults: AppTimeouts, bus: Bus) -> Self {
        Self::new(
            spec.name.into(),
            ObjectKind::Application,
            spec.loader,
            Some(spec.active_when),
            spec.custom_props,
            spec.timeouts.unwrap_or(defaults),
            bus,
        )
    }

    /// Record for a parcel; parcels have no activity predicate.
    pub(crate) fn parcel(
        name: Arc<str>,
        loader: LoaderRef,
        custom_props: CustomProps,
        timeouts: AppTimeouts,
        bus: Bus,
    ) -> Self {
        Self::new(
            name,
            ObjectKind::Parcel,
            loader,
            None,
            custom_props,
            timeouts,
            bus,
        )
    }

    fn lock(&self) -> MutexGuard<'_, RecordState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_status(&self, status: AppStatus) {
        self.status_tx.send_replace(status);
        self.bus.publish(
            Event::new(EventKind::StatusChanged)
                .with_app(Arc::clone(&self.name))
                .with_object(self.object)
                .with_status(status),
        );
    }

    pub(crate) fn bus(&self) -> &Bus {
        &self.bus
    }

    pub(crate) fn status(&self) -> AppStatus {
        self.lock().status
    }

    /// Forces a status.
    pub(crate) fn set_status(&self, status: AppStatus) {
        let prev = std::mem::replace(&mut self.lock().status, status);
        if prev != status {
            self.publish_status(status);
        }
    }

    /// Moves to `to` if the current status is one of `from`; returns the previous status.
    pub(crate) fn begin(&self, from: &[AppStatus], to: AppStatus) -> Option<AppStatus> {
        let prev = {
            let mut st = self.lock();
            if !from.contains(&st.status) {
                return None;
            }
            std::mem::replace(&mut st.status, to)
        };
        if prev != to {
            self.publish_status(to);
        }
        Some(prev)
    }

    /// Resolves once no transition is running on the record.
    pub(crate) async fn settled(&self) {
        let mut rx = self.status_tx.subscribe();
        loop {
            let in_flight = rx.borrow_and_update().is_in_flight();
            if !in_flight || rx.changed().await.is_err() {
                return;
            }
        }
    }

    pub(crate) fn hooks(&self) -> Option<Arc<LoadedHooks>> {
        self.lock().hooks.clone()
    }

    pub(crate) fn stage_timeout(&self, stage: Stage) -> StageTimeout {
        self.lock().timeouts.for_stage(stage)
    }

    /// Stores loaded capabilities and moves to `NOT_BOOTSTRAPPED`.
    pub(crate) fn install(&self, hooks: LoadedHooks, timeouts: Option<AppTimeouts>) {
        {
            let mut st = self.lock();
            st.hooks = Some(Arc::new(hooks));
            st.timeouts = timeouts.unwrap_or(self.base_timeouts);
            st.load_error_time = None;
            st.status = AppStatus::NotBootstrapped;
        }
        self.publish_status(AppStatus::NotBootstrapped);
    }

    /// Drops capabilities without touching the status.
    pub(crate) fn clear_hooks(&self) {
        let mut st = self.lock();
        st.hooks = None;
        st.timeouts = self.base_timeouts;
    }

    /// Returns the record to a pristine `NOT_LOADED` state.
    pub(crate) fn reset(&self) {
        self.clear_hooks();
        self.lock().load_error_time = None;
        self.set_status(AppStatus::NotLoaded);
    }

    pub(crate) fn mark_load_error(&self, at: Instant) {
        self.lock().load_error_time = Some(at);
        self.set_status(AppStatus::LoadError);
    }

    pub(crate) fn load_error_time(&self) -> Option<Instant> {
        self.lock().load_error_time
    }

    /// Joins the in-flight load, or starts one when the record is loadable.
    ///
    /// Returns `None` when the record is neither loading nor loadable.
    pub(crate) fn begin_load(&self, start: impl FnOnce() -> PendingLoad) -> Option<PendingLoad> {
        let pending = {
            let mut st = self.lock();
            if let Some(pending) = &st.pending_load {
                return Some(pending.clone());
            }
            if !matches!(st.status, AppStatus::NotLoaded | AppStatus::LoadError) {
                return None;
            }
            st.status = AppStatus::LoadingSourceCode;
            let pending = start();
            st.pending_load = Some(pending.clone());
            pending
        };
        self.publish_status(AppStatus::LoadingSourceCode);
        Some(pending)
    }

    pub(crate) fn finish_load(&self) {
        self.lock().pending_load = None;
    }

    pub(crate) fn attach_parcel(&self, id: u64, parcel: ParcelHandle) {
        self.parcels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, parcel);
    }

    pub(crate) fn detach_parcel(&self, id: u64) {
        self.parcels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    /// Parcels currently owned by this record, in creation order.
    pub(crate) fn parcels(&self) -> Vec<ParcelHandle> {
        self.parcels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub(crate) fn link_parcel_handle(&self, shared: Weak<ParcelShared>) {
        let _ = self.handle.set(shared);
    }

    pub(crate) fn parcel_handle(&self) -> Option<ParcelHandle> {
        self.handle
            .get()
            .and_then(Weak::upgrade)
            .map(ParcelHandle::from_shared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::{AppModule, Lifecycle, Ready};

    fn record(bus: &Bus) -> Record {
        let spec = AppSpec::new(
            "nav",
            Ready::arc(AppModule::new().with_mount(Lifecycle::noop())),
            |_| true,
        );
        Record::application(spec, AppTimeouts::default(), bus.clone())
    }

    #[test]
    fn test_begin_only_from_expected_status() {
        let bus = Bus::new(16);
        let rec = record(&bus);
        assert_eq!(rec.begin(&[AppStatus::NotMounted], AppStatus::Mounting), None);
        assert_eq!(rec.status(), AppStatus::NotLoaded);
        assert_eq!(
            rec.begin(&[AppStatus::NotLoaded], AppStatus::Unloading),
            Some(AppStatus::NotLoaded)
        );
        assert_eq!(rec.status(), AppStatus::Unloading);
    }

    #[test]
    fn test_status_changes_are_published_once() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let rec = record(&bus);

        rec.set_status(AppStatus::SkipBecauseBroken);
        rec.set_status(AppStatus::SkipBecauseBroken);

        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.kind, EventKind::StatusChanged);
        assert_eq!(ev.status, Some(AppStatus::SkipBecauseBroken));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_install_and_reset() {
        let bus = Bus::new(16);
        let rec = record(&bus);
        rec.mark_load_error(Instant::now());
        assert!(rec.load_error_time().is_some());

        rec.install(LoadedHooks::default(), Some(AppTimeouts::uniform(StageTimeout::new(10))));
        assert_eq!(rec.status(), AppStatus::NotBootstrapped);
        assert!(rec.load_error_time().is_none());
        assert_eq!(rec.stage_timeout(Stage::Unload).millis, 10);

        rec.reset();
        assert_eq!(rec.status(), AppStatus::NotLoaded);
        assert!(rec.hooks().is_none());
        assert_eq!(rec.stage_timeout(Stage::Unload).millis, 5000);
    }
}
