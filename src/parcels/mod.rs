//! # Parcels: lifecycle scopes mounted from inside an application.
//!
//! A parcel is created by [`Props::mount_parcel`](crate::Props::mount_parcel) and is
//! owned by the application (or parcel) whose props created it. It runs the same
//! transitions as an application, in hard-fail mode, and is never touched by reroutes.
//!
//! ```text
//! mount_parcel(config, custom)
//!    └─► record (NOT_LOADED) attached to owner
//!    └─► spawned: load ─► NOT_BOOTSTRAPPED? ─► bootstrap ─► mount   ═► mount_promise
//!                   (any failure detaches the parcel from its owner)
//!
//! unmount_this_parcel()
//!    └─► wait for mount_promise ─► MOUNTED? ─► unmount ─► detach ═► unmount_promise
//!
//! owner unmount ─► unmount_this_parcel() for every attached parcel, concurrently
//! ```
//!
//! ## Rules
//! - Parcels must provide `mount` and `unmount`.
//! - Unmounting a parcel that is not `MOUNTED` is rejected and leaves its status alone.
//! - Whatever the unmount outcome, the parcel leaves its owner.
//! - [`ParcelHandle::mount`] remounts a parcel that was unmounted.
//!
//! ## Example
//! ```rust
//! use appvisor::{AppModule, HookError, Lifecycle, ParcelConfig, Props};
//! use serde_json::Map;
//!
//! let widget = AppModule::new()
//!     .with_mount(Lifecycle::new(|_props: Props| async { Ok::<(), HookError>(()) }))
//!     .with_unmount(Lifecycle::noop());
//!
//! let mount = Lifecycle::new(move |props: Props| {
//!     let widget = widget.clone();
//!     async move {
//!         let parcel = props
//!             .mount_parcel(ParcelConfig::new(widget).with_name("widget"), Map::new())
//!             .map_err(|e| HookError::msg(e.to_string()))?;
//!         parcel.mount_promise().await.map_err(|e| HookError::msg(e.to_string()))
//!     }
//! });
//! # let _ = mount;
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::future::{self, BoxFuture, Shared};
use futures::FutureExt;
use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::apps::{AppModule, AppStatus, CustomProps, LoaderRef, ObjectKind, Ready, Record, Stage};
use crate::core::Runtime;
use crate::error::{LifecycleError, LifecycleFailure, RegistryError, RuntimeError};
use crate::lifecycles::{to_bootstrap, to_load, to_mount, to_unmount};
use crate::policies::AppTimeouts;

/// Shared outcome of a parcel mount or unmount; every clone resolves the same way.
pub type ParcelPromise = Shared<BoxFuture<'static, Result<(), RuntimeError>>>;

/// What to mount as a parcel.
#[derive(Clone)]
pub struct ParcelConfig {
    name: Option<String>,
    loader: LoaderRef,
    timeouts: Option<AppTimeouts>,
}

impl ParcelConfig {
    /// Parcel from an already available module.
    pub fn new(module: AppModule) -> Self {
        Self::from_loader(Ready::arc(module))
    }

    /// Parcel whose module is produced by a loading function.
    pub fn from_loader(loader: LoaderRef) -> Self {
        Self {
            name: None,
            loader,
            timeouts: None,
        }
    }

    /// Sets the parcel name (defaults to `parcel-<id>`).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Overrides the orchestrator's default timeouts for this parcel.
    pub fn with_timeouts(mut self, timeouts: AppTimeouts) -> Self {
        self.timeouts = Some(timeouts);
        self
    }
}

struct Promises {
    mount: ParcelPromise,
    unmount: ParcelPromise,
    unmounted: Option<oneshot::Sender<Result<(), RuntimeError>>>,
}

pub(crate) struct ParcelShared {
    id: u64,
    record: Arc<Record>,
    owner: Weak<Record>,
    runtime: Weak<Runtime>,
    promises: Mutex<Promises>,
}

impl ParcelShared {
    fn lock(&self) -> MutexGuard<'_, Promises> {
        self.promises.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn runtime(&self) -> Result<Arc<Runtime>, RuntimeError> {
        self.runtime.upgrade().ok_or_else(|| {
            let status = self.record.status();
            self.error(Stage::Mount, status, LifecycleFailure::Detached)
        })
    }

    fn error(&self, stage: Stage, status: AppStatus, failure: LifecycleFailure) -> RuntimeError {
        LifecycleError {
            name: Arc::clone(&self.record.name),
            object: ObjectKind::Parcel,
            stage,
            status,
            failure,
        }
        .into()
    }

    fn settle_unmount(&self, outcome: Result<(), RuntimeError>) {
        if let Some(tx) = self.lock().unmounted.take() {
            let _ = tx.send(outcome);
        }
    }
}

fn attach(shared: &Arc<ParcelShared>) {
    if let Some(owner) = shared.owner.upgrade() {
        owner.attach_parcel(shared.id, ParcelHandle::from_shared(Arc::clone(shared)));
    }
}

fn detach(owner: &Weak<Record>, id: u64) {
    if let Some(owner) = owner.upgrade() {
        owner.detach_parcel(id);
    }
}

/// Creates a parcel owned by `owner` and starts its mount chain.
pub(crate) fn mount_parcel(
    rt: &Arc<Runtime>,
    owner: &Arc<Record>,
    config: ParcelConfig,
    custom: Map<String, Value>,
) -> Result<ParcelHandle, RegistryError> {
    let id = rt.next_parcel_id();
    let name = config.name.unwrap_or_else(|| format!("parcel-{id}"));
    if name.is_empty() {
        return Err(RegistryError::InvalidParcelConfig {
            reason: "parcel name must be a non-empty string".into(),
        });
    }

    let record = Arc::new(Record::parcel(
        name.into(),
        config.loader,
        CustomProps::Static(custom),
        config.timeouts.unwrap_or(rt.cfg.timeouts),
        rt.bus.clone(),
    ));
    let owner_ref = Arc::downgrade(owner);

    let mount = mount_chain(Arc::clone(rt), Arc::clone(&record), owner_ref.clone(), id)
        .boxed()
        .shared();
    let (unmount, unmounted) = unmount_pair(&record);

    let shared = Arc::new(ParcelShared {
        id,
        record: Arc::clone(&record),
        owner: owner_ref,
        runtime: Arc::downgrade(rt),
        promises: Mutex::new(Promises {
            mount: mount.clone(),
            unmount,
            unmounted: Some(unmounted),
        }),
    });
    record.link_parcel_handle(Arc::downgrade(&shared));
    attach(&shared);

    drive(rt, mount);
    Ok(ParcelHandle::from_shared(shared))
}

async fn mount_chain(
    rt: Arc<Runtime>,
    record: Arc<Record>,
    owner: Weak<Record>,
    id: u64,
) -> Result<(), RuntimeError> {
    let outcome = load_bootstrap_mount(&rt, &record).await;
    if outcome.is_err() {
        detach(&owner, id);
    }
    outcome.map_err(RuntimeError::from)
}

async fn load_bootstrap_mount(rt: &Arc<Runtime>, record: &Arc<Record>) -> Result<(), LifecycleError> {
    to_load(rt, record, true).await?;

    let status = record.status();
    if status != AppStatus::NotBootstrapped {
        return Err(LifecycleError {
            name: Arc::clone(&record.name),
            object: ObjectKind::Parcel,
            stage: Stage::Bootstrap,
            status,
            failure: LifecycleFailure::InvalidStatus {
                action: "bootstrap",
                status,
            },
        });
    }

    to_bootstrap(rt, record, true).await?;
    to_mount(rt, record, true).await
}

fn unmount_pair(record: &Record) -> (ParcelPromise, oneshot::Sender<Result<(), RuntimeError>>) {
    let (tx, rx) = oneshot::channel();
    let detached = LifecycleError {
        name: Arc::clone(&record.name),
        object: ObjectKind::Parcel,
        stage: Stage::Unmount,
        status: AppStatus::NotMounted,
        failure: LifecycleFailure::Detached,
    };
    let promise = rx
        .map(move |res| res.unwrap_or_else(|_| Err(detached.into())))
        .boxed()
        .shared();
    (promise, tx)
}

/// Polls `promise` on the ambient runtime until it settles or the orchestrator
/// shuts down. Without a runtime the promise runs when first awaited.
fn drive(rt: &Runtime, promise: ParcelPromise) {
    let Ok(handle) = Handle::try_current() else {
        return;
    };
    let token = rt.token.clone();
    handle.spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = promise => {}
        }
    });
}

fn rejected(err: RuntimeError) -> ParcelPromise {
    future::ready(Err(err)).boxed().shared()
}

/// Handle to a mounted (or mounting) parcel.
///
/// Cloning is cheap; all clones refer to the same parcel.
#[derive(Clone)]
pub struct ParcelHandle {
    inner: Arc<ParcelShared>,
}

impl ParcelHandle {
    pub(crate) fn from_shared(inner: Arc<ParcelShared>) -> Self {
        Self { inner }
    }

    /// Identifier, unique within the orchestrator.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Parcel name.
    pub fn name(&self) -> &str {
        &self.inner.record.name
    }

    /// Current status.
    pub fn get_status(&self) -> AppStatus {
        self.inner.record.status()
    }

    /// Resolves once the current mount attempt settled.
    pub fn mount_promise(&self) -> ParcelPromise {
        self.inner.lock().mount.clone()
    }

    /// Resolves once the parcel was unmounted through [`Self::unmount_this_parcel`].
    pub fn unmount_promise(&self) -> ParcelPromise {
        self.inner.lock().unmount.clone()
    }

    /// Unmounts the parcel (and its own parcels) and removes it from its owner.
    ///
    /// Waits for a mount in progress first. Fails without side effects when the
    /// parcel is not `MOUNTED` at that point.
    pub fn unmount_this_parcel(&self) -> BoxFuture<'static, Result<(), RuntimeError>> {
        let shared = Arc::clone(&self.inner);
        async move {
            let mount = shared.lock().mount.clone();
            let _ = mount.await;
            let rt = shared.runtime()?;

            let status = shared.record.status();
            if status != AppStatus::Mounted {
                return Err(shared.error(
                    Stage::Unmount,
                    status,
                    LifecycleFailure::InvalidStatus {
                        action: "unmount",
                        status,
                    },
                ));
            }

            let outcome = to_unmount(&rt, &shared.record, true)
                .await
                .map_err(RuntimeError::from);
            detach(&shared.owner, shared.id);
            shared.settle_unmount(outcome.clone());
            outcome
        }
        .boxed()
    }

    /// Mounts an unmounted parcel again and reattaches it to its owner.
    ///
    /// The returned promise also becomes the new [`Self::mount_promise`].
    pub fn mount(&self) -> ParcelPromise {
        let shared = Arc::clone(&self.inner);
        let rt = match shared.runtime() {
            Ok(rt) => rt,
            Err(err) => return rejected(err),
        };
        let status = shared.record.status();
        if status != AppStatus::NotMounted {
            return rejected(shared.error(
                Stage::Mount,
                status,
                LifecycleFailure::InvalidStatus {
                    action: "mount",
                    status,
                },
            ));
        }

        attach(&shared);
        let (unmount, unmounted) = unmount_pair(&shared.record);
        let chain = {
            let rt = Arc::clone(&rt);
            let record = Arc::clone(&shared.record);
            let owner = shared.owner.clone();
            let id = shared.id;
            async move {
                let outcome = to_mount(&rt, &record, true).await;
                if outcome.is_err() {
                    detach(&owner, id);
                }
                outcome.map_err(RuntimeError::from)
            }
        };
        let promise = chain.boxed().shared();
        {
            let mut promises = shared.lock();
            promises.mount = promise.clone();
            promises.unmount = unmount;
            promises.unmounted = Some(unmounted);
        }

        drive(&rt, promise.clone());
        promise
    }
}
