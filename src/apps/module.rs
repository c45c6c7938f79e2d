//! # Loaded modules and loading functions.
//!
//! A loading function ([`Load`]) produces an [`AppModule`]: the capabilities an
//! application or parcel exposes. The loading function has two ways to fail, and
//! they are classified differently:
//!
//! ```text
//! Load::load(props)
//!   ├─ Err(..) / panic          → contract violation  → SKIP_BECAUSE_BROKEN (never retried)
//!   └─ Ok(future)
//!        ├─ resolves Ok(module) → validated → NOT_BOOTSTRAPPED
//!        │                        (missing mount → SKIP_BECAUSE_BROKEN)
//!        ├─ resolves Err(..)    → LOAD_ERROR (retried after cooldown)
//!        └─ panics              → SKIP_BECAUSE_BROKEN
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::apps::{Lifecycle, ObjectKind, Props};
use crate::error::HookError;
use crate::policies::AppTimeouts;

/// Capabilities resolved by a loading function.
///
/// Only `mount` is required for applications; parcels also require `unmount`.
/// Missing optional capabilities default to no-ops.
#[derive(Clone, Default)]
pub struct AppModule {
    bootstrap: Option<Lifecycle>,
    mount: Option<Lifecycle>,
    unmount: Option<Lifecycle>,
    unload: Option<Lifecycle>,
    timeouts: Option<AppTimeouts>,
}

impl AppModule {
    /// Empty module (invalid until a mount capability is set).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bootstrap capability.
    pub fn with_bootstrap(mut self, lifecycle: impl Into<Lifecycle>) -> Self {
        self.bootstrap = Some(lifecycle.into());
        self
    }

    /// Sets the mount capability.
    pub fn with_mount(mut self, lifecycle: impl Into<Lifecycle>) -> Self {
        self.mount = Some(lifecycle.into());
        self
    }

    /// Sets the unmount capability.
    pub fn with_unmount(mut self, lifecycle: impl Into<Lifecycle>) -> Self {
        self.unmount = Some(lifecycle.into());
        self
    }

    /// Sets the unload capability.
    pub fn with_unload(mut self, lifecycle: impl Into<Lifecycle>) -> Self {
        self.unload = Some(lifecycle.into());
        self
    }

    /// Overrides the timeouts configured for the owning record.
    pub fn with_timeouts(mut self, timeouts: AppTimeouts) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Validates the module and normalizes it into a full set of capabilities.
    pub(crate) fn into_hooks(
        self,
        object: ObjectKind,
    ) -> Result<(LoadedHooks, Option<AppTimeouts>), String> {
        let Some(mount) = self.mount else {
            return Err("does not export a mount function or array of functions".to_string());
        };
        let unmount = match (self.unmount, object) {
            (Some(unmount), _) => unmount,
            (None, ObjectKind::Application) => Lifecycle::noop(),
            (None, ObjectKind::Parcel) => {
                return Err("does not export an unmount function or array of functions".to_string())
            }
        };
        let hooks = LoadedHooks {
            bootstrap: self.bootstrap.unwrap_or_default(),
            mount,
            unmount,
            unload: self.unload.unwrap_or_default(),
        };
        Ok((hooks, self.timeouts))
    }
}

/// Normalized capabilities stored on a loaded record.
#[derive(Clone, Default)]
pub(crate) struct LoadedHooks {
    pub(crate) bootstrap: Lifecycle,
    pub(crate) mount: Lifecycle,
    pub(crate) unmount: Lifecycle,
    pub(crate) unload: Lifecycle,
}

/// Boxed future returned by a loading function.
pub type LoadFuture = BoxFuture<'static, Result<AppModule, HookError>>;

/// # Loading function contract.
///
/// Returning `Err` (or panicking) from [`Load::load`] itself means the loading
/// function is broken; a failure of the returned future is a transient load error.
pub trait Load: Send + Sync + 'static {
    /// Starts loading with the record's props.
    fn load(&self, props: Props) -> Result<LoadFuture, HookError>;
}

/// Shared handle to a loading function.
pub type LoaderRef = Arc<dyn Load>;

/// Loading function backed by an async closure.
///
/// ## Example
/// ```rust
/// use appvisor::{AppModule, HookError, Lifecycle, LoadFn, LoaderRef, Props};
///
/// let loader: LoaderRef = LoadFn::arc(|_props: Props| async {
///     Ok::<_, HookError>(AppModule::new().with_mount(Lifecycle::noop()))
/// });
/// # let _ = loader;
/// ```
pub struct LoadFn<F> {
    f: F,
}

impl<F> LoadFn<F> {
    /// Creates the loader and returns it as a shared handle.
    pub fn arc<Fut>(f: F) -> LoaderRef
    where
        F: Fn(Props) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<AppModule, HookError>> + Send + 'static,
    {
        Arc::new(Self { f })
    }
}

impl<F, Fut> Load for LoadFn<F>
where
    F: Fn(Props) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<AppModule, HookError>> + Send + 'static,
{
    fn load(&self, props: Props) -> Result<LoadFuture, HookError> {
        Ok((self.f)(props).boxed())
    }
}

/// Loading function that may fail before producing a future.
pub struct TryLoadFn<F> {
    f: F,
}

impl<F> TryLoadFn<F> {
    /// Creates the loader and returns it as a shared handle.
    pub fn arc<Fut>(f: F) -> LoaderRef
    where
        F: Fn(Props) -> Result<Fut, HookError> + Send + Sync + 'static,
        Fut: Future<Output = Result<AppModule, HookError>> + Send + 'static,
    {
        Arc::new(Self { f })
    }
}

impl<F, Fut> Load for TryLoadFn<F>
where
    F: Fn(Props) -> Result<Fut, HookError> + Send + Sync + 'static,
    Fut: Future<Output = Result<AppModule, HookError>> + Send + 'static,
{
    fn load(&self, props: Props) -> Result<LoadFuture, HookError> {
        (self.f)(props).map(FutureExt::boxed)
    }
}

/// Loader for a module that is already available.
pub struct Ready {
    module: AppModule,
}

impl Ready {
    /// Wraps a ready module as a shared loader.
    pub fn arc(module: AppModule) -> LoaderRef {
        Arc::new(Self { module })
    }
}

impl Load for Ready {
    fn load(&self, _props: Props) -> Result<LoadFuture, HookError> {
        let module = self.module.clone();
        Ok(async move { Ok(module) }.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_mount_is_rejected() {
        let err = AppModule::new()
            .with_bootstrap(Lifecycle::noop())
            .into_hooks(ObjectKind::Application)
            .err();
        assert!(err.is_some_and(|reason| reason.contains("mount")));
    }

    #[test]
    fn test_application_defaults_missing_capabilities() {
        let (hooks, timeouts) = AppModule::new()
            .with_mount(Lifecycle::noop().then(|_p: Props| async { Ok(()) }))
            .into_hooks(ObjectKind::Application)
            .map_err(|_| ())
            .unwrap();
        assert_eq!(hooks.mount.len(), 1);
        assert!(hooks.bootstrap.is_empty());
        assert!(hooks.unmount.is_empty());
        assert!(hooks.unload.is_empty());
        assert!(timeouts.is_none());
    }

    #[test]
    fn test_parcel_requires_unmount() {
        let res = AppModule::new()
            .with_mount(Lifecycle::noop())
            .into_hooks(ObjectKind::Parcel);
        assert!(res.is_err());
    }
}
