//! # Lifecycle hooks and their normalized sequences.
//!
//! A [`Hook`] is one async step of a lifecycle capability. Applications expose each
//! capability (bootstrap, mount, unmount, unload) as a [`Lifecycle`]: an ordered
//! sequence of hooks that run one after another with the same [`Props`], stopping at
//! the first failure.
//!
//! A single hook and an array of hooks are normalized into the same [`Lifecycle`]
//! type when the module is built, so nothing downstream branches on the shape.
//!
//! ## Example
//! ```rust
//! use appvisor::{HookError, Lifecycle, Props};
//!
//! let mount = Lifecycle::new(|props: Props| async move {
//!     println!("mounting {}", props.name());
//!     Ok::<(), HookError>(())
//! })
//! .then(|_props: Props| async { Ok(()) });
//!
//! assert_eq!(mount.len(), 2);
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::apps::Props;
use crate::error::HookError;

/// Boxed future returned by a hook.
pub type HookFuture = BoxFuture<'static, Result<(), HookError>>;

/// # One async lifecycle step.
///
/// Implementors create a fresh future per call; shared state must be held
/// explicitly (e.g. `Arc<...>`) inside the implementor.
pub trait Hook: Send + Sync + 'static {
    /// Starts the step with the given props.
    fn call(&self, props: Props) -> HookFuture;
}

/// Shared handle to a hook.
pub type HookRef = Arc<dyn Hook>;

/// Function-backed hook.
///
/// Wraps a closure `Fn(Props) -> Fut`, producing a new future per call.
pub struct HookFn<F> {
    f: F,
}

impl<F> HookFn<F> {
    /// Creates a hook from a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the hook and returns it as a shared handle.
    pub fn arc<Fut>(f: F) -> HookRef
    where
        F: Fn(Props) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        Arc::new(Self::new(f))
    }
}

impl<F, Fut> Hook for HookFn<F>
where
    F: Fn(Props) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HookError>> + Send + 'static,
{
    fn call(&self, props: Props) -> HookFuture {
        Box::pin((self.f)(props))
    }
}

/// Ordered sequence of hooks forming one capability.
///
/// An empty sequence is a valid no-op capability.
#[derive(Clone, Default)]
pub struct Lifecycle {
    steps: Vec<HookRef>,
}

impl Lifecycle {
    /// Capability made of a single closure.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Props) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        Self::from_hook(HookFn::arc(f))
    }

    /// Capability made of a single hook.
    pub fn from_hook(hook: HookRef) -> Self {
        Self { steps: vec![hook] }
    }

    /// Capability made of several hooks, executed in order.
    pub fn from_hooks(hooks: impl IntoIterator<Item = HookRef>) -> Self {
        Self {
            steps: hooks.into_iter().collect(),
        }
    }

    /// Capability that does nothing.
    pub fn noop() -> Self {
        Self::default()
    }

    /// Flattens several capabilities into one sequence.
    pub fn chain(parts: impl IntoIterator<Item = Lifecycle>) -> Self {
        Self {
            steps: parts.into_iter().flat_map(|p| p.steps).collect(),
        }
    }

    /// Appends a closure step.
    pub fn then<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Props) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.steps.push(HookFn::arc(f));
        self
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True if the capability has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every step in order; the first failure (or panic) aborts the rest.
    pub(crate) fn run(self, props: Props) -> HookFuture {
        async move {
            for step in self.steps {
                let started = std::panic::catch_unwind(AssertUnwindSafe(|| step.call(props.clone())));
                let fut = match started {
                    Ok(fut) => fut,
                    Err(payload) => return Err(HookError::from_panic(&*payload)),
                };
                match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => return Err(e),
                    Err(payload) => return Err(HookError::from_panic(&*payload)),
                }
            }
            Ok(())
        }
        .boxed()
    }
}

impl From<HookRef> for Lifecycle {
    fn from(hook: HookRef) -> Self {
        Lifecycle::from_hook(hook)
    }
}
