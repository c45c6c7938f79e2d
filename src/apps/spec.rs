//! # Application registration spec.
//!
//! [`AppSpec`] is the normalized input to
//! [`Orchestrator::register_application`](crate::Orchestrator::register_application):
//! a unique name, a loading function, an activity predicate and optional custom
//! props and timeouts.
//!
//! ## Example
//! ```rust
//! use appvisor::{AppModule, AppSpec, Lifecycle, Ready};
//!
//! let spec = AppSpec::new(
//!     "settings",
//!     Ready::arc(AppModule::new().with_mount(Lifecycle::noop())),
//!     |loc| loc.pathname().starts_with("/settings"),
//! );
//! assert_eq!(spec.name(), "settings");
//! ```

use std::sync::Arc;

use crate::apps::{CustomProps, LoaderRef, Location};
use crate::error::RegistryError;
use crate::policies::AppTimeouts;

/// Activity predicate: true when the application should be mounted at `location`.
pub type ActivityFn = Arc<dyn Fn(&Location) -> bool + Send + Sync>;

/// Registration input for one application.
#[derive(Clone)]
pub struct AppSpec {
    pub(crate) name: String,
    pub(crate) loader: LoaderRef,
    pub(crate) active_when: ActivityFn,
    pub(crate) custom_props: CustomProps,
    pub(crate) timeouts: Option<AppTimeouts>,
}

impl AppSpec {
    /// Creates a spec with no custom props and default timeouts.
    pub fn new<F>(name: impl Into<String>, loader: LoaderRef, active_when: F) -> Self
    where
        F: Fn(&Location) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            loader,
            active_when: Arc::new(active_when),
            custom_props: CustomProps::default(),
            timeouts: None,
        }
    }

    /// Sets custom props passed to every lifecycle call.
    pub fn with_custom_props(mut self, props: impl Into<CustomProps>) -> Self {
        self.custom_props = props.into();
        self
    }

    /// Sets per-application timeouts (overridden by timeouts the module declares).
    pub fn with_timeouts(mut self, timeouts: AppTimeouts) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Application name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn validate(&self) -> Result<(), RegistryError> {
        if self.name.is_empty() {
            return Err(RegistryError::InvalidName);
        }
        Ok(())
    }
}
