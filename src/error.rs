//! Error types used by the orchestrator, lifecycle transitions and application code.
//!
//! This module defines four error types:
//!
//! - [`RegistryError`]: registration contract violations, returned before any mutation.
//! - [`HookError`]: failures raised by application code (hooks and loading functions).
//! - [`LifecycleError`]: a classified lifecycle failure carrying the offending
//!   application's identity and the status it was forced into.
//! - [`RuntimeError`]: the union returned by the async public API.
//!
//! All types provide `as_label` (stable snake_case label for logs) and most provide
//! `as_message` for human-readable output.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::apps::{AppStatus, ObjectKind, Stage};

/// # Registration contract violations.
///
/// Raised synchronously by registration-style calls. The caller must fix the input;
/// these are never retried and never leave the registry partially mutated.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Application names must be non-empty.
    #[error("application name must be a non-empty string")]
    InvalidName,

    /// Another application already uses this name.
    #[error("there is already an application registered with name '{name}'")]
    DuplicateName {
        /// Conflicting name.
        name: String,
    },

    /// No application with this name is registered.
    #[error("no application named '{name}' has been registered")]
    NotRegistered {
        /// Requested name.
        name: String,
    },

    /// Parcel configuration rejected before mounting.
    #[error("invalid parcel config: {reason}")]
    InvalidParcelConfig {
        /// Why the config was rejected.
        reason: String,
    },
}

impl RegistryError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use appvisor::RegistryError;
    ///
    /// let err = RegistryError::DuplicateName { name: "nav".into() };
    /// assert_eq!(err.as_label(), "registry_duplicate_name");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::InvalidName => "registry_invalid_name",
            RegistryError::DuplicateName { .. } => "registry_duplicate_name",
            RegistryError::NotRegistered { .. } => "registry_not_registered",
            RegistryError::InvalidParcelConfig { .. } => "registry_invalid_parcel_config",
        }
    }
}

/// # Errors produced by application code.
///
/// Hooks and loading functions return this type. Panics inside application code are
/// caught by the orchestrator and converted into [`HookError::Panicked`].
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HookError {
    /// Application code reported a failure.
    #[error("{message}")]
    Failed {
        /// The underlying error message.
        message: String,
    },

    /// Application code panicked.
    #[error("panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },
}

impl HookError {
    /// Convenience constructor for [`HookError::Failed`].
    pub fn msg(message: impl Into<String>) -> Self {
        HookError::Failed {
            message: message.into(),
        }
    }

    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        HookError::Panicked {
            message: panic_message(payload),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            HookError::Failed { .. } => "hook_failed",
            HookError::Panicked { .. } => "hook_panicked",
        }
    }
}

/// Cause of a [`LifecycleError`].
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleFailure {
    /// A hook or loading function failed.
    #[error(transparent)]
    Hook(#[from] HookError),

    /// A stage exceeded its hard deadline.
    #[error("timed out after {after:?}")]
    Timeout {
        /// The deadline that was exceeded.
        after: Duration,
    },

    /// The loading function resolved with something that is not a usable module.
    #[error("loading function resolved with an invalid module: {reason}")]
    InvalidModule {
        /// What is missing or malformed.
        reason: String,
    },

    /// The loading function failed before it produced a future.
    #[error("loading function did not produce a module future: {reason}")]
    LoaderContract {
        /// Reported failure.
        reason: String,
    },

    /// At least one child parcel failed to unmount.
    #[error("{failed} child parcel(s) failed to unmount: {message}")]
    ChildUnmount {
        /// Number of parcels that failed.
        failed: usize,
        /// Child failure messages, joined with `; `.
        message: String,
    },

    /// Operation rejected because the record is in the wrong status.
    #[error("cannot {action} while in status {status}")]
    InvalidStatus {
        /// Requested action.
        action: &'static str,
        /// Status at the time of the request.
        status: AppStatus,
    },

    /// The orchestrator owning this record is gone.
    #[error("orchestrator was dropped or shut down")]
    Detached,
}

impl LifecycleFailure {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// Timeouts carry a label distinct from ordinary failures.
    pub fn as_label(&self) -> &'static str {
        match self {
            LifecycleFailure::Hook(_) => "lifecycle_failed",
            LifecycleFailure::Timeout { .. } => "lifecycle_timeout",
            LifecycleFailure::InvalidModule { .. } => "lifecycle_invalid_module",
            LifecycleFailure::LoaderContract { .. } => "lifecycle_loader_contract",
            LifecycleFailure::ChildUnmount { .. } => "lifecycle_child_unmount",
            LifecycleFailure::InvalidStatus { .. } => "lifecycle_invalid_status",
            LifecycleFailure::Detached => "lifecycle_detached",
        }
    }

    /// True for failures attributable to the application author's contract
    /// (never retried).
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            LifecycleFailure::InvalidModule { .. }
                | LifecycleFailure::LoaderContract { .. }
                | LifecycleFailure::Hook(HookError::Panicked { .. })
        )
    }
}

/// # Classified lifecycle failure.
///
/// Carries enough context (name, object kind, stage) to diagnose which
/// application or parcel broke, plus the status it was forced into.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{object} '{name}' failed during {stage} (now {status}): {failure}")]
pub struct LifecycleError {
    /// Application or parcel name.
    pub name: Arc<str>,
    /// Whether the record is an application or a parcel.
    pub object: ObjectKind,
    /// Stage that failed.
    pub stage: Stage,
    /// Status the record was forced into.
    pub status: AppStatus,
    /// Underlying cause.
    #[source]
    pub failure: LifecycleFailure,
}

impl LifecycleError {
    /// Returns the label of the underlying cause.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use appvisor::{AppStatus, LifecycleError, LifecycleFailure, ObjectKind, Stage};
    ///
    /// let err = LifecycleError {
    ///     name: "nav".into(),
    ///     object: ObjectKind::Application,
    ///     stage: Stage::Mount,
    ///     status: AppStatus::SkipBecauseBroken,
    ///     failure: LifecycleFailure::Timeout { after: Duration::from_secs(4) },
    /// };
    /// assert_eq!(err.as_label(), "lifecycle_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        self.failure.as_label()
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        format!(
            "{} '{}' {}: {} -> {}",
            self.object, self.name, self.stage, self.failure, self.status
        )
    }
}

/// # Errors returned by the async public API.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// Registration contract violation.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Lifecycle failure surfaced to an explicit caller.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Registry(e) => e.as_label(),
            RuntimeError::Lifecycle(e) => e.as_label(),
        }
    }
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
