//! # Status model shared by applications and parcels.
//!
//! ```text
//! NOT_LOADED ─► LOADING_SOURCE_CODE ─► NOT_BOOTSTRAPPED ─► BOOTSTRAPPING ─► NOT_MOUNTED
//!     ▲               │                                                     │   ▲
//!     │               └─► LOAD_ERROR (cooldown, retried)                    ▼   │
//!     └──────────── UNLOADING ◄──── NOT_MOUNTED ◄── UNMOUNTING ◄── MOUNTED ◄─ MOUNTING
//!
//! any stage ─► SKIP_BECAUSE_BROKEN (excluded until re-registered)
//! ```

use std::fmt;

/// Lifecycle status of an application or parcel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppStatus {
    /// Registered, code not loaded.
    NotLoaded,
    /// Loading function in flight.
    LoadingSourceCode,
    /// Loaded, bootstrap not run yet.
    NotBootstrapped,
    /// Bootstrap hooks running.
    Bootstrapping,
    /// Bootstrapped and idle.
    NotMounted,
    /// Mount hooks running.
    Mounting,
    /// Mounted.
    Mounted,
    /// Unmount hooks running.
    Unmounting,
    /// Unload hooks running.
    Unloading,
    /// Loading failed for a recoverable reason; retried after a cooldown.
    LoadError,
    /// Application code broke its contract; excluded from scheduling.
    SkipBecauseBroken,
}

impl AppStatus {
    /// Returns the canonical SCREAMING_SNAKE_CASE name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AppStatus::NotLoaded => "NOT_LOADED",
            AppStatus::LoadingSourceCode => "LOADING_SOURCE_CODE",
            AppStatus::NotBootstrapped => "NOT_BOOTSTRAPPED",
            AppStatus::Bootstrapping => "BOOTSTRAPPING",
            AppStatus::NotMounted => "NOT_MOUNTED",
            AppStatus::Mounting => "MOUNTING",
            AppStatus::Mounted => "MOUNTED",
            AppStatus::Unmounting => "UNMOUNTING",
            AppStatus::Unloading => "UNLOADING",
            AppStatus::LoadError => "LOAD_ERROR",
            AppStatus::SkipBecauseBroken => "SKIP_BECAUSE_BROKEN",
        }
    }

    /// True while a transition is running for the record.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            AppStatus::LoadingSourceCode
                | AppStatus::Bootstrapping
                | AppStatus::Mounting
                | AppStatus::Unmounting
                | AppStatus::Unloading
        )
    }
}

impl fmt::Display for AppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of record a status or error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// A registered application.
    Application,
    /// A parcel mounted inside an application or another parcel.
    Parcel,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Application => f.write_str("application"),
            ObjectKind::Parcel => f.write_str("parcel"),
        }
    }
}

/// Lifecycle stage, used to key timeouts and to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Evaluating the activity predicate.
    Activity,
    /// Running the loading function.
    Load,
    /// Running bootstrap hooks.
    Bootstrap,
    /// Running mount hooks.
    Mount,
    /// Running unmount hooks.
    Unmount,
    /// Running unload hooks.
    Unload,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Activity => "activity",
            Stage::Load => "load",
            Stage::Bootstrap => "bootstrap",
            Stage::Mount => "mount",
            Stage::Unmount => "unmount",
            Stage::Unload => "unload",
        };
        f.write_str(s)
    }
}
