//! # Global orchestrator configuration.
//!
//! Provides [`Config`], the centralized settings for one orchestrator instance.
//!
//! Config is used in two ways:
//! 1. **Orchestrator creation**: `Orchestrator::builder(config).build()`
//! 2. **Record defaults**: timeouts for applications and parcels that don't set their own
//!
//! ## Sentinel values
//! - `bus_capacity = 0` → clamped to 1
//! - `StageTimeout::millis = 0` → no limit for that stage

use std::time::Duration;

use crate::policies::AppTimeouts;

/// Global configuration for the orchestrator.
///
/// ## Field semantics
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `load_retry_cooldown`: minimum time between a failed load and its retry
/// - `timeouts`: default per-stage limits (overridden per application, then per module)
/// - `reroute_on_register`: registering an application triggers a reroute
/// - `url_reroute_only`: navigating to the current URL does not reroute
///
/// ## Notes
/// All fields are public for flexibility.
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Applications in `LOAD_ERROR` are not loaded again before this much time passed.
    pub load_retry_cooldown: Duration,

    /// Default timeouts for bootstrap, mount, unmount and unload.
    pub timeouts: AppTimeouts,

    /// Spawn a reroute on the ambient tokio runtime after each registration.
    pub reroute_on_register: bool,

    /// Skip the reroute when `navigate_to_url` targets the current URL.
    pub url_reroute_only: bool,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `load_retry_cooldown = 200ms`
    /// - `timeouts = AppTimeouts::default()` (4s bootstrap/mount/unmount, 5s unload, warn only)
    /// - `reroute_on_register = true`
    /// - `url_reroute_only = false`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            load_retry_cooldown: Duration::from_millis(200),
            timeouts: AppTimeouts::default(),
            reroute_on_register: true,
            url_reroute_only: false,
        }
    }
}
