//! # Per-stage timeout limits.
//!
//! Every lifecycle capability invocation races against a [`StageTimeout`]:
//!
//! ```text
//! start ──► warning (after warning_millis) ──► warning ... (backoff-spaced)
//!       └─► hard limit (after millis)
//!               ├─ die_on_timeout = true  → stage fails with a timeout error
//!               └─ die_on_timeout = false → TimeoutHit published, keep waiting
//! ```
//!
//! ## Sentinel values
//! - `millis = 0` → no limit, no warnings
//! - `warning_millis = 0` → no warnings
//! - `warning_cap_millis = 0` → warning spacing capped by the hard limit

use std::time::Duration;

use crate::apps::Stage;
use crate::policies::BackoffPolicy;

/// Limits for one lifecycle stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageTimeout {
    /// Hard limit in milliseconds (`0` = none).
    pub millis: u64,
    /// Fail the stage when the hard limit is reached.
    pub die_on_timeout: bool,
    /// Delay before the first "still running" warning (`0` = never warn).
    pub warning_millis: u64,
    /// Largest spacing between repeated warnings (`0` = the hard limit).
    pub warning_cap_millis: u64,
}

impl StageTimeout {
    /// Limit with the default warning threshold (1s) that never fails the stage.
    pub const fn new(millis: u64) -> Self {
        Self {
            millis,
            die_on_timeout: false,
            warning_millis: 1000,
            warning_cap_millis: 0,
        }
    }

    /// Fails the stage once the hard limit is reached.
    pub const fn dying(mut self) -> Self {
        self.die_on_timeout = true;
        self
    }

    /// Sets the first warning threshold.
    pub const fn with_warning_millis(mut self, warning_millis: u64) -> Self {
        self.warning_millis = warning_millis;
        self
    }

    /// Caps the spacing of repeated warnings.
    pub const fn with_warning_cap(mut self, warning_cap_millis: u64) -> Self {
        self.warning_cap_millis = warning_cap_millis;
        self
    }

    /// Hard limit as an `Option`.
    #[inline]
    pub fn limit(&self) -> Option<Duration> {
        match self.millis {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Spacing of repeated warnings; `None` when warnings are disabled.
    ///
    /// Warnings start at `warning_millis` and double each time, capped by
    /// `warning_cap_millis` (or the hard limit when unset).
    pub fn warnings(&self) -> Option<BackoffPolicy> {
        let limit = self.limit()?;
        let max = match self.warning_cap_millis {
            0 => limit,
            cap => Duration::from_millis(cap),
        };
        match self.warning_millis {
            0 => None,
            ms => Some(BackoffPolicy {
                first: Duration::from_millis(ms),
                max,
                factor: 2.0,
            }),
        }
    }
}

/// Limits for every stage of one record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppTimeouts {
    /// Bootstrap limit.
    pub bootstrap: StageTimeout,
    /// Mount limit.
    pub mount: StageTimeout,
    /// Unmount limit.
    pub unmount: StageTimeout,
    /// Unload limit.
    pub unload: StageTimeout,
}

impl Default for AppTimeouts {
    /// Default limits:
    ///
    /// - bootstrap, mount, unmount: `4000ms`
    /// - unload: `5000ms`
    /// - first warning after `1000ms`, `die_on_timeout = false`
    fn default() -> Self {
        Self {
            bootstrap: StageTimeout::new(4000),
            mount: StageTimeout::new(4000),
            unmount: StageTimeout::new(4000),
            unload: StageTimeout::new(5000),
        }
    }
}

impl AppTimeouts {
    /// Same limit for every stage.
    pub const fn uniform(limit: StageTimeout) -> Self {
        Self {
            bootstrap: limit,
            mount: limit,
            unmount: limit,
            unload: limit,
        }
    }

    /// Limit for a stage. Stages without a capability call have no limit.
    pub fn for_stage(&self, stage: Stage) -> StageTimeout {
        match stage {
            Stage::Bootstrap => self.bootstrap,
            Stage::Mount => self.mount,
            Stage::Unmount => self.unmount,
            Stage::Unload => self.unload,
            Stage::Activity | Stage::Load => StageTimeout::new(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let t = AppTimeouts::default();
        assert_eq!(t.for_stage(Stage::Mount).millis, 4000);
        assert_eq!(t.for_stage(Stage::Unload).millis, 5000);
        assert!(!t.for_stage(Stage::Bootstrap).die_on_timeout);
        assert!(t.for_stage(Stage::Load).limit().is_none());
    }

    #[test]
    fn test_warnings_capped_by_limit() {
        let w = StageTimeout::new(3000).warnings().unwrap();
        assert_eq!(w.next(0), Duration::from_millis(1000));
        assert_eq!(w.next(1), Duration::from_millis(2000));
        assert_eq!(w.next(2), Duration::from_millis(3000));
    }

    #[test]
    fn test_warning_cap_overrides_limit() {
        let w = StageTimeout::new(60_000)
            .with_warning_millis(500)
            .with_warning_cap(1500)
            .warnings()
            .unwrap();
        assert_eq!(w.next(1), Duration::from_millis(1000));
        assert_eq!(w.next(2), Duration::from_millis(1500));
        assert_eq!(w.next(9), Duration::from_millis(1500));
    }

    #[test]
    fn test_zero_disables_warnings() {
        assert!(StageTimeout::new(0).warnings().is_none());
        assert!(StageTimeout::new(100).with_warning_millis(0).warnings().is_none());
    }
}
