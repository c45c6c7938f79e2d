//! Timing policies.
//!
//! ## Contents
//! - [`StageTimeout`] hard limit, warning threshold and fail/keep-waiting switch for one stage
//! - [`AppTimeouts`] limits for bootstrap, mount, unmount and unload
//! - [`BackoffPolicy`] spacing of repeated "still running" warnings
//!
//! ## Quick wiring
//! ```text
//! Config.timeouts ◄── AppSpec.timeouts ◄── AppModule.timeouts   (right wins)
//!      └─► lifecycles::runner::run_stage uses:
//!           - limit() for the hard deadline
//!           - warnings().next(n) to schedule the next warning
//! ```

mod backoff;
mod timeout;

pub use backoff::BackoffPolicy;
pub use timeout::{AppTimeouts, StageTimeout};
