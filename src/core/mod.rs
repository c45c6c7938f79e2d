//! Runtime core: registry, change detection and orchestration.
//!
//! The public API from this module is [`Orchestrator`] (built with
//! [`OrchestratorBuilder`] from a [`Config`]) and the navigation types hosts use to
//! feed location changes in.
//!
//! Internal modules:
//! - [`orchestrator`]: public handle, reroute loop, registration and unload flows;
//! - [`changes`]: partitions the registry into unload/unmount/load/mount queues;
//! - [`registry`]: ordered, name-unique application store;
//! - [`waiters`]: pending unload requests shared per application;
//! - [`navigation`]: captured `hashchange`/`popstate` listeners;
//! - [`builder`]: assembles config, subscribers and initial location.

mod builder;
mod changes;
mod config;
mod navigation;
mod orchestrator;
mod registry;
mod waiters;

pub use builder::OrchestratorBuilder;
pub use config::Config;
pub use navigation::{ListenerId, NavigationEvent, NavigationEventKind, NavigationListener};
pub use orchestrator::{Orchestrator, UnloadOptions};

pub(crate) use orchestrator::Runtime;
