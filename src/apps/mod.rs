//! Applications and parcels: what gets registered and what gets driven.
//!
//! ## Contents
//! - [`AppStatus`], [`ObjectKind`], [`Stage`] status model and labels
//! - [`AppSpec`] registration input (name, loader, activity predicate, custom props)
//! - [`Load`], [`LoadFn`], [`TryLoadFn`], [`Ready`] loading functions
//! - [`AppModule`] capabilities resolved by a loading function
//! - [`Hook`], [`HookFn`], [`Lifecycle`] lifecycle steps and their sequences
//! - [`Props`], [`CustomProps`] what every hook receives
//! - [`Location`] minimal URL model handed to activity predicates
//!
//! Internally each registered application (or mounted parcel) is a `Record`.

mod hooks;
mod location;
mod module;
mod props;
mod record;
mod spec;
mod status;

pub use hooks::{Hook, HookFn, HookFuture, HookRef, Lifecycle};
pub use location::Location;
pub use module::{AppModule, Load, LoadFn, LoadFuture, LoaderRef, Ready, TryLoadFn};
pub use props::{CustomProps, CustomPropsFn, Props};
pub use spec::{ActivityFn, AppSpec};
pub use status::{AppStatus, ObjectKind, Stage};

pub(crate) use module::LoadedHooks;
pub(crate) use record::Record;
