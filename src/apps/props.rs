//! # Props passed to every lifecycle call.
//!
//! Props merge, lowest precedence first:
//! 1. custom props (static JSON object, or a function of name and location);
//! 2. fixed fields: the record's `name`, the `mount_parcel` capability and a handle to
//!    the orchestrator. Parcels additionally get `unmount_self`.
//!
//! Custom keys that collide with fixed fields (`name`, `mountParcel`, `singleSpa`,
//! `unmountSelf`) are dropped so fixed fields always win.
//!
//! ## Example
//! ```rust
//! use appvisor::CustomProps;
//! use serde_json::json;
//!
//! let dynamic = CustomProps::dynamic(|name, loc| json!({ "app": name, "path": loc.pathname() }));
//! let fixed = CustomProps::from(json!({ "theme": "dark" }).as_object().cloned().unwrap_or_default());
//! # let _ = (dynamic, fixed);
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Map, Value};

use crate::apps::{Location, ObjectKind, Record};
use crate::core::{Orchestrator, Runtime};
use crate::error::{panic_message, RegistryError, RuntimeError};
use crate::events::{Event, EventKind};
use crate::parcels::{self, ParcelConfig, ParcelHandle};

/// Keys owned by the fixed props fields.
const RESERVED_KEYS: [&str; 4] = ["name", "mountParcel", "singleSpa", "unmountSelf"];

/// Function computing custom props from the record name and current location.
pub type CustomPropsFn = Arc<dyn Fn(&str, &Location) -> Value + Send + Sync>;

/// Custom props attached to a record.
#[derive(Clone, Default)]
pub enum CustomProps {
    /// No custom props.
    #[default]
    None,
    /// The same object for every call.
    Static(Map<String, Value>),
    /// Computed per call; anything but a JSON object is replaced by `{}`.
    Dynamic(CustomPropsFn),
}

impl CustomProps {
    /// Props computed per lifecycle call.
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&str, &Location) -> Value + Send + Sync + 'static,
    {
        CustomProps::Dynamic(Arc::new(f))
    }
}

impl From<Map<String, Value>> for CustomProps {
    fn from(map: Map<String, Value>) -> Self {
        CustomProps::Static(map)
    }
}

/// Props handed to hooks and loading functions.
#[derive(Clone)]
pub struct Props {
    name: Arc<str>,
    custom: Arc<Map<String, Value>>,
    record: Arc<Record>,
    orchestrator: Orchestrator,
}

impl Props {
    pub(crate) fn for_record(rt: &Arc<Runtime>, record: &Arc<Record>) -> Self {
        let mut custom = match &record.custom_props {
            CustomProps::None => Map::new(),
            CustomProps::Static(map) => map.clone(),
            CustomProps::Dynamic(f) => {
                let location = rt.location();
                let computed =
                    std::panic::catch_unwind(AssertUnwindSafe(|| f(&record.name, &location)));
                match computed {
                    Ok(Value::Object(map)) => map,
                    Ok(other) => {
                        invalid_custom_props(rt, record, format!("non-object value {other}"));
                        Map::new()
                    }
                    Err(payload) => {
                        invalid_custom_props(rt, record, panic_message(&*payload));
                        Map::new()
                    }
                }
            }
        };
        for key in RESERVED_KEYS {
            custom.remove(key);
        }

        Self {
            name: Arc::clone(&record.name),
            custom: Arc::new(custom),
            record: Arc::clone(record),
            orchestrator: Orchestrator::from_runtime(Arc::clone(rt)),
        }
    }

    /// Application or parcel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether these props belong to an application or a parcel.
    pub fn object(&self) -> ObjectKind {
        self.record.object
    }

    /// Looks up a prop; `"name"` always resolves to the record name.
    pub fn get(&self, key: &str) -> Option<Value> {
        match key {
            "name" => Some(Value::String(self.name.to_string())),
            _ => self.custom.get(key).cloned(),
        }
    }

    /// Custom props after reserved keys were removed.
    pub fn custom(&self) -> &Map<String, Value> {
        &self.custom
    }

    /// Orchestrator driving this record.
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Mounts a parcel owned by this application or parcel.
    ///
    /// The parcel is unmounted automatically before its owner unmounts.
    pub fn mount_parcel(
        &self,
        config: ParcelConfig,
        custom: Map<String, Value>,
    ) -> Result<ParcelHandle, RegistryError> {
        parcels::mount_parcel(self.orchestrator.runtime(), &self.record, config, custom)
    }

    /// Handle of the parcel these props belong to; `None` for applications.
    pub fn parcel(&self) -> Option<ParcelHandle> {
        self.record.parcel_handle()
    }

    /// Unmounts the parcel these props belong to; `None` for applications.
    pub fn unmount_self(&self) -> Option<BoxFuture<'static, Result<(), RuntimeError>>> {
        self.parcel().map(|parcel| parcel.unmount_this_parcel())
    }
}

fn invalid_custom_props(rt: &Runtime, record: &Record, reason: String) {
    rt.bus.publish(
        Event::new(EventKind::InvalidCustomProps)
            .with_app(Arc::clone(&record.name))
            .with_object(record.object)
            .with_reason(reason),
    );
}
