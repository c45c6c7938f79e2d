//! # Ordered registry of applications.
//!
//! Insertion order is preserved and drives the order of every change-set queue.
//!
//! ## Rules
//! - Names are unique; a duplicate is rejected before the registry is touched.
//! - Readers take a snapshot and never hold the lock while awaiting.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::apps::Record;
use crate::error::RegistryError;

#[derive(Default)]
pub(crate) struct Registry {
    apps: RwLock<Vec<Arc<Record>>>,
}

impl Registry {
    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<Record>>> {
        self.apps.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<Record>>> {
        self.apps.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn insert(&self, record: Arc<Record>) -> Result<(), RegistryError> {
        let mut apps = self.write();
        if apps.iter().any(|r| r.name == record.name) {
            return Err(RegistryError::DuplicateName {
                name: record.name.to_string(),
            });
        }
        apps.push(record);
        Ok(())
    }

    /// Removes `name`; returns whether it was present.
    pub(crate) fn remove(&self, name: &str) -> bool {
        let mut apps = self.write();
        let before = apps.len();
        apps.retain(|r| &*r.name != name);
        apps.len() != before
    }

    pub(crate) fn get(&self, name: &str) -> Option<Arc<Record>> {
        self.read().iter().find(|r| &*r.name == name).cloned()
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<Record>> {
        self.read().clone()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.read().iter().map(|r| r.name.to_string()).collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::{AppModule, AppSpec, Lifecycle, Ready};
    use crate::events::Bus;
    use crate::policies::AppTimeouts;

    fn record(name: &str) -> Arc<Record> {
        let spec = AppSpec::new(
            name,
            Ready::arc(AppModule::new().with_mount(Lifecycle::noop())),
            |_| false,
        );
        Arc::new(Record::application(spec, AppTimeouts::default(), Bus::new(4)))
    }

    #[test]
    fn test_duplicate_rejected_without_mutation() {
        let reg = Registry::default();
        reg.insert(record("a")).unwrap();
        let err = reg.insert(record("a")).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateName { name: "a".into() });
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_order_is_preserved() {
        let reg = Registry::default();
        for name in ["c", "a", "b"] {
            reg.insert(record(name)).unwrap();
        }
        assert_eq!(reg.names(), vec!["c", "a", "b"]);
        assert!(reg.remove("a"));
        assert!(!reg.remove("a"));
        assert_eq!(reg.names(), vec!["c", "b"]);
        assert!(reg.get("b").is_some());
    }
}
