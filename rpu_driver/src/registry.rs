// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Bounded table of live processor instances, indexed by core id.
//!
//! The deferred interrupt path resolves its instance through this table by
//! stable index rather than holding a raw reference across the interrupt
//! boundary.

use parking_lot::RwLock;
use rpu_platform::VringHost;
use std::sync::Arc;
use thiserror::Error;

/// The hardware supports at most two cores in a pair.
pub const MAX_INSTANCES: usize = 2;

/// A registry operation used an out-of-range core index.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The index does not identify a slot.
    #[error("core index {0} out of range")]
    InvalidIndex(u8),
}

/// Live state the deferred service path needs for one instance.
pub struct InstanceEntry {
    /// The external virtqueue layer for the instance.
    pub vring: Arc<dyn VringHost>,
}

/// Table of live instances. One slot per core index.
pub struct InstanceRegistry {
    slots: [RwLock<Option<Arc<InstanceEntry>>>; MAX_INSTANCES],
}

impl InstanceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            slots: [RwLock::new(None), RwLock::new(None)],
        })
    }

    fn slot(
        &self,
        core_index: u8,
    ) -> Result<&RwLock<Option<Arc<InstanceEntry>>>, RegistryError> {
        self.slots
            .get(core_index as usize)
            .ok_or(RegistryError::InvalidIndex(core_index))
    }

    /// Publishes `entry` under `core_index`, replacing any stale prior
    /// entry for that index.
    pub fn register(
        &self,
        core_index: u8,
        entry: Arc<InstanceEntry>,
    ) -> Result<(), RegistryError> {
        *self.slot(core_index)?.write() = Some(entry);
        Ok(())
    }

    /// Resolves the live instance registered under `core_index`, if any.
    pub fn lookup(&self, core_index: u8) -> Option<Arc<InstanceEntry>> {
        self.slots.get(core_index as usize)?.read().clone()
    }

    /// Removes the entry under `core_index`. Removing an empty slot is
    /// not an error.
    pub fn unregister(&self, core_index: u8) -> Result<(), RegistryError> {
        *self.slot(core_index)?.write() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoVring;

    impl VringHost for NoVring {
        fn vq_interrupt(&self, _vqid: u16) -> bool {
            false
        }
    }

    fn entry() -> Arc<InstanceEntry> {
        Arc::new(InstanceEntry {
            vring: Arc::new(NoVring),
        })
    }

    #[test]
    fn register_lookup_unregister() {
        let registry = InstanceRegistry::new();
        assert!(registry.lookup(0).is_none());
        registry.register(0, entry()).unwrap();
        assert!(registry.lookup(0).is_some());
        assert!(registry.lookup(1).is_none());
        registry.unregister(0).unwrap();
        assert!(registry.lookup(0).is_none());
    }

    #[test]
    fn register_replaces_stale_entry() {
        let registry = InstanceRegistry::new();
        let first = entry();
        let second = entry();
        registry.register(1, first.clone()).unwrap();
        registry.register(1, second.clone()).unwrap();
        let live = registry.lookup(1).unwrap();
        assert!(Arc::ptr_eq(&live, &second));
        assert!(!Arc::ptr_eq(&live, &first));
    }

    #[test]
    fn index_bounds_checked() {
        let registry = InstanceRegistry::new();
        assert_eq!(
            registry.register(2, entry()),
            Err(RegistryError::InvalidIndex(2))
        );
        assert!(registry.lookup(2).is_none());
        assert_eq!(registry.unregister(7), Err(RegistryError::InvalidIndex(7)));
    }
}
