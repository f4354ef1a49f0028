use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc;

use super::backend::{
    ChangeEvent, StorageArea, StorageBackend, StorageError, StorageKey, StoredValues, Subscription,
};

#[derive(Default)]
struct Shared {
    values: StoredValues,
    subscribers: Vec<mpsc::Sender<ChangeEvent>>,
}

/// An in-process key-value store.
///
/// Clones share the same values, so several instances in one process can
/// be pointed at one store. Every subscriber, including the writer's own,
/// is notified of keys whose value actually changed.
#[derive(Clone)]
pub struct MemoryStore {
    area: StorageArea,
    shared: Rc<RefCell<Shared>>,
}

impl MemoryStore {
    pub fn new(area: StorageArea) -> Self {
        MemoryStore {
            area,
            shared: Rc::new(RefCell::new(Shared::default())),
        }
    }

    /// Create a store pre-filled with `values`
    pub fn with_values(area: StorageArea, values: StoredValues) -> Self {
        let store = Self::new(area);
        store.shared.borrow_mut().values = values;
        store
    }

    /// Current contents
    pub fn snapshot(&self) -> StoredValues {
        self.shared.borrow().values.clone()
    }
}

impl StorageBackend for MemoryStore {
    fn area(&self) -> StorageArea {
        self.area
    }

    fn get(&self, keys: &[StorageKey]) -> Result<StoredValues, StorageError> {
        let shared = self.shared.borrow();
        Ok(keys
            .iter()
            .filter_map(|k| shared.values.get(k).map(|v| (*k, v.clone())))
            .collect())
    }

    fn set(&self, values: &StoredValues) -> Result<(), StorageError> {
        let mut shared = self.shared.borrow_mut();
        let mut changes = Vec::new();
        for (key, value) in values {
            if shared.values.get(key) != Some(value) {
                shared.values.insert(*key, value.clone());
                changes.push((*key, Some(value.clone())));
            }
        }
        if changes.is_empty() {
            return Ok(());
        }

        let event = ChangeEvent {
            area: self.area,
            changes,
        };
        shared
            .subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
        Ok(())
    }

    fn subscribe(&self) -> Result<Option<Subscription>, StorageError> {
        let (tx, rx) = mpsc::channel();
        self.shared.borrow_mut().subscribers.push(tx);
        Ok(Some(Subscription::new(rx)))
    }
}
