use std::collections::HashMap;
use std::sync::Arc;

use crate::storage::models::ConfigFileRecord;

/// Capability of a parent entity type that wants to react when one of its
/// tracked files changes.
pub trait TrackedFileObserver: Send + Sync {
    /// Called while `record` is being saved.
    fn on_tracked_file_updated(&self, record: &ConfigFileRecord);
    /// Called while `record` is being deleted.
    fn on_tracked_file_deleted(&self, record: &ConfigFileRecord);
}

/// Observers keyed by parent entity type. Parents of unregistered types are skipped.
#[derive(Default, Clone)]
pub struct ObserverRegistry {
    observers: HashMap<String, Arc<dyn TrackedFileObserver>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, parent_type: &str, observer: Arc<dyn TrackedFileObserver>) {
        self.observers.insert(parent_type.to_string(), observer);
    }

    fn observer_for(&self, record: &ConfigFileRecord) -> Option<&Arc<dyn TrackedFileObserver>> {
        if !record.has_parent() {
            return None;
        }
        record
            .parent_type
            .as_deref()
            .and_then(|parent_type| self.observers.get(parent_type))
    }

    pub fn notify_updated(&self, record: &ConfigFileRecord) {
        if let Some(observer) = self.observer_for(record) {
            observer.on_tracked_file_updated(record);
        }
    }

    pub fn notify_deleted(&self, record: &ConfigFileRecord) {
        if let Some(observer) = self.observer_for(record) {
            observer.on_tracked_file_deleted(record);
        }
    }
}
