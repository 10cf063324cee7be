//! Publisher lookup used to build migration deltas.

use crate::remoting::ConnectIndexed;
use crate::slot::SlotFunction;
use crate::types::{ConnectId, Publisher, SlotId};
use dashmap::DashMap;
use std::collections::HashMap;

/// Source of truth for the publishers held in a slot.
pub trait PublisherSource: Send + Sync {
    /// Every publisher whose data id hashes to `slot_id`.
    fn publishers_in_slot(&self, slot_id: SlotId) -> Vec<Publisher>;
}

/// In-memory publisher store indexed by connection.
#[derive(Debug)]
pub struct PublisherStore {
    slot_function: SlotFunction,
    by_connect: DashMap<ConnectId, HashMap<String, Publisher>>,
}

impl PublisherStore {
    pub fn new(slot_function: SlotFunction) -> Self {
        Self {
            slot_function,
            by_connect: DashMap::new(),
        }
    }

    /// Add or replace a publisher. A lower version never replaces a higher one.
    pub fn add(&self, publisher: Publisher) -> bool {
        let mut publishers = self.by_connect.entry(publisher.connect_id).or_default();
        let newer = publishers
            .get(&publisher.register_id)
            .is_some_and(|existing| existing.version > publisher.version);
        if newer {
            return false;
        }
        publishers.insert(publisher.register_id.clone(), publisher);
        true
    }

    /// Remove one publisher.
    pub fn remove(&self, connect_id: &ConnectId, register_id: &str) -> Option<Publisher> {
        let removed = self
            .by_connect
            .get_mut(connect_id)
            .and_then(|mut publishers| publishers.remove(register_id));
        self.by_connect.remove_if(connect_id, |_, publishers| publishers.is_empty());
        removed
    }

    /// Remove every publisher of a connection.
    pub fn remove_connect(&self, connect_id: &ConnectId) -> Vec<Publisher> {
        self.by_connect
            .remove(connect_id)
            .map(|(_, publishers)| publishers.into_values().collect())
            .unwrap_or_default()
    }

    /// Publishers registered through a connection.
    pub fn query_by_connect_id(&self, connect_id: &ConnectId) -> Vec<Publisher> {
        self.by_connect
            .get(connect_id)
            .map(|publishers| publishers.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Total number of publishers.
    pub fn len(&self) -> usize {
        self.by_connect.iter().map(|e| e.value().len()).sum()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.by_connect.is_empty()
    }

    /// Slot a publisher belongs to.
    pub fn slot_of(&self, publisher: &Publisher) -> SlotId {
        self.slot_function.slot_of(&publisher.data_info_id)
    }
}

impl PublisherSource for PublisherStore {
    fn publishers_in_slot(&self, slot_id: SlotId) -> Vec<Publisher> {
        self.by_connect
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .values()
                    .filter(|p| self.slot_of(p) == slot_id)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

impl ConnectIndexed for PublisherStore {
    fn count_by_connect_id(&self, connect_id: &ConnectId) -> usize {
        self.by_connect.get(connect_id).map_or(0, |p| p.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect(port: u16) -> ConnectId {
        ConnectId::of(
            format!("10.0.0.1:{}", port).parse().unwrap(),
            "10.0.0.9:9600".parse().unwrap(),
        )
    }

    #[test]
    fn test_add_and_query() {
        let store = PublisherStore::new(SlotFunction::new(16));
        store.add(Publisher::new("svc-a", "r1", connect(1)));
        store.add(Publisher::new("svc-b", "r2", connect(1)));
        store.add(Publisher::new("svc-a", "r3", connect(2)));

        assert_eq!(store.len(), 3);
        assert_eq!(store.query_by_connect_id(&connect(1)).len(), 2);
        assert_eq!(store.count_by_connect_id(&connect(2)), 1);
        assert_eq!(store.count_by_connect_id(&connect(3)), 0);
    }

    #[test]
    fn test_older_version_ignored() {
        let store = PublisherStore::new(SlotFunction::new(16));
        assert!(store.add(Publisher::new("svc", "r1", connect(1)).with_version(5)));
        assert!(!store.add(Publisher::new("svc", "r1", connect(1)).with_version(4)));
        assert_eq!(store.query_by_connect_id(&connect(1))[0].version, 5);
    }

    #[test]
    fn test_remove() {
        let store = PublisherStore::new(SlotFunction::new(16));
        store.add(Publisher::new("svc", "r1", connect(1)));
        store.add(Publisher::new("svc", "r2", connect(2)));

        assert!(store.remove(&connect(1), "r1").is_some());
        assert!(store.remove(&connect(1), "r1").is_none());
        assert_eq!(store.count_by_connect_id(&connect(1)), 0);

        assert_eq!(store.remove_connect(&connect(2)).len(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_publishers_in_slot() {
        let func = SlotFunction::new(8);
        let store = PublisherStore::new(func);
        for i in 0..50 {
            store.add(Publisher::new(format!("svc-{}", i), format!("r{}", i), connect(1)));
        }

        let total: usize = (0..8).map(|slot| store.publishers_in_slot(slot).len()).sum();
        assert_eq!(total, 50);
        for publisher in store.publishers_in_slot(3) {
            assert_eq!(func.slot_of(&publisher.data_info_id), 3);
        }
    }
}
