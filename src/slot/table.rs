//! Slot table: the authoritative slot → leader/followers assignment.

use crate::error::SlotTableError;
use crate::types::{NodeId, SlotId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Role of a node for a specific slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRole {
    /// Leader - serves reads/writes for the slot.
    Leader,
    /// Follower - holds a replica.
    Follower,
    /// Not an owner of the slot.
    None,
}

/// One slot's assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Slot identifier.
    pub id: SlotId,
    /// Bumped only when the leader changes.
    pub leader_epoch: u64,
    /// Current leader.
    pub leader: NodeId,
    /// Followers holding replicas.
    pub followers: BTreeSet<NodeId>,
}

impl Slot {
    /// Create a slot.
    pub fn new(
        id: SlotId,
        leader_epoch: u64,
        leader: NodeId,
        followers: impl IntoIterator<Item = NodeId>,
    ) -> Self {
        Self {
            id,
            leader_epoch,
            leader,
            followers: followers.into_iter().collect(),
        }
    }

    /// Leader followed by followers.
    pub fn owners(&self) -> BTreeSet<NodeId> {
        let mut owners = self.followers.clone();
        owners.insert(self.leader.clone());
        owners
    }

    /// Check if a node owns this slot in any role.
    pub fn is_owner(&self, node: &NodeId) -> bool {
        self.leader == *node || self.followers.contains(node)
    }

    /// Role of a node for this slot.
    pub fn role(&self, node: &NodeId) -> SlotRole {
        if self.leader == *node {
            SlotRole::Leader
        } else if self.followers.contains(node) {
            SlotRole::Follower
        } else {
            SlotRole::None
        }
    }

    /// Check if leader and followers match another slot, ignoring epochs.
    pub fn same_assignment(&self, other: &Slot) -> bool {
        self.id == other.id && self.leader == other.leader && self.followers == other.followers
    }
}

/// Node-centric projection of a slot table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataNodeSlot {
    /// The data node.
    pub node: NodeId,
    /// Slots the node leads.
    pub leaders: BTreeSet<SlotId>,
    /// Slots the node follows.
    pub followers: BTreeSet<SlotId>,
}

impl DataNodeSlot {
    /// Create an empty projection for a node.
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            leaders: BTreeSet::new(),
            followers: BTreeSet::new(),
        }
    }

    /// Total number of slots the node owns.
    pub fn total(&self) -> usize {
        self.leaders.len() + self.followers.len()
    }
}

/// Slot partitioning parameters advertised by data nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotBasicInfo {
    /// Total number of slots.
    pub slot_num: u32,
    /// Copies of each slot, leader included.
    pub replicas: usize,
    /// Slot hash function name.
    pub func: String,
}

impl SlotBasicInfo {
    /// Create slot basic info.
    pub fn new(slot_num: u32, replicas: usize, func: impl Into<String>) -> Self {
        Self {
            slot_num,
            replicas,
            func: func.into(),
        }
    }
}

/// Versioned slot → owners assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotTable {
    epoch: u64,
    slots: BTreeMap<SlotId, Slot>,
}

impl SlotTable {
    /// Create a slot table.
    pub fn new(epoch: u64, slots: impl IntoIterator<Item = Slot>) -> Self {
        Self {
            epoch,
            slots: slots.into_iter().map(|s| (s.id, s)).collect(),
        }
    }

    /// The empty table installed before any assignment exists.
    pub fn init() -> Self {
        Self::new(0, Vec::new())
    }

    /// Table epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Number of slots in the table.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Check if the table assigns no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Get a slot.
    pub fn get_slot(&self, id: SlotId) -> Option<&Slot> {
        self.slots.get(&id)
    }

    /// Slots in ascending id order.
    pub fn slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.values()
    }

    /// Slot ids in ascending order.
    pub fn slot_ids(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.slots.keys().copied()
    }

    /// Every node that owns at least one slot.
    pub fn data_nodes(&self) -> BTreeSet<NodeId> {
        self.slots.values().flat_map(|s| s.owners()).collect()
    }

    /// Leader of a slot.
    pub fn leader_of(&self, id: SlotId) -> Option<&NodeId> {
        self.slots.get(&id).map(|s| &s.leader)
    }

    /// Number of slots each node leads.
    pub fn leader_counts(&self) -> BTreeMap<NodeId, usize> {
        let mut counts = BTreeMap::new();
        for slot in self.slots.values() {
            *counts.entry(slot.leader.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Project the table onto nodes.
    ///
    /// With `node` set only that node's projection is returned (empty sets if it
    /// owns nothing). With `leader_only` follower slots are left out.
    pub fn transfer(&self, node: Option<&NodeId>, leader_only: bool) -> Vec<DataNodeSlot> {
        let mut projections: BTreeMap<NodeId, DataNodeSlot> = BTreeMap::new();
        if let Some(node) = node {
            projections.insert(node.clone(), DataNodeSlot::new(node.clone()));
        }

        for slot in self.slots.values() {
            if node.map_or(true, |n| *n == slot.leader) {
                projections
                    .entry(slot.leader.clone())
                    .or_insert_with(|| DataNodeSlot::new(slot.leader.clone()))
                    .leaders
                    .insert(slot.id);
            }
            if leader_only {
                continue;
            }
            for follower in &slot.followers {
                if node.map_or(true, |n| n == follower) {
                    projections
                        .entry(follower.clone())
                        .or_insert_with(|| DataNodeSlot::new(follower.clone()))
                        .followers
                        .insert(slot.id);
                }
            }
        }

        projections.into_values().collect()
    }

    /// Check if two tables assign every slot identically, ignoring epochs.
    pub fn same_assignment(&self, other: &SlotTable) -> bool {
        self.slots.len() == other.slots.len()
            && self
                .slots
                .values()
                .zip(other.slots.values())
                .all(|(a, b)| a.same_assignment(b))
    }

    /// Validate the table against the slot configuration.
    pub fn validate(&self, slot_num: u32, replicas: usize) -> Result<(), SlotTableError> {
        let invalid = |reason: String| SlotTableError::Invalid {
            epoch: self.epoch,
            reason,
        };

        for slot in self.slots.values() {
            if slot.id >= slot_num {
                return Err(invalid(format!(
                    "slot {} out of range, slot_num is {}",
                    slot.id, slot_num
                )));
            }
            if slot.followers.contains(&slot.leader) {
                return Err(invalid(format!(
                    "slot {} lists leader {} as follower",
                    slot.id, slot.leader
                )));
            }
            if slot.followers.len() + 1 > replicas {
                return Err(invalid(format!(
                    "slot {} has {} followers, replicas is {}",
                    slot.id,
                    slot.followers.len(),
                    replicas
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(s: &str) -> NodeId {
        NodeId::from(s)
    }

    fn sample_table() -> SlotTable {
        SlotTable::new(
            7,
            vec![
                Slot::new(0, 1, node("a"), vec![node("b")]),
                Slot::new(1, 1, node("b"), vec![node("c")]),
                Slot::new(2, 3, node("c"), vec![node("a")]),
                Slot::new(3, 1, node("a"), vec![node("c")]),
            ],
        )
    }

    #[test]
    fn test_slot_roles() {
        let slot = Slot::new(0, 1, node("a"), vec![node("b"), node("c")]);

        assert_eq!(slot.role(&node("a")), SlotRole::Leader);
        assert_eq!(slot.role(&node("b")), SlotRole::Follower);
        assert_eq!(slot.role(&node("d")), SlotRole::None);
        assert!(slot.is_owner(&node("c")));
        assert_eq!(slot.owners().len(), 3);
    }

    #[test]
    fn test_transfer_single_node() {
        let table = sample_table();

        let projection = table.transfer(Some(&node("a")), false);
        assert_eq!(projection.len(), 1);
        assert_eq!(projection[0].leaders, BTreeSet::from([0, 3]));
        assert_eq!(projection[0].followers, BTreeSet::from([2]));

        let leaders_only = table.transfer(Some(&node("a")), true);
        assert!(leaders_only[0].followers.is_empty());
    }

    #[test]
    fn test_transfer_unknown_node_is_empty() {
        let table = sample_table();
        let projection = table.transfer(Some(&node("z")), false);
        assert_eq!(projection.len(), 1);
        assert_eq!(projection[0].total(), 0);
    }

    #[test]
    fn test_transfer_all_nodes() {
        let table = sample_table();
        let projections = table.transfer(None, false);

        assert_eq!(projections.len(), 3);
        let owned: usize = projections.iter().map(|p| p.total()).sum();
        assert_eq!(owned, 8);
    }

    #[test]
    fn test_leader_counts_and_nodes() {
        let table = sample_table();
        let counts = table.leader_counts();

        assert_eq!(counts[&node("a")], 2);
        assert_eq!(counts[&node("b")], 1);
        assert_eq!(table.data_nodes().len(), 3);
        assert_eq!(table.leader_of(2), Some(&node("c")));
    }

    #[test]
    fn test_same_assignment_ignores_epochs() {
        let table = sample_table();
        let mut bumped = SlotTable::new(9, table.slots().cloned());
        assert!(table.same_assignment(&bumped));

        bumped.slots.insert(1, Slot::new(1, 2, node("c"), vec![node("b")]));
        assert!(!table.same_assignment(&bumped));
    }

    #[test]
    fn test_validate() {
        let table = sample_table();
        assert!(table.validate(4, 2).is_ok());
        assert!(matches!(table.validate(3, 2), Err(SlotTableError::Invalid { .. })));

        let crowded = SlotTable::new(
            1,
            vec![Slot::new(0, 1, node("a"), vec![node("b"), node("c")])],
        );
        assert!(crowded.validate(4, 2).is_err());

        let self_follow = SlotTable::new(1, vec![Slot::new(0, 1, node("a"), vec![node("a")])]);
        assert!(self_follow.validate(4, 2).is_err());
    }
}
