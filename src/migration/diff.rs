//! Per-slot ownership changes between two slot tables.

use crate::slot::{Slot, SlotTable};
use crate::types::{NodeId, SlotId};
use std::collections::BTreeSet;

/// Ownership change of one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotChange {
    pub slot_id: SlotId,
    /// Owners in the new table that did not own the slot before.
    pub gained: BTreeSet<NodeId>,
    /// Owners in the old table that no longer own the slot.
    pub lost: BTreeSet<NodeId>,
    pub leader_changed: bool,
}

impl SlotChange {
    /// Check if `node` lost the slot, or anyone did when `node` is `None`.
    pub fn lost_by(&self, node: Option<&NodeId>) -> bool {
        match node {
            Some(node) => self.lost.contains(node),
            None => !self.lost.is_empty(),
        }
    }

    /// Check if `node` gained the slot, or anyone did when `node` is `None`.
    pub fn gained_by(&self, node: Option<&NodeId>) -> bool {
        match node {
            Some(node) => self.gained.contains(node),
            None => !self.gained.is_empty(),
        }
    }
}

/// Slots whose leader or follower set differs between two tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotTableDiff {
    pub from_epoch: u64,
    pub to_epoch: u64,
    /// Changes in ascending slot order.
    pub changes: Vec<SlotChange>,
}

impl SlotTableDiff {
    /// Diff `old` against `new`.
    pub fn between(old: &SlotTable, new: &SlotTable) -> Self {
        let ids: BTreeSet<SlotId> = old.slot_ids().chain(new.slot_ids()).collect();
        let changes = ids
            .into_iter()
            .filter_map(|id| Self::change(id, old.get_slot(id), new.get_slot(id)))
            .collect();

        Self {
            from_epoch: old.epoch(),
            to_epoch: new.epoch(),
            changes,
        }
    }

    fn change(id: SlotId, old: Option<&Slot>, new: Option<&Slot>) -> Option<SlotChange> {
        if let (Some(a), Some(b)) = (old, new) {
            if a.same_assignment(b) {
                return None;
            }
        }
        let before = old.map(Slot::owners).unwrap_or_default();
        let after = new.map(Slot::owners).unwrap_or_default();

        Some(SlotChange {
            slot_id: id,
            gained: after.difference(&before).cloned().collect(),
            lost: before.difference(&after).cloned().collect(),
            leader_changed: old.map(|s| &s.leader) != new.map(|s| &s.leader),
        })
    }

    /// Check if no slot changed.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(s: &str) -> NodeId {
        NodeId::from(s)
    }

    #[test]
    fn test_diff_detects_moves() {
        let old = SlotTable::new(
            1,
            vec![
                Slot::new(0, 1, node("a"), vec![node("b")]),
                Slot::new(1, 1, node("b"), vec![node("c")]),
                Slot::new(2, 1, node("c"), vec![node("a")]),
            ],
        );
        let new = SlotTable::new(
            2,
            vec![
                Slot::new(0, 1, node("a"), vec![node("b")]),
                Slot::new(1, 1, node("b"), vec![node("a")]),
                Slot::new(2, 2, node("a"), vec![node("b")]),
            ],
        );

        let diff = SlotTableDiff::between(&old, &new);
        assert_eq!((diff.from_epoch, diff.to_epoch), (1, 2));
        assert_eq!(diff.changes.len(), 2);

        let follower_move = &diff.changes[0];
        assert_eq!(follower_move.slot_id, 1);
        assert!(!follower_move.leader_changed);
        assert_eq!(follower_move.lost, BTreeSet::from([node("c")]));
        assert_eq!(follower_move.gained, BTreeSet::from([node("a")]));

        let leader_move = &diff.changes[1];
        assert!(leader_move.leader_changed);
        assert!(leader_move.lost_by(Some(&node("c"))));
        assert!(leader_move.gained_by(Some(&node("b"))));
        assert!(!leader_move.gained_by(Some(&node("a"))));
    }

    #[test]
    fn test_role_swap_has_no_owner_change() {
        let old = SlotTable::new(1, vec![Slot::new(0, 1, node("a"), vec![node("b")])]);
        let new = SlotTable::new(2, vec![Slot::new(0, 2, node("b"), vec![node("a")])]);

        let diff = SlotTableDiff::between(&old, &new);
        assert_eq!(diff.changes.len(), 1);
        assert!(diff.changes[0].leader_changed);
        assert!(!diff.changes[0].lost_by(None));
        assert!(!diff.changes[0].gained_by(None));
    }

    #[test]
    fn test_diff_from_empty_table() {
        let new = SlotTable::new(1, vec![Slot::new(0, 1, node("a"), vec![])]);
        let diff = SlotTableDiff::between(&SlotTable::init(), &new);

        assert_eq!(diff.changes.len(), 1);
        assert_eq!(diff.changes[0].gained, BTreeSet::from([node("a")]));
        assert!(SlotTableDiff::between(&new, &new).is_empty());
    }
}
