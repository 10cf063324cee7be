//! Paginated migration results and their cursor.

use crate::types::{ConnectId, NodeId, Publisher, SlotId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Publisher changes a node has to apply after a slot table change.
///
/// `has_remain` marks a partial page; the rest is fetched with the cursor
/// returned next to this result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSlotMigrateResult {
    pub slot_table_epoch: u64,
    pub has_remain: bool,
    /// Publishers to materialize, with full payload.
    pub updated_publishers: BTreeMap<ConnectId, Vec<Publisher>>,
    /// Register ids of publishers to delete.
    pub removed_publishers: BTreeMap<ConnectId, Vec<String>>,
}

impl DataSlotMigrateResult {
    pub fn new(slot_table_epoch: u64) -> Self {
        Self {
            slot_table_epoch,
            ..Default::default()
        }
    }

    /// Check if this result was computed against `local_epoch`.
    ///
    /// Results built for any other table must be ignored.
    pub fn is_applicable(&self, local_epoch: u64) -> bool {
        self.slot_table_epoch == local_epoch
    }

    /// Number of publisher deltas in this page.
    pub fn delta_count(&self) -> usize {
        self.updated_publishers.values().map(Vec::len).sum::<usize>()
            + self.removed_publishers.values().map(Vec::len).sum::<usize>()
    }

    /// Check if the page carries no delta.
    pub fn is_empty(&self) -> bool {
        self.updated_publishers.is_empty() && self.removed_publishers.is_empty()
    }
}

/// Kind of a publisher delta. Removals sort before updates within a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DeltaKind {
    Removed,
    Updated,
}

/// Position of a delta in the total migration order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeltaPosition {
    pub slot_id: SlotId,
    pub kind: DeltaKind,
    pub connect_id: ConnectId,
    pub register_id: String,
}

/// Continuation point of a paginated migration, pinned to a table epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationCursor {
    pub slot_table_epoch: u64,
    /// Last delta already delivered.
    pub after: DeltaPosition,
}

/// Request for one page of migration deltas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSlotMigrateRequest {
    /// Restrict deltas to slots this node gained or lost.
    pub node: Option<NodeId>,
    /// Continue after this cursor; `None` starts from the beginning.
    pub cursor: Option<MigrationCursor>,
}

impl DataSlotMigrateRequest {
    /// First page for `node`.
    pub fn for_node(node: NodeId) -> Self {
        Self {
            node: Some(node),
            cursor: None,
        }
    }

    /// First page across every node.
    pub fn all() -> Self {
        Self::default()
    }

    /// Continue from `cursor`.
    pub fn with_cursor(mut self, cursor: MigrationCursor) -> Self {
        self.cursor = Some(cursor);
        self
    }
}

/// One page of migration deltas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationPage {
    pub result: DataSlotMigrateResult,
    /// Present iff `result.has_remain`.
    pub next: Option<MigrationCursor>,
}
