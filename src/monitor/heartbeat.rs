//! Heartbeat messages sent by data nodes.

use crate::slot::SlotBasicInfo;
use crate::types::{NodeId, SlotId};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Health a leader reports for one of its slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeaderStatus {
    Healthy,
    Unhealthy,
}

/// Status of one slot as seen by the node that believes it leads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotStatus {
    pub slot_id: SlotId,
    /// Leader epoch the node holds for the slot.
    pub leader_epoch: u64,
    pub status: LeaderStatus,
}

impl SlotStatus {
    pub fn new(slot_id: SlotId, leader_epoch: u64, status: LeaderStatus) -> Self {
        Self {
            slot_id,
            leader_epoch,
            status,
        }
    }

    /// A healthy status.
    pub fn healthy(slot_id: SlotId, leader_epoch: u64) -> Self {
        Self::new(slot_id, leader_epoch, LeaderStatus::Healthy)
    }
}

/// Periodic report from a data node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    /// Reporting node.
    pub node: NodeId,
    /// Slot table epoch the node has installed.
    pub slot_table_epoch: u64,
    /// Datacenter of the node.
    pub datacenter: String,
    /// Send time in milliseconds since UNIX epoch.
    pub timestamp: u64,
    /// Slot parameters the node runs with.
    pub slot_basic_info: SlotBasicInfo,
    /// Statuses of the slots the node leads.
    pub statuses: Vec<SlotStatus>,
}

impl HeartbeatRequest {
    /// Create a heartbeat stamped with the current time.
    pub fn new(
        node: NodeId,
        slot_table_epoch: u64,
        datacenter: impl Into<String>,
        slot_basic_info: SlotBasicInfo,
    ) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            node,
            slot_table_epoch,
            datacenter: datacenter.into(),
            timestamp,
            slot_basic_info,
            statuses: Vec::new(),
        }
    }

    /// Attach slot statuses.
    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = SlotStatus>) -> Self {
        self.statuses.extend(statuses);
        self
    }
}

/// What the monitor did with a heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    /// Applied; `recorded` statuses were accepted.
    Accepted { recorded: usize },
    /// Built against another table epoch.
    StaleEpoch { current: u64 },
    /// The node runs with a different slot count or replica factor.
    SlotConfigMismatch,
}

impl HeartbeatOutcome {
    /// Check if the heartbeat was applied.
    pub fn is_accepted(&self) -> bool {
        matches!(self, HeartbeatOutcome::Accepted { .. })
    }
}
