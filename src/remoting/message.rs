//! Messages exchanged between meta servers and data/session nodes.

use crate::migration::{DataSlotMigrateRequest, MigrationPage};
use crate::monitor::HeartbeatRequest;
use crate::slot::SlotTable;
use serde::{Deserialize, Serialize};

/// Wire message wrapper for all meta traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetaMessage {
    /// Data node heartbeat.
    Heartbeat(HeartbeatRequest),

    /// Answer to a heartbeat.
    HeartbeatAck(HeartbeatAck),

    /// Ask for the slot table if newer than `epoch`.
    FetchSlotTable { epoch: u64 },

    /// Answer to `FetchSlotTable`.
    SlotTableReply(SlotTableReply),

    /// Ask for a page of migration deltas.
    MigrateRequest(DataSlotMigrateRequest),

    /// Answer to `MigrateRequest`.
    MigrateReply(MigrateReply),
}

impl MetaMessage {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            MetaMessage::Heartbeat(_) => "heartbeat",
            MetaMessage::HeartbeatAck(_) => "heartbeat_ack",
            MetaMessage::FetchSlotTable { .. } => "fetch_slot_table",
            MetaMessage::SlotTableReply(_) => "slot_table_reply",
            MetaMessage::MigrateRequest(_) => "migrate_request",
            MetaMessage::MigrateReply(_) => "migrate_reply",
        }
    }
}

/// Answer to a heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatAck {
    /// Whether the heartbeat was applied.
    pub accepted: bool,
    /// Epoch of the meta server's slot table.
    pub slot_table_epoch: u64,
    /// The current table, sent when the node is behind.
    pub slot_table: Option<SlotTable>,
}

/// Slot table query result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotTableReply {
    pub epoch: u64,
    /// Present only if newer than the epoch the caller holds.
    pub slot_table: Option<SlotTable>,
}

/// Migration page or the reason none could be served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MigrateReply {
    Page(MigrationPage),
    /// The cursor belongs to a superseded table; restart from the beginning.
    StaleCursor { current_epoch: u64 },
    Failed(String),
}

/// Encode a message to bytes.
pub(crate) fn encode_message(msg: &MetaMessage) -> Result<Vec<u8>, bincode::Error> {
    bincode::serialize(msg)
}

/// Decode a message from bytes.
pub(crate) fn decode_message(data: &[u8]) -> Result<MetaMessage, bincode::Error> {
    bincode::deserialize(data)
}

/// Frame a message with a big-endian length prefix.
pub(crate) fn frame_message(msg: &MetaMessage) -> Result<Vec<u8>, bincode::Error> {
    let data = encode_message(msg)?;
    let mut framed = Vec::with_capacity(4 + data.len());
    framed.extend_from_slice(&(data.len() as u32).to_be_bytes());
    framed.extend_from_slice(&data);
    Ok(framed)
}
