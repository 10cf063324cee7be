//! Dispatch of incoming meta messages.

use super::message::{
    decode_message, frame_message, HeartbeatAck, MetaMessage, MigrateReply, SlotTableReply,
};
use crate::error::{Error, Result};
use crate::migration::{DataSlotMigrateRequest, SlotMigrationService};
use crate::monitor::{HeartbeatRequest, SlotTableMonitor};
use crate::slot::SlotManager;
use std::sync::Arc;
use tracing::{debug, warn};

/// Handler for incoming messages.
pub trait MessageHandler: Send + Sync + 'static {
    /// Handle an incoming message and optionally return a response.
    fn handle(&self, msg: MetaMessage) -> Option<MetaMessage>;
}

/// Serves heartbeats, slot table queries and migration pages.
pub struct MetaRequestHandler {
    slot_manager: Arc<SlotManager>,
    monitor: Arc<SlotTableMonitor>,
    migration: Arc<SlotMigrationService>,
}

impl MetaRequestHandler {
    pub fn new(
        slot_manager: Arc<SlotManager>,
        monitor: Arc<SlotTableMonitor>,
        migration: Arc<SlotMigrationService>,
    ) -> Self {
        Self {
            slot_manager,
            monitor,
            migration,
        }
    }

    /// Handle one encoded message as read off the wire, length prefix removed.
    ///
    /// The reply, if any, comes back framed and ready to write.
    pub fn handle_frame(&self, payload: &[u8]) -> Result<Option<Vec<u8>>> {
        let msg = decode_message(payload)?;
        match self.handle(msg) {
            Some(reply) => Ok(Some(frame_message(&reply)?)),
            None => Ok(None),
        }
    }

    fn on_heartbeat(&self, request: HeartbeatRequest) -> MetaMessage {
        let outcome = self.monitor.on_heartbeat(&request);
        let table = self.slot_manager.get_slot_table();
        let behind = request.slot_table_epoch < table.epoch();

        MetaMessage::HeartbeatAck(HeartbeatAck {
            accepted: outcome.is_accepted(),
            slot_table_epoch: table.epoch(),
            slot_table: behind.then(|| table.as_ref().clone()),
        })
    }

    fn on_fetch_slot_table(&self, epoch: u64) -> MetaMessage {
        let table = self.slot_manager.get_slot_table();
        MetaMessage::SlotTableReply(SlotTableReply {
            epoch: table.epoch(),
            slot_table: (table.epoch() > epoch).then(|| table.as_ref().clone()),
        })
    }

    fn on_migrate(&self, request: DataSlotMigrateRequest) -> MetaMessage {
        let reply = match self.migration.migrate(&request) {
            Ok(page) => MigrateReply::Page(page),
            Err(Error::StaleMigration { current_epoch, .. }) => {
                debug!(current_epoch, node = ?request.node, "Stale migration cursor");
                MigrateReply::StaleCursor { current_epoch }
            }
            Err(e) => {
                warn!(error = %e, node = ?request.node, "Migration request failed");
                MigrateReply::Failed(e.to_string())
            }
        };
        MetaMessage::MigrateReply(reply)
    }
}

impl MessageHandler for MetaRequestHandler {
    fn handle(&self, msg: MetaMessage) -> Option<MetaMessage> {
        match msg {
            MetaMessage::Heartbeat(request) => Some(self.on_heartbeat(request)),
            MetaMessage::FetchSlotTable { epoch } => Some(self.on_fetch_slot_table(epoch)),
            MetaMessage::MigrateRequest(request) => Some(self.on_migrate(request)),
            other => {
                debug!(kind = other.kind(), "Ignoring unexpected message");
                None
            }
        }
    }
}

impl std::fmt::Debug for MetaRequestHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaRequestHandler").finish_non_exhaustive()
    }
}
