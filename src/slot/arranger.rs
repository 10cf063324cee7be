//! One rebalancing step of the meta leader.

use super::generator::SlotTableGenerator;
use super::manager::SlotManager;
use crate::decision::DecisionModeCell;
use crate::error::Result;
use crate::leader::LeadershipHub;
use crate::monitor::SlotTableMonitor;
use crate::types::NodeId;
use std::sync::Arc;
use tracing::{debug, info};

/// What a call to [`SlotArranger::arrange`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrangeOutcome {
    /// Decision mode is off.
    DecisionOff,
    /// This meta server is not leader.
    NotLeader,
    /// The current table has not been confirmed by its leaders yet.
    Unstable,
    /// The generated table equals the current one.
    Unchanged,
    /// A new table was installed.
    Refreshed { epoch: u64 },
}

/// Regenerates the slot table from the live data-node set when allowed.
pub struct SlotArranger {
    decision: Arc<DecisionModeCell>,
    leadership: Arc<LeadershipHub>,
    monitor: Arc<SlotTableMonitor>,
    slot_manager: Arc<SlotManager>,
    generator: SlotTableGenerator,
}

impl SlotArranger {
    pub fn new(
        decision: Arc<DecisionModeCell>,
        leadership: Arc<LeadershipHub>,
        monitor: Arc<SlotTableMonitor>,
        slot_manager: Arc<SlotManager>,
    ) -> Self {
        let config = slot_manager.config();
        let generator = SlotTableGenerator::new(config.slot_num, config.replicas);
        Self {
            decision,
            leadership,
            monitor,
            slot_manager,
            generator,
        }
    }

    /// Rebalance onto `data_nodes` if decision mode, leadership and stability allow it.
    ///
    /// The very first table is generated without waiting for stability, since
    /// the empty initial table can never become stable.
    pub fn arrange(&self, data_nodes: &[NodeId]) -> Result<ArrangeOutcome> {
        if !self.decision.is_running() {
            debug!("Decision mode off, skipping arrange");
            return Ok(ArrangeOutcome::DecisionOff);
        }
        if !self.leadership.am_i_leader() {
            return Ok(ArrangeOutcome::NotLeader);
        }

        let current = self.slot_manager.get_slot_table();
        if !current.is_empty() && !self.monitor.is_slot_table_stable() {
            debug!(epoch = current.epoch(), "Slot table not stable, skipping arrange");
            return Ok(ArrangeOutcome::Unstable);
        }

        let previous = (!current.is_empty()).then_some(current.as_ref());
        let generated = self.generator.generate(data_nodes, previous)?;
        // the generator hands back the current table when nothing moves
        if generated.epoch() == current.epoch() {
            return Ok(ArrangeOutcome::Unchanged);
        }

        let epoch = generated.epoch();
        self.slot_manager.refresh(generated)?;
        info!(epoch, nodes = data_nodes.len(), "Slot table arranged");
        Ok(ArrangeOutcome::Refreshed { epoch })
    }
}

impl std::fmt::Debug for SlotArranger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotArranger")
            .field("decision", &self.decision.get())
            .field("leader", &self.leadership.am_i_leader())
            .field("generator", &self.generator)
            .finish()
    }
}
