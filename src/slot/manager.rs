//! Owner of the authoritative slot table.
//!
//! Refreshes are serialized by a writer lock and published as immutable
//! `Arc<SlotTable>` snapshots; readers clone the `Arc` and never observe a
//! partially replaced table.

use crate::config::SlotConfig;
use crate::error::{Result, SlotTableError};
use crate::metrics::MetaMetrics;
use crate::slot::table::{DataNodeSlot, SlotTable};
use crate::types::NodeId;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{info, warn};

/// Observer of slot table refreshes.
pub trait SlotTableListener: Send + Sync {
    /// Called synchronously after `table` has been installed by `source`.
    fn update(&self, source: &SlotManager, table: &Arc<SlotTable>);
}

#[derive(Debug, Clone)]
struct InstalledTables {
    current: Arc<SlotTable>,
    previous: Option<Arc<SlotTable>>,
}

/// Owns the slot table and notifies listeners on every change.
pub struct SlotManager {
    config: SlotConfig,
    tables: RwLock<InstalledTables>,
    /// Serializes refreshes, including listener notification.
    writer: Mutex<()>,
    listeners: RwLock<Vec<Arc<dyn SlotTableListener>>>,
    metrics: Arc<MetaMetrics>,
}

impl SlotManager {
    /// Create a manager holding the empty initial table.
    pub fn new(config: SlotConfig, metrics: Arc<MetaMetrics>) -> Self {
        Self {
            config,
            tables: RwLock::new(InstalledTables {
                current: Arc::new(SlotTable::init()),
                previous: None,
            }),
            writer: Mutex::new(()),
            listeners: RwLock::new(Vec::new()),
            metrics,
        }
    }

    /// Slot configuration.
    pub fn config(&self) -> &SlotConfig {
        &self.config
    }

    /// Register a listener for refreshes.
    pub fn add_listener(&self, listener: Arc<dyn SlotTableListener>) {
        self.listeners.write().push(listener);
    }

    /// Current table snapshot.
    pub fn get_slot_table(&self) -> Arc<SlotTable> {
        self.tables.read().current.clone()
    }

    /// The table the current one replaced, if any.
    pub fn previous_slot_table(&self) -> Option<Arc<SlotTable>> {
        self.tables.read().previous.clone()
    }

    /// Current and previous tables, read atomically.
    pub fn snapshot(&self) -> (Arc<SlotTable>, Option<Arc<SlotTable>>) {
        let tables = self.tables.read();
        (tables.current.clone(), tables.previous.clone())
    }

    /// Current table epoch.
    pub fn epoch(&self) -> u64 {
        self.tables.read().current.epoch()
    }

    /// Replace the slot table and notify listeners.
    ///
    /// The new epoch must be strictly greater than the installed one.
    pub fn refresh(&self, table: SlotTable) -> Result<()> {
        let _writer = self.writer.lock();
        let current = self.get_slot_table();

        if let Err(e) = self.check_refresh(&current, &table) {
            self.metrics.slot_table_rejected.inc();
            warn!(
                current_epoch = current.epoch(),
                new_epoch = table.epoch(),
                error = %e,
                "Rejected slot table refresh"
            );
            return Err(e.into());
        }

        let table = Arc::new(table);
        {
            let mut tables = self.tables.write();
            tables.previous = Some(std::mem::replace(&mut tables.current, table.clone()));
        }
        self.metrics.slot_table_refreshes.inc();
        self.metrics.slot_table_epoch.set(table.epoch() as i64);

        info!(
            prev_epoch = current.epoch(),
            epoch = table.epoch(),
            slots = table.slot_count(),
            "Slot table refreshed"
        );

        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.update(self, &table);
        }

        Ok(())
    }

    fn check_refresh(
        &self,
        current: &SlotTable,
        table: &SlotTable,
    ) -> std::result::Result<(), SlotTableError> {
        if table.epoch() == current.epoch() && table != current {
            return Err(SlotTableError::EpochConflict {
                epoch: table.epoch(),
            });
        }
        if table.epoch() <= current.epoch() {
            return Err(SlotTableError::StaleEpoch {
                current: current.epoch(),
                new: table.epoch(),
            });
        }
        table.validate(self.config.slot_num, self.config.replicas)
    }

    /// Slots led and followed by `node` in the current table.
    pub fn transfer(&self, node: &NodeId, leader_only: bool) -> DataNodeSlot {
        self.get_slot_table()
            .transfer(Some(node), leader_only)
            .into_iter()
            .next()
            .unwrap_or_else(|| DataNodeSlot::new(node.clone()))
    }
}

impl std::fmt::Debug for SlotManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotManager")
            .field("epoch", &self.epoch())
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}
