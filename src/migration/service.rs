//! Migration result producer.

use super::diff::SlotTableDiff;
use super::publisher::PublisherSource;
use super::result::{
    DataSlotMigrateRequest, DataSlotMigrateResult, DeltaKind, DeltaPosition, MigrationCursor,
    MigrationPage,
};
use crate::error::{Error, Result};
use crate::metrics::MetaMetrics;
use crate::slot::{SlotManager, SlotTable};
use crate::types::Publisher;
use std::sync::Arc;
use tracing::{debug, info};

enum Delta {
    Removed,
    Updated(Publisher),
}

/// Computes publisher deltas between the previous and current slot table
/// and serves them in pages of at most `batch_size`.
pub struct SlotMigrationService {
    slot_manager: Arc<SlotManager>,
    source: Arc<dyn PublisherSource>,
    batch_size: usize,
    metrics: Arc<MetaMetrics>,
}

impl SlotMigrationService {
    pub fn new(
        slot_manager: Arc<SlotManager>,
        source: Arc<dyn PublisherSource>,
        batch_size: usize,
        metrics: Arc<MetaMetrics>,
    ) -> Self {
        Self {
            slot_manager,
            source,
            batch_size: batch_size.max(1),
            metrics,
        }
    }

    /// Serve the next page of deltas for `request`.
    pub fn migrate(&self, request: &DataSlotMigrateRequest) -> Result<MigrationPage> {
        let (current, previous) = self.slot_manager.snapshot();
        let epoch = current.epoch();

        if let Some(cursor) = &request.cursor {
            if cursor.slot_table_epoch != epoch {
                return Err(Error::StaleMigration {
                    cursor_epoch: cursor.slot_table_epoch,
                    current_epoch: epoch,
                });
            }
        }

        let empty = SlotTable::init();
        let old = previous.as_deref().unwrap_or(&empty);
        let diff = SlotTableDiff::between(old, &current);
        if request.cursor.is_none() && !diff.is_empty() {
            info!(
                from_epoch = diff.from_epoch,
                to_epoch = diff.to_epoch,
                slots = diff.changes.len(),
                "Serving migration deltas"
            );
        }

        // one extra delta tells whether anything remains
        let mut pending = self.deltas(&diff, request, self.batch_size + 1).into_iter();

        let mut result = DataSlotMigrateResult::new(epoch);
        let mut last = None;
        let mut served = 0;
        while served < self.batch_size {
            let Some((position, delta)) = pending.next() else {
                break;
            };
            match delta {
                Delta::Removed => result
                    .removed_publishers
                    .entry(position.connect_id)
                    .or_default()
                    .push(position.register_id.clone()),
                Delta::Updated(publisher) => result
                    .updated_publishers
                    .entry(position.connect_id)
                    .or_default()
                    .push(publisher),
            }
            last = Some(position);
            served += 1;
        }

        result.has_remain = pending.next().is_some();
        let next = match last {
            Some(after) if result.has_remain => Some(MigrationCursor {
                slot_table_epoch: epoch,
                after,
            }),
            _ => None,
        };

        self.metrics.migration_pages.inc();
        self.metrics.migration_deltas.inc_by(served as u64);
        debug!(
            epoch,
            node = ?request.node,
            served,
            has_remain = result.has_remain,
            "Served migration page"
        );

        Ok(MigrationPage { result, next })
    }

    /// Up to `limit` deltas for `request` past its cursor, in position order.
    ///
    /// Slots before the cursor are never read, and reading stops at the
    /// first slot that fills the limit.
    fn deltas(
        &self,
        diff: &SlotTableDiff,
        request: &DataSlotMigrateRequest,
        limit: usize,
    ) -> Vec<(DeltaPosition, Delta)> {
        let node = request.node.as_ref();
        let after = request.cursor.as_ref().map(|c| &c.after);
        let mut deltas = Vec::new();

        for change in &diff.changes {
            if after.is_some_and(|after| change.slot_id < after.slot_id) {
                continue;
            }
            let lost = change.lost_by(node);
            let gained = change.gained_by(node);
            if !lost && !gained {
                continue;
            }

            let mut in_slot = Vec::new();
            for publisher in self.source.publishers_in_slot(change.slot_id) {
                let position = |kind| DeltaPosition {
                    slot_id: change.slot_id,
                    kind,
                    connect_id: publisher.connect_id,
                    register_id: publisher.register_id.clone(),
                };
                if lost {
                    in_slot.push((position(DeltaKind::Removed), Delta::Removed));
                }
                if gained {
                    let position = position(DeltaKind::Updated);
                    in_slot.push((position, Delta::Updated(publisher)));
                }
            }
            in_slot.sort_by(|a, b| a.0.cmp(&b.0));
            in_slot.dedup_by(|a, b| a.0 == b.0);

            deltas.extend(
                in_slot
                    .into_iter()
                    .filter(|(position, _)| after.map_or(true, |after| position > after)),
            );
            if deltas.len() >= limit {
                deltas.truncate(limit);
                break;
            }
        }
        deltas
    }
}

impl std::fmt::Debug for SlotMigrationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotMigrationService")
            .field("batch_size", &self.batch_size)
            .finish()
    }
}
