//! Migration of publishers after slot reassignment.
//!
//! When the slot table changes, the nodes that lost a slot must drop the
//! slot's publishers and the nodes that gained one must materialize them.
//! [`SlotMigrationService`] diffs the previous and current tables and serves
//! the resulting deltas in bounded pages.
//!
//! Deltas are totally ordered by `(slot_id, kind, connect_id, register_id)`.
//! A [`MigrationCursor`] names the last delivered position and the table
//! epoch it belongs to, so pagination never depends on map iteration order
//! and a cursor from a superseded table is refused.

mod diff;
mod publisher;
mod result;
mod service;

pub use diff::{SlotChange, SlotTableDiff};
pub use publisher::{PublisherSource, PublisherStore};
pub use result::{
    DataSlotMigrateRequest, DataSlotMigrateResult, DeltaKind, DeltaPosition, MigrationCursor,
    MigrationPage,
};
pub use service::SlotMigrationService;
