//! Slot partitioning: the slot table, its owner, and table generation.
//!
//! # Architecture
//!
//! ```text
//!   data nodes ──▶ SlotTableGenerator ──▶ SlotTable ──refresh──▶ SlotManager
//!                        ▲                                          │
//!                        │                                 listeners│
//!                   SlotArranger ◀── stable? ── SlotTableMonitor ◀──┘
//! ```
//!
//! Data ids map to slots with [`SlotFunction`]. The [`SlotManager`] holds the
//! authoritative [`SlotTable`] and notifies [`SlotTableListener`]s on every
//! change. [`SlotArranger`] rebalances only when the current table is stable
//! and decisions are enabled.

mod arranger;
mod function;
mod generator;
mod manager;
mod table;

pub use arranger::{ArrangeOutcome, SlotArranger};
pub use function::SlotFunction;
pub use generator::SlotTableGenerator;
pub use manager::{SlotManager, SlotTableListener};
pub use table::{DataNodeSlot, Slot, SlotBasicInfo, SlotRole, SlotTable};
