//! Slot table stability tracking.
//!
//! Data nodes report, per slot they lead, whether the slot is healthy. The
//! [`SlotTableMonitor`] accepts those reports only for the installed table
//! epoch and only from the recorded leader, and calls the table stable once
//! every slot has a healthy report. Installing a new table discards all
//! observations.

mod heartbeat;
mod slot_table;

pub use heartbeat::{HeartbeatOutcome, HeartbeatRequest, LeaderStatus, SlotStatus};
pub use slot_table::{EpochObservations, SlotTableMonitor};
