//! Metrics for the meta coordination core.
//!
//! Counters and gauges are plain atomics owned by [`MetaMetrics`], shared as
//! an `Arc` by every component. Exposition is left to the embedding process;
//! [`MetaMetrics::to_prometheus`] renders the text format.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        MetaMetrics                          │
//! │  slot table      │ heartbeats      │ cross-dc   │ remoting  │
//! │  - refreshes     │ - received      │ - proxies  │ - sent    │
//! │  - rejected      │ - discarded     │ - started  │ - failed  │
//! │  - epoch         │ - recorded      │ - syncs    │ - disconn │
//! └────────────────────────────────────────────────────────────┘
//! ```

mod counters;
mod gauges;

pub use counters::{Counter, LabeledCounter};
pub use gauges::{Gauge, LabeledGauge};

use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};

/// All metrics of a meta server.
#[derive(Debug)]
pub struct MetaMetrics {
    // Slot table
    /// Installed slot tables.
    pub slot_table_refreshes: Counter,
    /// Rejected slot table refreshes.
    pub slot_table_rejected: Counter,
    /// Epoch of the installed table.
    pub slot_table_epoch: Gauge,
    /// Slots in the installed table.
    pub slot_count: Gauge,
    /// Slots led per data node, updated by the periodic record.
    pub leader_slots: LabeledGauge,
    /// Whether the installed table is stable, as of the last record.
    pub slot_table_stable: Gauge,

    // Heartbeats
    /// Heartbeats received.
    pub heartbeats_received: Counter,
    /// Heartbeats discarded, by reason.
    pub heartbeats_discarded: LabeledCounter,
    /// Slot statuses recorded from heartbeats.
    pub slot_statuses_recorded: Counter,

    // Migration
    /// Migration pages served.
    pub migration_pages: Counter,
    /// Publisher deltas served.
    pub migration_deltas: Counter,

    // Cross-datacenter
    /// Cross-dc proxies in the index.
    pub cross_dc_proxies: Gauge,
    /// Cross-dc proxies currently started.
    pub cross_dc_proxies_started: Gauge,
    /// Successful cross-dc sync rounds.
    pub cross_dc_sync_success: Counter,
    /// Failed cross-dc sync rounds.
    pub cross_dc_sync_failures: Counter,

    // Remoting
    /// Requests dispatched through the exchanger.
    pub requests_sent: Counter,
    /// Failed requests, by failure kind.
    pub request_failures: LabeledCounter,
    /// Client disconnections handled.
    pub client_disconnects: Counter,
    /// Disconnection jobs rejected by a full executor.
    pub disconnects_rejected: Counter,

    /// Whether this meta server is leader.
    pub is_leader: AtomicBool,
}

impl MetaMetrics {
    /// Create a new metrics instance.
    pub fn new() -> Self {
        Self {
            slot_table_refreshes: Counter::new(
                "meta_slot_table_refresh_total",
                "Installed slot tables",
            ),
            slot_table_rejected: Counter::new(
                "meta_slot_table_rejected_total",
                "Rejected slot table refreshes",
            ),
            slot_table_epoch: Gauge::new(
                "meta_slot_table_epoch",
                "Epoch of the installed slot table",
            ),
            slot_count: Gauge::new("meta_slot_count", "Slots in the installed slot table"),
            leader_slots: LabeledGauge::new("meta_leader_slots", "Slots led per data node", "node"),
            slot_table_stable: Gauge::new(
                "meta_slot_table_stable",
                "Whether the installed table is stable",
            ),

            heartbeats_received: Counter::new("meta_heartbeat_total", "Heartbeats received"),
            heartbeats_discarded: LabeledCounter::new(
                "meta_heartbeat_discarded_total",
                "Heartbeats discarded",
                "reason",
            ),
            slot_statuses_recorded: Counter::new(
                "meta_slot_status_recorded_total",
                "Slot statuses recorded from heartbeats",
            ),

            migration_pages: Counter::new("meta_migration_page_total", "Migration pages served"),
            migration_deltas: Counter::new("meta_migration_delta_total", "Publisher deltas served"),

            cross_dc_proxies: Gauge::new("meta_cross_dc_proxies", "Cross-dc proxies in the index"),
            cross_dc_proxies_started: Gauge::new(
                "meta_cross_dc_proxies_started",
                "Cross-dc proxies currently started",
            ),
            cross_dc_sync_success: Counter::new(
                "meta_cross_dc_sync_total",
                "Successful cross-dc sync rounds",
            ),
            cross_dc_sync_failures: Counter::new(
                "meta_cross_dc_sync_failed_total",
                "Failed cross-dc sync rounds",
            ),

            requests_sent: Counter::new("meta_request_total", "Requests dispatched"),
            request_failures: LabeledCounter::new(
                "meta_request_failed_total",
                "Failed requests",
                "kind",
            ),
            client_disconnects: Counter::new(
                "meta_client_disconnect_total",
                "Client disconnections handled",
            ),
            disconnects_rejected: Counter::new(
                "meta_client_disconnect_rejected_total",
                "Disconnection jobs rejected by a full executor",
            ),

            is_leader: AtomicBool::new(false),
        }
    }

    /// Update leader status.
    pub fn set_leader(&self, is_leader: bool) {
        self.is_leader.store(is_leader, Ordering::Relaxed);
    }

    /// Check if this node is the leader.
    pub fn is_leader(&self) -> bool {
        self.is_leader.load(Ordering::Relaxed)
    }

    /// Format metrics in Prometheus exposition format.
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();

        macro_rules! add_scalar {
            ($kind:literal, $metric:expr) => {
                let _ = write!(
                    output,
                    "# HELP {name} {help}\n# TYPE {name} {kind}\n{name} {value}\n",
                    name = $metric.name(),
                    help = $metric.help(),
                    kind = $kind,
                    value = $metric.get()
                );
            };
        }

        add_scalar!("counter", self.slot_table_refreshes);
        add_scalar!("counter", self.slot_table_rejected);
        add_scalar!("counter", self.heartbeats_received);
        add_scalar!("counter", self.slot_statuses_recorded);
        add_scalar!("counter", self.migration_pages);
        add_scalar!("counter", self.migration_deltas);
        add_scalar!("counter", self.cross_dc_sync_success);
        add_scalar!("counter", self.cross_dc_sync_failures);
        add_scalar!("counter", self.requests_sent);
        add_scalar!("counter", self.client_disconnects);
        add_scalar!("counter", self.disconnects_rejected);

        add_scalar!("gauge", self.slot_table_epoch);
        add_scalar!("gauge", self.slot_count);
        add_scalar!("gauge", self.slot_table_stable);
        add_scalar!("gauge", self.cross_dc_proxies);
        add_scalar!("gauge", self.cross_dc_proxies_started);

        let _ = write!(
            output,
            "# HELP meta_is_leader Whether this meta server is leader\n\
             # TYPE meta_is_leader gauge\n\
             meta_is_leader {}\n",
            u8::from(self.is_leader())
        );

        output
    }
}

impl Default for MetaMetrics {
    fn default() -> Self {
        Self::new()
    }
}
