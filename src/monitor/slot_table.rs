//! Heartbeat-driven stability monitor.

use super::heartbeat::{HeartbeatOutcome, HeartbeatRequest, LeaderStatus};
use crate::config::SlotConfig;
use crate::error::Result;
use crate::lifecycle::{Lifecycle, LifecycleCell, LifecycleState, Transition};
use crate::metrics::MetaMetrics;
use crate::slot::{SlotManager, SlotTable, SlotTableListener};
use crate::types::SlotId;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Leader statuses collected for one table epoch.
///
/// A refresh installs a fresh value; observations are never carried across
/// epochs.
#[derive(Debug)]
pub struct EpochObservations {
    epoch: u64,
    table: Arc<SlotTable>,
    statuses: DashMap<SlotId, LeaderStatus>,
    changed_at: Instant,
}

impl EpochObservations {
    fn new(table: Arc<SlotTable>) -> Self {
        Self {
            epoch: table.epoch(),
            table,
            statuses: DashMap::new(),
            changed_at: Instant::now(),
        }
    }

    /// Epoch the observations belong to.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The table the observations are checked against.
    pub fn table(&self) -> &Arc<SlotTable> {
        &self.table
    }

    /// Last recorded status of a slot.
    pub fn status(&self, slot_id: SlotId) -> Option<LeaderStatus> {
        self.statuses.get(&slot_id).map(|s| *s)
    }

    /// Time since the table was installed.
    pub fn age(&self) -> Duration {
        self.changed_at.elapsed()
    }

    fn is_stable(&self) -> bool {
        !self.table.is_empty()
            && self
                .table
                .slot_ids()
                .all(|id| self.status(id) == Some(LeaderStatus::Healthy))
    }
}

struct MonitorState {
    slot_config: SlotConfig,
    observations: RwLock<Arc<EpochObservations>>,
    metrics: Arc<MetaMetrics>,
}

impl MonitorState {
    fn current(&self) -> Arc<EpochObservations> {
        self.observations.read().clone()
    }

    fn record_slot_table(&self) {
        let observations = self.current();
        let table = observations.table();
        let leader_counts = table.leader_counts();
        let stable = observations.is_stable();

        self.metrics.slot_count.set(table.slot_count() as i64);
        self.metrics.slot_table_stable.set(i64::from(stable));
        self.metrics.leader_slots.replace_all(
            leader_counts
                .iter()
                .map(|(node, count)| (node.as_str(), *count as i64)),
        );

        info!(
            epoch = table.epoch(),
            slots = table.slot_count(),
            stable,
            reported = observations.statuses.len(),
            age_ms = observations.age().as_millis() as u64,
            leaders = ?leader_counts,
            "Slot table record"
        );
    }
}

/// Decides whether the installed slot table is live on the data nodes.
pub struct SlotTableMonitor {
    state: Arc<MonitorState>,
    lifecycle: LifecycleCell,
    runtime: Handle,
    record_interval: Duration,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl SlotTableMonitor {
    /// Create a monitor observing the empty initial table.
    pub fn new(
        slot_config: SlotConfig,
        record_interval: Duration,
        metrics: Arc<MetaMetrics>,
        runtime: Handle,
    ) -> Self {
        Self {
            state: Arc::new(MonitorState {
                slot_config,
                observations: RwLock::new(Arc::new(EpochObservations::new(Arc::new(
                    SlotTable::init(),
                )))),
                metrics,
            }),
            lifecycle: LifecycleCell::new("slot-table-monitor"),
            runtime,
            record_interval,
            task: Mutex::new(None),
        }
    }

    /// Start tracking `table`, dropping every earlier observation.
    pub fn reset(&self, table: Arc<SlotTable>) {
        let epoch = table.epoch();
        *self.state.observations.write() = Arc::new(EpochObservations::new(table));
        debug!(epoch, "Slot table monitor reset");
    }

    /// Current observations.
    pub fn observations(&self) -> Arc<EpochObservations> {
        self.state.current()
    }

    /// Epoch being tracked.
    pub fn epoch(&self) -> u64 {
        self.state.current().epoch()
    }

    /// Apply a heartbeat.
    pub fn on_heartbeat(&self, request: &HeartbeatRequest) -> HeartbeatOutcome {
        let metrics = &self.state.metrics;
        metrics.heartbeats_received.inc();

        let observations = self.state.current();
        if request.slot_table_epoch != observations.epoch() {
            metrics.heartbeats_discarded.inc("stale_epoch");
            debug!(
                node = %request.node,
                node_epoch = request.slot_table_epoch,
                epoch = observations.epoch(),
                "Discarding heartbeat for another slot table epoch"
            );
            return HeartbeatOutcome::StaleEpoch {
                current: observations.epoch(),
            };
        }

        let basic = &request.slot_basic_info;
        let config = &self.state.slot_config;
        if basic.slot_num != config.slot_num || basic.replicas != config.replicas {
            metrics.heartbeats_discarded.inc("slot_config");
            warn!(
                node = %request.node,
                slot_num = basic.slot_num,
                replicas = basic.replicas,
                expected_slot_num = config.slot_num,
                expected_replicas = config.replicas,
                "Discarding heartbeat with mismatched slot config"
            );
            return HeartbeatOutcome::SlotConfigMismatch;
        }

        let mut recorded = 0;
        for status in &request.statuses {
            let Some(slot) = observations.table().get_slot(status.slot_id) else {
                continue;
            };
            if slot.leader != request.node || slot.leader_epoch != status.leader_epoch {
                continue;
            }
            observations.statuses.insert(status.slot_id, status.status);
            recorded += 1;
        }
        metrics.slot_statuses_recorded.inc_by(recorded as u64);

        HeartbeatOutcome::Accepted { recorded }
    }

    /// Check if every slot of the installed table has a healthy report.
    pub fn is_slot_table_stable(&self) -> bool {
        self.state.current().is_stable()
    }

    /// Log a diagnostic summary of the installed table.
    pub fn record_slot_table(&self) {
        self.state.record_slot_table();
    }

    fn spawn_recorder(&self) -> (CancellationToken, JoinHandle<()>) {
        let token = CancellationToken::new();
        let state = Arc::clone(&self.state);
        let cancelled = token.clone();
        let period = self.record_interval;

        let handle = self.runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => {
                        debug!("Slot table recorder shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        state.record_slot_table();
                    }
                }
            }
        });
        (token, handle)
    }
}

impl SlotTableListener for SlotTableMonitor {
    fn update(&self, _source: &SlotManager, table: &Arc<SlotTable>) {
        self.reset(table.clone());
    }
}

impl Lifecycle for SlotTableMonitor {
    fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    fn initialize(&self) -> Result<()> {
        self.lifecycle.begin_initialize()?;
        Ok(())
    }

    fn start(&self) -> Result<()> {
        let mut task = self.task.lock();
        if let Transition::Apply { .. } = self.lifecycle.begin_start()? {
            *task = Some(self.spawn_recorder());
            info!(
                interval_ms = self.record_interval.as_millis() as u64,
                "Slot table monitor started"
            );
        }
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let mut task = self.task.lock();
        if let Transition::Apply { .. } = self.lifecycle.begin_stop()? {
            if let Some((token, _handle)) = task.take() {
                token.cancel();
            }
            info!("Slot table monitor stopped");
        }
        Ok(())
    }

    fn dispose(&self) -> Result<()> {
        self.lifecycle.begin_dispose()?;
        Ok(())
    }
}

impl std::fmt::Debug for SlotTableMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotTableMonitor")
            .field("epoch", &self.epoch())
            .field("state", &self.lifecycle.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::SlotStatus;
    use crate::slot::{Slot, SlotTableGenerator};
    use crate::types::NodeId;

    fn node(s: &str) -> NodeId {
        NodeId::from(s)
    }

    fn monitor() -> SlotTableMonitor {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        SlotTableMonitor::new(
            SlotConfig::new(4, 2),
            Duration::from_secs(60),
            Arc::new(MetaMetrics::new()),
            runtime.handle().clone(),
        )
    }

    fn table() -> Arc<SlotTable> {
        Arc::new(SlotTable::new(
            3,
            vec![
                Slot::new(0, 1, node("a"), vec![node("b")]),
                Slot::new(1, 2, node("b"), vec![node("a")]),
            ],
        ))
    }

    fn heartbeat(from: &str, epoch: u64, statuses: Vec<SlotStatus>) -> HeartbeatRequest {
        HeartbeatRequest::new(node(from), epoch, "dc1", SlotConfig::new(4, 2).basic_info())
            .with_statuses(statuses)
    }

    #[test]
    fn test_stable_after_all_leaders_report() {
        let monitor = monitor();
        monitor.reset(table());
        assert!(!monitor.is_slot_table_stable());

        let outcome = monitor.on_heartbeat(&heartbeat("a", 3, vec![SlotStatus::healthy(0, 1)]));
        assert_eq!(outcome, HeartbeatOutcome::Accepted { recorded: 1 });
        assert!(!monitor.is_slot_table_stable());

        monitor.on_heartbeat(&heartbeat("b", 3, vec![SlotStatus::healthy(1, 2)]));
        assert!(monitor.is_slot_table_stable());

        monitor.on_heartbeat(&heartbeat(
            "b",
            3,
            vec![SlotStatus::new(1, 2, LeaderStatus::Unhealthy)],
        ));
        assert!(!monitor.is_slot_table_stable());
    }

    #[test]
    fn test_ignores_non_leaders_and_old_leader_epochs() {
        let monitor = monitor();
        monitor.reset(table());

        // b follows slot 0
        let outcome = monitor.on_heartbeat(&heartbeat("b", 3, vec![SlotStatus::healthy(0, 1)]));
        assert_eq!(outcome, HeartbeatOutcome::Accepted { recorded: 0 });

        // b leads slot 1 at leader epoch 2, not 1
        monitor.on_heartbeat(&heartbeat("b", 3, vec![SlotStatus::healthy(1, 1)]));
        // unknown slot
        monitor.on_heartbeat(&heartbeat("a", 3, vec![SlotStatus::healthy(7, 1)]));

        assert_eq!(monitor.observations().status(0), None);
        assert_eq!(monitor.observations().status(1), None);
    }

    #[test]
    fn test_stale_epoch_discarded() {
        let monitor = monitor();
        monitor.reset(table());

        for epoch in [2, 4] {
            let outcome = monitor.on_heartbeat(&heartbeat(
                "a",
                epoch,
                vec![SlotStatus::healthy(0, 1)],
            ));
            assert_eq!(outcome, HeartbeatOutcome::StaleEpoch { current: 3 });
        }
        assert_eq!(monitor.observations().status(0), None);
        assert_eq!(monitor.state.metrics.heartbeats_discarded.get("stale_epoch"), 2);
    }

    #[test]
    fn test_slot_config_mismatch_discarded() {
        let monitor = monitor();
        monitor.reset(table());

        let mut request = heartbeat("a", 3, vec![SlotStatus::healthy(0, 1)]);
        request.slot_basic_info.slot_num = 16;
        assert_eq!(monitor.on_heartbeat(&request), HeartbeatOutcome::SlotConfigMismatch);
        assert_eq!(monitor.observations().status(0), None);
    }

    #[test]
    fn test_empty_table_never_stable() {
        let monitor = monitor();
        assert!(!monitor.is_slot_table_stable());
        let outcome = monitor.on_heartbeat(&heartbeat("a", 0, vec![]));
        assert!(outcome.is_accepted());
        assert!(!monitor.is_slot_table_stable());
    }

    #[test]
    fn test_listener_reset_on_refresh() {
        let metrics = Arc::new(MetaMetrics::new());
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let manager = SlotManager::new(SlotConfig::new(4, 1), metrics.clone());
        let monitor = Arc::new(SlotTableMonitor::new(
            SlotConfig::new(4, 1),
            Duration::from_secs(60),
            metrics,
            runtime.handle().clone(),
        ));
        manager.add_listener(monitor.clone());

        let generator = SlotTableGenerator::new(4, 1);
        let nodes = vec![node("a"), node("b")];
        manager.refresh(generator.generate(&nodes, None).unwrap()).unwrap();
        assert_eq!(monitor.epoch(), 1);

        let table = manager.get_slot_table();
        for n in &nodes {
            let statuses = table
                .transfer(Some(n), true)
                .remove(0)
                .leaders
                .into_iter()
                .map(|id| SlotStatus::healthy(id, table.get_slot(id).unwrap().leader_epoch));
            let basic_info = SlotConfig::new(4, 1).basic_info();
            let request =
                HeartbeatRequest::new(n.clone(), 1, "dc1", basic_info).with_statuses(statuses);
            monitor.on_heartbeat(&request);
        }
        assert!(monitor.is_slot_table_stable());

        let next = generator.generate(&[node("a")], Some(table.as_ref())).unwrap();
        manager.refresh(next).unwrap();
        assert_eq!(monitor.epoch(), 2);
        assert!(!monitor.is_slot_table_stable());
    }

    #[tokio::test]
    async fn test_lifecycle_runs_recorder() {
        let metrics = Arc::new(MetaMetrics::new());
        let monitor = SlotTableMonitor::new(
            SlotConfig::new(4, 2),
            Duration::from_millis(10),
            metrics.clone(),
            Handle::current(),
        );
        monitor.reset(table());

        assert!(monitor.start().is_err());
        monitor.initialize().unwrap();
        monitor.start().unwrap();
        monitor.start().unwrap();
        assert!(monitor.lifecycle_state().is_started());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(metrics.slot_count.get(), 2);
        assert_eq!(metrics.leader_slots.get("a"), 1);

        monitor.stop().unwrap();
        monitor.stop().unwrap();
        monitor.dispose().unwrap();
        assert!(monitor.lifecycle_state().is_disposed());
    }
}
