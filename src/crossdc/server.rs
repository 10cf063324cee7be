//! Proxy for the meta servers of one remote datacenter.

use super::client::RemoteMetaClient;
use crate::error::{Error, Result};
use crate::lifecycle::{Lifecycle, LifecycleCell, LifecycleState, Transition};
use crate::metrics::MetaMetrics;
use crate::slot::SlotTable;
use parking_lot::{Mutex, RwLock};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct SyncState {
    datacenter: String,
    addrs: Vec<SocketAddr>,
    client: Arc<dyn RemoteMetaClient>,
    remote_table: RwLock<Option<Arc<SlotTable>>>,
    next_addr: AtomicUsize,
    metrics: Arc<MetaMetrics>,
}

impl SyncState {
    fn remote_epoch(&self) -> u64 {
        self.remote_table.read().as_ref().map_or(0, |t| t.epoch())
    }

    async fn sync_once(&self) -> Result<bool> {
        if self.addrs.is_empty() {
            return Err(Error::Config(format!(
                "no meta servers configured for datacenter {}",
                self.datacenter
            )));
        }
        let index = self.next_addr.fetch_add(1, Ordering::Relaxed) % self.addrs.len();
        let addr = self.addrs[index];
        let epoch = self.remote_epoch();

        let Some(table) = self.client.fetch_slot_table(addr, epoch).await? else {
            debug!(dc = %self.datacenter, %addr, epoch, "Remote slot table unchanged");
            return Ok(false);
        };

        let mut remote = self.remote_table.write();
        if remote.as_ref().is_some_and(|t| t.epoch() >= table.epoch()) {
            return Ok(false);
        }
        info!(
            dc = %self.datacenter,
            %addr,
            prev_epoch = epoch,
            epoch = table.epoch(),
            "Remote slot table updated"
        );
        *remote = Some(Arc::new(table));
        Ok(true)
    }

    async fn tick(&self) {
        match self.sync_once().await {
            Ok(_) => self.metrics.cross_dc_sync_success.inc(),
            Err(e) => {
                self.metrics.cross_dc_sync_failures.inc();
                warn!(dc = %self.datacenter, error = %e, "Cross-dc meta sync failed");
            }
        }
    }
}

/// Keeps a copy of one remote datacenter's slot table.
///
/// While started, a background task polls the datacenter's meta servers in
/// turn every `sync_interval` and keeps the newest table by epoch.
pub struct CrossDcMetaServer {
    state: Arc<SyncState>,
    lifecycle: LifecycleCell,
    sync_interval: Duration,
    runtime: Handle,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl CrossDcMetaServer {
    pub fn new(
        datacenter: impl Into<String>,
        addrs: Vec<SocketAddr>,
        sync_interval: Duration,
        client: Arc<dyn RemoteMetaClient>,
        runtime: Handle,
        metrics: Arc<MetaMetrics>,
    ) -> Self {
        let datacenter = datacenter.into();
        Self {
            lifecycle: LifecycleCell::new(format!("cross-dc-meta-server[{datacenter}]")),
            state: Arc::new(SyncState {
                datacenter,
                addrs,
                client,
                remote_table: RwLock::new(None),
                next_addr: AtomicUsize::new(0),
                metrics,
            }),
            sync_interval,
            runtime,
            task: Mutex::new(None),
        }
    }

    pub fn datacenter(&self) -> &str {
        &self.state.datacenter
    }

    pub fn addrs(&self) -> &[SocketAddr] {
        &self.state.addrs
    }

    /// Newest slot table fetched from the remote datacenter.
    pub fn remote_slot_table(&self) -> Option<Arc<SlotTable>> {
        self.state.remote_table.read().clone()
    }

    /// Run one sync round now. Returns whether a newer table was stored.
    pub async fn sync_once(&self) -> Result<bool> {
        self.state.sync_once().await
    }

    fn spawn_sync(&self) -> (CancellationToken, JoinHandle<()>) {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let state = Arc::clone(&self.state);
        let period = self.sync_interval;

        let handle = self.runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {}
                }
                // a round that began before stop() may finish; none begins after
                if cancelled.is_cancelled() {
                    break;
                }
                state.tick().await;
            }
            debug!(dc = %state.datacenter, "Cross-dc sync task shutting down");
        });
        (token, handle)
    }
}

impl Lifecycle for CrossDcMetaServer {
    fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    fn initialize(&self) -> Result<()> {
        self.lifecycle.begin_initialize()?;
        debug!(dc = %self.datacenter(), addrs = ?self.addrs(), "Cross-dc meta server initialized");
        Ok(())
    }

    fn start(&self) -> Result<()> {
        // held across the transition so a concurrent stop() sees the task
        let mut task = self.task.lock();
        if self.state.addrs.is_empty() {
            return Err(Error::Config(format!(
                "cannot start cross-dc sync for {}: no meta servers configured",
                self.datacenter()
            )));
        }
        let Transition::Apply { .. } = self.lifecycle.begin_start()? else {
            return Ok(());
        };

        *task = Some(self.spawn_sync());
        self.state.metrics.cross_dc_proxies_started.inc();
        info!(
            dc = %self.datacenter(),
            interval_ms = self.sync_interval.as_millis() as u64,
            "Cross-dc meta server started"
        );
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let mut task = self.task.lock();
        if let Transition::Apply { .. } = self.lifecycle.begin_stop()? {
            if let Some((token, _handle)) = task.take() {
                token.cancel();
            }
            self.state.metrics.cross_dc_proxies_started.dec();
            info!(dc = %self.datacenter(), "Cross-dc meta server stopped");
        }
        Ok(())
    }

    fn dispose(&self) -> Result<()> {
        if let Transition::Apply { .. } = self.lifecycle.begin_dispose()? {
            *self.state.remote_table.write() = None;
            debug!(dc = %self.datacenter(), "Cross-dc meta server disposed");
        }
        Ok(())
    }
}

impl Drop for CrossDcMetaServer {
    fn drop(&mut self) {
        if let Some((token, _)) = self.task.get_mut().take() {
            token.cancel();
        }
    }
}

impl std::fmt::Debug for CrossDcMetaServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrossDcMetaServer")
            .field("datacenter", &self.datacenter())
            .field("addrs", &self.addrs())
            .field("state", &self.lifecycle.state())
            .field("remote_epoch", &self.state.remote_epoch())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LifecycleError;
    use crate::testing::{addr, wait_for, MockRemoteMetaClient};
    use crate::types::NodeId;
    use crate::slot::Slot;

    fn remote_table(epoch: u64) -> SlotTable {
        SlotTable::new(epoch, vec![Slot::new(0, 1, NodeId::from("r1"), vec![])])
    }

    fn server(client: Arc<MockRemoteMetaClient>, addrs: Vec<SocketAddr>) -> CrossDcMetaServer {
        CrossDcMetaServer::new(
            "dc2",
            addrs,
            Duration::from_millis(10),
            client,
            Handle::current(),
            Arc::new(MetaMetrics::new()),
        )
    }

    #[tokio::test]
    async fn test_sync_keeps_newest_table_and_rotates() {
        let client = Arc::new(MockRemoteMetaClient::new());
        let proxy = server(client.clone(), vec![addr("10.1.0.1:9612"), addr("10.1.0.2:9612")]);

        client.set_table(remote_table(3));
        assert!(proxy.sync_once().await.unwrap());
        assert_eq!(proxy.remote_slot_table().unwrap().epoch(), 3);

        client.set_table(remote_table(2));
        assert!(!proxy.sync_once().await.unwrap());
        assert_eq!(proxy.remote_slot_table().unwrap().epoch(), 3);

        assert_eq!(
            client.calls(),
            vec![(addr("10.1.0.1:9612"), 0), (addr("10.1.0.2:9612"), 3)]
        );
    }

    #[tokio::test]
    async fn test_lifecycle_runs_and_stops_sync_task() {
        let client = Arc::new(MockRemoteMetaClient::new());
        client.set_table(remote_table(5));
        let proxy = server(client.clone(), vec![addr("10.1.0.1:9612")]);

        assert!(matches!(
            proxy.start(),
            Err(Error::Lifecycle(LifecycleError::IllegalState { .. }))
        ));

        proxy.initialize().unwrap();
        proxy.start().unwrap();
        proxy.start().unwrap();
        assert_eq!(proxy.lifecycle_state(), LifecycleState::Started);

        wait_for(
            || proxy.remote_slot_table().is_some(),
            Duration::from_secs(2),
            Duration::from_millis(5),
        )
        .await
        .unwrap();

        proxy.stop().unwrap();
        proxy.stop().unwrap();
        assert_eq!(proxy.lifecycle_state(), LifecycleState::Stopped);

        tokio::time::sleep(Duration::from_millis(30)).await;
        let calls = client.calls().len();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(client.calls().len(), calls);

        proxy.dispose().unwrap();
        assert!(proxy.remote_slot_table().is_none());
        assert!(proxy.start().is_err());
    }

    #[tokio::test]
    async fn test_start_without_addrs_fails_and_rolls_back() {
        let proxy = server(Arc::new(MockRemoteMetaClient::new()), vec![]);
        proxy.initialize().unwrap();

        assert!(matches!(proxy.start(), Err(Error::Config(_))));
        assert_eq!(proxy.lifecycle_state(), LifecycleState::Initialized);
    }

    #[tokio::test]
    async fn test_failed_round_keeps_previous_table() {
        let client = Arc::new(MockRemoteMetaClient::new());
        let proxy = server(client.clone(), vec![addr("10.1.0.1:9612")]);

        client.set_table(remote_table(4));
        proxy.sync_once().await.unwrap();
        client.fail_with("connection refused");

        assert!(proxy.sync_once().await.is_err());
        assert_eq!(proxy.remote_slot_table().unwrap().epoch(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_no_round_begins_after_stop() {
        for _ in 0..10 {
            let client = Arc::new(MockRemoteMetaClient::new());
            client.delay_fetches(Duration::from_millis(40));
            let proxy = CrossDcMetaServer::new(
                "dc2",
                vec![addr("10.1.0.1:9612")],
                Duration::from_millis(5),
                client.clone(),
                Handle::current(),
                Arc::new(MetaMetrics::new()),
            );
            proxy.initialize().unwrap();
            proxy.start().unwrap();

            // stop while the first round is in flight
            tokio::time::sleep(Duration::from_millis(20)).await;
            proxy.stop().unwrap();
            let rounds = client.calls().len();

            tokio::time::sleep(Duration::from_millis(150)).await;
            assert_eq!(client.calls().len(), rounds);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_start_and_stop_leave_no_live_task() {
        let client = Arc::new(MockRemoteMetaClient::new());
        for _ in 0..200 {
            let proxy = server(client.clone(), vec![addr("10.1.0.1:9612")]);
            proxy.initialize().unwrap();

            std::thread::scope(|scope| {
                scope.spawn(|| proxy.start().unwrap());
                scope.spawn(|| {
                    while !proxy.lifecycle_state().is_started() {
                        std::hint::spin_loop();
                    }
                    proxy.stop().unwrap();
                });
            });

            assert_eq!(proxy.lifecycle_state(), LifecycleState::Stopped);
            let live = proxy
                .task
                .lock()
                .as_ref()
                .is_some_and(|(token, _)| !token.is_cancelled());
            assert!(!live);
        }
    }
}
