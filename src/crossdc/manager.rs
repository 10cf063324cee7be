//! Index of cross-datacenter meta proxies, driven by local leadership.

use super::client::RemoteMetaClient;
use super::server::CrossDcMetaServer;
use crate::config::NodeConfig;
use crate::error::{LifecycleError, Result};
use crate::leader::LeaderAware;
use crate::lifecycle::{
    dispose_if_possible, stop_if_possible, Lifecycle, LifecycleCell, LifecycleState, Transition,
};
use crate::metrics::MetaMetrics;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

type ServerIndex = HashMap<String, Arc<CrossDcMetaServer>>;

/// Owns one [`CrossDcMetaServer`] per remote datacenter.
///
/// Lookups read a published copy-on-write snapshot without locking the
/// insertion path. Insertions are serialized so that each datacenter gets
/// exactly one proxy, and the lock is never held while a proxy starts.
pub struct CrossDcMetaServerManager {
    node_config: NodeConfig,
    sync_interval: Duration,
    client: Arc<dyn RemoteMetaClient>,
    runtime: Handle,
    metrics: Arc<MetaMetrics>,
    lifecycle: LifecycleCell,
    index: RwLock<Arc<ServerIndex>>,
    insertion: Mutex<()>,
}

impl CrossDcMetaServerManager {
    pub fn new(
        node_config: NodeConfig,
        sync_interval: Duration,
        client: Arc<dyn RemoteMetaClient>,
        runtime: Handle,
        metrics: Arc<MetaMetrics>,
    ) -> Self {
        Self {
            node_config,
            sync_interval,
            client,
            runtime,
            metrics,
            lifecycle: LifecycleCell::new("cross-dc-meta-server-manager"),
            index: RwLock::new(Arc::new(HashMap::new())),
            insertion: Mutex::new(()),
        }
    }

    /// Proxy for `datacenter`, created and initialized on first use.
    ///
    /// Fails with [`LifecycleError::IllegalState`] once the manager has been
    /// disposed.
    pub fn get_or_create(&self, datacenter: &str) -> Result<Arc<CrossDcMetaServer>> {
        if let Some(server) = self.index.read().get(datacenter) {
            return Ok(Arc::clone(server));
        }

        let _insertion = self.insertion.lock();
        let state = self.lifecycle.state();
        if state.is_disposed() {
            return Err(LifecycleError::IllegalState {
                component: self.lifecycle.component().to_string(),
                operation: "get_or_create",
                state,
            }
            .into());
        }
        let snapshot = self.index.read().clone();
        if let Some(server) = snapshot.get(datacenter) {
            return Ok(Arc::clone(server));
        }

        let server = Arc::new(CrossDcMetaServer::new(
            datacenter,
            self.node_config.datacenter_meta_servers(datacenter),
            self.sync_interval,
            Arc::clone(&self.client),
            self.runtime.clone(),
            Arc::clone(&self.metrics),
        ));
        server.initialize()?;

        let mut next = ServerIndex::clone(&snapshot);
        next.insert(datacenter.to_string(), Arc::clone(&server));
        let size = next.len();
        *self.index.write() = Arc::new(next);
        self.metrics.cross_dc_proxies.set(size as i64);

        info!(dc = datacenter, addrs = ?server.addrs(), "Created cross-dc meta server");
        Ok(server)
    }

    /// Unpublish the proxy for `datacenter` and dispose it.
    pub fn remove(&self, datacenter: &str) -> Result<Option<Arc<CrossDcMetaServer>>> {
        let removed = {
            let _insertion = self.insertion.lock();
            let snapshot = self.index.read().clone();
            if !snapshot.contains_key(datacenter) {
                return Ok(None);
            }
            let mut next = ServerIndex::clone(&snapshot);
            let removed = next.remove(datacenter);
            self.metrics.cross_dc_proxies.set(next.len() as i64);
            *self.index.write() = Arc::new(next);
            removed
        };

        if let Some(server) = &removed {
            dispose_if_possible(server.as_ref())?;
            info!(dc = datacenter, "Removed cross-dc meta server");
        }
        Ok(removed)
    }

    /// Snapshot of the index.
    pub fn cross_dc_meta_servers(&self) -> Arc<HashMap<String, Arc<CrossDcMetaServer>>> {
        self.index.read().clone()
    }

    fn start_remote_datacenters(&self) {
        for datacenter in self.node_config.remote_datacenters() {
            let started = self
                .get_or_create(&datacenter)
                .and_then(|server| server.start());
            if let Err(e) = started {
                error!(dc = %datacenter, error = %e, "Failed to start cross-dc meta server");
            }
        }
    }

    fn stop_all(&self) {
        for (datacenter, server) in self.cross_dc_meta_servers().iter() {
            if let Err(e) = stop_if_possible(server.as_ref()) {
                warn!(dc = %datacenter, error = %e, "Failed to stop cross-dc meta server");
            }
        }
    }
}

impl LeaderAware for CrossDcMetaServerManager {
    /// Start a proxy for every configured datacenter except the local one.
    ///
    /// The local datacenter's slot table is the one this cluster owns, so it
    /// never gets a proxy.
    fn is_leader(&self) {
        if self.lifecycle.state().is_disposed() {
            debug!("Manager disposed, ignoring leadership");
            return;
        }
        self.start_remote_datacenters();
    }

    fn not_leader(&self) {
        self.stop_all();
    }
}

impl Lifecycle for CrossDcMetaServerManager {
    fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    fn initialize(&self) -> Result<()> {
        self.lifecycle.begin_initialize()?;
        Ok(())
    }

    /// The manager only tracks its own state; proxies start on leadership.
    fn start(&self) -> Result<()> {
        self.lifecycle.begin_start()?;
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        if let Transition::Apply { .. } = self.lifecycle.begin_stop()? {
            self.stop_all();
        }
        Ok(())
    }

    fn dispose(&self) -> Result<()> {
        if let Transition::Apply { .. } = self.lifecycle.begin_dispose()? {
            let drained = {
                let _insertion = self.insertion.lock();
                std::mem::take(&mut *self.index.write())
            };
            for (datacenter, server) in drained.iter() {
                if let Err(e) = dispose_if_possible(server.as_ref()) {
                    warn!(dc = %datacenter, error = %e, "Failed to dispose cross-dc meta server");
                }
            }
            self.metrics.cross_dc_proxies.set(0);
            info!(count = drained.len(), "Cross-dc meta server manager disposed");
        }
        Ok(())
    }
}

impl std::fmt::Debug for CrossDcMetaServerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrossDcMetaServerManager")
            .field("local_datacenter", &self.node_config.local_datacenter)
            .field("proxies", &self.index.read().len())
            .field("state", &self.lifecycle.state())
            .finish()
    }
}
