//! Meta server assembly.
//!
//! [`MetaServer`] builds every coordination component and wires them
//! together with explicit constructor injection. The transport, the
//! leader election and the remote datacenter client are supplied by the
//! caller.

use crate::config::{MetaServerConfig, NodeConfig};
use crate::crossdc::{CrossDcMetaServerManager, RemoteMetaClient};
use crate::decision::{DecisionModeCell, DecisionModeResource};
use crate::error::Result;
use crate::leader::LeadershipHub;
use crate::lifecycle::{
    dispose_if_possible, initialize_if_possible, start_if_possible, stop_if_possible, Lifecycle,
};
use crate::metrics::MetaMetrics;
use crate::migration::{PublisherStore, SlotMigrationService};
use crate::monitor::SlotTableMonitor;
use crate::remoting::{
    BoundedExecutor, ClientConnectionHandler, ClientRegistry, ConnectIndexed, Exchange,
    MetaRequestHandler, ServerSideExchanger,
};
use crate::slot::{SlotArranger, SlotFunction, SlotManager};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::info;

/// A fully wired meta server.
pub struct MetaServer {
    config: MetaServerConfig,
    node_config: NodeConfig,
    metrics: Arc<MetaMetrics>,
    slot_manager: Arc<SlotManager>,
    monitor: Arc<SlotTableMonitor>,
    arranger: Arc<SlotArranger>,
    publishers: Arc<PublisherStore>,
    migration: Arc<SlotMigrationService>,
    leadership: Arc<LeadershipHub>,
    cross_dc: Arc<CrossDcMetaServerManager>,
    decision: Arc<DecisionModeCell>,
    exchanger: Arc<ServerSideExchanger>,
    handler: Arc<MetaRequestHandler>,
    client_executor: Arc<BoundedExecutor>,
}

impl MetaServer {
    pub fn new(
        config: MetaServerConfig,
        node_config: NodeConfig,
        exchange: Arc<dyn Exchange>,
        remote_client: Arc<dyn RemoteMetaClient>,
        runtime: Handle,
    ) -> Self {
        let metrics = Arc::new(MetaMetrics::new());

        let slot_manager = Arc::new(SlotManager::new(config.slot.clone(), metrics.clone()));
        let monitor = Arc::new(SlotTableMonitor::new(
            config.slot.clone(),
            config.slot_table_record_interval,
            metrics.clone(),
            runtime.clone(),
        ));
        slot_manager.add_listener(monitor.clone());
        monitor.reset(slot_manager.get_slot_table());

        let leadership = Arc::new(LeadershipHub::new(metrics.clone()));
        let decision = Arc::new(DecisionModeCell::new(config.decision_mode));
        let arranger = Arc::new(SlotArranger::new(
            decision.clone(),
            leadership.clone(),
            monitor.clone(),
            slot_manager.clone(),
        ));

        let publishers = Arc::new(PublisherStore::new(SlotFunction::new(config.slot.slot_num)));
        let migration = Arc::new(SlotMigrationService::new(
            slot_manager.clone(),
            publishers.clone(),
            config.migration_batch_size,
            metrics.clone(),
        ));

        let cross_dc = Arc::new(CrossDcMetaServerManager::new(
            node_config.clone(),
            config.cross_dc_meta_sync_interval,
            remote_client,
            runtime.clone(),
            metrics.clone(),
        ));
        leadership.add_listener(cross_dc.clone());

        let exchanger = Arc::new(ServerSideExchanger::new(
            exchange,
            config.remoting.server_port,
            config.remoting.rpc_timeout,
            metrics.clone(),
        ));
        let handler = Arc::new(MetaRequestHandler::new(
            slot_manager.clone(),
            monitor.clone(),
            migration.clone(),
        ));
        let client_executor = Arc::new(BoundedExecutor::new(
            "connect-client",
            config.executor.connect_client_workers,
            config.executor.connect_client_queue_size,
            &runtime,
        ));

        Self {
            config,
            node_config,
            metrics,
            slot_manager,
            monitor,
            arranger,
            publishers,
            migration,
            leadership,
            cross_dc,
            decision,
            exchanger,
            handler,
            client_executor,
        }
    }

    /// Initialize and start the background components.
    pub fn start(&self) -> Result<()> {
        initialize_if_possible(self.monitor.as_ref())?;
        initialize_if_possible(self.cross_dc.as_ref())?;
        start_if_possible(self.monitor.as_ref())?;
        start_if_possible(self.cross_dc.as_ref())?;
        info!(
            dc = %self.node_config.local_datacenter,
            port = self.config.remoting.server_port,
            slot_num = self.config.slot.slot_num,
            replicas = self.config.slot.replicas,
            "Meta server started"
        );
        Ok(())
    }

    /// Stop the background components. The server can be started again.
    pub fn stop(&self) -> Result<()> {
        stop_if_possible(self.cross_dc.as_ref())?;
        stop_if_possible(self.monitor.as_ref())?;
        info!("Meta server stopped");
        Ok(())
    }

    /// Stop everything and release the cross-dc proxies for good.
    pub fn shutdown(&self) -> Result<()> {
        dispose_if_possible(self.cross_dc.as_ref())?;
        dispose_if_possible(self.monitor.as_ref())?;
        self.client_executor.shutdown();
        info!("Meta server shut down");
        Ok(())
    }

    /// Build the handler for client connection events.
    ///
    /// Publishers are tracked by this server; subscriber and watcher indexes
    /// and the cancellation target belong to the session layer.
    pub fn client_connection_handler(
        &self,
        subscribers: Arc<dyn ConnectIndexed>,
        watchers: Arc<dyn ConnectIndexed>,
        registry: Arc<dyn ClientRegistry>,
    ) -> ClientConnectionHandler {
        ClientConnectionHandler::new(
            self.publishers.clone(),
            subscribers,
            watchers,
            registry,
            self.client_executor.clone(),
            self.metrics.clone(),
        )
    }

    /// Administrative handle for the decision mode.
    pub fn decision_mode_resource(&self) -> DecisionModeResource {
        DecisionModeResource::new(self.decision.clone())
    }

    pub fn config(&self) -> &MetaServerConfig {
        &self.config
    }

    pub fn node_config(&self) -> &NodeConfig {
        &self.node_config
    }

    pub fn metrics(&self) -> &Arc<MetaMetrics> {
        &self.metrics
    }

    pub fn slot_manager(&self) -> &Arc<SlotManager> {
        &self.slot_manager
    }

    pub fn monitor(&self) -> &Arc<SlotTableMonitor> {
        &self.monitor
    }

    pub fn arranger(&self) -> &Arc<SlotArranger> {
        &self.arranger
    }

    pub fn publishers(&self) -> &Arc<PublisherStore> {
        &self.publishers
    }

    pub fn migration(&self) -> &Arc<SlotMigrationService> {
        &self.migration
    }

    /// Entry point for the leader election.
    pub fn leadership(&self) -> &Arc<LeadershipHub> {
        &self.leadership
    }

    pub fn cross_dc(&self) -> &Arc<CrossDcMetaServerManager> {
        &self.cross_dc
    }

    pub fn exchanger(&self) -> &Arc<ServerSideExchanger> {
        &self.exchanger
    }

    /// Handler for messages arriving on the server port.
    pub fn handler(&self) -> &Arc<MetaRequestHandler> {
        &self.handler
    }
}

impl std::fmt::Debug for MetaServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaServer")
            .field("datacenter", &self.node_config.local_datacenter)
            .field("epoch", &self.slot_manager.epoch())
            .field("leader", &self.leadership.am_i_leader())
            .field("monitor", &self.monitor.lifecycle_state())
            .field("cross_dc", &self.cross_dc.lifecycle_state())
            .finish()
    }
}
