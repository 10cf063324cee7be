//! Configuration types for the meta coordination core.

use crate::decision::DecisionMode;
use crate::slot::SlotBasicInfo;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

/// Default total number of slots.
pub const SLOT_NUM: u32 = 256;

/// Default number of copies of each slot (leader included).
pub const SLOT_REPLICAS: usize = 2;

/// Name of the slot hash function.
pub const SLOT_FUNC: &str = "xxhash64";

/// Main configuration for a meta server.
#[derive(Debug, Clone)]
pub struct MetaServerConfig {
    /// Slot partitioning configuration.
    pub slot: SlotConfig,

    /// Interval between synchronizations with each remote datacenter.
    pub cross_dc_meta_sync_interval: Duration,

    /// Interval between diagnostic slot table snapshots.
    pub slot_table_record_interval: Duration,

    /// Maximum publisher deltas per migration page.
    pub migration_batch_size: usize,

    /// Initial decision mode; can be changed at runtime.
    pub decision_mode: DecisionMode,

    /// Remoting configuration.
    pub remoting: RemotingConfig,

    /// Executor configuration.
    pub executor: ExecutorConfig,
}

impl Default for MetaServerConfig {
    fn default() -> Self {
        Self {
            slot: SlotConfig::default(),
            cross_dc_meta_sync_interval: Duration::from_secs(10),
            slot_table_record_interval: Duration::from_secs(60),
            migration_batch_size: 1000,
            decision_mode: DecisionMode::Running,
            remoting: RemotingConfig::default(),
            executor: ExecutorConfig::default(),
        }
    }
}

impl MetaServerConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set slot configuration.
    pub fn with_slot_config(mut self, slot: SlotConfig) -> Self {
        self.slot = slot;
        self
    }

    /// Set the cross-datacenter sync interval.
    pub fn with_cross_dc_meta_sync_interval(mut self, interval: Duration) -> Self {
        self.cross_dc_meta_sync_interval = interval;
        self
    }

    /// Set the cross-datacenter sync interval in milliseconds.
    pub fn with_cross_dc_meta_sync_interval_millis(self, millis: u64) -> Self {
        self.with_cross_dc_meta_sync_interval(Duration::from_millis(millis))
    }

    /// Set the diagnostic slot table record interval.
    pub fn with_slot_table_record_interval(mut self, interval: Duration) -> Self {
        self.slot_table_record_interval = interval;
        self
    }

    /// Set the migration page size.
    pub fn with_migration_batch_size(mut self, batch_size: usize) -> Self {
        self.migration_batch_size = batch_size.max(1);
        self
    }

    /// Set the initial decision mode.
    pub fn with_decision_mode(mut self, mode: DecisionMode) -> Self {
        self.decision_mode = mode;
        self
    }

    /// Set remoting configuration.
    pub fn with_remoting_config(mut self, remoting: RemotingConfig) -> Self {
        self.remoting = remoting;
        self
    }

    /// Set executor configuration.
    pub fn with_executor_config(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }
}

/// Slot partitioning configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotConfig {
    /// Total number of slots.
    pub slot_num: u32,

    /// Copies of each slot, leader included.
    pub replicas: usize,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            slot_num: SLOT_NUM,
            replicas: SLOT_REPLICAS,
        }
    }
}

impl SlotConfig {
    /// Create a slot configuration.
    pub fn new(slot_num: u32, replicas: usize) -> Self {
        Self {
            slot_num,
            replicas: replicas.max(1),
        }
    }

    /// Basic info advertised in heartbeats.
    pub fn basic_info(&self) -> SlotBasicInfo {
        SlotBasicInfo::new(self.slot_num, self.replicas, SLOT_FUNC)
    }
}

/// Remoting configuration.
#[derive(Debug, Clone)]
pub struct RemotingConfig {
    /// Port the meta server listens on for data/session nodes.
    pub server_port: u16,

    /// Default timeout for outgoing requests.
    pub rpc_timeout: Duration,
}

impl Default for RemotingConfig {
    fn default() -> Self {
        Self {
            server_port: 9610,
            rpc_timeout: Duration::from_secs(3),
        }
    }
}

impl RemotingConfig {
    /// Create a remoting config for the given port.
    pub fn new(server_port: u16) -> Self {
        Self {
            server_port,
            ..Default::default()
        }
    }

    /// Set the default request timeout.
    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }
}

/// Executor sizing.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Workers draining the client disconnect queue.
    pub connect_client_workers: usize,

    /// Capacity of the client disconnect queue.
    pub connect_client_queue_size: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            connect_client_workers: 4,
            connect_client_queue_size: 10_000,
        }
    }
}

/// Cluster topology as seen by this node.
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    /// Datacenter this meta server runs in.
    pub local_datacenter: String,

    /// Meta server addresses per datacenter, local one included.
    pub meta_servers: BTreeMap<String, Vec<SocketAddr>>,
}

impl NodeConfig {
    /// Create a node config for the given local datacenter.
    pub fn new(local_datacenter: impl Into<String>) -> Self {
        Self {
            local_datacenter: local_datacenter.into(),
            meta_servers: BTreeMap::new(),
        }
    }

    /// Add the meta servers of a datacenter.
    pub fn with_datacenter(
        mut self,
        datacenter: impl Into<String>,
        servers: Vec<SocketAddr>,
    ) -> Self {
        self.meta_servers.insert(datacenter.into(), servers);
        self
    }

    /// Meta servers of a datacenter.
    pub fn datacenter_meta_servers(&self, datacenter: &str) -> Vec<SocketAddr> {
        self.meta_servers
            .get(datacenter)
            .cloned()
            .unwrap_or_default()
    }

    /// All configured datacenters other than the local one.
    pub fn remote_datacenters(&self) -> Vec<String> {
        self.meta_servers
            .keys()
            .filter(|dc| **dc != self.local_datacenter)
            .cloned()
            .collect()
    }
}
