//! Slot table coordination for a multi-datacenter service registry meta cluster.
//!
//! This crate provides the meta-server side of a slot-partitioned registry:
//! - **Slot tables** assigning each slot one leader and a set of followers
//! - **Heartbeat monitoring** deciding when an assignment is live on the data nodes
//! - **Migration** of publishers after slots move, served in cursor-paged batches
//! - **Cross-datacenter sync** of remote slot tables while this server leads
//!
//! # Features
//!
//! - Strictly increasing table epochs; stale or conflicting tables are refused
//! - Balanced, sticky slot assignment that only moves what membership forces
//! - Per-epoch stability snapshots, reset by a single swap on refresh
//! - Lock-free proxy lookups with a single insertion lock
//! - Runtime decision-mode switch to freeze automatic rebalancing
//!
//! # Example
//!
//! ```rust,ignore
//! use slotmeta::{MetaServer, MetaServerConfig, NodeConfig};
//! use std::sync::Arc;
//!
//! let server = MetaServer::new(
//!     MetaServerConfig::new(),
//!     NodeConfig::new("dc1"),
//!     exchange,
//!     remote_client,
//!     tokio::runtime::Handle::current(),
//! );
//! server.start()?;
//!
//! // The election reports leadership; remote datacenter proxies follow it
//! server.leadership().on_leader();
//!
//! // Rebalance onto the live data nodes once the current table is stable
//! server.arranger().arrange(&data_nodes)?;
//! ```
//!
//! # Architecture
//!
//! ```text
//!            election                data nodes                operators
//!               │                        │                        │
//!               ▼                        ▼                        ▼
//!        ┌─────────────┐        ┌──────────────────┐     ┌──────────────────┐
//!        │LeadershipHub│        │MetaRequestHandler│     │DecisionModeResource│
//!        └──────┬──────┘        └───┬─────────┬────┘     └────────┬─────────┘
//!               │          heartbeat│         │migrate            │
//!               ▼                   ▼         ▼                   ▼
//! ┌───────────────────────┐ ┌──────────────┐ ┌────────────────┐ ┌─────────────┐
//! │CrossDcMetaServerManager│ │SlotTableMonitor│ │SlotMigration- │ │ SlotArranger│
//! │  dc → CrossDcMetaServer│ └──────▲───────┘ │   Service      │ └──────┬──────┘
//! └───────────────────────┘        │ update   └───────▲────────┘        │ refresh
//!                                  │                  │ snapshot        ▼
//!                               ┌──┴──────────────────┴─────────────────────┐
//!                               │                SlotManager                 │
//!                               └────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod crossdc;
pub mod decision;
pub mod error;
pub mod leader;
pub mod lifecycle;
pub mod metrics;
pub mod migration;
pub mod monitor;
pub mod remoting;
pub mod server;
pub mod slot;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for convenience
pub use config::{
    ExecutorConfig, MetaServerConfig, NodeConfig, RemotingConfig, SlotConfig, SLOT_NUM,
    SLOT_REPLICAS,
};
pub use error::{
    Error, ExecutorError, LifecycleError, RequestError, Result, SlotTableError, TransportError,
};
pub use server::MetaServer;
pub use types::{ConnectId, NodeId, Publisher, SlotId};

// Re-export slot types
pub use slot::{
    ArrangeOutcome, DataNodeSlot, Slot, SlotArranger, SlotBasicInfo, SlotFunction, SlotManager,
    SlotRole, SlotTable, SlotTableGenerator, SlotTableListener,
};

// Re-export monitoring types
pub use monitor::{
    EpochObservations, HeartbeatOutcome, HeartbeatRequest, LeaderStatus, SlotStatus,
    SlotTableMonitor,
};

// Re-export migration types
pub use migration::{
    DataSlotMigrateRequest, DataSlotMigrateResult, DeltaKind, MigrationCursor, MigrationPage,
    PublisherSource, PublisherStore, SlotChange, SlotMigrationService, SlotTableDiff,
};

// Re-export cross-datacenter types
pub use crossdc::{
    CrossDcMetaServer, CrossDcMetaServerManager, ExchangerMetaClient, RemoteMetaClient,
};

pub use decision::{AdminResult, DecisionMode, DecisionModeCell, DecisionModeResource};
pub use leader::{LeaderAware, LeadershipHub};
pub use lifecycle::{Lifecycle, LifecycleCell, LifecycleState};

// Re-export metrics types
pub use metrics::{Counter, Gauge, LabeledCounter, LabeledGauge, MetaMetrics};

// Re-export remoting types
pub use remoting::{
    BoundedExecutor, ClientConnectionHandler, ClientRegistry, ConnectIndexed, Exchange,
    MetaMessage, MetaRequestHandler, Request, Response, ServerSideExchanger,
};
