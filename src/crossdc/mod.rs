//! Cross-datacenter meta synchronization.
//!
//! The local meta leader runs one [`CrossDcMetaServer`] per remote
//! datacenter. Each proxy periodically pulls the remote slot table through a
//! [`RemoteMetaClient`]. [`CrossDcMetaServerManager`] owns the proxies and
//! starts or stops them as local leadership changes.
//!
//! ```text
//!   LeadershipHub ──is_leader()──▶ CrossDcMetaServerManager
//!                                   ├── "dc2" ─▶ CrossDcMetaServer ──fetch──▶ dc2 meta
//!                                   └── "dc3" ─▶ CrossDcMetaServer ──fetch──▶ dc3 meta
//! ```

mod client;
mod manager;
mod server;

pub use client::{ExchangerMetaClient, RemoteMetaClient};
pub use manager::CrossDcMetaServerManager;
pub use server::CrossDcMetaServer;
