//! Test helpers and end-to-end scenarios.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  scenarios                                                   │
//! │   slot_table_tests      refresh ordering, stability          │
//! │   cross_dc_tests        proxy index, leadership transitions   │
//! │   migration_tests       pagination over a rebalance          │
//! │   exchanger_tests       request dispatch and failures        │
//! │   meta_server_tests     full wiring, A,B,C → A,B rebalance    │
//! └──────────────────────────────────────────────────────────────┘
//!             │ use
//!             ▼
//!   utils (builders, wait_for)   mocks (Exchange, Server, Channel,
//!                                       RemoteMetaClient)
//! ```

mod mocks;
mod utils;


pub(crate) use mocks::{
    MockChannel, MockExchange, MockRemoteMetaClient, MockServer, RecordingCallback,
};
pub(crate) use utils::{
    addr, all_leader_heartbeats, init_tracing, leader_heartbeat, node, nodes, publisher, wait_for,
};
