use crate::config::SlotConfig;
use crate::monitor::{HeartbeatRequest, SlotStatus};
use crate::slot::SlotTable;
use crate::types::{ConnectId, NodeId, Publisher};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Install a fmt subscriber once; later calls are ignored.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("slotmeta=debug")
        .with_test_writer()
        .try_init();
}

/// Poll `condition` until it holds or `timeout` elapses.
pub(crate) async fn wait_for<F>(
    condition: F,
    timeout: Duration,
    poll: Duration,
) -> Result<(), String>
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return Ok(());
        }
        tokio::time::sleep(poll).await;
    }
    if condition() {
        return Ok(());
    }
    Err(format!("condition not met within {timeout:?}"))
}

pub(crate) fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

pub(crate) fn node(s: &str) -> NodeId {
    NodeId::from(s)
}

pub(crate) fn nodes(ids: &[&str]) -> Vec<NodeId> {
    ids.iter().map(|id| node(id)).collect()
}

pub(crate) fn connect_id(client_port: u16) -> ConnectId {
    ConnectId::of(
        addr(&format!("192.168.1.10:{client_port}")),
        addr("10.0.0.1:9600"),
    )
}

/// A publisher on a fresh connection.
pub(crate) fn publisher(data_info_id: &str, register_id: &str, client_port: u16) -> Publisher {
    Publisher::new(data_info_id, register_id, connect_id(client_port)).with_data(format!(
        "{data_info_id}/{register_id}"
    ))
}

/// A heartbeat from `node` reporting every slot it leads in `table` as healthy.
pub(crate) fn leader_heartbeat(
    table: &SlotTable,
    node: &NodeId,
    config: &SlotConfig,
) -> HeartbeatRequest {
    let statuses: Vec<_> = table
        .slots()
        .filter(|slot| slot.leader == *node)
        .map(|slot| SlotStatus::healthy(slot.id, slot.leader_epoch))
        .collect();
    HeartbeatRequest::new(node.clone(), table.epoch(), "dc1", config.basic_info())
        .with_statuses(statuses)
}

/// Heartbeats from every leader of `table`.
pub(crate) fn all_leader_heartbeats(
    table: &SlotTable,
    config: &SlotConfig,
) -> Vec<HeartbeatRequest> {
    table
        .leader_counts()
        .into_keys()
        .map(|node| leader_heartbeat(table, &node, config))
        .collect()
}
