//! Access to meta servers of other datacenters.

use crate::error::{Error, Result};
use crate::remoting::{MetaMessage, Request, Response, ServerSideExchanger};
use crate::slot::SlotTable;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;

/// Client for a remote datacenter's meta servers.
#[async_trait]
pub trait RemoteMetaClient: Send + Sync {
    /// Slot table of the meta server at `addr`, if newer than `epoch`.
    async fn fetch_slot_table(&self, addr: SocketAddr, epoch: u64) -> Result<Option<SlotTable>>;
}

/// [`RemoteMetaClient`] speaking [`MetaMessage`] through an exchanger.
#[derive(Debug, Clone)]
pub struct ExchangerMetaClient {
    exchanger: Arc<ServerSideExchanger>,
}

impl ExchangerMetaClient {
    pub fn new(exchanger: Arc<ServerSideExchanger>) -> Self {
        Self { exchanger }
    }
}

#[async_trait]
impl RemoteMetaClient for ExchangerMetaClient {
    async fn fetch_slot_table(&self, addr: SocketAddr, epoch: u64) -> Result<Option<SlotTable>> {
        let request = Request::new(MetaMessage::FetchSlotTable { epoch }).with_url(addr);
        match self.exchanger.request(request).await? {
            Response::Reply(MetaMessage::SlotTableReply(reply)) => Ok(reply.slot_table),
            Response::Reply(other) => Err(Error::Internal(format!(
                "unexpected reply to fetch_slot_table from {addr}: {}",
                other.kind()
            ))),
            Response::Accepted => Err(Error::Internal(format!(
                "fetch_slot_table to {addr} returned no reply"
            ))),
        }
    }
}
