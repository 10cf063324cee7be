//! In-memory stand-ins for the transport and remote datacenters.

use crate::crossdc::RemoteMetaClient;
use crate::error::{Error, RequestError, Result, TransportError};
use crate::remoting::{CallbackHandler, Channel, Exchange, MessageHandler, MetaMessage, Server};
use crate::slot::SlotTable;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
pub(crate) struct MockChannel {
    remote: SocketAddr,
    local: SocketAddr,
    connected: AtomicBool,
}

impl MockChannel {
    pub(crate) fn new(remote: &str, local: &str) -> Self {
        Self {
            remote: super::addr(remote),
            local: super::addr(local),
            connected: AtomicBool::new(true),
        }
    }

    pub(crate) fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl Channel for MockChannel {
    fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    fn local_addr(&self) -> SocketAddr {
        self.local
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Server answering through a [`MessageHandler`], with injectable failures.
#[derive(Default)]
pub(crate) struct MockServer {
    channels: RwLock<Vec<Arc<MockChannel>>>,
    handler: RwLock<Option<Arc<dyn MessageHandler>>>,
    failure: RwLock<Option<TransportError>>,
    delay: RwLock<Option<Duration>>,
    sent: Mutex<Vec<(SocketAddr, MetaMessage)>>,
}

impl MockServer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_channel(&self, channel: Arc<MockChannel>) {
        self.channels.write().push(channel);
    }

    pub(crate) fn set_handler(&self, handler: Arc<dyn MessageHandler>) {
        *self.handler.write() = Some(handler);
    }

    pub(crate) fn fail_with(&self, error: TransportError) {
        *self.failure.write() = Some(error);
    }

    pub(crate) fn delay_replies(&self, delay: Duration) {
        *self.delay.write() = Some(delay);
    }

    pub(crate) fn sent(&self) -> Vec<(SocketAddr, MetaMessage)> {
        self.sent.lock().clone()
    }

    fn answer(&self, body: MetaMessage) -> std::result::Result<MetaMessage, TransportError> {
        if let Some(error) = self.failure.read().clone() {
            return Err(error);
        }
        let handler = self.handler.read().clone();
        handler
            .and_then(|h| h.handle(body))
            .ok_or_else(|| TransportError::Remote("no reply".to_string()))
    }
}

#[async_trait]
impl Server for MockServer {
    fn channels(&self) -> Vec<Arc<dyn Channel>> {
        self.channels
            .read()
            .iter()
            .map(|c| Arc::clone(c) as Arc<dyn Channel>)
            .collect()
    }

    fn channel(&self, url: &SocketAddr) -> Option<Arc<dyn Channel>> {
        self.channels
            .read()
            .iter()
            .find(|c| c.remote_addr() == *url)
            .map(|c| Arc::clone(c) as Arc<dyn Channel>)
    }

    async fn send_sync(
        &self,
        channel: Arc<dyn Channel>,
        body: MetaMessage,
    ) -> std::result::Result<MetaMessage, TransportError> {
        self.sent.lock().push((channel.remote_addr(), body.clone()));
        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.answer(body)
    }

    fn send_callback(
        &self,
        channel: Arc<dyn Channel>,
        body: MetaMessage,
        callback: Arc<dyn CallbackHandler>,
        _timeout: Duration,
    ) -> std::result::Result<(), TransportError> {
        if let Some(error) = self.failure.read().clone() {
            return Err(error);
        }
        self.sent.lock().push((channel.remote_addr(), body.clone()));
        match self.answer(body) {
            Ok(reply) => callback.on_response(reply),
            Err(e) => callback.on_error(e),
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MockExchange {
    servers: RwLock<HashMap<u16, Arc<MockServer>>>,
}

impl MockExchange {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_server(port: u16, server: Arc<MockServer>) -> Self {
        let exchange = Self::new();
        exchange.servers.write().insert(port, server);
        exchange
    }
}

impl Exchange for MockExchange {
    fn server(&self, port: u16) -> Option<Arc<dyn Server>> {
        self.servers
            .read()
            .get(&port)
            .map(|s| Arc::clone(s) as Arc<dyn Server>)
    }
}

/// Remote datacenter serving a fixed slot table.
#[derive(Default)]
pub(crate) struct MockRemoteMetaClient {
    table: RwLock<Option<SlotTable>>,
    failure: RwLock<Option<String>>,
    delay: RwLock<Option<Duration>>,
    calls: Mutex<Vec<(SocketAddr, u64)>>,
}

impl MockRemoteMetaClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_table(&self, table: SlotTable) {
        *self.table.write() = Some(table);
    }

    pub(crate) fn fail_with(&self, reason: &str) {
        *self.failure.write() = Some(reason.to_string());
    }

    /// Make every fetch take `delay` before answering.
    pub(crate) fn delay_fetches(&self, delay: Duration) {
        *self.delay.write() = Some(delay);
    }

    pub(crate) fn calls(&self) -> Vec<(SocketAddr, u64)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl RemoteMetaClient for MockRemoteMetaClient {
    async fn fetch_slot_table(&self, addr: SocketAddr, epoch: u64) -> Result<Option<SlotTable>> {
        self.calls.lock().push((addr, epoch));
        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = self.failure.read().clone() {
            return Err(Error::Request(RequestError::Send {
                port: addr.port(),
                url: Some(addr),
                source: TransportError::SendFailed(reason),
            }));
        }
        Ok(self
            .table
            .read()
            .clone()
            .filter(|table| table.epoch() > epoch))
    }
}

/// Callback that stores what it receives.
#[derive(Default)]
pub(crate) struct RecordingCallback {
    pub(crate) responses: Mutex<Vec<MetaMessage>>,
    pub(crate) errors: Mutex<Vec<TransportError>>,
}

impl CallbackHandler for RecordingCallback {
    fn on_response(&self, response: MetaMessage) {
        self.responses.lock().push(response);
    }

    fn on_error(&self, error: TransportError) {
        self.errors.lock().push(error);
    }
}
