//! Server-side request dispatch over an external transport.
//!
//! The transport itself (`Exchange`, `Server`, `Channel`) lives outside this
//! crate. [`ServerSideExchanger`] picks the target channel, applies the
//! timeout and folds every failure into one [`RequestError`].

use super::message::MetaMessage;
use crate::error::{RequestError, Result, TransportError};
use crate::metrics::MetaMetrics;
use async_trait::async_trait;
use rand::seq::IndexedRandom;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A connection accepted by a server.
pub trait Channel: Send + Sync {
    /// Peer address.
    fn remote_addr(&self) -> SocketAddr;

    /// Local address the peer connected to.
    fn local_addr(&self) -> SocketAddr;

    /// Check if the connection is still open.
    fn is_connected(&self) -> bool;
}

/// Receives the outcome of a callback-style request.
pub trait CallbackHandler: Send + Sync {
    fn on_response(&self, response: MetaMessage);

    fn on_error(&self, error: TransportError);
}

/// A listening server and its connected channels.
#[async_trait]
pub trait Server: Send + Sync {
    /// Every channel currently known to the server.
    fn channels(&self) -> Vec<Arc<dyn Channel>>;

    /// Channel to a specific peer.
    fn channel(&self, url: &SocketAddr) -> Option<Arc<dyn Channel>>;

    /// Send and wait for the answer.
    async fn send_sync(
        &self,
        channel: Arc<dyn Channel>,
        body: MetaMessage,
    ) -> std::result::Result<MetaMessage, TransportError>;

    /// Send and return at once; the answer goes to `callback`.
    fn send_callback(
        &self,
        channel: Arc<dyn Channel>,
        body: MetaMessage,
        callback: Arc<dyn CallbackHandler>,
        timeout: Duration,
    ) -> std::result::Result<(), TransportError>;
}

/// Registry of servers by port.
pub trait Exchange: Send + Sync {
    fn server(&self, port: u16) -> Option<Arc<dyn Server>>;
}

/// An outgoing request.
#[derive(Clone)]
pub struct Request {
    pub url: Option<SocketAddr>,
    pub body: MetaMessage,
    /// Overrides the exchanger's default timeout.
    pub timeout: Option<Duration>,
    pub callback: Option<Arc<dyn CallbackHandler>>,
}

impl Request {
    pub fn new(body: MetaMessage) -> Self {
        Self {
            url: None,
            body,
            timeout: None,
            callback: None,
        }
    }

    pub fn with_url(mut self, url: SocketAddr) -> Self {
        self.url = Some(url);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_callback(mut self, callback: Arc<dyn CallbackHandler>) -> Self {
        self.callback = Some(callback);
        self
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("url", &self.url)
            .field("body", &self.body.kind())
            .field("timeout", &self.timeout)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Outcome of a successful request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Callback request handed to the transport.
    Accepted,
    /// Answer of a synchronous request.
    Reply(MetaMessage),
}

/// Dispatches requests to peers connected to one local server port.
pub struct ServerSideExchanger {
    exchange: Arc<dyn Exchange>,
    server_port: u16,
    rpc_timeout: Duration,
    metrics: Arc<MetaMetrics>,
}

impl ServerSideExchanger {
    pub fn new(
        exchange: Arc<dyn Exchange>,
        server_port: u16,
        rpc_timeout: Duration,
        metrics: Arc<MetaMetrics>,
    ) -> Self {
        Self {
            exchange,
            server_port,
            rpc_timeout,
            metrics,
        }
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    /// Send to the request's own url, which must be set.
    pub async fn request(&self, request: Request) -> Result<Response> {
        match request.url {
            Some(url) => self.request_to(Some(url), request).await,
            None => Err(self.fail("null_url", RequestError::NullUrl)),
        }
    }

    /// Send to `url`, or to a random connected channel when `url` is `None`.
    pub async fn request_to(&self, url: Option<SocketAddr>, request: Request) -> Result<Response> {
        let port = self.server_port;
        debug!(port, ?url, body = request.body.kind(), "Exchanger request");

        let server = self
            .exchange
            .server(port)
            .ok_or_else(|| self.fail("no_server", RequestError::NoServer { port }))?;

        let channel = match url {
            Some(url) => server.channel(&url),
            None => Self::choose_channel(server.as_ref()),
        };
        let channel = match channel {
            Some(channel) if channel.is_connected() => channel,
            _ => return Err(self.fail("no_channel", RequestError::NoChannel { port, url })),
        };

        let timeout = request.timeout.unwrap_or(self.rpc_timeout);
        self.metrics.requests_sent.inc();

        if let Some(callback) = request.callback {
            return match server.send_callback(channel, request.body, callback, timeout) {
                Ok(()) => Ok(Response::Accepted),
                Err(source) => Err(self.fail("send", RequestError::Send { port, url, source })),
            };
        }

        match tokio::time::timeout(timeout, server.send_sync(channel, request.body)).await {
            Ok(Ok(reply)) => Ok(Response::Reply(reply)),
            Ok(Err(source)) => Err(self.fail("send", RequestError::Send { port, url, source })),
            Err(_) => Err(self.fail(
                "timeout",
                RequestError::Timeout {
                    port,
                    url,
                    timeout_ms: timeout.as_millis() as u64,
                },
            )),
        }
    }

    fn choose_channel(server: &dyn Server) -> Option<Arc<dyn Channel>> {
        let channels = server.channels();
        channels.choose(&mut rand::rng()).cloned()
    }

    fn fail(&self, kind: &str, error: RequestError) -> crate::error::Error {
        self.metrics.request_failures.inc(kind);
        warn!(port = self.server_port, error = %error, "Exchanger request failed");
        error.into()
    }
}

impl std::fmt::Debug for ServerSideExchanger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSideExchanger")
            .field("server_port", &self.server_port)
            .field("rpc_timeout", &self.rpc_timeout)
            .finish()
    }
}
