//! Error types for the meta coordination core.

use crate::lifecycle::LifecycleState;
use std::net::SocketAddr;
use thiserror::Error;

/// Result type alias for meta coordination operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the meta coordination core.
#[derive(Error, Debug)]
pub enum Error {
    /// Slot table refresh or validation errors.
    #[error("slot table error: {0}")]
    SlotTable(#[from] SlotTableError),

    /// Lifecycle misuse.
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Remote request dispatch errors.
    #[error("request error: {0}")]
    Request(#[from] RequestError),

    /// Work could not be queued on an executor.
    #[error("executor error: {0}")]
    Executor(#[from] ExecutorError),

    /// Message encoding/decoding errors.
    #[error("codec error: {0}")]
    Codec(String),

    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),

    /// A slot table was requested for an empty data node set.
    #[error("no data nodes available for slot assignment")]
    NoDataNodes,

    /// A migration cursor was issued against a table that has since been replaced.
    #[error("stale migration cursor: cursor epoch {cursor_epoch}, current epoch {current_epoch}")]
    StaleMigration {
        cursor_epoch: u64,
        current_epoch: u64,
    },

    /// No tokio runtime is available to host a background task.
    #[error("no runtime available: {0}")]
    NoRuntime(String),

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors raised when installing a slot table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotTableError {
    /// The new table is older than the installed one.
    #[error("stale slot table epoch {new}, current epoch is {current}")]
    StaleEpoch { current: u64, new: u64 },

    /// Same epoch as the installed table but different assignment.
    #[error("slot table epoch {epoch} conflicts with the installed table")]
    EpochConflict { epoch: u64 },

    /// The table is structurally invalid.
    #[error("invalid slot table at epoch {epoch}: {reason}")]
    Invalid { epoch: u64, reason: String },
}

/// Lifecycle state machine violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// The component is not in a state that allows the requested operation.
    #[error("{component}: cannot {operation} while {state}")]
    IllegalState {
        component: String,
        operation: &'static str,
        state: LifecycleState,
    },
}

/// Failures raised by the underlying transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The channel closed while sending.
    #[error("channel closed")]
    ChannelClosed,

    /// Failed to send message.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The remote side answered with an error.
    #[error("remote error: {0}")]
    Remote(String),
}

/// Errors raised when submitting work to a bounded executor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// The queue is full.
    #[error("executor {name} rejected task: queue full")]
    Rejected { name: String },

    /// The executor has been shut down.
    #[error("executor {name} is shut down")]
    Shutdown { name: String },
}

/// Remote request dispatch errors.
///
/// Every failure mode of [`ServerSideExchanger`](crate::remoting::ServerSideExchanger)
/// is surfaced as one of these; the core never retries on its own.
#[derive(Error, Debug)]
pub enum RequestError {
    /// The request carried no target url.
    #[error("null url")]
    NullUrl,

    /// No server is bound to the configured port.
    #[error("no server for port {port}")]
    NoServer { port: u16 },

    /// No connected channel to send on.
    #[error("port {port}, no connected channel for url {url:?}")]
    NoChannel {
        port: u16,
        url: Option<SocketAddr>,
    },

    /// The call did not complete in time.
    #[error("port {port}, request to {url:?} timed out after {timeout_ms}ms")]
    Timeout {
        port: u16,
        url: Option<SocketAddr>,
        timeout_ms: u64,
    },

    /// The transport failed while sending.
    #[error("port {port}, exchanger request to {url:?} failed")]
    Send {
        port: u16,
        url: Option<SocketAddr>,
        #[source]
        source: TransportError,
    },
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Codec(e.to_string())
    }
}

impl Error {
    /// Check if this error is a lifecycle misuse.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Error::Lifecycle(_))
    }
}
