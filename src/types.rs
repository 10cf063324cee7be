//! Core types used throughout the meta coordination core.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// Slot identifier. Slots are numbered `0..slot_num`.
pub type SlotId = u32;

/// Identifier of a data node, normally its IP address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    /// Create a node id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identity of a client connection: the client's address paired with the
/// session server's local address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectId {
    /// Remote (client) address.
    pub client_addr: SocketAddr,
    /// Local (session server) address.
    pub session_addr: SocketAddr,
}

impl ConnectId {
    /// Create a connect id from a client/session address pair.
    pub fn of(client_addr: SocketAddr, session_addr: SocketAddr) -> Self {
        Self {
            client_addr,
            session_addr,
        }
    }
}

impl fmt::Display for ConnectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.client_addr, self.session_addr)
    }
}

/// A registration published by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publisher {
    /// The data id this publisher registers under. Determines the slot.
    pub data_info_id: String,
    /// Unique registration id.
    pub register_id: String,
    /// Connection that owns the registration.
    pub connect_id: ConnectId,
    /// Registration version, bumped on every re-publish.
    pub version: u64,
    /// Registration time in milliseconds since UNIX epoch.
    pub register_timestamp: u64,
    /// Published data.
    pub data: Vec<Bytes>,
}

impl Publisher {
    /// Create a publisher with no data.
    pub fn new(
        data_info_id: impl Into<String>,
        register_id: impl Into<String>,
        connect_id: ConnectId,
    ) -> Self {
        Self {
            data_info_id: data_info_id.into(),
            register_id: register_id.into(),
            connect_id,
            version: 1,
            register_timestamp: 0,
            data: Vec::new(),
        }
    }

    /// Attach data to the publisher.
    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data.push(data.into());
        self
    }

    /// Set the registration version.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_id_display() {
        let id = ConnectId::of(
            "10.0.0.1:34567".parse().unwrap(),
            "10.0.0.9:9600".parse().unwrap(),
        );
        assert_eq!(id.to_string(), "10.0.0.1:34567_10.0.0.9:9600");
    }

    #[test]
    fn test_publisher_builder() {
        let id = ConnectId::of(
            "10.0.0.1:34567".parse().unwrap(),
            "10.0.0.9:9600".parse().unwrap(),
        );
        let publisher = Publisher::new("svc#@#DEFAULT", "reg-1", id)
            .with_version(3)
            .with_data(&b"10.0.0.1:8080"[..]);

        assert_eq!(publisher.version, 3);
        assert_eq!(publisher.data.len(), 1);
        assert_eq!(publisher.connect_id, id);
    }
}
