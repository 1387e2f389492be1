use std::{
    net::{Ipv4Addr, SocketAddrV4},
    time::Duration,
};

use crate::common::{Id, Node};

/// Default listening port.
pub const DEFAULT_PORT: u32 = 6881;
/// Default upper bound to wait for a synchronous outbound request, matches the
/// transport's idle timeout for a peer connection.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
/// Dht Configurations
pub struct Config {
    /// This node's identity.
    ///
    /// Defaults to None, where a random [Id] is generated.
    pub id: Option<Id>,
    /// Ipv4 address advertised to other nodes in every message.
    ///
    /// Defaults to [Ipv4Addr::LOCALHOST]
    pub ip: Ipv4Addr,
    /// Listening port advertised to other nodes in every message.
    ///
    /// Defaults to [DEFAULT_PORT]
    pub port: u32,
    /// Seed nodes to ping on startup.
    ///
    /// Their ids are unknown until they respond, so they only make it to the
    /// routing table once the transport feeds their pong back.
    ///
    /// Defaults to empty.
    pub bootstrap: Vec<SocketAddrV4>,
    /// How long to wait for a reply to a synchronous ping or find before
    /// considering it failed.
    ///
    /// The transport is expected to close the reply channel on its own idle
    /// timeout, this is only the upper bound if it doesn't.
    ///
    /// Defaults to [DEFAULT_REQUEST_TIMEOUT]
    pub request_timeout: Duration,
}

impl Config {
    /// The local node described by this config, generating a random id if needed.
    pub(crate) fn local_node(&self) -> Node {
        Node::new(self.id.unwrap_or_else(Id::random), self.ip, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            id: None,
            ip: Ipv4Addr::LOCALHOST,
            port: DEFAULT_PORT,
            bootstrap: Vec::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}
