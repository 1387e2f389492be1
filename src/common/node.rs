//! Struct and implementation of the Node entry in the Kademlia routing table
use std::net::Ipv4Addr;

use crate::common::{Distance, Id};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Liveness state of a contact in a k-bucket.
pub enum NodeState {
    /// No liveness probe pending.
    #[default]
    Idle,
    /// A ping was sent to decide whether this contact should be evicted.
    AwaitingProbe,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Node entry in Kademlia routing table
pub struct Node {
    pub id: Id,
    pub ip: Ipv4Addr,
    pub port: u32,
    pub state: NodeState,
}

impl Node {
    /// Creates a new Node from an id, ip and port.
    pub fn new(id: Id, ip: Ipv4Addr, port: u32) -> Node {
        Node {
            id,
            ip,
            port,
            state: NodeState::Idle,
        }
    }

    /// Creates a node with a random Id on a local address, used in tests.
    pub fn random() -> Node {
        Node::new(Id::random(), Ipv4Addr::LOCALHOST, 0)
    }

    // === Getters ===

    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Returns `true` if both entries describe the same contact, regardless of address.
    pub fn same_contact(&self, other: &Node) -> bool {
        self.id == other.id
    }

    pub fn awaiting_probe(&self) -> bool {
        self.state == NodeState::AwaitingProbe
    }

    /// Xor distance from this node to the target.
    pub fn distance(&self, target: &Id) -> Distance {
        self.id.distance(target)
    }
}
