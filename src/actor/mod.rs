//! Actor owning the routing table and the key-value store.
//!
//! All mutation happens on the actor thread, in mailbox order, so neither the
//! buckets nor the store need locks. The actor never waits on the network
//! itself: liveness probes are awaited on short-lived helper threads that
//! enqueue their result back as a normal message.

pub(crate) mod config;
mod info;
pub(crate) mod outbox;
mod storage;

use std::net::SocketAddrV4;
use std::thread;

use bytes::Bytes;
use flume::{Receiver, Sender, WeakSender};
use tracing::{debug, trace};

use crate::common::{Admission, Id, Node, RoutingTable};
use crate::Error;

pub use config::{Config, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT};
pub use info::Info;
pub use outbox::{OutboundRequest, Outbox, PendingReply};
pub use storage::Storage;

#[derive(Debug)]
/// Commands accepted by the [Actor] mailbox.
pub(crate) enum ActorMessage {
    AddNode(Node),
    RemoveNode(Node),
    FindLocal(Id, bool, Sender<Vec<Node>>),
    Store(String, Bytes),
    /// Replies `None` if the key is missing.
    Get(String, Sender<Option<Bytes>>),
    /// Result of pinging the least recently seen node of a full bucket.
    ProbeResult {
        lru: Node,
        candidate: Node,
        alive: bool,
    },
    Info(Sender<Info>),
    Shutdown(Sender<()>),
}

/// Single owner of the routing table and the store, driven by its mailbox.
pub(crate) struct Actor {
    routing_table: RoutingTable,
    storage: Storage,
    outbox: Outbox,
    /// Used by probe helpers to enqueue their results, without keeping the
    /// actor alive after every [crate::Dht] handle is dropped.
    mailbox: WeakSender<ActorMessage>,
    bootstrap: Vec<SocketAddrV4>,
}

impl Actor {
    pub fn new(
        local: Node,
        bootstrap: Vec<SocketAddrV4>,
        outbox: Outbox,
        mailbox: WeakSender<ActorMessage>,
    ) -> Self {
        Self {
            routing_table: RoutingTable::new(local),
            storage: Storage::new(),
            outbox,
            mailbox,
            bootstrap,
        }
    }

    /// Process messages until shutdown, or until every sender is dropped.
    pub fn run(mut self, receiver: Receiver<ActorMessage>) {
        debug!(id = ?self.routing_table.id(), "Actor started");

        self.ping_bootstrap();

        for message in receiver.iter() {
            trace!(?message, "Actor message");

            match message {
                ActorMessage::AddNode(node) => self.add_node(node),
                ActorMessage::RemoveNode(node) => self.routing_table.remove(&node.id),
                ActorMessage::FindLocal(target, include_self, sender) => {
                    let _ = sender.send(self.routing_table.find_local(&target, include_self));
                }
                ActorMessage::Store(key, value) => self.storage.put(key, value),
                ActorMessage::Get(key, sender) => {
                    let _ = sender.send(self.storage.get(&key));
                }
                ActorMessage::ProbeResult {
                    lru,
                    candidate,
                    alive,
                } => {
                    let admitted = candidate.clone();

                    if self.routing_table.resolve_probe(&lru, candidate, alive)
                        == Admission::Inserted
                    {
                        self.refresh(admitted);
                    }
                }
                ActorMessage::Info(sender) => {
                    let _ = sender.send(Info::new(&self.routing_table, self.storage.len()));
                }
                ActorMessage::Shutdown(sender) => {
                    let _ = sender.send(());
                    break;
                }
            }
        }

        debug!(id = ?self.routing_table.id(), "Actor stopped");
    }

    // === Private Methods ===

    fn add_node(&mut self, node: Node) {
        match self.routing_table.add(node.clone()) {
            Admission::Inserted => self.refresh(node),
            Admission::Probe { lru, candidate } => self.probe(lru, candidate),
            Admission::Updated | Admission::Dropped => {}
        }
    }

    /// Ask a newly inserted node for the nodes closest to us.
    fn refresh(&self, node: Node) {
        self.outbox.find_async(*self.routing_table.id(), node);
    }

    /// Ping the least recently seen node of a full bucket off the actor thread.
    fn probe(&self, lru: Node, candidate: Node) {
        let Some(mailbox) = self.mailbox.upgrade() else {
            return;
        };

        debug!(?lru, ?candidate, "Bucket full, probing least recently seen node");

        let pending = self.outbox.ping(lru.clone());

        thread::spawn(move || {
            // A different id on the same address is as good as no answer.
            let alive = matches!(pending.wait(), Ok(id) if id == lru.id);

            if !alive {
                debug!(?lru, error = %Error::ProbeFailed, "Evicting least recently seen node");
            }

            let _ = mailbox.send(ActorMessage::ProbeResult {
                lru,
                candidate,
                alive,
            });
        });
    }

    fn ping_bootstrap(&self) {
        for address in &self.bootstrap {
            // Placeholder id until the seed answers with its own.
            let seed = Node::new(Id::random(), *address.ip(), address.port() as u32);

            self.outbox.ping_async(seed);
        }
    }
}
