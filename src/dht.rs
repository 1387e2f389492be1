//! Dht node.

use std::{
    collections::HashMap,
    net::{Ipv4Addr, SocketAddrV4},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
    thread,
    time::Duration,
};

use bytes::Bytes;
use flume::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, trace};

use crate::{
    actor::{Actor, ActorMessage, Config, Info, OutboundRequest, Outbox},
    common::{
        find_closest_one, FindArguments, Id, Message, Node, Payload, PingArguments,
    },
    core::{
        iterative_query::{IterativeQuery, Step},
        server::Server,
    },
    Error, Result,
};

#[derive(Debug, Default, Clone)]
/// A builder for [Dht] nodes.
pub struct DhtBuilder(Config);

impl DhtBuilder {
    /// Set this node's [Id], instead of a random one.
    pub fn id(&mut self, id: Id) -> &mut Self {
        self.0.id = Some(id);

        self
    }

    /// Set the Ipv4 address advertised to other nodes.
    pub fn ip(&mut self, ip: Ipv4Addr) -> &mut Self {
        self.0.ip = ip;

        self
    }

    /// Set the listening port advertised to other nodes.
    pub fn port(&mut self, port: u32) -> &mut Self {
        self.0.port = port;

        self
    }

    /// Set seed nodes to ping on startup.
    pub fn bootstrap(&mut self, bootstrap: &[SocketAddrV4]) -> &mut Self {
        self.0.bootstrap = bootstrap.to_vec();

        self
    }

    /// Set the upper bound to wait for synchronous outbound requests.
    pub fn request_timeout(&mut self, request_timeout: Duration) -> &mut Self {
        self.0.request_timeout = request_timeout;

        self
    }

    /// Create a Dht node.
    pub fn build(&self) -> Result<Dht> {
        Dht::new(self.0.clone())
    }
}

#[derive(Debug, Clone)]
/// Handle to a node's routing table actor.
///
/// Cheap to clone, every clone talks to the same actor thread. The actor stops
/// after [Dht::shutdown] or once every clone is dropped.
pub struct Dht {
    sender: Sender<ActorMessage>,
    local: Node,
    outbox: Outbox,
    outbound: Receiver<OutboundRequest>,
}

impl Dht {
    /// Create a new Dht node with the given [Config].
    pub fn new(config: Config) -> Result<Self> {
        let (sender, receiver) = flume::unbounded();
        let (outbound_sender, outbound) = flume::unbounded();

        let local = config.local_node();
        let outbox = Outbox::new(outbound_sender, config.request_timeout);

        let actor = Actor::new(
            local.clone(),
            config.bootstrap,
            outbox.clone(),
            sender.downgrade(),
        );

        thread::Builder::new()
            .name(format!("kadnode-actor-{}", local.id))
            .spawn(move || actor.run(receiver))?;

        Ok(Dht {
            sender,
            local,
            outbox,
            outbound,
        })
    }

    /// Returns a builder to edit settings before creating a Dht node.
    pub fn builder() -> DhtBuilder {
        DhtBuilder::default()
    }

    // === Getters ===

    /// This node as advertised to others.
    pub fn local(&self) -> &Node {
        &self.local
    }

    /// This node's [Id].
    pub fn id(&self) -> &Id {
        &self.local.id
    }

    /// Outbound requests the network transport has to perform.
    ///
    /// Every returned receiver drains the same queue, so a transport may run
    /// several workers.
    pub fn outbound(&self) -> Receiver<OutboundRequest> {
        self.outbound.clone()
    }

    /// Information about this node and its routing table.
    pub fn info(&self) -> Result<Info> {
        let (sender, receiver) = flume::bounded(1);

        self.send(ActorMessage::Info(sender))?;

        receiver.recv().map_err(|_| Error::MailboxUnavailable)
    }

    // === Public Methods ===

    /// Shutdown the actor thread loop, blocking until it stops.
    pub fn shutdown(&self) {
        let (sender, receiver) = flume::bounded(1);

        if self.send(ActorMessage::Shutdown(sender)).is_ok() {
            let _ = receiver.recv();
        }
    }

    /// Add or refresh a contact, without waiting for the actor.
    pub fn add_node(&self, node: Node) {
        let _ = self.send(ActorMessage::AddNode(node));
    }

    /// Remove a contact, without waiting for the actor.
    pub fn remove_node(&self, node: Node) {
        let _ = self.send(ActorMessage::RemoveNode(node));
    }

    /// Up to [crate::ALPHA] known nodes close to the target, possibly none.
    ///
    /// With `include_self`, looking up this node's own id returns only this node.
    pub fn find_local(&self, target: Id, include_self: bool) -> Result<Vec<Node>> {
        let (sender, receiver) = flume::bounded(1);

        self.send(ActorMessage::FindLocal(target, include_self, sender))?;

        receiver.recv().map_err(|_| Error::MailboxUnavailable)
    }

    /// The closest known node to the target, without asking other nodes.
    pub fn find_one(&self, target: Id) -> Result<Node> {
        find_closest_one(&target, &self.find_local(target, false)?).ok_or(Error::NotFound)
    }

    /// Iterative lookup of the closest node to the target across the network.
    ///
    /// Returns the target node itself if it is reachable, otherwise the
    /// closest node found once rounds stop producing closer ones, compare
    /// the returned id to know which one it is.
    ///
    /// Concurrent lookups for the same target are independent.
    pub fn find(&self, target: Id) -> Result<Node> {
        let mut query = IterativeQuery::new(target);
        let mut candidates = self.find_local(target, false)?;

        loop {
            match query.next(candidates)? {
                Step::Done(node) => return Ok(node),
                Step::Visit(nodes) => {
                    trace!(?target, round = query.rounds(), count = nodes.len(), "Lookup round");

                    self.visit(&target, nodes)
                }
            }

            candidates = self.find_local(target, false)?;
        }
    }

    /// Store a value in this node's local store.
    pub fn store(&self, key: impl Into<String>, value: impl Into<Bytes>) {
        let _ = self.send(ActorMessage::Store(key.into(), value.into()));
    }

    /// Get a value from this node's local store.
    pub fn get(&self, key: &str) -> Result<Bytes> {
        let (sender, receiver) = flume::bounded(1);

        self.send(ActorMessage::Get(key.to_string(), sender))?;

        receiver
            .recv()
            .map_err(|_| Error::MailboxUnavailable)?
            .ok_or(Error::NotFound)
    }

    // === Private Methods ===

    pub(crate) fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub(crate) fn send(&self, message: ActorMessage) -> Result<()> {
        self.sender
            .send(message)
            .map_err(|_| Error::MailboxUnavailable)
    }

    /// Send a find request to every node at once, then wait for all of them.
    fn visit(&self, target: &Id, nodes: Vec<Node>) {
        let pending: Vec<_> = nodes
            .into_iter()
            .map(|node| (node.id, self.outbox.find(*target, node)))
            .collect();

        for (id, reply) in pending {
            match reply.wait() {
                Ok(learned) => {
                    trace!(from = ?id, count = learned.len(), "Find response");

                    for node in learned {
                        self.add_node(node);
                    }
                }
                Err(error) => debug!(to = ?id, ?error, "Find request failed"),
            }
        }
    }
}

type Registry = Arc<RwLock<HashMap<(Ipv4Addr, u32), Server>>>;

#[derive(Debug)]
/// Create a testnet of Dht nodes connected in-process.
///
/// Outbound requests are encoded to wire bytes, handled by the remote node's
/// [Server], and the response is decoded and handled by the local one.
/// Requests to unknown or killed nodes fail.
pub struct Testnet {
    /// The nodes of this testnet, `nodes[i]` listens on `127.0.0.1:40000 + i`.
    pub nodes: Vec<Dht>,
    registry: Registry,
    stopped: Arc<AtomicBool>,
}

/// First port used by [Testnet] nodes.
pub const TESTNET_BASE_PORT: u32 = 40000;

impl Testnet {
    /// Create a testnet of `count` nodes with random ids, not connected to each other.
    pub fn new(count: usize) -> Result<Testnet> {
        let ids: Vec<Id> = (0..count).map(|_| Id::random()).collect();

        Testnet::with_ids(&ids)
    }

    /// Create a testnet with one node per id, not connected to each other.
    pub fn with_ids(ids: &[Id]) -> Result<Testnet> {
        Testnet::spawn(ids, None)
    }

    /// Create a testnet of `count` nodes with random ids, where every node
    /// but the first bootstraps from the first one.
    pub fn bootstrapped(count: usize) -> Result<Testnet> {
        let ids: Vec<Id> = (0..count).map(|_| Id::random()).collect();
        let seed = SocketAddrV4::new(Ipv4Addr::LOCALHOST, TESTNET_BASE_PORT as u16);

        Testnet::spawn(&ids, Some(seed))
    }

    fn spawn(ids: &[Id], seed: Option<SocketAddrV4>) -> Result<Testnet> {
        let mut nodes = Vec::with_capacity(ids.len());

        for (i, id) in ids.iter().enumerate() {
            let mut builder = Dht::builder();
            builder
                .id(*id)
                .port(TESTNET_BASE_PORT + i as u32)
                .request_timeout(Duration::from_secs(2));

            if let Some(seed) = seed.filter(|_| i > 0) {
                builder.bootstrap(&[seed]);
            }

            nodes.push(builder.build()?);
        }

        let registry: Registry = Arc::new(RwLock::new(
            nodes
                .iter()
                .map(|dht| ((dht.local().ip, dht.local().port), Server::new(dht.clone())))
                .collect(),
        ));

        let stopped = Arc::new(AtomicBool::new(false));

        for dht in &nodes {
            let local = Server::new(dht.clone());
            let outbound = dht.outbound();
            let registry = registry.clone();
            let stopped = stopped.clone();

            thread::Builder::new()
                .name(format!("kadnode-testnet-{}", dht.local().port))
                .spawn(move || route(local, outbound, registry, stopped))?;
        }

        Ok(Testnet {
            nodes,
            registry,
            stopped,
        })
    }

    /// Make node `from` aware of node `to`.
    pub fn connect(&self, from: usize, to: usize) {
        if let (Some(from), Some(to)) = (self.nodes.get(from), self.nodes.get(to)) {
            from.add_node(to.local().clone());
        }
    }

    /// Take a node off the network, requests to it fail from now on.
    pub fn kill(&self, index: usize) {
        if let Some(dht) = self.nodes.get(index) {
            if let Ok(mut registry) = self.registry.write() {
                registry.remove(&(dht.local().ip, dht.local().port));
            }

            dht.shutdown();
        }
    }

    /// Bootstrap address of node `index`.
    pub fn address(&self, index: usize) -> Option<SocketAddrV4> {
        self.nodes
            .get(index)
            .map(|dht| SocketAddrV4::new(dht.local().ip, dht.local().port as u16))
    }
}

impl Drop for Testnet {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::Relaxed);

        for dht in &self.nodes {
            dht.shutdown();
        }
    }
}

/// Serve one node's outbound requests until the testnet is dropped.
fn route(
    local: Server,
    outbound: Receiver<OutboundRequest>,
    registry: Registry,
    stopped: Arc<AtomicBool>,
) {
    let node = local.local().clone();

    while !stopped.load(Ordering::Relaxed) {
        let request = match outbound.recv_timeout(Duration::from_millis(50)) {
            Ok(request) => request,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let remote = request.node().clone();

        let message = match &request {
            OutboundRequest::PingSync(..) | OutboundRequest::PingAsync(_) => {
                Payload::Ping(PingArguments { id: node.id })
            }
            OutboundRequest::FindSync(target, ..) | OutboundRequest::FindAsync(target, _) => {
                Payload::Find(FindArguments {
                    requester_id: node.id,
                    target: *target,
                })
            }
        };

        // Dropping the request without replying fails it.
        let Some(response) = exchange(&registry, &remote, Message::new(&node, message)) else {
            continue;
        };

        let _ = local.handle(response.clone());

        match (request, response.payload) {
            (OutboundRequest::PingSync(_, reply), Payload::Pong(pong)) => {
                let _ = reply.send(pong.id);
            }
            (OutboundRequest::FindSync(_, _, reply), Payload::FindAck(ack)) => {
                let _ = reply.send(ack.nodes);
            }
            _ => {}
        }
    }
}

/// Deliver a message as bytes to the node at `to`'s address, and decode its response.
fn exchange(registry: &Registry, to: &Node, message: Message) -> Option<Message> {
    let server = registry.read().ok()?.get(&(to.ip, to.port))?.clone();

    let request = message.to_bytes().ok()?;
    let response = server.handle_bytes(&request).ok()??;

    Message::from_bytes(&response).ok()
}
