//! AsyncDht node.

use bytes::Bytes;
use tracing::{debug, trace};

use crate::{
    actor::{ActorMessage, Info, OutboundRequest},
    common::{find_closest_one, Id, Node},
    core::iterative_query::{IterativeQuery, Step},
    dht::Dht,
    Error, Result,
};

impl Dht {
    /// Return an async version of the Dht node.
    pub fn as_async(self) -> AsyncDht {
        AsyncDht(self)
    }
}

#[derive(Debug, Clone)]
/// Async version of the Dht node.
pub struct AsyncDht(Dht);

impl AsyncDht {
    // === Getters ===

    /// This node as advertised to others.
    pub fn local(&self) -> &Node {
        self.0.local()
    }

    /// Outbound requests the network transport has to perform.
    pub fn outbound(&self) -> flume::Receiver<OutboundRequest> {
        self.0.outbound()
    }

    /// Information about this node and its routing table.
    pub async fn info(&self) -> Result<Info> {
        let (sender, receiver) = flume::bounded::<Info>(1);

        self.0.send(ActorMessage::Info(sender))?;

        receiver
            .recv_async()
            .await
            .map_err(|_| Error::MailboxUnavailable)
    }

    // === Public Methods ===

    /// Shutdown the actor thread loop.
    pub async fn shutdown(&self) {
        let (sender, receiver) = flume::bounded::<()>(1);

        if self.0.send(ActorMessage::Shutdown(sender)).is_ok() {
            let _ = receiver.recv_async().await;
        }
    }

    /// Add or refresh a contact.
    pub fn add_node(&self, node: Node) {
        self.0.add_node(node)
    }

    /// Remove a contact.
    pub fn remove_node(&self, node: Node) {
        self.0.remove_node(node)
    }

    /// Async version of [Dht::find_local].
    pub async fn find_local(&self, target: Id, include_self: bool) -> Result<Vec<Node>> {
        let (sender, receiver) = flume::bounded::<Vec<Node>>(1);

        self.0
            .send(ActorMessage::FindLocal(target, include_self, sender))?;

        receiver
            .recv_async()
            .await
            .map_err(|_| Error::MailboxUnavailable)
    }

    /// Async version of [Dht::find_one].
    pub async fn find_one(&self, target: Id) -> Result<Node> {
        find_closest_one(&target, &self.find_local(target, false).await?).ok_or(Error::NotFound)
    }

    /// Async version of [Dht::find].
    pub async fn find(&self, target: Id) -> Result<Node> {
        let mut query = IterativeQuery::new(target);
        let mut candidates = self.find_local(target, false).await?;

        loop {
            match query.next(candidates)? {
                Step::Done(node) => return Ok(node),
                Step::Visit(nodes) => {
                    let pending: Vec<_> = nodes
                        .into_iter()
                        .map(|node| (node.id, self.0.outbox().find(target, node)))
                        .collect();

                    for (id, reply) in pending {
                        match reply.wait_async().await {
                            Ok(learned) => {
                                trace!(from = ?id, count = learned.len(), "Find response");

                                for node in learned {
                                    self.0.add_node(node);
                                }
                            }
                            Err(error) => debug!(to = ?id, ?error, "Find request failed"),
                        }
                    }
                }
            }

            candidates = self.find_local(target, false).await?;
        }
    }

    /// Store a value in this node's local store.
    pub fn store(&self, key: impl Into<String>, value: impl Into<Bytes>) {
        self.0.store(key, value)
    }

    /// Async version of [Dht::get].
    pub async fn get(&self, key: &str) -> Result<Bytes> {
        let (sender, receiver) = flume::bounded::<Option<Bytes>>(1);

        self.0.send(ActorMessage::Get(key.to_string(), sender))?;

        receiver
            .recv_async()
            .await
            .map_err(|_| Error::MailboxUnavailable)?
            .ok_or(Error::NotFound)
    }
}
