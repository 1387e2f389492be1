//! Outbound requests from the core to the network transport.

use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, Sender};
use tracing::trace;

use crate::common::{Id, Node};
use crate::{Error, Result};

#[derive(Debug)]
/// Requests the transport has to turn into wire messages.
///
/// Sync variants carry a one-shot reply channel: the transport sends the
/// result on success, or drops the sender to signal failure.
pub enum OutboundRequest {
    /// Ping a node and reply with the [Id] it answers with.
    PingSync(Node, Sender<Id>),
    /// Ping a node, feeding the pong back through `AddNode`.
    PingAsync(Node),
    /// Ask a node for its closest nodes to the target, and reply with them.
    FindSync(Id, Node, Sender<Vec<Node>>),
    /// Ask a node for its closest nodes to the target, feeding them back
    /// through `AddNode`.
    FindAsync(Id, Node),
}

impl OutboundRequest {
    /// The remote node this request is addressed to.
    pub fn node(&self) -> &Node {
        match self {
            OutboundRequest::PingSync(node, _)
            | OutboundRequest::PingAsync(node)
            | OutboundRequest::FindSync(_, node, _)
            | OutboundRequest::FindAsync(_, node) => node,
        }
    }
}

#[derive(Debug, Clone)]
/// Sending side of the outbound request channel.
pub struct Outbox {
    sender: Sender<OutboundRequest>,
    request_timeout: Duration,
}

impl Outbox {
    pub(crate) fn new(sender: Sender<OutboundRequest>, request_timeout: Duration) -> Self {
        Self {
            sender,
            request_timeout,
        }
    }

    pub fn ping(&self, node: Node) -> PendingReply<Id> {
        let (sender, receiver) = flume::bounded(1);

        self.send(OutboundRequest::PingSync(node, sender));

        self.pending(receiver)
    }

    pub fn ping_async(&self, node: Node) {
        self.send(OutboundRequest::PingAsync(node));
    }

    pub fn find(&self, target: Id, node: Node) -> PendingReply<Vec<Node>> {
        let (sender, receiver) = flume::bounded(1);

        self.send(OutboundRequest::FindSync(target, node, sender));

        self.pending(receiver)
    }

    pub fn find_async(&self, target: Id, node: Node) {
        self.send(OutboundRequest::FindAsync(target, node));
    }

    // === Private Methods ===

    fn send(&self, request: OutboundRequest) {
        trace!(?request, "Outbound request");

        // If the transport is gone, the reply sender is dropped with the
        // request, and the pending reply fails right away.
        let _ = self.sender.send(request);
    }

    fn pending<T>(&self, receiver: Receiver<T>) -> PendingReply<T> {
        PendingReply {
            receiver,
            timeout: self.request_timeout,
        }
    }
}

#[derive(Debug)]
/// Reply to a synchronous outbound request.
pub struct PendingReply<T> {
    receiver: Receiver<T>,
    timeout: Duration,
}

impl<T> PendingReply<T> {
    /// Block until the transport replies.
    ///
    /// A closed channel or the request timeout are both [Error::MailboxUnavailable].
    pub fn wait(self) -> Result<T> {
        self.receiver
            .recv_timeout(self.timeout)
            .map_err(|error| match error {
                RecvTimeoutError::Timeout => {
                    trace!("Outbound request timed out");
                    Error::MailboxUnavailable
                }
                RecvTimeoutError::Disconnected => Error::MailboxUnavailable,
            })
    }

    /// Await the transport's reply, bounded by the same timeout as [Self::wait].
    ///
    /// The timeout is kept by a helper thread, so no async runtime timer is needed.
    #[cfg(feature = "async")]
    pub async fn wait_async(self) -> Result<T>
    where
        T: Send + 'static,
    {
        let (sender, receiver) = flume::bounded(1);

        std::thread::Builder::new()
            .name("kadnode-pending-reply".to_string())
            .spawn(move || {
                let _ = sender.send(self.wait());
            })?;

        receiver
            .recv_async()
            .await
            .map_err(|_| Error::MailboxUnavailable)?
    }
}
