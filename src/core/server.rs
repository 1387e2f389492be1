//! Handle decoded inbound messages on behalf of a transport.

use tracing::{debug, trace};

use crate::common::{FindAckArguments, Message, Node, Payload, PingArguments};
use crate::{Dht, Result};

#[derive(Debug, Clone)]
/// Turns inbound wire messages into actor commands, and builds the replies.
///
/// Every message's sender is added to the routing table, since any message
/// counts as a contact.
pub struct Server {
    dht: Dht,
    local: Node,
}

impl Server {
    /// Creates a new [Server] for the given node.
    pub fn new(dht: Dht) -> Self {
        let local = dht.local().clone();

        Self { dht, local }
    }

    /// The node this server answers for.
    pub fn local(&self) -> &Node {
        &self.local
    }

    /// Handle a decoded message, returning the message to reply with, if any.
    pub fn handle(&self, message: Message) -> Result<Option<Message>> {
        trace!(?message, "Inbound message");

        let sender = message.sender();

        if sender.id == self.local.id {
            debug!(?sender, "Ignoring message claiming our own id");
            return Ok(None);
        }

        self.dht.add_node(sender);

        let response = match message.payload {
            Payload::Ping(_) => Some(Payload::Pong(PingArguments { id: self.local.id })),
            Payload::Pong(_) => None,
            Payload::Find(args) => {
                let nodes = self.dht.find_local(args.target, true)?;

                Some(Payload::FindAck(FindAckArguments {
                    responder_id: self.local.id,
                    target: args.target,
                    nodes,
                }))
            }
            Payload::FindAck(args) => {
                for node in args.nodes {
                    self.dht.add_node(node);
                }

                None
            }
            Payload::Store(args) => {
                self.dht.store(args.key, args.value);

                None
            }
        };

        Ok(response.map(|payload| Message::new(&self.local, payload)))
    }

    /// Decode a frame, handle it, and encode the reply.
    ///
    /// Decoding errors are returned for the transport to drop the connection.
    pub fn handle_bytes(&self, bytes: &[u8]) -> Result<Option<Vec<u8>>> {
        let message = Message::from_bytes(bytes).inspect_err(|error| {
            debug!(?error, "Failed to decode inbound message");
        })?;

        self.handle(message)?
            .map(|response| response.to_bytes())
            .transpose()
    }
}
