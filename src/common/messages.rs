//! Serialize and deserialize wire messages.
//!
//! Every message is a little-endian frame:
//!
//! | Field  | Type      |
//! |--------|-----------|
//! | magic  | u16       |
//! | code   | u8        |
//! | ip     | 4 bytes   |
//! | port   | u32       |
//! | length | u32       |
//! | body   | `length` bytes, a bencoded dictionary |

mod internal;

use std::io::Read;
use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, Bytes};

use crate::common::{Id, Node};
use crate::{Error, Result};

/// Constant first two bytes of every frame.
pub const MAGIC: u16 = 0x7596;
/// Size of the fixed frame header.
pub const HEADER_SIZE: usize = 2 + 1 + 4 + 4 + 4;
/// Upper bound on the body length a decoder accepts.
pub const MAX_PAYLOAD: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageCode {
    Ping = 0x01,
    Pong = 0x02,
    Find = 0x03,
    FindAck = 0x04,
    Store = 0x05,
}

impl TryFrom<u8> for MessageCode {
    type Error = Error;

    fn try_from(code: u8) -> Result<MessageCode> {
        Ok(match code {
            0x01 => MessageCode::Ping,
            0x02 => MessageCode::Pong,
            0x03 => MessageCode::Find,
            0x04 => MessageCode::FindAck,
            0x05 => MessageCode::Store,
            _ => return Err(Error::Decode(format!("unknown message code {code:#04x}"))),
        })
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Message {
    /// IPv4 address of the sender.
    pub ip: Ipv4Addr,
    /// Listening port of the sender.
    pub port: u32,

    pub payload: Payload,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Payload {
    Ping(PingArguments),
    Pong(PingArguments),
    Find(FindArguments),
    FindAck(FindAckArguments),
    Store(StoreArguments),
}

// === PING / PONG ===

#[derive(Debug, PartialEq, Clone)]
pub struct PingArguments {
    pub id: Id,
}

// === FIND ===

#[derive(Debug, PartialEq, Clone)]
pub struct FindArguments {
    pub requester_id: Id,
    pub target: Id,
}

#[derive(Debug, PartialEq, Clone)]
pub struct FindAckArguments {
    pub responder_id: Id,
    pub target: Id,
    pub nodes: Vec<Node>,
}

// === STORE ===

#[derive(Debug, PartialEq, Clone)]
pub struct StoreArguments {
    pub requester_id: Id,
    pub key: String,
    pub value: Bytes,
}

impl Message {
    pub fn new(local: &Node, payload: Payload) -> Message {
        Message {
            ip: local.ip,
            port: local.port,
            payload,
        }
    }

    /// Id of the node that sent this message.
    pub fn sender_id(&self) -> Id {
        match &self.payload {
            Payload::Ping(args) | Payload::Pong(args) => args.id,
            Payload::Find(args) => args.requester_id,
            Payload::FindAck(args) => args.responder_id,
            Payload::Store(args) => args.requester_id,
        }
    }

    /// The sender as a routing table entry.
    pub fn sender(&self) -> Node {
        Node::new(self.sender_id(), self.ip, self.port)
    }

    pub fn code(&self) -> MessageCode {
        match self.payload {
            Payload::Ping(_) => MessageCode::Ping,
            Payload::Pong(_) => MessageCode::Pong,
            Payload::Find(_) => MessageCode::Find,
            Payload::FindAck(_) => MessageCode::FindAck,
            Payload::Store(_) => MessageCode::Store,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let body = self.encode_body()?;

        if body.len() > MAX_PAYLOAD {
            return Err(Error::PayloadTooLarge(body.len()));
        }

        let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
        buf.put_u16_le(MAGIC);
        buf.put_u8(self.code() as u8);
        buf.put_slice(&self.ip.octets());
        buf.put_u32_le(self.port);
        buf.put_u32_le(body.len() as u32);
        buf.put_slice(&body);

        Ok(buf)
    }

    /// Decode exactly one frame, trailing bytes are an error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Message> {
        let (header, body) = bytes.split_at(HEADER_SIZE.min(bytes.len()));
        let header = Header::parse(header)?;

        if body.len() != header.length {
            return Err(Error::Decode(format!(
                "expected {} body bytes, got {}",
                header.length,
                body.len()
            )));
        }

        header.into_message(body)
    }

    /// Read one frame from a stream, blocking until it is complete.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Message> {
        let mut header = [0_u8; HEADER_SIZE];
        read_exact(reader, &mut header)?;
        let header = Header::parse(&header)?;

        let mut body = vec![0_u8; header.length];
        read_exact(reader, &mut body)?;

        header.into_message(&body)
    }

    // === Private Methods ===

    fn encode_body(&self) -> Result<Vec<u8>> {
        let bytes = match &self.payload {
            Payload::Ping(args) | Payload::Pong(args) => internal::to_bytes(&internal::DHTPing {
                id: args.id.to_vec(),
            })?,
            Payload::Find(args) => internal::to_bytes(&internal::DHTFind {
                id: args.requester_id.to_vec(),
                target: args.target.to_vec(),
            })?,
            Payload::FindAck(args) => internal::to_bytes(&internal::DHTFindAck {
                id: args.responder_id.to_vec(),
                target: args.target.to_vec(),
                nodes: args
                    .nodes
                    .iter()
                    .map(|node| internal::DHTNode {
                        id: node.id.to_vec(),
                        ip: node.ip.octets().to_vec(),
                        port: node.port,
                    })
                    .collect(),
            })?,
            Payload::Store(args) => internal::to_bytes(&internal::DHTStore {
                id: args.requester_id.to_vec(),
                key: args.key.clone(),
                value: args.value.to_vec(),
            })?,
        };

        Ok(bytes)
    }
}

struct Header {
    code: MessageCode,
    ip: Ipv4Addr,
    port: u32,
    length: usize,
}

impl Header {
    fn parse(mut bytes: &[u8]) -> Result<Header> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::Decode(format!(
                "short header, {} of {HEADER_SIZE} bytes",
                bytes.len()
            )));
        }

        let magic = bytes.get_u16_le();
        if magic != MAGIC {
            return Err(Error::Decode(format!("magic mismatch {magic:#06x}")));
        }

        let code = MessageCode::try_from(bytes.get_u8())?;

        let mut octets = [0_u8; 4];
        bytes.copy_to_slice(&mut octets);

        let port = bytes.get_u32_le();
        let length = bytes.get_u32_le() as usize;

        if length > MAX_PAYLOAD {
            return Err(Error::Decode(format!("body too large {length}")));
        }

        Ok(Header {
            code,
            ip: Ipv4Addr::from(octets),
            port,
            length,
        })
    }

    fn into_message(self, body: &[u8]) -> Result<Message> {
        let payload = match self.code {
            MessageCode::Ping | MessageCode::Pong => {
                let ping: internal::DHTPing = decode_body(body)?;
                let args = PingArguments {
                    id: decode_id(&ping.id)?,
                };

                if self.code == MessageCode::Ping {
                    Payload::Ping(args)
                } else {
                    Payload::Pong(args)
                }
            }
            MessageCode::Find => {
                let find: internal::DHTFind = decode_body(body)?;

                Payload::Find(FindArguments {
                    requester_id: decode_id(&find.id)?,
                    target: decode_id(&find.target)?,
                })
            }
            MessageCode::FindAck => {
                let ack: internal::DHTFindAck = decode_body(body)?;

                Payload::FindAck(FindAckArguments {
                    responder_id: decode_id(&ack.id)?,
                    target: decode_id(&ack.target)?,
                    nodes: ack
                        .nodes
                        .iter()
                        .map(decode_node)
                        .collect::<Result<Vec<_>>>()?,
                })
            }
            MessageCode::Store => {
                let store: internal::DHTStore = decode_body(body)?;

                Payload::Store(StoreArguments {
                    requester_id: decode_id(&store.id)?,
                    key: store.key,
                    value: store.value.into(),
                })
            }
        };

        Ok(Message {
            ip: self.ip,
            port: self.port,
            payload,
        })
    }
}

fn decode_body<'de, T: serde::Deserialize<'de>>(body: &'de [u8]) -> Result<T> {
    internal::from_bytes(body).map_err(|error| Error::Decode(format!("malformed body: {error}")))
}

fn decode_id(bytes: &[u8]) -> Result<Id> {
    Id::from_bytes(bytes).map_err(|_| Error::Decode(format!("invalid id length {}", bytes.len())))
}

fn decode_node(node: &internal::DHTNode) -> Result<Node> {
    let octets: [u8; 4] = node
        .ip
        .as_slice()
        .try_into()
        .map_err(|_| Error::Decode(format!("invalid ip length {}", node.ip.len())))?;

    Ok(Node::new(decode_id(&node.id)?, Ipv4Addr::from(octets), node.port))
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|error| match error.kind() {
        std::io::ErrorKind::UnexpectedEof => Error::Decode("short read".to_string()),
        _ => Error::IO(error),
    })
}
