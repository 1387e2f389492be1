#![doc = include_str!("../README.md")]
//! ## Feature flags
#![doc = document_features::document_features!()]
//!

// Public modules
mod actor;
mod common;
mod core;
mod error;

#[cfg(feature = "async")]
pub mod async_dht;
mod dht;

pub use crate::actor::{
    Config, Info, OutboundRequest, Outbox, PendingReply, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT,
};
pub use crate::common::{
    find_closest_n, find_closest_one, messages, Admission, Distance, Id, KBucket, Message,
    MessageCode, Node, NodeState, Payload, RoutingTable, ALPHA, ID_SIZE, MAX_BUCKET_SIZE_K,
    SELF_PARTITION,
};
pub use crate::core::server::Server;
pub use crate::error::{Error, Result};
pub use bytes::Bytes;
pub use dht::{Dht, DhtBuilder, Testnet, TESTNET_BASE_PORT};
