//! Lookup logic and inbound message handling, independent of any socket.

pub(crate) mod iterative_query;
pub mod server;
