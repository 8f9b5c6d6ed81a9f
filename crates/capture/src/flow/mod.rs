//! Per-connection reconstruction.
//!
//! The external TCP reassembler reports ordered segments as [`FlowEvent`]s. The
//! dispatcher groups them by [`FlowKey`], classifies each flow from its first client
//! payload and, for HTTP flows, feeds two pipes that a stream worker decodes into
//! request/response exchanges.

pub mod classifier;
pub(crate) mod dispatcher;
mod framed;
mod worker;

use std::fmt;
use std::net::SocketAddr;

use bytes::Bytes;

/// The endpoints of a TCP connection, oriented client to server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub client: SocketAddr,
    pub server: SocketAddr,
}

impl FlowKey {
    pub fn new(client: SocketAddr, server: SocketAddr) -> Self {
        Self { client, server }
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.client, self.server)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

/// Input from the TCP reassembler.
#[derive(Debug, Clone)]
pub enum FlowEvent {
    /// In-order payload of one direction of a flow
    Segment { key: FlowKey, direction: Direction, payload: Bytes },
    /// The flow saw FIN or RST
    Complete { key: FlowKey },
}

impl FlowEvent {
    pub fn key(&self) -> &FlowKey {
        match self {
            FlowEvent::Segment { key, .. } | FlowEvent::Complete { key } => key,
        }
    }
}
