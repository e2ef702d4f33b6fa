//! In-memory loopback transport
//!
//! Two packet queues, one per direction, carrying serialized packets as
//! byte buffers. Stands in for a real socket in tests and the demo
//! binary; the worlds only ever see complete packets either way.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use syncwire_core::Result;
use syncwire_protocol::Packet;

/// A bidirectional pair of packet queues
#[derive(Debug, Default)]
pub struct Loopback {
    to_client: VecDeque<Bytes>,
    to_server: VecDeque<Bytes>,
}

impl Loopback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send_to_client(&mut self, packet: Packet) {
        self.to_client.push_back(packet.serialize());
    }

    pub fn send_to_server(&mut self, packet: Packet) {
        self.to_server.push_back(packet.serialize());
    }

    /// Next packet bound for the client, `None` when the queue is drained
    pub fn recv_at_client(&mut self) -> Option<Result<Packet>> {
        let bytes = self.to_client.pop_front()?;
        let mut buf = BytesMut::from(&bytes[..]);
        Some(Packet::deserialize(&mut buf))
    }

    /// Next packet bound for the server
    pub fn recv_at_server(&mut self) -> Option<Result<Packet>> {
        let bytes = self.to_server.pop_front()?;
        let mut buf = BytesMut::from(&bytes[..]);
        Some(Packet::deserialize(&mut buf))
    }

    pub fn pending_for_client(&self) -> usize {
        self.to_client.len()
    }

    pub fn pending_for_server(&self) -> usize {
        self.to_server.len()
    }
}
