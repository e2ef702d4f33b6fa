//! Byte-level packet framing
//!
//! A packet on the transport is the opcode byte followed by the body's
//! bytes. The transport delivers complete packets; length delimiting is
//! its concern, not ours.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use syncwire_bits::BitBuffer;
use syncwire_core::{Result, SyncError};

use crate::opcode::Opcode;

/// A complete packet ready for the transport
#[derive(Debug, Clone)]
pub struct Packet {
    pub opcode: Opcode,
    pub body: BitBuffer,
}

impl Packet {
    /// Wrap a finished body; the cursor is rewound so the packet always
    /// decodes from the start
    pub fn new(opcode: Opcode, mut body: BitBuffer) -> Self {
        body.set_position(0);
        Self { opcode, body }
    }

    /// A packet with an empty body (`Ready`)
    pub fn empty(opcode: Opcode) -> Self {
        Self {
            opcode,
            body: BitBuffer::new(),
        }
    }

    /// Serialize to transport bytes
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(1 + self.body.len());
        buf.put_u8(self.opcode.as_u8());
        buf.put_slice(self.body.as_bytes());
        buf.freeze()
    }

    /// Deserialize a packet from a transport buffer, consuming it
    ///
    /// The body comes back with its cursor at bit 0, ready to decode.
    pub fn deserialize(buf: &mut BytesMut) -> Result<Self> {
        if buf.remaining() < 1 {
            return Err(SyncError::InvalidData("Packet buffer is empty".into()));
        }

        let opcode_byte = buf.get_u8();
        let opcode = Opcode::from_u8(opcode_byte)
            .ok_or_else(|| SyncError::Protocol(format!("Unknown opcode: {}", opcode_byte)))?;

        let body = BitBuffer::from_bytes(buf.to_vec());
        buf.advance(buf.remaining());

        Ok(Self { opcode, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_roundtrip() {
        let mut body = BitBuffer::new();
        body.write_u32(99);

        let bytes = Packet::new(Opcode::UpdateReceived, body).serialize();
        assert_eq!(bytes.len(), 5);

        let mut incoming = BytesMut::from(&bytes[..]);
        let mut packet = Packet::deserialize(&mut incoming).unwrap();
        assert_eq!(packet.opcode, Opcode::UpdateReceived);
        assert_eq!(packet.body.read_u32(), 99);
        assert!(incoming.is_empty());
    }

    #[test]
    fn test_empty_buffer_rejected() {
        let mut buf = BytesMut::new();
        assert!(matches!(
            Packet::deserialize(&mut buf),
            Err(SyncError::InvalidData(_))
        ));
    }

    #[test]
    fn test_unknown_opcode_is_protocol_error() {
        let mut buf = BytesMut::from(&[0xFF, 0x01][..]);
        assert!(matches!(
            Packet::deserialize(&mut buf),
            Err(SyncError::Protocol(_))
        ));
    }
}
