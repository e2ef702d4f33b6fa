//! Packet body structures
//!
//! Each frame encodes and decodes its body against a [`BitBuffer`]; the
//! opcode byte is handled by [`crate::wire`]. Decode is fail-soft in the
//! same way the buffer is: a truncated body yields zeroed fields and sets
//! the buffer's overrun flag, which callers check before acting on the
//! result.

use syncwire_bits::BitBuffer;
use syncwire_core::{ClientId, EntityId, Tick};

/// Header of an `Update` body
///
/// The latency prefix is directional: the server tells each client how
/// many ticks behind its owner input is running (used to seed prediction
/// replay), while a client update carries only the tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateHeader {
    pub tick: Tick,
    pub owner_latency: Option<u32>,
}

impl UpdateHeader {
    /// Header for a client-to-server update
    pub fn from_client(tick: Tick) -> Self {
        Self {
            tick,
            owner_latency: None,
        }
    }

    /// Header for a server-to-client update
    pub fn from_server(tick: Tick, owner_latency: u32) -> Self {
        Self {
            tick,
            owner_latency: Some(owner_latency),
        }
    }

    pub fn encode(&self, out: &mut BitBuffer) {
        out.write_u32(self.tick.get());
        if let Some(latency) = self.owner_latency {
            out.write_u32(latency);
        }
    }

    /// Decode a header; `with_latency` is true when reading a
    /// server-originated update
    pub fn decode(buf: &mut BitBuffer, with_latency: bool) -> Self {
        let tick = Tick::new(buf.read_u32());
        let owner_latency = with_latency.then(|| buf.read_u32());
        Self {
            tick,
            owner_latency,
        }
    }
}

/// Write an entity reference into an update list (`id + 1`)
pub fn write_entity_ref(out: &mut BitBuffer, id: EntityId) {
    out.write_u16(id.get() + 1);
}

/// Terminate an update's entity list
pub fn write_list_end(out: &mut BitBuffer) {
    out.write_u16(0);
}

/// Read the next entity reference, `None` at the list terminator
///
/// A truncated buffer reads as zero, so overrun also lands on `None` and
/// ends the list cleanly.
pub fn read_entity_ref(buf: &mut BitBuffer) -> Option<EntityId> {
    match buf.read_u16() {
        0 => None,
        id => Some(EntityId::new(id - 1)),
    }
}

/// `EntityCreated` body, minus the trailing snapshot
///
/// The snapshot needs the template to decode, so the world layer resolves
/// `template` against its registry and then reads the state block from the
/// same buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityCreated {
    pub id: EntityId,
    pub owner: ClientId,
    pub template: String,
}

impl EntityCreated {
    pub fn encode(&self, out: &mut BitBuffer) {
        out.write_u16(self.id.get());
        out.write_u16(self.owner.get());
        out.write_str(&self.template);
    }

    pub fn decode(buf: &mut BitBuffer) -> Self {
        Self {
            id: EntityId::new(buf.read_u16()),
            owner: ClientId::new(buf.read_u16()),
            template: buf.read_str(),
        }
    }
}

/// Body shared by `EntityDeleted`, `ActivateEntity` and `DeactivateEntity`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityRef {
    pub id: EntityId,
}

impl EntityRef {
    pub fn new(id: EntityId) -> Self {
        Self { id }
    }

    pub fn encode(&self, out: &mut BitBuffer) {
        out.write_u16(self.id.get());
    }

    pub fn decode(buf: &mut BitBuffer) -> Self {
        Self {
            id: EntityId::new(buf.read_u16()),
        }
    }
}

/// `MapChange` body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapChange {
    pub name: String,
}

impl MapChange {
    pub fn encode(&self, out: &mut BitBuffer) {
        out.write_str(&self.name);
    }

    pub fn decode(buf: &mut BitBuffer) -> Self {
        Self {
            name: buf.read_str(),
        }
    }
}

/// `Rotation` body: owner-reported facing angle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    pub id: EntityId,
    pub radians: f32,
}

impl Rotation {
    pub fn encode(&self, out: &mut BitBuffer) {
        out.write_u16(self.id.get());
        out.write_f32(self.radians);
    }

    pub fn decode(buf: &mut BitBuffer) -> Self {
        Self {
            id: EntityId::new(buf.read_u16()),
            radians: buf.read_f32(),
        }
    }
}

/// `Keys` body: owner-reported held-key bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keys {
    pub id: EntityId,
    pub keys: u8,
}

impl Keys {
    pub fn encode(&self, out: &mut BitBuffer) {
        out.write_u16(self.id.get());
        out.write_u8(self.keys);
    }

    pub fn decode(buf: &mut BitBuffer) -> Self {
        Self {
            id: EntityId::new(buf.read_u16()),
            keys: buf.read_u8(),
        }
    }
}

/// `UpdateReceived` body: newest applied update tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateReceived {
    pub tick: Tick,
}

impl UpdateReceived {
    pub fn new(tick: Tick) -> Self {
        Self { tick }
    }

    pub fn encode(&self, out: &mut BitBuffer) {
        out.write_u32(self.tick.get());
    }

    pub fn decode(buf: &mut BitBuffer) -> Self {
        Self {
            tick: Tick::new(buf.read_u32()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_header_directional() {
        let mut out = BitBuffer::new();
        UpdateHeader::from_server(Tick::new(42), 3).encode(&mut out);
        assert_eq!(out.len(), 8);

        out.set_position(0);
        let header = UpdateHeader::decode(&mut out, true);
        assert_eq!(header.tick, Tick::new(42));
        assert_eq!(header.owner_latency, Some(3));

        let mut out = BitBuffer::new();
        UpdateHeader::from_client(Tick::new(42)).encode(&mut out);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_entity_ref_list() {
        let mut out = BitBuffer::new();
        write_entity_ref(&mut out, EntityId::new(0));
        write_entity_ref(&mut out, EntityId::new(7));
        write_list_end(&mut out);

        out.set_position(0);
        assert_eq!(read_entity_ref(&mut out), Some(EntityId::new(0)));
        assert_eq!(read_entity_ref(&mut out), Some(EntityId::new(7)));
        assert_eq!(read_entity_ref(&mut out), None);
    }

    #[test]
    fn test_entity_ref_truncation_ends_list() {
        let mut buf = BitBuffer::new();
        write_entity_ref(&mut buf, EntityId::new(3));
        buf.set_position(0);

        assert_eq!(read_entity_ref(&mut buf), Some(EntityId::new(3)));
        // no terminator was written: the zero-filled read ends the list
        assert_eq!(read_entity_ref(&mut buf), None);
        assert!(buf.overrun());
    }

    #[test]
    fn test_entity_created_roundtrip() {
        let frame = EntityCreated {
            id: EntityId::new(12),
            owner: ClientId::new(3),
            template: "player".into(),
        };
        let mut buf = BitBuffer::new();
        frame.encode(&mut buf);
        buf.set_position(0);
        assert_eq!(EntityCreated::decode(&mut buf), frame);
    }

    #[test]
    fn test_input_frames_roundtrip() {
        let mut buf = BitBuffer::new();
        Rotation {
            id: EntityId::new(1),
            radians: std::f32::consts::FRAC_PI_2,
        }
        .encode(&mut buf);
        Keys {
            id: EntityId::new(1),
            keys: 0b0001_0110,
        }
        .encode(&mut buf);

        buf.set_position(0);
        let rotation = Rotation::decode(&mut buf);
        assert_eq!(rotation.radians, std::f32::consts::FRAC_PI_2);
        let keys = Keys::decode(&mut buf);
        assert_eq!(keys.keys, 0b0001_0110);
    }
}
