//! Connect-time handshake
//!
//! The wire format transmits no property names or widths; both peers must
//! hold byte-identical template schemas or every decode after the first
//! divergent property lands on garbage. `InitialData` therefore carries a
//! digest of the sender's registry, checked once at connect instead of
//! failing obscurely mid-session.

use syncwire_bits::BitBuffer;
use syncwire_core::{ClientId, Result, SyncError, Tick};
use syncwire_replication::TemplateRegistry;

/// `InitialData` body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitialData {
    /// Id assigned to the connecting client
    pub client_id: ClientId,
    /// Server tick at the time of connect
    pub tick: Tick,
    /// Digest of the server's template registry
    pub schema_digest: u32,
}

impl InitialData {
    pub fn new(client_id: ClientId, tick: Tick, registry: &TemplateRegistry) -> Self {
        Self {
            client_id,
            tick,
            schema_digest: registry.schema_digest(),
        }
    }

    pub fn encode(&self, out: &mut BitBuffer) {
        out.write_u16(self.client_id.get());
        out.write_u32(self.tick.get());
        out.write_u32(self.schema_digest);
    }

    pub fn decode(buf: &mut BitBuffer) -> Self {
        Self {
            client_id: ClientId::new(buf.read_u16()),
            tick: Tick::new(buf.read_u32()),
            schema_digest: buf.read_u32(),
        }
    }

    /// Check the advertised digest against the local registry
    pub fn verify(&self, registry: &TemplateRegistry) -> Result<()> {
        let local = registry.schema_digest();
        if self.schema_digest != local {
            return Err(SyncError::SchemaMismatch {
                expected: local,
                found: self.schema_digest,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncwire_core::Vec2f;
    use syncwire_replication::{
        PropertyDef, PropertyFlags, PropertyKind, PropertyValue, Template,
    };

    fn registry_with(extra_width: u8) -> TemplateRegistry {
        let registry = TemplateRegistry::new();
        registry.insert(
            Template::new(
                "player",
                vec![
                    PropertyDef {
                        name: "position".into(),
                        kind: PropertyKind::Vec2F,
                        flags: PropertyFlags::OWNER_UPDATES,
                        bit_width: 32,
                        default: PropertyValue::Vec2F(Vec2f::ZERO),
                    },
                    PropertyDef {
                        name: "health".into(),
                        kind: PropertyKind::Int,
                        flags: PropertyFlags::NONE,
                        bit_width: extra_width,
                        default: PropertyValue::Int(100),
                    },
                ],
            )
            .unwrap(),
        );
        registry
    }

    #[test]
    fn test_matching_schemas_verify() {
        let server = registry_with(7);
        let client = registry_with(7);

        let hello = InitialData::new(ClientId::new(1), Tick::new(10), &server);
        let mut buf = BitBuffer::new();
        hello.encode(&mut buf);
        buf.set_position(0);

        let received = InitialData::decode(&mut buf);
        assert_eq!(received, hello);
        assert!(received.verify(&client).is_ok());
    }

    #[test]
    fn test_width_change_breaks_schema() {
        let server = registry_with(7);
        let client = registry_with(8);

        let hello = InitialData::new(ClientId::new(1), Tick::new(10), &server);
        match hello.verify(&client) {
            Err(SyncError::SchemaMismatch { expected, found }) => {
                assert_ne!(expected, found);
            }
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
    }
}
