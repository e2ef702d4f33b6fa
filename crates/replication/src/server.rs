//! Server-side replicated entity: the authoritative copy
//!
//! Authority is enforced in both directions. Inbound, a client update may
//! only land on `UNLOCKED` properties; anything else is decoded to keep
//! the stream in sync, then discarded. Outbound, deltas are filtered per
//! recipient: a change the owning client itself originated is never echoed
//! back to it (the owner already advanced it locally, and the echo would
//! fight its prediction), but a server-originated correction to the same
//! property always reaches the owner.

use std::sync::Arc;

use syncwire_bits::BitBuffer;
use syncwire_core::{ClientId, EntityId, Result, Tick};

use crate::entity::{Entity, UpdateResult};
use crate::property::{ChangeSource, Property, PropertyFlags};
use crate::template::Template;

/// Authoritative replicated entity
#[derive(Debug)]
pub struct ServerEntity {
    entity: Entity,
}

impl ServerEntity {
    pub fn new(id: EntityId, owner: ClientId, template: Arc<Template>) -> Self {
        Self {
            entity: Entity::new(id, owner, template),
        }
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn entity_mut(&mut self) -> &mut Entity {
        &mut self.entity
    }

    /// Whether a property block should reach `for_client`
    ///
    /// Included when the property changed after `since`, except the
    /// owner-echo case: a property whose last change was applied FROM the
    /// owner is suppressed toward that owner — only the owner itself can
    /// originate such a change, so the recipient already holds the value.
    /// If the server wrote it since (a correction), it goes out normally.
    fn include_for(&self, property: &Property, since: Tick, for_client: ClientId) -> bool {
        if !property.changed_since(since) {
            return false;
        }
        let owner_echo =
            for_client == self.entity.owner() && property.origin() == ChangeSource::Owner;
        !owner_echo
    }

    /// True if an update block toward `for_client` would carry anything
    pub fn has_changes_for(&self, since: Tick, for_client: ClientId) -> bool {
        self.entity
            .properties()
            .iter()
            .any(|p| self.include_for(p, since, for_client))
    }

    /// Encode this entity's delta toward one recipient
    pub fn write_update(&self, since: Tick, out: &mut BitBuffer, for_client: ClientId) {
        self.entity
            .write_update_filtered(out, |_, p| self.include_for(p, since, for_client));
    }

    /// Decode an owning client's delta, storing only `UNLOCKED` fields
    ///
    /// Values for locked properties are decoded and dropped; the count of
    /// rejected writes is reported so the connection layer can flag a
    /// misbehaving peer. A stale block (older than one already applied)
    /// discards everything. Sender ownership is checked by the caller —
    /// this method assumes `update` came from this entity's owner.
    pub fn apply_update(&mut self, buf: &mut BitBuffer, update_tick: Tick) -> Result<UpdateResult> {
        let stale = self.entity.is_stale(update_tick);
        let result = self.entity.apply_update_filtered(
            buf,
            update_tick,
            ChangeSource::Owner,
            |_, p| !stale && p.flags().contains(PropertyFlags::UNLOCKED),
        )?;

        if stale {
            tracing::debug!(
                "Entity {}: dropping stale client update (tick {} < applied {})",
                self.entity.id().get(),
                update_tick,
                self.entity.last_applied()
            );
        } else {
            self.entity.mark_applied(update_tick);
            if result.discarded > 0 {
                tracing::warn!(
                    "Entity {}: discarded {} write(s) to locked properties",
                    self.entity.id().get(),
                    result.discarded
                );
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::tests::test_template;
    use crate::property::PropertyValue;
    use syncwire_core::Vec2f;

    const OWNER: ClientId = ClientId(1);
    const OTHER: ClientId = ClientId(2);

    fn server_entity() -> ServerEntity {
        ServerEntity::new(EntityId::new(1), OWNER, test_template())
    }

    /// Encode an update block as the owning client would: value for every
    /// property in `set`, in template order
    fn client_block(set: &[(usize, PropertyValue)]) -> BitBuffer {
        let template = test_template();
        let mut sender = Entity::new(EntityId::new(1), OWNER, template);
        for (index, value) in set {
            sender
                .set_property(*index, value.clone(), Tick::new(1), ChangeSource::Authority)
                .unwrap();
        }
        let mut buf = BitBuffer::new();
        sender.write_update_filtered(&mut buf, |_, p| p.changed_since(Tick::ZERO));
        buf.set_position(0);
        buf
    }

    #[test]
    fn test_unlocked_write_accepted() {
        let mut server = server_entity();
        let mut buf = client_block(&[(1, PropertyValue::Vec2F(Vec2f::new(0.0, -1.0)))]);

        let result = server.apply_update(&mut buf, Tick::new(3)).unwrap();
        assert_eq!(result.changed, vec![1]);
        assert_eq!(result.discarded, 0);
        assert_eq!(
            server.entity().property(1).unwrap().as_vec2f(),
            Some(Vec2f::new(0.0, -1.0))
        );
        assert_eq!(
            server.entity().property(1).unwrap().origin(),
            ChangeSource::Owner
        );
    }

    #[test]
    fn test_locked_write_rejected() {
        let mut server = server_entity();
        // health (index 2) lacks UNLOCKED: post-state must equal pre-state
        let mut buf = client_block(&[(2, PropertyValue::Int(1))]);

        let result = server.apply_update(&mut buf, Tick::new(3)).unwrap();
        assert!(result.changed.is_empty());
        assert_eq!(result.discarded, 1);
        assert_eq!(server.entity().property(2).unwrap().as_int(), Some(100));
        assert!(!buf.overrun());
    }

    #[test]
    fn test_mixed_write_keeps_stream_in_sync() {
        let mut server = server_entity();
        // Locked health before unlocked velocity: the rejected value must
        // still be consumed or the velocity decode lands on garbage
        let mut buf = client_block(&[
            (1, PropertyValue::Vec2F(Vec2f::new(4.0, 4.0))),
            (2, PropertyValue::Int(1)),
        ]);

        let result = server.apply_update(&mut buf, Tick::new(3)).unwrap();
        assert_eq!(result.changed, vec![1]);
        assert_eq!(result.discarded, 1);
        assert_eq!(
            server.entity().property(1).unwrap().as_vec2f(),
            Some(Vec2f::new(4.0, 4.0))
        );
        assert_eq!(server.entity().property(2).unwrap().as_int(), Some(100));
    }

    #[test]
    fn test_owner_echo_suppressed() {
        let mut server = server_entity();

        // Owner reports a velocity; server marks position moved by the
        // owner's input (an OWNER_UPDATES property with Owner origin)
        server
            .entity_mut()
            .set_property(
                0,
                PropertyValue::Vec2F(Vec2f::new(5.0, 5.0)),
                Tick::new(4),
                ChangeSource::Owner,
            )
            .unwrap();

        assert!(!server.has_changes_for(Tick::new(2), OWNER));
        assert!(server.has_changes_for(Tick::new(2), OTHER));

        let mut toward_owner = BitBuffer::new();
        server.write_update(Tick::new(2), &mut toward_owner, OWNER);
        let mut toward_other = BitBuffer::new();
        server.write_update(Tick::new(2), &mut toward_other, OTHER);

        // Owner sees an all-zero bitmap; the other client gets the value
        assert_eq!(toward_owner.position(), 6);
        assert!(toward_other.position() > 6);
    }

    #[test]
    fn test_unlocked_only_owner_change_not_echoed() {
        let mut server = server_entity();

        // velocity carries UNLOCKED but not OWNER_UPDATES; the owner's own
        // write must still never bounce back at it
        let mut buf = client_block(&[(1, PropertyValue::Vec2F(Vec2f::new(2.0, 0.0)))]);
        server.apply_update(&mut buf, Tick::new(3)).unwrap();

        assert!(!server.has_changes_for(Tick::ZERO, OWNER));
        assert!(server.has_changes_for(Tick::ZERO, OTHER));
    }

    #[test]
    fn test_server_correction_reaches_owner() {
        let mut server = server_entity();

        // Server-side correction to the same OWNER_UPDATES property
        server
            .entity_mut()
            .set_property(
                0,
                PropertyValue::Vec2F(Vec2f::new(1.0, 1.0)),
                Tick::new(4),
                ChangeSource::Authority,
            )
            .unwrap();

        assert!(server.has_changes_for(Tick::new(2), OWNER));

        let mut toward_owner = BitBuffer::new();
        server.write_update(Tick::new(2), &mut toward_owner, OWNER);
        assert!(toward_owner.position() > 6);
    }

    #[test]
    fn test_stale_client_update_discarded() {
        let mut server = server_entity();

        let mut newer = client_block(&[(1, PropertyValue::Vec2F(Vec2f::new(2.0, 0.0)))]);
        server.apply_update(&mut newer, Tick::new(10)).unwrap();

        let mut older = client_block(&[(1, PropertyValue::Vec2F(Vec2f::new(9.0, 9.0)))]);
        let result = server.apply_update(&mut older, Tick::new(7)).unwrap();

        assert!(result.changed.is_empty());
        assert_eq!(
            server.entity().property(1).unwrap().as_vec2f(),
            Some(Vec2f::new(2.0, 0.0))
        );
    }
}
