//! Replicated entity core shared by the client and server variants
//!
//! An entity is an ordered set of properties bound to a read-only template.
//! The order never changes and is never transmitted: every snapshot and
//! delta walks the properties in template order, emitting one changed bit
//! and an optional value per position. Exact positional agreement between
//! the two peers' templates is the entire decode contract — see the schema
//! digest check in the protocol layer.

use std::sync::Arc;

use syncwire_bits::BitBuffer;
use syncwire_core::{ClientId, EntityId, Result, SyncError, Tick, Vec2f};

use crate::property::{ChangeSource, Property, PropertyFlags, PropertyValue};
use crate::template::Template;

/// Result of decoding one entity's update block
#[derive(Debug, Default)]
pub struct UpdateResult {
    /// Indices of properties whose value was stored
    pub changed: Vec<usize>,
    /// Values decoded but discarded (authority or staleness)
    pub discarded: u32,
}

/// Ordered property set bound to a shared template
#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    owner: ClientId,
    template: Arc<Template>,
    /// Same order as the template, never reordered
    properties: Vec<Property>,
    /// Current movement vector, fed into prediction on the client
    speed: Vec2f,
    /// Newest update tick applied to this entity; older incoming updates
    /// are decoded but discarded (last-applied-wins made explicit)
    last_applied: Tick,
    /// Deactivated entities keep their state but sit out delta updates
    active: bool,
}

impl Entity {
    /// Instantiate from template defaults
    pub fn new(id: EntityId, owner: ClientId, template: Arc<Template>) -> Self {
        let properties = template.instantiate();
        Self {
            id,
            owner,
            template,
            properties,
            speed: Vec2f::ZERO,
            last_applied: Tick::ZERO,
            active: true,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn owner(&self) -> ClientId {
        self.owner
    }

    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn property(&self, index: usize) -> Option<&Property> {
        self.properties.get(index)
    }

    pub fn speed(&self) -> Vec2f {
        self.speed
    }

    pub fn set_speed(&mut self, speed: Vec2f) {
        self.speed = speed;
    }

    pub fn last_applied(&self) -> Tick {
        self.last_applied
    }

    /// True if `tick` is older than an update already applied here
    pub fn is_stale(&self, tick: Tick) -> bool {
        tick < self.last_applied
    }

    pub(crate) fn mark_applied(&mut self, tick: Tick) {
        self.last_applied = self.last_applied.max(tick);
    }

    /// Set one property by template index
    pub fn set_property(
        &mut self,
        index: usize,
        value: PropertyValue,
        tick: Tick,
        origin: ChangeSource,
    ) -> Result<()> {
        let property = self.properties.get_mut(index).ok_or_else(|| {
            SyncError::InvalidData(format!(
                "entity {}: property index {} out of range",
                self.id.get(),
                index
            ))
        })?;
        property.set(value, tick, origin)
    }

    /// True if any `UNLOCKED` property changed after `since` — the owning
    /// side's "is there anything to send" check
    pub fn has_changed(&self, since: Tick) -> bool {
        self.properties
            .iter()
            .any(|p| p.flags().contains(PropertyFlags::UNLOCKED) && p.changed_since(since))
    }

    // === Full-state snapshot (spawn) ===

    /// Encode the full positional snapshot: per property, one
    /// differs-from-default bit, then the value if set
    pub fn write_state(&self, out: &mut BitBuffer) {
        for property in &self.properties {
            if property.differs_from_default() {
                out.write_bit(true);
                property.write(out);
            } else {
                out.write_bit(false);
            }
        }
    }

    /// Decode a full snapshot over this entity's current values
    ///
    /// Properties whose bit is clear keep their template default.
    pub fn read_state(&mut self, buf: &mut BitBuffer, tick: Tick) -> Result<()> {
        for index in 0..self.properties.len() {
            if buf.read_bit() {
                let property = &self.properties[index];
                let value = Property::decode(property.kind(), property.bit_width(), buf);
                self.properties[index].set(value, tick, ChangeSource::Authority)?;
            }
        }
        Ok(())
    }

    // === Delta blocks ===

    /// Encode one delta block: per property, a changed bit decided by
    /// `include`, then the value when set
    pub fn write_update_filtered(
        &self,
        out: &mut BitBuffer,
        include: impl Fn(usize, &Property) -> bool,
    ) {
        for (index, property) in self.properties.iter().enumerate() {
            if include(index, property) {
                out.write_bit(true);
                property.write(out);
            } else {
                out.write_bit(false);
            }
        }
    }

    /// Decode one delta block in template order
    ///
    /// Every flagged value is decoded — the stream must advance past it to
    /// stay positionally in sync — but only values passing `accept` are
    /// stored. Rejected values are counted in the result.
    pub fn apply_update_filtered(
        &mut self,
        buf: &mut BitBuffer,
        tick: Tick,
        origin: ChangeSource,
        accept: impl Fn(usize, &Property) -> bool,
    ) -> Result<UpdateResult> {
        let mut result = UpdateResult::default();
        for index in 0..self.properties.len() {
            if !buf.read_bit() {
                continue;
            }
            let property = &self.properties[index];
            let value = Property::decode(property.kind(), property.bit_width(), buf);
            if accept(index, property) {
                self.properties[index].set(value, tick, origin)?;
                result.changed.push(index);
            } else {
                result.discarded += 1;
            }
        }
        Ok(result)
    }
}
