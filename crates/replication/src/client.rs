//! Client-side replicated entity: remote sync plus dead reckoning
//!
//! Between authoritative updates the client advances entities locally from
//! their last known velocity. When an update arrives it is `latency` ticks
//! old, so snapping to it would jump the entity backwards; instead the
//! recorded velocity history is replayed over the latency window against
//! map collision, reconstructing where the entity should be NOW.

use std::collections::VecDeque;
use std::sync::Arc;

use syncwire_bits::BitBuffer;
use syncwire_core::{ClientId, EntityId, Result, Tick, Vec2f};

use crate::entity::{Entity, UpdateResult};
use crate::observer::CollisionQuery;
use crate::property::{ChangeSource, PropertyFlags, PropertyKind, PropertyValue};
use crate::template::Template;

/// Replicated entity synchronized from an authoritative server copy
#[derive(Debug)]
pub struct ClientEntity {
    entity: Entity,
    /// Time-ordered ring of (tick, velocity); only populated for locally
    /// owned entities, which are the only ones predicted
    speed_history: VecDeque<(Tick, Vec2f)>,
    history_limit: usize,
}

impl ClientEntity {
    pub fn new(
        id: EntityId,
        owner: ClientId,
        template: Arc<Template>,
        history_limit: usize,
    ) -> Self {
        Self {
            entity: Entity::new(id, owner, template),
            speed_history: VecDeque::new(),
            history_limit: history_limit.max(1),
        }
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn entity_mut(&mut self) -> &mut Entity {
        &mut self.entity
    }

    /// Number of velocity samples currently retained
    pub fn history_len(&self) -> usize {
        self.speed_history.len()
    }

    /// Record this tick's velocity for later prediction replay
    ///
    /// Samples are kept in tick order; re-recording the newest tick
    /// replaces its sample. The ring is bounded by the history limit.
    pub fn record_speed(&mut self, tick: Tick, speed: Vec2f) {
        self.entity.set_speed(speed);
        if let Some(last) = self.speed_history.back_mut() {
            if last.0 == tick {
                last.1 = speed;
                return;
            }
        }
        self.speed_history.push_back((tick, speed));
        while self.speed_history.len() > self.history_limit {
            self.speed_history.pop_front();
        }
    }

    /// Velocity in effect at `tick`: the newest sample at or before it
    pub fn velocity_at(&self, tick: Tick) -> Vec2f {
        self.speed_history
            .iter()
            .rev()
            .find(|(t, _)| *t <= tick)
            .map(|(_, v)| *v)
            .unwrap_or(Vec2f::ZERO)
    }

    /// Trim velocity history covered by a server acknowledgement
    ///
    /// The newest sample at or before `acked` is retained: it may still be
    /// the velocity in effect for ticks after the acknowledgement.
    pub fn drop_prediction_data(&mut self, acked: Tick) {
        while self.speed_history.len() >= 2 && self.speed_history[1].0 <= acked {
            self.speed_history.pop_front();
        }
    }

    /// Encode the owner's delta: `UNLOCKED` properties changed after
    /// `since`. Only locally owned entities ever call this.
    pub fn write_update(&self, since: Tick, out: &mut BitBuffer) {
        self.entity.write_update_filtered(out, |_, p| {
            p.flags().contains(PropertyFlags::UNLOCKED) && p.changed_since(since)
        });
    }

    /// Decode a server delta for this entity, reconciling prediction
    ///
    /// A block whose `update_tick` is older than one already applied is
    /// decoded (the stream must advance) but discarded entirely. When a
    /// `PREDICT`-flagged position arrives and the update is `latency` ticks
    /// old, the recorded velocities over `[now - latency, now)` are
    /// replayed from the server position, stopping at the first step the
    /// map rejects.
    pub fn apply_update(
        &mut self,
        buf: &mut BitBuffer,
        update_tick: Tick,
        latency: u32,
        now: Tick,
        map: &dyn CollisionQuery,
    ) -> Result<UpdateResult> {
        let stale = self.entity.is_stale(update_tick);
        if stale {
            tracing::debug!(
                "Entity {}: dropping stale update (tick {} < applied {})",
                self.entity.id().get(),
                update_tick,
                self.entity.last_applied()
            );
        }

        let result = self.entity.apply_update_filtered(
            buf,
            update_tick,
            ChangeSource::Authority,
            |_, _| !stale,
        )?;
        if stale {
            return Ok(result);
        }
        self.entity.mark_applied(update_tick);

        if latency > 0 {
            for &index in &result.changed {
                let property = &self.entity.properties()[index];
                if !property.flags().contains(PropertyFlags::PREDICT)
                    || property.kind() != PropertyKind::Vec2F
                {
                    continue;
                }
                let server_pos = property.as_vec2f().unwrap_or(Vec2f::ZERO);
                let reconciled = self.replay(server_pos, latency, now, map);
                self.entity.set_property(
                    index,
                    PropertyValue::Vec2F(reconciled),
                    now,
                    ChangeSource::Authority,
                )?;
            }
        }

        Ok(result)
    }

    /// Step the server position forward through the latency window
    fn replay(&self, server_pos: Vec2f, latency: u32, now: Tick, map: &dyn CollisionQuery) -> Vec2f {
        let mut pos = server_pos;
        for step in 0..latency {
            let tick = now.back(latency - step);
            let candidate = pos + self.velocity_at(tick);
            if !map.is_accessible(candidate) {
                break;
            }
            pos = candidate;
        }
        pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::tests::test_template;
    use crate::observer::OpenMap;

    /// Everything at or right of x = limit is blocked
    struct WallAt {
        limit: f32,
    }

    impl CollisionQuery for WallAt {
        fn is_accessible(&self, pos: Vec2f) -> bool {
            pos.x < self.limit
        }
    }

    fn server_update(pos: Vec2f) -> BitBuffer {
        // Position changed, everything else unchanged
        let template = test_template();
        let mut server = Entity::new(EntityId::new(1), ClientId::new(1), template);
        server
            .set_property(0, PropertyValue::Vec2F(pos), Tick::new(1), ChangeSource::Authority)
            .unwrap();
        let mut buf = BitBuffer::new();
        server.write_update_filtered(&mut buf, |_, p| p.changed_since(Tick::ZERO));
        buf.set_position(0);
        buf
    }

    fn owned_client_entity() -> ClientEntity {
        ClientEntity::new(EntityId::new(1), ClientId::new(1), test_template(), 64)
    }

    #[test]
    fn test_prediction_bound() {
        // Constant velocity v held for L ticks: reconciled = server + v*L
        let mut client = owned_client_entity();
        let v = Vec2f::new(2.0, 0.5);
        for t in 1..=20u32 {
            client.record_speed(Tick::new(t), v);
        }

        let latency = 5;
        let now = Tick::new(20);
        let mut buf = server_update(Vec2f::new(10.0, 10.0));
        client
            .apply_update(&mut buf, Tick::new(15), latency, now, &OpenMap)
            .unwrap();

        let pos = client.entity().property(0).unwrap().as_vec2f().unwrap();
        assert!((pos.x - 20.0).abs() < 1e-5);
        assert!((pos.y - 12.5).abs() < 1e-5);
    }

    #[test]
    fn test_prediction_clips_at_collision() {
        let mut client = owned_client_entity();
        for t in 1..=20u32 {
            client.record_speed(Tick::new(t), Vec2f::new(2.0, 0.0));
        }

        // Wall at x = 13: 10 -> 12 is the only legal step
        let wall = WallAt { limit: 13.0 };
        let mut buf = server_update(Vec2f::new(10.0, 0.0));
        client
            .apply_update(&mut buf, Tick::new(15), 5, Tick::new(20), &wall)
            .unwrap();

        let pos = client.entity().property(0).unwrap().as_vec2f().unwrap();
        assert_eq!(pos, Vec2f::new(12.0, 0.0));
    }

    #[test]
    fn test_zero_latency_snaps() {
        let mut client = owned_client_entity();
        client.record_speed(Tick::new(1), Vec2f::new(5.0, 5.0));

        let mut buf = server_update(Vec2f::new(3.0, 4.0));
        client
            .apply_update(&mut buf, Tick::new(2), 0, Tick::new(2), &OpenMap)
            .unwrap();

        let pos = client.entity().property(0).unwrap().as_vec2f().unwrap();
        assert_eq!(pos, Vec2f::new(3.0, 4.0));
    }

    #[test]
    fn test_stale_update_discarded() {
        let mut client = owned_client_entity();

        let mut newer = server_update(Vec2f::new(8.0, 8.0));
        client
            .apply_update(&mut newer, Tick::new(10), 0, Tick::new(10), &OpenMap)
            .unwrap();

        // An older in-flight update must not overwrite newer state
        let mut older = server_update(Vec2f::new(1.0, 1.0));
        let result = client
            .apply_update(&mut older, Tick::new(6), 0, Tick::new(10), &OpenMap)
            .unwrap();

        assert!(result.changed.is_empty());
        assert_eq!(result.discarded, 1);
        let pos = client.entity().property(0).unwrap().as_vec2f().unwrap();
        assert_eq!(pos, Vec2f::new(8.0, 8.0));
    }

    #[test]
    fn test_drop_prediction_data_retains_covering_sample() {
        let mut client = owned_client_entity();
        client.record_speed(Tick::new(2), Vec2f::new(1.0, 0.0));
        client.record_speed(Tick::new(5), Vec2f::new(2.0, 0.0));
        client.record_speed(Tick::new(9), Vec2f::new(3.0, 0.0));

        // Ack at tick 7: the tick-5 sample still covers ticks 7..9
        client.drop_prediction_data(Tick::new(7));
        assert_eq!(client.history_len(), 2);
        assert_eq!(client.velocity_at(Tick::new(8)), Vec2f::new(2.0, 0.0));
        assert_eq!(client.velocity_at(Tick::new(9)), Vec2f::new(3.0, 0.0));
    }

    #[test]
    fn test_history_limit_bounds_memory() {
        let mut client = ClientEntity::new(EntityId::new(1), ClientId::new(1), test_template(), 4);
        for t in 1..=100u32 {
            client.record_speed(Tick::new(t), Vec2f::new(t as f32, 0.0));
        }
        assert_eq!(client.history_len(), 4);
        assert_eq!(client.velocity_at(Tick::new(100)), Vec2f::new(100.0, 0.0));
    }
}
