//! Host/scripting notification and map-query seams
//!
//! The replication core never calls into a scripting runtime or a map
//! loader directly; these two traits are the entire surface it depends on.

use syncwire_core::{EntityId, Vec2f};

/// Change notifications delivered to the host (scripting layer, game logic)
///
/// `on_property_changed` fires for individual local mutations.
/// Bulk-decoding an incoming update deliberately suppresses the per-field
/// callback and delivers a single `on_entity_updated` instead, so one
/// packet cannot cascade into dozens of script invocations.
pub trait EntityObserver {
    fn on_property_changed(&mut self, _entity: EntityId, _index: usize) {}

    fn on_entity_updated(&mut self, _entity: EntityId) {}
}

/// Observer that ignores every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl EntityObserver for NullObserver {}

/// Collision query used during prediction replay
///
/// The map itself (geometry, height fields, loading) is an external
/// collaborator; dead reckoning only ever asks whether a position can be
/// occupied.
pub trait CollisionQuery {
    fn is_accessible(&self, pos: Vec2f) -> bool;
}

/// A map with no obstacles; prediction replays unclipped
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenMap;

impl CollisionQuery for OpenMap {
    fn is_accessible(&self, _pos: Vec2f) -> bool {
        true
    }
}
