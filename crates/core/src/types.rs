//! Core type definitions

use serde::{Deserialize, Serialize};

/// Entity ID (16-bit unsigned)
///
/// The wire format reserves value 0 as the entity-list terminator, so ids
/// are transmitted as `id + 1` and must stay below `u16::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u16);

impl EntityId {
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u16 {
        self.0
    }
}

impl From<u16> for EntityId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

/// Client ID (16-bit unsigned)
///
/// The server itself uses [`ClientId::SERVER`]; connected peers get ids
/// starting from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub u16);

impl ClientId {
    /// The authoritative side. Entities owned by the server are never
    /// writable by any client.
    pub const SERVER: ClientId = ClientId(0);

    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u16 {
        self.0
    }
}

impl From<u16> for ClientId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

/// Logical simulation tick, the protocol's monotonic clock
///
/// All change tracking and delta encoding is expressed against ticks: a
/// property records the tick it last changed at, an update carries the tick
/// it was encoded at, and a peer acknowledges the newest tick it has applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tick(pub u32);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    pub const fn new(tick: u32) -> Self {
        Self(tick)
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    /// The following tick
    pub fn next(&self) -> Tick {
        Tick(self.0.wrapping_add(1))
    }

    /// Ticks elapsed since `earlier` (zero if `earlier` is newer)
    pub fn since(&self, earlier: Tick) -> u32 {
        self.0.saturating_sub(earlier.0)
    }

    /// The tick `n` ticks before this one, floored at zero
    pub fn back(&self, n: u32) -> Tick {
        Tick(self.0.saturating_sub(n))
    }
}

impl std::fmt::Display for Tick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
