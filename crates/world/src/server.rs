//! Authoritative server world

use std::collections::{BTreeMap, HashMap};

use syncwire_bits::BitBuffer;
use syncwire_core::{ClientId, EntityId, Result, SyncError, Tick, Vec2f};
use syncwire_protocol::{
    frames, EntityCreated, EntityRef, InitialData, Keys, MapChange, Opcode, Packet, Rotation,
    UpdateHeader, UpdateReceived,
};
use syncwire_replication::{
    ChangeSource, EntityObserver, NullObserver, PropertyValue, ServerEntity, TemplateRegistry,
};

const DEFAULT_MAX_ENTITIES: usize = 1024;

/// Per-connection bookkeeping
#[derive(Debug, Default)]
pub struct Peer {
    /// Newest update tick this peer has acknowledged; deltas toward the
    /// peer are encoded against it
    pub last_acked: Tick,
    /// Count of dropped writes that violated ownership, for the
    /// connection layer to act on
    pub violations: u32,
    /// Latest owner-reported facing angle
    pub rotation: f32,
    /// Latest owner-reported held-key bitmask
    pub keys: u8,
}

/// The authoritative entity table and its per-peer delta state
pub struct ServerWorld {
    registry: TemplateRegistry,
    entities: BTreeMap<EntityId, ServerEntity>,
    peers: HashMap<ClientId, Peer>,
    tick: Tick,
    next_id: u16,
    max_entities: usize,
    observer: Box<dyn EntityObserver>,
}

impl ServerWorld {
    pub fn new(registry: TemplateRegistry) -> Self {
        Self {
            registry,
            entities: BTreeMap::new(),
            peers: HashMap::new(),
            tick: Tick::ZERO,
            next_id: 0,
            max_entities: DEFAULT_MAX_ENTITIES,
            observer: Box::new(NullObserver),
        }
    }

    pub fn set_observer(&mut self, observer: Box<dyn EntityObserver>) {
        self.observer = observer;
    }

    /// Cap the entity table; clamped so every id stays encodable as
    /// `u16 id + 1` on the wire
    pub fn set_entity_limit(&mut self, max_entities: usize) {
        self.max_entities = max_entities.min(u16::MAX as usize);
    }

    pub fn entity_limit(&self) -> usize {
        self.max_entities
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    pub fn entity(&self, id: EntityId) -> Option<&ServerEntity> {
        self.entities.get(&id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn peer(&self, client: ClientId) -> Option<&Peer> {
        self.peers.get(&client)
    }

    /// Advance the logical clock by one tick
    pub fn advance_tick(&mut self) -> Tick {
        self.tick = self.tick.next();
        self.tick
    }

    /// Register a connecting peer and build its `InitialData` packet
    pub fn connect(&mut self, client: ClientId) -> Packet {
        self.peers.insert(client, Peer::default());
        tracing::debug!("Client {} connected at tick {}", client.get(), self.tick);

        let mut body = BitBuffer::new();
        InitialData::new(client, self.tick, &self.registry).encode(&mut body);
        Packet::new(Opcode::InitialData, body)
    }

    pub fn disconnect(&mut self, client: ClientId) {
        self.peers.remove(&client);
    }

    /// Build the broadcast moving the session to a different map
    pub fn change_map(&self, name: &str) -> Packet {
        let mut body = BitBuffer::new();
        MapChange {
            name: name.to_string(),
        }
        .encode(&mut body);
        Packet::new(Opcode::MapChange, body)
    }

    /// Create an entity from a registered template, at its defaults
    pub fn add_entity(&mut self, template: &str, owner: ClientId) -> Result<EntityId> {
        self.spawn(template, owner, None)
    }

    /// Create an entity and overwrite its defaults from a full-state
    /// snapshot (the `EntityCreated` body format)
    pub fn add_entity_from_state(
        &mut self,
        template: &str,
        owner: ClientId,
        state: &mut BitBuffer,
    ) -> Result<EntityId> {
        self.spawn(template, owner, Some(state))
    }

    fn spawn(
        &mut self,
        template: &str,
        owner: ClientId,
        state: Option<&mut BitBuffer>,
    ) -> Result<EntityId> {
        if self.entities.len() >= self.max_entities.min(u16::MAX as usize) {
            return Err(SyncError::InvalidData(format!(
                "Entity limit reached ({})",
                self.max_entities
            )));
        }
        let template = self
            .registry
            .get(template)
            .ok_or_else(|| SyncError::UnknownTemplate(template.to_string()))?;

        // id u16::MAX is reserved: the wire encodes ids as `id + 1`
        while self.next_id == u16::MAX
            || self.entities.contains_key(&EntityId::new(self.next_id))
        {
            self.next_id = self.next_id.wrapping_add(1);
        }
        let id = EntityId::new(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);

        let mut entity = ServerEntity::new(id, owner, template);
        if let Some(buf) = state {
            entity.entity_mut().read_state(buf, self.tick)?;
        }
        self.entities.insert(id, entity);
        tracing::debug!(
            "Entity {} created (owner {}) at tick {}",
            id.get(),
            owner.get(),
            self.tick
        );
        Ok(id)
    }

    pub fn remove_entity(&mut self, id: EntityId) -> Option<Packet> {
        self.entities.remove(&id)?;
        tracing::debug!("Entity {} deleted at tick {}", id.get(), self.tick);

        let mut body = BitBuffer::new();
        EntityRef::new(id).encode(&mut body);
        Some(Packet::new(Opcode::EntityDeleted, body))
    }

    /// Toggle whether an entity participates in delta updates
    ///
    /// Returns the `ActivateEntity`/`DeactivateEntity` packet to broadcast,
    /// or `None` when the state did not change.
    pub fn set_entity_active(&mut self, id: EntityId, active: bool) -> Result<Option<Packet>> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(SyncError::UnknownEntity(id.get()))?;
        if entity.entity().is_active() == active {
            return Ok(None);
        }
        entity.entity_mut().set_active(active);

        let opcode = if active {
            Opcode::ActivateEntity
        } else {
            Opcode::DeactivateEntity
        };
        let mut body = BitBuffer::new();
        EntityRef::new(id).encode(&mut body);
        Ok(Some(Packet::new(opcode, body)))
    }

    /// Announce an entity with its full-state snapshot
    pub fn encode_created(&self, id: EntityId) -> Result<Packet> {
        let entity = self
            .entities
            .get(&id)
            .ok_or(SyncError::UnknownEntity(id.get()))?;

        let mut body = BitBuffer::new();
        EntityCreated {
            id,
            owner: entity.entity().owner(),
            template: entity.entity().template().name().to_string(),
        }
        .encode(&mut body);
        entity.entity().write_state(&mut body);
        Ok(Packet::new(Opcode::EntityCreated, body))
    }

    /// Authoritative write to an entity property at the current tick
    pub fn set_property(
        &mut self,
        id: EntityId,
        index: usize,
        value: PropertyValue,
    ) -> Result<()> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(SyncError::UnknownEntity(id.get()))?;
        entity
            .entity_mut()
            .set_property(index, value, self.tick, ChangeSource::Authority)?;
        self.observer.on_property_changed(id, index);
        Ok(())
    }

    pub fn set_entity_speed(&mut self, id: EntityId, speed: Vec2f) -> Result<()> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(SyncError::UnknownEntity(id.get()))?;
        entity.entity_mut().set_speed(speed);
        Ok(())
    }

    /// Encode the delta toward one peer, `None` when nothing changed
    ///
    /// Entities are walked in id order; an entity contributes a block only
    /// when the per-recipient filter leaves something to send. The header
    /// carries how many ticks behind the peer's acknowledgement is, which
    /// the client uses as its prediction replay window.
    pub fn encode_update(&self, for_client: ClientId) -> Option<Packet> {
        let peer = self.peers.get(&for_client)?;
        let since = peer.last_acked;

        let mut body = BitBuffer::new();
        UpdateHeader::from_server(self.tick, self.tick.since(since)).encode(&mut body);

        let mut any = false;
        for (id, entity) in &self.entities {
            if !entity.entity().is_active() || !entity.has_changes_for(since, for_client) {
                continue;
            }
            frames::write_entity_ref(&mut body, *id);
            entity.write_update(since, &mut body, for_client);
            any = true;
        }
        if !any {
            return None;
        }
        frames::write_list_end(&mut body);
        Some(Packet::new(Opcode::Update, body))
    }

    /// Decode an `Update` body received from a client
    ///
    /// Per entity block: an unknown id ends the frame (the positional
    /// format gives no way to size a block without the entity's template);
    /// an entity the sender does not own is decoded to keep the stream in
    /// sync, discarded, and counted against the peer; otherwise only
    /// `UNLOCKED` properties land.
    pub fn apply_client_update(&mut self, from: ClientId, body: &mut BitBuffer) -> Result<()> {
        if !self.peers.contains_key(&from) {
            return Err(SyncError::Protocol(format!(
                "Update from unknown client {}",
                from.get()
            )));
        }
        let header = UpdateHeader::decode(body, false);

        while let Some(id) = frames::read_entity_ref(body) {
            if body.overrun() {
                tracing::warn!("Client {}: truncated update frame", from.get());
                break;
            }
            let Some(entity) = self.entities.get_mut(&id) else {
                tracing::warn!(
                    "Client {}: update for unknown entity {}, dropping rest of frame",
                    from.get(),
                    id.get()
                );
                break;
            };

            if entity.entity().owner() != from {
                // decode to stay positioned, store nothing
                entity.entity_mut().apply_update_filtered(
                    body,
                    header.tick,
                    ChangeSource::Owner,
                    |_, _| false,
                )?;
                let owner = entity.entity().owner();
                if let Some(peer) = self.peers.get_mut(&from) {
                    peer.violations += 1;
                    tracing::warn!(
                        "Client {}: write to entity {} owned by {} dropped ({} violations)",
                        from.get(),
                        id.get(),
                        owner.get(),
                        peer.violations
                    );
                }
                continue;
            }

            let result = entity.apply_update(body, header.tick)?;
            if !result.changed.is_empty() {
                self.observer.on_entity_updated(id);
            }
        }
        Ok(())
    }

    /// Handle any client packet
    pub fn handle_packet(&mut self, from: ClientId, mut packet: Packet) -> Result<()> {
        match packet.opcode {
            Opcode::Ready => {
                tracing::debug!("Client {} ready", from.get());
                Ok(())
            }
            Opcode::Update => self.apply_client_update(from, &mut packet.body),
            Opcode::UpdateReceived => {
                let ack = UpdateReceived::decode(&mut packet.body);
                self.acknowledge(from, ack.tick);
                Ok(())
            }
            Opcode::Rotation => {
                let rotation = Rotation::decode(&mut packet.body);
                self.check_owner(from, rotation.id)?;
                if let Some(peer) = self.peers.get_mut(&from) {
                    peer.rotation = rotation.radians;
                }
                Ok(())
            }
            Opcode::Keys => {
                let keys = Keys::decode(&mut packet.body);
                self.check_owner(from, keys.id)?;
                if let Some(peer) = self.peers.get_mut(&from) {
                    peer.keys = keys.keys;
                }
                Ok(())
            }
            other => Err(SyncError::Protocol(format!(
                "Unexpected opcode {:?} from client {}",
                other,
                from.get()
            ))),
        }
    }

    /// Record a peer's newest applied tick (monotonic)
    pub fn acknowledge(&mut self, from: ClientId, tick: Tick) {
        if let Some(peer) = self.peers.get_mut(&from) {
            peer.last_acked = peer.last_acked.max(tick);
        }
    }

    fn check_owner(&mut self, from: ClientId, id: EntityId) -> Result<()> {
        let owner = self
            .entities
            .get(&id)
            .ok_or(SyncError::UnknownEntity(id.get()))?
            .entity()
            .owner();
        if owner != from {
            if let Some(peer) = self.peers.get_mut(&from) {
                peer.violations += 1;
            }
            return Err(SyncError::AuthorityViolation(format!(
                "Client {} does not own entity {}",
                from.get(),
                id.get()
            )));
        }
        Ok(())
    }
}
