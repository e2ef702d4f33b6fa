//! Client-side mirror world

use std::collections::BTreeMap;

use syncwire_bits::BitBuffer;
use syncwire_core::{ClientId, EntityId, Result, SyncError, Tick, Vec2f};
use syncwire_protocol::{
    frames, EntityCreated, EntityRef, InitialData, MapChange, Opcode, Packet, UpdateHeader,
    UpdateReceived,
};
use syncwire_replication::{
    ChangeSource, ClientEntity, CollisionQuery, EntityObserver, NullObserver, PropertyValue,
    TemplateRegistry,
};

const DEFAULT_HISTORY_LIMIT: usize = 64;

/// The client's mirror of the server entity table
///
/// Both sides hold the same template registry; the handshake digest check
/// guards that assumption. `M` supplies collision queries for prediction
/// replay.
pub struct ClientWorld<M: CollisionQuery> {
    registry: TemplateRegistry,
    entities: BTreeMap<EntityId, ClientEntity>,
    map: M,
    tick: Tick,
    local_client: ClientId,
    /// Tick our last outbound update was encoded against
    last_sent: Tick,
    /// Newest server tick we have applied and acknowledged
    server_acked: Tick,
    map_name: String,
    history_limit: usize,
    schema_check: bool,
    observer: Box<dyn EntityObserver>,
}

impl<M: CollisionQuery> ClientWorld<M> {
    pub fn new(registry: TemplateRegistry, map: M) -> Self {
        Self {
            registry,
            entities: BTreeMap::new(),
            map,
            tick: Tick::ZERO,
            local_client: ClientId::SERVER,
            last_sent: Tick::ZERO,
            server_acked: Tick::ZERO,
            map_name: String::new(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            schema_check: true,
            observer: Box::new(NullObserver),
        }
    }

    pub fn set_observer(&mut self, observer: Box<dyn EntityObserver>) {
        self.observer = observer;
    }

    pub fn set_history_limit(&mut self, limit: usize) {
        self.history_limit = limit.max(1);
    }

    /// Disable the connect-time schema digest check (wire-compat runs
    /// against peers that do not send one)
    pub fn set_schema_check(&mut self, enabled: bool) {
        self.schema_check = enabled;
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn local_client(&self) -> ClientId {
        self.local_client
    }

    pub fn map_name(&self) -> &str {
        &self.map_name
    }

    pub fn entity(&self, id: EntityId) -> Option<&ClientEntity> {
        self.entities.get(&id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn advance_tick(&mut self) -> Tick {
        self.tick = self.tick.next();
        self.tick
    }

    /// Handle `InitialData`: adopt the server clock, verify schemas, and
    /// answer `Ready`
    pub fn handle_initial_data(&mut self, body: &mut BitBuffer) -> Result<Packet> {
        let hello = InitialData::decode(body);
        if self.schema_check {
            hello.verify(&self.registry)?;
        }
        self.local_client = hello.client_id;
        self.tick = hello.tick;
        self.last_sent = hello.tick;
        self.server_acked = hello.tick;
        tracing::debug!(
            "Connected as client {} at tick {}",
            hello.client_id.get(),
            hello.tick
        );
        Ok(Packet::empty(Opcode::Ready))
    }

    /// Local write to an owned entity, recorded as owner-originated
    pub fn set_local_property(
        &mut self,
        id: EntityId,
        index: usize,
        value: PropertyValue,
    ) -> Result<()> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(SyncError::UnknownEntity(id.get()))?;
        if entity.entity().owner() != self.local_client {
            return Err(SyncError::AuthorityViolation(format!(
                "Entity {} is not locally owned",
                id.get()
            )));
        }
        entity
            .entity_mut()
            .set_property(index, value, self.tick, ChangeSource::Owner)?;
        self.observer.on_property_changed(id, index);
        Ok(())
    }

    /// Record this tick's velocity for a locally owned entity
    pub fn record_speed(&mut self, id: EntityId, speed: Vec2f) -> Result<()> {
        let tick = self.tick;
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(SyncError::UnknownEntity(id.get()))?;
        entity.record_speed(tick, speed);
        Ok(())
    }

    /// Encode the outbound delta for locally owned entities
    pub fn encode_update(&mut self) -> Option<Packet> {
        let since = self.last_sent;
        let mut body = BitBuffer::new();
        UpdateHeader::from_client(self.tick).encode(&mut body);

        let mut any = false;
        for (id, entity) in &self.entities {
            if entity.entity().owner() != self.local_client
                || !entity.entity().is_active()
                || !entity.entity().has_changed(since)
            {
                continue;
            }
            frames::write_entity_ref(&mut body, *id);
            entity.write_update(since, &mut body);
            any = true;
        }
        if !any {
            return None;
        }
        frames::write_list_end(&mut body);
        self.last_sent = self.tick;
        Some(Packet::new(Opcode::Update, body))
    }

    /// Decode a server `Update` body and answer with an acknowledgement
    ///
    /// The header's latency field sizes the prediction replay window for
    /// predicted properties. An unknown entity id ends the frame: without
    /// the entity there is no template to size its block. A frame dropped
    /// partway through is NOT acknowledged — the server keeps encoding the
    /// lost tail against the older acked tick and retransmits it.
    pub fn apply_server_update(&mut self, body: &mut BitBuffer) -> Result<Option<Packet>> {
        let header = UpdateHeader::decode(body, true);
        let latency = header.owner_latency.unwrap_or(0);

        while let Some(id) = frames::read_entity_ref(body) {
            if body.overrun() {
                tracing::warn!("Truncated server update frame at tick {}", header.tick);
                return Ok(None);
            }
            let Some(entity) = self.entities.get_mut(&id) else {
                tracing::warn!(
                    "Update for unknown entity {}, dropping rest of frame unacked",
                    id.get()
                );
                return Ok(None);
            };

            let result = entity.apply_update(body, header.tick, latency, self.tick, &self.map)?;
            if !result.changed.is_empty() {
                self.observer.on_entity_updated(id);
            }
        }

        self.server_acked = self.server_acked.max(header.tick);
        for entity in self.entities.values_mut() {
            entity.drop_prediction_data(header.tick);
        }

        let mut ack = BitBuffer::new();
        UpdateReceived::new(header.tick).encode(&mut ack);
        Ok(Some(Packet::new(Opcode::UpdateReceived, ack)))
    }

    /// Instantiate an entity announced by `EntityCreated`
    pub fn spawn_entity(&mut self, body: &mut BitBuffer) -> Result<EntityId> {
        let frame = EntityCreated::decode(body);
        let template = self
            .registry
            .get(&frame.template)
            .ok_or_else(|| SyncError::UnknownTemplate(frame.template.clone()))?;

        let mut entity =
            ClientEntity::new(frame.id, frame.owner, template, self.history_limit);
        entity.entity_mut().read_state(body, self.tick)?;
        tracing::debug!(
            "Entity {} spawned from template '{}' (owner {})",
            frame.id.get(),
            frame.template,
            frame.owner.get()
        );
        self.entities.insert(frame.id, entity);
        self.observer.on_entity_updated(frame.id);
        Ok(frame.id)
    }

    pub fn despawn_entity(&mut self, id: EntityId) -> Result<()> {
        self.entities
            .remove(&id)
            .ok_or(SyncError::UnknownEntity(id.get()))?;
        tracing::debug!("Entity {} despawned", id.get());
        Ok(())
    }

    /// Handle any server packet; some handlers produce a reply
    pub fn handle_packet(&mut self, mut packet: Packet) -> Result<Option<Packet>> {
        match packet.opcode {
            Opcode::InitialData => self.handle_initial_data(&mut packet.body).map(Some),
            Opcode::MapChange => {
                let frame = MapChange::decode(&mut packet.body);
                tracing::debug!("Map changed to '{}'", frame.name);
                self.map_name = frame.name;
                Ok(None)
            }
            Opcode::EntityCreated => {
                self.spawn_entity(&mut packet.body)?;
                Ok(None)
            }
            Opcode::EntityDeleted => {
                let frame = EntityRef::decode(&mut packet.body);
                self.despawn_entity(frame.id)?;
                Ok(None)
            }
            Opcode::ActivateEntity | Opcode::DeactivateEntity => {
                let frame = EntityRef::decode(&mut packet.body);
                let entity = self
                    .entities
                    .get_mut(&frame.id)
                    .ok_or(SyncError::UnknownEntity(frame.id.get()))?;
                entity
                    .entity_mut()
                    .set_active(packet.opcode == Opcode::ActivateEntity);
                Ok(None)
            }
            Opcode::Update => self.apply_server_update(&mut packet.body),
            other => Err(SyncError::Protocol(format!(
                "Unexpected opcode {:?} from server",
                other
            ))),
        }
    }
}
