//! syncd - Syncwire state-sync daemon
//!
//! Runs an authoritative [`ServerWorld`] against a [`ClientWorld`] over an
//! in-memory loopback, exercising the full protocol: handshake, entity
//! spawn, owner input deltas, authoritative corrections, prediction
//! reconciliation and acknowledgements.

use anyhow::Context;
use syncwire_config::SyncConfig;
use syncwire_core::{ClientId, Vec2f};
use syncwire_replication::{
    OpenMap, PropertyDef, PropertyFlags, PropertyKind, PropertyValue, Template, TemplateRegistry,
};
use syncwire_world::{ClientWorld, Loopback, ServerWorld};
use tracing::{info, warn, Level};

const CONFIG_PATH: &str = "syncd.conf";
const DEMO_TICKS: u32 = 20;

const POSITION: usize = 0;
const VELOCITY: usize = 1;
const HEALTH: usize = 2;
const NAME: usize = 3;

fn builtin_player_template() -> Template {
    Template::new(
        "player",
        vec![
            PropertyDef {
                name: "position".into(),
                kind: PropertyKind::Vec2F,
                flags: PropertyFlags::UNLOCKED
                    | PropertyFlags::OWNER_UPDATES
                    | PropertyFlags::PREDICT,
                bit_width: 32,
                default: PropertyValue::Vec2F(Vec2f::ZERO),
            },
            PropertyDef {
                name: "velocity".into(),
                kind: PropertyKind::Vec2F,
                flags: PropertyFlags::UNLOCKED,
                bit_width: 32,
                default: PropertyValue::Vec2F(Vec2f::ZERO),
            },
            PropertyDef {
                name: "health".into(),
                kind: PropertyKind::Int,
                flags: PropertyFlags::NONE,
                bit_width: 8,
                default: PropertyValue::Int(100),
            },
            PropertyDef {
                name: "name".into(),
                kind: PropertyKind::String,
                flags: PropertyFlags::NONE,
                bit_width: 32,
                default: PropertyValue::String(String::new()),
            },
            PropertyDef {
                name: "alive".into(),
                kind: PropertyKind::Bool,
                flags: PropertyFlags::NONE,
                bit_width: 1,
                default: PropertyValue::Bool(true),
            },
        ],
    )
    .expect("builtin template is valid")
}

/// Build a registry from the template directory, falling back to the
/// builtin player template when it is empty or missing
fn build_registry(config: &SyncConfig) -> anyhow::Result<TemplateRegistry> {
    let registry = TemplateRegistry::new();

    let mut loaded = 0usize;
    if let Ok(entries) = std::fs::read_dir(&config.template_dir) {
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let template = Template::load(&path)
                .with_context(|| format!("loading template {}", path.display()))?;
            info!("Loaded template '{}' from {}", template.name(), path.display());
            registry.insert(template);
            loaded += 1;
        }
    }
    if loaded == 0 {
        info!("No templates in '{}', using builtin player", config.template_dir);
        registry.insert(builtin_player_template());
    }
    Ok(registry)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .init();

    info!("🚀 syncd starting up...");

    let config = match SyncConfig::load_from_file(CONFIG_PATH) {
        Ok(config) => {
            info!("✓ Configuration loaded from {}", CONFIG_PATH);
            config
        }
        Err(e) => {
            warn!("Failed to load {}: {} - using defaults", CONFIG_PATH, e);
            SyncConfig::default()
        }
    };
    config.display();

    let mut server = ServerWorld::new(build_registry(&config)?);
    server.set_entity_limit(config.max_entities);

    let mut client = ClientWorld::new(build_registry(&config)?, OpenMap);
    client.set_history_limit(config.prediction_history);
    client.set_schema_check(config.schema_check);

    let mut link = Loopback::new();
    let client_id = ClientId::new(1);

    // handshake and spawn
    link.send_to_client(server.connect(client_id));
    link.send_to_client(server.change_map("overworld"));
    let id = server
        .add_entity("player", client_id)
        .context("spawning player entity")?;
    server.set_property(id, NAME, PropertyValue::String("demo".into()))?;
    link.send_to_client(server.encode_created(id)?);
    pump(&mut server, &mut client, &mut link, client_id)?;
    info!("✓ Client {} connected, entity {} spawned", client_id.get(), id.get());

    let velocity = Vec2f::new(1.5, 0.0);
    for _ in 0..DEMO_TICKS {
        server.advance_tick();
        client.advance_tick();

        // owner input: move the player, report the velocity
        client.record_speed(id, velocity)?;
        let position = client
            .entity(id)
            .and_then(|e| e.entity().property(POSITION))
            .and_then(|p| p.as_vec2f())
            .unwrap_or(Vec2f::ZERO);
        client.set_local_property(id, POSITION, PropertyValue::Vec2F(position + velocity))?;
        client.set_local_property(id, VELOCITY, PropertyValue::Vec2F(velocity))?;
        if let Some(update) = client.encode_update() {
            link.send_to_server(update);
        }

        // authoritative change every fifth tick
        if server.tick().get() % 5 == 0 {
            let health = server
                .entity(id)
                .and_then(|e| e.entity().property(HEALTH))
                .and_then(|p| p.as_int())
                .unwrap_or(0);
            server.set_property(id, HEALTH, PropertyValue::Int(health - 1))?;
        }

        pump(&mut server, &mut client, &mut link, client_id)?;

        if let Some(update) = server.encode_update(client_id) {
            link.send_to_client(update);
        } else if config.log_updates {
            tracing::debug!(
                "Tick {}: nothing to send (owner changes suppressed)",
                server.tick()
            );
        }
        pump(&mut server, &mut client, &mut link, client_id)?;
    }

    let final_pos = client
        .entity(id)
        .and_then(|e| e.entity().property(POSITION))
        .and_then(|p| p.as_vec2f())
        .unwrap_or(Vec2f::ZERO);
    let final_health = server
        .entity(id)
        .and_then(|e| e.entity().property(HEALTH))
        .and_then(|p| p.as_int())
        .unwrap_or(0);
    info!(
        "Demo finished after {} ticks: position ({:.1}, {:.1}), health {}",
        DEMO_TICKS, final_pos.x, final_pos.y, final_health
    );
    info!("👋 syncd shutting down");
    Ok(())
}

/// Drain both directions of the loopback until quiet
fn pump(
    server: &mut ServerWorld,
    client: &mut ClientWorld<OpenMap>,
    link: &mut Loopback,
    client_id: ClientId,
) -> anyhow::Result<()> {
    loop {
        let mut quiet = true;
        while let Some(packet) = link.recv_at_server() {
            quiet = false;
            server.handle_packet(client_id, packet?)?;
        }
        while let Some(packet) = link.recv_at_client() {
            quiet = false;
            if let Some(reply) = client.handle_packet(packet?)? {
                link.send_to_server(reply);
            }
        }
        if quiet {
            return Ok(());
        }
    }
}
