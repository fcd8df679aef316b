use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use spleef_engine::store::Universe;
use spleef_engine::world::World;
use spleef_server::dispatch::WorldEvent;
use spleef_server::outbox::Effect;
use spleef_server::server::Server;
use spleef_server::settings::Settings;
use spleef_server::update::{HttpVersionSource, UpdateChecker};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Name of the generated world every arena lives in by default.
const WORLD: &str = "world";

#[tokio::main]
async fn main() {
    let demo_mode = std::env::args().any(|a| a == "--demo");
    let config: PathBuf = std::env::args()
        .skip_while(|a| a != "--config")
        .nth(1)
        .unwrap_or_else(|| "config.json".into())
        .into();
    let world_radius: i32 = std::env::args()
        .skip_while(|a| a != "--world-radius")
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(4);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".parse().unwrap()),
        )
        .init();

    if demo_mode {
        run_demo();
        return;
    }

    tracing::info!("Spleef arena server");

    let settings = if config.exists() {
        match Settings::load(&config) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to load settings: {:#}", e);
                return;
            }
        }
    } else {
        tracing::warn!("{} not found, using built-in defaults", config.display());
        Settings::defaults()
    };
    let settings = Arc::new(settings);

    // ── Generate the world arenas are built in ───────────────────────────
    let universe = Arc::new(Universe::new());
    let world = universe.insert_world(WORLD, World::new());
    tracing::info!("Generating flat world...");
    generate_flat_world(&world, world_radius);
    tracing::info!("World ready: {} chunks", world.chunk_count());

    let updates = settings.string("settings.updateUrl").map(|url| {
        let timeout = Duration::from_secs(settings.u64("settings.updateTimeoutSecs", 10));
        UpdateChecker::new(
            Arc::new(HttpVersionSource::new(url)),
            env!("CARGO_PKG_VERSION"),
            timeout,
        )
    });
    let mut server = Server::new(Arc::clone(&universe), Arc::clone(&settings), updates);
    tracing::info!("Arenas: {}", server.arenas().ids().join(", "));

    // ── Events arrive as JSON lines on stdin ─────────────────────────────
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<WorldEvent>();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match serde_json::from_str::<WorldEvent>(&line) {
                    Ok(event) => {
                        if event_tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!("Ignoring malformed event: {}", e),
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Reading events failed: {}", e);
                    break;
                }
            }
        }
    });

    // ── Tick loop with graceful shutdown ─────────────────────────────────
    let period = server.tick_period();
    let mut interval = tokio::time::interval(period);
    tracing::info!("Ticking every {:?}", period);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                while let Ok(event) = event_rx.try_recv() {
                    server.push(event);
                }
                for effect in server.tick() {
                    log_effect(&effect);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down...");
                break;
            }
        }
    }

    // ── Restore floors of running rounds before exit ─────────────────────
    for effect in server.shutdown() {
        log_effect(&effect);
    }
}

fn log_effect(effect: &Effect) {
    match effect {
        Effect::Message { to, text } => tracing::info!(target: "chat", "-> {}: {}", to, text),
        Effect::Broadcast { text } => tracing::info!(target: "chat", "{}", text),
        Effect::Teleport { player, to } => tracing::debug!(
            "teleport {} to {} {:.1} {:.1} {:.1}",
            player,
            to.world,
            to.x,
            to.y,
            to.z
        ),
    }
}

/// One scripted round on a small floor, no stdin, no network.
fn run_demo() {
    use serde_json::json;
    use spleef_engine::world::position::{BlockPos, Location};
    use spleef_server::game::Game;
    use spleef_server::player::Player;

    tracing::info!("Spleef demo round");

    let universe = Arc::new(Universe::new());
    let world = universe.insert_world(WORLD, World::new());
    generate_flat_world(&world, 2);

    let snapshot_dir = std::env::temp_dir().join(format!("spleef-demo-{}", std::process::id()));
    let settings = Arc::new(Settings::defaults());
    settings.set("settings.snapshotDir", json!(snapshot_dir.to_string_lossy()));
    settings.set(
        "arenas.demo",
        json!({
            "name": "Demo",
            "countdown": 1,
            "floor": { "world": WORLD, "min": [0, FLOOR_Y, 0], "max": [7, FLOOR_Y, 7] },
            "loose": { "world": WORLD, "min": [-8, 0, -8], "max": [15, FLOOR_Y - 2, 15] },
            "gameSpawn": { "world": WORLD, "x": 4.0, "y": (FLOOR_Y + 1) as f64, "z": 4.0 },
            "looseSpawn": { "world": WORLD, "x": 20.0, "y": (FLOOR_Y + 1) as f64, "z": 20.0 }
        }),
    );

    let mut server = Server::new(Arc::clone(&universe), Arc::clone(&settings), None);
    let home = Location::new(WORLD, 0.5, (FLOOR_Y + 1) as f64, -5.5);
    let alice = Player::new("alice", home.clone());
    let bob = Player::new("bob", home);

    server.arenas_mut().join("demo", &alice);
    server.arenas_mut().join("demo", &bob);
    if let Some(game) = server.arenas_mut().get_mut("demo") {
        game.countdown(&spleef_server::player::Sender::Console);
    }

    let tps = settings.u64("settings.ticksPerSecond", 20);
    for _ in 0..=tps {
        for effect in server.tick() {
            log_effect(&effect);
        }
    }

    // Alice digs the block under bob, bob falls through into the loose area.
    let under_bob = BlockPos::new(4, FLOOR_Y, 4);
    let cell = world.get_cell(under_bob);
    server.push(WorldEvent::BlockBreak {
        player: alice.clone(),
        block: spleef_server::game::BlockEdit {
            world: WORLD.into(),
            pos: under_bob,
            cell,
        },
    });
    server.push(WorldEvent::PlayerMove {
        player: bob.clone(),
        to: Location::new(WORLD, 4.5, (FLOOR_Y - 3) as f64, 4.5),
    });
    for effect in server.tick() {
        log_effect(&effect);
    }

    let restored = world.get_cell(under_bob);
    tracing::info!(
        "Floor cell under bob after the round: {} ({})",
        spleef_server::block::name(restored.material),
        if restored == cell { "restored" } else { "NOT restored" }
    );
    if let Some(game) = server.arenas().get("demo") {
        tracing::info!("Arena status after the round: {:?}", game.status());
    }
    let _ = std::fs::remove_dir_all(&snapshot_dir);
}

/// Height of the snow layer that arena floors are cut from.
const FLOOR_Y: i64 = 68;

/// Flat terrain: bedrock at y=60, stone y=61-63, dirt y=64, and a snow layer
/// at `FLOOR_Y` floating above the ground.
fn generate_flat_world(world: &World, chunk_radius: i32) {
    use spleef_engine::world::block::Cell;
    use spleef_engine::world::chunk::Chunk;
    use spleef_engine::world::position::ChunkPos;
    use spleef_server::block;

    for cx in -chunk_radius..chunk_radius {
        for cz in -chunk_radius..chunk_radius {
            let mut chunk = Chunk::new();
            chunk.fill_layer(60, Cell::of(block::BEDROCK));
            for y in 61..=63 {
                chunk.fill_layer(y, Cell::of(block::STONE));
            }
            chunk.fill_layer(64, Cell::of(block::DIRT));
            chunk.fill_layer(FLOOR_Y, Cell::of(block::SNOW_BLOCK));
            world.insert_chunk(ChunkPos::new(cx, cz), chunk);
        }
    }
}
