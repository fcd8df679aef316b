//! Registry, dispatcher and floor persistence tests: events go in through the
//! dispatcher (or the whole server tick) and the block store, effects and
//! snapshot files are checked on the way out.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use spleef_engine::store::{BlockStore, Universe, WorldId};
use spleef_engine::world::World;
use spleef_engine::world::block::Cell;
use spleef_engine::world::position::{BlockPos, Location};
use tokio::sync::mpsc::UnboundedReceiver;

use spleef_server::block;
use spleef_server::dispatch::{Dispatcher, EventQueue, WorldEvent};
use spleef_server::game::{ArenaContext, ArenaSession, BlockEdit, ClickAction, Game, Status, Verdict};
use spleef_server::outbox::{self, Effect};
use spleef_server::player::{Player, Sender};
use spleef_server::registry::Arenas;
use spleef_server::server::Server;
use spleef_server::settings::Settings;
use spleef_server::snapshots::SnapshotStore;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const SNOW: Cell = Cell::of(block::SNOW_BLOCK);
const FLOOR_Y: i64 = 10;

struct Fixture {
    universe: Arc<Universe>,
    settings: Arc<Settings>,
    ctx: ArenaContext,
    effects: UnboundedReceiver<Effect>,
}

impl Fixture {
    fn cell(&self, x: i64, y: i64, z: i64) -> Cell {
        self.universe.read_cell(&w(), BlockPos::new(x, y, z)).unwrap()
    }

    fn dig(&self, x: i64, z: i64) {
        self.universe
            .write_cell(&w(), BlockPos::new(x, FLOOR_Y, z), Cell::EMPTY)
            .unwrap();
    }

    fn arenas(&self) -> Arenas {
        Arenas::from_settings(&self.ctx)
    }

    fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.ctx.store.clone(),
            Arc::clone(&self.settings),
            self.ctx.outbox.clone(),
            None,
        )
    }

    fn effects(&mut self) -> Vec<Effect> {
        outbox::drain(&mut self.effects)
    }
}

fn w() -> WorldId {
    WorldId::from("w")
}

fn floor(x0: i64, z0: i64) -> Value {
    json!({ "world": "w", "min": [x0, FLOOR_Y, z0], "max": [x0 + 3, FLOOR_Y, z0 + 3] })
}

/// Two arenas side by side: "arena1" with its floor at 0..=3 and "arena2" at
/// 20..=23, both starting without countdown. Snow everywhere from -5 to 30.
fn fixture(snapshots: Option<PathBuf>) -> Fixture {
    let universe = Arc::new(Universe::new());
    let world = World::new();
    for x in -5..=30 {
        for z in -5..=30 {
            world.set_cell(BlockPos::new(x, FLOOR_Y, z), SNOW);
        }
    }
    universe.insert_world("w", world);

    let settings = Arc::new(Settings::defaults());
    settings.set("arenas.default.countdown", json!(0));
    settings.set(
        "arenas.arena1",
        json!({
            "name": "Arena1",
            "floor": floor(0, 0),
            "loose": { "world": "w", "min": [-5, 0, -5], "max": [8, FLOOR_Y - 2, 8] }
        }),
    );
    settings.set("arenas.arena2", json!({ "name": "Arena2", "floor": floor(20, 20) }));

    let (outbox, effects) = outbox::channel();
    let ctx = ArenaContext {
        store: universe.clone(),
        settings: Arc::clone(&settings),
        outbox,
        snapshots: snapshots.map(SnapshotStore::new),
    };
    Fixture {
        universe,
        settings,
        ctx,
        effects,
    }
}

/// A fresh, empty directory under the system temp dir.
fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("spleef-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn player(name: &str) -> Player {
    Player::new(name, Location::new("w", 100.5, 65.0, 100.5))
}

fn edit(x: i64, y: i64, z: i64, cell: Cell) -> BlockEdit {
    BlockEdit {
        world: w(),
        pos: BlockPos::new(x, y, z),
        cell,
    }
}

fn start(arenas: &mut Arenas, id: &str, players: &[&Player]) {
    for p in players {
        assert!(arenas.join(id, p));
    }
    let game = arenas.get_mut(id).unwrap();
    assert!(game.countdown(&Sender::Console));
    assert_eq!(game.status(), Status::Started);
}

fn messages_to<'a>(effects: &'a [Effect], p: &Player) -> Vec<&'a str> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Message { to, text } if *to == p.id => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[test]
fn registry_loads_enabled_arenas_without_the_template() {
    let fx = fixture(None);
    fx.settings.set(
        "arenas.arena3",
        json!({ "name": "Arena3", "enabled": false, "floor": floor(40, 40) }),
    );
    let arenas = fx.arenas();

    assert_eq!(arenas.len(), 2);
    assert_eq!(arenas.ids(), vec!["arena1".to_string(), "arena2".to_string()]);
    assert!(arenas.get("ARENA1").is_some());
    assert!(arenas.get("default").is_none());
    assert!(arenas.get("arena3").is_none());
}

#[test]
fn registry_falls_back_to_the_id_on_name_mismatch() {
    let fx = fixture(None);
    fx.settings.set("arenas.arena2.name", json!("Something Else"));
    let arenas = fx.arenas();
    assert_eq!(arenas.get("arena2").unwrap().name(), "arena2");
    assert_eq!(arenas.get("arena1").unwrap().name(), "Arena1");
}

#[test]
fn duplicate_ids_and_overlapping_floors_are_rejected() {
    let fx = fixture(None);
    fx.settings.set("arenas.overlap", json!({ "floor": floor(2, 2) }));
    fx.settings.set("arenas.far", json!({ "floor": floor(60, 60) }));
    let mut arenas = Arenas::new(fx.ctx.outbox.clone());

    assert!(arenas.insert(Box::new(ArenaSession::new("Arena1", fx.ctx.clone()))).is_ok());
    assert!(arenas.insert(Box::new(ArenaSession::new("arena1", fx.ctx.clone()))).is_err());
    assert!(arenas.insert(Box::new(ArenaSession::new("Overlap", fx.ctx.clone()))).is_err());
    assert!(arenas.insert(Box::new(ArenaSession::new("Far", fx.ctx.clone()))).is_ok());
    assert_eq!(arenas.len(), 2);

    assert!(arenas.remove("far").is_some());
    assert_eq!(arenas.len(), 1);
}

#[test]
fn a_player_is_in_one_arena_at_a_time() {
    let mut fx = fixture(None);
    let mut arenas = fx.arenas();
    let a = player("a");

    assert!(arenas.join("arena1", &a));
    assert!(!arenas.join("arena2", &a));
    assert!(!arenas.watch("arena2", &a));
    assert!(!arenas.join("arena1", &a));
    assert_eq!(arenas.session_of(a.id), arenas.key("arena1"));

    assert!(arenas.leave(&a));
    assert!(arenas.session_of(a.id).is_none());
    assert!(arenas.watch("arena2", &a));
    assert!(!arenas.join("arena1", &a));
    assert!(arenas.back(&a));
    assert!(arenas.join("arena1", &a));

    fx.effects();
    assert!(!arenas.join("nowhere", &player("b")));
    assert!(messages_to(&fx.effects(), &player("b"))
        .iter()
        .any(|t| t.contains("no arena named")));
}

#[test]
fn shutdown_stops_running_rounds() {
    let fx = fixture(None);
    let mut arenas = fx.arenas();
    let (a, b) = (player("a"), player("b"));
    start(&mut arenas, "arena1", &[&a, &b]);
    fx.dig(1, 1);

    arenas.shutdown();
    assert_eq!(arenas.get("arena1").unwrap().status(), Status::New);
    assert_eq!(fx.cell(1, FLOOR_Y, 1), SNOW);
}

#[test]
fn reload_picks_up_a_moved_floor() {
    let fx = fixture(None);
    let mut arenas = fx.arenas();
    fx.settings.set("arenas.arena2.floor", floor(25, 25));
    arenas.reload();
    let floor = arenas.get("arena2").unwrap().floor().unwrap();
    assert_eq!(floor.min(), BlockPos::new(25, FLOOR_Y, 25));
}

#[test]
fn reload_refuses_a_floor_moved_onto_another_arena() {
    let fx = fixture(None);
    let mut arenas = fx.arenas();
    fx.settings.set("arenas.arena2.floor", floor(2, 2));
    arenas.reload();
    let kept = arenas.get("arena2").unwrap().floor().unwrap();
    assert_eq!(kept.min(), BlockPos::new(20, FLOOR_Y, 20));

    // Both rounds restore exactly what they captured.
    let (a, b, c, d) = (player("a"), player("b"), player("c"), player("d"));
    start(&mut arenas, "arena1", &[&a, &b]);
    fx.dig(2, 2);
    start(&mut arenas, "arena2", &[&c, &d]);
    assert!(arenas.get_mut("arena1").unwrap().stop(None));
    assert!(arenas.get_mut("arena2").unwrap().stop(None));
    assert_eq!(fx.cell(2, FLOOR_Y, 2), SNOW);

    // Once the clash is gone the move goes through.
    fx.settings.set("arenas.arena2.floor", floor(25, 25));
    arenas.reload();
    let moved = arenas.get("arena2").unwrap().floor().unwrap();
    assert_eq!(moved.min(), BlockPos::new(25, FLOOR_Y, 25));
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

#[test]
fn block_changes_outside_arenas_are_committed() {
    let fx = fixture(None);
    let mut arenas = fx.arenas();
    let mut dispatcher = fx.dispatcher();
    let stranger = player("stranger");

    let verdict = dispatcher.dispatch(
        &mut arenas,
        &WorldEvent::BlockBreak {
            player: stranger.clone(),
            block: edit(15, FLOOR_Y, 15, SNOW),
        },
    );
    assert_eq!(verdict, Verdict::Allow);
    assert_eq!(fx.cell(15, FLOOR_Y, 15), Cell::EMPTY);

    dispatcher.dispatch(
        &mut arenas,
        &WorldEvent::BlockPlace {
            player: stranger,
            block: edit(15, FLOOR_Y + 1, 15, block::wool(4)),
        },
    );
    assert_eq!(fx.cell(15, FLOOR_Y + 1, 15), block::wool(4));
}

#[test]
fn vetoed_block_changes_never_reach_the_store() {
    let fx = fixture(None);
    let mut arenas = fx.arenas();
    let mut dispatcher = fx.dispatcher();
    let a = player("a");
    arenas.join("arena1", &a);

    let brk = WorldEvent::BlockBreak {
        player: a.clone(),
        block: edit(1, FLOOR_Y, 1, SNOW),
    };
    assert_eq!(dispatcher.dispatch(&mut arenas, &brk), Verdict::Cancel);
    assert_eq!(fx.cell(1, FLOOR_Y, 1), SNOW);

    let place = WorldEvent::BlockPlace {
        player: a.clone(),
        block: edit(1, FLOOR_Y + 1, 1, SNOW),
    };
    assert_eq!(dispatcher.dispatch(&mut arenas, &place), Verdict::Cancel);
    assert_eq!(fx.cell(1, FLOOR_Y + 1, 1), Cell::EMPTY);

    let b = player("b");
    arenas.join("arena1", &b);
    arenas.get_mut("arena1").unwrap().countdown(&Sender::Console);
    assert_eq!(dispatcher.dispatch(&mut arenas, &brk), Verdict::Allow);
    assert_eq!(fx.cell(1, FLOOR_Y, 1), Cell::EMPTY);
}

#[test]
fn teleport_is_vetoed_for_players_in_a_round() {
    let mut fx = fixture(None);
    let mut arenas = fx.arenas();
    let mut dispatcher = fx.dispatcher();
    let (a, b, stranger) = (player("a"), player("b"), player("stranger"));
    start(&mut arenas, "arena1", &[&a, &b]);
    fx.effects();

    let to = Location::new("w", 500.0, 70.0, 500.0);
    let verdict = dispatcher.dispatch(
        &mut arenas,
        &WorldEvent::PlayerTeleport {
            player: a.clone(),
            to: to.clone(),
        },
    );
    assert_eq!(verdict, Verdict::Cancel);
    assert!(messages_to(&fx.effects(), &a)
        .iter()
        .any(|t| t.contains("may not teleport")));

    let verdict = dispatcher.dispatch(&mut arenas, &WorldEvent::PlayerTeleport { player: stranger, to });
    assert_eq!(verdict, Verdict::Allow);
}

#[test]
fn game_mode_change_is_denied_to_arena_players_only() {
    let fx = fixture(None);
    let mut arenas = fx.arenas();
    let mut dispatcher = fx.dispatcher();
    let (a, watcher, stranger) = (player("a"), player("watcher"), player("stranger"));
    arenas.join("arena1", &a);
    arenas.watch("arena1", &watcher);

    let change = |p: &Player| WorldEvent::PlayerGameModeChange {
        player: p.clone(),
        mode: "creative".into(),
    };
    assert_eq!(dispatcher.dispatch(&mut arenas, &change(&a)), Verdict::Cancel);
    assert_eq!(dispatcher.dispatch(&mut arenas, &change(&watcher)), Verdict::Allow);
    assert_eq!(dispatcher.dispatch(&mut arenas, &change(&stranger)), Verdict::Allow);
}

#[test]
fn queued_events_are_dispatched_in_order() {
    let fx = fixture(None);
    let mut arenas = fx.arenas();
    let mut dispatcher = fx.dispatcher();
    let stranger = player("stranger");
    let spot = edit(15, FLOOR_Y + 1, 15, block::wool(1));

    let mut queue = EventQueue::new();
    queue.push(WorldEvent::BlockPlace {
        player: stranger.clone(),
        block: spot.clone(),
    });
    queue.push(WorldEvent::BlockBreak {
        player: stranger,
        block: spot,
    });
    assert_eq!(queue.len(), 2);

    let done = dispatcher.drain(&mut arenas, &mut queue);
    assert!(queue.is_empty());
    assert_eq!(done.len(), 2);
    assert!(matches!(done[0].event, WorldEvent::BlockPlace { .. }));
    assert!(done.iter().all(|d| d.verdict == Verdict::Allow));
    assert_eq!(fx.cell(15, FLOOR_Y + 1, 15), Cell::EMPTY);
}

#[test]
fn falling_through_the_floor_ends_the_round() {
    let mut fx = fixture(None);
    let mut arenas = fx.arenas();
    let mut dispatcher = fx.dispatcher();
    let (a, b) = (player("a"), player("b"));
    start(&mut arenas, "arena1", &[&a, &b]);

    dispatcher.dispatch(
        &mut arenas,
        &WorldEvent::BlockBreak {
            player: a.clone(),
            block: edit(2, FLOOR_Y, 2, SNOW),
        },
    );
    assert_eq!(fx.cell(2, FLOOR_Y, 2), Cell::EMPTY);

    dispatcher.dispatch(
        &mut arenas,
        &WorldEvent::PlayerMove {
            player: b.clone(),
            to: Location::new("w", 2.5, 4.0, 2.5),
        },
    );
    assert_eq!(arenas.get("arena1").unwrap().status(), Status::New);
    assert_eq!(fx.cell(2, FLOOR_Y, 2), SNOW);
    assert!(fx.effects().iter().any(
        |e| matches!(e, Effect::Broadcast { text } if text.contains("a won the game!"))
    ));
}

#[test]
fn quitter_is_sent_home_on_next_login() {
    let mut fx = fixture(None);
    let mut arenas = fx.arenas();
    let mut dispatcher = fx.dispatcher();
    let (a, b, c) = (player("a"), player("b"), player("c"));
    start(&mut arenas, "arena1", &[&a, &b, &c]);

    dispatcher.dispatch(&mut arenas, &WorldEvent::PlayerQuit { player: c.clone() });
    assert!(arenas.session_of(c.id).is_none());
    fx.effects();

    dispatcher.dispatch(&mut arenas, &WorldEvent::PlayerJoin { player: c.clone() });
    let effects = fx.effects();
    assert!(effects.contains(&Effect::Teleport {
        player: c.id,
        to: c.location.clone(),
    }));
}

#[test]
fn interact_without_a_block_is_allowed() {
    let fx = fixture(None);
    let mut arenas = fx.arenas();
    let mut dispatcher = fx.dispatcher();
    let (a, b) = (player("a"), player("b"));
    start(&mut arenas, "arena1", &[&a, &b]);

    let verdict = dispatcher.dispatch(
        &mut arenas,
        &WorldEvent::PlayerInteract {
            player: a,
            action: ClickAction::LeftClickAir,
            block: None,
        },
    );
    assert_eq!(verdict, Verdict::Allow);
}

#[test]
fn world_events_parse_from_json_lines() {
    let a = player("a");
    let kick: WorldEvent = serde_json::from_value(json!({
        "type": "player_kick",
        "player": serde_json::to_value(&a).unwrap(),
        "reason": "afk"
    }))
    .unwrap();
    assert_eq!(
        kick,
        WorldEvent::PlayerKick {
            player: a.clone(),
            reason: "afk".into()
        }
    );

    let click: WorldEvent = serde_json::from_str(&format!(
        r#"{{"type":"player_interact","player":{},"action":"left_click_air"}}"#,
        serde_json::to_string(&a).unwrap()
    ))
    .unwrap();
    assert_eq!(click.player(), &a);
    assert!(matches!(
        click,
        WorldEvent::PlayerInteract {
            action: ClickAction::LeftClickAir,
            block: None,
            ..
        }
    ));
}

// ---------------------------------------------------------------------------
// Floor persistence
// ---------------------------------------------------------------------------

#[test]
fn missing_snapshot_file_is_not_an_error() {
    let store = SnapshotStore::new(temp_dir("missing"));
    assert!(store.load("arena1").unwrap().is_none());
    assert!(store.remove("arena1").is_ok());
}

#[test]
fn floor_snapshot_lives_on_disk_while_the_round_runs() {
    let dir = temp_dir("lifecycle");
    let fx = fixture(Some(dir.clone()));
    let store = SnapshotStore::new(&dir);
    let mut arenas = fx.arenas();
    let (a, b) = (player("a"), player("b"));

    start(&mut arenas, "arena1", &[&a, &b]);
    assert!(store.path("arena1").exists());
    let saved = store.load("arena1").unwrap().unwrap();
    assert!(saved.matches(arenas.get("arena1").unwrap().floor().unwrap()));
    assert_eq!(saved.snapshot.len(), 16);

    assert!(arenas.get_mut("arena1").unwrap().stop(None));
    assert!(!store.path("arena1").exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unfinished_round_is_recovered_at_startup() {
    let dir = temp_dir("recover");
    let fx = fixture(Some(dir.clone()));
    let store = SnapshotStore::new(&dir);
    {
        let mut arenas = fx.arenas();
        let (a, b) = (player("a"), player("b"));
        start(&mut arenas, "arena1", &[&a, &b]);
        fx.dig(0, 0);
        fx.dig(3, 3);
        // Dropped mid-round, as if the server had crashed.
    }
    assert!(store.path("arena1").exists());

    let arenas = fx.arenas();
    assert_eq!(fx.cell(0, FLOOR_Y, 0), SNOW);
    assert_eq!(fx.cell(3, FLOOR_Y, 3), SNOW);
    assert!(!store.path("arena1").exists());
    assert_eq!(arenas.get("arena1").unwrap().status(), Status::New);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn recovery_restores_at_the_saved_coordinates() {
    let dir = temp_dir("moved");
    let fx = fixture(Some(dir.clone()));
    {
        let mut arenas = fx.arenas();
        let (a, b) = (player("a"), player("b"));
        start(&mut arenas, "arena1", &[&a, &b]);
        fx.dig(1, 2);
    }
    fx.settings.set("arenas.arena1.floor", floor(10, 0));

    let arenas = fx.arenas();
    assert_eq!(fx.cell(1, FLOOR_Y, 2), SNOW);
    assert_eq!(
        arenas.get("arena1").unwrap().floor().unwrap().min(),
        BlockPos::new(10, FLOOR_Y, 0)
    );
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn corrupt_snapshot_is_left_in_place() {
    let dir = temp_dir("corrupt");
    let fx = fixture(Some(dir.clone()));
    let store = SnapshotStore::new(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(store.path("arena1"), b"not gzip").unwrap();

    let arenas = fx.arenas();
    assert_eq!(arenas.len(), 2);
    assert!(store.load("arena1").is_err());
    assert!(store.path("arena1").exists());
    let _ = std::fs::remove_dir_all(&dir);
}

// ---------------------------------------------------------------------------
// Server tick
// ---------------------------------------------------------------------------

fn server(name: &str) -> (Server, PathBuf) {
    let dir = temp_dir(name);
    let fx = fixture(None);
    fx.settings
        .set("settings.snapshotDir", json!(dir.to_string_lossy()));
    (Server::new(Arc::clone(&fx.universe), Arc::clone(&fx.settings), None), dir)
}

#[test]
fn server_tick_routes_queued_events() {
    let (mut server, dir) = server("tick");
    let (a, b) = (player("a"), player("b"));
    start(server.arenas_mut(), "arena1", &[&a, &b]);

    server.push(WorldEvent::BlockBreak {
        player: a.clone(),
        block: edit(0, FLOOR_Y, 1, SNOW),
    });
    server.push(WorldEvent::PlayerMove {
        player: b.clone(),
        to: Location::new("w", 0.5, 3.0, 1.5),
    });
    let effects = server.tick();

    assert_eq!(server.arenas().get("arena1").unwrap().status(), Status::New);
    assert!(effects.iter().any(
        |e| matches!(e, Effect::Broadcast { text } if text.contains("a won the game!"))
    ));
    let cell = server
        .universe()
        .read_cell(&w(), BlockPos::new(0, FLOOR_Y, 1))
        .unwrap();
    assert_eq!(cell, SNOW);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn server_shutdown_restores_running_rounds() {
    let (mut server, dir) = server("shutdown");
    let (a, b) = (player("a"), player("b"));
    start(server.arenas_mut(), "arena1", &[&a, &b]);

    server.push(WorldEvent::BlockBreak {
        player: a.clone(),
        block: edit(3, FLOOR_Y, 0, SNOW),
    });
    server.tick();
    let dug = server
        .universe()
        .read_cell(&w(), BlockPos::new(3, FLOOR_Y, 0))
        .unwrap();
    assert_eq!(dug, Cell::EMPTY);

    let effects = server.shutdown();
    let restored = server
        .universe()
        .read_cell(&w(), BlockPos::new(3, FLOOR_Y, 0))
        .unwrap();
    assert_eq!(restored, SNOW);
    assert!(effects.iter().any(
        |e| matches!(e, Effect::Broadcast { text } if text.contains("stopped by console"))
    ));
    let _ = std::fs::remove_dir_all(&dir);
}

/// Feed the teleports among `effects` back in, as the host reports them.
fn report_teleports(server: &mut Server, effects: &[Effect], players: &[&Player]) -> usize {
    let mut reported = 0;
    for effect in effects {
        let Effect::Teleport { player: id, to } = effect else {
            continue;
        };
        if let Some(p) = players.iter().find(|p| p.id == *id) {
            server.push(WorldEvent::PlayerTeleport {
                player: (*p).clone(),
                to: to.clone(),
            });
            reported += 1;
        }
    }
    reported
}

fn teleport_denials(effects: &[Effect]) -> usize {
    effects
        .iter()
        .filter(|e| matches!(e, Effect::Message { text, .. } if text.contains("may not teleport")))
        .count()
}

fn set_game_spawn(server: &Server) {
    server.settings().set(
        "arenas.arena1.gameSpawn",
        json!({ "world": "w", "x": 1.5, "y": (FLOOR_Y + 1) as f64, "z": 1.5 }),
    );
}

#[test]
fn round_started_by_the_ready_block_lets_its_own_teleports_through() {
    let (mut server, dir) = server("ready-teleport");
    server.settings().set("arenas.arena1.useReady", json!("block"));
    set_game_spawn(&server);
    let (a, b) = (player("a"), player("b"));
    assert!(server.arenas_mut().join("arena1", &a));
    assert!(server.arenas_mut().join("arena1", &b));
    server.tick();

    let wool = edit(50, FLOOR_Y, 50, Cell::of(block::WOOL));
    for p in [&a, &b] {
        server.push(WorldEvent::PlayerInteract {
            player: p.clone(),
            action: ClickAction::RightClickBlock,
            block: Some(wool.clone()),
        });
    }
    let effects = server.tick();
    assert_eq!(server.arenas().get("arena1").unwrap().status(), Status::Started);
    assert_eq!(report_teleports(&mut server, &effects, &[&a, &b]), 2);

    let effects = server.tick();
    assert_eq!(teleport_denials(&effects), 0);

    // The passes are spent: a teleport of their own is refused.
    server.push(WorldEvent::PlayerTeleport {
        player: a.clone(),
        to: Location::new("w", 500.0, 70.0, 500.0),
    });
    let effects = server.tick();
    assert_eq!(teleport_denials(&effects), 1);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn round_started_by_command_lets_its_own_teleports_through() {
    let (mut server, dir) = server("command-teleport");
    set_game_spawn(&server);
    let (a, b) = (player("a"), player("b"));
    start(server.arenas_mut(), "arena1", &[&a, &b]);

    let effects = server.tick();
    assert_eq!(report_teleports(&mut server, &effects, &[&a, &b]), 2);
    let effects = server.tick();
    assert_eq!(teleport_denials(&effects), 0);
    assert_eq!(server.arenas().get("arena1").unwrap().status(), Status::Started);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unused_teleport_passes_run_out() {
    let (mut server, dir) = server("stale-pass");
    set_game_spawn(&server);
    let (a, b) = (player("a"), player("b"));
    start(server.arenas_mut(), "arena1", &[&a, &b]);
    server.tick();
    server.tick();

    server.push(WorldEvent::PlayerTeleport {
        player: b.clone(),
        to: Location::new("w", 500.0, 70.0, 500.0),
    });
    assert_eq!(teleport_denials(&server.tick()), 1);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn tick_period_stays_above_zero() {
    let (server, dir) = server("tick-period");
    assert_eq!(server.tick_period(), Duration::from_millis(50));
    server.settings().set("settings.ticksPerSecond", json!(5000));
    assert_eq!(server.tick_period(), Duration::from_millis(1));
    server.settings().set("settings.ticksPerSecond", json!(0));
    assert_eq!(server.tick_period(), Duration::from_secs(1));
    let _ = std::fs::remove_dir_all(&dir);
}
