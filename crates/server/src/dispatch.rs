//! Routing of world events into arena sessions.
//!
//! Events from the host are queued on an [`EventQueue`] and drained once per
//! tick. Each event goes to the session the player is in (as spleefer or
//! spectator), found by a plain registry lookup. Handlers run in a fixed order
//! per event type and the first cancel wins: a cancelled block break or place
//! is never written to the block store.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use spleef_engine::store::BlockStore;
use spleef_engine::world::block::Cell;
use spleef_engine::world::position::Location;

use crate::game::{BlockEdit, ClickAction, Game, Verdict};
use crate::outbox::Outbox;
use crate::player::Player;
use crate::registry::Arenas;
use crate::settings::Settings;
use crate::update::UpdateChecker;

/// A raw event from the host, one JSON object per event:
/// `{"type": "block_break", "player": {...}, "block": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorldEvent {
    PlayerJoin {
        player: Player,
    },
    PlayerQuit {
        player: Player,
    },
    PlayerKick {
        player: Player,
        #[serde(default)]
        reason: String,
    },
    PlayerMove {
        player: Player,
        to: Location,
    },
    PlayerInteract {
        player: Player,
        action: ClickAction,
        #[serde(default)]
        block: Option<BlockEdit>,
    },
    /// Cancelable.
    PlayerTeleport {
        player: Player,
        to: Location,
    },
    /// Cancelable.
    PlayerGameModeChange {
        player: Player,
        mode: String,
    },
    /// Cancelable. `block.cell` is the cell being broken.
    BlockBreak {
        player: Player,
        block: BlockEdit,
    },
    /// Cancelable. `block.cell` is the cell being placed.
    BlockPlace {
        player: Player,
        block: BlockEdit,
    },
    PlayerDeath {
        player: Player,
    },
}

impl WorldEvent {
    pub fn player(&self) -> &Player {
        match self {
            WorldEvent::PlayerJoin { player }
            | WorldEvent::PlayerQuit { player }
            | WorldEvent::PlayerKick { player, .. }
            | WorldEvent::PlayerMove { player, .. }
            | WorldEvent::PlayerInteract { player, .. }
            | WorldEvent::PlayerTeleport { player, .. }
            | WorldEvent::PlayerGameModeChange { player, .. }
            | WorldEvent::BlockBreak { player, .. }
            | WorldEvent::BlockPlace { player, .. }
            | WorldEvent::PlayerDeath { player } => player,
        }
    }
}

/// Single-threaded FIFO of pending events.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<WorldEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: WorldEvent) {
        self.events.push_back(event);
    }

    pub fn pop(&mut self) -> Option<WorldEvent> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// An event after dispatch, with the verdict the host must apply.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub event: WorldEvent,
    pub verdict: Verdict,
}

pub struct Dispatcher {
    store: Arc<dyn BlockStore>,
    settings: Arc<Settings>,
    outbox: Outbox,
    updates: Option<UpdateChecker>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn BlockStore>,
        settings: Arc<Settings>,
        outbox: Outbox,
        updates: Option<UpdateChecker>,
    ) -> Self {
        Self {
            store,
            settings,
            outbox,
            updates,
        }
    }

    /// Dispatch everything queued so far, in arrival order.
    pub fn drain(&mut self, arenas: &mut Arenas, queue: &mut EventQueue) -> Vec<Dispatched> {
        let mut out = Vec::with_capacity(queue.len());
        while let Some(event) = queue.pop() {
            let verdict = self.dispatch(arenas, &event);
            out.push(Dispatched { event, verdict });
        }
        out
    }

    /// Hand arrived update-check outcomes to the players who triggered them.
    pub fn deliver_updates(&mut self) -> usize {
        match self.updates.as_mut() {
            Some(updates) => updates.deliver(&self.outbox),
            None => 0,
        }
    }

    pub fn dispatch(&mut self, arenas: &mut Arenas, event: &WorldEvent) -> Verdict {
        let player = event.player();
        let owner = arenas.session_of(player.id);

        match event {
            // Pre-authorization: may veto before anything else sees the action.
            WorldEvent::PlayerTeleport { .. } => {
                let Some(game) = owner.and_then(|key| arenas.by_key_mut(key)) else {
                    return Verdict::Allow;
                };
                if game.player_may_teleport(player) {
                    Verdict::Allow
                } else {
                    self.outbox
                        .tell(player.id, "You may not teleport while in a game.");
                    Verdict::Cancel
                }
            }
            WorldEvent::PlayerGameModeChange { mode, .. } => {
                let Some(game) = owner.and_then(|key| arenas.by_key(key)) else {
                    return Verdict::Allow;
                };
                if !game.has_player(player.id) {
                    return Verdict::Allow;
                }
                tracing::debug!("Denied game mode {} for {}", mode, player.name);
                self.outbox
                    .tell(player.id, "You may not change your game mode while in an arena.");
                Verdict::Cancel
            }

            WorldEvent::PlayerJoin { .. } => {
                if player.admin && self.settings.bool("settings.updateNotificationOnLogin", true) {
                    if let Some(updates) = &self.updates {
                        updates.spawn_check(player.id);
                    }
                }
                for game in arenas.games_mut() {
                    game.on_player_join(player);
                }
                Verdict::Allow
            }
            WorldEvent::PlayerQuit { .. } => {
                if let Some(game) = owner.and_then(|key| arenas.by_key_mut(key)) {
                    game.on_player_quit(player);
                }
                Verdict::Allow
            }
            WorldEvent::PlayerKick { reason, .. } => {
                if let Some(game) = owner.and_then(|key| arenas.by_key_mut(key)) {
                    game.on_player_kick(player, reason);
                }
                Verdict::Allow
            }
            WorldEvent::PlayerMove { to, .. } => {
                if let Some(game) = owner.and_then(|key| arenas.by_key_mut(key)) {
                    game.on_player_move(player, to);
                }
                Verdict::Allow
            }
            WorldEvent::PlayerInteract { action, block, .. } => {
                match owner.and_then(|key| arenas.by_key_mut(key)) {
                    Some(game) => game.on_player_interact(player, *action, block.as_ref()),
                    None => Verdict::Allow,
                }
            }
            WorldEvent::PlayerDeath { .. } => {
                if let Some(game) = owner.and_then(|key| arenas.by_key_mut(key)) {
                    game.on_player_death(player);
                }
                Verdict::Allow
            }

            WorldEvent::BlockBreak { block, .. } => {
                let verdict = match owner.and_then(|key| arenas.by_key_mut(key)) {
                    Some(game) => game.on_block_break(player, block),
                    None => Verdict::Allow,
                };
                if !verdict.is_cancelled() {
                    self.commit(block, Cell::EMPTY);
                }
                verdict
            }
            WorldEvent::BlockPlace { block, .. } => {
                let verdict = match owner.and_then(|key| arenas.by_key_mut(key)) {
                    Some(game) => game.on_block_place(player, block),
                    None => Verdict::Allow,
                };
                if !verdict.is_cancelled() {
                    self.commit(block, block.cell);
                }
                verdict
            }
        }
    }

    fn commit(&self, block: &BlockEdit, cell: Cell) {
        if let Err(e) = self.store.write_cell(&block.world, block.pos, cell) {
            tracing::warn!("Block change at {:?} not applied: {:#}", block.pos, e);
        }
    }
}
