//! The spleef arena: lounge, readiness, countdown, the round itself and cleanup.
//!
//! A session owns its floor region outright. The floor is captured right
//! before the status becomes `Started` and restored in [`Game::clean`], which
//! every way out of a round (win, stop, abort, delete) goes through.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use serde_json::Value;
use spleef_engine::region::CuboidRegion;
use spleef_engine::store::WorldId;
use spleef_engine::world::block::{BlockId, Cell};
use spleef_engine::world::position::{BlockPos, Location};

use super::{ArenaContext, BlockEdit, ClickAction, Game, GameMode, ReadyPolicy, Status, Verdict};
use crate::block;
use crate::player::{Player, PlayerId, Sender};

/// Cuboid as written in the configuration:
/// `{ "world": "world", "min": [x, y, z], "max": [x, y, z] }`.
/// The corners may be given in any order.
#[derive(Debug, Deserialize)]
struct CuboidSetting {
    world: WorldId,
    min: [i64; 3],
    max: [i64; 3],
}

/// Session ticks a teleport pass stays valid for.
const PASS_TICKS: u64 = 2;

/// How a player left the roster.
enum Departure<'a> {
    Left,
    Quit,
    Kicked(&'a str),
}

pub struct ArenaSession {
    id: String,
    name: String,
    status: Status,
    ctx: ArenaContext,
    mode: GameMode,
    floor: Option<CuboidRegion>,
    loose: Option<CuboidRegion>,
    roster: IndexMap<PlayerId, Player>,
    ready: IndexSet<PlayerId>,
    teams: HashMap<PlayerId, String>,
    /// Roster members who are out of the current round.
    eliminated: IndexSet<PlayerId>,
    /// Everyone on the roster when the round started.
    participants: IndexSet<PlayerId>,
    /// Team of each participant when the round started.
    participant_teams: HashMap<PlayerId, String>,
    spectators: IndexMap<PlayerId, Player>,
    /// Where players stood before they entered the arena.
    origins: HashMap<PlayerId, Location>,
    /// Players who disconnected while inside; sent home when they reconnect.
    returns: HashMap<PlayerId, Location>,
    /// One-shot allowances for teleports this session requested itself,
    /// with the tick they were granted on.
    teleport_passes: HashMap<PlayerId, u64>,
    /// Ticks seen since the session was created.
    clock: u64,
    countdown_ticks: u64,
    game_ticks: u64,
}

impl ArenaSession {
    pub fn new(name: &str, ctx: ArenaContext) -> Self {
        let mut session = Self {
            id: name.to_lowercase(),
            name: name.to_string(),
            status: Status::New,
            ctx,
            mode: GameMode::FreeForAll,
            floor: None,
            loose: None,
            roster: IndexMap::new(),
            ready: IndexSet::new(),
            teams: HashMap::new(),
            eliminated: IndexSet::new(),
            participants: IndexSet::new(),
            participant_teams: HashMap::new(),
            spectators: IndexMap::new(),
            origins: HashMap::new(),
            returns: HashMap::new(),
            teleport_passes: HashMap::new(),
            clock: 0,
            countdown_ticks: 0,
            game_ticks: 0,
        };
        session.define_settings(false);
        session
    }

    /// Restore a floor left captured on disk by a round that never finished.
    pub fn recover(&mut self) {
        let Some(snapshots) = self.ctx.snapshots.clone() else {
            return;
        };
        let saved = match snapshots.load(&self.id) {
            Ok(Some(saved)) => saved,
            Ok(None) => return,
            Err(e) => {
                tracing::error!("Arena '{}': unreadable floor snapshot: {:#}", self.id, e);
                return;
            }
        };

        tracing::warn!(
            "Arena '{}': found floor snapshot of an unfinished round, restoring it",
            self.id
        );
        // Restore at the saved coordinates even if the floor was redefined since.
        let mut region = CuboidRegion::new(
            self.ctx.store.clone(),
            saved.world.clone(),
            saved.min,
            saved.max,
        );
        if let Some(floor) = &self.floor {
            if !saved.matches(floor) {
                tracing::warn!(
                    "Arena '{}': saved snapshot does not match the current floor {:?}",
                    self.id,
                    floor
                );
            }
        }
        let restored = region
            .adopt_snapshot(saved.snapshot)
            .and_then(|()| region.restore());
        match restored {
            Ok(n) => {
                tracing::info!("Arena '{}': recovered {} floor cells", self.id, n);
                if let Err(e) = snapshots.remove(&self.id) {
                    tracing::warn!("Arena '{}': {:#}", self.id, e);
                }
            }
            Err(e) => tracing::error!("Arena '{}': floor recovery failed: {:#}", self.id, e),
        }
    }

    pub fn team_of(&self, id: PlayerId) -> Option<&str> {
        self.teams.get(&id).map(String::as_str)
    }

    pub fn is_ready_player(&self, id: PlayerId) -> bool {
        self.ready.contains(&id)
    }

    pub fn is_eliminated(&self, id: PlayerId) -> bool {
        self.eliminated.contains(&id)
    }

    // ── Settings ─────────────────────────────────────────────────────────

    fn setting(&self, key: &str) -> Option<Value> {
        self.ctx.settings.arena_value(&self.id, key)
    }

    fn ticks_per_second(&self) -> u64 {
        self.ctx.settings.u64("settings.ticksPerSecond", 20).max(1)
    }

    fn max_players(&self) -> usize {
        self.ctx.settings.arena_u64(&self.id, "maxPlayers", 0) as usize
    }

    fn min_players(&self) -> usize {
        self.ctx.settings.arena_u64(&self.id, "minPlayers", 2) as usize
    }

    fn ready_block(&self) -> BlockId {
        let id = self
            .ctx
            .settings
            .arena_u64(&self.id, "readyBlock", block::WOOL.0 as u64);
        BlockId(id as u16)
    }

    fn spawn(&self, key: &str) -> Option<Location> {
        self.ctx.settings.arena_typed(&self.id, key)
    }

    fn load_cuboid(&self, key: &str) -> Option<CuboidRegion> {
        let c: CuboidSetting = self.ctx.settings.arena_typed(&self.id, key)?;
        Some(CuboidRegion::new(
            self.ctx.store.clone(),
            c.world,
            BlockPos::new(c.min[0], c.min[1], c.min[2]),
            BlockPos::new(c.max[0], c.max[1], c.max[2]),
        ))
    }

    // ── Roster helpers ───────────────────────────────────────────────────

    fn roster_ids(&self) -> Vec<PlayerId> {
        self.roster.keys().copied().collect()
    }

    fn survivors(&self) -> Vec<PlayerId> {
        self.roster
            .keys()
            .filter(|id| !self.eliminated.contains(*id))
            .copied()
            .collect()
    }

    /// On the roster and still in the round (or waiting for it).
    fn is_active(&self, id: PlayerId) -> bool {
        self.roster.contains_key(&id) && !self.eliminated.contains(&id)
    }

    fn player_name(&self, id: PlayerId) -> String {
        self.roster
            .get(&id)
            .or_else(|| self.spectators.get(&id))
            .map(|p| p.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    fn names<'a>(&'a self, ids: impl Iterator<Item = &'a PlayerId>) -> Option<String> {
        let names: Vec<&str> = ids
            .filter_map(|id| self.roster.get(id).or_else(|| self.spectators.get(id)))
            .map(|p| p.name.as_str())
            .collect();
        if names.is_empty() {
            None
        } else {
            Some(names.join(", "))
        }
    }

    fn tell(&self, id: PlayerId, text: impl Into<String>) {
        self.ctx.outbox.tell(id, text);
    }

    // ── Teleports ────────────────────────────────────────────────────────

    fn send_to(&mut self, id: PlayerId, to: Location) {
        self.teleport_passes.insert(id, self.clock);
        self.ctx.outbox.teleport(id, to);
    }

    fn send_to_spawn(&mut self, id: PlayerId, key: &str) {
        if let Some(to) = self.spawn(key) {
            self.send_to(id, to);
        }
    }

    fn send_home(&mut self, id: PlayerId) {
        if let Some(to) = self.origins.remove(&id) {
            self.send_to(id, to);
        }
    }

    // ── State transitions ────────────────────────────────────────────────

    /// Recompute New/Ready from the roster. Returns true if the arena just
    /// became ready.
    fn update_readiness(&mut self) -> bool {
        if self.status > Status::Ready {
            return false;
        }
        let enough = self.roster.len() >= self.min_players().max(1);
        let all_ready = !self.supports_ready() || self.roster.keys().all(|id| self.ready.contains(id));
        let was_ready = self.status == Status::Ready;
        self.status = if enough && all_ready {
            Status::Ready
        } else {
            Status::New
        };
        !was_ready && self.status == Status::Ready
    }

    fn became_ready(&mut self) {
        tracing::info!("Arena '{}' is ready with {} players", self.id, self.roster.len());
        if self.supports_ready() {
            self.send_message("All players are ready.", false);
            if self.ctx.settings.arena_bool(&self.id, "readyAutoStart", true) {
                self.countdown(&Sender::Console);
            }
        }
    }

    fn depart(&mut self, player: &Player, how: Departure<'_>) {
        let id = player.id;
        self.roster.shift_remove(&id);
        self.ready.shift_remove(&id);
        self.eliminated.shift_remove(&id);
        self.teams.remove(&id);

        match how {
            Departure::Left => {
                self.send_home(id);
                self.tell(id, format!("You left arena {}.", self.name));
                self.send_message(&format!("{} left the arena.", player.name), false);
            }
            Departure::Quit => {
                if let Some(home) = self.origins.remove(&id) {
                    self.returns.insert(id, home);
                }
                self.send_message(&format!("{} quit the game.", player.name), false);
            }
            Departure::Kicked(reason) => {
                if let Some(home) = self.origins.remove(&id) {
                    self.returns.insert(id, home);
                }
                self.send_message(&format!("{} was kicked: {}", player.name, reason), false);
            }
        }

        match self.status {
            Status::New | Status::Ready => {
                if self.update_readiness() {
                    self.became_ready();
                }
            }
            Status::Countdown if self.roster.is_empty() => {
                self.send_message("Countdown aborted, no players left.", true);
                self.status = Status::Finished;
                self.clean();
            }
            Status::Started => self.check_finished(),
            _ => {}
        }
    }

    fn eliminate(&mut self, id: PlayerId, cause: &str) {
        if self.status != Status::Started || !self.is_active(id) {
            return;
        }
        self.eliminated.insert(id);
        let name = self.player_name(id);
        tracing::info!("Arena '{}': {} {}", self.id, name, cause);
        self.send_message(&format!("{} {}", name, cause), false);
        self.send_to_spawn(id, "looseSpawn");
        self.check_finished();
    }

    /// End the round if the survivors decide it. A started arena never stays
    /// started once nobody is left.
    fn check_finished(&mut self) {
        if self.status != Status::Started {
            return;
        }
        let survivors = self.survivors();
        let participants: Vec<PlayerId> = self.participants.iter().copied().collect();
        if !self
            .mode
            .is_decided(&survivors, &participants, &self.participant_teams)
        {
            return;
        }

        let names = self.names(survivors.iter()).unwrap_or_default();
        let result = match (&self.mode, survivors.first()) {
            (_, None) => "The game is over, nobody survived.".to_string(),
            (GameMode::Teams(_), Some(first)) => {
                let team = self
                    .participant_teams
                    .get(first)
                    .map(String::as_str)
                    .unwrap_or("?");
                format!("Team {} wins: {}!", team, names)
            }
            (GameMode::FreeForAll, Some(_)) => format!("{} won the game!", names),
        };
        tracing::info!("Arena '{}' finished: {}", self.id, result);
        self.send_message(&result, true);
        self.status = Status::Finished;
        self.clean();
    }

    /// Turn one random diggable floor block into air.
    fn dissolve_one(&mut self) {
        let Some(floor) = &self.floor else {
            return;
        };
        let candidates = match floor
            .diggable_blocks(|pos, cell| self.check_may_break_block(floor.world(), pos, cell))
        {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Arena '{}': cannot dissolve floor: {:#}", self.id, e);
                return;
            }
        };
        if candidates.is_empty() {
            return;
        }
        let pos = candidates[fastrand::usize(..candidates.len())];
        if let Err(e) = self.ctx.store.write_cell(floor.world(), pos, Cell::EMPTY) {
            tracing::warn!("Arena '{}': cannot dissolve floor: {:#}", self.id, e);
        }
    }

    fn allowed_blocks(&self) -> Vec<u16> {
        self.ctx
            .settings
            .arena_typed(&self.id, "allowedBlocks")
            .unwrap_or_default()
    }
}

impl Game for ArenaSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> Status {
        self.status
    }

    fn kind(&self) -> &'static str {
        self.mode.kind()
    }

    fn ready_policy(&self) -> ReadyPolicy {
        ReadyPolicy::from_setting(self.setting("useReady").as_ref())
    }

    fn floor(&self) -> Option<&CuboidRegion> {
        self.floor.as_ref()
    }

    fn configured_floor(&self) -> Option<CuboidRegion> {
        self.load_cuboid("floor")
    }

    fn define_settings(&mut self, keep_floor: bool) {
        let labels: Vec<String> = self
            .ctx
            .settings
            .arena_typed(&self.id, "teams")
            .unwrap_or_default();
        self.mode = GameMode::from_labels(labels);

        if self.floor.as_ref().is_some_and(CuboidRegion::has_snapshot) {
            tracing::warn!(
                "Arena '{}': floor is captured, keeping it until the round is cleaned up",
                self.id
            );
        } else if !keep_floor {
            self.floor = self.configured_floor();
        }
        self.loose = self.load_cuboid("loose");
    }

    fn join(&mut self, player: &Player) -> bool {
        let id = player.id;
        if !self.ctx.settings.arena_bool(&self.id, "enabled", true) {
            self.tell(id, format!("Arena {} is disabled.", self.name));
            return false;
        }
        if !self.is_joinable() {
            self.tell(id, format!("Arena {} is already in progress.", self.name));
            return false;
        }
        if self.has_player(id) || self.has_spectator(id) {
            self.tell(id, format!("You are already in arena {}.", self.name));
            return false;
        }
        if self.floor.is_none() {
            self.tell(id, format!("Arena {} has no floor defined.", self.name));
            return false;
        }
        let max = self.max_players();
        if max > 0 && self.roster.len() >= max {
            self.tell(id, format!("Arena {} is full.", self.name));
            return false;
        }

        self.origins.insert(id, player.location.clone());
        self.roster.insert(id, player.clone());
        self.send_to_spawn(id, "loungeSpawn");
        self.tell(
            id,
            format!("You joined arena {} {}.", self.name, self.number_of_players()),
        );
        self.send_message_except(&format!("{} joined the arena.", player.name), id);

        if self.update_readiness() {
            self.became_ready();
        }
        true
    }

    fn leave(&mut self, player: &Player) -> bool {
        if !self.has_player(player.id) {
            self.tell(player.id, format!("You are not in arena {}.", self.name));
            return false;
        }
        self.depart(player, Departure::Left);
        true
    }

    fn team(&mut self, player: &Player, team: &str) -> bool {
        let id = player.id;
        if !self.has_player(id) {
            self.tell(id, format!("You are not in arena {}.", self.name));
            return false;
        }
        if self.status > Status::Ready {
            self.tell(id, "Teams can only be chosen before the game starts.");
            return false;
        }
        let Some(label) = self.mode.team_label(team).map(str::to_string) else {
            let text = match &self.mode {
                GameMode::FreeForAll => format!("Arena {} has no teams.", self.name),
                GameMode::Teams(labels) => format!("Unknown team, choose one of: {}", labels.join(", ")),
            };
            self.tell(id, text);
            return false;
        };
        self.send_message(&format!("{} joined team {}.", player.name, label), false);
        self.teams.insert(id, label);
        true
    }

    fn ready(&mut self, player: &Player, hit_block: bool) -> bool {
        let id = player.id;
        if !self.has_player(id) {
            self.tell(id, format!("You are not in arena {}.", self.name));
            return false;
        }
        let policy = self.ready_policy();
        if !policy.required() {
            self.tell(id, format!("Arena {} does not use ready.", self.name));
            return false;
        }
        if hit_block && !policy.accepts_block() {
            self.tell(id, "Use the ready command to signal readiness.");
            return false;
        }
        if !hit_block && !policy.accepts_command() {
            self.tell(id, "Touch the ready block to signal readiness.");
            return false;
        }
        if !self.is_joinable() {
            self.tell(id, format!("Arena {} is already in progress.", self.name));
            return false;
        }
        if !self.ready.insert(id) {
            self.tell(id, "You are already ready.");
            return false;
        }

        self.send_message(&format!("{} is ready.", player.name), false);
        if self.update_readiness() {
            self.became_ready();
        }
        true
    }

    fn countdown(&mut self, sender: &Sender) -> bool {
        if self.is_in_progress() {
            self.ctx
                .outbox
                .reply(sender, format!("Arena {} is already in progress.", self.name));
            return false;
        }
        if self.status != Status::Ready {
            let reason = match self.list_of_unready_spleefers() {
                Some(unready) if self.supports_ready() && !self.roster.is_empty() => {
                    format!("Not all players are ready yet: {}", unready)
                }
                _ => format!(
                    "Arena {} needs at least {} players.",
                    self.name,
                    self.min_players().max(1)
                ),
            };
            self.ctx.outbox.reply(sender, reason);
            return false;
        }
        if self.floor.is_none() {
            self.ctx
                .outbox
                .reply(sender, format!("Arena {} has no floor defined.", self.name));
            return false;
        }

        let roster = self.roster_ids();
        self.mode.assign_teams(&roster, &mut self.teams);

        let seconds = self.ctx.settings.arena_u64(&self.id, "countdown", 10);
        if seconds == 0 {
            return self.start(sender);
        }
        self.status = Status::Countdown;
        self.countdown_ticks = seconds * self.ticks_per_second();
        tracing::info!("Arena '{}': countdown started by {}", self.id, sender.name());
        self.send_message(
            &format!("Countdown started by {}: {}...", sender.name(), seconds),
            true,
        );
        true
    }

    fn start(&mut self, sender: &Sender) -> bool {
        if !matches!(self.status, Status::Ready | Status::Countdown) {
            tracing::info!(
                "Arena '{}': {} cannot start it from {:?}",
                self.id,
                sender.name(),
                self.status
            );
            let text = if self.is_in_game() {
                format!("Arena {} is already in progress.", self.name)
            } else {
                format!("Arena {} is not ready to start.", self.name)
            };
            self.ctx.outbox.reply(sender, text);
            return false;
        }
        if self.floor.is_none() {
            tracing::warn!("Arena '{}': cannot start without a floor", self.id);
            self.ctx
                .outbox
                .reply(sender, format!("Arena {} has no floor defined.", self.name));
            return false;
        }
        let Some(floor) = self.floor.as_mut() else {
            return false;
        };

        if let Err(e) = floor.capture() {
            tracing::error!("Arena '{}': could not capture floor: {:#}", self.id, e);
            self.send_message("The floor could not be prepared, the game is cancelled.", false);
            self.status = Status::Finished;
            self.clean();
            return false;
        }
        if let Some(snapshots) = &self.ctx.snapshots {
            if let Err(e) = snapshots.save(&self.id, floor) {
                tracing::warn!("Arena '{}': floor snapshot not saved: {:#}", self.id, e);
            }
        }

        let roster = self.roster_ids();
        self.mode.assign_teams(&roster, &mut self.teams);
        self.participants = roster.iter().copied().collect();
        self.participant_teams = self.teams.clone();
        self.status = Status::Started;
        self.countdown_ticks = 0;
        self.game_ticks = 0;
        for id in roster {
            self.send_to_spawn(id, "gameSpawn");
        }
        tracing::info!("Arena '{}' started with {} players", self.id, self.roster.len());
        self.send_message("Spleef! Dig the floor out from under your opponents.", true);

        // A round that is already decided (e.g. everybody left during the
        // countdown's last tick) ends right away.
        self.check_finished();
        true
    }

    fn stop(&mut self, player: Option<&Player>) -> bool {
        if !self.is_in_progress() {
            if let Some(p) = player {
                self.tell(p.id, format!("Arena {} is not in progress.", self.name));
            }
            return false;
        }
        let by = player.map(|p| p.name.as_str()).unwrap_or("console");
        tracing::info!("Arena '{}' stopped by {}", self.id, by);
        self.send_message(&format!("Game stopped by {}.", by), true);
        self.status = Status::Finished;
        self.clean();
        true
    }

    fn delete(&mut self, sender: &Sender) -> bool {
        if !sender.is_admin() {
            self.ctx
                .outbox
                .reply(sender, "You do not have permission to delete arenas.");
            return false;
        }
        if self.is_in_progress() {
            self.status = Status::Finished;
        }
        self.clean();

        let watchers: Vec<PlayerId> = self.spectators.keys().copied().collect();
        for id in watchers {
            self.send_home(id);
        }
        self.spectators.clear();

        self.floor = None;
        self.loose = None;
        self.ctx.settings.remove(&format!("arenas.{}.floor", self.id));
        self.ctx.settings.remove(&format!("arenas.{}.loose", self.id));
        self.status = Status::New;

        tracing::info!("Arena '{}' deleted by {}", self.id, sender.name());
        self.ctx
            .outbox
            .reply(sender, format!("Arena {} has been reset.", self.name));
        true
    }

    fn watch(&mut self, player: &Player) -> bool {
        let id = player.id;
        if self.has_player(id) {
            self.tell(id, format!("You are playing in arena {}.", self.name));
            return false;
        }
        if self.has_spectator(id) {
            self.tell(id, format!("You are already watching arena {}.", self.name));
            return false;
        }
        self.origins.insert(id, player.location.clone());
        self.spectators.insert(id, player.clone());
        self.send_to_spawn(id, "spectatorSpawn");
        self.tell(id, format!("You are now watching arena {}.", self.name));
        true
    }

    fn back(&mut self, player: &Player) -> bool {
        let id = player.id;
        if self.spectators.shift_remove(&id).is_none() {
            self.tell(id, format!("You are not watching arena {}.", self.name));
            return false;
        }
        self.send_home(id);
        self.tell(id, format!("You stopped watching arena {}.", self.name));
        true
    }

    fn has_player(&self, id: PlayerId) -> bool {
        self.roster.contains_key(&id)
    }

    fn has_spectator(&self, id: PlayerId) -> bool {
        self.spectators.contains_key(&id)
    }

    fn on_player_move(&mut self, player: &Player, to: &Location) {
        let id = player.id;
        if let Some(p) = self.roster.get_mut(&id) {
            p.location = to.clone();
        }
        if self.status != Status::Started || !self.is_active(id) {
            return;
        }
        let out = match (&self.loose, &self.floor) {
            (Some(loose), _) => loose.contains_location(to),
            (None, Some(floor)) => to.world == *floor.world() && to.y < floor.min().y as f64,
            (None, None) => false,
        };
        if out {
            self.eliminate(id, "fell off the floor!");
        }
    }

    fn player_may_teleport(&mut self, player: &Player) -> bool {
        if self.teleport_passes.remove(&player.id).is_some() {
            return true;
        }
        !(self.is_in_progress() && self.is_active(player.id))
    }

    fn on_player_interact(&mut self, player: &Player, action: ClickAction, block: Option<&BlockEdit>) -> Verdict {
        let Some(block) = block else {
            return Verdict::Allow;
        };
        let id = player.id;

        if self.is_joinable()
            && self.has_player(id)
            && !self.ready.contains(&id)
            && self.supports_block_ready()
            && block.cell.material == self.ready_block()
        {
            self.ready(player, true);
            return Verdict::Allow;
        }

        if self.status == Status::Started
            && action == ClickAction::LeftClickBlock
            && self.is_active(id)
            && self.ctx.settings.arena_bool(&self.id, "instantDig", false)
            && self.check_may_break_block(&block.world, block.pos, block.cell)
        {
            // Dig it ourselves and swallow the click.
            if let Err(e) = self.ctx.store.write_cell(&block.world, block.pos, Cell::EMPTY) {
                tracing::error!("Arena '{}': instant dig failed: {:#}", self.id, e);
            }
            return Verdict::Cancel;
        }

        Verdict::Allow
    }

    fn on_player_quit(&mut self, player: &Player) {
        if self.has_player(player.id) {
            self.depart(player, Departure::Quit);
        } else if self.spectators.shift_remove(&player.id).is_some() {
            if let Some(home) = self.origins.remove(&player.id) {
                self.returns.insert(player.id, home);
            }
        }
    }

    fn on_player_kick(&mut self, player: &Player, reason: &str) {
        if self.has_player(player.id) {
            self.depart(player, Departure::Kicked(reason));
        } else if self.spectators.shift_remove(&player.id).is_some() {
            if let Some(home) = self.origins.remove(&player.id) {
                self.returns.insert(player.id, home);
            }
        }
    }

    fn on_player_join(&mut self, player: &Player) {
        if let Some(home) = self.returns.remove(&player.id) {
            self.send_to(player.id, home);
            self.tell(
                player.id,
                format!("You left arena {} while inside and have been sent back.", self.name),
            );
        }
    }

    fn on_player_death(&mut self, player: &Player) {
        self.eliminate(player.id, "died.");
    }

    fn on_block_break(&mut self, player: &Player, block: &BlockEdit) -> Verdict {
        if !self.has_player(player.id) {
            return Verdict::Allow;
        }
        if self.status == Status::Started
            && self.is_active(player.id)
            && self.check_may_break_block(&block.world, block.pos, block.cell)
        {
            return Verdict::Allow;
        }
        self.tell(player.id, "You may not break this block.");
        Verdict::Cancel
    }

    fn on_block_place(&mut self, player: &Player, _block: &BlockEdit) -> Verdict {
        if !self.has_player(player.id) {
            return Verdict::Allow;
        }
        self.tell(player.id, "You may not place blocks while in an arena.");
        Verdict::Cancel
    }

    fn send_message(&self, message: &str, broadcast: bool) {
        let text = format!("[{}] {}", self.name, message);
        if broadcast {
            self.ctx.outbox.broadcast(text);
            return;
        }
        for id in self.roster.keys().chain(self.spectators.keys()) {
            self.tell(*id, text.clone());
        }
    }

    fn send_message_except(&self, message: &str, except: PlayerId) {
        let text = format!("[{}] {}", self.name, message);
        for id in self.roster.keys().chain(self.spectators.keys()) {
            if *id != except {
                self.tell(*id, text.clone());
            }
        }
    }

    fn number_of_players(&self) -> String {
        match self.max_players() {
            0 => format!("({})", self.roster.len()),
            max => format!("({}/{})", self.roster.len(), max),
        }
    }

    fn list_of_spleefers(&self) -> Option<String> {
        self.names(self.roster.keys())
    }

    fn list_of_unready_spleefers(&self) -> Option<String> {
        self.names(self.roster.keys().filter(|id| !self.ready.contains(*id)))
    }

    fn list_of_spectators(&self) -> Option<String> {
        self.names(self.spectators.keys())
    }

    fn tick(&mut self) {
        // A pass outlives one full dispatch after the tick that granted it,
        // which is when the host reports the teleport back.
        self.clock += 1;
        let clock = self.clock;
        self.teleport_passes.retain(|_, granted| clock - *granted < PASS_TICKS);
        match self.status {
            Status::Countdown => {
                self.countdown_ticks = self.countdown_ticks.saturating_sub(1);
                let tps = self.ticks_per_second();
                if self.countdown_ticks == 0 {
                    self.start(&Sender::Console);
                } else if self.countdown_ticks % tps == 0 {
                    self.send_message(&format!("{}...", self.countdown_ticks / tps), true);
                }
            }
            Status::Started => {
                self.game_ticks += 1;
                let every = self.ctx.settings.arena_u64(&self.id, "dissolveTicks", 0);
                if every > 0 && self.game_ticks % every == 0 {
                    self.dissolve_one();
                }
            }
            _ => {}
        }
    }

    fn clean(&mut self) {
        if let Some(floor) = self.floor.as_mut() {
            match floor.restore() {
                Ok(n) => {
                    if n > 0 {
                        tracing::info!("Arena '{}': restored {} floor cells", self.id, n);
                    }
                    if let Some(snapshots) = &self.ctx.snapshots {
                        if let Err(e) = snapshots.remove(&self.id) {
                            tracing::warn!("Arena '{}': {:#}", self.id, e);
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("Arena '{}': floor could not be restored: {:#}", self.id, e);
                    self.send_message("The floor could not be restored, see the server log.", true);
                }
            }
        }

        for id in self.roster_ids() {
            self.send_home(id);
        }
        self.roster.clear();
        self.ready.clear();
        self.teams.clear();
        self.eliminated.clear();
        self.participants.clear();
        self.participant_teams.clear();
        self.countdown_ticks = 0;
        self.game_ticks = 0;
        self.status = Status::New;
    }

    fn check_may_break_block(&self, world: &WorldId, pos: BlockPos, cell: Cell) -> bool {
        let Some(floor) = &self.floor else {
            return false;
        };
        if !floor.contains_block(world, pos) || cell.material == BlockId::AIR {
            return false;
        }
        let allowed = self.allowed_blocks();
        allowed.is_empty() || allowed.contains(&cell.material.0)
    }
}
