//! Every arena on the server, and which one a player belongs to.
//!
//! Sessions live in a `SlotMap` behind `Box<dyn Game>`; a side table maps the
//! lowercase arena id to its key. A player is in at most one session at a
//! time, as spleefer or as spectator.

use std::collections::HashMap;

use anyhow::{Result, bail};
use slotmap::{SlotMap, new_key_type};

use crate::game::{ArenaContext, ArenaSession, Game};
use crate::outbox::Outbox;
use crate::player::{Player, PlayerId};

new_key_type! {
    pub struct ArenaKey;
}

pub struct Arenas {
    games: SlotMap<ArenaKey, Box<dyn Game>>,
    by_id: HashMap<String, ArenaKey>,
    outbox: Outbox,
}

impl Arenas {
    pub fn new(outbox: Outbox) -> Self {
        Self {
            games: SlotMap::with_key(),
            by_id: HashMap::new(),
            outbox,
        }
    }

    /// Build a session for every enabled arena in the configuration, restoring
    /// floors left over from rounds that never finished.
    pub fn from_settings(ctx: &ArenaContext) -> Self {
        let mut arenas = Self::new(ctx.outbox.clone());
        for id in ctx.settings.arena_ids() {
            if !ctx.settings.arena_bool(&id, "enabled", true) {
                tracing::info!("Arena '{}' is disabled, skipping", id);
                continue;
            }
            let name = match ctx.settings.string(&format!("arenas.{}.name", id)) {
                Some(name) if name.to_lowercase() == id => name,
                Some(name) => {
                    tracing::warn!("Arena '{}' has mismatched name '{}', using the id", id, name);
                    id.clone()
                }
                None => id.clone(),
            };

            let mut session = ArenaSession::new(&name, ctx.clone());
            session.recover();
            if let Err(e) = arenas.insert(Box::new(session)) {
                tracing::warn!("Arena '{}' not loaded: {:#}", id, e);
            }
        }
        tracing::info!("Loaded {} arenas", arenas.len());
        arenas
    }

    /// Register a session. Ids must be unique and floors must not overlap.
    pub fn insert(&mut self, game: Box<dyn Game>) -> Result<ArenaKey> {
        let id = game.id().to_string();
        if self.by_id.contains_key(&id) {
            bail!("an arena with id '{}' already exists", id);
        }
        if let Some(floor) = game.floor() {
            let clash = self
                .games
                .values()
                .find(|other| other.floor().is_some_and(|f| f.intersects(floor)));
            if let Some(other) = clash {
                bail!("floor of arena '{}' overlaps arena '{}'", id, other.id());
            }
        }
        let key = self.games.insert(game);
        self.by_id.insert(id, key);
        Ok(key)
    }

    pub fn remove(&mut self, id: &str) -> Option<Box<dyn Game>> {
        let key = self.by_id.remove(id)?;
        self.games.remove(key)
    }

    pub fn key(&self, id: &str) -> Option<ArenaKey> {
        self.by_id.get(&id.to_lowercase()).copied()
    }

    pub fn get(&self, id: &str) -> Option<&dyn Game> {
        let key = self.key(id)?;
        self.games.get(key).map(|g| g.as_ref())
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Box<dyn Game>> {
        let key = self.key(id)?;
        self.games.get_mut(key)
    }

    /// The session this player is playing in or watching.
    pub fn session_of(&self, player: PlayerId) -> Option<ArenaKey> {
        self.games
            .iter()
            .find(|(_, g)| g.has_player(player) || g.has_spectator(player))
            .map(|(key, _)| key)
    }

    pub fn by_key(&self, key: ArenaKey) -> Option<&dyn Game> {
        self.games.get(key).map(|g| g.as_ref())
    }

    pub fn by_key_mut(&mut self, key: ArenaKey) -> Option<&mut Box<dyn Game>> {
        self.games.get_mut(key)
    }

    pub fn games(&self) -> impl Iterator<Item = &dyn Game> + '_ {
        self.games.values().map(|g| g.as_ref() as &dyn Game)
    }

    pub fn games_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Game>> + '_ {
        self.games.values_mut()
    }

    /// Arena ids in alphabetical order.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.by_id.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// Join an arena, unless the player is already in one.
    pub fn join(&mut self, id: &str, player: &Player) -> bool {
        if !self.check_free(player) {
            return false;
        }
        match self.get_mut(id) {
            Some(game) => game.join(player),
            None => {
                self.outbox.tell(player.id, format!("There is no arena named {}.", id));
                false
            }
        }
    }

    /// Watch an arena, unless the player is already in one.
    pub fn watch(&mut self, id: &str, player: &Player) -> bool {
        if !self.check_free(player) {
            return false;
        }
        match self.get_mut(id) {
            Some(game) => game.watch(player),
            None => {
                self.outbox.tell(player.id, format!("There is no arena named {}.", id));
                false
            }
        }
    }

    /// Leave whichever arena the player is playing in.
    pub fn leave(&mut self, player: &Player) -> bool {
        let game = self.games.values_mut().find(|g| g.has_player(player.id));
        match game {
            Some(game) => game.leave(player),
            None => {
                self.outbox.tell(player.id, "You are not in an arena.");
                false
            }
        }
    }

    /// Stop watching whichever arena the player is watching.
    pub fn back(&mut self, player: &Player) -> bool {
        let game = self.games.values_mut().find(|g| g.has_spectator(player.id));
        match game {
            Some(game) => game.back(player),
            None => {
                self.outbox.tell(player.id, "You are not watching an arena.");
                false
            }
        }
    }

    /// Re-read every arena's static settings after a configuration change.
    /// A floor moved onto another arena's floor is refused and the old one
    /// kept.
    pub fn reload(&mut self) {
        let keys: Vec<ArenaKey> = self.games.keys().collect();
        for key in keys {
            let Some(game) = self.games.get(key) else {
                continue;
            };
            let clash = game.configured_floor().and_then(|floor| {
                self.games
                    .iter()
                    .filter(|(other, _)| *other != key)
                    .find(|(_, g)| g.floor().is_some_and(|f| f.intersects(&floor)))
                    .map(|(_, g)| g.id().to_string())
            });
            if let Some(other) = &clash {
                tracing::warn!(
                    "Arena '{}': new floor overlaps arena '{}', keeping the old floor",
                    game.id(),
                    other
                );
            }
            if let Some(game) = self.games.get_mut(key) {
                game.define_settings(clash.is_some());
            }
        }
    }

    pub fn tick(&mut self) {
        for game in self.games.values_mut() {
            game.tick();
        }
    }

    /// Stop every running round, restoring the floors.
    pub fn shutdown(&mut self) {
        for game in self.games.values_mut() {
            if game.is_in_progress() {
                game.stop(None);
            }
        }
    }

    fn check_free(&self, player: &Player) -> bool {
        let Some(game) = self.session_of(player.id).and_then(|key| self.by_key(key)) else {
            return true;
        };
        self.outbox
            .tell(player.id, format!("You are already in arena {}.", game.name()));
        false
    }
}
