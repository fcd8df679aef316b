//! Arena sessions: the [`Game`] capability trait and its shared vocabulary.
//!
//! A game owns one arena's lifecycle. Its status only moves forward during a
//! round and drops back to `New` when the round is cleaned up:
//!
//! ```text
//! New -> Ready -> Countdown -> Started -> Finished -> (clean) -> New
//! ```
//!
//! Operations report policy rejections as `false` (after telling the player
//! why); they never return errors.

pub mod mode;
pub mod session;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use spleef_engine::region::CuboidRegion;
use spleef_engine::store::{BlockStore, WorldId};
use spleef_engine::world::block::Cell;
use spleef_engine::world::position::{BlockPos, Location};

use crate::outbox::Outbox;
use crate::player::{Player, PlayerId, Sender};
use crate::settings::Settings;
use crate::snapshots::SnapshotStore;

pub use mode::GameMode;
pub use session::ArenaSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    New = 1,
    Ready = 2,
    Countdown = 3,
    Started = 4,
    Finished = 5,
}

/// Which readiness channels an arena accepts, from `arenas.<id>.useReady`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyPolicy {
    /// Absent, `false`, or an unrecognised string: nobody has to ready up.
    NotRequired,
    /// `true`: chat command and ready block both count.
    Any,
    /// `"command"`
    CommandOnly,
    /// `"block"`
    BlockOnly,
}

impl ReadyPolicy {
    pub fn from_setting(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Bool(true)) => ReadyPolicy::Any,
            Some(Value::String(s)) if s.eq_ignore_ascii_case("command") => ReadyPolicy::CommandOnly,
            Some(Value::String(s)) if s.eq_ignore_ascii_case("block") => ReadyPolicy::BlockOnly,
            _ => ReadyPolicy::NotRequired,
        }
    }

    pub fn required(self) -> bool {
        self != ReadyPolicy::NotRequired
    }

    pub fn accepts_command(self) -> bool {
        matches!(self, ReadyPolicy::Any | ReadyPolicy::CommandOnly)
    }

    pub fn accepts_block(self) -> bool {
        matches!(self, ReadyPolicy::Any | ReadyPolicy::BlockOnly)
    }
}

/// Outcome of a cancelable event handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Cancel,
}

impl Verdict {
    pub fn is_cancelled(self) -> bool {
        self == Verdict::Cancel
    }
}

/// A block an event is about: where it is, and the cell involved (the cell
/// being broken, or the cell about to be placed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockEdit {
    pub world: WorldId,
    pub pos: BlockPos,
    pub cell: Cell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickAction {
    LeftClickBlock,
    RightClickBlock,
    LeftClickAir,
    RightClickAir,
    /// Stepping on a pressure plate, trampling farmland...
    Physical,
}

/// Everything a session needs from the outside world, injected at construction.
#[derive(Clone)]
pub struct ArenaContext {
    pub store: Arc<dyn BlockStore>,
    pub settings: Arc<Settings>,
    pub outbox: Outbox,
    /// Where captured floors are mirrored to disk; `None` keeps them in memory only.
    pub snapshots: Option<SnapshotStore>,
}

/// One arena, as seen by the registry, the dispatcher and the command layer.
pub trait Game {
    /// Lowercase stable identifier.
    fn id(&self) -> &str;
    /// Display name.
    fn name(&self) -> &str;
    fn status(&self) -> Status;
    /// Short name of the game mode ("standard", "team").
    fn kind(&self) -> &'static str;
    /// Current ready policy; read from configuration on every call.
    fn ready_policy(&self) -> ReadyPolicy;
    /// The floor this arena owns, if one is defined.
    fn floor(&self) -> Option<&CuboidRegion>;

    /// The floor as the configuration currently describes it.
    fn configured_floor(&self) -> Option<CuboidRegion>;

    /// Re-read the arena's static settings (mode, floor, loose area). With
    /// `keep_floor` the current floor stays even if the configuration moved it.
    fn define_settings(&mut self, keep_floor: bool);

    fn join(&mut self, player: &Player) -> bool;
    fn leave(&mut self, player: &Player) -> bool;
    fn team(&mut self, player: &Player, team: &str) -> bool;
    /// `hit_block` is true when readiness comes from touching the ready block.
    fn ready(&mut self, player: &Player, hit_block: bool) -> bool;
    fn countdown(&mut self, sender: &Sender) -> bool;
    /// Failures are reported to `sender`.
    fn start(&mut self, sender: &Sender) -> bool;
    fn stop(&mut self, player: Option<&Player>) -> bool;
    fn delete(&mut self, sender: &Sender) -> bool;
    fn watch(&mut self, player: &Player) -> bool;
    fn back(&mut self, player: &Player) -> bool;

    fn has_player(&self, id: PlayerId) -> bool;
    fn has_spectator(&self, id: PlayerId) -> bool;

    fn on_player_move(&mut self, player: &Player, to: &Location);
    /// Consulted before a teleport is committed; `false` vetoes it.
    fn player_may_teleport(&mut self, player: &Player) -> bool;
    fn on_player_interact(&mut self, player: &Player, action: ClickAction, block: Option<&BlockEdit>) -> Verdict;
    fn on_player_quit(&mut self, player: &Player);
    fn on_player_kick(&mut self, player: &Player, reason: &str);
    /// Called for every game whenever anybody connects to the server.
    fn on_player_join(&mut self, player: &Player);
    fn on_player_death(&mut self, player: &Player);
    fn on_block_break(&mut self, player: &Player, block: &BlockEdit) -> Verdict;
    fn on_block_place(&mut self, player: &Player, block: &BlockEdit) -> Verdict;

    /// Message everybody on the server (`broadcast`), or only this arena's
    /// players and spectators.
    fn send_message(&self, message: &str, broadcast: bool);
    /// Message this arena's players and spectators, except one.
    fn send_message_except(&self, message: &str, except: PlayerId);

    /// Something like `(1/2)`, or `(1)` when the arena has no player limit.
    fn number_of_players(&self) -> String;
    fn list_of_spleefers(&self) -> Option<String>;
    fn list_of_unready_spleefers(&self) -> Option<String>;
    fn list_of_spectators(&self) -> Option<String>;

    /// Advance timers by one game tick.
    fn tick(&mut self);
    /// End-of-round cleanup: restore the floor, empty the roster, back to `New`.
    fn clean(&mut self);
    /// Whether this particular block may be destroyed by a spleefer.
    fn check_may_break_block(&self, world: &WorldId, pos: BlockPos, cell: Cell) -> bool;

    fn supports_ready(&self) -> bool {
        self.ready_policy().required()
    }

    fn supports_command_ready(&self) -> bool {
        self.ready_policy().accepts_command()
    }

    fn supports_block_ready(&self) -> bool {
        self.ready_policy().accepts_block()
    }

    fn is_joinable(&self) -> bool {
        self.status() <= Status::Ready
    }

    fn is_ready(&self) -> bool {
        if self.supports_ready() {
            self.status() == Status::Ready
        } else {
            self.status() <= Status::Ready
        }
    }

    fn is_in_progress(&self) -> bool {
        matches!(self.status(), Status::Countdown | Status::Started)
    }

    fn is_in_game(&self) -> bool {
        self.status() == Status::Started
    }
}
