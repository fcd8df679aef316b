//! Who is acting: players and command senders.

use std::fmt;

use serde::{Deserialize, Serialize};
use spleef_engine::world::position::Location;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// The offline-mode id derived from a player name.
    pub fn offline(name: &str) -> Self {
        Self(Uuid::new_v3(
            &Uuid::NAMESPACE_URL,
            format!("OfflinePlayer:{}", name).as_bytes(),
        ))
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A player as seen at the moment an event or command was issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub location: Location,
    /// Operator or holder of the admin permission.
    #[serde(default)]
    pub admin: bool,
}

impl Player {
    /// An offline-mode player standing at `location`.
    pub fn new(name: &str, location: Location) -> Self {
        Self {
            id: PlayerId::offline(name),
            name: name.to_string(),
            location,
            admin: false,
        }
    }

    pub fn with_admin(mut self, admin: bool) -> Self {
        self.admin = admin;
        self
    }
}

/// Issuer of an arena command.
#[derive(Debug, Clone)]
pub enum Sender {
    Console,
    Player(Player),
}

impl Sender {
    pub fn name(&self) -> &str {
        match self {
            Sender::Console => "console",
            Sender::Player(p) => &p.name,
        }
    }

    /// The console is always an administrator.
    pub fn is_admin(&self) -> bool {
        match self {
            Sender::Console => true,
            Sender::Player(p) => p.admin,
        }
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        match self {
            Sender::Console => None,
            Sender::Player(p) => Some(p.id),
        }
    }
}
