//! Player-facing effects produced by arena sessions.
//!
//! Sessions never talk to clients directly. Every chat line and teleport is
//! queued as an [`Effect`] on an unbounded `tokio::sync::mpsc` channel; the
//! tick loop drains the receiver and hands the effects to whatever transport
//! is attached (the binary just logs them).

use spleef_engine::world::position::Location;
use tokio::sync::mpsc;

use crate::player::{PlayerId, Sender};

#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// A chat line for one player.
    Message { to: PlayerId, text: String },
    /// A chat line for everybody on the server.
    Broadcast { text: String },
    /// Move a player. Session-initiated teleports always carry a pass.
    Teleport { player: PlayerId, to: Location },
}

/// Sending half of the effect channel. Cheap to clone: one per session.
#[derive(Clone, Debug)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Effect>,
}

/// Create an outbox and the receiver the tick loop drains.
pub fn channel() -> (Outbox, mpsc::UnboundedReceiver<Effect>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Outbox { tx }, rx)
}

impl Outbox {
    pub fn tell(&self, to: PlayerId, text: impl Into<String>) {
        // A closed receiver only happens during shutdown; nothing left to deliver to.
        let _ = self.tx.send(Effect::Message {
            to,
            text: text.into(),
        });
    }

    pub fn broadcast(&self, text: impl Into<String>) {
        let _ = self.tx.send(Effect::Broadcast { text: text.into() });
    }

    pub fn teleport(&self, player: PlayerId, to: Location) {
        let _ = self.tx.send(Effect::Teleport { player, to });
    }

    /// Reply to a command sender: players get a chat line, the console a log line.
    pub fn reply(&self, sender: &Sender, text: impl Into<String>) {
        match sender.player_id() {
            Some(id) => self.tell(id, text),
            None => tracing::info!("{}", text.into()),
        }
    }
}

/// Drain everything currently queued without waiting.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Effect>) -> Vec<Effect> {
    let mut effects = Vec::new();
    while let Ok(effect) = rx.try_recv() {
        effects.push(effect);
    }
    effects
}
