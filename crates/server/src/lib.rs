pub mod block;
pub mod dispatch;
pub mod game;
pub mod outbox;
pub mod player;
pub mod registry;
pub mod server;
pub mod settings;
pub mod snapshots;
pub mod update;
