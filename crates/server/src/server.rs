//! The whole spleef layer on one tick: queued events in, effects out.

use std::sync::Arc;
use std::time::Duration;

use spleef_engine::store::{BlockStore, Universe};
use tokio::sync::mpsc;

use crate::dispatch::{Dispatcher, EventQueue, WorldEvent};
use crate::game::ArenaContext;
use crate::outbox::{self, Effect, Outbox};
use crate::registry::Arenas;
use crate::settings::Settings;
use crate::snapshots::SnapshotStore;
use crate::update::UpdateChecker;

/// Above this the tick period would round down to zero.
const MAX_TICKS_PER_SECOND: u64 = 1000;

pub struct Server {
    universe: Arc<Universe>,
    settings: Arc<Settings>,
    arenas: Arenas,
    queue: EventQueue,
    dispatcher: Dispatcher,
    outbox: Outbox,
    effects: mpsc::UnboundedReceiver<Effect>,
    snapshots: SnapshotStore,
}

impl Server {
    /// Load every configured arena, recovering unfinished floors on the way.
    pub fn new(universe: Arc<Universe>, settings: Arc<Settings>, updates: Option<UpdateChecker>) -> Self {
        let (outbox, effects) = outbox::channel();
        let dir = settings
            .string("settings.snapshotDir")
            .unwrap_or_else(|| "snapshots".to_string());
        let snapshots = SnapshotStore::new(dir);
        tracing::info!("Floor snapshots are kept in {}", snapshots.dir().display());
        let store: Arc<dyn BlockStore> = universe.clone();

        let ctx = ArenaContext {
            store: Arc::clone(&store),
            settings: Arc::clone(&settings),
            outbox: outbox.clone(),
            snapshots: Some(snapshots.clone()),
        };
        let arenas = Arenas::from_settings(&ctx);
        let dispatcher = Dispatcher::new(store, Arc::clone(&settings), outbox.clone(), updates);

        Self {
            universe,
            settings,
            arenas,
            queue: EventQueue::new(),
            dispatcher,
            outbox,
            effects,
            snapshots,
        }
    }

    /// What a newly created session needs.
    pub fn context(&self) -> ArenaContext {
        ArenaContext {
            store: self.universe.clone(),
            settings: Arc::clone(&self.settings),
            outbox: self.outbox.clone(),
            snapshots: Some(self.snapshots.clone()),
        }
    }

    pub fn push(&mut self, event: WorldEvent) {
        self.queue.push(event);
    }

    pub fn universe(&self) -> &Arc<Universe> {
        &self.universe
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub fn arenas(&self) -> &Arenas {
        &self.arenas
    }

    pub fn arenas_mut(&mut self) -> &mut Arenas {
        &mut self.arenas
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Time between ticks for `settings.ticksPerSecond`, kept within
    /// 1..=1000 ticks per second.
    pub fn tick_period(&self) -> Duration {
        let tps = self
            .settings
            .u64("settings.ticksPerSecond", 20)
            .clamp(1, MAX_TICKS_PER_SECOND);
        Duration::from_millis(1000 / tps)
    }

    /// One game tick: dispatch queued events, advance arena timers, deliver
    /// update-check results. Returns the effects produced along the way.
    pub fn tick(&mut self) -> Vec<Effect> {
        for done in self.dispatcher.drain(&mut self.arenas, &mut self.queue) {
            if done.verdict.is_cancelled() {
                tracing::debug!("Cancelled {:?}", done.event);
            }
        }
        self.arenas.tick();
        self.dispatcher.deliver_updates();
        outbox::drain(&mut self.effects)
    }

    /// Stop running rounds and hand back the final effects.
    pub fn shutdown(&mut self) -> Vec<Effect> {
        self.arenas.shutdown();
        outbox::drain(&mut self.effects)
    }
}
