use crate::event::{DeletePolicy, Event};
use crate::model::{Store, StoreId, StoreStatus};
use crate::raft_engine::RaftEngine;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// What the driver has to do after an event changed the set of live stores.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Effect {
    StoreAdded(StoreId),
    StoreKilled(StoreId),
}

struct LiveEvent {
    event: Event,
    fired: u64,
}

/// EventRunner applies the scenario's events once per tick and retires the exhausted ones.
pub struct EventRunner {
    logger: slog::Logger,
    events: Vec<LiveEvent>,
    rng: StdRng,
    store_capacity: u64,
}

impl EventRunner {
    pub fn new(logger: slog::Logger, events: Vec<Event>, seed: u64, store_capacity: u64) -> Self {
        EventRunner {
            logger,
            events: events.into_iter().map(|event| LiveEvent { event, fired: 0 }).collect(),
            rng: StdRng::seed_from_u64(seed),
            store_capacity,
        }
    }

    pub fn live_events(&self) -> usize {
        self.events.len()
    }

    pub fn step(&mut self, tick: u64, engine: &RaftEngine) -> Vec<Effect> {
        let mut effects = Vec::new();

        for live in self.events.iter_mut() {
            if !live.event.cadence().fires_at(tick) {
                continue;
            }
            live.fired += 1;
            if let Some(effect) = apply(&self.logger, &mut self.rng, self.store_capacity, &live.event, engine) {
                effects.push(effect);
            }
        }

        let logger = &self.logger;
        self.events.retain(|live| {
            let done = live.event.cadence().is_exhausted(tick, live.fired);
            if done {
                slog::debug!(logger, "Retired {} after {} runs", live.event.name(), live.fired);
            }
            !done
        });

        effects
    }
}

fn apply(
    logger: &slog::Logger,
    rng: &mut StdRng,
    store_capacity: u64,
    event: &Event,
    engine: &RaftEngine,
) -> Option<Effect> {
    match event {
        Event::WriteFlowOnSpot { key, bytes, .. } => {
            if engine.write_key(key, *bytes).is_none() {
                slog::warn!(logger, "No region holds spot key {:?}", key);
            }
            None
        }
        Event::WriteFlowOnRegion { flows, .. } => {
            for (region_id, bytes) in flows {
                engine.update_region_store(*region_id, *bytes);
            }
            None
        }
        Event::WriteFlowOnRandomRegion { bytes, .. } => {
            if let Some(region) = engine.rand_region(rng) {
                engine.update_region_store(region.id(), *bytes);
            }
            None
        }
        Event::ReadFlowOnRegion { flows, .. } => {
            engine.update_region_read_bytes(flows);
            None
        }
        Event::AddNodes { .. } => add_node(logger, store_capacity, engine),
        Event::DeleteNodes { policy, .. } => kill_node(logger, rng, policy, engine),
    }
}

fn add_node(logger: &slog::Logger, store_capacity: u64, engine: &RaftEngine) -> Option<Effect> {
    let id = match engine.id_allocator().alloc() {
        Ok(id) => StoreId::new(id),
        Err(e) => {
            slog::error!(logger, "Cannot add store: {}", e);
            return None;
        }
    };

    match engine.add_store(Store::new(id, store_capacity)) {
        Ok(()) => {
            slog::info!(logger, "Added {:?}", id);
            Some(Effect::StoreAdded(id))
        }
        Err(e) => {
            slog::error!(logger, "Cannot add store: {}", e);
            None
        }
    }
}

fn kill_node(logger: &slog::Logger, rng: &mut StdRng, policy: &DeletePolicy, engine: &RaftEngine) -> Option<Effect> {
    let up: Vec<StoreId> = engine.get_stores().iter().filter(|s| s.is_up()).map(|s| s.id()).collect();
    let victim = match policy {
        DeletePolicy::Random => up.choose(rng).copied(),
        DeletePolicy::List(ids) => ids.iter().find(|id| up.contains(id)).copied(),
    };
    let victim = match victim {
        Some(victim) => victim,
        None => {
            slog::warn!(logger, "No Up store left to kill");
            return None;
        }
    };

    match engine.set_store_status(victim, StoreStatus::Down) {
        Ok(true) => {
            slog::info!(logger, "Killed {:?}", victim);
            Some(Effect::StoreKilled(victim))
        }
        Ok(false) => None,
        Err(e) => {
            slog::error!(logger, "Cannot kill {:?}: {}", victim, e);
            None
        }
    }
}
