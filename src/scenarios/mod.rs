mod cases;
mod layout;

use crate::config::{ControlPlaneOverrides, SimConfig};
use crate::event::Event;
use crate::model::{Region, Store};
use crate::raft_engine::{MergePolicy, NeedSplit, RaftEngine};
use crate::scenarios::layout::Layout;

/// Success predicate, evaluated against the engine after every tick.
pub type Checker = Box<dyn Fn(&RaftEngine) -> bool + Send + Sync>;

/// A Scenario is everything a simulation run needs besides the config: the seeded cluster, the
/// events that perturb it and the condition that ends it.
pub struct Scenario {
    pub name: String,
    pub stores: Vec<Store>,
    pub regions: Vec<Region>,
    pub events: Vec<Event>,
    pub checker: Checker,
    pub need_split: Option<NeedSplit>,
    pub merge_policy: MergePolicy,
    /// Applied to the embedded control plane's config before it starts.
    pub control_plane: ControlPlaneOverrides,
}

impl Scenario {
    fn seeded(name: &str, config: &SimConfig, layout: &Layout, checker: Checker) -> Self {
        let (stores, regions) = layout.build(config.seed, config.store_capacity_bytes());
        Scenario {
            name: name.to_string(),
            stores,
            regions,
            events: Vec::new(),
            checker,
            need_split: None,
            merge_policy: MergePolicy::KeepSurvivorPeers,
            control_plane: ControlPlaneOverrides::default(),
        }
    }

    pub fn check(&self, engine: &RaftEngine) -> bool {
        (self.checker)(engine)
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("stores", &self.stores.len())
            .field("regions", &self.regions.len())
            .field("events", &self.events.len())
            .finish()
    }
}

pub fn case_names() -> Vec<&'static str> {
    cases::CASES.iter().map(|(name, _)| *name).collect()
}

/// Build the named case with `config`'s seed and per case overrides. None if no such case exists.
pub fn load(name: &str, config: &SimConfig) -> Option<Scenario> {
    cases::CASES
        .iter()
        .find(|(case, _)| *case == name)
        .map(|(case, build)| build(case, config))
}
