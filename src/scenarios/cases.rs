use crate::config::{CaseOverrides, ControlPlaneOverrides, SimConfig, MIB};
use crate::event::{Cadence, DeletePolicy, Event};
use crate::model::{RegionId, StoreId, StoreStatus};
use crate::raft_engine::{MergePolicy, RaftEngine};
use crate::scenarios::layout::{Layout, LeaderPlacement, Placement};
use crate::scenarios::Scenario;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Arc;

// Regions the split case has to reach from a single one.
const SPLIT_TARGET: usize = 16;
// Widest distance from the even share a balanced store may keep.
const REGION_SLACK_CAP: u64 = 15;
const LEADER_SLACK_CAP: u64 = 10;

pub(crate) type CaseBuilder = fn(&str, &SimConfig) -> Scenario;

pub(crate) const CASES: &[(&str, CaseBuilder)] = &[
    ("balance-region-small", balance_region_small),
    ("balance-leader", balance_leader),
    ("add-nodes", add_nodes),
    ("add-nodes-dynamic", add_nodes_dynamic),
    ("delete-nodes", delete_nodes),
    ("makeup-down-replicas", makeup_down_replicas),
    ("region-merge", region_merge),
    ("region-split", region_split),
    ("hot-write", hot_write),
    ("hot-read", hot_read),
];

// ------- Cases --------

fn balance_region_small(name: &str, config: &SimConfig) -> Scenario {
    let o = config.case(name);
    let layout = layout(&o, 4, 40, 10, 3);
    let (region_avg, _) = averages(&layout, layout.store_count);

    let mut scenario = Scenario::seeded(name, config, &layout, Box::new(move |engine| {
        up_stores(engine).iter().all(|(_, regions, _)| *regions as f64 == region_avg.round())
    }));
    scenario.control_plane.max_replicas = Some(layout.replicas);
    scenario
}

fn balance_leader(name: &str, config: &SimConfig) -> Scenario {
    let o = config.case(name);
    let layout = Layout {
        placement: Placement::RoundRobin,
        leader: LeaderPlacement::LowestStore,
        ..layout(&o, 4, 40, 10, 3)
    };
    let (_, leader_avg) = averages(&layout, layout.store_count);

    let mut scenario = Scenario::seeded(name, config, &layout, Box::new(move |engine| {
        up_stores(engine).iter().all(|(_, _, leaders)| within(*leaders, leader_avg, 0.2, u64::MAX))
    }));
    scenario.control_plane.max_replicas = Some(layout.replicas);
    scenario
}

/// Empty stores join at start and have to take their share.
fn add_nodes(name: &str, config: &SimConfig) -> Scenario {
    let o = config.case(name);
    let base = layout(&o, 3, 60, 10, 3);
    let target = o.target_store_count.unwrap_or(base.store_count * 2).max(base.store_count);
    let layout = Layout {
        store_count: target,
        seeded_stores: base.store_count,
        placement: Placement::RoundRobin,
        ..base
    };

    let mut scenario = Scenario::seeded(name, config, &layout, balanced(&layout, target));
    scenario.control_plane.max_replicas = Some(layout.replicas);
    scenario
}

fn add_nodes_dynamic(name: &str, config: &SimConfig) -> Scenario {
    let o = config.case(name);
    let layout = layout(&o, 8, 2000, 96, 3);
    let target = o.target_store_count.unwrap_or(16).max(layout.store_count);
    let every = o.interval_ticks.unwrap_or(100);

    let mut scenario = Scenario::seeded(name, config, &layout, balanced(&layout, target));
    scenario.events.push(Event::AddNodes {
        cadence: Cadence::Repeat {
            every,
            times: target - layout.store_count,
        },
    });
    scenario.control_plane.max_replicas = Some(layout.replicas);
    scenario
}

fn delete_nodes(name: &str, config: &SimConfig) -> Scenario {
    let o = config.case(name);
    let layout = layout(&o, 8, 1000, 96, 3);
    let target = o
        .target_store_count
        .unwrap_or(layout.store_count - 1)
        .max(layout.replicas as u64)
        .min(layout.store_count);
    let every = o.interval_ticks.unwrap_or(100);

    let mut scenario = Scenario::seeded(name, config, &layout, balanced(&layout, target));
    scenario.events.push(Event::DeleteNodes {
        cadence: Cadence::Repeat {
            every,
            times: layout.store_count - target,
        },
        policy: DeletePolicy::Random,
    });
    scenario.control_plane.max_replicas = Some(layout.replicas);
    scenario
}

/// Store 1 dies on the first tick. Every region needs a replacement replica on the survivors.
fn makeup_down_replicas(name: &str, config: &SimConfig) -> Scenario {
    let o = config.case(name);
    let layout = layout(&o, 4, 400, 10, 3);
    let expected = layout.region_count * layout.replicas as u64;

    let mut scenario = Scenario::seeded(name, config, &layout, Box::new(move |engine| {
        let dead = engine
            .get_store(StoreId::new(1))
            .map(|s| s.status() != StoreStatus::Up)
            .unwrap_or(true);
        let replicas_up: u64 = up_stores(engine).iter().map(|(_, regions, _)| *regions).sum();
        dead && replicas_up == expected
    }));
    scenario.events.push(Event::DeleteNodes {
        cadence: Cadence::At(1),
        policy: DeletePolicy::List(vec![StoreId::new(1)]),
    });
    scenario.control_plane.max_replicas = Some(layout.replicas);
    scenario
}

fn region_merge(name: &str, config: &SimConfig) -> Scenario {
    let o = config.case(name);
    let layout = layout(&o, 4, 40, 10, 3);
    let target = (layout.region_count * 3 / 4) as usize;

    // One operator at a time, so merges land one per heartbeat and the count passes through
    // every value on its way down.
    let mut scenario = Scenario::seeded(name, config, &layout, Box::new(move |engine| {
        engine.region_count() == target
    }));
    scenario.merge_policy = MergePolicy::KeepSurvivorPeers;
    scenario.control_plane = ControlPlaneOverrides {
        max_replicas: Some(layout.replicas),
        enable_merge: Some(true),
        max_merge_region_size_mb: Some(o.region_size_mb.unwrap_or(10) * 2),
        max_region_size_mb: Some(0),
        region_schedule_limit: Some(1),
    };
    scenario
}

/// Random writes grow regions until the engine splits them on its own.
fn region_split(name: &str, config: &SimConfig) -> Scenario {
    let o = config.case(name);
    let layout = layout(&o, 3, 1, 0, 3);
    let split_size = 64 * MIB;
    let target = SPLIT_TARGET;

    let mut scenario = Scenario::seeded(name, config, &layout, Box::new(move |engine| {
        engine.region_count() >= target
    }));
    scenario.need_split = Some(Arc::new(move |size, _| size >= split_size));
    scenario.events.push(Event::WriteFlowOnRandomRegion {
        cadence: Cadence::Every(1),
        bytes: o.flow_bytes.unwrap_or(8 * MIB),
    });
    scenario.control_plane.max_replicas = Some(layout.replicas);
    scenario
}

/// A single hot key keeps growing its region. The control plane splits it.
fn hot_write(name: &str, config: &SimConfig) -> Scenario {
    let o = config.case(name);
    let layout = layout(&o, 3, 10, 32, 3);
    let max_region_size_mb = 64;
    let target = layout.region_count as usize + 8;

    let mut scenario = Scenario::seeded(name, config, &layout, Box::new(move |engine| {
        engine.region_count() >= target
    }));
    scenario.events.push(Event::WriteFlowOnSpot {
        cadence: Cadence::Every(1),
        key: Bytes::new(),
        bytes: o.flow_bytes.unwrap_or(16 * MIB),
    });
    scenario.control_plane = ControlPlaneOverrides {
        max_replicas: Some(layout.replicas),
        max_region_size_mb: Some(max_region_size_mb),
        ..ControlPlaneOverrides::default()
    };
    scenario
}

/// Every region is read equally, but store 1 starts as the only leader. Read load follows
/// leadership, so it spreads only if leaders do.
fn hot_read(name: &str, config: &SimConfig) -> Scenario {
    let o = config.case(name);
    let layout = Layout {
        placement: Placement::RoundRobin,
        leader: LeaderPlacement::LowestStore,
        ..layout(&o, 4, 40, 10, 3)
    };
    let flow = o.flow_bytes.unwrap_or(MIB);
    let flows: BTreeMap<RegionId, u64> = (0..layout.region_count)
        .map(|i| (RegionId::new(layout.store_count + 1 + i), flow))
        .collect();

    let mut scenario = Scenario::seeded(name, config, &layout, Box::new(move |engine| {
        let reads: Vec<u64> = engine
            .get_stores()
            .iter()
            .filter(|s| s.is_up())
            .map(|s| engine.store_region_stats(s.id()).bytes_read)
            .collect();
        let total: u64 = reads.iter().sum();
        let max = reads.iter().copied().max().unwrap_or(0);
        total > 0 && (max as f64) <= 1.5 * total as f64 / reads.len() as f64
    }));
    scenario.events.push(Event::ReadFlowOnRegion {
        cadence: Cadence::At(1),
        flows,
    });
    scenario.control_plane.max_replicas = Some(layout.replicas);
    scenario
}

// ------- Helpers --------

fn layout(o: &CaseOverrides, stores: u64, regions: u64, size_mb: u64, replicas: usize) -> Layout {
    Layout::new(
        o.store_count.unwrap_or(stores),
        o.region_count.unwrap_or(regions),
        o.region_size_mb.unwrap_or(size_mb) * MIB,
        o.replicas.unwrap_or(replicas),
    )
}

/// Replicas and leaders per store once the layout's regions spread evenly over `stores`.
fn averages(layout: &Layout, stores: u64) -> (f64, f64) {
    let stores = stores.max(1) as f64;
    let regions = layout.region_count as f64;
    (regions * layout.replicas as f64 / stores, regions / stores)
}

/// Region counts within 4% and leader counts within 8% of the even share, over `stores` Up stores.
/// Large layouts cap the window at 15 regions and 10 leaders.
fn balanced(layout: &Layout, stores: u64) -> crate::scenarios::Checker {
    let (region_avg, leader_avg) = averages(layout, stores);
    let expected = stores as usize;

    Box::new(move |engine| {
        let up = up_stores(engine);
        up.len() == expected
            && up
                .iter()
                .all(|(_, regions, leaders)| {
                    within(*regions, region_avg, 0.04, REGION_SLACK_CAP)
                        && within(*leaders, leader_avg, 0.08, LEADER_SLACK_CAP)
                })
    })
}

/// Whether `count` sits within `ratio` of the whole part of `average`, give or take at least 2
/// and at most `cap`.
fn within(count: u64, average: f64, ratio: f64, cap: u64) -> bool {
    let share = average.floor();
    let slack = (share * ratio).floor().max(2.0).min(cap as f64);
    (count as f64 - share).abs() <= slack
}

fn up_stores(engine: &RaftEngine) -> Vec<(StoreId, u64, u64)> {
    engine
        .get_stores()
        .iter()
        .filter(|s| s.is_up())
        .map(|s| {
            let stats = engine.store_region_stats(s.id());
            (s.id(), stats.region_count, stats.leader_count)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepts(layout: &Layout, stores: u64, regions: u64, leaders: u64) -> (bool, bool) {
        let (region_avg, leader_avg) = averages(layout, stores);
        (
            within(regions, region_avg, 0.04, REGION_SLACK_CAP),
            within(leaders, leader_avg, 0.08, LEADER_SLACK_CAP),
        )
    }

    #[test]
    fn add_nodes_dynamic_window() {
        let layout = Layout::new(8, 2000, MIB, 3);

        assert_eq!((true, true), accepts(&layout, 16, 360, 115));
        assert_eq!((true, true), accepts(&layout, 16, 390, 135));
        assert_eq!((false, false), accepts(&layout, 16, 359, 114));
        assert_eq!((false, false), accepts(&layout, 16, 391, 136));
    }

    #[test]
    fn delete_nodes_window() {
        let layout = Layout::new(8, 1000, MIB, 3);

        assert_eq!((true, true), accepts(&layout, 7, 413, 132));
        assert_eq!((true, true), accepts(&layout, 7, 443, 152));
        assert_eq!((false, false), accepts(&layout, 7, 412, 131));
        assert_eq!((false, false), accepts(&layout, 7, 444, 153));
    }

    #[test]
    fn small_averages_keep_minimum_slack() {
        assert!(within(8, 10.0, 0.08, LEADER_SLACK_CAP));
        assert!(!within(7, 10.0, 0.08, LEADER_SLACK_CAP));
        assert!(within(3, 5.9, 0.08, LEADER_SLACK_CAP));
    }
}
