use crate::actor::ClusterSummary;
use crate::model::{StoreId, StoreStatus};
use crate::raft_engine::{EngineCounters, RaftEngine};
use crate::store_node::TaskCounts;
use std::collections::BTreeMap;
use std::fmt;
use tokio::time::Duration;

/// Why a run stopped.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    Converged,
    TickLimit,
    Cancelled,
    CheckerPanicked,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoreReport {
    pub id: StoreId,
    pub status: StoreStatus,
    pub region_count: u64,
    pub leader_count: u64,
    pub snapshots_sent: u64,
    pub snapshots_received: u64,
}

/// Everything printed after a run.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub case: String,
    pub outcome: Outcome,
    pub ticks: u64,
    pub elapsed: Duration,
    pub task_counts: BTreeMap<&'static str, TaskCounts>,
    pub stores: Vec<StoreReport>,
    pub counters: EngineCounters,
    pub control_plane: Option<ClusterSummary>,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Converged
    }

    /// The tick the checker first passed on.
    pub fn converged_tick(&self) -> Option<u64> {
        if self.passed() {
            Some(self.ticks)
        } else {
            None
        }
    }

    pub(crate) fn store_reports(engine: &RaftEngine) -> Vec<StoreReport> {
        engine
            .get_stores()
            .iter()
            .map(|store| {
                let stats = engine.store_region_stats(store.id());
                StoreReport {
                    id: store.id(),
                    status: store.status(),
                    region_count: stats.region_count,
                    leader_count: stats.leader_count,
                    snapshots_sent: store.snapshots_sent(),
                    snapshots_received: store.snapshots_received(),
                }
            })
            .collect()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.passed() { "OK" } else { "FAIL" };
        writeln!(
            f,
            "{} [{}] ticks={} elapsed={:?}",
            verdict, self.case, self.ticks, self.elapsed
        )?;
        match self.converged_tick() {
            Some(tick) => writeln!(f, "  converged at tick {}", tick)?,
            None => writeln!(f, "  stopped: {:?}", self.outcome)?,
        }

        for (kind, counts) in &self.task_counts {
            writeln!(
                f,
                "  task {:<16} applied={} stale={} skipped={}",
                kind, counts.applied, counts.stale, counts.skipped
            )?;
        }
        for store in &self.stores {
            writeln!(
                f,
                "  store {:<4} {:<9} regions={} leaders={} snap_sent={} snap_recv={}",
                store.id.as_u64(),
                format!("{:?}", store.status),
                store.region_count,
                store.leader_count,
                store.snapshots_sent,
                store.snapshots_received
            )?;
        }
        writeln!(
            f,
            "  splits={} split_aborts={} merges={} unavailable_region_ticks={} tombstoned_stores={}",
            self.counters.splits,
            self.counters.split_aborts,
            self.counters.merges,
            self.counters.unavailable_region_ticks,
            self.counters.tombstoned_stores
        )?;
        if let Some(summary) = &self.control_plane {
            writeln!(
                f,
                "  control plane: stores={} regions={} operators running={} finished={} timed_out={}",
                summary.stores,
                summary.regions,
                summary.running_operators,
                summary.finished_operators,
                summary.timed_out_operators
            )?;
        }

        Ok(())
    }
}
