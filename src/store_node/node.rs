use crate::config::SimConfig;
use crate::model::{PeerRole, Region, RegionId, StoreId};
use crate::pd::{ChangePeerType, HeartbeatResponse, Operator, StoreStats};
use crate::raft_engine::{CommitOutcome, RaftEngine};
use crate::store_node::heartbeat::{HeartbeatWorker, Outbound};
use crate::task::{Task, TaskKind};
use std::collections::{BTreeMap, BTreeSet};
use std::convert::TryFrom;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Commit outcomes of one task kind.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TaskCounts {
    pub applied: u64,
    pub stale: u64,
    pub skipped: u64,
}

impl TaskCounts {
    fn record(&mut self, outcome: CommitOutcome) {
        match outcome {
            CommitOutcome::Applied => self.applied += 1,
            CommitOutcome::Stale => self.stale += 1,
            CommitOutcome::Skipped => self.skipped += 1,
        }
    }

    pub fn merge(&mut self, other: &TaskCounts) {
        self.applied += other.applied;
        self.stale += other.stale;
        self.skipped += other.skipped;
    }
}

#[derive(Clone, Debug)]
struct NodeOptions {
    task_capacity: usize,
    speed: u64,
    store_heartbeat_interval: u64,
    region_heartbeat_interval: u64,
    max_heartbeats_per_tick: usize,
}

impl NodeOptions {
    fn from_config(config: &SimConfig) -> Self {
        NodeOptions {
            task_capacity: config.task_queue_capacity,
            speed: config.task_speed_bytes(),
            store_heartbeat_interval: config.store_heartbeat_interval_ticks,
            region_heartbeat_interval: config.region_heartbeat_interval_ticks,
            max_heartbeats_per_tick: config.max_heartbeats_per_tick,
        }
    }
}

/// Build a store node and the worker that carries its heartbeats. The worker must be run on its
/// own task for the node's reports to reach the control plane.
pub fn create(
    logger: slog::Logger,
    store_id: StoreId,
    engine: Arc<RaftEngine>,
    config: &SimConfig,
) -> (StoreNode, HeartbeatWorker) {
    let logger = logger.new(slog::o!("StoreId" => store_id.as_u64()));
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (response_tx, response_rx) = mpsc::unbounded_channel();

    let worker = HeartbeatWorker::new(logger.clone(), outbound_rx, response_tx);
    let node = StoreNode {
        logger,
        store_id,
        engine,
        options: NodeOptions::from_config(config),
        tasks: BTreeMap::new(),
        pending_heartbeats: BTreeSet::new(),
        ticks: 0,
        outbound: outbound_tx,
        responses: response_rx,
        task_counts: BTreeMap::new(),
    };

    (node, worker)
}

/// StoreNode is one simulated store. It turns control plane responses into tasks, advances them
/// once per tick, and reports its store and the regions it leads.
pub struct StoreNode {
    logger: slog::Logger,
    store_id: StoreId,
    engine: Arc<RaftEngine>,
    options: NodeOptions,
    // At most one task per region.
    tasks: BTreeMap<RegionId, Task>,
    pending_heartbeats: BTreeSet<RegionId>,
    ticks: u64,
    outbound: mpsc::UnboundedSender<Outbound>,
    responses: mpsc::UnboundedReceiver<HeartbeatResponse>,
    task_counts: BTreeMap<&'static str, TaskCounts>,
}

impl StoreNode {
    pub fn store_id(&self) -> StoreId {
        self.store_id
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn task(&self, region_id: RegionId) -> Option<&Task> {
        self.tasks.get(&region_id)
    }

    pub fn task_counts(&self) -> &BTreeMap<&'static str, TaskCounts> {
        &self.task_counts
    }

    pub fn tick(&mut self) {
        self.ticks += 1;

        while let Ok(response) = self.responses.try_recv() {
            self.accept_response(response);
        }

        let changed = self.engine.take_changed(self.store_id);
        self.pending_heartbeats.extend(changed);

        self.step_tasks();

        if (self.ticks - 1) % self.options.store_heartbeat_interval == 0 {
            self.send_store_heartbeat();
        }
        if (self.ticks - 1) % self.options.region_heartbeat_interval == 0 {
            let led = self.engine.leader_regions(self.store_id);
            self.pending_heartbeats.extend(led);
        }
        self.send_region_heartbeats();
    }

    /// Decode a heartbeat response into a task. Responses for regions this store no longer leads,
    /// or carrying an epoch older than the region's, are dropped.
    pub fn accept_response(&mut self, response: HeartbeatResponse) {
        let region = match self.engine.get_region(response.region_id) {
            Some(region) => region,
            None => {
                slog::debug!(self.logger, "Dropping response for unknown {:?}", response.region_id);
                return;
            }
        };
        if response.epoch.is_stale_against(&region.epoch()) {
            slog::debug!(
                self.logger,
                "Dropping stale response for {:?}: {:?} < {:?}",
                region.id(),
                response.epoch,
                region.epoch()
            );
            return;
        }
        if region.leader_store_id() != Some(self.store_id) {
            slog::debug!(self.logger, "Dropping response for {:?}, not led here", region.id());
            return;
        }
        let kind = match response.operator {
            Some(operator) => decode_operator(&region, operator),
            None => return,
        };

        if let Some(existing) = self.tasks.get(&region.id()) {
            if !existing.is_stale(&self.engine) {
                slog::debug!(self.logger, "{:?} already has {:?}, dropping {}", region.id(), existing, kind.name());
                return;
            }
        } else if self.tasks.len() >= self.options.task_capacity {
            slog::warn!(self.logger, "Task queue full, dropping {} on {:?}", kind.name(), region.id());
            return;
        }

        let task = Task::new(&region, kind);
        slog::debug!(self.logger, "Accepted {:?}", task);
        self.tasks.insert(region.id(), task);
    }

    fn step_tasks(&mut self) {
        let engine = &self.engine;
        let speed = self.options.speed;
        let mut finished = Vec::new();

        for (region_id, task) in self.tasks.iter_mut() {
            if let Some(outcome) = task.step(engine, speed) {
                slog::debug!(self.logger, "Finished {:?}", task);
                self.task_counts.entry(task.kind().name()).or_default().record(outcome);
            }
            if task.is_finished() {
                finished.push(*region_id);
            }
        }

        for region_id in finished {
            self.tasks.remove(&region_id);
        }
    }

    fn send_store_heartbeat(&mut self) {
        let store = match self.engine.get_store(self.store_id) {
            Some(store) => store,
            None => return,
        };
        let region_stats = self.engine.store_region_stats(self.store_id);
        let snapshots = self
            .tasks
            .values()
            .filter(|t| matches!(t.kind(), TaskKind::AddPeer { .. } | TaskKind::AddLearner { .. }))
            .count();

        let stats = StoreStats {
            store_id: self.store_id,
            capacity: store.capacity(),
            used_size: store.used(),
            available: store.available(),
            region_count: saturating_u32(region_stats.region_count as u64),
            leader_count: saturating_u32(region_stats.leader_count as u64),
            start_time: store.start_time(),
            sending_snap_count: saturating_u32(snapshots as u64),
            receiving_snap_count: saturating_u32(snapshots as u64),
            applied_snap_count: saturating_u32(store.snapshots_received()),
            bytes_written: region_stats.bytes_written,
            bytes_read: region_stats.bytes_read,
        };
        self.send(Outbound::Store(stats));
    }

    fn send_region_heartbeats(&mut self) {
        let mut sent = 0;
        while sent < self.options.max_heartbeats_per_tick {
            let region_id = match self.pending_heartbeats.iter().next().copied() {
                Some(region_id) => region_id,
                None => break,
            };
            self.pending_heartbeats.remove(&region_id);

            let region: Region = match self.engine.get_region(region_id) {
                Some(region) if region.leader_store_id() == Some(self.store_id) => region,
                _ => continue,
            };
            self.send(Outbound::Region(region));
            sent += 1;
        }
    }

    fn send(&self, message: Outbound) {
        if self.outbound.send(message).is_err() {
            slog::debug!(self.logger, "Heartbeat worker is gone, report dropped");
        }
    }
}

fn decode_operator(region: &Region, operator: Operator) -> TaskKind {
    match operator {
        Operator::ChangePeer {
            change: ChangePeerType::AddVoter,
            peer,
        } => match region.peer(peer.id()) {
            Some(existing) if existing.is_learner() => TaskKind::PromoteLearner {
                peer: existing.with_role(PeerRole::Voter),
            },
            _ => TaskKind::AddPeer {
                peer: peer.with_role(PeerRole::Voter),
            },
        },
        Operator::ChangePeer {
            change: ChangePeerType::AddLearner,
            peer,
        } => TaskKind::AddLearner {
            peer: peer.with_role(PeerRole::Learner),
        },
        Operator::ChangePeer {
            change: ChangePeerType::Remove,
            peer,
        } => TaskKind::RemovePeer { peer },
        Operator::TransferLeader { peer } => TaskKind::TransferLeader { peer },
        Operator::Merge { source } => TaskKind::MergeRegion { source: source.id() },
        Operator::Split { keys } => TaskKind::SplitRegion { keys },
    }
}

fn saturating_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
