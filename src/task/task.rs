use crate::model::{Peer, PeerRole, Region, RegionEpoch, RegionId, StoreId};
use crate::raft_engine::{CommitOutcome, RaftEngine};
use bytes::Bytes;
use std::fmt;

/// What a task does once its residual bytes have been transferred.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TaskKind {
    AddPeer { peer: Peer },
    AddLearner { peer: Peer },
    PromoteLearner { peer: Peer },
    RemovePeer { peer: Peer },
    TransferLeader { peer: Peer },
    MergeRegion { source: RegionId },
    SplitRegion { keys: Vec<Bytes> },
}

impl TaskKind {
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::AddPeer { .. } => "add-peer",
            TaskKind::AddLearner { .. } => "add-learner",
            TaskKind::PromoteLearner { .. } => "promote-learner",
            TaskKind::RemovePeer { .. } => "remove-peer",
            TaskKind::TransferLeader { .. } => "transfer-leader",
            TaskKind::MergeRegion { .. } => "merge-region",
            TaskKind::SplitRegion { .. } => "split-region",
        }
    }

    fn moves_data(&self) -> bool {
        matches!(
            self,
            TaskKind::AddPeer { .. } | TaskKind::AddLearner { .. } | TaskKind::RemovePeer { .. }
        )
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TaskState {
    Running,
    Finished(CommitOutcome),
}

/// Task is one long running operation against a region, created from a control plane response.
///
/// Peer changes first drain `residual` bytes at the store's transfer speed, then commit in one
/// step. Every other kind commits on its first step. A task is stepped until it is Finished, and
/// never leaves that state.
#[derive(Clone)]
pub struct Task {
    region_id: RegionId,
    epoch: RegionEpoch,
    kind: TaskKind,
    residual: u64,
    state: TaskState,
}

impl Task {
    /// Capture `region`'s epoch and size. The epoch is what the commit is checked against.
    pub fn new(region: &Region, kind: TaskKind) -> Self {
        let residual = if kind.moves_data() {
            region.approximate_size()
        } else {
            0
        };

        Task {
            region_id: region.id(),
            epoch: region.epoch(),
            kind,
            residual,
            state: TaskState::Running,
        }
    }

    pub fn region_id(&self) -> RegionId {
        self.region_id
    }

    pub fn epoch(&self) -> RegionEpoch {
        self.epoch
    }

    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    pub fn residual(&self) -> u64 {
        self.residual
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, TaskState::Finished(_))
    }

    /// A task is stale once its region has moved past the captured epoch, or is gone.
    pub fn is_stale(&self, engine: &RaftEngine) -> bool {
        match engine.get_region(self.region_id) {
            Some(region) => self.epoch.is_stale_against(&region.epoch()),
            None => true,
        }
    }

    /// Advance by one tick, transferring up to `speed` bytes. Returns the commit outcome on the
    /// step that finishes the task.
    pub fn step(&mut self, engine: &RaftEngine, speed: u64) -> Option<CommitOutcome> {
        if self.is_finished() {
            return None;
        }

        self.residual = self.residual.saturating_sub(speed);
        if self.residual > 0 {
            return None;
        }

        let outcome = self.commit(engine);
        self.state = TaskState::Finished(outcome);
        Some(outcome)
    }

    fn commit(&self, engine: &RaftEngine) -> CommitOutcome {
        let (region_id, epoch) = (self.region_id, self.epoch);
        match &self.kind {
            TaskKind::AddPeer { peer } | TaskKind::AddLearner { peer } => {
                let sender = engine.get_region(region_id).and_then(|r| r.leader_store_id());
                let outcome = engine.apply_add_peer(region_id, epoch, *peer);
                if outcome == CommitOutcome::Applied {
                    record_snapshot(engine, sender, peer.store_id());
                }
                outcome
            }
            TaskKind::PromoteLearner { peer } => {
                engine.apply_add_peer(region_id, epoch, peer.with_role(PeerRole::Voter))
            }
            TaskKind::RemovePeer { peer } => engine.apply_remove_peer(region_id, epoch, peer.id()),
            TaskKind::TransferLeader { peer } => engine.apply_transfer_leader(region_id, epoch, peer.id()),
            TaskKind::MergeRegion { source } => engine
                .merge_regions(region_id, epoch, *source)
                .unwrap_or(CommitOutcome::Skipped),
            TaskKind::SplitRegion { keys } => engine.apply_split(region_id, epoch, keys),
        }
    }
}

fn record_snapshot(engine: &RaftEngine, sender: Option<StoreId>, receiver: StoreId) {
    if let Some(sender) = sender {
        engine.record_snapshot(sender, receiver);
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Task({} {:?}@{}/{} residual={} {:?})",
            self.kind.name(),
            self.region_id,
            self.epoch.conf_ver,
            self.epoch.version,
            self.residual,
            self.state
        )
    }
}
