use crate::model::{Peer, PeerRole, Region, RegionId, StoreId};
use crate::pd::{ChangePeerType, Operator};
use std::collections::{BTreeMap, BTreeSet};

/// One step of a scheduling operator. Each step is sent to the region leader as a heartbeat
/// response, and counts as done once a later heartbeat shows its effect.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum OperatorStep {
    AddVoter { peer: Peer },
    AddLearner { peer: Peer },
    PromoteLearner { peer: Peer },
    RemovePeer { peer: Peer },
    TransferLeader { peer: Peer },
    Merge { source: Region },
    Split { from_version: u64 },
}

impl OperatorStep {
    pub(crate) fn is_done(&self, region: &Region) -> bool {
        match self {
            OperatorStep::AddVoter { peer } | OperatorStep::PromoteLearner { peer } => {
                region.peer(peer.id()).map(|p| !p.is_learner()).unwrap_or(false)
            }
            OperatorStep::AddLearner { peer } => region.peer(peer.id()).is_some(),
            OperatorStep::RemovePeer { peer } => region.peer(peer.id()).is_none(),
            OperatorStep::TransferLeader { peer } => region.leader().map(|p| p.id()) == Some(peer.id()),
            OperatorStep::Merge { source } => covers(region, source),
            OperatorStep::Split { from_version } => region.epoch().version > *from_version,
        }
    }

    pub(crate) fn to_wire(&self) -> Operator {
        match self {
            OperatorStep::AddVoter { peer } => Operator::ChangePeer {
                change: ChangePeerType::AddVoter,
                peer: *peer,
            },
            OperatorStep::AddLearner { peer } => Operator::ChangePeer {
                change: ChangePeerType::AddLearner,
                peer: peer.with_role(PeerRole::Learner),
            },
            // Stores treat AddVoter of an existing learner as a promotion.
            OperatorStep::PromoteLearner { peer } => Operator::ChangePeer {
                change: ChangePeerType::AddVoter,
                peer: peer.with_role(PeerRole::Voter),
            },
            OperatorStep::RemovePeer { peer } => Operator::ChangePeer {
                change: ChangePeerType::Remove,
                peer: *peer,
            },
            OperatorStep::TransferLeader { peer } => Operator::TransferLeader { peer: *peer },
            OperatorStep::Merge { source } => Operator::Merge { source: source.clone() },
            OperatorStep::Split { .. } => Operator::Split { keys: Vec::new() },
        }
    }

    fn stores(&self) -> Vec<StoreId> {
        match self {
            OperatorStep::AddVoter { peer }
            | OperatorStep::AddLearner { peer }
            | OperatorStep::PromoteLearner { peer }
            | OperatorStep::RemovePeer { peer }
            | OperatorStep::TransferLeader { peer } => vec![peer.store_id()],
            OperatorStep::Merge { source } => source.store_ids().into_iter().collect(),
            OperatorStep::Split { .. } => Vec::new(),
        }
    }
}

fn covers(region: &Region, other: &Region) -> bool {
    let start_ok = region.start_key() <= other.start_key();
    let end_ok = region.end_key().is_empty() || (!other.end_key().is_empty() && other.end_key() <= region.end_key());
    start_ok && end_ok
}

/// ScheduledOperator is an ordered list of steps against one region, plus the load it is expected
/// to shift between stores once done.
#[derive(Clone, Debug)]
pub(crate) struct ScheduledOperator {
    desc: &'static str,
    region_id: RegionId,
    steps: Vec<OperatorStep>,
    current: usize,
    // Heartbeats seen since the last step landed.
    stalled: u64,
    // Bypasses the global region schedule limit.
    urgent: bool,
    region_influence: Vec<(StoreId, i64)>,
    leader_influence: Vec<(StoreId, i64)>,
}

pub(crate) enum OperatorProgress {
    Running(OperatorStep),
    Finished,
    TimedOut,
}

impl ScheduledOperator {
    pub(crate) fn new(desc: &'static str, region: &Region, steps: Vec<OperatorStep>) -> Self {
        ScheduledOperator {
            desc,
            region_id: region.id(),
            steps,
            current: 0,
            stalled: 0,
            urgent: false,
            region_influence: Vec::new(),
            leader_influence: Vec::new(),
        }
    }

    pub(crate) fn urgent(mut self) -> Self {
        self.urgent = true;
        self
    }

    pub(crate) fn moving_region(mut self, from: StoreId, to: StoreId) -> Self {
        self.region_influence.push((from, -1));
        self.region_influence.push((to, 1));
        self
    }

    pub(crate) fn moving_leader(mut self, from: StoreId, to: StoreId) -> Self {
        self.leader_influence.push((from, -1));
        self.leader_influence.push((to, 1));
        self
    }

    pub(crate) fn desc(&self) -> &'static str {
        self.desc
    }

    pub(crate) fn region_id(&self) -> RegionId {
        self.region_id
    }

    pub(crate) fn steps(&self) -> &[OperatorStep] {
        &self.steps
    }

    pub(crate) fn current_step(&self) -> Option<&OperatorStep> {
        self.steps.get(self.current)
    }

    /// Skip every step `region` already reflects, then report where the operator stands. An
    /// operator times out after `timeout` consecutive heartbeats without a step landing.
    pub(crate) fn progress(&mut self, region: &Region, timeout: u64) -> OperatorProgress {
        let before = self.current;
        while let Some(step) = self.steps.get(self.current) {
            if !step.is_done(region) {
                break;
            }
            self.current += 1;
        }
        if self.current > before {
            self.stalled = 0;
        } else {
            self.stalled += 1;
        }

        match self.steps.get(self.current) {
            None => OperatorProgress::Finished,
            Some(_) if self.stalled >= timeout => OperatorProgress::TimedOut,
            Some(step) => OperatorProgress::Running(step.clone()),
        }
    }

    fn stores(&self) -> BTreeSet<StoreId> {
        self.steps.iter().flat_map(|s| s.stores()).collect()
    }
}

/// OperatorController keeps at most one running operator per region and enforces the schedule
/// limits.
pub(crate) struct OperatorController {
    operators: BTreeMap<RegionId, ScheduledOperator>,
    timeout: u64,
    region_limit: usize,
    store_limit: usize,
    finished: u64,
    timed_out: u64,
}

impl OperatorController {
    pub(crate) fn new(timeout: u64, region_limit: usize, store_limit: usize) -> Self {
        OperatorController {
            operators: BTreeMap::new(),
            timeout,
            region_limit,
            store_limit,
            finished: 0,
            timed_out: 0,
        }
    }

    pub(crate) fn contains(&self, region_id: RegionId) -> bool {
        self.operators.contains_key(&region_id)
    }

    pub(crate) fn len(&self) -> usize {
        self.operators.len()
    }

    pub(crate) fn finished(&self) -> u64 {
        self.finished
    }

    pub(crate) fn timed_out(&self) -> u64 {
        self.timed_out
    }

    /// Whether a non urgent operator may be added at all.
    pub(crate) fn has_region_budget(&self) -> bool {
        self.operators.len() < self.region_limit
    }

    pub(crate) fn store_has_budget(&self, store_id: StoreId) -> bool {
        self.store_load(store_id) < self.store_limit
    }

    fn store_load(&self, store_id: StoreId) -> usize {
        self.operators.values().filter(|op| op.stores().contains(&store_id)).count()
    }

    /// Returns false, dropping `operator`, if a limit refuses it.
    pub(crate) fn add(&mut self, operator: ScheduledOperator) -> bool {
        if self.operators.contains_key(&operator.region_id) {
            return false;
        }
        if !operator.urgent && !self.has_region_budget() {
            return false;
        }
        if operator.stores().into_iter().any(|s| !self.store_has_budget(s)) {
            return false;
        }
        self.operators.insert(operator.region_id, operator);
        true
    }

    pub(crate) fn remove(&mut self, region_id: RegionId) -> Option<ScheduledOperator> {
        self.operators.remove(&region_id)
    }

    /// Progress the operator of `region`, if any. Finished and timed out operators are removed.
    pub(crate) fn dispatch(&mut self, region: &Region) -> Option<OperatorProgress> {
        let operator = self.operators.get_mut(&region.id())?;
        let progress = operator.progress(region, self.timeout);
        match progress {
            OperatorProgress::Finished => {
                self.finished += 1;
                self.operators.remove(&region.id());
            }
            OperatorProgress::TimedOut => {
                self.timed_out += 1;
                self.operators.remove(&region.id());
            }
            OperatorProgress::Running(_) => {}
        }
        Some(progress)
    }

    pub(crate) fn region_influence(&self, store_id: StoreId) -> i64 {
        self.operators
            .values()
            .flat_map(|op| op.region_influence.iter())
            .filter(|(s, _)| *s == store_id)
            .map(|(_, delta)| delta)
            .sum()
    }

    pub(crate) fn leader_influence(&self, store_id: StoreId) -> i64 {
        self.operators
            .values()
            .flat_map(|op| op.leader_influence.iter())
            .filter(|(s, _)| *s == store_id)
            .map(|(_, delta)| delta)
            .sum()
    }
}
