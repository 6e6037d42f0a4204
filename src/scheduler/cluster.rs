use crate::actor::ClusterSummary;
use crate::config::ControlPlaneConfig;
use crate::model::{Region, RegionId, StoreId, StoreStatus};
use crate::pd::{ControlPlaneError, HeartbeatResponse, StoreMeta, StoreStats};
use crate::scheduler::operator::{OperatorController, OperatorProgress};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::ops::Bound;

pub(crate) struct StoreInfo {
    pub(crate) meta: StoreMeta,
    pub(crate) stats: Option<StoreStats>,
}

/// Cluster is the whole state of the embedded control plane: bootstrap record, id allocator,
/// store table, a key ordered view of the regions as their leaders last reported them, and the
/// running operators.
pub(crate) struct Cluster {
    pub(super) logger: slog::Logger,
    pub(super) config: ControlPlaneConfig,
    cluster_id: u64,
    bootstrapped: Option<(StoreId, RegionId)>,
    next_id: u64,
    pub(super) stores: BTreeMap<StoreId, StoreInfo>,
    pub(super) regions: BTreeMap<RegionId, Region>,
    by_start_key: BTreeMap<Bytes, RegionId>,
    region_counts: BTreeMap<StoreId, i64>,
    leader_counts: BTreeMap<StoreId, i64>,
    pub(super) operators: OperatorController,
}

impl Cluster {
    pub(crate) fn new(logger: slog::Logger, config: ControlPlaneConfig, cluster_id: u64) -> Self {
        let operators = OperatorController::new(
            config.operator_timeout_heartbeats,
            config.region_schedule_limit,
            config.store_schedule_limit,
        );

        Cluster {
            logger,
            config,
            cluster_id,
            bootstrapped: None,
            next_id: 1,
            stores: BTreeMap::new(),
            regions: BTreeMap::new(),
            by_start_key: BTreeMap::new(),
            region_counts: BTreeMap::new(),
            leader_counts: BTreeMap::new(),
            operators,
        }
    }

    pub(crate) fn cluster_id(&self) -> u64 {
        self.cluster_id
    }

    pub(crate) fn alloc_id(&mut self, cluster_id: u64) -> Result<u64, ControlPlaneError> {
        self.check_cluster(cluster_id)?;
        Ok(self.next_id())
    }

    pub(super) fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub(crate) fn bootstrap(
        &mut self,
        cluster_id: u64,
        store: StoreMeta,
        region: Region,
        id_floor: u64,
    ) -> Result<(), ControlPlaneError> {
        self.check_cluster(cluster_id)?;
        self.next_id = self.next_id.max(id_floor);

        match self.bootstrapped {
            Some((store_id, region_id)) if store_id == store.id && region_id == region.id() => Ok(()),
            Some((store_id, region_id)) => Err(ControlPlaneError::BootstrapConflict { store_id, region_id }),
            None => {
                slog::info!(
                    self.logger,
                    "Bootstrapped with {:?} and {:?}, ids start at {}",
                    store.id,
                    region.id(),
                    self.next_id
                );
                self.bootstrapped = Some((store.id, region.id()));
                self.stores.insert(store.id, StoreInfo { meta: store, stats: None });
                self.put_region(region);
                Ok(())
            }
        }
    }

    pub(crate) fn put_store(&mut self, cluster_id: u64, store: StoreMeta) -> Result<(), ControlPlaneError> {
        self.check_bootstrapped(cluster_id)?;
        match self.stores.get_mut(&store.id) {
            Some(existing) if existing.meta.status == StoreStatus::Tombstone => {
                Err(ControlPlaneError::StoreTombstone(store.id))
            }
            Some(existing) => {
                if existing.meta.status != store.status {
                    slog::info!(self.logger, "Store {:?} is now {:?}", store.id, store.status);
                }
                existing.meta = store;
                Ok(())
            }
            None => {
                slog::info!(self.logger, "Store {:?} registered at {}", store.id, store.address);
                self.stores.insert(store.id, StoreInfo { meta: store, stats: None });
                Ok(())
            }
        }
    }

    pub(crate) fn store_heartbeat(&mut self, cluster_id: u64, stats: StoreStats) -> Result<(), ControlPlaneError> {
        self.check_bootstrapped(cluster_id)?;
        match self.stores.get_mut(&stats.store_id) {
            Some(info) if info.meta.status == StoreStatus::Tombstone => {
                Err(ControlPlaneError::StoreTombstone(stats.store_id))
            }
            Some(info) => {
                info.stats = Some(stats);
                Ok(())
            }
            None => Err(ControlPlaneError::ServerFault(format!(
                "Unknown store {:?}",
                stats.store_id
            ))),
        }
    }

    /// Fold a leader's report into the region view and decide the next scheduling step, if any.
    pub(crate) fn region_heartbeat(
        &mut self,
        cluster_id: u64,
        region: Region,
    ) -> Result<Option<HeartbeatResponse>, ControlPlaneError> {
        self.check_bootstrapped(cluster_id)?;

        if let Some(existing) = self.regions.get(&region.id()) {
            if region.epoch().is_stale_against(&existing.epoch()) {
                slog::debug!(self.logger, "Ignoring stale heartbeat of {:?}", region.id());
                return Ok(None);
            }
        }
        let overlaps = self.overlaps(&region);
        if overlaps
            .iter()
            .filter_map(|id| self.regions.get(id))
            .any(|other| other.epoch().version > region.epoch().version)
        {
            slog::debug!(self.logger, "Ignoring heartbeat of {:?}, a newer region overlaps", region.id());
            return Ok(None);
        }
        for id in overlaps {
            self.remove_region(id);
        }
        self.put_region(region.clone());

        let step = match self.operators.dispatch(&region) {
            Some(OperatorProgress::Running(step)) => Some(step),
            Some(OperatorProgress::Finished) => {
                slog::debug!(self.logger, "Operator on {:?} finished", region.id());
                self.schedule(&region)
            }
            Some(OperatorProgress::TimedOut) => {
                slog::warn!(self.logger, "Operator on {:?} timed out", region.id());
                None
            }
            None => self.schedule(&region),
        };

        Ok(step.map(|step| HeartbeatResponse {
            region_id: region.id(),
            epoch: region.epoch(),
            operator: Some(step.to_wire()),
        }))
    }

    // ------- Region view --------

    /// Regions in the view, other than `region` itself, whose range intersects it.
    fn overlaps(&self, region: &Region) -> Vec<RegionId> {
        let upper = if region.end_key().is_empty() {
            Bound::Unbounded
        } else {
            Bound::Excluded(region.end_key().as_ref())
        };

        let mut ids = Vec::new();
        for (_, id) in self.by_start_key.range::<[u8], _>((Bound::Unbounded, upper)).rev() {
            let other = match self.regions.get(id) {
                Some(other) => other,
                None => continue,
            };
            if !other.end_key().is_empty() && other.end_key() <= region.start_key() {
                break;
            }
            if *id != region.id() {
                ids.push(*id);
            }
        }

        ids
    }

    pub(super) fn put_region(&mut self, region: Region) {
        if let Some(old) = self.regions.get(&region.id()).cloned() {
            self.unindex(&old);
        }
        for peer in region.peers() {
            *self.region_counts.entry(peer.store_id()).or_default() += 1;
        }
        if let Some(leader) = region.leader_store_id() {
            *self.leader_counts.entry(leader).or_default() += 1;
        }
        self.by_start_key.insert(region.start_key().clone(), region.id());
        self.regions.insert(region.id(), region);
    }

    fn remove_region(&mut self, region_id: RegionId) {
        if let Some(old) = self.regions.remove(&region_id) {
            slog::debug!(self.logger, "Evicted {:?} from the region view", region_id);
            self.unindex(&old);
        }
        self.operators.remove(region_id);
    }

    fn unindex(&mut self, region: &Region) {
        for peer in region.peers() {
            *self.region_counts.entry(peer.store_id()).or_default() -= 1;
        }
        if let Some(leader) = region.leader_store_id() {
            *self.leader_counts.entry(leader).or_default() -= 1;
        }
        if self.by_start_key.get(region.start_key().as_ref()) == Some(&region.id()) {
            self.by_start_key.remove(region.start_key().as_ref());
        }
    }

    pub(super) fn prev_region(&self, region: &Region) -> Option<&Region> {
        if region.start_key().is_empty() {
            return None;
        }
        let (_, id) = self
            .by_start_key
            .range::<[u8], _>((Bound::Unbounded, Bound::Excluded(region.start_key().as_ref())))
            .next_back()?;
        self.regions.get(id).filter(|r| r.end_key() == region.start_key())
    }

    pub(super) fn next_region(&self, region: &Region) -> Option<&Region> {
        if region.end_key().is_empty() {
            return None;
        }
        let id = self.by_start_key.get(region.end_key().as_ref())?;
        self.regions.get(id)
    }

    // ------- Store view --------

    pub(super) fn is_store_up(&self, store_id: StoreId) -> bool {
        self.stores
            .get(&store_id)
            .map(|s| s.meta.status == StoreStatus::Up)
            .unwrap_or(false)
    }

    pub(super) fn up_stores(&self) -> impl Iterator<Item = StoreId> + '_ {
        self.stores
            .values()
            .filter(|s| s.meta.status == StoreStatus::Up)
            .map(|s| s.meta.id)
    }

    /// Replica count of `store_id` including what running operators are about to move.
    pub(super) fn region_score(&self, store_id: StoreId) -> i64 {
        self.region_counts.get(&store_id).copied().unwrap_or(0) + self.operators.region_influence(store_id)
    }

    pub(super) fn leader_score(&self, store_id: StoreId) -> i64 {
        self.leader_counts.get(&store_id).copied().unwrap_or(0) + self.operators.leader_influence(store_id)
    }

    pub(crate) fn region_count(&self, store_id: StoreId) -> i64 {
        self.region_counts.get(&store_id).copied().unwrap_or(0)
    }

    pub(crate) fn region_view_len(&self) -> usize {
        self.regions.len()
    }

    pub(crate) fn summary(&self) -> ClusterSummary {
        ClusterSummary {
            stores: self.stores.len(),
            regions: self.regions.len(),
            running_operators: self.operators.len(),
            finished_operators: self.operators.finished(),
            timed_out_operators: self.operators.timed_out(),
        }
    }

    // ------- Request checks --------

    fn check_cluster(&self, cluster_id: u64) -> Result<(), ControlPlaneError> {
        if cluster_id != self.cluster_id {
            return Err(ControlPlaneError::ClusterMismatch(self.cluster_id));
        }
        Ok(())
    }

    fn check_bootstrapped(&self, cluster_id: u64) -> Result<(), ControlPlaneError> {
        self.check_cluster(cluster_id)?;
        if self.bootstrapped.is_none() {
            return Err(ControlPlaneError::NotBootstrapped);
        }
        Ok(())
    }
}
