use crate::model::{
    split_key, IdAllocator, IdExhausted, Peer, PeerId, Region, RegionEpoch, RegionId, Store, StoreId, StoreStatus,
};
use crate::raft_engine::region_tree::RegionTree;
use bytes::Bytes;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Scenario supplied predicate over `(approximate_size, approximate_keys)`.
pub type NeedSplit = Arc<dyn Fn(u64, u64) -> bool + Send + Sync>;

/// How the peers of two merged regions are reconciled on the survivor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MergePolicy {
    /// The survivor keeps exactly its own peers. The absorbed region's peers are dropped.
    KeepSurvivorPeers,
    /// The survivor keeps its own peers and adopts the absorbed region's peers on stores it is not
    /// already on.
    UnionByStore,
}

/// Result of committing a task's effect against the current region state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommitOutcome {
    Applied,
    /// The captured epoch lags behind the region's. Nothing changed.
    Stale,
    /// The region is gone, or the change no longer makes sense against it. Nothing changed.
    Skipped,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Region {0:?} not found")]
    RegionNotFound(RegionId),
    #[error("Store {0:?} already exists")]
    StoreExists(StoreId),
    #[error("Store {0:?} not found")]
    StoreNotFound(StoreId),
    #[error("Split key {key:?} is not strictly inside region {region_id:?}")]
    InvalidSplitKey { region_id: RegionId, key: Bytes },
    #[error("Regions {0:?} and {1:?} are not adjacent")]
    NotAdjacent(RegionId, RegionId),
    #[error(transparent)]
    IdExhausted(#[from] IdExhausted),
    #[error("Invalid initial layout: {0}")]
    InvalidLayout(String),
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct EngineCounters {
    pub splits: u64,
    pub split_aborts: u64,
    pub merges: u64,
    /// Sum over ticks of the number of regions without a leader.
    pub unavailable_region_ticks: u64,
    pub tombstoned_stores: u64,
}

/// Per store aggregate over the regions it hosts.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct StoreRegionStats {
    pub region_count: u64,
    pub leader_count: u64,
    pub bytes_written: u64,
    pub bytes_read: u64,
}

pub struct EngineOptions {
    pub need_split: Option<NeedSplit>,
    pub merge_policy: MergePolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            need_split: None,
            merge_policy: MergePolicy::KeepSurvivorPeers,
        }
    }
}

/// RaftEngine is the authoritative in-memory state of every region and store.
///
/// All state sits behind one lock. Writers are `step_regions`, the split/merge paths and task
/// commits. Everything else only reads.
pub struct RaftEngine {
    logger: slog::Logger,
    ids: Arc<IdAllocator>,
    need_split: Option<NeedSplit>,
    merge_policy: MergePolicy,
    state: RwLock<EngineState>,
}

struct EngineState {
    regions: BTreeMap<RegionId, Region>,
    tree: RegionTree,
    stores: BTreeMap<StoreId, Store>,
    // Leader store -> regions changed since that store's last heartbeat batch.
    changed: BTreeMap<StoreId, BTreeSet<RegionId>>,
    unavailable: BTreeSet<RegionId>,
    counters: EngineCounters,
}

impl RaftEngine {
    pub fn new(
        logger: slog::Logger,
        ids: Arc<IdAllocator>,
        stores: Vec<Store>,
        regions: Vec<Region>,
        options: EngineOptions,
    ) -> Result<Self, EngineError> {
        let state = EngineState::build(stores, regions)?;
        slog::info!(
            logger,
            "Engine seeded with {} stores and {} regions",
            state.stores.len(),
            state.regions.len()
        );

        Ok(RaftEngine {
            logger,
            ids,
            need_split: options.need_split,
            merge_policy: options.merge_policy,
            state: RwLock::new(state),
        })
    }

    pub fn id_allocator(&self) -> &Arc<IdAllocator> {
        &self.ids
    }

    pub fn merge_policy(&self) -> MergePolicy {
        self.merge_policy
    }

    // ------- Readers --------

    pub fn get_region(&self, region_id: RegionId) -> Option<Region> {
        self.read().regions.get(&region_id).cloned()
    }

    /// Region whose range contains `key`.
    pub fn search_region(&self, key: &[u8]) -> Option<Region> {
        let state = self.read();
        state
            .tree
            .search(key)
            .and_then(|id| state.regions.get(&id))
            .filter(|region| region.contains_key(key))
            .cloned()
    }

    pub fn rand_region<R: Rng>(&self, rng: &mut R) -> Option<Region> {
        let state = self.read();
        if state.regions.is_empty() {
            return None;
        }
        let index = rng.gen_range(0..state.regions.len());
        state.regions.values().nth(index).cloned()
    }

    /// Every region, ordered by start key.
    pub fn get_regions(&self) -> Vec<Region> {
        let state = self.read();
        let mut regions = Vec::with_capacity(state.tree.len());
        regions.extend(state.tree.ordered_ids().filter_map(|id| state.regions.get(id)).cloned());
        regions
    }

    pub fn region_count(&self) -> usize {
        self.read().regions.len()
    }

    pub fn leader_regions(&self, store_id: StoreId) -> Vec<RegionId> {
        self.read()
            .regions
            .values()
            .filter(|r| r.leader_store_id() == Some(store_id))
            .map(|r| r.id())
            .collect()
    }

    pub fn get_store(&self, store_id: StoreId) -> Option<Store> {
        self.read().stores.get(&store_id).cloned()
    }

    pub fn get_stores(&self) -> Vec<Store> {
        self.read().stores.values().cloned().collect()
    }

    pub fn store_region_stats(&self, store_id: StoreId) -> StoreRegionStats {
        let state = self.read();
        let mut stats = StoreRegionStats::default();
        for region in state.regions.values() {
            if region.peer_on_store(store_id).is_none() {
                continue;
            }
            stats.region_count += 1;
            if region.leader_store_id() == Some(store_id) {
                stats.leader_count += 1;
                stats.bytes_written += region.written_bytes();
                stats.bytes_read += region.read_bytes();
            }
        }

        stats
    }

    pub fn unavailable_regions(&self) -> BTreeSet<RegionId> {
        self.read().unavailable.clone()
    }

    pub fn counters(&self) -> EngineCounters {
        self.read().counters
    }

    /// Largest id of any store, region or peer currently known.
    pub fn max_id(&self) -> u64 {
        let state = self.read();
        let stores = state.stores.keys().map(|id| id.as_u64());
        let regions = state.regions.values().flat_map(|r| {
            std::iter::once(r.id().as_u64()).chain(r.peers().iter().map(|p| p.id().as_u64()))
        });
        stores.chain(regions).max().unwrap_or(0)
    }

    // ------- Writers --------

    /// Resolve derived state once per tick: leader validity, split triggering and store
    /// tombstoning.
    pub fn step_regions(&self) {
        let mut guard = self.write();
        let state = &mut *guard;

        let region_ids: Vec<RegionId> = state.regions.keys().copied().collect();
        for region_id in region_ids {
            state.check_leader(&self.logger, region_id);

            let wants_split = match (&self.need_split, state.regions.get(&region_id)) {
                (Some(need_split), Some(region)) => need_split(region.approximate_size(), region.approximate_keys()),
                _ => false,
            };
            if wants_split {
                if let Err(e) = state.split(&self.logger, &self.ids, region_id, None) {
                    state.counters.split_aborts += 1;
                    slog::warn!(self.logger, "Split of {:?} aborted: {}", region_id, e);
                }
            }
        }

        state.tombstone_empty_down_stores(&self.logger);
        state.counters.unavailable_region_ticks += state.unavailable.len() as u64;
    }

    /// Split `region_id` at `key`, or at a synthesized midpoint if `key` is None.
    pub fn split_region(&self, region_id: RegionId, key: Option<Bytes>) -> Result<RegionId, EngineError> {
        let mut guard = self.write();
        let result = guard.split(&self.logger, &self.ids, region_id, key);
        if result.is_err() {
            guard.counters.split_aborts += 1;
        }
        result
    }

    /// Split at the first of `keys` that lies strictly inside the region, if the epoch is current.
    pub fn apply_split(&self, region_id: RegionId, epoch: RegionEpoch, keys: &[Bytes]) -> CommitOutcome {
        let mut guard = self.write();
        let state = &mut *guard;
        let region = match state.regions.get(&region_id) {
            Some(region) => region,
            None => return CommitOutcome::Skipped,
        };
        if epoch.is_stale_against(&region.epoch()) {
            return CommitOutcome::Stale;
        }

        let key = if keys.is_empty() {
            None
        } else {
            match keys.iter().find(|k| is_strictly_inside(region, k)) {
                Some(key) => Some(key.clone()),
                None => return CommitOutcome::Skipped,
            }
        };

        match state.split(&self.logger, &self.ids, region_id, key) {
            Ok(_) => CommitOutcome::Applied,
            Err(e) => {
                state.counters.split_aborts += 1;
                slog::warn!(self.logger, "Split of {:?} aborted: {}", region_id, e);
                CommitOutcome::Skipped
            }
        }
    }

    /// Fold `source_id` into `region_id` (or the other way round, the lower id survives).
    pub fn merge_regions(
        &self,
        region_id: RegionId,
        epoch: RegionEpoch,
        source_id: RegionId,
    ) -> Result<CommitOutcome, EngineError> {
        let mut guard = self.write();
        guard.merge(&self.logger, self.merge_policy, region_id, epoch, source_id)
    }

    /// Add `peer`, or flip its role if a peer with the same id already exists.
    pub fn apply_add_peer(&self, region_id: RegionId, epoch: RegionEpoch, peer: Peer) -> CommitOutcome {
        let mut guard = self.write();
        let state = &mut *guard;
        let region = match state.regions.get_mut(&region_id) {
            Some(region) => region,
            None => return CommitOutcome::Skipped,
        };
        if epoch.is_stale_against(&region.epoch()) {
            return CommitOutcome::Stale;
        }
        if !state.stores.get(&peer.store_id()).map(Store::is_up).unwrap_or(false) {
            return CommitOutcome::Skipped;
        }
        if let Some(existing) = region.peer_on_store(peer.store_id()) {
            if existing.id() != peer.id() {
                return CommitOutcome::Skipped;
            }
        }
        if !region.upsert_peer(peer) {
            return CommitOutcome::Skipped;
        }
        region.bump_conf_ver();
        mark_changed(&mut state.changed, region);

        slog::debug!(self.logger, "Added {:?} to {:?}", peer, region_id);
        CommitOutcome::Applied
    }

    /// Remove `peer_id` unless it is the current leader.
    pub fn apply_remove_peer(&self, region_id: RegionId, epoch: RegionEpoch, peer_id: PeerId) -> CommitOutcome {
        let mut guard = self.write();
        let state = &mut *guard;
        let region = match state.regions.get_mut(&region_id) {
            Some(region) => region,
            None => return CommitOutcome::Skipped,
        };
        if epoch.is_stale_against(&region.epoch()) {
            return CommitOutcome::Stale;
        }
        if region.leader().map(|p| p.id()) == Some(peer_id) {
            return CommitOutcome::Skipped;
        }
        if region.remove_peer(peer_id).is_none() {
            return CommitOutcome::Skipped;
        }
        region.bump_conf_ver();
        mark_changed(&mut state.changed, region);

        slog::debug!(self.logger, "Removed {:?} from {:?}", peer_id, region_id);
        CommitOutcome::Applied
    }

    pub fn apply_transfer_leader(&self, region_id: RegionId, epoch: RegionEpoch, peer_id: PeerId) -> CommitOutcome {
        let mut guard = self.write();
        let state = &mut *guard;
        let region = match state.regions.get_mut(&region_id) {
            Some(region) => region,
            None => return CommitOutcome::Skipped,
        };
        if epoch.is_stale_against(&region.epoch()) {
            return CommitOutcome::Stale;
        }
        let stores = &state.stores;
        let target_up = region
            .peer(peer_id)
            .and_then(|p| stores.get(&p.store_id()))
            .map(Store::is_up)
            .unwrap_or(false);
        if !target_up || region.leader().map(|p| p.id()) == Some(peer_id) {
            return CommitOutcome::Skipped;
        }
        if !region.set_leader(peer_id) {
            return CommitOutcome::Skipped;
        }
        state.unavailable.remove(&region_id);
        mark_changed(&mut state.changed, region);
        CommitOutcome::Applied
    }

    /// `update_region_store()` applies a write of `bytes` to the region: its size grows, its write
    /// rate for this tick is set, and every store hosting a peer is credited.
    pub fn update_region_store(&self, region_id: RegionId, bytes: u64) -> bool {
        let mut guard = self.write();
        let state = &mut *guard;
        let region = match state.regions.get_mut(&region_id) {
            Some(region) => region,
            None => return false,
        };
        region.record_write(bytes);
        for peer in region.peers() {
            if let Some(store) = state.stores.get_mut(&peer.store_id()) {
                store.credit_used(bytes);
            }
        }
        true
    }

    /// Write `bytes` to whichever region holds `key`.
    pub fn write_key(&self, key: &[u8], bytes: u64) -> Option<RegionId> {
        let region_id = self.search_region(key)?.id();
        if self.update_region_store(region_id, bytes) {
            Some(region_id)
        } else {
            None
        }
    }

    pub fn update_region_read_bytes(&self, read_bytes: &BTreeMap<RegionId, u64>) {
        let mut state = self.write();
        for (region_id, bytes) in read_bytes {
            if let Some(region) = state.regions.get_mut(region_id) {
                region.set_read_bytes(*bytes);
            }
        }
    }

    /// Write rates only cover a single tick.
    pub fn reset_written_bytes(&self) {
        let mut state = self.write();
        for region in state.regions.values_mut() {
            if region.written_bytes() != 0 {
                region.set_written_bytes(0);
            }
        }
    }

    pub fn record_snapshot(&self, from: StoreId, to: StoreId) {
        let mut state = self.write();
        if let Some(store) = state.stores.get_mut(&from) {
            store.record_snapshot_sent();
        }
        if let Some(store) = state.stores.get_mut(&to) {
            store.record_snapshot_received();
        }
    }

    pub fn add_store(&self, store: Store) -> Result<(), EngineError> {
        let mut state = self.write();
        if state.stores.contains_key(&store.id()) {
            return Err(EngineError::StoreExists(store.id()));
        }
        slog::info!(self.logger, "Store {:?} joined", store.id());
        state.stores.insert(store.id(), store);
        Ok(())
    }

    /// Returns false if the store is unknown or refused the transition.
    pub fn set_store_status(&self, store_id: StoreId, status: StoreStatus) -> Result<bool, EngineError> {
        let mut state = self.write();
        let store = state
            .stores
            .get_mut(&store_id)
            .ok_or(EngineError::StoreNotFound(store_id))?;
        let changed = store.transition_to(status);
        if changed {
            slog::info!(self.logger, "Store {:?} is now {:?}", store_id, status);
        }
        Ok(changed)
    }

    /// Drain the set of regions led by `store_id` that changed since the last call.
    pub fn take_changed(&self, store_id: StoreId) -> BTreeSet<RegionId> {
        self.write().changed.remove(&store_id).unwrap_or_default()
    }

    fn read(&self) -> RwLockReadGuard<'_, EngineState> {
        self.state.read().expect("Engine lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, EngineState> {
        self.state.write().expect("Engine lock poisoned")
    }
}

impl EngineState {
    fn build(stores: Vec<Store>, regions: Vec<Region>) -> Result<Self, EngineError> {
        let stores: BTreeMap<StoreId, Store> = stores.into_iter().map(|s| (s.id(), s)).collect();

        let mut ordered = regions;
        ordered.sort_by(|a, b| a.start_key().cmp(b.start_key()));
        if let Some(first) = ordered.first() {
            if !first.start_key().is_empty() {
                return Err(EngineError::InvalidLayout("first region must start at -inf".into()));
            }
        }
        if let Some(last) = ordered.last() {
            if !last.end_key().is_empty() {
                return Err(EngineError::InvalidLayout("last region must end at +inf".into()));
            }
        }
        for pair in ordered.windows(2) {
            if pair[0].end_key() != pair[1].start_key() {
                return Err(EngineError::InvalidLayout(format!(
                    "{:?} and {:?} do not chain",
                    pair[0].id(),
                    pair[1].id()
                )));
            }
        }

        let mut peer_ids = BTreeSet::new();
        let mut state = EngineState {
            regions: BTreeMap::new(),
            tree: RegionTree::default(),
            stores,
            changed: BTreeMap::new(),
            unavailable: BTreeSet::new(),
            counters: EngineCounters::default(),
        };
        for region in ordered {
            for peer in region.peers() {
                if !state.stores.contains_key(&peer.store_id()) {
                    return Err(EngineError::InvalidLayout(format!(
                        "{:?} references unknown {:?}",
                        region.id(),
                        peer.store_id()
                    )));
                }
                if !peer_ids.insert(peer.id()) {
                    return Err(EngineError::InvalidLayout(format!("duplicate {:?}", peer.id())));
                }
            }
            state.tree.insert(&region);
            if state.regions.insert(region.id(), region).is_some() {
                return Err(EngineError::InvalidLayout("duplicate region id".into()));
            }
        }

        Ok(state)
    }

    fn is_up(&self, store_id: StoreId) -> bool {
        self.stores.get(&store_id).map(Store::is_up).unwrap_or(false)
    }

    fn check_leader(&mut self, logger: &slog::Logger, region_id: RegionId) {
        let region = match self.regions.get(&region_id) {
            Some(region) => region,
            None => return,
        };

        let down: Vec<PeerId> = region
            .peers()
            .iter()
            .filter(|p| !self.is_up(p.store_id()))
            .map(|p| p.id())
            .collect();
        let down_changed = down != region.down_peers().iter().map(|p| p.id()).collect::<Vec<_>>();

        let leader_ok = region.leader_store_id().map(|s| self.is_up(s)).unwrap_or(false);
        let elected = if leader_ok {
            None
        } else {
            let voters: Vec<&Peer> = region.voters().collect();
            let quorum = voters.len() / 2 + 1;
            let mut healthy: Vec<&Peer> = voters.into_iter().filter(|p| self.is_up(p.store_id())).collect();
            healthy.sort_by_key(|p| p.store_id());
            if healthy.len() >= quorum {
                Some(Some(healthy[0].id()))
            } else {
                Some(None)
            }
        };

        let region = match self.regions.get_mut(&region_id) {
            Some(region) => region,
            None => return,
        };
        if down_changed {
            region.set_down_peers(down);
        }
        match elected {
            None => {
                self.unavailable.remove(&region_id);
            }
            Some(Some(leader)) => {
                region.set_leader(leader);
                if self.unavailable.remove(&region_id) {
                    slog::info!(logger, "{:?} is available again", region_id);
                }
                slog::debug!(logger, "{:?} elected {:?}", region_id, leader);
            }
            Some(None) => {
                region.clear_leader();
                if self.unavailable.insert(region_id) {
                    slog::warn!(logger, "{:?} lost quorum", region_id);
                }
            }
        }
        if down_changed || matches!(elected, Some(Some(_))) {
            mark_changed(&mut self.changed, region);
        }
    }

    fn split(
        &mut self,
        logger: &slog::Logger,
        ids: &IdAllocator,
        region_id: RegionId,
        key: Option<Bytes>,
    ) -> Result<RegionId, EngineError> {
        let region = self
            .regions
            .get(&region_id)
            .ok_or(EngineError::RegionNotFound(region_id))?;

        let key = match key {
            Some(key) if is_strictly_inside(region, &key) => key,
            Some(key) => return Err(EngineError::InvalidSplitKey { region_id, key }),
            None => split_key(region.start_key(), region.end_key()).ok_or_else(|| EngineError::InvalidSplitKey {
                region_id,
                key: Bytes::new(),
            })?,
        };

        let first = ids.alloc_many(region.peers().len() as u64 + 1)?;
        let new_region_id = RegionId::new(first);
        let new_peers: Vec<Peer> = region
            .peers()
            .iter()
            .enumerate()
            .map(|(i, p)| Peer::new(PeerId::new(first + 1 + i as u64), p.store_id(), p.role()))
            .collect();
        let new_leader = region
            .leader_store_id()
            .and_then(|store| new_peers.iter().find(|p| p.store_id() == store))
            .map(|p| p.id());

        let half_size = region.approximate_size() / 2;
        let half_keys = region.approximate_keys() / 2;
        let mut epoch = region.epoch();
        epoch.version += 1;

        let mut new_region = Region::new(new_region_id, key.clone(), region.end_key().clone(), new_peers, epoch)
            .with_size(half_size, half_keys);
        if let Some(leader) = new_leader {
            new_region.set_leader(leader);
        }

        let start = region.start_key().clone();
        let original = self
            .regions
            .get_mut(&region_id)
            .ok_or(EngineError::RegionNotFound(region_id))?;
        original.set_range(start, key.clone());
        original.bump_version();
        original.set_approximate(half_size, half_keys);

        mark_changed(&mut self.changed, original);
        mark_changed(&mut self.changed, &new_region);
        self.tree.insert(&new_region);
        self.regions.insert(new_region_id, new_region);
        self.counters.splits += 1;

        slog::info!(logger, "Split {:?} at {:?} into {:?}", region_id, key, new_region_id);
        Ok(new_region_id)
    }

    fn merge(
        &mut self,
        logger: &slog::Logger,
        policy: MergePolicy,
        region_id: RegionId,
        epoch: RegionEpoch,
        source_id: RegionId,
    ) -> Result<CommitOutcome, EngineError> {
        let target = match self.regions.get(&region_id) {
            Some(region) => region,
            None => return Ok(CommitOutcome::Skipped),
        };
        if epoch.is_stale_against(&target.epoch()) {
            return Ok(CommitOutcome::Stale);
        }
        let source = match self.regions.get(&source_id) {
            Some(region) if source_id != region_id => region,
            _ => return Ok(CommitOutcome::Skipped),
        };

        let (left, right) = if !target.end_key().is_empty() && target.end_key() == source.start_key() {
            (target, source)
        } else if !source.end_key().is_empty() && source.end_key() == target.start_key() {
            (source, target)
        } else {
            return Err(EngineError::NotAdjacent(region_id, source_id));
        };
        let (start, end) = (left.start_key().clone(), right.end_key().clone());

        let (survivor, absorbed) = if target.id() < source.id() {
            (target, source)
        } else {
            (source, target)
        };
        let merged_epoch = RegionEpoch::new(
            survivor.epoch().conf_ver.max(absorbed.epoch().conf_ver) + 1,
            survivor.epoch().version.max(absorbed.epoch().version) + 1,
        );
        let mut peers = survivor.peers().to_vec();
        if policy == MergePolicy::UnionByStore {
            let stores = survivor.store_ids();
            peers.extend(absorbed.peers().iter().filter(|p| !stores.contains(&p.store_id())));
        }
        let size = survivor.approximate_size() + absorbed.approximate_size();
        let keys = survivor.approximate_keys() + absorbed.approximate_keys();
        let (survivor_id, absorbed_id) = (survivor.id(), absorbed.id());

        let absorbed = self
            .regions
            .remove(&absorbed_id)
            .ok_or(EngineError::RegionNotFound(absorbed_id))?;
        self.tree.remove(&absorbed);
        self.unavailable.remove(&absorbed_id);

        let survivor = self
            .regions
            .get_mut(&survivor_id)
            .ok_or(EngineError::RegionNotFound(survivor_id))?;
        self.tree.remove(survivor);
        survivor.set_range(start, end);
        survivor.replace_peers(peers);
        survivor.advance_epoch_to(merged_epoch);
        survivor.set_approximate(size, keys);
        self.tree.insert(survivor);
        mark_changed(&mut self.changed, survivor);
        self.counters.merges += 1;

        slog::info!(logger, "Merged {:?} into {:?}", absorbed_id, survivor_id);
        Ok(CommitOutcome::Applied)
    }

    fn tombstone_empty_down_stores(&mut self, logger: &slog::Logger) {
        let hosting: BTreeSet<StoreId> = self
            .regions
            .values()
            .flat_map(|r| r.peers().iter().map(|p| p.store_id()))
            .collect();

        for store in self.stores.values_mut() {
            if store.status() == StoreStatus::Down
                && !hosting.contains(&store.id())
                && store.transition_to(StoreStatus::Tombstone)
            {
                self.counters.tombstoned_stores += 1;
                slog::info!(logger, "Store {:?} has no peers left, now Tombstone", store.id());
            }
        }
    }
}

fn is_strictly_inside(region: &Region, key: &[u8]) -> bool {
    key > region.start_key().as_ref() && (region.end_key().is_empty() || key < region.end_key().as_ref())
}

fn mark_changed(changed: &mut BTreeMap<StoreId, BTreeSet<RegionId>>, region: &Region) {
    if let Some(store_id) = region.leader_store_id() {
        changed.entry(store_id).or_default().insert(region.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{partition, PeerRole};

    fn test_logger() -> slog::Logger {
        slog::Logger::root(slog::Discard, slog::o!())
    }

    // Stores 1..=num_stores, regions split at the given keys, three voters on stores 1..=3 led
    // by the peer on store 1.
    fn engine_with(num_stores: u64, keys: &[&'static [u8]], options: EngineOptions) -> RaftEngine {
        let stores: Vec<Store> = (1..=num_stores).map(|i| Store::new(StoreId::new(i), 1 << 30)).collect();
        let keys: Vec<Bytes> = keys.iter().map(|k| Bytes::from_static(k)).collect();
        let mut next_id = 100;
        let regions: Vec<Region> = partition(&keys)
            .into_iter()
            .map(|(start, end)| {
                let region_id = RegionId::new(next_id);
                let peers: Vec<Peer> = (1..=3)
                    .map(|s| Peer::voter(PeerId::new(next_id + s), StoreId::new(s)))
                    .collect();
                let leader = peers[0].id();
                next_id += 10;
                Region::new(region_id, start, end, peers, RegionEpoch::new(1, 1))
                    .with_leader(leader)
                    .with_size(64, 10)
            })
            .collect();

        let ids = Arc::new(IdAllocator::new(1000, 1000));
        RaftEngine::new(test_logger(), ids, stores, regions, options).unwrap()
    }

    fn assert_partition(engine: &RaftEngine) {
        let regions = engine.get_regions();
        assert!(regions.first().unwrap().start_key().is_empty());
        assert!(regions.last().unwrap().end_key().is_empty());
        for pair in regions.windows(2) {
            assert_eq!(pair[0].end_key(), pair[1].start_key());
        }
    }

    #[test]
    fn rejects_layout_with_gap() {
        let stores = vec![Store::new(StoreId::new(1), 100)];
        let regions = vec![
            Region::new(RegionId::new(1), Bytes::new(), Bytes::from_static(b"c"), vec![], RegionEpoch::default()),
            Region::new(RegionId::new(2), Bytes::from_static(b"d"), Bytes::new(), vec![], RegionEpoch::default()),
        ];
        let ids = Arc::new(IdAllocator::new(10, 10));

        let result = RaftEngine::new(test_logger(), ids, stores, regions, EngineOptions::default());
        assert!(matches!(result, Err(EngineError::InvalidLayout(_))));
    }

    #[test]
    fn search_region_with_unbounded_region() {
        let engine = engine_with(3, &[], EngineOptions::default());

        assert_eq!(RegionId::new(100), engine.search_region(b"").unwrap().id());
        assert_eq!(RegionId::new(100), engine.search_region(b"zzzzzz").unwrap().id());
    }

    #[test]
    fn leader_moves_to_smallest_healthy_store() {
        // -- setup --
        let engine = engine_with(3, &[b"m"], EngineOptions::default());
        engine.set_store_status(StoreId::new(1), StoreStatus::Down).unwrap();

        // -- execute --
        engine.step_regions();

        // -- verify --
        for region in engine.get_regions() {
            assert_eq!(Some(StoreId::new(2)), region.leader_store_id());
            assert_eq!(1, region.down_peers().len());
        }
        assert!(engine.unavailable_regions().is_empty());
        assert_eq!(2, engine.take_changed(StoreId::new(2)).len());
    }

    #[test]
    fn no_leader_without_quorum() {
        let engine = engine_with(3, &[], EngineOptions::default());
        engine.set_store_status(StoreId::new(1), StoreStatus::Down).unwrap();
        engine.set_store_status(StoreId::new(2), StoreStatus::Down).unwrap();

        engine.step_regions();
        engine.step_regions();

        let region = engine.get_region(RegionId::new(100)).unwrap();
        assert_eq!(None, region.leader());
        assert_eq!(1, engine.unavailable_regions().len());
        assert_eq!(2, engine.counters().unavailable_region_ticks);
    }

    #[test]
    fn need_split_splits_and_keeps_partition() {
        // -- setup --
        let options = EngineOptions {
            need_split: Some(Arc::new(|size, _| size >= 64)),
            merge_policy: MergePolicy::KeepSurvivorPeers,
        };
        let engine = engine_with(3, &[b"m"], options);

        // -- execute --
        engine.step_regions();

        // -- verify --
        assert_eq!(4, engine.region_count());
        assert_partition(&engine);
        for region in engine.get_regions() {
            assert_eq!(32, region.approximate_size());
            assert_eq!(2, region.epoch().version);
            assert_eq!(Some(StoreId::new(1)), region.leader_store_id());
            assert_eq!(3, region.peers().len());
        }
        assert_eq!(2, engine.counters().splits);
    }

    #[test]
    fn split_aborts_when_ids_exhausted() {
        let stores: Vec<Store> = (1..=3).map(|i| Store::new(StoreId::new(i), 100)).collect();
        let peers = (1..=3).map(|s| Peer::voter(PeerId::new(10 + s), StoreId::new(s))).collect();
        let region = Region::new(RegionId::new(1), Bytes::new(), Bytes::new(), peers, RegionEpoch::new(1, 1));
        // Three ids left, a split needs four.
        let ids = Arc::new(IdAllocator::new(20, 3));
        let engine = RaftEngine::new(test_logger(), ids, stores, vec![region.clone()], EngineOptions::default())
            .unwrap();

        let result = engine.split_region(RegionId::new(1), None);

        assert!(matches!(result, Err(EngineError::IdExhausted(_))));
        assert_eq!(Some(region), engine.get_region(RegionId::new(1)));
        assert_eq!(1, engine.counters().split_aborts);
    }

    #[test]
    fn split_then_merge_restores_range() {
        // -- setup --
        let engine = engine_with(3, &[b"f", b"t"], EngineOptions::default());
        let original = engine.search_region(b"k").unwrap();

        // -- execute --
        let new_id = engine.split_region(original.id(), Some(Bytes::from_static(b"k"))).unwrap();
        let left = engine.get_region(original.id()).unwrap();
        let outcome = engine.merge_regions(new_id, left.epoch(), original.id()).unwrap();

        // -- verify --
        assert_eq!(CommitOutcome::Applied, outcome);
        assert!(engine.get_region(new_id).is_none());
        let merged = engine.get_region(original.id()).unwrap();
        assert_eq!(original.start_key(), merged.start_key());
        assert_eq!(original.end_key(), merged.end_key());
        assert!(merged.epoch().version > left.epoch().version);
        assert!(merged.epoch().conf_ver > original.epoch().conf_ver);
        assert_partition(&engine);
    }

    #[test]
    fn merge_union_adopts_peers_on_new_stores() {
        let options = EngineOptions {
            need_split: None,
            merge_policy: MergePolicy::UnionByStore,
        };
        let engine = engine_with(4, &[b"m"], options);
        let left = engine.search_region(b"a").unwrap();
        let right = engine.search_region(b"x").unwrap();
        let learner = Peer::learner(PeerId::new(500), StoreId::new(4));
        assert_eq!(
            CommitOutcome::Applied,
            engine.apply_add_peer(right.id(), right.epoch(), learner)
        );

        engine.merge_regions(left.id(), left.epoch(), right.id()).unwrap();

        let merged = engine.get_region(left.id()).unwrap();
        assert_eq!(4, merged.peers().len());
        assert!(merged.peer(PeerId::new(500)).is_some());
    }

    #[test]
    fn merge_rejects_non_adjacent_regions() {
        let engine = engine_with(3, &[b"f", b"t"], EngineOptions::default());
        let first = engine.search_region(b"a").unwrap();
        let last = engine.search_region(b"x").unwrap();

        let result = engine.merge_regions(first.id(), first.epoch(), last.id());
        assert!(matches!(result, Err(EngineError::NotAdjacent(_, _))));
    }

    #[test]
    fn add_then_remove_peer_restores_peers() {
        let engine = engine_with(4, &[], EngineOptions::default());
        let before = engine.get_region(RegionId::new(100)).unwrap();
        let peer = Peer::voter(PeerId::new(900), StoreId::new(4));

        let added = engine.apply_add_peer(before.id(), before.epoch(), peer);
        let mid = engine.get_region(before.id()).unwrap();
        let removed = engine.apply_remove_peer(before.id(), mid.epoch(), peer.id());

        let after = engine.get_region(before.id()).unwrap();
        assert_eq!(CommitOutcome::Applied, added);
        assert_eq!(CommitOutcome::Applied, removed);
        assert_eq!(before.peers(), after.peers());
        assert_eq!(before.epoch().conf_ver + 2, after.epoch().conf_ver);
    }

    #[test]
    fn stale_epoch_commits_change_nothing() {
        let engine = engine_with(4, &[], EngineOptions::default());
        let region = engine.get_region(RegionId::new(100)).unwrap();
        let stale = RegionEpoch::new(region.epoch().conf_ver - 1, region.epoch().version);

        assert_eq!(
            CommitOutcome::Stale,
            engine.apply_add_peer(region.id(), stale, Peer::voter(PeerId::new(900), StoreId::new(4)))
        );
        assert_eq!(
            CommitOutcome::Stale,
            engine.apply_transfer_leader(region.id(), stale, PeerId::new(102))
        );
        assert_eq!(Some(region), engine.get_region(RegionId::new(100)));
    }

    #[test]
    fn leader_peer_is_never_removed() {
        let engine = engine_with(3, &[], EngineOptions::default());
        let region = engine.get_region(RegionId::new(100)).unwrap();
        let leader = region.leader().unwrap().id();

        assert_eq!(
            CommitOutcome::Skipped,
            engine.apply_remove_peer(region.id(), region.epoch(), leader)
        );
    }

    #[test]
    fn transfer_leader_requires_voter() {
        let engine = engine_with(4, &[], EngineOptions::default());
        let region = engine.get_region(RegionId::new(100)).unwrap();
        let learner = Peer::learner(PeerId::new(900), StoreId::new(4));
        engine.apply_add_peer(region.id(), region.epoch(), learner);
        let region = engine.get_region(region.id()).unwrap();

        assert_eq!(
            CommitOutcome::Skipped,
            engine.apply_transfer_leader(region.id(), region.epoch(), learner.id())
        );
        assert_eq!(
            CommitOutcome::Applied,
            engine.apply_transfer_leader(region.id(), region.epoch(), PeerId::new(102))
        );
        let region = engine.get_region(region.id()).unwrap();
        assert_eq!(Some(StoreId::new(2)), region.leader_store_id());
        assert_eq!(PeerRole::Voter, region.leader().unwrap().role());
    }

    #[test]
    fn write_flow_credits_every_peer_store() {
        let engine = engine_with(3, &[], EngineOptions::default());

        assert_eq!(Some(RegionId::new(100)), engine.write_key(b"abc", 1000));

        let region = engine.get_region(RegionId::new(100)).unwrap();
        assert_eq!(1064, region.approximate_size());
        assert_eq!(1000, region.written_bytes());
        for store in engine.get_stores() {
            assert_eq!(1000, store.used());
        }
        assert_eq!(1000, engine.store_region_stats(StoreId::new(1)).bytes_written);

        engine.reset_written_bytes();
        assert_eq!(0, engine.get_region(RegionId::new(100)).unwrap().written_bytes());
        assert_eq!(1064, engine.get_region(RegionId::new(100)).unwrap().approximate_size());
    }

    #[test]
    fn down_store_without_peers_becomes_tombstone() {
        let engine = engine_with(4, &[], EngineOptions::default());
        engine.set_store_status(StoreId::new(4), StoreStatus::Down).unwrap();
        engine.set_store_status(StoreId::new(3), StoreStatus::Down).unwrap();

        engine.step_regions();

        assert_eq!(StoreStatus::Tombstone, engine.get_store(StoreId::new(4)).unwrap().status());
        assert_eq!(StoreStatus::Down, engine.get_store(StoreId::new(3)).unwrap().status());
        assert_eq!(1, engine.counters().tombstoned_stores);
    }
}
