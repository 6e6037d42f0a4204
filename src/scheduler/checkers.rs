use crate::config::MIB;
use crate::model::{Peer, PeerId, PeerRole, Region, StoreId};
use crate::scheduler::cluster::Cluster;
use crate::scheduler::operator::{OperatorStep, ScheduledOperator};

impl Cluster {
    /// Pick a new operator for `region` and return its first step. Checkers run in priority order:
    /// replica repair, merge, split, region balance, leader balance.
    pub(super) fn schedule(&mut self, region: &Region) -> Option<OperatorStep> {
        region.leader()?;

        let operator = match self.check_replicas(region) {
            Some(operator) => Some(operator),
            None if self.config.enable_merge && self.is_merge_candidate(region) => self.check_merge(region),
            None => self
                .check_split(region)
                .or_else(|| self.balance_region(region))
                .or_else(|| self.balance_leader(region)),
        }?;

        let first = operator.current_step()?.clone();
        let desc = operator.desc();
        if !self.operators.add(operator) {
            return None;
        }
        slog::info!(self.logger, "Created {} operator on {:?}: {:?}", desc, region.id(), first);
        Some(first)
    }

    fn check_replicas(&mut self, region: &Region) -> Option<ScheduledOperator> {
        let leader_id = region.leader()?.id();
        let reported_down = region.down_peers();
        let down = region
            .peers()
            .iter()
            .find(|p| p.id() != leader_id && (!self.is_store_up(p.store_id()) || reported_down.contains(p)))
            .copied();

        if let Some(down) = down {
            if down.is_learner() || region.voters().count() > self.config.max_replicas {
                let steps = vec![OperatorStep::RemovePeer { peer: down }];
                return Some(ScheduledOperator::new("remove-down-replica", region, steps).urgent());
            }
            let target = self.pick_target_store(region)?;
            let peer = self.new_peer(target, PeerRole::Learner);
            let steps = vec![
                OperatorStep::AddLearner { peer },
                OperatorStep::PromoteLearner { peer },
                OperatorStep::RemovePeer { peer: down },
            ];
            return Some(
                ScheduledOperator::new("replace-down-replica", region, steps)
                    .urgent()
                    .moving_region(down.store_id(), target),
            );
        }

        if let Some(learner) = region.learners().next().copied() {
            let steps = vec![OperatorStep::PromoteLearner { peer: learner }];
            return Some(ScheduledOperator::new("promote-learner", region, steps).urgent());
        }

        let voters = region.voters().count();
        if voters < self.config.max_replicas {
            let target = self.pick_target_store(region)?;
            let peer = self.new_peer(target, PeerRole::Voter);
            let steps = vec![OperatorStep::AddVoter { peer }];
            return Some(ScheduledOperator::new("add-replica", region, steps).urgent());
        }
        if voters > self.config.max_replicas {
            let surplus = region
                .voters()
                .filter(|p| p.id() != leader_id)
                .max_by_key(|p| (self.region_score(p.store_id()), p.store_id()))
                .copied()?;
            let steps = vec![OperatorStep::RemovePeer { peer: surplus }];
            return Some(ScheduledOperator::new("remove-extra-replica", region, steps).urgent());
        }

        None
    }

    fn is_merge_candidate(&self, region: &Region) -> bool {
        region.approximate_size() <= self.config.max_merge_region_size_mb.saturating_mul(MIB)
            && region.approximate_keys() <= self.config.max_merge_region_keys
    }

    /// A neighbour on the same stores is merged right away. Otherwise the higher id region of the
    /// pair moves one peer at a time onto the lower id region's stores.
    fn check_merge(&mut self, region: &Region) -> Option<ScheduledOperator> {
        if !self.is_healthy(region) {
            return None;
        }

        let neighbours: Vec<Region> = vec![self.prev_region(region), self.next_region(region)]
            .into_iter()
            .flatten()
            .filter(|n| self.is_merge_candidate(n) && self.is_healthy(n) && !self.operators.contains(n.id()))
            .cloned()
            .collect();

        let stores = region.store_ids();
        if let Some(source) = neighbours.iter().find(|n| n.store_ids() == stores) {
            let steps = vec![OperatorStep::Merge { source: source.clone() }];
            return Some(ScheduledOperator::new("merge-region", region, steps));
        }

        let target_region = neighbours.iter().find(|n| n.id() < region.id())?;
        let target_stores = target_region.store_ids();
        let target = target_stores
            .difference(&stores)
            .copied()
            .find(|s| self.is_store_up(*s) && self.operators.store_has_budget(*s))?;
        let leader_store = region.leader_store_id()?;
        let extra = region
            .peers()
            .iter()
            .filter(|p| !target_stores.contains(&p.store_id()))
            .min_by_key(|p| (p.store_id() == leader_store, p.store_id()))
            .copied()?;

        Some(self.move_peer("merge-align", region, extra, target))
    }

    fn check_split(&mut self, region: &Region) -> Option<ScheduledOperator> {
        let limit = self.config.max_region_size_mb.saturating_mul(MIB);
        if limit == 0 || region.approximate_size() <= limit || !self.operators.has_region_budget() {
            return None;
        }
        let steps = vec![OperatorStep::Split {
            from_version: region.epoch().version,
        }];
        Some(ScheduledOperator::new("split-region", region, steps))
    }

    /// Move one replica from the most loaded store of `region` to the least loaded Up store that
    /// does not host it yet.
    fn balance_region(&mut self, region: &Region) -> Option<ScheduledOperator> {
        if !self.operators.has_region_budget() || !self.is_healthy(region) {
            return None;
        }

        let source = region
            .voters()
            .map(|p| p.store_id())
            .filter(|s| self.operators.store_has_budget(*s))
            .max_by_key(|s| (self.region_score(*s), *s))?;
        let target = self.pick_target_store(region)?;
        if self.region_score(source) - self.region_score(target) < self.config.balance_tolerance as i64 {
            return None;
        }
        let source_peer = region.peer_on_store(source).copied()?;

        Some(self.move_peer("balance-region", region, source_peer, target))
    }

    fn balance_leader(&mut self, region: &Region) -> Option<ScheduledOperator> {
        if !self.operators.has_region_budget() {
            return None;
        }

        let leader_store = region.leader_store_id()?;
        let target = region
            .voters()
            .filter(|p| p.store_id() != leader_store)
            .filter(|p| self.is_store_up(p.store_id()) && self.operators.store_has_budget(p.store_id()))
            .min_by_key(|p| (self.leader_score(p.store_id()), p.store_id()))
            .copied()?;
        if self.leader_score(leader_store) - self.leader_score(target.store_id())
            < self.config.balance_tolerance as i64
        {
            return None;
        }

        let steps = vec![OperatorStep::TransferLeader { peer: target }];
        Some(
            ScheduledOperator::new("balance-leader", region, steps)
                .moving_leader(leader_store, target.store_id()),
        )
    }

    // ------- Helpers --------

    /// AddLearner, promote, hand over leadership if needed, then remove `from`.
    fn move_peer(
        &mut self,
        desc: &'static str,
        region: &Region,
        from: Peer,
        to: StoreId,
    ) -> ScheduledOperator {
        let peer = self.new_peer(to, PeerRole::Learner);
        let moves_leader = region.leader().map(|l| l.id()) == Some(from.id());

        let mut steps = vec![OperatorStep::AddLearner { peer }, OperatorStep::PromoteLearner { peer }];
        if moves_leader {
            steps.push(OperatorStep::TransferLeader {
                peer: peer.with_role(PeerRole::Voter),
            });
        }
        steps.push(OperatorStep::RemovePeer { peer: from });

        let operator = ScheduledOperator::new(desc, region, steps).moving_region(from.store_id(), to);
        if moves_leader {
            operator.moving_leader(from.store_id(), to)
        } else {
            operator
        }
    }

    fn pick_target_store(&self, region: &Region) -> Option<StoreId> {
        let hosting = region.store_ids();
        self.up_stores()
            .filter(|s| !hosting.contains(s) && self.operators.store_has_budget(*s))
            .min_by_key(|s| (self.region_score(*s), *s))
    }

    fn new_peer(&mut self, store_id: StoreId, role: PeerRole) -> Peer {
        Peer::new(PeerId::new(self.next_id()), store_id, role)
    }

    fn is_healthy(&self, region: &Region) -> bool {
        region.leader().is_some()
            && region.down_peers().is_empty()
            && region.pending_peers().is_empty()
            && region.learners().next().is_none()
            && region.voters().count() == self.config.max_replicas
            && region.peers().iter().all(|p| self.is_store_up(p.store_id()))
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ControlPlaneConfig;
    use crate::model::{Peer, PeerId, Region, RegionEpoch, RegionId, StoreId, StoreStatus};
    use crate::pd::{ChangePeerType, Operator, StoreMeta};
    use crate::scheduler::cluster::Cluster;
    use bytes::Bytes;

    const CLUSTER: u64 = 1;

    fn test_logger() -> slog::Logger {
        slog::Logger::root(slog::Discard, slog::o!())
    }

    fn store(id: u64) -> StoreMeta {
        StoreMeta {
            id: StoreId::new(id),
            address: format!("mock://store-{}", id),
            status: StoreStatus::Up,
            version: "test".to_string(),
        }
    }

    // Region `id` owns ["k{id}", "k{id+1}"), with one voter per store in `stores`, led from the
    // first one.
    fn region(id: u64, stores: &[u64]) -> Region {
        let peers: Vec<Peer> = stores
            .iter()
            .map(|s| Peer::voter(PeerId::new(id * 100 + s), StoreId::new(*s)))
            .collect();
        let leader = peers[0].id();
        Region::new(
            RegionId::new(id),
            Bytes::from(format!("k{}", id)),
            Bytes::from(format!("k{}", id + 1)),
            peers,
            RegionEpoch::new(1, 1),
        )
        .with_leader(leader)
    }

    fn cluster(config: ControlPlaneConfig, stores: u64) -> Cluster {
        let mut cluster = Cluster::new(test_logger(), config, CLUSTER);
        let seed = Region::new(
            RegionId::new(1000),
            Bytes::new(),
            Bytes::from_static(b"k"),
            vec![Peer::voter(PeerId::new(1001), StoreId::new(1))],
            RegionEpoch::new(1, 1),
        );
        cluster.bootstrap(CLUSTER, store(1), seed, 10_000).unwrap();
        for id in 2..=stores {
            cluster.put_store(CLUSTER, store(id)).unwrap();
        }
        cluster
    }

    fn heartbeat(cluster: &mut Cluster, region: &Region) -> Option<Operator> {
        cluster
            .region_heartbeat(CLUSTER, region.clone())
            .unwrap()
            .and_then(|r| r.operator)
    }

    fn change_peer(operator: Option<Operator>) -> (ChangePeerType, Peer) {
        match operator {
            Some(Operator::ChangePeer { change, peer }) => (change, peer),
            other => panic!("Expected change peer, got {:?}", other),
        }
    }

    #[test]
    fn down_peer_is_replaced_step_by_step() {
        // -- setup --
        let mut cluster = cluster(ControlPlaneConfig::default(), 4);
        let mut down = store(3);
        down.status = StoreStatus::Down;
        cluster.put_store(CLUSTER, down).unwrap();
        let mut region = region(1, &[1, 2, 3]);

        // -- execute / verify --
        let (change, learner) = change_peer(heartbeat(&mut cluster, &region));
        assert_eq!(ChangePeerType::AddLearner, change);
        assert_eq!(StoreId::new(4), learner.store_id());
        assert!(learner.is_learner());

        // Re-emitted until the learner shows up.
        assert_eq!((change, learner), change_peer(heartbeat(&mut cluster, &region)));

        region.upsert_peer(learner);
        let (change, promoted) = change_peer(heartbeat(&mut cluster, &region));
        assert_eq!(ChangePeerType::AddVoter, change);
        assert_eq!(learner.id(), promoted.id());

        region.upsert_peer(promoted);
        let (change, removed) = change_peer(heartbeat(&mut cluster, &region));
        assert_eq!(ChangePeerType::Remove, change);
        assert_eq!(StoreId::new(3), removed.store_id());

        region.remove_peer(removed.id());
        assert_eq!(None, heartbeat(&mut cluster, &region));
        assert_eq!(1, cluster.operators.finished());
    }

    #[test]
    fn missing_replica_is_added_to_emptiest_store() {
        let mut cluster = cluster(ControlPlaneConfig::default(), 3);

        let (change, peer) = change_peer(heartbeat(&mut cluster, &region(1, &[1])));

        assert_eq!(ChangePeerType::AddVoter, change);
        assert_eq!(StoreId::new(2), peer.store_id());
        assert!(peer.id().as_u64() >= 10_000);
    }

    #[test]
    fn balance_region_moves_to_empty_store_with_influence() {
        // -- setup --
        let mut cluster = cluster(ControlPlaneConfig::default(), 4);
        let regions: Vec<Region> = (1..=4).map(|id| region(id, &[1, 2, 3])).collect();
        for region in &regions {
            // Operators wait until every region is known.
            cluster.put_region(region.clone());
        }

        // -- execute --
        let first = change_peer(heartbeat(&mut cluster, &regions[0]));
        let second = change_peer(heartbeat(&mut cluster, &regions[1]));

        // -- verify --
        assert_eq!((ChangePeerType::AddLearner, StoreId::new(4)), (first.0, first.1.store_id()));
        assert_eq!((ChangePeerType::AddLearner, StoreId::new(4)), (second.0, second.1.store_id()));
        // Both moves leave different source stores, because the first one's influence counts.
        assert_eq!(2, cluster.operators.len());
        assert_eq!(2, cluster.region_score(StoreId::new(4)) - cluster.region_count(StoreId::new(4)));
    }

    #[test]
    fn balanced_cluster_leaves_regions_alone() {
        let mut cluster = cluster(ControlPlaneConfig::default(), 3);
        let region = region(1, &[1, 2, 3]);

        assert_eq!(None, heartbeat(&mut cluster, &region));
    }

    #[test]
    fn leader_balance_transfers_to_fewest_leaders() {
        let mut cluster = cluster(ControlPlaneConfig::default(), 3);
        let regions: Vec<Region> = (1..=4).map(|id| region(id, &[1, 2, 3])).collect();
        for region in &regions {
            cluster.put_region(region.clone());
        }

        match heartbeat(&mut cluster, &regions[0]) {
            Some(Operator::TransferLeader { peer }) => assert_eq!(StoreId::new(2), peer.store_id()),
            other => panic!("Expected transfer leader, got {:?}", other),
        }
    }

    #[test]
    fn adjacent_small_regions_on_same_stores_merge() {
        let config = ControlPlaneConfig {
            enable_merge: true,
            ..ControlPlaneConfig::default()
        };
        let mut cluster = cluster(config, 3);
        let left = region(1, &[1, 2, 3]);
        let right = region(2, &[1, 2, 3]);
        cluster.put_region(left.clone());

        match heartbeat(&mut cluster, &right) {
            Some(Operator::Merge { source }) => assert_eq!(left.id(), source.id()),
            other => panic!("Expected merge, got {:?}", other),
        }
    }

    #[test]
    fn higher_id_region_aligns_stores_before_merge() {
        let config = ControlPlaneConfig {
            enable_merge: true,
            ..ControlPlaneConfig::default()
        };
        let mut cluster = cluster(config, 4);
        let left = region(1, &[1, 2, 3]);
        let right = region(2, &[1, 2, 4]);
        cluster.put_region(right.clone());

        // The lower id region waits for its neighbour to align.
        assert_eq!(None, heartbeat(&mut cluster, &left));

        let (change, peer) = change_peer(heartbeat(&mut cluster, &right));
        assert_eq!(ChangePeerType::AddLearner, change);
        assert_eq!(StoreId::new(3), peer.store_id());
    }

    #[test]
    fn oversized_region_is_split() {
        let config = ControlPlaneConfig {
            max_region_size_mb: 1,
            ..ControlPlaneConfig::default()
        };
        let mut cluster = cluster(config, 3);
        let region = region(1, &[1, 2, 3]).with_size(2 << 20, 100);

        match heartbeat(&mut cluster, &region) {
            Some(Operator::Split { keys }) => assert!(keys.is_empty()),
            other => panic!("Expected split, got {:?}", other),
        }
    }
}
