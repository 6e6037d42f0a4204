use crate::model::{self, Peer, PeerId, Region, RegionEpoch, RegionId, Store, StoreId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

// One key per this many bytes when estimating key counts from sizes.
const BYTES_PER_KEY: u64 = 128;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Placement {
    /// Each region on `replicas` stores drawn at random.
    Random,
    /// Region i on stores i, i+1, ... modulo the seeded store count.
    RoundRobin,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum LeaderPlacement {
    FirstPeer,
    LowestStore,
}

/// Initial cluster shape. Store ids come first, then region ids, then peer ids, so every seeded
/// id is unique.
#[derive(Clone, Debug)]
pub(crate) struct Layout {
    pub(crate) store_count: u64,
    /// Stores 1..=seeded_stores receive peers. The rest start empty.
    pub(crate) seeded_stores: u64,
    pub(crate) region_count: u64,
    pub(crate) region_size: u64,
    pub(crate) replicas: usize,
    pub(crate) placement: Placement,
    pub(crate) leader: LeaderPlacement,
}

impl Layout {
    pub(crate) fn new(store_count: u64, region_count: u64, region_size: u64, replicas: usize) -> Self {
        Layout {
            store_count,
            seeded_stores: store_count,
            region_count,
            region_size,
            replicas,
            placement: Placement::Random,
            leader: LeaderPlacement::FirstPeer,
        }
    }

    pub(crate) fn build(&self, seed: u64, store_capacity: u64) -> (Vec<Store>, Vec<Region>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let store_count = self.store_count.max(1);
        let seeded = self.seeded_stores.max(1).min(store_count);
        let region_count = self.region_count.max(1);
        let replicas = self.replicas.max(1).min(seeded as usize);

        let split_keys = model::generate_keys((region_count - 1) as usize, &mut rng);
        let ranges = model::partition(&split_keys);
        let seeded_ids: Vec<u64> = (1..=seeded).collect();

        let first_region = store_count + 1;
        let first_peer = first_region + region_count;
        let mut peers_per_store: BTreeMap<u64, u64> = BTreeMap::new();
        let mut regions = Vec::with_capacity(ranges.len());

        for (i, (start, end)) in ranges.into_iter().enumerate() {
            let i = i as u64;
            let store_ids: Vec<u64> = match self.placement {
                Placement::Random => seeded_ids.choose_multiple(&mut rng, replicas).copied().collect(),
                Placement::RoundRobin => (0..replicas as u64).map(|j| (i + j) % seeded + 1).collect(),
            };
            let peers: Vec<Peer> = store_ids
                .iter()
                .enumerate()
                .map(|(j, store_id)| {
                    let id = first_peer + i * replicas as u64 + j as u64;
                    Peer::voter(PeerId::new(id), StoreId::new(*store_id))
                })
                .collect();
            for store_id in &store_ids {
                *peers_per_store.entry(*store_id).or_default() += 1;
            }

            let leader = match self.leader {
                LeaderPlacement::FirstPeer => peers[0],
                LeaderPlacement::LowestStore => *peers.iter().min_by_key(|p| p.store_id()).unwrap_or(&peers[0]),
            };
            let region = Region::new(RegionId::new(first_region + i), start, end, peers, RegionEpoch::new(1, 1))
                .with_leader(leader.id())
                .with_size(self.region_size, self.region_size / BYTES_PER_KEY);
            regions.push(region);
        }

        let stores = (1..=store_count)
            .map(|id| {
                let hosted = peers_per_store.get(&id).copied().unwrap_or(0);
                Store::new(StoreId::new(id), store_capacity)
                    .with_used(hosted.saturating_mul(self.region_size).min(store_capacity))
            })
            .collect();

        (stores, regions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn layout_partitions_key_space_with_unique_ids() {
        // -- setup --
        let layout = Layout::new(4, 40, 1 << 20, 3);

        // -- execute --
        let (stores, regions) = layout.build(42, 1 << 40);

        // -- verify --
        assert_eq!(4, stores.len());
        assert_eq!(40, regions.len());
        assert!(regions[0].start_key().is_empty());
        assert!(regions[39].end_key().is_empty());
        for pair in regions.windows(2) {
            assert_eq!(pair[0].end_key(), pair[1].start_key());
        }

        let mut ids = BTreeSet::new();
        for store in &stores {
            assert!(ids.insert(store.id().as_u64()));
        }
        for region in &regions {
            assert!(ids.insert(region.id().as_u64()));
            assert_eq!(3, region.store_ids().len());
            for peer in region.peers() {
                assert!(ids.insert(peer.id().as_u64()));
            }
        }
        let used: u64 = stores.iter().map(|s| s.used()).sum();
        assert_eq!(120 << 20, used);
    }

    #[test]
    fn same_seed_same_layout() {
        let layout = Layout::new(5, 20, 100, 3);

        let (_, first) = layout.build(7, 1 << 30);
        let (_, second) = layout.build(7, 1 << 30);

        assert_eq!(first, second);
    }

    #[test]
    fn round_robin_with_empty_stores_and_low_leaders() {
        let layout = Layout {
            seeded_stores: 3,
            placement: Placement::RoundRobin,
            leader: LeaderPlacement::LowestStore,
            ..Layout::new(6, 6, 100, 3)
        };

        let (stores, regions) = layout.build(1, 1 << 30);

        assert_eq!(6, stores.len());
        assert_eq!(0, stores[5].used());
        for region in &regions {
            assert_eq!(Some(StoreId::new(1)), region.leader_store_id());
            assert!(region.store_ids().iter().all(|s| s.as_u64() <= 3));
        }
    }
}
