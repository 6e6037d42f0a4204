use crate::model::ids::{PeerId, RegionId, StoreId};
use bytes::Bytes;
use std::collections::BTreeSet;

/// RegionEpoch is `{conf_ver, version}`. `conf_ver` moves on membership changes, `version` moves
/// on key range changes. Neither ever goes backwards.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct RegionEpoch {
    pub conf_ver: u64,
    pub version: u64,
}

impl RegionEpoch {
    pub fn new(conf_ver: u64, version: u64) -> Self {
        RegionEpoch { conf_ver, version }
    }

    /// A message captured at `self` is stale against `current` if either component lags behind.
    pub fn is_stale_against(&self, current: &RegionEpoch) -> bool {
        self.version < current.version || self.conf_ver < current.conf_ver
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PeerRole {
    Voter,
    Learner,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Peer {
    id: PeerId,
    store_id: StoreId,
    role: PeerRole,
}

impl Peer {
    pub fn new(id: PeerId, store_id: StoreId, role: PeerRole) -> Self {
        Peer { id, store_id, role }
    }

    pub fn voter(id: PeerId, store_id: StoreId) -> Self {
        Self::new(id, store_id, PeerRole::Voter)
    }

    pub fn learner(id: PeerId, store_id: StoreId) -> Self {
        Self::new(id, store_id, PeerRole::Learner)
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn store_id(&self) -> StoreId {
        self.store_id
    }

    pub fn role(&self) -> PeerRole {
        self.role
    }

    pub fn is_learner(&self) -> bool {
        self.role == PeerRole::Learner
    }

    pub fn with_role(self, role: PeerRole) -> Self {
        Peer { role, ..self }
    }
}

/// Region is a contiguous `[start_key, end_key)` shard. Empty keys mean unbounded.
///
/// Fields are only reachable through methods so that `leader` always names a voter in `peers`.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    id: RegionId,
    start_key: Bytes,
    end_key: Bytes,
    epoch: RegionEpoch,
    peers: Vec<Peer>,
    leader: Option<PeerId>,
    approximate_size: u64,
    approximate_keys: u64,
    written_bytes: u64,
    read_bytes: u64,
    pending_peers: Vec<PeerId>,
    down_peers: Vec<PeerId>,
}

impl Region {
    pub fn new(id: RegionId, start_key: Bytes, end_key: Bytes, peers: Vec<Peer>, epoch: RegionEpoch) -> Self {
        Region {
            id,
            start_key,
            end_key,
            epoch,
            peers,
            leader: None,
            approximate_size: 0,
            approximate_keys: 0,
            written_bytes: 0,
            read_bytes: 0,
            pending_peers: Vec::new(),
            down_peers: Vec::new(),
        }
    }

    /// Builder style helper for seeding. Ignored if `leader` is not a voter of this region.
    pub fn with_leader(mut self, leader: PeerId) -> Self {
        self.set_leader(leader);
        self
    }

    pub fn with_size(mut self, approximate_size: u64, approximate_keys: u64) -> Self {
        self.approximate_size = approximate_size;
        self.approximate_keys = approximate_keys;
        self
    }

    pub fn id(&self) -> RegionId {
        self.id
    }

    pub fn start_key(&self) -> &Bytes {
        &self.start_key
    }

    pub fn end_key(&self) -> &Bytes {
        &self.end_key
    }

    pub fn epoch(&self) -> RegionEpoch {
        self.epoch
    }

    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    pub fn peer(&self, peer_id: PeerId) -> Option<&Peer> {
        self.peers.iter().find(|p| p.id == peer_id)
    }

    pub fn peer_on_store(&self, store_id: StoreId) -> Option<&Peer> {
        self.peers.iter().find(|p| p.store_id == store_id)
    }

    pub fn voters(&self) -> impl Iterator<Item = &Peer> {
        self.peers.iter().filter(|p| !p.is_learner())
    }

    pub fn learners(&self) -> impl Iterator<Item = &Peer> {
        self.peers.iter().filter(|p| p.is_learner())
    }

    pub fn store_ids(&self) -> BTreeSet<StoreId> {
        self.peers.iter().map(|p| p.store_id).collect()
    }

    pub fn leader(&self) -> Option<&Peer> {
        self.leader.and_then(|id| self.peer(id))
    }

    pub fn leader_store_id(&self) -> Option<StoreId> {
        self.leader().map(|p| p.store_id)
    }

    pub fn approximate_size(&self) -> u64 {
        self.approximate_size
    }

    pub fn approximate_keys(&self) -> u64 {
        self.approximate_keys
    }

    pub fn written_bytes(&self) -> u64 {
        self.written_bytes
    }

    pub fn read_bytes(&self) -> u64 {
        self.read_bytes
    }

    pub fn pending_peers(&self) -> Vec<Peer> {
        self.resolve(&self.pending_peers)
    }

    pub fn down_peers(&self) -> Vec<Peer> {
        self.resolve(&self.down_peers)
    }

    fn resolve(&self, ids: &[PeerId]) -> Vec<Peer> {
        ids.iter().filter_map(|id| self.peer(*id)).copied().collect()
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        key >= self.start_key.as_ref() && (self.end_key.is_empty() || key < self.end_key.as_ref())
    }

    // ------- Mutations, engine and task runtime only --------

    /// Returns false (and changes nothing) if `peer_id` is not a voter of this region.
    pub(crate) fn set_leader(&mut self, peer_id: PeerId) -> bool {
        match self.peer(peer_id) {
            Some(peer) if !peer.is_learner() => {
                self.leader = Some(peer_id);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn clear_leader(&mut self) {
        self.leader = None;
    }

    /// Insert `peer`, or change the role of the existing peer with the same id. Returns false if
    /// nothing changed.
    pub(crate) fn upsert_peer(&mut self, peer: Peer) -> bool {
        match self.peers.iter_mut().find(|p| p.id == peer.id) {
            Some(existing) if *existing == peer => false,
            Some(existing) => {
                *existing = peer;
                if peer.is_learner() && self.leader == Some(peer.id) {
                    self.leader = None;
                }
                true
            }
            None => {
                self.peers.push(peer);
                true
            }
        }
    }

    pub(crate) fn remove_peer(&mut self, peer_id: PeerId) -> Option<Peer> {
        let position = self.peers.iter().position(|p| p.id == peer_id)?;
        let removed = self.peers.remove(position);
        if self.leader == Some(peer_id) {
            self.leader = None;
        }
        self.pending_peers.retain(|id| *id != peer_id);
        self.down_peers.retain(|id| *id != peer_id);
        Some(removed)
    }

    pub(crate) fn replace_peers(&mut self, peers: Vec<Peer>) {
        self.peers = peers;
        if let Some(leader) = self.leader {
            if !self.voters().any(|p| p.id == leader) {
                self.leader = None;
            }
        }
        let peers = &self.peers;
        self.pending_peers.retain(|id| peers.iter().any(|p| p.id == *id));
        self.down_peers.retain(|id| peers.iter().any(|p| p.id == *id));
    }

    pub(crate) fn bump_conf_ver(&mut self) {
        self.epoch.conf_ver += 1;
    }

    pub(crate) fn bump_version(&mut self) {
        self.epoch.version += 1;
    }

    /// Only ever moves the epoch forward.
    pub(crate) fn advance_epoch_to(&mut self, epoch: RegionEpoch) {
        self.epoch.conf_ver = self.epoch.conf_ver.max(epoch.conf_ver);
        self.epoch.version = self.epoch.version.max(epoch.version);
    }

    pub(crate) fn set_range(&mut self, start_key: Bytes, end_key: Bytes) {
        self.start_key = start_key;
        self.end_key = end_key;
    }

    pub(crate) fn set_approximate(&mut self, approximate_size: u64, approximate_keys: u64) {
        self.approximate_size = approximate_size;
        self.approximate_keys = approximate_keys;
    }

    pub(crate) fn record_write(&mut self, bytes: u64) {
        self.approximate_size = self.approximate_size.saturating_add(bytes);
        self.written_bytes = bytes;
    }

    pub(crate) fn set_written_bytes(&mut self, bytes: u64) {
        self.written_bytes = bytes;
    }

    pub(crate) fn set_read_bytes(&mut self, bytes: u64) {
        self.read_bytes = bytes;
    }

    pub(crate) fn set_down_peers(&mut self, down: Vec<PeerId>) {
        self.down_peers = down;
    }

    pub(crate) fn set_pending_peers(&mut self, pending: Vec<PeerId>) {
        self.pending_peers = pending;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region_with_three_voters() -> Region {
        let peers = (1..=3)
            .map(|i| Peer::voter(PeerId::new(10 + i), StoreId::new(i)))
            .collect();
        Region::new(RegionId::new(1), Bytes::new(), Bytes::new(), peers, RegionEpoch::new(1, 1))
    }

    #[test]
    fn stale_epoch_ordering() {
        let current = RegionEpoch::new(3, 5);

        assert!(RegionEpoch::new(3, 4).is_stale_against(&current));
        assert!(RegionEpoch::new(2, 5).is_stale_against(&current));
        assert!(!RegionEpoch::new(3, 5).is_stale_against(&current));
        // Newer than current is not stale.
        assert!(!RegionEpoch::new(4, 6).is_stale_against(&current));
    }

    #[test]
    fn unbounded_region_contains_every_key() {
        let region = region_with_three_voters();
        assert!(region.contains_key(b""));
        assert!(region.contains_key(b"a"));
        assert!(region.contains_key(b"zzzzzzzzzzzzzz"));
    }

    #[test]
    fn bounded_region_is_half_open() {
        let mut region = region_with_three_voters();
        region.set_range(Bytes::from_static(b"b"), Bytes::from_static(b"d"));

        assert!(!region.contains_key(b"a"));
        assert!(region.contains_key(b"b"));
        assert!(region.contains_key(b"czzz"));
        assert!(!region.contains_key(b"d"));
    }

    #[test]
    fn leader_must_be_a_voter_member() {
        let mut region = region_with_three_voters();
        assert!(region.set_leader(PeerId::new(11)));
        assert!(!region.set_leader(PeerId::new(99)));
        assert_eq!(Some(StoreId::new(1)), region.leader_store_id());

        region.upsert_peer(Peer::learner(PeerId::new(14), StoreId::new(4)));
        assert!(!region.set_leader(PeerId::new(14)));

        // Removing the leader clears it.
        region.remove_peer(PeerId::new(11));
        assert_eq!(None, region.leader());
    }

    #[test]
    fn upsert_peer_promotes_existing_learner() {
        let mut region = region_with_three_voters();
        let learner = Peer::learner(PeerId::new(14), StoreId::new(4));

        assert!(region.upsert_peer(learner));
        assert!(region.upsert_peer(learner.with_role(PeerRole::Voter)));
        assert!(!region.upsert_peer(learner.with_role(PeerRole::Voter)));

        assert_eq!(4, region.voters().count());
        assert_eq!(0, region.learners().count());
    }
}
