use crate::model::{Region, RegionId};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::ops::Bound;

/// RegionTree indexes regions by start key. Because regions partition the key space, the region
/// containing `key` is the one with the greatest start key `<= key`.
#[derive(Default)]
pub(super) struct RegionTree {
    by_start_key: BTreeMap<Bytes, RegionId>,
}

impl RegionTree {
    pub(super) fn insert(&mut self, region: &Region) {
        self.by_start_key.insert(region.start_key().clone(), region.id());
    }

    /// Only removes the entry if it still points at `region`.
    pub(super) fn remove(&mut self, region: &Region) {
        if self.by_start_key.get(region.start_key().as_ref()) == Some(&region.id()) {
            self.by_start_key.remove(region.start_key().as_ref());
        }
    }

    pub(super) fn search(&self, key: &[u8]) -> Option<RegionId> {
        self.by_start_key
            .range::<[u8], _>((Bound::Unbounded, Bound::Included(key)))
            .next_back()
            .map(|(_, id)| *id)
    }

    pub(super) fn ordered_ids(&self) -> impl Iterator<Item = &RegionId> {
        self.by_start_key.values()
    }

    pub(super) fn len(&self) -> usize {
        self.by_start_key.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RegionEpoch;

    fn region(id: u64, start: &'static [u8], end: &'static [u8]) -> Region {
        Region::new(
            RegionId::new(id),
            Bytes::from_static(start),
            Bytes::from_static(end),
            Vec::new(),
            RegionEpoch::default(),
        )
    }

    #[test]
    fn search_finds_containing_region() {
        let mut tree = RegionTree::default();
        tree.insert(&region(1, b"", b"g"));
        tree.insert(&region(2, b"g", b"p"));
        tree.insert(&region(3, b"p", b""));

        assert_eq!(Some(RegionId::new(1)), tree.search(b""));
        assert_eq!(Some(RegionId::new(1)), tree.search(b"fzzz"));
        assert_eq!(Some(RegionId::new(2)), tree.search(b"g"));
        assert_eq!(Some(RegionId::new(3)), tree.search(b"zzzz"));
    }

    #[test]
    fn remove_ignores_replaced_entries() {
        let mut tree = RegionTree::default();
        tree.insert(&region(1, b"a", b"g"));
        tree.insert(&region(2, b"a", b"g"));

        tree.remove(&region(1, b"a", b"g"));
        assert_eq!(Some(RegionId::new(2)), tree.search(b"b"));
        assert_eq!(1, tree.len());
    }
}
