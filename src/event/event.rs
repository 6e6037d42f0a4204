use crate::model::{RegionId, StoreId};
use bytes::Bytes;
use std::collections::BTreeMap;

/// When an event fires, counted in ticks from 1.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Cadence {
    /// Once, at the given tick.
    At(u64),
    /// Every n-th tick, forever.
    Every(u64),
    /// Every n-th tick, `times` times in total.
    Repeat { every: u64, times: u64 },
}

impl Cadence {
    pub(crate) fn fires_at(&self, tick: u64) -> bool {
        match self {
            Cadence::At(at) => tick == *at,
            Cadence::Every(every) | Cadence::Repeat { every, .. } => *every > 0 && tick % every == 0,
        }
    }

    /// Whether an event that already fired `fired` times, and has seen `tick`, is done for good.
    pub(crate) fn is_exhausted(&self, tick: u64, fired: u64) -> bool {
        match self {
            Cadence::At(at) => tick >= *at,
            Cadence::Every(_) => false,
            Cadence::Repeat { times, .. } => fired >= *times,
        }
    }
}

/// How a DeleteNodes event picks its victim among the Up stores.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DeletePolicy {
    Random,
    /// The first Up store of the list.
    List(Vec<StoreId>),
}

/// A scenario defined mutation of the cluster.
#[derive(Clone, Debug)]
pub enum Event {
    /// Write `bytes` into the region holding `key`.
    WriteFlowOnSpot { cadence: Cadence, key: Bytes, bytes: u64 },
    WriteFlowOnRegion {
        cadence: Cadence,
        flows: BTreeMap<RegionId, u64>,
    },
    WriteFlowOnRandomRegion { cadence: Cadence, bytes: u64 },
    /// Set the read rate of the given regions.
    ReadFlowOnRegion {
        cadence: Cadence,
        flows: BTreeMap<RegionId, u64>,
    },
    /// Bring up one new store with a fresh id.
    AddNodes { cadence: Cadence },
    /// Mark one store Down.
    DeleteNodes { cadence: Cadence, policy: DeletePolicy },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::WriteFlowOnSpot { .. } => "write-flow-on-spot",
            Event::WriteFlowOnRegion { .. } => "write-flow-on-region",
            Event::WriteFlowOnRandomRegion { .. } => "write-flow-on-random-region",
            Event::ReadFlowOnRegion { .. } => "read-flow-on-region",
            Event::AddNodes { .. } => "add-nodes",
            Event::DeleteNodes { .. } => "delete-nodes",
        }
    }

    pub fn cadence(&self) -> &Cadence {
        match self {
            Event::WriteFlowOnSpot { cadence, .. }
            | Event::WriteFlowOnRegion { cadence, .. }
            | Event::WriteFlowOnRandomRegion { cadence, .. }
            | Event::ReadFlowOnRegion { cadence, .. }
            | Event::AddNodes { cadence }
            | Event::DeleteNodes { cadence, .. } => cadence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_fires_once_then_retires() {
        let cadence = Cadence::At(3);

        assert!(!cadence.fires_at(2));
        assert!(!cadence.is_exhausted(2, 0));
        assert!(cadence.fires_at(3));
        assert!(cadence.is_exhausted(3, 1));
    }

    #[test]
    fn repeat_retires_after_count() {
        let cadence = Cadence::Repeat { every: 5, times: 2 };

        let fired: Vec<u64> = (1..=30).filter(|t| cadence.fires_at(*t)).collect();

        assert_eq!(vec![5, 10, 15, 20, 25, 30], fired);
        assert!(!cadence.is_exhausted(10, 1));
        assert!(cadence.is_exhausted(10, 2));
    }

    #[test]
    fn zero_period_never_fires() {
        assert!(!Cadence::Every(0).fires_at(0));
        assert!(!Cadence::Every(0).fires_at(7));
    }
}
