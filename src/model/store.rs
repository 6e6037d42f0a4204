use crate::model::ids::StoreId;
use chrono::{DateTime, Utc};
use std::cmp;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum StoreStatus {
    Up,
    Down,
    Offline,
    Tombstone,
}

/// Store is the metadata of one simulated storage node. The engine holds the authoritative copy;
/// store nodes refer to it by id.
#[derive(Clone, Debug)]
pub struct Store {
    id: StoreId,
    address: String,
    status: StoreStatus,
    capacity: u64,
    used: u64,
    version: String,
    start_time: DateTime<Utc>,
    snapshots_sent: u64,
    snapshots_received: u64,
}

impl Store {
    pub fn new(id: StoreId, capacity: u64) -> Self {
        Store {
            id,
            address: format!("mock://store-{}", id.as_u64()),
            status: StoreStatus::Up,
            capacity,
            used: 0,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Utc::now(),
            snapshots_sent: 0,
            snapshots_received: 0,
        }
    }

    pub fn with_used(mut self, used: u64) -> Self {
        self.used = cmp::min(used, self.capacity);
        self
    }

    pub fn id(&self) -> StoreId {
        self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn status(&self) -> StoreStatus {
        self.status
    }

    pub fn is_up(&self) -> bool {
        self.status == StoreStatus::Up
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn available(&self) -> u64 {
        self.capacity - self.used
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn snapshots_sent(&self) -> u64 {
        self.snapshots_sent
    }

    pub fn snapshots_received(&self) -> u64 {
        self.snapshots_received
    }

    /// Credit written bytes, clamped so that `used <= capacity` always holds.
    pub(crate) fn credit_used(&mut self, delta: u64) {
        self.used = cmp::min(self.capacity, self.used.saturating_add(delta));
    }

    /// Tombstone is terminal. Returns false if the transition was refused or a no-op.
    pub(crate) fn transition_to(&mut self, status: StoreStatus) -> bool {
        if self.status == StoreStatus::Tombstone || self.status == status {
            return false;
        }
        self.status = status;
        true
    }

    pub(crate) fn record_snapshot_sent(&mut self) {
        self.snapshots_sent += 1;
    }

    pub(crate) fn record_snapshot_received(&mut self) {
        self.snapshots_received += 1;
    }
}
