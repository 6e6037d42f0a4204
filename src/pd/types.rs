use crate::model::{Peer, Region, RegionEpoch, RegionId, Store, StoreId, StoreStatus};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::time::Duration;
use tonic::codegen::http::uri;

/// Store metadata as registered with the control plane.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoreMeta {
    pub id: StoreId,
    pub address: String,
    pub status: StoreStatus,
    pub version: String,
}

impl From<&Store> for StoreMeta {
    fn from(store: &Store) -> Self {
        StoreMeta {
            id: store.id(),
            address: store.address().to_string(),
            status: store.status(),
            version: store.version().to_string(),
        }
    }
}

/// Snapshot of one store as reported in a store heartbeat.
#[derive(Clone, Debug, PartialEq)]
pub struct StoreStats {
    pub store_id: StoreId,
    pub capacity: u64,
    pub used_size: u64,
    pub available: u64,
    pub region_count: u32,
    pub leader_count: u32,
    pub start_time: DateTime<Utc>,
    pub sending_snap_count: u32,
    pub receiving_snap_count: u32,
    pub applied_snap_count: u32,
    pub bytes_written: u64,
    pub bytes_read: u64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChangePeerType {
    AddVoter,
    AddLearner,
    Remove,
}

/// The single scheduling step carried by a region heartbeat response.
#[derive(Clone, Debug, PartialEq)]
pub enum Operator {
    ChangePeer { change: ChangePeerType, peer: Peer },
    TransferLeader { peer: Peer },
    /// Merge the heartbeat's region together with the adjacent `source`.
    Merge { source: Region },
    Split { keys: Vec<Bytes> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct HeartbeatResponse {
    pub region_id: RegionId,
    pub epoch: RegionEpoch,
    pub operator: Option<Operator>,
}

#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    #[error("Invalid control plane address: {0}")]
    InvalidUri(#[from] uri::InvalidUri),
    #[error("Failed to connect to control plane: {0}")]
    Connect(#[from] tonic::transport::Error),
    #[error("RPC failed: {0}")]
    Rpc(#[from] tonic::Status),
    #[error("RPC timed out after {0:?}")]
    Timeout(Duration),
    #[error("Malformed reply: {0}")]
    Malformed(&'static str),
    #[error("Cluster is not bootstrapped")]
    NotBootstrapped,
    #[error("Cluster was already bootstrapped with {store_id:?} and {region_id:?}")]
    BootstrapConflict { store_id: StoreId, region_id: RegionId },
    #[error("Cluster id mismatch, control plane serves cluster {0}")]
    ClusterMismatch(u64),
    #[error("Store {0:?} is tombstone")]
    StoreTombstone(StoreId),
    #[error("Control plane fault: {0}")]
    ServerFault(String),
    #[error("Region heartbeat stream closed")]
    StreamClosed,
}
