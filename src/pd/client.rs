use crate::model::{Region, Store};
use crate::pd::{ControlPlaneError, HeartbeatResponse, StoreStats};
use tokio::sync::mpsc;

/// ControlPlaneClient is what a simulated store needs from the placement control plane. It is
/// transport independent; `RpcControlPlaneClient` is the gRPC implementation.
#[async_trait::async_trait]
pub trait ControlPlaneClient: Send + Sync {
    async fn get_cluster_id(&self) -> Result<u64, ControlPlaneError>;

    /// Strictly monotonic across calls.
    async fn alloc_id(&self) -> Result<u64, ControlPlaneError>;

    /// Idempotent for the same store and region. `id_floor` is the first id the control plane
    /// may hand out from `alloc_id()`.
    async fn bootstrap(&self, store: &Store, region: &Region, id_floor: u64) -> Result<(), ControlPlaneError>;

    /// Upsert.
    async fn put_store(&self, store: &Store) -> Result<(), ControlPlaneError>;

    async fn store_heartbeat(&self, stats: &StoreStats) -> Result<(), ControlPlaneError>;

    /// Open a long lived region heartbeat stream. Dropping `requests` closes the stream.
    async fn region_heartbeat(&self) -> Result<RegionHeartbeatStream, ControlPlaneError>;
}

pub struct RegionHeartbeatStream {
    pub requests: mpsc::UnboundedSender<Region>,
    pub responses: mpsc::UnboundedReceiver<Result<HeartbeatResponse, ControlPlaneError>>,
}
