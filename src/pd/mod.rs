mod client;
pub(crate) mod convert;
mod grpc_client;
mod types;

pub use client::ControlPlaneClient;
pub use client::RegionHeartbeatStream;
pub use grpc_client::RpcControlPlaneClient;
pub use types::ChangePeerType;
pub use types::ControlPlaneError;
pub use types::HeartbeatResponse;
pub use types::Operator;
pub use types::StoreMeta;
pub use types::StoreStats;
