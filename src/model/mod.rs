mod ids;
mod keys;
mod region;
mod store;

pub use ids::IdAllocator;
pub use ids::IdExhausted;
pub use ids::PeerId;
pub use ids::RegionId;
pub use ids::StoreId;
pub use keys::generate_keys;
pub use keys::partition;
pub use keys::split_key;
pub use keys::KEY_LEN;
pub use region::Peer;
pub use region::PeerRole;
pub use region::Region;
pub use region::RegionEpoch;
pub use store::Store;
pub use store::StoreStatus;
