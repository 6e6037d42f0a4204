mod heartbeat;
mod node;

pub use heartbeat::HeartbeatWorker;
pub use heartbeat::Outbound;
pub use node::create;
pub use node::StoreNode;
pub use node::TaskCounts;
