mod actor;
mod config;
mod driver;
mod event;
mod logging;
mod model;
mod pd;
mod raft_engine;
mod scenarios;
mod scheduler;
mod server;
mod store_node;
mod task;
mod grpc {
    include!("../generated/pd.rs");
}

pub use actor::ClusterSummary;
pub use config::CaseOverrides;
pub use config::ConfigError;
pub use config::ControlPlaneConfig;
pub use config::ControlPlaneOverrides;
pub use config::SimConfig;
pub use config::GIB;
pub use config::MIB;
pub use driver::Driver;
pub use driver::DriverError;
pub use driver::Outcome;
pub use driver::RunReport;
pub use driver::StoreReport;
pub use event::Cadence;
pub use event::DeletePolicy;
pub use event::Effect;
pub use event::Event;
pub use event::EventRunner;
pub use logging::create_root_logger_for_stdout;
pub use logging::parse_level;
pub use model::IdAllocator;
pub use model::IdExhausted;
pub use model::Peer;
pub use model::PeerId;
pub use model::PeerRole;
pub use model::Region;
pub use model::RegionEpoch;
pub use model::RegionId;
pub use model::Store;
pub use model::StoreId;
pub use model::StoreStatus;
pub use pd::ChangePeerType;
pub use pd::ControlPlaneClient;
pub use pd::ControlPlaneError;
pub use pd::HeartbeatResponse;
pub use pd::Operator;
pub use pd::RegionHeartbeatStream;
pub use pd::RpcControlPlaneClient;
pub use pd::StoreMeta;
pub use pd::StoreStats;
pub use raft_engine::CommitOutcome;
pub use raft_engine::EngineCounters;
pub use raft_engine::EngineError;
pub use raft_engine::EngineOptions;
pub use raft_engine::MergePolicy;
pub use raft_engine::NeedSplit;
pub use raft_engine::RaftEngine;
pub use raft_engine::StoreRegionStats;
pub use scenarios::case_names;
pub use scenarios::load as load_scenario;
pub use scenarios::Checker;
pub use scenarios::Scenario;
pub use server::EmbeddedControlPlane;
pub use store_node::create as create_store_node;
pub use store_node::HeartbeatWorker;
pub use store_node::Outbound;
pub use store_node::StoreNode;
pub use store_node::TaskCounts;
pub use task::Task;
pub use task::TaskKind;
pub use task::TaskState;

// Learning 1: `create::{root_mod}` should not have any code. Just `mod` and `pub use` statements.
// Learning 2: All `mod` statements, anywhere, should not be `pub`. Only export `pub` via individual
//             use statements.
//
// This keeps the `crate::{root_mod}` root_mod only responsible for exporting types to the rest of
// crate, and allows me to organize my root_mod impl however I want.
