mod engine;
mod region_tree;

pub use engine::CommitOutcome;
pub use engine::EngineCounters;
pub use engine::EngineError;
pub use engine::EngineOptions;
pub use engine::MergePolicy;
pub use engine::NeedSplit;
pub use engine::RaftEngine;
pub use engine::StoreRegionStats;
