mod task;

pub use task::Task;
pub use task::TaskKind;
pub use task::TaskState;
