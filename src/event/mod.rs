mod event;
mod runner;

pub use event::Cadence;
pub use event::DeletePolicy;
pub use event::Event;
pub use runner::Effect;
pub use runner::EventRunner;
