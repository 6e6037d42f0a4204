mod driver;
mod stats;

pub use driver::Driver;
pub use driver::DriverError;
pub use stats::Outcome;
pub use stats::RunReport;
pub use stats::StoreReport;
