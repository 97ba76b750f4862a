pub mod executor;
pub mod report;

pub use executor::ExtractionExecutor;
pub use report::{ExecutionReport, FailedEntry, FailureKind};
