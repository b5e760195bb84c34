pub mod collection_runner;
pub mod executor;
pub mod reporter;
pub mod types;

pub use collection_runner::{
    CollectionRunOptions, CollectionRunResult, CollectionRunner, RequestRun, RunSummary,
};
pub use executor::RequestRunner;
pub use reporter::RunReporter;
pub use types::{RunOutcome, RunPhase, RunRequestOptions, RunRequestResponse};
