//! Test execution engine
//!
//! Runs tests sequentially, fully in parallel, or in parallel partitioned by
//! an affinity trait so that tests sharing a trait value never overlap.

mod cancellation;
mod container;
mod context;
mod error;
mod partitioner;
mod run;
mod runner;

#[cfg(test)]
pub(crate) mod testing;

pub use cancellation::CancellationToken;
pub use container::TestContainer;
pub use context::ExecutionContext;
pub use error::RunError;
pub use partitioner::{AffinityPartitioner, AffinityStream};
pub use run::TestRun;
pub use runner::TestExecutor;
