//! Test containers
//!
//! The seam between the execution engine and whatever hosts the tests:
//! containers create test instances and receive everything reported about them.

use anyhow::Result;

use crate::models::{Test, TestMetadata, TestOutcome, TestResultRecord};

/// Source of a single test plus the sink for its results
///
/// Calls describing one test always come from one worker, in lifecycle order:
/// `record_start`, any number of `record_result`, then `record_end`.
/// Different containers may be called concurrently.
pub trait TestContainer: Send + Sync {
    /// Identity and traits of the contained test
    fn metadata(&self) -> &TestMetadata;

    /// Create a fresh instance of the test for this run.
    fn create_test(&self) -> Result<Box<dyn Test>>;

    fn record_start(&self);

    fn record_result(&self, result: TestResultRecord);

    fn record_end(&self, outcome: TestOutcome);

    /// Output written by the test through its context
    fn write_output(&self, output: &str);

    /// Error output written by the test through its context
    fn write_error(&self, error: &str);
}
