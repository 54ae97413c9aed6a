//! Data models for test execution
//!
//! Test abstractions, identity metadata and the results reported for each test.

mod failure;
mod metadata;
mod test_result;

pub use failure::{FailureDetails, StepFault};
pub use fn_test::{FnAssertion, FnCase, FnTest};
pub use metadata::{TestMetadata, TestTrait};
pub use test::{Test, TestAssertion, TestCase, TestContext};
pub use test_result::{RunSummary, TestOutcome, TestResultRecord};
