//! Result naming strategies
//!
//! Decide the display name recorded with each assertion result.

use std::fmt;

use crate::models::{Test, TestAssertion, TestCase};

/// Computes the display name for an assertion's result
pub trait ResultNamingStrategy: fmt::Debug + Send + Sync {
    /// `None` leaves the host free to show the test's own name.
    fn result_name(
        &self,
        test: &dyn Test,
        case: &dyn TestCase,
        assertion: &dyn TestAssertion,
    ) -> Option<String>;
}

/// Names results only as specifically as the test's shape requires.
///
/// - one case, one assertion: no name
/// - one case, several assertions: the assertion
/// - several cases, one assertion each: the case
/// - otherwise: `"<assertion> for test case <case>"`
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultResultNaming;

impl ResultNamingStrategy for DefaultResultNaming {
    fn result_name(
        &self,
        test: &dyn Test,
        case: &dyn TestCase,
        assertion: &dyn TestAssertion,
    ) -> Option<String> {
        let multiple_cases = test.cases().len() > 1;
        let multiple_assertions = case.assertions().len() > 1;

        match (multiple_cases, multiple_assertions) {
            (false, false) => None,
            (false, true) => Some(assertion.to_string()),
            (true, false) => Some(case.to_string()),
            (true, true) => Some(format!("{assertion} for test case {case}")),
        }
    }
}

/// Always names results after both the case and the assertion.
#[derive(Clone, Copy, Debug, Default)]
pub struct VerboseResultNaming;

impl ResultNamingStrategy for VerboseResultNaming {
    fn result_name(
        &self,
        _test: &dyn Test,
        case: &dyn TestCase,
        assertion: &dyn TestAssertion,
    ) -> Option<String> {
        Some(format!("{assertion} for test case {case}"))
    }
}
