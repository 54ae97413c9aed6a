//! Built-in demonstration suite
//!
//! A small archetypal set of tests exercising every shape the engine
//! understands: lone and multiple assertions, multiple cases, failures at
//! each stage, captured output and a slow test that honours cancellation.

use anyhow::{bail, ensure, Result};
use std::time::Duration;

use crate::models::{
    FnAssertion, FnCase, FnTest, Test, TestCase, TestContext, TestMetadata, TestTrait,
};

/// Trait the demo suite groups its tests by
pub const CATEGORY_TRAIT: &str = "Category";

/// Flag carried by demo tests that are expected to fail
pub const FAILING_TEST_TRAIT: &str = "ExampleOfAFailingTest";

const SLOW_TEST_DURATION: Duration = Duration::from_secs(5);

/// A named demo test and how to instantiate it
pub struct DemoTest {
    pub metadata: TestMetadata,
    create: fn() -> Box<dyn Test>,
}

impl DemoTest {
    fn new(name: &str, category: &str, create: fn() -> Box<dyn Test>) -> Self {
        Self {
            metadata: TestMetadata::new(name).with_trait(TestTrait::new(CATEGORY_TRAIT, category)),
            create,
        }
    }

    fn failing(mut self) -> Self {
        self.metadata.traits.push(TestTrait::flag(FAILING_TEST_TRAIT));
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn create(&self) -> Box<dyn Test> {
        (self.create)()
    }

    pub fn is_expected_to_fail(&self) -> bool {
        self.metadata.traits.iter().any(|t| t.name == FAILING_TEST_TRAIT)
    }
}

/// Every demo test, in declaration order
pub fn suite() -> Vec<DemoTest> {
    vec![
        DemoTest::new("arrangement_failure", "Failures", arrangement_failure).failing(),
        DemoTest::new("single_case_single_assertion", "Shapes", single_case_single_assertion),
        DemoTest::new(
            "single_case_single_assertion_failure",
            "Failures",
            single_case_single_assertion_failure,
        )
        .failing(),
        DemoTest::new(
            "single_case_multiple_assertions",
            "Shapes",
            single_case_multiple_assertions,
        ),
        DemoTest::new(
            "single_case_multiple_assertions_failure",
            "Failures",
            single_case_multiple_assertions_failure,
        )
        .failing(),
        DemoTest::new(
            "multiple_cases_multiple_assertions",
            "Shapes",
            multiple_cases_multiple_assertions,
        ),
        DemoTest::new(
            "multiple_cases_multiple_assertions_failure",
            "Failures",
            multiple_cases_multiple_assertions_failure,
        )
        .failing(),
        DemoTest::new("action_failure", "Failures", action_failure).failing(),
        DemoTest::new("sum_of_odd_and_six_is_odd", "Arithmetic", sum_of_odd_and_six_is_odd),
        DemoTest::new("sum_of_even_and_odd", "Arithmetic", sum_of_even_and_odd),
        DemoTest::new("test_output", "Output", test_output),
        DemoTest::new("at_least_five_seconds", "Slow", at_least_five_seconds),
    ]
}

fn passes(description: &str) -> FnAssertion {
    FnAssertion::new(description, |_| Ok(()))
}

fn kaboom(description: &str) -> FnAssertion {
    FnAssertion::new(description, |_| bail!("KABOOM"))
}

fn no_op(_: &dyn TestContext) -> Result<()> {
    Ok(())
}

fn arranged(cases: impl Fn() -> Vec<Box<dyn TestCase>> + Send + Sync + 'static) -> Box<dyn Test> {
    Box::new(FnTest::new(move |_| Ok(cases())))
}

fn arrangement_failure() -> Box<dyn Test> {
    Box::new(FnTest::new(|_| bail!("KABOOM")))
}

fn single_case_single_assertion() -> Box<dyn Test> {
    arranged(|| {
        vec![FnCase::new("lone test case", no_op)
            .with_assertion(passes("lone assertion"))
            .boxed()]
    })
}

fn single_case_single_assertion_failure() -> Box<dyn Test> {
    arranged(|| {
        vec![FnCase::new("lone test case", no_op)
            .with_assertion(kaboom("lone assertion"))
            .boxed()]
    })
}

fn single_case_multiple_assertions() -> Box<dyn Test> {
    arranged(|| {
        vec![FnCase::new("lone test case", no_op)
            .with_assertion(passes("assertion 1"))
            .with_assertion(passes("assertion 2"))
            .boxed()]
    })
}

fn single_case_multiple_assertions_failure() -> Box<dyn Test> {
    arranged(|| {
        vec![FnCase::new("lone test case", no_op)
            .with_assertion(passes("assertion 1"))
            .with_assertion(kaboom("assertion 2"))
            .boxed()]
    })
}

fn multiple_cases_multiple_assertions() -> Box<dyn Test> {
    arranged(|| {
        ["test case 1", "test case 2"]
            .into_iter()
            .map(|case| {
                FnCase::new(case, no_op)
                    .with_assertion(passes("assertion 1"))
                    .with_assertion(passes("assertion 2"))
                    .boxed()
            })
            .collect()
    })
}

fn multiple_cases_multiple_assertions_failure() -> Box<dyn Test> {
    arranged(|| {
        ["test case 1", "test case 2"]
            .into_iter()
            .map(|case| {
                FnCase::new(case, no_op)
                    .with_assertion(passes("assertion 1"))
                    .with_assertion(kaboom("assertion 2"))
                    .boxed()
            })
            .collect()
    })
}

fn action_failure() -> Box<dyn Test> {
    arranged(|| {
        vec![FnCase::new("lone test case", |_| bail!("KABOOM"))
            .with_assertion(passes("lone assertion"))
            .boxed()]
    })
}

fn sum_of_odd_and_six_is_odd() -> Box<dyn Test> {
    arranged(|| {
        [1, 3, 5]
            .into_iter()
            .map(|x: i64| {
                FnCase::new(x.to_string(), no_op)
                    .with_assertion(FnAssertion::new("(x + 6) % 2 == 1", move |_| {
                        ensure!((x + 6) % 2 == 1, "{} + 6 is even", x);
                        Ok(())
                    }))
                    .boxed()
            })
            .collect()
    })
}

fn sum_of_even_and_odd() -> Box<dyn Test> {
    arranged(|| {
        let mut cases = Vec::new();
        for x in [1i64, 3] {
            for y in [2i64, 4, 6] {
                let sum = x + y;
                cases.push(
                    FnCase::new(format!("({x}, {y})"), no_op)
                        .with_assertion(FnAssertion::new("sum % 2 == 1", move |_| {
                            ensure!(sum % 2 == 1, "{sum} is even");
                            Ok(())
                        }))
                        .with_assertion(FnAssertion::new("sum > x", move |_| {
                            ensure!(sum > x, "{sum} is not greater than {x}");
                            Ok(())
                        }))
                        .boxed(),
                );
            }
        }
        cases
    })
}

fn test_output() -> Box<dyn Test> {
    arranged(|| {
        ["case 1", "case 2"]
            .into_iter()
            .map(|case| {
                let greeting = format!("Hello {case}");
                let assertion_greeting = format!("Hello {case} assertion");
                FnCase::new(case, move |context| {
                    context.write_output_line(&greeting);
                    Ok(())
                })
                .with_assertion(FnAssertion::new("lone assertion", move |context| {
                    context.write_output_line(&assertion_greeting);
                    Ok(())
                }))
                .boxed()
            })
            .collect()
    })
}

fn at_least_five_seconds() -> Box<dyn Test> {
    arranged(|| {
        vec![FnCase::new_async("lone test case", |context| {
            let cancellation = context.cancellation().clone();
            Box::pin(async move {
                tokio::select! {
                    _ = tokio::time::sleep(SLOW_TEST_DURATION) => Ok(()),
                    _ = cancellation.cancelled() => bail!("Cancelled before completing"),
                }
            })
        })
        .with_assertion(passes("lone assertion"))
        .boxed()]
    })
}
