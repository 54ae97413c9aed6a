//! Test run execution
//!
//! Drives every test of a run through arrange, act and assert under the
//! configured execution strategy.

use chrono::{DateTime, Local};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::borrow::Cow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use super::{
    AffinityPartitioner, CancellationToken, ExecutionContext, RunError, TestContainer,
};
use crate::config::{ExecutionStrategy, TestConfiguration, TestRunConfiguration};
use crate::models::{RunSummary, StepFault, Test, TestOutcome, TestResultRecord};
use crate::utils::Timer;

const ACTION_FAILURE_PREFIX: &str = "Test action failed: ";

type WorkerResult = Result<Vec<TestOutcome>, RunError>;

/// A single execution of a collection of tests
pub struct TestRun {
    containers: Vec<Arc<dyn TestContainer>>,
    configuration: TestRunConfiguration,
}

impl TestRun {
    pub fn new(
        containers: impl IntoIterator<Item = Arc<dyn TestContainer>>,
        configuration: TestRunConfiguration,
    ) -> Self {
        Self {
            containers: containers.into_iter().collect(),
            configuration,
        }
    }

    /// Run every test to completion, or until `cancellation` is signalled.
    ///
    /// Failures inside tests are recorded against their containers and never
    /// returned here; the error cases are cancellation and worker defects.
    pub async fn execute(self, cancellation: CancellationToken) -> Result<RunSummary, RunError> {
        let strategy = self.configuration.strategy();
        info!(
            "Starting test run of {} tests ({})",
            self.containers.len(),
            strategy
        );
        let timer = Timer::start("test run");

        let result = match strategy {
            ExecutionStrategy::Sequential => self.execute_sequential(&cancellation).await,
            ExecutionStrategy::Parallel => self.execute_parallel(&cancellation).await,
            ExecutionStrategy::AffinityPartitioned(trait_name) => {
                self.execute_partitioned(&trait_name, &cancellation).await
            }
        };

        match &result {
            Ok(summary) => info!("Test run completed in {}ms - {}", timer.elapsed_ms(), summary),
            Err(e) => warn!("Test run ended after {}ms: {}", timer.elapsed_ms(), e),
        }
        timer.stop();

        result
    }

    async fn execute_sequential(
        self,
        cancellation: &CancellationToken,
    ) -> Result<RunSummary, RunError> {
        let configuration = &self.configuration.test_configuration;
        let mut summary = RunSummary::default();

        for container in &self.containers {
            if cancellation.is_cancelled() {
                return Err(RunError::Cancelled);
            }
            summary.record(run_test(container.as_ref(), configuration, cancellation).await);
        }

        Ok(summary)
    }

    async fn execute_parallel(self, cancellation: &CancellationToken) -> Result<RunSummary, RunError> {
        // A limit of zero would never hand out a permit; treat it as one.
        let semaphore = self
            .configuration
            .max_degree_of_parallelism
            .map(|max| Arc::new(Semaphore::new(max.max(1))));

        let mut workers: JoinSet<WorkerResult> = JoinSet::new();
        for container in self.containers {
            let semaphore = semaphore.clone();
            let configuration = self.configuration.test_configuration.clone();
            let cancellation = cancellation.clone();

            workers.spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => Some(
                        semaphore
                            .acquire_owned()
                            .await
                            .map_err(|e| RunError::Worker(e.to_string()))?,
                    ),
                    None => None,
                };

                if cancellation.is_cancelled() {
                    return Err(RunError::Cancelled);
                }

                Ok(vec![
                    run_test(container.as_ref(), &configuration, &cancellation).await,
                ])
            });
        }

        summarize(join_workers(workers).await)
    }

    async fn execute_partitioned(
        self,
        trait_name: &str,
        cancellation: &CancellationToken,
    ) -> Result<RunSummary, RunError> {
        let partitioner = AffinityPartitioner::new(self.containers, |container| {
            container
                .metadata()
                .trait_value(trait_name)
                .map(str::to_owned)
        });

        let workers = worker_count(
            self.configuration.max_degree_of_parallelism,
            partitioner.group_count(),
        );
        debug!(
            "Partitioned tests into {} groups by trait '{}' across {} workers",
            partitioner.group_count(),
            trait_name,
            workers
        );

        let mut handles: JoinSet<WorkerResult> = JoinSet::new();
        for stream in partitioner.streams(workers) {
            let configuration = self.configuration.test_configuration.clone();
            let cancellation = cancellation.clone();

            handles.spawn(async move {
                let mut outcomes = Vec::new();
                for container in stream {
                    if cancellation.is_cancelled() {
                        return Err(RunError::Cancelled);
                    }
                    outcomes.push(
                        run_test(container.as_ref(), &configuration, &cancellation).await,
                    );
                }
                Ok(outcomes)
            });
        }

        summarize(join_workers(handles).await)
    }
}

/// Wait for every worker. Dropping this future aborts the workers still
/// running, so an abandoned run never keeps calling into its containers.
async fn join_workers(mut workers: JoinSet<WorkerResult>) -> Vec<Result<WorkerResult, JoinError>> {
    let mut results = Vec::with_capacity(workers.len());
    while let Some(result) = workers.join_next().await {
        results.push(result);
    }
    results
}

/// Workers for a partitioned run: the configured maximum or host parallelism,
/// never more than there are groups, never fewer than one.
fn worker_count(max_degree_of_parallelism: Option<usize>, group_count: usize) -> usize {
    let available = max_degree_of_parallelism.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    });
    available.min(group_count).max(1)
}

fn summarize(results: Vec<Result<WorkerResult, JoinError>>) -> Result<RunSummary, RunError> {
    let mut summary = RunSummary::default();
    let mut cancelled = false;

    for result in results {
        match result {
            Ok(Ok(outcomes)) => outcomes.into_iter().for_each(|o| summary.record(o)),
            Ok(Err(RunError::Cancelled)) => cancelled = true,
            Ok(Err(e)) => return Err(e),
            Err(e) => return Err(RunError::Worker(e.to_string())),
        }
    }

    if cancelled {
        Err(RunError::Cancelled)
    } else {
        Ok(summary)
    }
}

/// Run the full lifecycle of one test and report it to its container.
///
/// The test instance is dropped after `record_end`, or wherever this future is
/// dropped if the run is abandoned.
pub(crate) async fn run_test(
    container: &dyn TestContainer,
    base_configuration: &TestConfiguration,
    cancellation: &CancellationToken,
) -> TestOutcome {
    let name = container.metadata().name.as_str();
    debug!("Running {}", name);

    let context = ExecutionContext::new(container, cancellation.clone());
    container.record_start();

    let mut test = match container.create_test() {
        Ok(test) => test,
        Err(e) => {
            let fault = StepFault::from_error(&e);
            let now = Local::now();
            let outcome = record_arrangement_failure(container, base_configuration, now, fault);
            container.record_end(outcome);
            return outcome;
        }
    };

    let configuration = configuration_for(test.as_ref(), base_configuration);
    let outcome = execute_test(test.as_mut(), &configuration, container, &context).await;

    debug!("{} {}", outcome.symbol(), name);
    container.record_end(outcome);
    drop(test);

    outcome
}

/// Private copy of the configuration when the test overrides anything.
fn configuration_for<'a>(test: &dyn Test, base: &'a TestConfiguration) -> Cow<'a, TestConfiguration> {
    if test.has_configuration_overrides() {
        let mut configuration = base.clone();
        test.apply_configuration_overrides(&mut configuration);
        Cow::Owned(configuration)
    } else {
        Cow::Borrowed(base)
    }
}

async fn execute_test(
    test: &mut dyn Test,
    configuration: &TestConfiguration,
    container: &dyn TestContainer,
    context: &ExecutionContext<'_>,
) -> TestOutcome {
    let arrangement_start = Local::now();
    let arranging = &mut *test;
    let arranged = guard_step(move || {
        let test = arranging;
        test.arrange(context)
    })
    .await;
    if let Err(fault) = arranged {
        return record_arrangement_failure(container, configuration, arrangement_start, fault);
    }

    let test: &dyn Test = test;
    let mut all_passed = true;
    let mut results_recorded = 0usize;
    let mut last_action_fault = None;

    for case in test.cases() {
        // The action's duration is attributed to the first assertion only.
        let mut start_time = Local::now();
        let action_fault = guard_step(|| case.act(context))
            .await
            .err()
            .map(|fault| fault.with_prefix(ACTION_FAILURE_PREFIX));

        if action_fault.is_some() {
            all_passed = false;
        }

        for assertion in case.assertions() {
            let display_name = configuration.result_naming_strategy.result_name(
                test,
                case.as_ref(),
                assertion.as_ref(),
            );

            let checked = match &action_fault {
                Some(fault) => Err(fault.clone()),
                None => guard_step(|| assertion.check(context)).await,
            };

            let end_time = Local::now();
            let record = match checked {
                Ok(()) => TestResultRecord::passed(start_time, end_time, display_name),
                Err(fault) => {
                    all_passed = false;
                    TestResultRecord::failed(
                        start_time,
                        end_time,
                        display_name,
                        TestOutcome::Failed,
                        Some(fault.message),
                        fault.stack_trace,
                    )
                }
            };

            container.record_result(record);
            results_recorded += 1;
            start_time = Local::now();
        }

        if action_fault.is_some() {
            last_action_fault = action_fault;
        }
    }

    let outcome = if all_passed {
        TestOutcome::Passed
    } else {
        TestOutcome::Failed
    };

    // Every test reports at least one result, even one that declared no
    // assertions at all.
    if results_recorded == 0 {
        let end_time = Local::now();
        let record = match last_action_fault {
            Some(fault) => TestResultRecord::failed(
                arrangement_start,
                end_time,
                None,
                outcome,
                Some(fault.message),
                fault.stack_trace,
            ),
            None => TestResultRecord::passed(arrangement_start, end_time, None),
        };
        container.record_result(record);
    }

    outcome
}

fn record_arrangement_failure(
    container: &dyn TestContainer,
    configuration: &TestConfiguration,
    start_time: DateTime<Local>,
    fault: StepFault,
) -> TestOutcome {
    let outcome =
        TestOutcome::for_arrangement_failure(configuration.arrangement_failure_counts_as_failed);
    warn!(
        "Arrangement of {} failed: {}",
        container.metadata().name,
        fault.message
    );

    container.record_result(TestResultRecord::failed(
        start_time,
        Local::now(),
        None,
        outcome,
        Some(fault.message),
        fault.stack_trace,
    ));

    outcome
}

/// Run one user step, converting returned errors and panics into a fault.
async fn guard_step<'a, F>(start: F) -> Result<(), StepFault>
where
    F: FnOnce() -> BoxFuture<'a, anyhow::Result<()>>,
{
    let step = match panic::catch_unwind(AssertUnwindSafe(start)) {
        Ok(step) => step,
        Err(payload) => return Err(StepFault::from_panic(payload)),
    };

    match AssertUnwindSafe(step).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(StepFault::from_error(&e)),
        Err(payload) => Err(StepFault::from_panic(payload)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::{erased, DropCounted, Event, RecordingContainer};
    use crate::models::{FailureDetails, FnAssertion, FnCase, FnTest};
    use anyhow::anyhow;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn passing(description: &str) -> FnAssertion {
        FnAssertion::new(description, |_| Ok(()))
    }

    fn failing(description: &str, message: &'static str) -> FnAssertion {
        FnAssertion::new(description, move |_| Err(anyhow!(message)))
    }

    fn single_case_test() -> FnTest {
        FnTest::new(|_| {
            Ok(vec![FnCase::new("only case", |_| Ok(()))
                .with_assertion(passing("it works"))
                .boxed()])
        })
    }

    async fn run(container: &RecordingContainer) -> TestOutcome {
        run_test(container, &TestConfiguration::default(), &CancellationToken::new()).await
    }

    #[tokio::test]
    async fn test_lone_result_is_unnamed() {
        let container = RecordingContainer::new("lone", || Box::new(single_case_test()));

        assert_eq!(run(&container).await, TestOutcome::Passed);

        let events = container.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], Event::Start);
        assert_eq!(events[2], Event::End(TestOutcome::Passed));
        let results = container.results();
        assert_eq!(results[0].display_name, None);
        assert!(results[0].start_time <= results[0].end_time);
    }

    #[tokio::test]
    async fn test_every_assertion_of_every_case_is_reported() {
        let container = RecordingContainer::new("grid", || {
            Box::new(FnTest::new(|_| {
                Ok(["first", "second"]
                    .into_iter()
                    .map(|case| {
                        FnCase::new(case, |_| Ok(()))
                            .with_assertion(passing("a"))
                            .with_assertion(failing("b", "KABOOM"))
                            .with_assertion(passing("c"))
                            .boxed()
                    })
                    .collect())
            }))
        });

        assert_eq!(run(&container).await, TestOutcome::Failed);

        let results = container.results();
        let names: Vec<String> = results
            .iter()
            .map(|r| r.display_name.clone().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "a for test case first",
                "b for test case first",
                "c for test case first",
                "a for test case second",
                "b for test case second",
                "c for test case second",
            ]
        );
        let failed: Vec<bool> = results
            .iter()
            .map(|r| r.outcome == TestOutcome::Failed)
            .collect();
        assert_eq!(failed, vec![false, true, false, false, true, false]);
        assert_eq!(results[1].error_message.as_deref(), Some("KABOOM"));
    }

    #[tokio::test]
    async fn test_results_are_contiguous() {
        let container = RecordingContainer::new("timing", || {
            Box::new(FnTest::new(|_| {
                Ok(vec![FnCase::new("slowish", |_| {
                    std::thread::sleep(Duration::from_millis(20));
                    Ok(())
                })
                .with_assertion(passing("first"))
                .with_assertion(passing("second"))
                .boxed()])
            }))
        });

        run(&container).await;

        let results = container.results();
        assert!(results[0].duration_ms() >= 20);
        assert!(results[1].duration_ms() < 20);
        assert!(results[1].start_time >= results[0].end_time);
    }

    #[tokio::test]
    async fn test_arrangement_failure_skips_act_and_assert() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let container = RecordingContainer::new("broken", move || {
            let calls = Arc::clone(&counted);
            Box::new(FnTest::new(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FailureDetails::new("fixture unavailable")
                    .with_stack_trace("at arrange")
                    .into())
            }))
        });

        assert_eq!(run(&container).await, TestOutcome::ArrangementFailed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let results = container.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].outcome, TestOutcome::ArrangementFailed);
        assert_eq!(results[0].display_name, None);
        assert_eq!(results[0].error_message.as_deref(), Some("fixture unavailable"));
        assert_eq!(results[0].error_stack_trace.as_deref(), Some("at arrange"));
        assert_eq!(
            container.outcome(),
            Some(TestOutcome::ArrangementFailed)
        );
    }

    #[tokio::test]
    async fn test_arrangement_failure_can_count_as_failed() {
        let container = RecordingContainer::new("broken", || {
            Box::new(FnTest::new(|_| Err(anyhow!("nope"))))
        });
        let configuration = TestConfiguration {
            arrangement_failure_counts_as_failed: true,
            ..TestConfiguration::default()
        };

        let outcome = run_test(&container, &configuration, &CancellationToken::new()).await;

        assert_eq!(outcome, TestOutcome::Failed);
        assert_eq!(container.results()[0].outcome, TestOutcome::Failed);
    }

    #[tokio::test]
    async fn test_creation_failure_is_an_arrangement_failure() {
        let container = RecordingContainer::failing("uncreatable", "no instance");

        assert_eq!(run(&container).await, TestOutcome::ArrangementFailed);

        let events = container.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], Event::Start);
        assert_eq!(container.results()[0].error_message.as_deref(), Some("no instance"));
    }

    #[tokio::test]
    async fn test_arrangement_panic_is_caught() {
        let container = RecordingContainer::new("panicky", || {
            Box::new(FnTest::new(|_| panic!("arrange exploded")))
        });

        assert_eq!(run(&container).await, TestOutcome::ArrangementFailed);
        assert_eq!(
            container.results()[0].error_message.as_deref(),
            Some("panicked: arrange exploded")
        );
    }

    #[tokio::test]
    async fn test_assertion_panic_fails_only_that_assertion() {
        let container = RecordingContainer::new("panicky", || {
            Box::new(FnTest::new(|_| {
                Ok(vec![FnCase::new("case", |_| Ok(()))
                    .with_assertion(FnAssertion::new("explodes", |_| panic!("KABOOM")))
                    .with_assertion(passing("still runs"))
                    .boxed()])
            }))
        });

        assert_eq!(run(&container).await, TestOutcome::Failed);

        let results = container.results();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].outcome, TestOutcome::Failed);
        assert_eq!(results[0].error_message.as_deref(), Some("panicked: KABOOM"));
        assert_eq!(results[1].outcome, TestOutcome::Passed);
    }

    #[tokio::test]
    async fn test_action_failure_fails_its_assertions_without_checking() {
        let checks = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&checks);
        let container = RecordingContainer::new("action", move || {
            let checks = Arc::clone(&counted);
            Box::new(FnTest::new(move |_| {
                let first = Arc::clone(&checks);
                let second = Arc::clone(&checks);
                Ok(vec![
                    FnCase::new("bad", |_| Err(anyhow!("socket closed")))
                        .with_assertion(FnAssertion::new("x", move |_| {
                            first.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        }))
                        .with_assertion(FnAssertion::new("y", move |_| {
                            second.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        }))
                        .boxed(),
                    FnCase::new("good", |_| Ok(()))
                        .with_assertion(passing("z"))
                        .boxed(),
                ])
            }))
        });

        assert_eq!(run(&container).await, TestOutcome::Failed);
        assert_eq!(checks.load(Ordering::SeqCst), 0);

        let results = container.results();
        assert_eq!(results.len(), 3);
        for result in &results[..2] {
            assert_eq!(result.outcome, TestOutcome::Failed);
            assert_eq!(
                result.error_message.as_deref(),
                Some("Test action failed: socket closed")
            );
        }
        assert_eq!(results[2].outcome, TestOutcome::Passed);
        assert_eq!(results[2].display_name.as_deref(), Some("good"));
    }

    #[tokio::test]
    async fn test_test_without_assertions_reports_one_result() {
        let container =
            RecordingContainer::new("empty", || Box::new(FnTest::new(|_| Ok(Vec::new()))));

        assert_eq!(run(&container).await, TestOutcome::Passed);
        assert_eq!(container.results().len(), 1);
    }

    #[tokio::test]
    async fn test_output_reaches_container() {
        let container = RecordingContainer::new("chatty", || {
            Box::new(FnTest::new(|context| {
                context.write_output_line("arranging");
                Ok(vec![FnCase::new("case", |context| {
                    context.write_error("warning");
                    Ok(())
                })
                .with_assertion(passing("ok"))
                .boxed()])
            }))
        });

        run(&container).await;

        let events = container.events();
        assert_eq!(events[1], Event::Output("arranging".to_string()));
        assert_eq!(events[2], Event::Output("\n".to_string()));
        assert_eq!(events[3], Event::Error("warning".to_string()));
    }

    #[tokio::test]
    async fn test_overrides_do_not_leak_between_tests() {
        let overriding = Arc::new(RecordingContainer::new("overriding", || {
            Box::new(
                FnTest::new(|_| Err(anyhow!("nope"))).with_configuration_overrides(|config| {
                    config.arrangement_failure_counts_as_failed = true;
                }),
            )
        }));
        let plain = Arc::new(RecordingContainer::new("plain", || {
            Box::new(FnTest::new(|_| Err(anyhow!("nope"))))
        }));

        let summary = TestRun::new(
            vec![erased(&overriding), erased(&plain)],
            TestRunConfiguration::sequential(),
        )
        .execute(CancellationToken::new())
        .await
        .unwrap();

        assert_eq!(overriding.outcome(), Some(TestOutcome::Failed));
        assert_eq!(plain.outcome(), Some(TestOutcome::ArrangementFailed));
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.arrangement_failed, 1);
    }

    #[tokio::test]
    async fn test_every_instance_is_dropped() {
        let drops = Arc::new(AtomicUsize::new(0));

        let tests: Vec<Arc<RecordingContainer>> = vec![
            {
                let drops = Arc::clone(&drops);
                RecordingContainer::new("passes", move || {
                    Box::new(DropCounted::new(single_case_test(), &drops))
                })
            },
            {
                let drops = Arc::clone(&drops);
                RecordingContainer::new("bad arrangement", move || {
                    Box::new(DropCounted::new(
                        FnTest::new(|_| Err(anyhow!("nope"))),
                        &drops,
                    ))
                })
            },
            {
                let drops = Arc::clone(&drops);
                RecordingContainer::new("panics", move || {
                    Box::new(DropCounted::new(
                        FnTest::new(|_| {
                            Ok(vec![FnCase::new("case", |_| panic!("boom"))
                                .with_assertion(passing("never"))
                                .boxed()])
                        }),
                        &drops,
                    ))
                })
            },
        ]
        .into_iter()
        .map(Arc::new)
        .collect();

        TestRun::new(tests.iter().map(erased), TestRunConfiguration::new())
            .execute(CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(drops.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_sequential_run_stops_starting_tests_once_cancelled() {
        let first = Arc::new(RecordingContainer::new("cancels", || {
            Box::new(FnTest::new(|_| {
                Ok(vec![FnCase::new("case", |context| {
                    context.cancellation().cancel();
                    Ok(())
                })
                .with_assertion(passing("ok"))
                .boxed()])
            }))
        }));
        let second = Arc::new(RecordingContainer::new("skipped", || {
            Box::new(single_case_test())
        }));

        let result = TestRun::new(
            vec![erased(&first), erased(&second)],
            TestRunConfiguration::sequential(),
        )
        .execute(CancellationToken::new())
        .await;

        assert_eq!(result, Err(RunError::Cancelled));
        assert_eq!(first.outcome(), Some(TestOutcome::Passed));
        assert!(second.events().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_nothing() {
        let container = Arc::new(RecordingContainer::new("never", || {
            Box::new(single_case_test())
        }));
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        for configuration in strategies() {
            let result = TestRun::new(vec![erased(&container)], configuration)
                .execute(cancellation.clone())
                .await;
            assert_eq!(result, Err(RunError::Cancelled));
        }
        assert!(container.events().is_empty());
    }

    #[tokio::test]
    async fn test_empty_run() {
        for configuration in strategies() {
            let summary = TestRun::new(Vec::new(), configuration)
                .execute(CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(summary, RunSummary::default());
        }
    }

    /// Tracks how many tests are inside their action at once, per key.
    #[derive(Default)]
    struct Occupancy {
        active: Mutex<HashMap<String, usize>>,
        peak: Mutex<HashMap<String, usize>>,
    }

    impl Occupancy {
        fn enter(&self, key: &str) {
            let mut active = self.active.lock().unwrap();
            let count = active.entry(key.to_string()).or_insert(0);
            *count += 1;
            let mut peak = self.peak.lock().unwrap();
            let max = peak.entry(key.to_string()).or_insert(0);
            *max = (*max).max(*count);
        }

        fn leave(&self, key: &str) {
            *self.active.lock().unwrap().get_mut(key).unwrap() -= 1;
        }

        fn peak(&self, key: &str) -> usize {
            self.peak.lock().unwrap().get(key).copied().unwrap_or(0)
        }
    }

    fn occupying_container(
        name: String,
        key: &'static str,
        occupancy: &Arc<Occupancy>,
    ) -> RecordingContainer {
        let occupancy = Arc::clone(occupancy);
        RecordingContainer::new(&name, move || {
            let occupancy = Arc::clone(&occupancy);
            Box::new(FnTest::new(move |_| {
                let occupancy = Arc::clone(&occupancy);
                Ok(vec![FnCase::new_async("occupy", move |_| {
                    let occupancy = Arc::clone(&occupancy);
                    Box::pin(async move {
                        occupancy.enter(key);
                        occupancy.enter("*");
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        occupancy.leave("*");
                        occupancy.leave(key);
                        Ok::<_, anyhow::Error>(())
                    })
                })
                .with_assertion(passing("done"))
                .boxed()])
            }))
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_affinity_groups_never_overlap() {
        let occupancy = Arc::new(Occupancy::default());
        let keys = ["alpha", "beta", "gamma"];
        let containers: Vec<Arc<RecordingContainer>> = (0..12)
            .map(|i| {
                let key = keys[i % keys.len()];
                Arc::new(
                    occupying_container(format!("test {i}"), key, &occupancy)
                        .with_trait("Category", key),
                )
            })
            .collect();

        let summary = TestRun::new(
            containers.iter().map(erased),
            TestRunConfiguration::new()
                .with_affinity_trait("Category")
                .with_max_degree_of_parallelism(3),
        )
        .execute(CancellationToken::new())
        .await
        .unwrap();

        assert_eq!(summary.total, 12);
        assert!(summary.is_all_passed());
        for key in keys {
            assert_eq!(occupancy.peak(key), 1, "tests with {key} overlapped");
        }
        assert!(containers
            .iter()
            .all(|c| c.outcome() == Some(TestOutcome::Passed)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_run_honours_max_degree() {
        let occupancy = Arc::new(Occupancy::default());
        let containers: Vec<Arc<RecordingContainer>> = (0..10)
            .map(|i| Arc::new(occupying_container(format!("test {i}"), "any", &occupancy)))
            .collect();

        let summary = TestRun::new(
            containers.iter().map(erased),
            TestRunConfiguration::new().with_max_degree_of_parallelism(2),
        )
        .execute(CancellationToken::new())
        .await
        .unwrap();

        assert_eq!(summary.passed, 10);
        assert!(occupancy.peak("*") <= 2);
    }

    fn strategies() -> [TestRunConfiguration; 3] {
        [
            TestRunConfiguration::sequential(),
            TestRunConfiguration::new(),
            TestRunConfiguration::new().with_affinity_trait("Category"),
        ]
    }

    #[tokio::test]
    async fn test_zero_max_degree_still_runs_every_test() {
        for configuration in strategies() {
            let containers: Vec<Arc<RecordingContainer>> = (0..3)
                .map(|i| {
                    Arc::new(
                        RecordingContainer::new(&format!("test {i}"), || {
                            Box::new(single_case_test())
                        })
                        .with_trait("Category", "shared"),
                    )
                })
                .collect();

            let run = TestRun::new(
                containers.iter().map(erased),
                configuration.with_max_degree_of_parallelism(0),
            )
            .execute(CancellationToken::new());
            let summary = tokio::time::timeout(Duration::from_secs(5), run)
                .await
                .expect("run with a zero limit stalled")
                .unwrap();

            assert_eq!(summary.passed, 3);
        }
    }

    #[tokio::test]
    async fn test_abandoned_run_stops_its_workers() {
        for configuration in strategies() {
            let started = Arc::new(AtomicUsize::new(0));
            let drops = Arc::new(AtomicUsize::new(0));
            let container = {
                let started = Arc::clone(&started);
                let drops = Arc::clone(&drops);
                Arc::new(
                    RecordingContainer::new("stuck", move || {
                        let started = Arc::clone(&started);
                        Box::new(DropCounted::new(
                            FnTest::new(move |_| {
                                let started = Arc::clone(&started);
                                Ok(vec![FnCase::new_async("waits forever", move |_| {
                                    started.fetch_add(1, Ordering::SeqCst);
                                    Box::pin(async {
                                        std::future::pending::<()>().await;
                                        Ok::<_, anyhow::Error>(())
                                    })
                                })
                                .with_assertion(passing("never checked"))
                                .boxed()])
                            }),
                            &drops,
                        ))
                    })
                    .with_trait("Category", "stuck"),
                )
            };

            let run = TestRun::new(vec![erased(&container)], configuration)
                .execute(CancellationToken::new());
            assert!(tokio::time::timeout(Duration::from_millis(100), run)
                .await
                .is_err());
            assert_eq!(started.load(Ordering::SeqCst), 1);

            for _ in 0..100 {
                if drops.load(Ordering::SeqCst) == 1 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            assert_eq!(drops.load(Ordering::SeqCst), 1);
            assert_eq!(container.outcome(), None);
            assert!(container.results().is_empty());
        }
    }

    #[test]
    fn test_worker_count() {
        assert_eq!(worker_count(Some(4), 10), 4);
        assert_eq!(worker_count(Some(8), 3), 3);
        assert_eq!(worker_count(Some(4), 0), 1);
        assert_eq!(worker_count(Some(0), 5), 1);
        assert!(worker_count(None, 1000) >= 1);
    }

    #[test]
    fn test_summarize_prefers_worker_errors() {
        let results = vec![
            Ok(Ok(vec![TestOutcome::Passed])),
            Ok(Err(RunError::Cancelled)),
            Ok(Err(RunError::Worker("boom".to_string()))),
        ];
        assert_eq!(
            summarize(results),
            Err(RunError::Worker("boom".to_string()))
        );
    }

    #[test]
    fn test_summarize_counts_outcomes() {
        let results = vec![
            Ok(Ok(vec![TestOutcome::Passed, TestOutcome::Failed])),
            Ok(Ok(vec![])),
            Ok(Ok(vec![TestOutcome::ArrangementFailed])),
        ];
        let summary = summarize(results).unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.arrangement_failed, 1);
    }
}
