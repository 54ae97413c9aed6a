//! In-process result collection
//!
//! A [`ReportingContainer`] per test, all feeding one shared [`ReportCollector`]
//! that can be snapshotted into a [`RunReport`] at any time.

use anyhow::Result;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::executor::TestContainer;
use crate::models::{RunSummary, Test, TestMetadata, TestOutcome, TestResultRecord, TestTrait};

type Factory = dyn Fn() -> Result<Box<dyn Test>> + Send + Sync;

/// A recorded result together with the output written before it
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportedResult {
    #[serde(flatten)]
    pub result: TestResultRecord,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub output: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub errors: String,
}

/// Everything reported about one test
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TestReport {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub traits: Vec<TestTrait>,
    pub started_at: Option<DateTime<Local>>,
    /// `None` while the test is running or if it never ran.
    pub outcome: Option<TestOutcome>,
    pub results: Vec<ReportedResult>,
    /// Output written after the last result, or by a test with no results.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub trailing_output: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub trailing_errors: String,
}

impl TestReport {
    fn new(metadata: &TestMetadata) -> Self {
        Self {
            name: metadata.name.clone(),
            traits: metadata.traits.clone(),
            started_at: None,
            outcome: None,
            results: Vec::new(),
            trailing_output: String::new(),
            trailing_errors: String::new(),
        }
    }

    pub fn has_run(&self) -> bool {
        self.outcome.is_some()
    }

    /// Time from the start of the first result to the end of the last one.
    pub fn duration_ms(&self) -> u64 {
        span_ms(self.results.iter())
    }

    fn start(&mut self) {
        self.started_at = Some(Local::now());
        self.outcome = None;
        self.results.clear();
    }

    fn push_result(&mut self, result: TestResultRecord) {
        self.results.push(ReportedResult {
            result,
            output: std::mem::take(&mut self.trailing_output),
            errors: std::mem::take(&mut self.trailing_errors),
        });
    }
}

/// Snapshot of a run's reports, in registration order
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub summary: RunSummary,
    /// Tests registered but never started, e.g. after cancellation.
    pub not_run: usize,
    pub tests: Vec<TestReport>,
}

impl RunReport {
    fn from_tests(tests: Vec<TestReport>) -> Self {
        let summary = RunSummary::from_outcomes(tests.iter().filter_map(|t| t.outcome));
        let not_run = tests.iter().filter(|t| t.started_at.is_none()).count();
        Self {
            summary,
            not_run,
            tests,
        }
    }

    /// Wall-clock span covered by every recorded result.
    pub fn duration_ms(&self) -> u64 {
        span_ms(self.tests.iter().flat_map(|t| t.results.iter()))
    }
}

fn span_ms<'a>(results: impl Iterator<Item = &'a ReportedResult> + Clone) -> u64 {
    let start = results.clone().map(|r| r.result.start_time).min();
    let end = results.map(|r| r.result.end_time).max();
    match (start, end) {
        (Some(start), Some(end)) => (end - start).num_milliseconds().max(0) as u64,
        _ => 0,
    }
}

/// Shared store behind every [`ReportingContainer`] of a run
#[derive(Debug, Default)]
pub struct ReportCollector {
    reports: Mutex<Vec<TestReport>>,
}

impl ReportCollector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a test and get the container that reports into this collector.
    pub fn register<F>(self: &Arc<Self>, metadata: TestMetadata, factory: F) -> ReportingContainer
    where
        F: Fn() -> Result<Box<dyn Test>> + Send + Sync + 'static,
    {
        let slot = {
            let mut reports = self.reports();
            reports.push(TestReport::new(&metadata));
            reports.len() - 1
        };

        ReportingContainer {
            metadata,
            factory: Box::new(factory),
            collector: Arc::clone(self),
            slot,
        }
    }

    pub fn report(&self) -> RunReport {
        RunReport::from_tests(self.reports().clone())
    }

    fn update(&self, slot: usize, apply: impl FnOnce(&mut TestReport)) {
        if let Some(report) = self.reports().get_mut(slot) {
            apply(report);
        }
    }

    fn reports(&self) -> MutexGuard<'_, Vec<TestReport>> {
        self.reports.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// [`TestContainer`] that records into a [`ReportCollector`]
pub struct ReportingContainer {
    metadata: TestMetadata,
    factory: Box<Factory>,
    collector: Arc<ReportCollector>,
    slot: usize,
}

impl ReportingContainer {
    pub fn into_container(self) -> Arc<dyn TestContainer> {
        Arc::new(self)
    }
}

impl TestContainer for ReportingContainer {
    fn metadata(&self) -> &TestMetadata {
        &self.metadata
    }

    fn create_test(&self) -> Result<Box<dyn Test>> {
        (self.factory)()
    }

    fn record_start(&self) {
        self.collector.update(self.slot, TestReport::start);
    }

    fn record_result(&self, result: TestResultRecord) {
        self.collector
            .update(self.slot, |report| report.push_result(result));
    }

    fn record_end(&self, outcome: TestOutcome) {
        self.collector
            .update(self.slot, |report| report.outcome = Some(outcome));
    }

    fn write_output(&self, output: &str) {
        self.collector
            .update(self.slot, |report| report.trailing_output.push_str(output));
    }

    fn write_error(&self, error: &str) {
        self.collector
            .update(self.slot, |report| report.trailing_errors.push_str(error));
    }
}
