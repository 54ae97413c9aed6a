//! Test support for the execution engine

use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{CancellationToken, TestContainer};
use crate::config::TestConfiguration;
use crate::models::{
    Test, TestCase, TestContext, TestMetadata, TestOutcome, TestResultRecord, TestTrait,
};

/// Context that discards output
#[derive(Default)]
pub struct NullContext {
    cancellation: CancellationToken,
}

impl TestContext for NullContext {
    fn write_output(&self, _output: &str) {}

    fn write_error(&self, _error: &str) {}

    fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

/// Everything a container was told, in order
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Start,
    Result(TestResultRecord),
    End(TestOutcome),
    Output(String),
    Error(String),
}

type Factory = dyn Fn() -> Result<Box<dyn Test>> + Send + Sync;

/// Container that records every call made to it
pub struct RecordingContainer {
    metadata: TestMetadata,
    factory: Box<Factory>,
    events: Mutex<Vec<Event>>,
}

impl RecordingContainer {
    pub fn new<F>(name: &str, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Test> + Send + Sync + 'static,
    {
        Self {
            metadata: TestMetadata::new(name),
            factory: Box::new(move || -> Result<Box<dyn Test>> { Ok(factory()) }),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Container whose test cannot even be instantiated
    pub fn failing(name: &str, message: &'static str) -> Self {
        Self {
            metadata: TestMetadata::new(name),
            factory: Box::new(move || -> Result<Box<dyn Test>> { Err(anyhow!(message)) }),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn with_trait(mut self, name: &str, value: &str) -> Self {
        self.metadata.traits.push(TestTrait::new(name, value));
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn results(&self) -> Vec<TestResultRecord> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Result(record) => Some(record),
                _ => None,
            })
            .collect()
    }

    pub fn outcome(&self) -> Option<TestOutcome> {
        self.events().into_iter().find_map(|event| match event {
            Event::End(outcome) => Some(outcome),
            _ => None,
        })
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl TestContainer for RecordingContainer {
    fn metadata(&self) -> &TestMetadata {
        &self.metadata
    }

    fn create_test(&self) -> Result<Box<dyn Test>> {
        (self.factory)()
    }

    fn record_start(&self) {
        self.push(Event::Start);
    }

    fn record_result(&self, result: TestResultRecord) {
        self.push(Event::Result(result));
    }

    fn record_end(&self, outcome: TestOutcome) {
        self.push(Event::End(outcome));
    }

    fn write_output(&self, output: &str) {
        self.push(Event::Output(output.to_string()));
    }

    fn write_error(&self, error: &str) {
        self.push(Event::Error(error.to_string()));
    }
}

/// Erase a shared recording container for handing to a run.
pub fn erased(container: &Arc<RecordingContainer>) -> Arc<dyn TestContainer> {
    Arc::clone(container) as Arc<dyn TestContainer>
}

/// Wraps a test and counts how many instances have been dropped
pub struct DropCounted {
    inner: Box<dyn Test>,
    drops: Arc<AtomicUsize>,
}

impl DropCounted {
    pub fn new(inner: impl Test + 'static, drops: &Arc<AtomicUsize>) -> Self {
        Self {
            inner: Box::new(inner),
            drops: Arc::clone(drops),
        }
    }
}

impl Drop for DropCounted {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

impl Test for DropCounted {
    fn has_configuration_overrides(&self) -> bool {
        self.inner.has_configuration_overrides()
    }

    fn apply_configuration_overrides(&self, configuration: &mut TestConfiguration) {
        self.inner.apply_configuration_overrides(configuration);
    }

    fn arrange<'a>(&'a mut self, context: &'a dyn TestContext) -> BoxFuture<'a, Result<()>> {
        self.inner.arrange(context)
    }

    fn cases(&self) -> &[Box<dyn TestCase>] {
        self.inner.cases()
    }
}
