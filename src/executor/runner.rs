//! Test executor
//!
//! Owns the run-in-progress state: one run at a time per executor, with an
//! idempotent way to cancel it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use super::{CancellationToken, RunError, TestContainer, TestRun};
use crate::config::TestRunConfiguration;
use crate::models::RunSummary;

/// Entry point for executing tests
#[derive(Debug, Default)]
pub struct TestExecutor {
    active_run: Mutex<Option<CancellationToken>>,
}

impl TestExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the given tests.
    ///
    /// Fails with [`RunError::RunInProgress`] if this executor is already
    /// running, without affecting the run in progress.
    pub async fn run_tests(
        &self,
        containers: Vec<Arc<dyn TestContainer>>,
        configuration: TestRunConfiguration,
    ) -> Result<RunSummary, RunError> {
        let (_guard, cancellation) = self.begin_run()?;
        TestRun::new(containers, configuration)
            .execute(cancellation)
            .await
    }

    /// Cancel the run in progress, if any. Safe to call at any time.
    pub fn cancel(&self) {
        match self.active().as_ref() {
            Some(cancellation) => {
                info!("Cancelling test run");
                cancellation.cancel();
            }
            None => debug!("Cancel requested with no test run in progress"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.active().is_some()
    }

    fn begin_run(&self) -> Result<(ActiveRun<'_>, CancellationToken), RunError> {
        let mut active = self.active();
        if active.is_some() {
            return Err(RunError::RunInProgress);
        }

        let cancellation = CancellationToken::new();
        *active = Some(cancellation.clone());

        Ok((ActiveRun { executor: self }, cancellation))
    }

    fn active(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.active_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the executor's active run when the run finishes or is dropped.
struct ActiveRun<'a> {
    executor: &'a TestExecutor,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        *self.executor.active() = None;
    }
}
