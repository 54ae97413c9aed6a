//! Context handed to running tests

use super::{CancellationToken, TestContainer};
use crate::models::TestContext;

/// Routes a test's output to its container and exposes the run's
/// cancellation signal.
pub struct ExecutionContext<'a> {
    container: &'a dyn TestContainer,
    cancellation: CancellationToken,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(container: &'a dyn TestContainer, cancellation: CancellationToken) -> Self {
        Self {
            container,
            cancellation,
        }
    }
}

impl TestContext for ExecutionContext<'_> {
    fn write_output(&self, output: &str) {
        self.container.write_output(output);
    }

    fn write_error(&self, error: &str) {
        self.container.write_error(error);
    }

    fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}
