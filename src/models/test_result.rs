//! Test result models
//!
//! Defines unit outcomes and the individual result records reported to a sink.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Terminal verdict for a single test
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    Passed,
    Failed,
    ArrangementFailed,
}

impl TestOutcome {
    pub fn symbol(&self) -> &'static str {
        match self {
            TestOutcome::Passed => "✓",
            TestOutcome::Failed => "✗",
            TestOutcome::ArrangementFailed => "!",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TestOutcome::Passed)
    }

    /// Outcome to record when arrangement fails, honouring the remap option.
    pub fn for_arrangement_failure(counts_as_failed: bool) -> Self {
        if counts_as_failed {
            TestOutcome::Failed
        } else {
            TestOutcome::ArrangementFailed
        }
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestOutcome::Passed => write!(f, "PASSED"),
            TestOutcome::Failed => write!(f, "FAILED"),
            TestOutcome::ArrangementFailed => write!(f, "ARRANGEMENT FAILED"),
        }
    }
}

/// One reported fact about a test: an arrangement failure or an assertion check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestResultRecord {
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    /// Absent for a lone result, so hosts keep the test's own name.
    pub display_name: Option<String>,
    pub outcome: TestOutcome,
    pub error_message: Option<String>,
    pub error_stack_trace: Option<String>,
}

impl TestResultRecord {
    pub fn passed(
        start_time: DateTime<Local>,
        end_time: DateTime<Local>,
        display_name: Option<String>,
    ) -> Self {
        Self {
            start_time,
            end_time,
            display_name,
            outcome: TestOutcome::Passed,
            error_message: None,
            error_stack_trace: None,
        }
    }

    pub fn failed(
        start_time: DateTime<Local>,
        end_time: DateTime<Local>,
        display_name: Option<String>,
        outcome: TestOutcome,
        error_message: Option<String>,
        error_stack_trace: Option<String>,
    ) -> Self {
        Self {
            start_time,
            end_time,
            display_name,
            outcome,
            error_message,
            error_stack_trace,
        }
    }

    /// Elapsed time between start and end, clamped at zero.
    pub fn duration(&self) -> Duration {
        (self.end_time - self.start_time)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration().as_millis() as u64
    }
}

impl fmt::Display for TestResultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}ms]",
            self.outcome.symbol(),
            self.display_name.as_deref().unwrap_or("<result>"),
            self.duration_ms()
        )?;
        if let Some(msg) = &self.error_message {
            write!(f, " - {msg}")?;
        }
        Ok(())
    }
}

/// Outcome counts for a completed run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub arrangement_failed: usize,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = TestOutcome>) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            summary.record(outcome);
        }
        summary
    }

    pub fn record(&mut self, outcome: TestOutcome) {
        self.total += 1;
        match outcome {
            TestOutcome::Passed => self.passed += 1,
            TestOutcome::Failed => self.failed += 1,
            TestOutcome::ArrangementFailed => self.arrangement_failed += 1,
        }
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.passed as f64 / self.total as f64) * 100.0
        }
    }

    pub fn is_all_passed(&self) -> bool {
        self.passed == self.total
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total: {} | Passed: {} | Failed: {} | Arrangement failed: {} | Pass Rate: {:.1}%",
            self.total,
            self.passed,
            self.failed,
            self.arrangement_failed,
            self.pass_rate()
        )
    }
}
