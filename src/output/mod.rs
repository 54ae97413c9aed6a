//! Result reporting
//!
//! Collects what tests report during a run and renders it in various formats.

mod collector;
mod formatter;

pub use collector::{ReportCollector, ReportedResult, ReportingContainer, RunReport, TestReport};
pub use formatter::{OutputFormat, ReportFormatter};
