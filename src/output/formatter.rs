//! Output formatters for run reports
//!
//! Provides table, JSON, CSV and one-line summary output.

use anyhow::Result;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use super::{RunReport, TestReport};
use crate::models::{TestOutcome, TestResultRecord};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// One CSV line per recorded result
#[derive(Serialize)]
struct CsvRow<'a> {
    test: &'a str,
    result: &'a str,
    outcome: TestOutcome,
    start_time: String,
    duration_ms: u64,
    message: &'a str,
    output: &'a str,
}

/// Report formatter
pub struct ReportFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ReportFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// Format a complete run report
    pub fn format_report(&self, report: &RunReport) -> Result<String> {
        Ok(match self.format {
            OutputFormat::Table => self.format_table(report),
            OutputFormat::Json => serde_json::to_string(report)?,
            OutputFormat::JsonPretty => serde_json::to_string_pretty(report)?,
            OutputFormat::Csv => self.format_csv(report)?,
            OutputFormat::Summary => self.format_brief(report),
        })
    }

    /// Format one test and its results as table rows
    pub fn format_test(&self, test: &TestReport) -> String {
        let mut output = String::new();

        let status = match test.outcome {
            Some(outcome) => self.paint(outcome, &format!("{} {}", outcome.symbol(), outcome)),
            None => "○ NOT RUN".to_string(),
        };
        output.push_str(&format!(
            "  {:40} {} [{:>6}ms]\n",
            test.name,
            status,
            test.duration_ms()
        ));

        // A lone unnamed result is already described by the test line.
        let lone_unnamed = test.results.len() == 1 && test.results[0].result.display_name.is_none();
        for reported in &test.results {
            if !lone_unnamed {
                output.push_str(&format!("      {}\n", self.format_result(&reported.result)));
            } else if let Some(message) = &reported.result.error_message {
                output.push_str(&format!("      {message}\n"));
            }
        }

        output
    }

    fn format_result(&self, result: &TestResultRecord) -> String {
        let line = result.to_string();
        if result.outcome.is_success() {
            line
        } else {
            self.paint(result.outcome, &line)
        }
    }

    fn paint(&self, outcome: TestOutcome, text: &str) -> String {
        if !self.colorize {
            return text.to_string();
        }
        let color = match outcome {
            TestOutcome::Passed => "32",
            TestOutcome::Failed => "31",
            TestOutcome::ArrangementFailed => "33",
        };
        format!("\x1b[{color}m{text}\x1b[0m")
    }

    fn format_table(&self, report: &RunReport) -> String {
        let mut output = String::new();

        // Header
        output.push_str("\n╔══════════════════════════════════════════════════════════════╗\n");
        output.push_str(&format!(
            "║  Test run - {:3} tests                                        ║\n",
            report.tests.len()
        ));
        output.push_str("╚══════════════════════════════════════════════════════════════╝\n");

        for test in &report.tests {
            output.push_str(&self.format_test(test));
        }

        // Footer
        let summary = &report.summary;
        let pass_str = if self.colorize {
            format!("\x1b[32m{}\x1b[0m", summary.passed)
        } else {
            summary.passed.to_string()
        };
        let fail_str = if self.colorize && summary.failed > 0 {
            format!("\x1b[31m{}\x1b[0m", summary.failed)
        } else {
            summary.failed.to_string()
        };

        output.push_str("════════════════════════════════════════════════════════════════\n");
        output.push_str(&format!(
            "  Total: {} | Pass: {} | Fail: {} | Arrangement failed: {} | Not run: {}\n",
            summary.total, pass_str, fail_str, summary.arrangement_failed, report.not_run
        ));
        output.push_str(&format!(
            "  Pass Rate: {:5.1}% | Duration: {}ms\n",
            summary.pass_rate(),
            report.duration_ms()
        ));

        output
    }

    fn format_csv(&self, report: &RunReport) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());

        for test in &report.tests {
            for reported in &test.results {
                let result = &reported.result;
                writer.serialize(CsvRow {
                    test: &test.name,
                    result: result.display_name.as_deref().unwrap_or(""),
                    outcome: result.outcome,
                    start_time: result.start_time.to_rfc3339(),
                    duration_ms: result.duration_ms(),
                    message: result.error_message.as_deref().unwrap_or(""),
                    output: &reported.output,
                })?;
            }
        }

        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        Ok(String::from_utf8(bytes)?)
    }

    fn format_brief(&self, report: &RunReport) -> String {
        format!(
            "{}/{} passed ({:.1}%), {} failed, {} arrangement failed, {} not run in {}ms",
            report.summary.passed,
            report.summary.total,
            report.summary.pass_rate(),
            report.summary.failed,
            report.summary.arrangement_failed,
            report.not_run,
            report.duration_ms()
        )
    }

    /// Write the formatted report to a file, without colour codes
    pub fn write_to(&self, path: impl AsRef<Path>, report: &RunReport) -> Result<()> {
        let formatter = ReportFormatter {
            format: self.format,
            colorize: false,
        };
        let content = formatter.format_report(report)?;

        let mut file = std::fs::File::create(path)?;
        file.write_all(content.as_bytes())?;

        Ok(())
    }
}

impl Default for ReportFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}
