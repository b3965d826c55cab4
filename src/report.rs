//! Result tree, summary aggregation and report rendering.
//!
//! ```text
//! RunOutcome
//!  └─ TestResult[]        (skipped / passed derived)
//!      └─ StepResult[]
//!          └─ ValidationResult[]
//! ```
//!
//! Nothing in the tree stores a counter: every summary figure is computed
//! by [`aggregate`] walking the tree, so counts cannot drift from results.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::path::render;
use crate::transport::HttpRequest;
use crate::validation::ValidationResult;

/// Final state of a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    /// Every validation of every step is valid
    Passed,
    /// At least one validation failed
    Failed,
    /// Not executed
    Skipped,
}

/// Result of one step.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    /// Step label
    pub name: String,
    /// The request as sent (after resolution)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<HttpRequest>,
    /// Response status, when a response was received
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Ordered validation results, including synthetic runtime failures
    pub validations: Vec<ValidationResult>,
    /// Wall time of the step
    pub duration_ms: u64,
}

impl StepResult {
    /// Whether every validation is valid
    #[must_use]
    pub fn passed(&self) -> bool {
        self.validations.iter().all(|v| v.valid)
    }

    /// Number of invalid validations
    #[must_use]
    pub fn failed_validations(&self) -> usize {
        self.validations.iter().filter(|v| !v.valid).count()
    }
}

/// Result of one test.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    /// Test identifier
    pub id: String,
    /// The test was skipped without execution
    pub skipped: bool,
    /// Ordered step results (empty when skipped)
    pub steps: Vec<StepResult>,
    /// Wall time of the test
    pub duration_ms: u64,
}

impl TestResult {
    /// Result for a test that was not executed
    pub fn skipped(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            skipped: true,
            steps: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Executed and every validation valid
    #[must_use]
    pub fn passed(&self) -> bool {
        !self.skipped && self.steps.iter().all(StepResult::passed)
    }

    /// Derived final state
    #[must_use]
    pub fn status(&self) -> TestStatus {
        if self.skipped {
            TestStatus::Skipped
        } else if self.passed() {
            TestStatus::Passed
        } else {
            TestStatus::Failed
        }
    }

    /// Invalid validations across all steps
    #[must_use]
    pub fn failed_validations(&self) -> usize {
        self.steps.iter().map(StepResult::failed_validations).sum()
    }
}

impl Serialize for TestResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TestResult", 5)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("passed", &self.passed())?;
        state.serialize_field("skipped", &self.skipped)?;
        state.serialize_field("durationMs", &self.duration_ms)?;
        state.serialize_field("stepResults", &self.steps)?;
        state.end()
    }
}

/// Summary counts derived from a result tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Non-skipped tests
    pub tests_executed: usize,
    /// Non-skipped tests with at least one invalid validation
    pub tests_failed: usize,
    /// Skipped tests
    pub tests_skipped: usize,
    /// Validations of all executed tests
    pub validations_performed: usize,
    /// Invalid validations of all executed tests
    pub validations_failed: usize,
}

/// Compute summary counts with a single traversal of the tree.
#[must_use]
pub fn aggregate(results: &[TestResult]) -> Summary {
    results.iter().fold(Summary::default(), |mut summary, test| {
        if test.skipped {
            summary.tests_skipped += 1;
            return summary;
        }
        summary.tests_executed += 1;
        let mut failed_here = 0;
        for step in &test.steps {
            summary.validations_performed += step.validations.len();
            failed_here += step.failed_validations();
        }
        summary.validations_failed += failed_here;
        if failed_here > 0 {
            summary.tests_failed += 1;
        }
        summary
    })
}

/// Outcome of a run, consumed by reporters.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// Run start
    pub time_started: DateTime<Utc>,
    /// Run end
    pub time_ended: DateTime<Utc>,
    /// Test results in suite order
    pub test_results: Vec<TestResult>,
}

impl RunOutcome {
    /// Summary counts
    #[must_use]
    pub fn summary(&self) -> Summary {
        aggregate(&self.test_results)
    }

    /// Process exit code: number of failed tests, clamped to `u8`
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        u8::try_from(self.summary().tests_failed).unwrap_or(u8::MAX)
    }
}

impl Serialize for RunOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let summary = self.summary();
        let mut state = serializer.serialize_struct("RunOutcome", 8)?;
        state.serialize_field("timeStarted", &self.time_started)?;
        state.serialize_field("timeEnded", &self.time_ended)?;
        state.serialize_field("testsExecuted", &summary.tests_executed)?;
        state.serialize_field("testsFailed", &summary.tests_failed)?;
        state.serialize_field("testsSkipped", &summary.tests_skipped)?;
        state.serialize_field("validationsPerformed", &summary.validations_performed)?;
        state.serialize_field("validationsFailed", &summary.validations_failed)?;
        state.serialize_field("testResults", &self.test_results)?;
        state.end()
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Report format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    /// Human-readable text
    #[default]
    Console,
    /// The serialized [`RunOutcome`]
    Json,
}

/// Render an outcome in the requested format
pub fn render_report(outcome: &RunOutcome, format: ReportFormat) -> crate::Result<String> {
    match format {
        ReportFormat::Console => Ok(format_text(outcome)),
        ReportFormat::Json => Ok(serde_json::to_string_pretty(outcome)?),
    }
}

/// Format as human-readable text
#[must_use]
pub fn format_text(outcome: &RunOutcome) -> String {
    let mut output = String::new();

    for test in &outcome.test_results {
        let icon = match test.status() {
            TestStatus::Passed => "✅",
            TestStatus::Failed => "❌",
            TestStatus::Skipped => "⏭️ ",
        };
        let _ = writeln!(output, "{icon} {} ({}ms)", test.id, test.duration_ms);

        for step in test.steps.iter().filter(|s| !s.passed()) {
            let _ = writeln!(output, "   ▸ {}", step.name);
            for validation in step.validations.iter().filter(|v| !v.valid) {
                let _ = writeln!(
                    output,
                    "     ✗ {}: {}",
                    validation.description,
                    validation.message.as_deref().unwrap_or("failed")
                );
                if let Some(actual) = &validation.actual {
                    let _ = writeln!(output, "       actual:   {}", render(actual));
                }
                if let Some(expected) = &validation.expected {
                    let _ = writeln!(output, "       expected: {}", render(expected));
                }
            }
        }
    }

    let summary = outcome.summary();
    let elapsed = (outcome.time_ended - outcome.time_started).num_milliseconds();
    let _ = writeln!(output, "\n{}", "=".repeat(60));
    let _ = writeln!(
        output,
        "  Tests:       {} executed, {} failed, {} skipped",
        summary.tests_executed, summary.tests_failed, summary.tests_skipped
    );
    let _ = writeln!(
        output,
        "  Validations: {} performed, {} failed",
        summary.validations_performed, summary.validations_failed
    );
    let _ = writeln!(output, "  Duration:    {elapsed}ms");
    let _ = writeln!(output, "{}", "=".repeat(60));
    output
}
