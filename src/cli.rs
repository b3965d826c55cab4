//! Command-line interface

use std::path::PathBuf;

use clap::Parser;

use crate::filter::parse_tags;
use crate::report::ReportFormat;

/// Run declarative HTTP API test suites
#[derive(Parser, Debug)]
#[command(name = "apisuite")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Test documents or glob patterns (JSON or YAML), combined in order
    #[arg(short, long = "tests", required = true, num_args = 1.., env = "APISUITE_TESTS", value_delimiter = ',')]
    pub tests: Vec<String>,

    /// Extra documents merged after the test documents
    #[arg(short, long = "extra", num_args = 1.., env = "APISUITE_EXTRA", value_delimiter = ',')]
    pub extra: Vec<String>,

    /// Configuration file (YAML or JSON)
    #[arg(short, long, env = "APISUITE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Console, env = "APISUITE_REPORTER")]
    pub reporter: ReportFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long, env = "APISUITE_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Only run tests whose id or tags match (comma separated)
    #[arg(long, env = "APISUITE_TAGS")]
    pub tags: Option<String>,

    /// Custom action definition files or directories
    #[arg(short, long = "actions", num_args = 1.., env = "APISUITE_ACTIONS", value_delimiter = ',')]
    pub actions: Vec<PathBuf>,

    /// Number of tests run concurrently (overrides settings.concurrency)
    #[arg(long, env = "APISUITE_CONCURRENCY", value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "APISUITE_LOG_LEVEL")]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "APISUITE_LOG_FORMAT")]
    pub log_format: Option<String>,
}

impl Cli {
    /// Requested tags, empty when no filter applies.
    #[must_use]
    pub fn tag_filter(&self) -> Vec<String> {
        self.tags.as_deref().map(parse_tags).unwrap_or_default()
    }

    /// Test documents followed by extra documents.
    #[must_use]
    pub fn document_patterns(&self) -> Vec<String> {
        self.tests.iter().chain(&self.extra).cloned().collect()
    }
}
