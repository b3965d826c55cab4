//! apisuite library
//!
//! Declarative HTTP API test execution engine.
//!
//! # Features
//!
//! - **Suites**: JSON/YAML test documents combined into one suite
//! - **Variables**: `{{name}}` placeholders resolved per test, threaded across steps
//! - **Actions**: built-in MAC (HMAC/CMAC), hash, encode, timestamp and uuid,
//!   plus custom command actions loaded from definition files
//! - **Validations**: status, header, body and timing checks that never short-circuit
//! - **Reports**: console and JSON reports with counts derived from the result tree
//!
//! # Pipeline
//!
//! ```text
//! documents ─▶ combine ─▶ filter by tags ─▶ TestRunner ─▶ RunOutcome ─▶ report
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod action;
pub mod cli;
pub mod combine;
pub mod config;
pub mod error;
pub mod filter;
pub mod loader;
pub mod path;
pub mod report;
pub mod runner;
pub mod suite;
pub mod transport;
pub mod validation;
pub mod variables;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
///
/// Logs go to stderr so stdout stays free for the report.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            subscriber
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}
