//! apisuite - declarative HTTP API test runner
//!
//! Exit code is the number of failed tests (clamped to 255); configuration
//! errors exit with 1.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use apisuite::{
    Result,
    action::{ActionRegistry, load_custom_actions},
    cli::Cli,
    combine::{combine, merge_maps},
    config::Config,
    filter::filter_by_tags,
    loader::load_documents,
    report::{RunOutcome, render_report},
    runner::TestRunner,
    setup_tracing,
    transport::ReqwestTransport,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup tracing
    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let outcome = match run(&cli).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "Run aborted");
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    let report = match render_report(&outcome, cli.reporter) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("❌ Failed to render report: {e}");
            return ExitCode::FAILURE;
        }
    };

    match &cli.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, &report) {
                eprintln!("❌ Failed to write report to {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
            info!(path = %path.display(), "Report written");
        }
        None => println!("{report}"),
    }

    ExitCode::from(outcome.exit_code())
}

/// Load everything, then run the selected tests.
async fn run(cli: &Cli) -> Result<RunOutcome> {
    let config = Config::load(cli.config.as_deref())?;

    let documents = load_documents(&cli.document_patterns())?;
    let suite = combine(&documents)?;
    info!(
        documents = documents.len(),
        tests = suite.tests.len(),
        "Suite combined"
    );

    // Config keys are the lowest layer; suite variables override them
    let mut defaults = config.variables.clone();
    merge_maps(&mut defaults, &suite.variables);

    let tests = filter_by_tags(suite.tests, &cli.tag_filter())?;

    let mut registry = ActionRegistry::with_builtins();
    let custom = load_custom_actions(&mut registry, &cli.actions)?;
    info!(
        custom,
        total = registry.len(),
        "Action registry ready"
    );

    let settings = &config.settings;
    let transport = ReqwestTransport::new(
        settings.request_timeout(),
        &settings.user_agent,
        settings.insecure,
    )?;
    let concurrency = cli
        .concurrency
        .map_or(settings.concurrency, usize::from);

    let runner = TestRunner::new(Arc::new(transport), Arc::new(registry), Arc::new(defaults))
        .with_concurrency(concurrency);
    Ok(runner.run(&tests).await)
}
