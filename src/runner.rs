//! Test runner.
//!
//! ```text
//! Test:  Pending ──skip──▶ Skipped
//!           │
//!           ▼
//!        Running ── steps in order ──▶ Passed | Failed
//!
//! Step:  before-actions ─▶ resolve request ─▶ send ─▶ capture
//!                                                      │
//!        record StepResult ◀─ validations ◀─ after-actions
//! ```
//!
//! Runtime failures (transport errors, failing or unknown actions,
//! unresolved placeholders) become failing [`ValidationResult`]s on the
//! step that hit them; the remaining steps and tests still run.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::Error;
use crate::action::{ActionContext, ActionRegistry};
use crate::report::{RunOutcome, StepResult, TestResult};
use crate::suite::{ActionInvocation, ActionPhase, Step, TestCase};
use crate::transport::{HttpResponse, HttpTransport};
use crate::validation::{ResultKind, ValidationResult, validate};
use crate::variables::{Defaults, VariableStore};

/// Executes tests against an [`HttpTransport`].
pub struct TestRunner {
    transport: Arc<dyn HttpTransport>,
    actions: Arc<ActionRegistry>,
    defaults: Defaults,
    concurrency: usize,
}

impl TestRunner {
    /// Create a sequential runner.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        actions: Arc<ActionRegistry>,
        defaults: Defaults,
    ) -> Self {
        Self {
            transport,
            actions,
            defaults,
            concurrency: 1,
        }
    }

    /// Run up to `concurrency` independent tests at once.
    ///
    /// Steps within a test are always sequential and results keep suite order.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Run every test and collect the outcome.
    pub async fn run(&self, tests: &[TestCase]) -> RunOutcome {
        let time_started = Utc::now();
        info!(tests = tests.len(), concurrency = self.concurrency, "Run started");

        let test_results: Vec<TestResult> = if self.concurrency == 1 {
            let mut results = Vec::with_capacity(tests.len());
            for test in tests {
                results.push(self.run_test(test).await);
            }
            results
        } else {
            stream::iter(tests)
                .map(|test| self.run_test(test))
                .buffered(self.concurrency)
                .collect()
                .await
        };

        let outcome = RunOutcome {
            time_started,
            time_ended: Utc::now(),
            test_results,
        };
        let summary = outcome.summary();
        info!(
            executed = summary.tests_executed,
            failed = summary.tests_failed,
            skipped = summary.tests_skipped,
            "Run finished"
        );
        outcome
    }

    /// Run a single test with its own variable store.
    pub async fn run_test(&self, test: &TestCase) -> TestResult {
        if test.skip {
            info!(test = %test.id, "Test skipped");
            return TestResult::skipped(test.id.clone());
        }

        info!(test = %test.id, steps = test.steps.len(), "Test running");
        let start = Instant::now();
        let mut variables =
            VariableStore::new(Arc::clone(&self.defaults)).with_test_variables(&test.variables);

        let mut steps = Vec::with_capacity(test.steps.len());
        for (index, step) in test.steps.iter().enumerate() {
            steps.push(self.run_step(&test.id, index, step, &mut variables).await);
        }

        let result = TestResult {
            id: test.id.clone(),
            skipped: false,
            steps,
            duration_ms: elapsed_ms(start),
        };
        if result.passed() {
            info!(test = %test.id, duration_ms = result.duration_ms, "Test passed");
        } else {
            warn!(
                test = %test.id,
                failed_validations = result.failed_validations(),
                "Test failed"
            );
        }
        result
    }

    async fn run_step(
        &self,
        test_id: &str,
        index: usize,
        step: &Step,
        variables: &mut VariableStore,
    ) -> StepResult {
        let start = Instant::now();
        let name = step.label(index);
        let mut results = Vec::new();

        for invocation in step.actions_for(ActionPhase::Before) {
            let context = ActionContext {
                test_id: test_id.to_string(),
                step: index,
                variables: variables.snapshot(),
                request: Some(step.request.resolve(variables).value),
                response: None,
            };
            self.invoke_action(invocation, &context, variables, &mut results)
                .await;
        }

        let resolved = step.request.resolve(variables);
        results.extend(resolved.unresolved.iter().map(|var| {
            ValidationResult::failure(
                ResultKind::UnresolvedVariable,
                "request",
                Error::UnresolvedVariable(var.clone()).to_string(),
            )
        }));
        let request = resolved.value;

        debug!(test = %test_id, step = %name, method = %request.method, url = %request.url, "Sending request");
        let status = match self.transport.send(&request).await {
            Ok(response) => {
                capture(step, &response, variables);

                for invocation in step.actions_for(ActionPhase::After) {
                    let context = ActionContext {
                        test_id: test_id.to_string(),
                        step: index,
                        variables: variables.snapshot(),
                        request: Some(request.clone()),
                        response: Some(response.clone()),
                    };
                    self.invoke_action(invocation, &context, variables, &mut results)
                        .await;
                }

                results.extend(validate(&step.validations, &response, variables));
                Some(response.status)
            }
            Err(e) => {
                warn!(test = %test_id, step = %name, error = %e, "Request failed");
                results.push(ValidationResult::failure(
                    ResultKind::Transport,
                    format!("{} {}", request.method, request.url),
                    e.to_string(),
                ));
                None
            }
        };

        StepResult {
            name,
            request: Some(request),
            status,
            validations: results,
            duration_ms: elapsed_ms(start),
        }
    }

    async fn invoke_action(
        &self,
        invocation: &ActionInvocation,
        context: &ActionContext,
        variables: &mut VariableStore,
        results: &mut Vec<ValidationResult>,
    ) {
        let description = format!("action {}", invocation.action);
        let config = variables.resolve(&invocation.config);
        if !config.is_complete() {
            warn!(action = %invocation.action, unresolved = ?config.unresolved, "Action not invoked");
            results.extend(config.unresolved.iter().map(|var| {
                ValidationResult::failure(
                    ResultKind::UnresolvedVariable,
                    description.clone(),
                    Error::UnresolvedVariable(var.clone()).to_string(),
                )
            }));
            return;
        }

        match self
            .actions
            .invoke(&invocation.action, &config.value, context)
            .await
        {
            Ok(value) => {
                debug!(action = %invocation.action, output = %invocation.output_name(), "Action bound output");
                variables.bind(invocation.output_name(), value);
            }
            Err(e) => {
                warn!(action = %invocation.action, error = %e, "Action failed");
                results.push(ValidationResult::failure(
                    ResultKind::Action,
                    description,
                    e.to_string(),
                ));
            }
        }
    }
}

/// Bind declared captures from the response.
fn capture(step: &Step, response: &HttpResponse, variables: &mut VariableStore) {
    for (name, facet) in &step.capture {
        match response.facet(facet) {
            Some(value) => variables.bind(name.clone(), value),
            None => debug!(variable = %name, facet = %facet, "Capture facet absent"),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
