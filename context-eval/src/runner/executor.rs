//! Sequential test execution

use std::sync::Arc;

use colored::Colorize;

use super::requester::Requester;
use crate::analysis::{compare_result, ComparisonMetrics, Evaluator};
use crate::cases::{CompletionResult, Condition, EvaluationPair, TestCase, TestResult};
use crate::config::RunSettings;
use crate::providers::{LLMProvider, ProviderError, ProviderResult};
use crate::reporting::console::{render_comparison, render_test_header};
use crate::reporting::fmt_number;

/// A test case that produced no result
#[derive(Debug)]
pub struct CaseFailure {
    pub id: String,
    pub name: String,
    pub error: ProviderError,
}

/// Everything a run produced, in execution order
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub results: Vec<TestResult>,
    pub failures: Vec<CaseFailure>,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs test cases one after another against a single provider
pub struct Executor {
    settings: RunSettings,
    requester: Requester,
    evaluator: Evaluator,
}

impl Executor {
    pub fn new(provider: Arc<dyn LLMProvider + Send + Sync>, settings: RunSettings) -> Self {
        let requester = Requester::new(provider.clone(), &settings);
        let evaluator = Evaluator::new(provider, &settings);
        Self {
            settings,
            requester,
            evaluator,
        }
    }

    /// Run one case: baseline prompt, enriched prompt, then optional grading.
    ///
    /// A failed completion request ends the case with no result. Grading
    /// failures never do; they are recorded in the evaluation instead.
    pub async fn run_case(
        &self,
        case: &TestCase,
        progress: &dyn ProgressCallback,
    ) -> ProviderResult<TestResult> {
        let without = self.complete(case, Condition::WithoutContext, progress).await?;
        let with = self.complete(case, Condition::WithContext, progress).await?;

        let mut result = TestResult::new(case, self.requester.model(), without, with);

        if self.settings.evaluate && !case.evaluation_criteria.is_empty() {
            progress.on_evaluation_start(case);
            let without_context = self
                .grade(case, &result.without_context, Condition::WithoutContext)
                .await;
            let with_context = self
                .grade(case, &result.with_context, Condition::WithContext)
                .await;
            let evaluation = EvaluationPair {
                without_context,
                with_context,
            };
            progress.on_evaluation_complete(&evaluation);
            result = result.with_evaluation(evaluation);
        } else if self.settings.evaluate {
            tracing::debug!("No evaluation criteria for {}, skipping grading", case.name);
        }

        Ok(result)
    }

    async fn complete(
        &self,
        case: &TestCase,
        condition: Condition,
        progress: &dyn ProgressCallback,
    ) -> ProviderResult<CompletionResult> {
        progress.on_request_start(condition);
        let completion = self.requester.request(case.prompt(condition)).await?;
        progress.on_request_complete(condition, &completion);
        Ok(completion)
    }

    async fn grade(
        &self,
        case: &TestCase,
        completion: &CompletionResult,
        condition: Condition,
    ) -> crate::analysis::EvaluationResult {
        self.evaluator
            .evaluate(
                &completion.text,
                &case.evaluation_criteria,
                &case.name,
                condition.label(),
            )
            .await
    }

    /// Run every case in order. A failing case is recorded and the run moves on.
    pub async fn run(
        &self,
        cases: &[(String, TestCase)],
        progress: &dyn ProgressCallback,
    ) -> RunOutcome {
        let mut outcome = RunOutcome::default();

        for (id, case) in cases {
            tracing::info!("Running {} ({})", id, case.name);
            progress.on_case_start(id, case);
            match self.run_case(case, progress).await {
                Ok(result) => {
                    tracing::info!("Finished {}", id);
                    let metrics = compare_result(&result);
                    progress.on_case_complete(&result, &metrics);
                    outcome.results.push(result);
                }
                Err(error) => {
                    tracing::error!("Test {} failed: {}", id, error);
                    progress.on_case_failed(id, &error);
                    outcome.failures.push(CaseFailure {
                        id: id.clone(),
                        name: case.name.clone(),
                        error,
                    });
                }
            }
        }

        outcome
    }
}

/// Progress callback for tracking execution
pub trait ProgressCallback: Send + Sync {
    fn on_case_start(&self, id: &str, case: &TestCase);
    fn on_request_start(&self, condition: Condition);
    fn on_request_complete(&self, condition: Condition, completion: &CompletionResult);
    fn on_evaluation_start(&self, case: &TestCase);
    fn on_evaluation_complete(&self, evaluation: &EvaluationPair);
    fn on_case_complete(&self, result: &TestResult, metrics: &ComparisonMetrics);
    fn on_case_failed(&self, id: &str, error: &ProviderError);
}

/// Default no-op progress callback
pub struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_case_start(&self, _id: &str, _case: &TestCase) {}
    fn on_request_start(&self, _condition: Condition) {}
    fn on_request_complete(&self, _condition: Condition, _completion: &CompletionResult) {}
    fn on_evaluation_start(&self, _case: &TestCase) {}
    fn on_evaluation_complete(&self, _evaluation: &EvaluationPair) {}
    fn on_case_complete(&self, _result: &TestResult, _metrics: &ComparisonMetrics) {}
    fn on_case_failed(&self, _id: &str, _error: &ProviderError) {}
}

/// Console progress callback; prints the per-test report as each case finishes
pub struct ConsoleProgress;

fn score_or_unknown(score: Option<f64>) -> String {
    score.map(fmt_number).unwrap_or_else(|| "?".to_string())
}

impl ProgressCallback for ConsoleProgress {
    fn on_case_start(&self, _id: &str, case: &TestCase) {
        println!("\n{}", render_test_header(&case.name));
    }

    fn on_request_start(&self, condition: Condition) {
        let line = format!("\n▶ Running {}...", condition.label());
        match condition {
            Condition::WithoutContext => println!("{}", line.yellow()),
            Condition::WithContext => println!("{}", line.cyan()),
        }
    }

    fn on_request_complete(&self, _condition: Condition, completion: &CompletionResult) {
        println!(
            "{}",
            format!(
                "  ✓ Done ({}s, {}→{} tokens)",
                fmt_number(completion.time_seconds),
                completion.input_tokens,
                completion.output_tokens
            )
            .dimmed()
        );
    }

    fn on_evaluation_start(&self, _case: &TestCase) {
        println!("{}", "\n▶ Evaluating responses against criteria...".blue());
    }

    fn on_evaluation_complete(&self, evaluation: &EvaluationPair) {
        println!(
            "{}",
            format!(
                "  Score WITHOUT context: {}/10",
                score_or_unknown(evaluation.without_context.score())
            )
            .yellow()
        );
        println!(
            "{}",
            format!(
                "  Score WITH context:    {}/10",
                score_or_unknown(evaluation.with_context.score())
            )
            .green()
        );
    }

    fn on_case_complete(&self, result: &TestResult, metrics: &ComparisonMetrics) {
        println!("{}", render_comparison(result, metrics));
    }

    fn on_case_failed(&self, id: &str, error: &ProviderError) {
        println!("{}", format!("  ✗ {} failed: {}", id, error).red());
    }
}
