//! Context injection evaluation harness
//!
//! Measures what injected context does to an LLM's answer. Every test case
//! carries the same task phrased twice, once bare and once with context
//! prepended. The harness sends both prompts, optionally has a second model
//! grade each response against the case's rubric, and reports the deltas.
//!
//! # Features
//!
//! - Test cases as plain JSON files, one per identifier
//! - Timing and token accounting for every completion
//! - Rubric grading with PASS/PARTIAL/FAIL verdicts and a 0-10 score
//! - Per-test comparison reports and a cross-test summary
//! - JSON result files for later analysis
//!
//! # Example
//!
//! ```no_run
//! use context_eval::{
//!     cases::{resolve_selection, Selection},
//!     config::Config,
//!     providers::create_provider,
//!     runner::{ConsoleProgress, Executor},
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_or_default();
//!     let cases = resolve_selection(&config.runner.test_cases_dir, &Selection::All)?;
//!     let api_key = config.read_credential()?;
//!     let settings = config.into_settings(api_key, true);
//!
//!     let executor = Executor::new(create_provider(&settings), settings);
//!     let outcome = executor.run(&cases, &ConsoleProgress).await;
//!     println!("{} passed, {} failed", outcome.results.len(), outcome.failures.len());
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod cases;
pub mod config;
pub mod providers;
pub mod reporting;
pub mod runner;

pub use config::{Config, RunSettings};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::analysis::{
        compare, compare_result, ComparisonMetrics, EvaluationResult, Evaluator, Verdict,
    };
    pub use crate::cases::{CompletionResult, Condition, Selection, TestCase, TestResult};
    pub use crate::config::{Config, RunSettings};
    pub use crate::providers::{
        create_provider, CompletionRequest, CompletionResponse, LLMProvider, ProviderError,
        ProviderResult,
    };
    pub use crate::reporting::{persist, render_comparison, render_summary, summarize};
    pub use crate::runner::{ConsoleProgress, Executor, NoOpProgress, RunOutcome};
}
