//! Test case definitions and per-case results

pub mod loader;

pub use loader::{
    discover_test_cases, load_test_case, load_test_case_file, resolve_selection, LoadError,
    Selection,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::analysis::EvaluationResult;
use crate::providers::CompletionResponse;

/// A task posed twice: once bare, once with injected context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub task: String,
    pub without_context: String,
    pub with_context: String,
    #[serde(default)]
    pub evaluation_criteria: Vec<String>,
}

impl TestCase {
    pub fn new(
        name: impl Into<String>,
        task: impl Into<String>,
        without_context: impl Into<String>,
        with_context: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            task: task.into(),
            without_context: without_context.into(),
            with_context: with_context.into(),
            evaluation_criteria: Vec::new(),
        }
    }

    /// Add a rubric criterion
    pub fn criterion(mut self, criterion: impl Into<String>) -> Self {
        self.evaluation_criteria.push(criterion.into());
        self
    }

    pub fn prompt(&self, condition: Condition) -> &str {
        match condition {
            Condition::WithoutContext => &self.without_context,
            Condition::WithContext => &self.with_context,
        }
    }

    pub fn prompt_size_ratio(&self) -> f64 {
        prompt_size_ratio(&self.without_context, &self.with_context)
    }
}

/// The two prompting conditions under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    WithoutContext,
    WithContext,
}

impl Condition {
    /// Label used in prompts and console output
    pub fn label(&self) -> &'static str {
        match self {
            Condition::WithoutContext => "WITHOUT context",
            Condition::WithContext => "WITH context",
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Character-count ratio of the enriched prompt to the baseline, one decimal
pub fn prompt_size_ratio(without_context: &str, with_context: &str) -> f64 {
    let baseline = without_context.chars().count().max(1) as f64;
    let enriched = with_context.chars().count() as f64;
    round_to(enriched / baseline, 1)
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// One completion round trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub text: String,
    pub time_seconds: f64,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub model: String,
}

impl CompletionResult {
    /// Build from a provider response and the wall-clock time measured around it
    pub fn from_response(response: CompletionResponse, elapsed: Duration, model: &str) -> Self {
        Self {
            text: response.content,
            time_seconds: round_to(elapsed.as_secs_f64(), 2),
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
            model: model.to_string(),
        }
    }

    /// Response length in characters
    pub fn len_chars(&self) -> usize {
        self.text.chars().count()
    }
}

/// Rubric scores for both conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationPair {
    pub without_context: EvaluationResult,
    pub with_context: EvaluationResult,
}

/// Full outcome of running one test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub task: String,
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub without_context: CompletionResult,
    pub with_context: CompletionResult,
    pub evaluation_criteria: Vec<String>,
    pub prompt_size_ratio: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<EvaluationPair>,
}

impl TestResult {
    pub fn new(
        case: &TestCase,
        model: impl Into<String>,
        without_context: CompletionResult,
        with_context: CompletionResult,
    ) -> Self {
        Self {
            name: case.name.clone(),
            task: case.task.clone(),
            timestamp: Utc::now(),
            model: model.into(),
            without_context,
            with_context,
            evaluation_criteria: case.evaluation_criteria.clone(),
            prompt_size_ratio: case.prompt_size_ratio(),
            evaluation: None,
        }
    }

    pub fn with_evaluation(mut self, evaluation: EvaluationPair) -> Self {
        self.evaluation = Some(evaluation);
        self
    }
}
