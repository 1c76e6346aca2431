//! Baseline vs. enriched comparison

use serde::{Deserialize, Serialize};

use super::evaluator::{EvaluationResult, Verdict};
use crate::cases::{CompletionResult, TestResult};

/// Verdicts for the same rubric position under both conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionPair {
    /// Criterion text as the grader echoed it for the baseline response
    pub criterion: String,
    pub without_context: Verdict,
    pub with_context: Verdict,
}

/// Deltas are always `with - without`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonMetrics {
    pub time_delta: f64,
    pub input_token_delta: i64,
    pub output_token_delta: i64,
    pub length_delta: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_without: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_with: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_delta: Option<f64>,
    /// Present only when both graders returned criteria lists of equal length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<Vec<CriterionPair>>,
}

/// Compare two completions and, if given, their evaluations. Never fails:
/// whatever is missing is left out of the metrics.
pub fn compare(
    without: &CompletionResult,
    with: &CompletionResult,
    eval_without: Option<&EvaluationResult>,
    eval_with: Option<&EvaluationResult>,
) -> ComparisonMetrics {
    let score_without = eval_without.and_then(EvaluationResult::score);
    let score_with = eval_with.and_then(EvaluationResult::score);
    let score_delta = match (score_without, score_with) {
        (Some(w), Some(c)) => Some(c - w),
        _ => None,
    };

    let criteria = match (
        eval_without.and_then(EvaluationResult::criteria),
        eval_with.and_then(EvaluationResult::criteria),
    ) {
        (Some(w), Some(c)) if w.len() == c.len() => Some(
            w.iter()
                .zip(c)
                .map(|(w, c)| CriterionPair {
                    criterion: w.criterion.clone(),
                    without_context: w.result.clone(),
                    with_context: c.result.clone(),
                })
                .collect(),
        ),
        (Some(w), Some(c)) => {
            tracing::debug!(
                "Skipping per-criterion pairing: {} vs {} criteria",
                w.len(),
                c.len()
            );
            None
        }
        _ => None,
    };

    ComparisonMetrics {
        time_delta: with.time_seconds - without.time_seconds,
        input_token_delta: i64::from(with.input_tokens) - i64::from(without.input_tokens),
        output_token_delta: i64::from(with.output_tokens) - i64::from(without.output_tokens),
        length_delta: with.len_chars() as i64 - without.len_chars() as i64,
        score_without,
        score_with,
        score_delta,
        criteria,
    }
}

/// Compare the two conditions recorded in a test result
pub fn compare_result(result: &TestResult) -> ComparisonMetrics {
    let evaluation = result.evaluation.as_ref();
    compare(
        &result.without_context,
        &result.with_context,
        evaluation.map(|e| &e.without_context),
        evaluation.map(|e| &e.with_context),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::evaluator::parse_evaluation;

    fn completion(text: &str, secs: f64, input: u32, output: u32) -> CompletionResult {
        CompletionResult {
            text: text.to_string(),
            time_seconds: secs,
            input_tokens: input,
            output_tokens: output,
            model: "m".to_string(),
        }
    }

    fn graded(score: &str, verdicts: &[&str]) -> EvaluationResult {
        let criteria: Vec<serde_json::Value> = verdicts
            .iter()
            .enumerate()
            .map(|(i, v)| {
                serde_json::json!({
                    "criterion": format!("c{}", i),
                    "result": v,
                    "explanation": "",
                })
            })
            .collect();
        parse_evaluation(&format!(
            r#"{{"criteria_results": {}, "overall_score": {}, "summary": ""}}"#,
            serde_json::Value::Array(criteria),
            score
        ))
    }

    #[test]
    fn test_basic_deltas() {
        let a = completion("short", 1.25, 10, 100);
        let b = completion("much longer text", 2.5, 400, 160);
        let m = compare(&a, &b, None, None);

        assert_eq!(m.time_delta, 1.25);
        assert_eq!(m.input_token_delta, 390);
        assert_eq!(m.output_token_delta, 60);
        assert_eq!(m.length_delta, 11);
        assert_eq!(m.score_delta, None);
        assert_eq!(m.criteria, None);
    }

    #[test]
    fn test_swapping_negates_deltas() {
        let a = completion("ab", 0.1, 3, 7);
        let b = completion("abcdef", 0.7, 9, 2);
        let ea = graded("4", &["FAIL"]);
        let eb = graded("8.5", &["PASS"]);

        let ab = compare(&a, &b, Some(&ea), Some(&eb));
        let ba = compare(&b, &a, Some(&eb), Some(&ea));

        assert_eq!(ab.time_delta, -ba.time_delta);
        assert_eq!(ab.input_token_delta, -ba.input_token_delta);
        assert_eq!(ab.output_token_delta, -ba.output_token_delta);
        assert_eq!(ab.length_delta, -ba.length_delta);
        assert_eq!(ab.score_delta, ba.score_delta.map(|d| -d));
        assert_eq!(ab.score_delta, Some(4.5));
    }

    #[test]
    fn test_pairs_criteria_by_position() {
        let a = completion("", 0.0, 0, 0);
        let ew = graded("3", &["FAIL", "PARTIAL"]);
        let ec = graded("9", &["PASS", "PASS"]);
        let m = compare(&a, &a, Some(&ew), Some(&ec));

        let pairs = m.criteria.unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].criterion, "c0");
        assert_eq!(pairs[0].without_context, Verdict::Fail);
        assert_eq!(pairs[0].with_context, Verdict::Pass);
        assert_eq!(pairs[1].without_context, Verdict::Partial);
    }

    #[test]
    fn test_mismatched_lengths_still_compare_scores() {
        let a = completion("", 0.0, 0, 0);
        let ew = graded("5", &["FAIL"]);
        let ec = graded("7", &["PASS", "PASS"]);
        let m = compare(&a, &a, Some(&ew), Some(&ec));

        assert_eq!(m.criteria, None);
        assert_eq!(m.score_delta, Some(2.0));
    }

    #[test]
    fn test_unparsed_evaluation_omits_score() {
        let a = completion("", 0.0, 0, 0);
        let ew = parse_evaluation("not json at all");
        let ec = graded("7", &[]);
        let m = compare(&a, &a, Some(&ew), Some(&ec));

        assert_eq!(m.score_without, None);
        assert_eq!(m.score_with, Some(7.0));
        assert_eq!(m.score_delta, None);
        assert_eq!(m.criteria, None);
    }
}
