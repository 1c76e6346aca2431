//! Per-test console report

use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};

use super::{fmt_number, fmt_signed};
use crate::analysis::{ComparisonMetrics, EvaluationResult, Verdict};
use crate::cases::{CompletionResult, TestResult};

const PREVIEW_CHARS: usize = 300;
const CRITERION_WIDTH: usize = 42;

/// Emphasis class for a value in the report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Positive,
    Neutral,
    Negative,
    Muted,
}

impl Tone {
    /// PASS is positive, PARTIAL neutral, everything else negative
    pub fn for_verdict(verdict: &Verdict) -> Self {
        match verdict {
            Verdict::Pass => Tone::Positive,
            Verdict::Partial => Tone::Neutral,
            Verdict::Fail | Verdict::Other(_) => Tone::Negative,
        }
    }

    pub fn for_delta(delta: f64) -> Self {
        if delta > 0.0 {
            Tone::Positive
        } else if delta < 0.0 {
            Tone::Negative
        } else {
            Tone::Muted
        }
    }

    pub fn paint(self, text: &str) -> ColoredString {
        match self {
            Tone::Positive => text.green(),
            Tone::Neutral => text.yellow(),
            Tone::Negative => text.red(),
            Tone::Muted => text.dimmed(),
        }
    }
}

fn rule(c: char, width: usize) -> String {
    std::iter::repeat(c).take(width).collect()
}

/// Run header printed before the first test
pub fn render_banner(
    model: &str,
    tests: usize,
    evaluate: bool,
    started_at: DateTime<Utc>,
) -> String {
    [
        format!("{}", "Context Injection Test Runner".bold().magenta()),
        format!("{}", format!("   Model: {}", model).dimmed()),
        format!("{}", format!("   Tests: {}", tests).dimmed()),
        format!(
            "{}",
            format!("   Evaluate: {}", if evaluate { "Yes" } else { "No" }).dimmed()
        ),
        format!("{}", format!("   Time: {}", started_at.to_rfc3339()).dimmed()),
    ]
    .join("\n")
}

/// Header printed when a test starts
pub fn render_test_header(name: &str) -> String {
    format!(
        "{}\n{}\n{}",
        rule('=', 70),
        format!("  TEST: {}", name).bold().magenta(),
        rule('=', 70)
    )
}

fn preview(lines: &mut Vec<String>, label: &str, tone: Tone, completion: &CompletionResult) {
    lines.push(String::new());
    lines.push(format!(
        "{}",
        tone.paint(&format!(
            "  ┌─ Response {} (first {} chars):",
            label, PREVIEW_CHARS
        ))
    ));

    let head: String = completion.text.chars().take(PREVIEW_CHARS).collect();
    for line in head.split('\n') {
        lines.push(format!("{}", format!("  │ {}", line).dimmed()));
    }

    let total = completion.len_chars();
    if total > PREVIEW_CHARS {
        lines.push(format!(
            "{}",
            format!("  │ ... ({} more chars)", total - PREVIEW_CHARS).dimmed()
        ));
    }
}

fn score_text(score: Option<f64>) -> String {
    match score {
        Some(s) => format!("{}/10", fmt_number(s)),
        None => "?/10".to_string(),
    }
}

/// Render the side-by-side comparison for one test
pub fn render_comparison(result: &TestResult, metrics: &ComparisonMetrics) -> String {
    let without = &result.without_context;
    let with = &result.with_context;
    let mut lines = Vec::new();

    lines.push(String::new());
    lines.push(rule('─', 70));
    lines.push(format!("  {}", "COMPARISON".bold()));
    lines.push(rule('─', 70));

    lines.push(String::new());
    lines.push(format!("  {:<25} {:<20} {:<20}", "Metric", "Without Context", "With Context"));
    lines.push(format!("  {}", rule('─', 65)));
    lines.push(format!(
        "  {:<25} {:<20} {:<20}",
        "Response time",
        format!("{}s", fmt_number(without.time_seconds)),
        format!("{}s", fmt_number(with.time_seconds))
    ));
    lines.push(format!(
        "  {:<25} {:<20} {:<20}",
        "Input tokens", without.input_tokens, with.input_tokens
    ));
    lines.push(format!(
        "  {:<25} {:<20} {:<20}",
        "Output tokens", without.output_tokens, with.output_tokens
    ));
    lines.push(format!(
        "  {:<25} {:<20} {:<20}",
        "Response length",
        without.len_chars(),
        with.len_chars()
    ));
    lines.push(format!(
        "  {:<25} {:<20} {:<20}",
        "Prompt size ratio",
        "1x",
        format!("{}x", result.prompt_size_ratio)
    ));

    if let Some(evaluation) = &result.evaluation {
        if let Some(pairs) = &metrics.criteria {
            lines.push(String::new());
            lines.push(format!("  {:<45} {:<12} {:<12}", "Criterion", "Without", "With"));
            lines.push(format!("  {}", rule('─', 65)));
            for pair in pairs {
                let criterion: String = pair.criterion.chars().take(CRITERION_WIDTH).collect();
                let w = pair.without_context.as_str();
                let c = pair.with_context.as_str();
                lines.push(format!(
                    "  {:<45} {:<12} {:<12}",
                    criterion,
                    Tone::for_verdict(&pair.without_context).paint(w),
                    Tone::for_verdict(&pair.with_context).paint(c)
                ));
            }
        }

        for (label, eval) in [
            ("WITHOUT context", &evaluation.without_context),
            ("WITH context", &evaluation.with_context),
        ] {
            if let EvaluationResult::Unparsed { error, .. } = eval {
                lines.push(format!(
                    "{}",
                    format!("  Evaluation {}: {}", label, error).red()
                ));
            }
        }

        lines.push(String::new());
        lines.push(format!(
            "  {:<45} {:<12} {:<12}",
            "OVERALL SCORE",
            score_text(metrics.score_without),
            score_text(metrics.score_with)
        ));

        if let Some(delta) = metrics.score_delta {
            lines.push(String::new());
            lines.push(format!(
                "{}",
                Tone::for_delta(delta).paint(&format!(
                    "  Context injection improvement: {} points",
                    fmt_signed(delta)
                ))
            ));
        }
    }

    preview(&mut lines, "WITHOUT context", Tone::Neutral, without);
    preview(&mut lines, "WITH context", Tone::Positive, with);

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{compare_result, parse_evaluation};
    use crate::cases::{EvaluationPair, TestCase};

    fn completion(text: &str, secs: f64) -> CompletionResult {
        CompletionResult {
            text: text.to_string(),
            time_seconds: secs,
            input_tokens: 11,
            output_tokens: 22,
            model: "m".to_string(),
        }
    }

    fn result_with(without: &str, with: &str) -> TestResult {
        let case = TestCase::new("t1", "task", "X", "XY context");
        TestResult::new(&case, "m", completion(without, 1.5), completion(with, 2.25))
    }

    #[test]
    fn test_tones() {
        assert_eq!(Tone::for_verdict(&Verdict::Pass), Tone::Positive);
        assert_eq!(Tone::for_verdict(&Verdict::Partial), Tone::Neutral);
        assert_eq!(Tone::for_verdict(&Verdict::Fail), Tone::Negative);
        assert_eq!(Tone::for_verdict(&Verdict::Other("N/A".into())), Tone::Negative);
        assert_eq!(Tone::for_delta(1.0), Tone::Positive);
        assert_eq!(Tone::for_delta(-1.0), Tone::Negative);
        assert_eq!(Tone::for_delta(0.0), Tone::Muted);
    }

    #[test]
    fn test_metrics_table() {
        let result = result_with("a", "bb");
        let text = render_comparison(&result, &compare_result(&result));

        assert!(text.contains("Response time"));
        assert!(text.contains("1.5s"));
        assert!(text.contains("2.25s"));
        assert!(text.contains("10x"));
        assert!(!text.contains("OVERALL SCORE"));
    }

    #[test]
    fn test_preview_truncates_with_suffix() {
        let long = "y".repeat(350);
        let result = result_with("short", &long);
        let text = render_comparison(&result, &compare_result(&result));

        assert!(text.contains("... (50 more chars)"));
        assert!(!text.contains(&"y".repeat(301)));
        assert!(text.contains(&"y".repeat(300)));
    }

    #[test]
    fn test_criteria_and_score_lines() {
        let ew = parse_evaluation(
            r#"{"criteria_results":[{"criterion":"Names the root cause","result":"FAIL","explanation":""}],"overall_score":4,"summary":""}"#,
        );
        let ec = parse_evaluation(
            r#"{"criteria_results":[{"criterion":"Names the root cause","result":"PASS","explanation":""}],"overall_score":8,"summary":""}"#,
        );
        let result = result_with("a", "b").with_evaluation(EvaluationPair {
            without_context: ew,
            with_context: ec,
        });
        let text = render_comparison(&result, &compare_result(&result));

        assert!(text.contains("Names the root cause"));
        assert!(text.contains("FAIL"));
        assert!(text.contains("PASS"));
        assert!(text.contains("4/10"));
        assert!(text.contains("8/10"));
        assert!(text.contains("Context injection improvement: +4 points"));
    }

    #[test]
    fn test_unparsed_evaluation_is_reported() {
        let result = result_with("a", "b").with_evaluation(EvaluationPair {
            without_context: parse_evaluation("not json at all"),
            with_context: parse_evaluation(r#"{"overall_score": 6}"#),
        });
        let text = render_comparison(&result, &compare_result(&result));

        assert!(text.contains("Failed to parse evaluation"));
        assert!(text.contains("?/10"));
        assert!(text.contains("6/10"));
        assert!(!text.contains("improvement"));
    }
}
