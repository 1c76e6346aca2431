//! Cross-test summary

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;

use super::console::Tone;
use super::fmt_signed;
use crate::cases::TestResult;

const NAME_WIDTH: usize = 32;

/// One line of the summary table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub name: String,
    pub time_delta: f64,
    /// Output-token delta, `with - without`
    pub token_delta: i64,
    /// Only when both conditions carry a numeric score
    pub score_delta: Option<f64>,
}

/// Mean scores over tests where both conditions were scored
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreAverages {
    pub without: f64,
    pub with: f64,
    pub delta: f64,
    pub scored: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    pub tests_run: usize,
    pub model: String,
    pub generated_at: DateTime<Utc>,
    /// Whether any test carried evaluation data; controls the score column
    pub has_evaluation: bool,
    pub rows: Vec<SummaryRow>,
    pub averages: Option<ScoreAverages>,
}

fn both_scores(result: &TestResult) -> Option<(f64, f64)> {
    let evaluation = result.evaluation.as_ref()?;
    Some((
        evaluation.without_context.score()?,
        evaluation.with_context.score()?,
    ))
}

/// Summarize a batch of results
pub fn summarize(results: &[TestResult], model: &str) -> SummaryReport {
    let mut total_without = 0.0;
    let mut total_with = 0.0;
    let mut scored = 0usize;

    let rows = results
        .iter()
        .map(|r| {
            let scores = both_scores(r);
            if let Some((w, c)) = scores {
                total_without += w;
                total_with += c;
                scored += 1;
            }
            SummaryRow {
                name: r.name.chars().take(NAME_WIDTH).collect(),
                time_delta: r.with_context.time_seconds - r.without_context.time_seconds,
                token_delta: i64::from(r.with_context.output_tokens)
                    - i64::from(r.without_context.output_tokens),
                score_delta: scores.map(|(w, c)| c - w),
            }
        })
        .collect();

    let averages = (scored > 0).then(|| {
        let without = total_without / scored as f64;
        let with = total_with / scored as f64;
        ScoreAverages {
            without,
            with,
            delta: with - without,
            scored,
        }
    });

    SummaryReport {
        tests_run: results.len(),
        model: model.to_string(),
        generated_at: Utc::now(),
        has_evaluation: results.iter().any(|r| r.evaluation.is_some()),
        rows,
        averages,
    }
}

fn signed_one_decimal(value: f64) -> String {
    if value > 0.0 {
        format!("+{:.1}", value)
    } else {
        format!("{:.1}", value)
    }
}

pub fn render_summary(report: &SummaryReport) -> String {
    let rule = "─".repeat(70);
    let mut lines = vec![
        String::new(),
        "=".repeat(70),
        format!("{}", "  OVERALL SUMMARY".bold().magenta()),
        "=".repeat(70),
        String::new(),
        format!("  Tests run: {}", report.tests_run),
        format!("  Model: {}", report.model),
        format!("  Timestamp: {}", report.generated_at.to_rfc3339()),
        String::new(),
    ];

    let mut header = format!("  {:<35} {:<12} {:<12}", "Test", "Time Δ", "Tokens Δ");
    if report.has_evaluation {
        header.push_str(&format!(" {:<12}", "Score Δ"));
    }
    lines.push(header);
    lines.push(format!("  {}", rule));

    for row in &report.rows {
        let token = if row.token_delta > 0 {
            format!("+{}", row.token_delta)
        } else {
            row.token_delta.to_string()
        };
        let mut line = format!(
            "  {:<35} {:<12} {:<12}",
            row.name,
            format!("{}s", signed_one_decimal(row.time_delta)),
            token
        );
        if let (true, Some(delta)) = (report.has_evaluation, row.score_delta) {
            line.push_str(&format!(
                " {}",
                Tone::for_delta(delta).paint(&fmt_signed(delta))
            ));
        }
        lines.push(line);
    }

    if let Some(avg) = &report.averages {
        let tone = if avg.delta > 0.0 {
            Tone::Positive
        } else {
            Tone::Negative
        };
        lines.push(String::new());
        lines.push(format!("  {}", rule));
        lines.push(format!("  Average score WITHOUT context: {:.1}/10", avg.without));
        lines.push(format!("  Average score WITH context:    {:.1}/10", avg.with));
        lines.push(format!(
            "{}",
            tone.paint(&format!(
                "  Average improvement:           {} points",
                signed_one_decimal(avg.delta)
            ))
        ));
    }

    lines.join("\n")
}
