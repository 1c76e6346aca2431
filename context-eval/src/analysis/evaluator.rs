//! Rubric evaluation by a second model call
//!
//! The grader is asked for strict JSON but replies with free text, so the
//! reply goes through [`parse_evaluation`]: take the first fenced block
//! (preferring one tagged `json`), parse it as an object, and fall back to
//! [`EvaluationResult::Unparsed`] instead of failing the run.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::config::RunSettings;
use crate::providers::{CompletionRequest, LLMProvider};

pub const PARSE_ERROR: &str = "Failed to parse evaluation";

/// Grade for one rubric item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Verdict {
    Pass,
    Partial,
    Fail,
    /// Anything else the grader wrote, kept verbatim
    Other(String),
}

impl Verdict {
    pub fn as_str(&self) -> &str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Partial => "PARTIAL",
            Verdict::Fail => "FAIL",
            Verdict::Other(s) => s,
        }
    }
}

impl From<String> for Verdict {
    fn from(s: String) -> Self {
        match s.trim().to_uppercase().as_str() {
            "PASS" => Verdict::Pass,
            "PARTIAL" => Verdict::Partial,
            "FAIL" => Verdict::Fail,
            _ => Verdict::Other(s),
        }
    }
}

impl From<Verdict> for String {
    fn from(v: Verdict) -> Self {
        v.as_str().to_string()
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionVerdict {
    #[serde(default, deserialize_with = "lenient_text")]
    pub criterion: String,
    #[serde(deserialize_with = "lenient_verdict")]
    pub result: Verdict,
    #[serde(default, deserialize_with = "lenient_text")]
    pub explanation: String,
}

/// A successfully parsed grading reply.
///
/// Fields of the wrong type degrade to their empty value so that one odd
/// field never costs the score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    #[serde(default, deserialize_with = "lenient_criteria")]
    pub criteria_results: Vec<CriterionVerdict>,
    /// Score as the grader gave it; absent when missing or not a number
    #[serde(
        default,
        deserialize_with = "lenient_score",
        skip_serializing_if = "Option::is_none"
    )]
    pub overall_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub summary: String,
}

/// Strings as-is, `null` as empty, other scalars in their JSON form
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn lenient_verdict<'de, D>(deserializer: D) -> Result<Verdict, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_text(deserializer).map(Verdict::from)
}

/// Keep every object entry of a list; anything that is not a list is no criteria
fn lenient_criteria<'de, D>(deserializer: D) -> Result<Vec<CriterionVerdict>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Array(items) => items,
        other => {
            tracing::debug!("Ignoring criteria_results that is not a list: {}", other);
            return Ok(Vec::new());
        }
    };

    Ok(items
        .into_iter()
        .filter(|item| item.is_object())
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

/// Accept numbers and numeric strings, treat anything else as no score
fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|score| score.is_finite()))
}

/// Outcome of grading one response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EvaluationResult {
    /// The reply could not be read as a grading object
    Unparsed { error: String, raw: String },
    Scored(Evaluation),
}

impl EvaluationResult {
    pub fn unparsed(error: impl Into<String>, raw: impl Into<String>) -> Self {
        EvaluationResult::Unparsed {
            error: error.into(),
            raw: raw.into(),
        }
    }

    /// Numeric overall score, if the grader produced one
    pub fn score(&self) -> Option<f64> {
        match self {
            EvaluationResult::Scored(e) => e.overall_score,
            EvaluationResult::Unparsed { .. } => None,
        }
    }

    pub fn criteria(&self) -> Option<&[CriterionVerdict]> {
        match self {
            EvaluationResult::Scored(e) => Some(&e.criteria_results),
            EvaluationResult::Unparsed { .. } => None,
        }
    }

    pub fn is_scored(&self) -> bool {
        matches!(self, EvaluationResult::Scored(_))
    }
}

fn json_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?si)```json(.*?)(?:```|\z)").expect("valid json fence regex"))
}

fn any_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)(?:```|\z)").expect("valid fence regex")
    })
}

/// Strip the first fenced code block, preferring one tagged `json`
pub fn extract_json_block(text: &str) -> &str {
    json_fence()
        .captures(text)
        .or_else(|| any_fence().captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text)
        .trim()
}

/// Turn a grader reply into an [`EvaluationResult`]; never fails
pub fn parse_evaluation(reply: &str) -> EvaluationResult {
    let candidate = if reply.trim().is_empty() {
        "{}"
    } else {
        extract_json_block(reply)
    };

    let parsed = serde_json::from_str::<serde_json::Value>(candidate)
        .ok()
        .filter(|value| value.is_object())
        .and_then(|value| serde_json::from_value::<Evaluation>(value).ok());

    match parsed {
        Some(evaluation) => {
            if let Some(score) = evaluation.overall_score {
                if !(0.0..=10.0).contains(&score) {
                    tracing::warn!("Evaluator returned out-of-range score {}", score);
                }
            }
            EvaluationResult::Scored(evaluation)
        }
        None => {
            tracing::debug!("Could not parse evaluation reply: {:?}", reply);
            EvaluationResult::unparsed(PARSE_ERROR, reply)
        }
    }
}

/// Build the grading prompt for one response
pub fn build_evaluation_prompt(
    response_text: &str,
    criteria: &[String],
    test_name: &str,
    mode: &str,
) -> String {
    let criteria_list = criteria
        .iter()
        .enumerate()
        .map(|(i, c)| format!("  {}. {}", i + 1, c))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are an objective evaluator. Assess how well the following AI response meets each criterion.

## Test: {test_name} ({mode})

## Response to evaluate:
{response_text}

## Criteria:
{criteria_list}

For EACH criterion, respond with:
- "PASS" if the response clearly addresses it
- "PARTIAL" if it somewhat addresses it
- "FAIL" if it doesn't address it at all
- Brief explanation (1 sentence)

Then give an overall score from 0-10.

Respond in this exact JSON format:
{{
  "criteria_results": [
    {{"criterion": "...", "result": "PASS|PARTIAL|FAIL", "explanation": "..."}},
    ...
  ],
  "overall_score": 7,
  "summary": "One sentence overall assessment"
}}"#
    )
}

/// Grades responses with the evaluator model
pub struct Evaluator {
    provider: Arc<dyn LLMProvider + Send + Sync>,
    model: String,
    max_tokens: u32,
}

impl Evaluator {
    pub fn new(provider: Arc<dyn LLMProvider + Send + Sync>, settings: &RunSettings) -> Self {
        Self {
            provider,
            model: settings.eval_model.clone(),
            max_tokens: settings.eval_max_tokens,
        }
    }

    pub async fn evaluate(
        &self,
        response_text: &str,
        criteria: &[String],
        test_name: &str,
        mode: &str,
    ) -> EvaluationResult {
        let prompt = build_evaluation_prompt(response_text, criteria, test_name, mode);
        let request = CompletionRequest::prompt(&self.model, prompt, self.max_tokens);

        match self.provider.complete(&request).await {
            Ok(response) => parse_evaluation(&response.content),
            Err(e) => {
                tracing::warn!("Evaluation request for {} ({}) failed: {}", test_name, mode, e);
                EvaluationResult::unparsed(format!("Evaluation request failed: {}", e), "")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{"criteria_results":[{"criterion":"Names the bug","result":"PASS","explanation":"It does."}],"overall_score":7,"summary":"ok"}"#;

    #[test]
    fn test_tagged_fence() {
        let reply = "```json\n{\"criteria_results\":[],\"overall_score\":7,\"summary\":\"ok\"}\n```";
        let result = parse_evaluation(reply);
        assert_eq!(result.score(), Some(7.0));
        assert!(result.criteria().unwrap().is_empty());
    }

    #[test]
    fn test_fences_and_bare_text_agree() {
        let direct = parse_evaluation(BODY);
        let tagged = parse_evaluation(&format!("Here you go:\n```json\n{}\n```\nThanks", BODY));
        let untagged = parse_evaluation(&format!("```\n{}\n```", BODY));

        assert!(direct.is_scored());
        assert_eq!(direct, tagged);
        assert_eq!(direct, untagged);
    }

    #[test]
    fn test_json_fence_preferred_over_earlier_block() {
        let reply = format!("```text\nnot it\n```\n\n```json\n{}\n```", BODY);
        assert_eq!(parse_evaluation(&reply).score(), Some(7.0));
    }

    #[test]
    fn test_unterminated_fence() {
        let reply = format!("```json\n{}", BODY);
        assert_eq!(parse_evaluation(&reply).score(), Some(7.0));
    }

    #[test]
    fn test_unparsable_keeps_raw() {
        let result = parse_evaluation("not json at all");
        assert_eq!(
            result,
            EvaluationResult::Unparsed {
                error: PARSE_ERROR.to_string(),
                raw: "not json at all".to_string()
            }
        );
        assert_eq!(result.score(), None);
    }

    #[test]
    fn test_non_object_is_unparsed() {
        assert!(!parse_evaluation("[1, 2, 3]").is_scored());
        assert!(!parse_evaluation("7").is_scored());
    }

    #[test]
    fn test_empty_reply_is_empty_evaluation() {
        let result = parse_evaluation("");
        assert!(result.is_scored());
        assert_eq!(result.score(), None);
    }

    #[test]
    fn test_score_passes_through_unclamped() {
        let result = parse_evaluation(r#"{"overall_score": 12.5}"#);
        assert_eq!(result.score(), Some(12.5));
    }

    #[test]
    fn test_non_numeric_score_is_absent() {
        assert_eq!(parse_evaluation(r#"{"overall_score": "?"}"#).score(), None);
        assert_eq!(parse_evaluation(r#"{"overall_score": "8"}"#).score(), Some(8.0));
    }

    #[test]
    fn test_null_summary_keeps_score() {
        let result =
            parse_evaluation(r#"{"criteria_results":[],"overall_score":7,"summary":null}"#);
        assert_eq!(result.score(), Some(7.0));
        assert!(result.criteria().unwrap().is_empty());
    }

    #[test]
    fn test_null_explanation_keeps_criteria() {
        let reply = r#"{"criteria_results":[
            {"criterion":"Names the bug","result":"PASS","explanation":null},
            {"criterion":null,"result":null}
        ],"overall_score":6,"summary":"ok"}"#;
        let result = parse_evaluation(reply);

        assert_eq!(result.score(), Some(6.0));
        let criteria = result.criteria().unwrap();
        assert_eq!(criteria.len(), 2);
        assert_eq!(criteria[0].explanation, "");
        assert_eq!(criteria[0].result, Verdict::Pass);
        assert_eq!(criteria[1].criterion, "");
        assert_eq!(criteria[1].result, Verdict::Other(String::new()));
    }

    #[test]
    fn test_criteria_of_wrong_type_keeps_score() {
        let reply = r#"{"criteria_results":"all good","overall_score":8,"summary":3}"#;
        let result = parse_evaluation(reply);

        assert!(result.is_scored());
        assert_eq!(result.score(), Some(8.0));
        assert!(result.criteria().unwrap().is_empty());
        match result {
            EvaluationResult::Scored(e) => assert_eq!(e.summary, "3"),
            other => panic!("expected a scored evaluation, got {other:?}"),
        }
    }

    #[test]
    fn test_verdicts() {
        let reply = r#"{"criteria_results":[
            {"criterion":"a","result":"PASS","explanation":""},
            {"criterion":"b","result":"partial","explanation":""},
            {"criterion":"c","result":"FAIL","explanation":""},
            {"criterion":"d","result":"N/A","explanation":""}
        ]}"#;
        let result = parse_evaluation(reply);
        let verdicts: Vec<&Verdict> =
            result.criteria().unwrap().iter().map(|c| &c.result).collect();
        assert_eq!(
            verdicts,
            vec![
                &Verdict::Pass,
                &Verdict::Partial,
                &Verdict::Fail,
                &Verdict::Other("N/A".to_string()),
            ]
        );
    }

    #[test]
    fn test_serialized_shapes() {
        let scored = parse_evaluation(BODY);
        let json = serde_json::to_value(&scored).unwrap();
        assert_eq!(json["overall_score"], 7.0);
        assert_eq!(json["criteria_results"][0]["result"], "PASS");

        let unparsed = EvaluationResult::unparsed(PARSE_ERROR, "raw text");
        let json = serde_json::to_value(&unparsed).unwrap();
        assert_eq!(json, serde_json::json!({"error": PARSE_ERROR, "raw": "raw text"}));

        let back: EvaluationResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, unparsed);
    }

    #[test]
    fn test_prompt_lists_criteria() {
        let criteria = vec!["Names the bug".to_string(), "Proposes a fix".to_string()];
        let prompt = build_evaluation_prompt("the answer", &criteria, "t1", "WITH context");

        assert!(prompt.contains("## Test: t1 (WITH context)"));
        assert!(prompt.contains("  1. Names the bug\n  2. Proposes a fix"));
        assert!(prompt.contains("the answer"));
        assert!(prompt.contains("\"overall_score\": 7"));
    }
}
