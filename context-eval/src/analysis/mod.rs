//! Response grading and comparison

pub mod comparator;
pub mod evaluator;

pub use comparator::{compare, compare_result, ComparisonMetrics, CriterionPair};
pub use evaluator::{
    build_evaluation_prompt, extract_json_block, parse_evaluation, CriterionVerdict, Evaluation,
    EvaluationResult, Evaluator, Verdict,
};
