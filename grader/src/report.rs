//! # Evaluation Report Module
//!
//! Defines the structured report produced for one graded submission and the
//! defensive coercion that builds it from an untyped parsed value. The report
//! is always fully populated: every field read from the backend's JSON is
//! type-checked and replaced by its documented default when missing or
//! malformed, so callers never see a partially-typed report.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Neutral score used when no structured verdict could be recovered.
pub const NEUTRAL_OVERALL_SCORE: f64 = 50.0;

/// Upper bound on practice questions kept from the backend. A cap, not a
/// floor: fewer questions are surfaced as-is.
pub const MAX_PRACTICE_QUESTIONS: usize = 10;

/// A follow-up exercise suggested by the grader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeQuestion {
    pub title: String,
    pub description: String,
    pub difficulty: String,
    #[serde(default)]
    pub code_template: String,
    #[serde(default)]
    pub test_cases: Vec<PracticeTestCase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeTestCase {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub expected_output: String,
}

/// The structured verdict for one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationReport {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub suggestions: Vec<String>,
    /// Per-topic scores in [0, 100], keyed by topic name as the backend gave it.
    pub topic_scores: BTreeMap<String, f64>,
    /// Composite quality score in [0, 100].
    pub overall_score: f64,
    pub detailed_analysis: String,
    pub practice_questions: Vec<PracticeQuestion>,
}

fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

fn string_array(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

impl EvaluationReport {
    /// The documented default used when extraction fails: empty lists, a
    /// neutral score, and the raw text preserved for human review.
    pub fn fallback(raw_text: impl Into<String>) -> Self {
        Self {
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            suggestions: Vec::new(),
            topic_scores: BTreeMap::new(),
            overall_score: NEUTRAL_OVERALL_SCORE,
            detailed_analysis: raw_text.into(),
            practice_questions: Vec::new(),
        }
    }

    /// Coerces a parsed value into a fully-populated report. Missing or
    /// mistyped fields become their defaults; scores are clamped to [0, 100];
    /// the practice question list is capped at [`MAX_PRACTICE_QUESTIONS`].
    pub fn from_value(value: &Value, raw_text: &str) -> Self {
        let topic_scores = value
            .get("topicScores")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(topic, score)| {
                        score.as_f64().map(|s| (topic.clone(), clamp_score(s)))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let overall_score = value
            .get("overallScore")
            .and_then(Value::as_f64)
            .map(clamp_score)
            .unwrap_or(NEUTRAL_OVERALL_SCORE);

        let detailed_analysis = {
            let s = string_field(value, "detailedAnalysis");
            if s.is_empty() { raw_text.to_string() } else { s }
        };

        let mut practice_questions: Vec<PracticeQuestion> = value
            .get("practiceQuestions")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        serde_json::from_value::<PracticeQuestion>(item.clone()).ok()
                    })
                    .collect()
            })
            .unwrap_or_default();
        practice_questions.truncate(MAX_PRACTICE_QUESTIONS);

        Self {
            strengths: string_array(value, "strengths"),
            weaknesses: string_array(value, "weaknesses"),
            suggestions: string_array(value, "suggestions"),
            topic_scores,
            overall_score,
            detailed_analysis,
            practice_questions,
        }
    }
}
