//! # Grader Library
//!
//! Drives one submission through the AI evaluation pipeline: build the
//! two-part prompt contract, request a completion from the resilient client,
//! recover the structured report from free text, and coerce every field to
//! its declared type before anything reaches a caller.
//!
//! ## Key Concepts
//! - **EvaluationOrchestrator**: owns the completion seam and the sampling
//!   parameters; produces fully-populated [`EvaluationReport`]s.
//! - **Fallback over failure**: an unparseable verdict degrades to a default
//!   report carrying the raw text; only a failed completion call itself is an
//!   error, which callers convert into the submission's error state.
//! - **Topic analysis**: a sibling call that tags a question with topic
//!   names under a strict timeout, defaulting to an empty list so it never
//!   stalls housekeeping work.

pub mod prompts;
pub mod report;

pub use report::{EvaluationReport, PracticeQuestion, PracticeTestCase};

use ai::client::{CompletionProvider, CompletionRequest, CompletionResult};
use ai::extract;
use log::warn;
use std::time::Duration;
use thiserror::Error;
use util::config::AppConfig;

/// Moderate-low sampling temperature: grading favors determinism over variety.
const EVALUATION_TEMPERATURE: f32 = 0.3;

/// Upper bound on topics kept from the analysis call.
const MAX_TOPICS: usize = 8;

/// One test case as embedded in the prompt contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
}

/// Weak/strong topic history used to personalize the evaluation.
#[derive(Debug, Clone, Default)]
pub struct TopicHistory {
    pub weak_topics: Vec<String>,
    pub strong_topics: Vec<String>,
}

/// Everything the orchestrator needs to grade one submission.
#[derive(Debug, Clone)]
pub struct EvaluationInput {
    pub problem_statement: String,
    pub reference_solution: String,
    pub student_code: String,
    pub test_cases: Vec<TestCase>,
    pub student_history: Option<TopicHistory>,
}

#[derive(Debug, Error)]
pub enum GraderError {
    /// The completion call itself failed; the detail aggregates the client's
    /// per-candidate reasons for diagnostics.
    #[error("completion failed ({kind}): {detail}")]
    Completion { kind: ai::ErrorKind, detail: String },
}

/// Sequences prompt construction, completion, extraction, and coercion.
pub struct EvaluationOrchestrator {
    provider: Box<dyn CompletionProvider>,
    max_output_tokens: u32,
    evaluation_timeout: Duration,
    topic_timeout: Duration,
}

impl EvaluationOrchestrator {
    /// Creates an orchestrator with token budget and timeouts from [`AppConfig`].
    pub fn new(provider: Box<dyn CompletionProvider>) -> Self {
        let (max_output_tokens, evaluation_timeout, topic_timeout) = {
            let cfg = AppConfig::global();
            (
                cfg.max_output_tokens,
                Duration::from_millis(cfg.model_timeout_ms),
                Duration::from_millis(cfg.topic_timeout_ms),
            )
        };
        Self {
            provider,
            max_output_tokens,
            evaluation_timeout,
            topic_timeout,
        }
    }

    /// Overrides the per-candidate deadlines (topic analysis stays strict).
    pub fn with_timeouts(mut self, evaluation: Duration, topic: Duration) -> Self {
        self.evaluation_timeout = evaluation;
        self.topic_timeout = topic;
        self
    }

    pub fn with_max_output_tokens(mut self, budget: u32) -> Self {
        self.max_output_tokens = budget;
        self
    }

    /// Grades one submission.
    ///
    /// Extraction failure never fails the call: the report falls back to the
    /// documented default with the raw text preserved in `detailedAnalysis`.
    /// Only a failed completion is an error, for the caller to convert into
    /// the submission's error state.
    pub async fn evaluate(&self, input: &EvaluationInput) -> Result<EvaluationReport, GraderError> {
        let request = CompletionRequest {
            system_instruction: prompts::evaluation_instruction(),
            user_content: prompts::evaluation_content(input),
            temperature: EVALUATION_TEMPERATURE,
            max_output_tokens: self.max_output_tokens,
            timeout: self.evaluation_timeout,
        };

        let result = self.provider.complete(&request).await;
        let text = match result.usable_text() {
            Some(text) => text.to_string(),
            None => {
                let (kind, detail) = match result {
                    CompletionResult::Failure { kind, detail } => (kind, detail),
                    other => (ai::ErrorKind::Backend, format!("unusable result: {other:?}")),
                };
                return Err(GraderError::Completion { kind, detail });
            }
        };

        Ok(match extract::extract(&text) {
            Ok(value) => EvaluationReport::from_value(&value, &text),
            Err(failure) => {
                warn!(
                    "evaluation output was not structured (error near byte {:?}), returning fallback report",
                    failure.error_position
                );
                EvaluationReport::fallback(failure.raw_text)
            }
        })
    }

    /// Tags a question with topic names for analytics housekeeping.
    ///
    /// Runs under the strict topic timeout and defaults to an empty list on
    /// any failure, since this call gates unrelated housekeeping work and
    /// must not stall user-facing flows.
    pub async fn analyze_topics(
        &self,
        title: &str,
        description: &str,
        reference_solution: &str,
        test_cases: &[TestCase],
    ) -> Vec<String> {
        let request = CompletionRequest {
            system_instruction: prompts::topic_instruction(),
            user_content: prompts::topic_content(title, description, reference_solution, test_cases),
            temperature: EVALUATION_TEMPERATURE,
            max_output_tokens: 256,
            timeout: self.topic_timeout,
        };

        let result = self.provider.complete(&request).await;
        let Some(text) = result.usable_text() else {
            warn!("topic analysis produced no usable text, skipping");
            return Vec::new();
        };

        let Ok(value) = extract::extract(text) else {
            warn!("topic analysis output was not structured, skipping");
            return Vec::new();
        };

        let mut topics: Vec<String> = value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str())
                    .map(|topic| topic.trim().to_lowercase())
                    .filter(|topic| !topic.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        topics.truncate(MAX_TOPICS);
        topics
    }
}
