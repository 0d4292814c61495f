//! The end-to-end evaluation pipeline for one submission.
//!
//! Picks up a submission, claims it by moving it to `evaluating`, runs its
//! question's test cases in the sandbox, asks the grader for a structured
//! verdict, records the evaluation, folds the per-topic scores into the
//! student's analytics, and finally marks the submission `evaluated`. Any
//! step that fails moves the submission to `error` with the reason attached;
//! the submitted code is never touched, so a failed submission can always be
//! re-queued as a fresh one.

use crate::error::ServiceError;
use crate::score_service::{updates_from_topic_scores, ScoreService};
use crate::submission_service::SubmissionService;
use chrono::{DateTime, Utc};
use code_runner::Sandbox;
use db::models::{Contest, Question, Submission, SubmissionStatus, TopicStrength};
use db::DocumentStore;
use grader::{EvaluationInput, EvaluationOrchestrator, EvaluationReport, TopicHistory};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const CONTESTS_COLLECTION: &str = "contests";
pub const EVALUATIONS_COLLECTION: &str = "evaluations";

/// Outcome of one sandbox run against one test case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRunRecord {
    pub input: String,
    pub expected_output: String,
    pub stdout: String,
    pub stderr: String,
    pub passed: bool,
}

/// The durable record written for one completed evaluation, keyed by the
/// submission id. A repeat evaluation of a resubmission writes a new record
/// under the new submission's id; records are never amended.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRecord {
    pub submission_id: String,
    pub student_id: String,
    pub contest_id: String,
    pub question_id: String,
    pub subject_id: String,
    pub test_runs: Vec<TestRunRecord>,
    pub passed_tests: usize,
    pub report: EvaluationReport,
    pub evaluated_at: DateTime<Utc>,
}

pub struct EvaluationService {
    store: Arc<dyn DocumentStore>,
    submissions: SubmissionService,
    scores: ScoreService,
    orchestrator: EvaluationOrchestrator,
    sandbox: Box<dyn Sandbox>,
}

impl EvaluationService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        orchestrator: EvaluationOrchestrator,
        sandbox: Box<dyn Sandbox>,
    ) -> Self {
        Self {
            submissions: SubmissionService::new(store.clone()),
            scores: ScoreService::new(store.clone()),
            store,
            orchestrator,
            sandbox,
        }
    }

    /// Evaluates one submission end to end.
    ///
    /// On success the submission ends `evaluated` with its record written; on
    /// any failure it ends `error` carrying the reason, and the error is also
    /// returned to the caller.
    pub async fn evaluate_submission(
        &self,
        submission_id: &str,
    ) -> Result<EvaluationRecord, ServiceError> {
        let submission = self.submissions.get(submission_id).await?;
        self.submissions
            .advance_status(submission_id, SubmissionStatus::Evaluating, None)
            .await?;

        match self.run_pipeline(&submission).await {
            Ok(record) => {
                self.submissions
                    .advance_status(submission_id, SubmissionStatus::Evaluated, None)
                    .await?;
                info!(
                    "submission {} evaluated: {}/{} tests passed, overall {:.0}",
                    submission_id,
                    record.passed_tests,
                    record.test_runs.len(),
                    record.report.overall_score
                );
                Ok(record)
            }
            Err(reason) => {
                error!("submission {submission_id} evaluation failed: {reason}");
                self.submissions
                    .advance_status(submission_id, SubmissionStatus::Error, Some(reason.clone()))
                    .await?;
                Err(ServiceError::Evaluation(reason))
            }
        }
    }

    /// Evaluates submissions one at a time, in order. One failed submission
    /// does not stop the rest; each outcome is reported alongside its id.
    pub async fn evaluate_batch(
        &self,
        submission_ids: &[String],
    ) -> Vec<(String, Result<EvaluationRecord, ServiceError>)> {
        let mut outcomes = Vec::with_capacity(submission_ids.len());
        for id in submission_ids {
            let outcome = self.evaluate_submission(id).await;
            outcomes.push((id.clone(), outcome));
        }
        outcomes
    }

    // Everything that can fail mid-evaluation; errors come back as the
    // human-readable reason stored on the submission.
    async fn run_pipeline(&self, submission: &Submission) -> Result<EvaluationRecord, String> {
        let (contest, question) = self.load_question(submission).await?;

        let mut test_runs = Vec::with_capacity(question.test_cases.len());
        for case in &question.test_cases {
            let output = self
                .sandbox
                .run(&submission.code, &case.input)
                .await
                .map_err(|e| format!("sandbox run failed: {e}"))?;
            test_runs.push(TestRunRecord {
                input: case.input.clone(),
                expected_output: case.expected_output.clone(),
                passed: output.passes(&case.expected_output),
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        let passed_tests = test_runs.iter().filter(|run| run.passed).count();

        let history = self
            .topic_history(&submission.student_id, &contest.subject_id)
            .await;

        let input = EvaluationInput {
            problem_statement: question.description.clone(),
            reference_solution: question.reference_solution.clone(),
            student_code: submission.code.clone(),
            test_cases: question
                .test_cases
                .iter()
                .map(|case| grader::TestCase {
                    input: case.input.clone(),
                    expected_output: case.expected_output.clone(),
                })
                .collect(),
            student_history: history,
        };

        let report = self
            .orchestrator
            .evaluate(&input)
            .await
            .map_err(|e| e.to_string())?;

        let record = EvaluationRecord {
            submission_id: submission.id.clone(),
            student_id: submission.student_id.clone(),
            contest_id: submission.contest_id.clone(),
            question_id: submission.question_id.clone(),
            subject_id: contest.subject_id.clone(),
            test_runs,
            passed_tests,
            report,
            evaluated_at: Utc::now(),
        };

        let document = serde_json::to_value(&record)
            .map_err(|e| format!("evaluation record serialization failed: {e}"))?;
        self.store
            .put(EVALUATIONS_COLLECTION, &record.submission_id, document)
            .await
            .map_err(|e| format!("evaluation record write failed: {e}"))?;

        if !record.report.topic_scores.is_empty() {
            let updates = updates_from_topic_scores(&record.report.topic_scores);
            self.scores
                .merge_topic_analytics(&record.student_id, &record.subject_id, &updates)
                .await
                .map_err(|e| format!("topic analytics merge failed: {e}"))?;
        }

        Ok(record)
    }

    async fn load_question(&self, submission: &Submission) -> Result<(Contest, Question), String> {
        let document = self
            .store
            .get(CONTESTS_COLLECTION, &submission.contest_id)
            .await
            .map_err(|e| format!("contest load failed: {e}"))?
            .ok_or_else(|| format!("contest {} not found", submission.contest_id))?;
        let contest: Contest = serde_json::from_value(document)
            .map_err(|e| format!("contest {} is malformed: {e}", submission.contest_id))?;

        let question = contest
            .question_by_id(&submission.question_id)
            .ok_or_else(|| {
                format!(
                    "question {} not found in contest {}",
                    submission.question_id, submission.contest_id
                )
            })?
            .clone();
        Ok((contest, question))
    }

    // Best effort: analytics are optional context for the prompt, so a
    // missing or unreadable document just means no history section.
    async fn topic_history(&self, student_id: &str, subject_id: &str) -> Option<TopicHistory> {
        let analytics = self
            .scores
            .get_topic_analytics(student_id, subject_id)
            .await
            .ok()?;
        if analytics.is_empty() {
            return None;
        }

        let mut history = TopicHistory::default();
        for (topic, entry) in analytics {
            match entry.strength {
                TopicStrength::Weak => history.weak_topics.push(topic),
                TopicStrength::Strong => history.strong_topics.push(topic),
                TopicStrength::Medium => {}
            }
        }
        Some(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ai::client::{CompletionProvider, CompletionRequest, CompletionResult};
    use async_trait::async_trait;
    use code_runner::{RunOutput, RunnerError};
    use db::models::TestCase;
    use db::MemoryStore;
    use std::time::Duration;

    struct CannedProvider(CompletionResult);

    #[async_trait]
    impl CompletionProvider for CannedProvider {
        async fn complete(&self, _request: &CompletionRequest) -> CompletionResult {
            self.0.clone()
        }
    }

    struct EchoSandbox;

    #[async_trait]
    impl Sandbox for EchoSandbox {
        async fn run(&self, _source: &str, stdin: &str) -> Result<RunOutput, RunnerError> {
            Ok(RunOutput {
                stdout: stdin.to_string(),
                ..Default::default()
            })
        }
    }

    struct DownSandbox;

    #[async_trait]
    impl Sandbox for DownSandbox {
        async fn run(&self, _source: &str, _stdin: &str) -> Result<RunOutput, RunnerError> {
            Err(RunnerError::Transport("connection refused".into()))
        }
    }

    fn orchestrator(result: CompletionResult) -> EvaluationOrchestrator {
        EvaluationOrchestrator::new(Box::new(CannedProvider(result)))
            .with_timeouts(Duration::from_secs(1), Duration::from_secs(1))
    }

    async fn seed(store: &Arc<MemoryStore>) {
        let contest = Contest {
            id: "c1".into(),
            subject_id: "algo".into(),
            title: "Week 1".into(),
            questions: vec![Question {
                id: "q1".into(),
                number: 1,
                title: "Echo".into(),
                description: "Echo the input.".into(),
                reference_solution: "print(input())".into(),
                code_template: String::new(),
                test_cases: vec![
                    TestCase {
                        input: "hello".into(),
                        expected_output: "hello".into(),
                    },
                    TestCase {
                        input: "world".into(),
                        expected_output: "other".into(),
                    },
                ],
                topics: vec!["strings".into()],
            }],
        };
        store
            .put(CONTESTS_COLLECTION, "c1", serde_json::to_value(&contest).unwrap())
            .await
            .unwrap();

        let submissions = SubmissionService::new(store.clone() as Arc<dyn DocumentStore>);
        submissions
            .create(&Submission::new("s1", "student-1", "q1", "c1", "print(input())"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_successful_evaluation_reaches_evaluated() {
        let store = Arc::new(MemoryStore::new());
        seed(&store).await;

        let verdict = r#"{"overallScore": 70, "strengths": ["direct"],
            "topicScores": {"Strings": 80}, "detailedAnalysis": "fine"}"#;
        let service = EvaluationService::new(
            store.clone(),
            orchestrator(CompletionResult::Success { text: verdict.into() }),
            Box::new(EchoSandbox),
        );

        let record = service.evaluate_submission("s1").await.unwrap();
        assert_eq!(record.passed_tests, 1);
        assert_eq!(record.test_runs.len(), 2);
        assert!(record.test_runs[0].passed);
        assert!(!record.test_runs[1].passed);
        assert_eq!(record.report.overall_score, 70.0);
        assert_eq!(record.subject_id, "algo");

        let submissions = SubmissionService::new(store.clone() as Arc<dyn DocumentStore>);
        let submission = submissions.get("s1").await.unwrap();
        assert_eq!(submission.status, SubmissionStatus::Evaluated);
        assert!(submission.evaluated_at.is_some());

        // Topic scores were folded into analytics under the normalized key.
        let scores = ScoreService::new(store.clone() as Arc<dyn DocumentStore>);
        let analytics = scores.get_topic_analytics("student-1", "algo").await.unwrap();
        assert_eq!(analytics["strings"].score, 80.0);
        assert_eq!(analytics["strings"].contest_count, 1);

        assert!(store.get(EVALUATIONS_COLLECTION, "s1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_completion_failure_ends_in_error_state() {
        let store = Arc::new(MemoryStore::new());
        seed(&store).await;

        let service = EvaluationService::new(
            store.clone(),
            orchestrator(CompletionResult::Failure {
                kind: ai::ErrorKind::AllModelsExhausted,
                detail: "a: 500; b: 500".into(),
            }),
            Box::new(EchoSandbox),
        );

        let err = service.evaluate_submission("s1").await.unwrap_err();
        assert!(matches!(err, ServiceError::Evaluation(_)));

        let submissions = SubmissionService::new(store.clone() as Arc<dyn DocumentStore>);
        let submission = submissions.get("s1").await.unwrap();
        assert_eq!(submission.status, SubmissionStatus::Error);
        assert!(submission.failure_reason.unwrap().contains("a: 500"));
        // The code artifact survives for manual re-evaluation.
        assert_eq!(submission.code, "print(input())");
        assert!(store.get(EVALUATIONS_COLLECTION, "s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sandbox_outage_ends_in_error_state() {
        let store = Arc::new(MemoryStore::new());
        seed(&store).await;

        let service = EvaluationService::new(
            store.clone(),
            orchestrator(CompletionResult::Success { text: "{}".into() }),
            Box::new(DownSandbox),
        );

        service.evaluate_submission("s1").await.unwrap_err();
        let submissions = SubmissionService::new(store.clone() as Arc<dyn DocumentStore>);
        let submission = submissions.get("s1").await.unwrap();
        assert_eq!(submission.status, SubmissionStatus::Error);
        assert!(submission.failure_reason.unwrap().contains("sandbox"));
    }

    #[tokio::test]
    async fn test_missing_contest_ends_in_error_state() {
        let store = Arc::new(MemoryStore::new());
        let submissions = SubmissionService::new(store.clone() as Arc<dyn DocumentStore>);
        submissions
            .create(&Submission::new("s1", "student-1", "q1", "ghost", "code"))
            .await
            .unwrap();

        let service = EvaluationService::new(
            store.clone(),
            orchestrator(CompletionResult::Success { text: "{}".into() }),
            Box::new(EchoSandbox),
        );

        service.evaluate_submission("s1").await.unwrap_err();
        let submission = submissions.get("s1").await.unwrap();
        assert_eq!(submission.status, SubmissionStatus::Error);
        assert!(submission.failure_reason.unwrap().contains("contest ghost not found"));
    }

    #[tokio::test]
    async fn test_terminal_submission_is_not_reevaluated() {
        let store = Arc::new(MemoryStore::new());
        seed(&store).await;
        let submissions = SubmissionService::new(store.clone() as Arc<dyn DocumentStore>);
        submissions
            .advance_status("s1", SubmissionStatus::Error, Some("earlier failure".into()))
            .await
            .unwrap();

        let service = EvaluationService::new(
            store.clone(),
            orchestrator(CompletionResult::Success { text: "{}".into() }),
            Box::new(EchoSandbox),
        );

        let err = service.evaluate_submission("s1").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_batch_continues_past_failures() {
        let store = Arc::new(MemoryStore::new());
        seed(&store).await;
        let submissions = SubmissionService::new(store.clone() as Arc<dyn DocumentStore>);
        submissions
            .create(&Submission::new("s2", "student-1", "missing-q", "c1", "code"))
            .await
            .unwrap();

        let service = EvaluationService::new(
            store.clone(),
            orchestrator(CompletionResult::Success {
                text: r#"{"overallScore": 55}"#.into(),
            }),
            Box::new(EchoSandbox),
        );

        let outcomes = service
            .evaluate_batch(&["s2".to_string(), "s1".to_string()])
            .await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].1.is_err());
        assert!(outcomes[1].1.is_ok());
    }
}
