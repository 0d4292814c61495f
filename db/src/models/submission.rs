use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents the status of a submission throughout its lifecycle.
///
/// Transitions are monotonic: a submission only moves forward through
/// `pending -> submitted -> evaluating -> {evaluated | error}`, and the two
/// terminal states never reopen. A repeat evaluation attempt creates a fresh
/// evaluation record instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Initial state set at creation before any status update is recorded.
    Pending,
    /// The code artifact has been accepted.
    Submitted,
    /// The evaluation pipeline owns the submission.
    Evaluating,
    /// Evaluation report and derived topic updates are durably recorded.
    Evaluated,
    /// Evaluation failed; the failure detail is kept on the submission.
    Error,
}

impl SubmissionStatus {
    /// Position in the lifecycle, used for monotonicity checks. The two
    /// terminal states share a rank: neither follows the other.
    pub fn rank(&self) -> u8 {
        match self {
            SubmissionStatus::Pending => 0,
            SubmissionStatus::Submitted => 1,
            SubmissionStatus::Evaluating => 2,
            SubmissionStatus::Evaluated | SubmissionStatus::Error => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionStatus::Evaluated | SubmissionStatus::Error)
    }
}

impl Default for SubmissionStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status_str = match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Evaluating => "evaluating",
            SubmissionStatus::Evaluated => "evaluated",
            SubmissionStatus::Error => "error",
        };
        write!(f, "{}", status_str)
    }
}

/// A student's code submission for one contest question.
///
/// Owned by the contest aggregate; created by the student or an admin
/// action, mutated only through lifecycle transitions, and deleted only by
/// bulk contest teardown. The submitted code survives every failure mode so
/// manual re-evaluation stays possible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub student_id: String,
    pub question_id: String,
    pub contest_id: String,
    pub code: String,
    pub status: SubmissionStatus,
    pub submitted_at: DateTime<Utc>,
    /// Set when the current status was recorded; drives the stale sweep.
    pub status_updated_at: DateTime<Utc>,
    pub evaluated_at: Option<DateTime<Utc>>,
    /// Human-readable reason recorded on the `error` transition.
    pub failure_reason: Option<String>,
}

impl Submission {
    pub fn new(
        id: impl Into<String>,
        student_id: impl Into<String>,
        question_id: impl Into<String>,
        contest_id: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            student_id: student_id.into(),
            question_id: question_id.into(),
            contest_id: contest_id.into(),
            code: code.into(),
            status: SubmissionStatus::Pending,
            submitted_at: now,
            status_updated_at: now,
            evaluated_at: None,
            failure_reason: None,
        }
    }
}
