//! Submission lifecycle management.
//!
//! All status changes funnel through [`SubmissionService::advance_status`],
//! which enforces the monotonic `pending -> submitted -> evaluating ->
//! {evaluated | error}` order and refuses to reopen terminal states. The
//! reconciliation sweep is the one place stuck `evaluating` submissions are
//! resolved; it moves them to `error` rather than retrying, so the system
//! never loops on a poisoned submission.

use crate::error::ServiceError;
use chrono::{Duration, Utc};
use db::models::{Submission, SubmissionStatus};
use db::DocumentStore;
use log::{info, warn};
use std::sync::Arc;
use util::config::AppConfig;

pub const SUBMISSIONS_COLLECTION: &str = "submissions";

pub struct SubmissionService {
    store: Arc<dyn DocumentStore>,
}

impl SubmissionService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Records a new submission in its initial `pending` state.
    pub async fn create(&self, submission: &Submission) -> Result<(), ServiceError> {
        let document = serde_json::to_value(submission)?;
        self.store
            .put(SUBMISSIONS_COLLECTION, &submission.id, document)
            .await?;
        info!("submission {} created for question {}", submission.id, submission.question_id);
        Ok(())
    }

    pub async fn get(&self, submission_id: &str) -> Result<Submission, ServiceError> {
        let document = self
            .store
            .get(SUBMISSIONS_COLLECTION, submission_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "submission",
                id: submission_id.to_string(),
            })?;
        Ok(serde_json::from_value(document)?)
    }

    /// Moves a submission forward in its lifecycle.
    ///
    /// The transition must strictly increase the status rank, so repeats of
    /// the current status and any backwards move are rejected, and terminal
    /// states never reopen. Skipping an intermediate state is allowed; the
    /// evaluation pipeline jumps `submitted -> evaluating` without passing
    /// through anything else. `failure_reason` is only recorded on the
    /// `error` transition and ignored otherwise.
    pub async fn advance_status(
        &self,
        submission_id: &str,
        next: SubmissionStatus,
        failure_reason: Option<String>,
    ) -> Result<Submission, ServiceError> {
        let mut submission = self.get(submission_id).await?;

        if submission.status.is_terminal() || next.rank() <= submission.status.rank() {
            return Err(ServiceError::InvalidTransition {
                from: submission.status,
                to: next,
            });
        }

        let now = Utc::now();
        submission.status = next;
        submission.status_updated_at = now;
        match next {
            SubmissionStatus::Evaluated => submission.evaluated_at = Some(now),
            SubmissionStatus::Error => submission.failure_reason = failure_reason,
            _ => {}
        }

        let document = serde_json::to_value(&submission)?;
        self.store
            .put(SUBMISSIONS_COLLECTION, &submission.id, document)
            .await?;
        Ok(submission)
    }

    /// Reconciliation sweep for submissions stuck in `evaluating`.
    ///
    /// A submission whose status has not changed for longer than the
    /// configured staleness window is assumed to belong to a crashed
    /// evaluation run and is moved to `error`. Returns the ids it resolved.
    pub async fn sweep_stale_evaluations(&self) -> Result<Vec<String>, ServiceError> {
        let window = Duration::minutes(AppConfig::global().stale_evaluation_minutes);
        let cutoff = Utc::now() - window;

        let mut resolved = Vec::new();
        for (id, document) in self.store.list(SUBMISSIONS_COLLECTION).await? {
            let submission: Submission = match serde_json::from_value(document) {
                Ok(s) => s,
                Err(e) => {
                    warn!("skipping malformed submission document {id}: {e}");
                    continue;
                }
            };
            if submission.status != SubmissionStatus::Evaluating
                || submission.status_updated_at > cutoff
            {
                continue;
            }

            warn!(
                "submission {} stuck in evaluating since {}, marking as error",
                id, submission.status_updated_at
            );
            self.advance_status(
                &id,
                SubmissionStatus::Error,
                Some("evaluation did not complete within the staleness window".to_string()),
            )
            .await?;
            resolved.push(id);
        }
        Ok(resolved)
    }
}
