use db::models::SubmissionStatus;
use db::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Lifecycle guard violation: the requested status does not follow the
    /// current one, or the current one is terminal.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: SubmissionStatus,
        to: SubmissionStatus,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// A stored document no longer matches the shape this crate writes.
    #[error("stored document is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The evaluation pipeline failed; the submission carries this reason.
    #[error("evaluation failed: {0}")]
    Evaluation(String),
}
