//! # Services Library
//!
//! Application services tying the domain together: the submission lifecycle
//! with its monotonic status machine and stale-evaluation sweep, the
//! end-to-end AI evaluation pipeline, and the score engine that normalizes
//! contest marks and maintains per-topic analytics. Services talk to
//! persistence only through the [`db::DocumentStore`] seam, so every test in
//! this crate runs against the in-memory store.

pub mod error;
pub mod evaluation_service;
pub mod score_service;
pub mod submission_service;

pub use error::ServiceError;
pub use evaluation_service::{EvaluationRecord, EvaluationService, TestRunRecord};
pub use score_service::{
    compose_subject_score, merge_topic_updates, normalize_contest_entries, ScoreService,
};
pub use submission_service::SubmissionService;
