//! Error taxonomy for the AI client.
//!
//! Each [`ErrorKind`] maps to a documented retry policy: per-candidate kinds
//! (`Timeout`, `ModelUnavailable`) are retried on the next ranked model,
//! while fatal kinds (`Configuration`, `TokenLimit`, `SafetyRejection`) end
//! the call immediately.

use thiserror::Error;

/// Classifies a completion failure and decides whether the next candidate is tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing/invalid credentials or prompt input. Fatal, no network attempt.
    Configuration,
    /// Per-candidate deadline expired. Retried on the next candidate.
    Timeout,
    /// The backend does not serve this model. Retried on the next candidate.
    ModelUnavailable,
    /// Output budget exhausted with nothing salvageable. Fatal for the call;
    /// the limit is a caller-configuration problem, not a model problem.
    TokenLimit,
    /// The backend refused the prompt. Fatal, surfaced without fallback.
    SafetyRejection,
    /// Every ranked candidate failed; detail aggregates per-candidate reasons.
    AllModelsExhausted,
    /// Unclassified transport or server failure.
    Backend,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ModelUnavailable => "model_unavailable",
            ErrorKind::TokenLimit => "token_limit",
            ErrorKind::SafetyRejection => "safety_rejection",
            ErrorKind::AllModelsExhausted => "all_models_exhausted",
            ErrorKind::Backend => "backend",
        };
        write!(f, "{}", s)
    }
}

/// A classified AI-client error with human-readable detail.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {detail}")]
pub struct AiError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl AiError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}
