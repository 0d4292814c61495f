//! The resilient completion client.
//!
//! One [`CompletionRequest`] is tried against each ranked model candidate in
//! turn, under a hard per-candidate deadline. Timeouts and unavailable models
//! move on to the next candidate; safety rejections surface immediately; a
//! token-limited response is salvaged when it still carries parseable or
//! repairable text. The per-candidate deadline is the only cancellation
//! point, so worst-case wall clock is `candidates x timeout`; callers needing
//! a tighter bound cap the candidate count.

use crate::catalog::ModelCatalog;
use crate::error::ErrorKind;
use crate::extract;
use crate::wire::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part,
    SystemInstruction,
};
use async_trait::async_trait;
use log::{debug, warn};
use std::time::Duration;
use tokio::time::timeout;
use util::config::AppConfig;

/// A single generation request. Created per call, never mutated.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_instruction: String,
    pub user_content: String,
    /// Sampling temperature in [0, 1].
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Hard deadline for each candidate attempt.
    pub timeout: Duration,
}

/// Why a non-failure result carries incomplete text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialReason {
    TokenLimit,
}

impl std::fmt::Display for PartialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartialReason::TokenLimit => write!(f, "token-limit"),
        }
    }
}

/// The outcome of one `complete` call. Produced exactly once per request.
#[derive(Debug, Clone)]
pub enum CompletionResult {
    Success {
        text: String,
    },
    /// Truncated output that was repaired or annotated into something usable.
    Partial {
        text: String,
        reason: PartialReason,
    },
    Failure {
        kind: ErrorKind,
        detail: String,
    },
}

impl CompletionResult {
    /// Text usable by an orchestrator: `Success` or non-empty `Partial`.
    pub fn usable_text(&self) -> Option<&str> {
        match self {
            CompletionResult::Success { text } => Some(text),
            CompletionResult::Partial { text, .. } if !text.trim().is_empty() => Some(text),
            _ => None,
        }
    }
}

/// Classified outcome of a single candidate call, before fallback policy.
#[derive(Debug)]
pub enum GenerateError {
    /// The backend does not serve this model.
    ModelUnavailable(String),
    /// The prompt or the response was refused on safety grounds.
    SafetyRejection(String),
    /// Any other transport or server failure.
    Backend(String),
}

/// One generation call against a named model. The wire implementation talks
/// to the real backend; tests substitute deterministic behaviors.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<GenerateReply, GenerateError>;
}

/// What one candidate produced.
#[derive(Debug, Clone)]
pub struct GenerateReply {
    pub text: String,
    pub finish_reason: Option<String>,
}

/// Backend implementation over the real generation endpoint.
pub struct HttpGenerationBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpGenerationBackend {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config() -> Self {
        let cfg = AppConfig::global();
        Self::new(cfg.gemini_base_url.clone(), cfg.gemini_api_key.clone())
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    async fn generate(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<GenerateReply, GenerateError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );

        let body = GenerateContentRequest {
            system_instruction: Some(SystemInstruction {
                parts: vec![Part {
                    text: request.system_instruction.clone(),
                }],
            }),
            contents: vec![Content {
                parts: vec![Part {
                    text: request.user_content.clone(),
                }],
            }],
            generation_config: Some(GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
            }),
        };

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerateError::Backend(format!("request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(GenerateError::ModelUnavailable(format!(
                "model {model} not found"
            )));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GenerateError::Backend(format!(
                "backend returned {status}: {detail}"
            )));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::Backend(format!("invalid response body: {e}")))?;

        if let Some(reason) = parsed.block_reason() {
            return Err(GenerateError::SafetyRejection(format!(
                "prompt blocked: {reason}"
            )));
        }
        if parsed.finish_reason() == Some("SAFETY") {
            return Err(GenerateError::SafetyRejection(
                "response withheld on safety grounds".to_string(),
            ));
        }

        Ok(GenerateReply {
            text: parsed.first_text(),
            finish_reason: parsed.finish_reason().map(str::to_string),
        })
    }
}

/// Seam for callers that only need "give me a completion"; implemented by
/// [`ResilientCompletionClient`] and by test doubles.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> CompletionResult;
}

/// Iterates ranked model candidates until one yields usable output.
///
/// Holds no state across invocations; every call re-ranks the catalog.
pub struct ResilientCompletionClient {
    catalog: ModelCatalog,
    backend: Box<dyn GenerationBackend>,
    api_key: String,
}

impl ResilientCompletionClient {
    pub fn new(catalog: ModelCatalog, backend: Box<dyn GenerationBackend>, api_key: String) -> Self {
        Self {
            catalog,
            backend,
            api_key,
        }
    }

    fn validate(&self, request: &CompletionRequest) -> Result<(), CompletionResult> {
        if request.system_instruction.trim().is_empty() {
            return Err(CompletionResult::Failure {
                kind: ErrorKind::Configuration,
                detail: "system instruction is empty".to_string(),
            });
        }
        if request.user_content.trim().is_empty() {
            return Err(CompletionResult::Failure {
                kind: ErrorKind::Configuration,
                detail: "user content is empty".to_string(),
            });
        }
        if self.api_key.trim().is_empty() {
            return Err(CompletionResult::Failure {
                kind: ErrorKind::Configuration,
                detail: "generation API key is not configured".to_string(),
            });
        }
        Ok(())
    }

    /// Handles a reply whose finish condition reports the token budget ran out.
    fn salvage_token_limited(model: &str, text: String) -> CompletionResult {
        if text.trim().is_empty() {
            // Nothing came back at all: raising the budget is the caller's
            // problem, not a reason to burn the remaining candidates.
            return CompletionResult::Failure {
                kind: ErrorKind::TokenLimit,
                detail: format!("{model}: output budget exhausted with no text produced"),
            };
        }
        if serde_json::from_str::<serde_json::Value>(text.trim()).is_ok() {
            return CompletionResult::Success { text };
        }
        warn!("{model}: token-limited output was not valid JSON, attempting repair");
        CompletionResult::Partial {
            text: extract::repair_truncated(&text),
            reason: PartialReason::TokenLimit,
        }
    }
}

#[async_trait]
impl CompletionProvider for ResilientCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> CompletionResult {
        if let Err(failure) = self.validate(request) {
            return failure;
        }

        let candidates = self.catalog.rank().await;
        let mut attempts: Vec<String> = Vec::new();

        for model in &candidates {
            debug!("attempting completion with model {model}");
            match timeout(request.timeout, self.backend.generate(model, request)).await {
                Err(_) => {
                    warn!("model {model} timed out after {:?}", request.timeout);
                    attempts.push(format!("{model}: timed out after {:?}", request.timeout));
                }
                Ok(Err(GenerateError::ModelUnavailable(detail))) => {
                    warn!("model {model} unavailable: {detail}");
                    attempts.push(format!("{model}: unavailable ({detail})"));
                }
                Ok(Err(GenerateError::SafetyRejection(detail))) => {
                    return CompletionResult::Failure {
                        kind: ErrorKind::SafetyRejection,
                        detail: format!("{model}: {detail}"),
                    };
                }
                Ok(Err(GenerateError::Backend(detail))) => {
                    warn!("model {model} failed: {detail}");
                    attempts.push(format!("{model}: {detail}"));
                }
                Ok(Ok(reply)) => {
                    if reply.finish_reason.as_deref() == Some("MAX_TOKENS") {
                        return Self::salvage_token_limited(model, reply.text);
                    }
                    if reply.text.trim().is_empty() {
                        attempts.push(format!("{model}: empty response"));
                        continue;
                    }
                    return CompletionResult::Success { text: reply.text };
                }
            }
        }

        CompletionResult::Failure {
            kind: ErrorKind::AllModelsExhausted,
            detail: if attempts.is_empty() {
                "no model candidates available".to_string()
            } else {
                attempts.join("; ")
            },
        }
    }
}
