//! Client for the remote code-execution sandbox.
//!
//! The sandbox compiles and runs submitted source against one stdin payload
//! per call and reports stdout/stderr/exit code plus any compile diagnostics.
//! This crate only speaks the request/response contract; how code is actually
//! compiled or isolated is the sandbox's concern. A test passes iff trimmed
//! stdout equals the trimmed expected output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use util::config::AppConfig;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("sandbox request failed: {0}")]
    Transport(String),
    #[error("sandbox returned {status}: {detail}")]
    Status { status: u16, detail: String },
}

/// One execution request: source plus the stdin for a single test case.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub source_code: String,
    pub stdin: String,
}

/// What the sandbox reported for one run. Untrusted; every field defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutput {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub exit_code: i32,
    #[serde(default)]
    pub compile_output: Option<String>,
    #[serde(default)]
    pub compile_error: Option<String>,
}

impl RunOutput {
    /// A test passes iff trimmed stdout equals the trimmed expected output.
    pub fn passes(&self, expected_output: &str) -> bool {
        self.stdout.trim() == expected_output.trim()
    }
}

/// Seam over the execution service; tests substitute scripted outputs.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Runs the source once with the given stdin. Called once per test case.
    async fn run(&self, source_code: &str, stdin: &str) -> Result<RunOutput, RunnerError>;
}

/// Sandbox client over the real execution service.
pub struct HttpSandbox {
    http: reqwest::Client,
    base_url: String,
}

impl HttpSandbox {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RunnerError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RunnerError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    pub fn from_config() -> Result<Self, RunnerError> {
        let (url, timeout_secs) = {
            let cfg = AppConfig::global();
            (cfg.sandbox_url.clone(), cfg.sandbox_timeout_secs)
        };
        Self::new(url, Duration::from_secs(timeout_secs))
    }
}

#[async_trait]
impl Sandbox for HttpSandbox {
    async fn run(&self, source_code: &str, stdin: &str) -> Result<RunOutput, RunnerError> {
        let request = RunRequest {
            source_code: source_code.to_string(),
            stdin: stdin.to_string(),
        };

        let response = self
            .http
            .post(format!("{}/run", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| RunnerError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(RunnerError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        response
            .json::<RunOutput>()
            .await
            .map_err(|e| RunnerError::Transport(format!("invalid sandbox response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passes_compares_trimmed_stdout() {
        let output = RunOutput {
            stdout: "  42\n".into(),
            ..Default::default()
        };
        assert!(output.passes("42"));
        assert!(output.passes(" 42 "));
        assert!(!output.passes("43"));
    }

    #[test]
    fn test_run_output_defaults_for_missing_fields() {
        let output: RunOutput = serde_json::from_str(r#"{"stdout": "hi"}"#).unwrap();
        assert_eq!(output.stdout, "hi");
        assert_eq!(output.exit_code, 0);
        assert!(output.compile_error.is_none());
    }

    #[test]
    fn test_run_request_serializes_camel_case() {
        let request = RunRequest {
            source_code: "print(1)".into(),
            stdin: "".into(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("sourceCode").is_some());
    }
}
