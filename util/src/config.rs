//! Global application configuration manager.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton containing
//! runtime configuration values loaded from environment variables. It provides
//! thread-safe access and mutation for testing or overrides in runtime environments.
//!
//! The preferred and fallback model lists are explicit configuration values so
//! tests can substitute deterministic catalogs instead of relying on a hidden
//! module-level default.

use std::env;
use std::sync::{OnceLock, RwLock};

/// Represents the complete application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    /// Models tried first when ranking discovered candidates, fastest first.
    pub preferred_models: Vec<String>,
    /// Models used when discovery fails or yields no eligible candidates.
    pub fallback_models: Vec<String>,
    /// Hard per-candidate deadline for a single generation call.
    pub model_timeout_ms: u64,
    /// Stricter deadline for topic analysis, which gates housekeeping work.
    pub topic_timeout_ms: u64,
    pub max_output_tokens: u32,
    pub sandbox_url: String,
    pub sandbox_timeout_secs: u64,
    /// Submissions stuck in `evaluating` longer than this are reconciled.
    pub stale_evaluation_minutes: i64,
}

/// Lazily-initialized, thread-safe singleton instance of `AppConfig`.
static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

fn parse_model_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect()
}

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// This method is used internally to populate the singleton. It panics
    /// if required variables are improperly formatted.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            env: env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "contest-grader".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "grader.log".into()),
            log_to_stdout: env::var("LOG_TO_STDOUT").unwrap_or_else(|_| "false".into()) == "true",
            gemini_api_key: env::var("GEMINI_API_KEY").unwrap_or_default(),
            gemini_base_url: env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".into()),
            preferred_models: parse_model_list(
                &env::var("PREFERRED_MODELS")
                    .unwrap_or_else(|_| "gemini-2.5-flash,gemini-2.0-flash".into()),
            ),
            fallback_models: parse_model_list(
                &env::var("FALLBACK_MODELS").unwrap_or_else(|_| {
                    "gemini-2.5-flash,gemini-2.0-flash,gemini-2.5-pro".into()
                }),
            ),
            model_timeout_ms: env::var("MODEL_TIMEOUT_MS")
                .unwrap_or_else(|_| "30000".into())
                .parse()
                .unwrap(),
            topic_timeout_ms: env::var("TOPIC_TIMEOUT_MS")
                .unwrap_or_else(|_| "8000".into())
                .parse()
                .unwrap(),
            max_output_tokens: env::var("MAX_OUTPUT_TOKENS")
                .unwrap_or_else(|_| "4096".into())
                .parse()
                .unwrap(),
            sandbox_url: env::var("SANDBOX_URL").unwrap_or_else(|_| "http://127.0.0.1:3001".into()),
            sandbox_timeout_secs: env::var("SANDBOX_TIMEOUT_SECS")
                .unwrap_or_else(|_| "20".into())
                .parse()
                .unwrap(),
            stale_evaluation_minutes: env::var("STALE_EVALUATION_MINUTES")
                .unwrap_or_else(|_| "30".into())
                .parse()
                .unwrap(),
        }
    }

    /// Returns a shared reference to the global configuration.
    ///
    /// # Panics
    /// Panics if the lock cannot be acquired.
    pub fn global() -> std::sync::RwLockReadGuard<'static, AppConfig> {
        CONFIG_INSTANCE
            .get_or_init(|| RwLock::new(AppConfig::from_env()))
            .read()
            .expect("Failed to acquire AppConfig read lock")
    }

    /// Resets the configuration by reloading from environment variables.
    ///
    /// Useful in tests to clear overrides.
    pub fn reset() {
        if let Some(lock) = CONFIG_INSTANCE.get() {
            let mut guard = lock.write().unwrap();
            *guard = AppConfig::from_env();
        }
    }

    /// Generic internal setter for any field in the config.
    ///
    /// Used by public per-field setter methods.
    fn set_field<F>(setter: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        let mut guard = lock
            .write()
            .expect("Failed to acquire AppConfig write lock");
        setter(&mut guard);
    }

    // --- Per-field setters below ---

    pub fn set_env(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.env = value.into());
    }

    pub fn set_log_level(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.log_level = value.into());
    }

    pub fn set_log_file(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.log_file = value.into());
    }

    pub fn set_log_to_stdout(value: bool) {
        AppConfig::set_field(|cfg| cfg.log_to_stdout = value);
    }

    pub fn set_gemini_api_key(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.gemini_api_key = value.into());
    }

    pub fn set_gemini_base_url(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.gemini_base_url = value.into());
    }

    pub fn set_preferred_models(value: Vec<String>) {
        AppConfig::set_field(|cfg| cfg.preferred_models = value);
    }

    pub fn set_fallback_models(value: Vec<String>) {
        AppConfig::set_field(|cfg| cfg.fallback_models = value);
    }

    pub fn set_model_timeout_ms(value: u64) {
        AppConfig::set_field(|cfg| cfg.model_timeout_ms = value);
    }

    pub fn set_topic_timeout_ms(value: u64) {
        AppConfig::set_field(|cfg| cfg.topic_timeout_ms = value);
    }

    pub fn set_max_output_tokens(value: u32) {
        AppConfig::set_field(|cfg| cfg.max_output_tokens = value);
    }

    pub fn set_sandbox_url(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.sandbox_url = value.into());
    }

    pub fn set_stale_evaluation_minutes(value: i64) {
        AppConfig::set_field(|cfg| cfg.stale_evaluation_minutes = value);
    }
}
