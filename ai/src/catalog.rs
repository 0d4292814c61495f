//! Model discovery and ranking.
//!
//! The catalog asks the backend which model variants exist, keeps only those
//! that can generate text, and orders them by a fixed preference list (fast
//! variants before capable-but-slow ones). Discovery failure or an empty
//! eligible set degrades to the configured fallback list; `rank()` never
//! fails and never blocks the caller on a broken listing endpoint.

use crate::error::{AiError, ErrorKind};
use crate::wire::ListModelsResponse;
use async_trait::async_trait;
use log::warn;
use util::config::AppConfig;

/// What a discovered model variant is capable of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityClass {
    Generation,
    Embedding,
    Other,
}

/// One selectable backend variant, produced by discovery and discarded after ranking.
#[derive(Debug, Clone)]
pub struct ModelCandidate {
    pub name: String,
    pub capability: CapabilityClass,
}

/// Abstracts the backend's model listing endpoint so tests can substitute
/// deterministic catalogs.
#[async_trait]
pub trait ModelDiscovery: Send + Sync {
    async fn list_models(&self) -> Result<Vec<ModelCandidate>, AiError>;
}

/// Discovery over the real listing endpoint.
pub struct HttpDiscovery {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpDiscovery {
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
impl ModelDiscovery for HttpDiscovery {
    async fn list_models(&self) -> Result<Vec<ModelCandidate>, AiError> {
        let url = format!("{}/models?key={}", self.base_url, self.api_key);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AiError::new(ErrorKind::Backend, format!("model listing failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AiError::new(
                ErrorKind::Backend,
                format!("model listing returned {}", response.status()),
            ));
        }

        let listing: ListModelsResponse = response.json().await.map_err(|e| {
            AiError::new(ErrorKind::Backend, format!("invalid model listing body: {e}"))
        })?;

        Ok(listing
            .models
            .into_iter()
            .map(|entry| {
                let capability = if entry
                    .supported_generation_methods
                    .iter()
                    .any(|m| m == "generateContent")
                {
                    CapabilityClass::Generation
                } else if entry
                    .supported_generation_methods
                    .iter()
                    .any(|m| m == "embedContent")
                {
                    CapabilityClass::Embedding
                } else {
                    CapabilityClass::Other
                };
                // The listing endpoint returns fully qualified names like "models/x".
                let name = entry
                    .name
                    .strip_prefix("models/")
                    .unwrap_or(&entry.name)
                    .to_string();
                ModelCandidate { name, capability }
            })
            .collect())
    }
}

/// Ranks usable model variants for the completion client.
pub struct ModelCatalog {
    discovery: Box<dyn ModelDiscovery>,
    preferred: Vec<String>,
    fallback: Vec<String>,
}

impl ModelCatalog {
    pub fn new(
        discovery: Box<dyn ModelDiscovery>,
        preferred: Vec<String>,
        fallback: Vec<String>,
    ) -> Self {
        Self {
            discovery,
            preferred,
            fallback,
        }
    }

    /// Builds a catalog with the preference and fallback lists from [`AppConfig`].
    pub fn from_config(discovery: Box<dyn ModelDiscovery>) -> Self {
        let (preferred, fallback) = {
            let cfg = AppConfig::global();
            (cfg.preferred_models.clone(), cfg.fallback_models.clone())
        };
        Self::new(discovery, preferred, fallback)
    }

    /// Returns model identifiers in the order the client should try them.
    ///
    /// Preference-listed models come first, then any remaining eligible
    /// models in discovery order. A failed discovery or an empty eligible
    /// set degrades to the fallback list.
    pub async fn rank(&self) -> Vec<String> {
        let discovered = match self.discovery.list_models().await {
            Ok(models) => models,
            Err(e) => {
                warn!("model discovery failed, using fallback list: {e}");
                return self.fallback.clone();
            }
        };

        let eligible: Vec<String> = discovered
            .into_iter()
            .filter(|m| m.capability == CapabilityClass::Generation)
            .map(|m| m.name)
            .collect();

        if eligible.is_empty() {
            warn!("model discovery returned no generation-capable models, using fallback list");
            return self.fallback.clone();
        }

        let mut ranked: Vec<String> = self
            .preferred
            .iter()
            .filter(|p| eligible.contains(p))
            .cloned()
            .collect();
        for model in eligible {
            if !ranked.contains(&model) {
                ranked.push(model);
            }
        }
        ranked
    }
}
