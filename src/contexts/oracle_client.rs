use crate::data::{GenerationRequest, ModelTags};
use crate::registries::ModelListing;
use anyhow::{Context, Result};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

/// Prefix every failed oracle exchange starts with.
pub const FAILURE_PREFIX: &str = "Error";

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llama3";
const GENERATE_PATH: &str = "/api/generate";
const TAGS_PATH: &str = "/api/tags";

/// Returns the failure message when `text` is a sentinel failure string.
pub fn oracle_failure(text: &str) -> Option<&str> {
    if !text.starts_with(FAILURE_PREFIX) {
        return None;
    }
    let message = text[FAILURE_PREFIX.len()..].trim_start_matches(':').trim();
    Some(if message.is_empty() { text } else { message })
}

/// Like [`oracle_failure`], but only the `Error:` form counts, so generated code
/// that merely starts with the word is not mistaken for a failure.
pub(crate) fn colon_failure(text: &str) -> Option<&str> {
    text.strip_prefix(FAILURE_PREFIX)
        .filter(|rest| rest.starts_with(':'))
        .and_then(|_| oracle_failure(text))
}

pub(crate) fn failure(message: impl std::fmt::Display) -> String {
    format!("{}: {}", FAILURE_PREFIX, message)
}

/// A text-generation service.
///
/// `generate` never fails with an error value: a broken exchange comes back as a
/// string starting with [`FAILURE_PREFIX`].
pub trait Oracle {
    fn generate(&self, request: &GenerationRequest) -> impl Future<Output = String>;
}

/// Where the oracle lives and how long to wait for it. Built once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleSettings {
    pub base_url: String,
    pub default_model: String,
    pub properties_path: PathBuf,
    pub request_timeout: Duration,
    pub listing_timeout: Duration,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            properties_path: PathBuf::from("properties.json"),
            request_timeout: Duration::from_secs(600),
            listing_timeout: Duration::from_secs(5),
        }
    }
}

impl OracleSettings {
    /// Defaults overridden by `OLLAMA_HOST` and `DBT_DEFAULT_MODEL`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let nonempty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut settings = Self::default();
        if let Some(host) = nonempty("OLLAMA_HOST") {
            settings.base_url = host.trim_end_matches('/').to_string();
        }
        if let Some(model) = nonempty("DBT_DEFAULT_MODEL") {
            settings.default_model = model;
        }
        settings
    }

    pub fn generate_url(&self) -> String {
        format!("{}{}", self.base_url, GENERATE_PATH)
    }

    pub fn tags_url(&self) -> String {
        format!("{}{}", self.base_url, TAGS_PATH)
    }
}

/// HTTP client for the generation endpoint, bound to one resolved model
#[derive(Debug, Clone)]
pub struct OracleClient {
    http: reqwest::Client,
    settings: OracleSettings,
    model: String,
}

impl OracleClient {
    pub fn new(settings: OracleSettings, model: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .no_proxy()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            settings,
            model: model.into(),
        })
    }

    /// Asks the oracle which models it serves.
    pub async fn list_models(settings: &OracleSettings) -> ModelListing {
        match fetch_model_names(settings).await {
            Ok(names) => ModelListing::Available(names),
            Err(e) => ModelListing::Unreachable(e.to_string()),
        }
    }

    async fn send(&self, request: &GenerationRequest) -> Result<String, reqwest::Error> {
        let response = self
            .http
            .post(self.settings.generate_url())
            .json(&request.body(&self.model))
            .send()
            .await?
            .error_for_status()?;
        response.text().await
    }
}

impl Oracle for OracleClient {
    async fn generate(&self, request: &GenerationRequest) -> String {
        tracing::debug!(
            model = %self.model,
            prompt_len = request.prompt.len(),
            "sending generation request"
        );
        match self.send(request).await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!("generation request failed: {}", e);
                failure(e)
            }
        }
    }
}

async fn fetch_model_names(settings: &OracleSettings) -> Result<Vec<String>, reqwest::Error> {
    let http = reqwest::Client::builder()
        .timeout(settings.listing_timeout)
        .no_proxy()
        .build()?;
    let tags: ModelTags = http
        .get(settings.tags_url())
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(tags.models.into_iter().map(|m| m.name).collect())
}
