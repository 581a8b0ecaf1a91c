//! OpenAI-compatible chat completions gateway.
//!
//! Each call picks one of two endpoints:
//! - the user's own endpoint, when the settings carry both an API key and
//!   a base URL (model defaults to `gpt-4` when unset);
//! - the built-in endpoint from `[generation]`, keyed by the environment
//!   variable named in `api_key_env`.
//!
//! Requests are sent once. Non-2xx responses fail with the status and
//! response body; there is no retry.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use novel_muse_core::gateway::{GenerationGateway, ModelConfig};

use crate::config::GenerationConfig;

/// Model used on a user endpoint when no model name is configured.
pub const DEFAULT_USER_MODEL: &str = "gpt-4";

pub struct OpenAiGateway {
    config: GenerationConfig,
    default_key: Option<String>,
    client: reqwest::Client,
}

/// Resolved target of a single completion request.
#[derive(Debug, PartialEq, Eq)]
struct Endpoint<'a> {
    url: String,
    api_key: &'a str,
    model: &'a str,
}

impl OpenAiGateway {
    /// Create a gateway whose built-in key is read from `config.api_key_env`.
    ///
    /// A missing key is not an error here; it only fails requests that
    /// would use the built-in endpoint.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());
        Self::with_default_key(config, key)
    }

    pub fn with_default_key(config: &GenerationConfig, default_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config: config.clone(),
            default_key,
            client,
        })
    }

    fn resolve<'a>(&'a self, model: &'a ModelConfig) -> Result<Endpoint<'a>> {
        if model.uses_user_endpoint() {
            let (Some(key), Some(base)) = (model.api_key.as_deref(), model.base_url.as_deref())
            else {
                bail!("user endpoint requires api key and base url");
            };
            let name = model
                .model
                .as_deref()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(DEFAULT_USER_MODEL);
            return Ok(Endpoint {
                url: completions_url(base),
                api_key: key,
                model: name,
            });
        }

        let key = self.default_key.as_deref().ok_or_else(|| {
            anyhow!(
                "no model configured: set an API key and base URL in settings, or export {}",
                self.config.api_key_env
            )
        })?;
        Ok(Endpoint {
            url: completions_url(&self.config.base_url),
            api_key: key,
            model: &self.config.model,
        })
    }
}

fn completions_url(base: &str) -> String {
    format!("{}/v1/chat/completions", base.trim().trim_end_matches('/'))
}

#[async_trait]
impl GenerationGateway for OpenAiGateway {
    async fn complete(&self, prompt: &str, model: &ModelConfig) -> Result<String> {
        let endpoint = self.resolve(model)?;

        let body = serde_json::json!({
            "model": endpoint.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "temperature": self.config.temperature,
        });

        tracing::debug!(url = %endpoint.url, model = endpoint.model, "sending completion request");

        let response = self
            .client
            .post(&endpoint.url)
            .bearer_auth(endpoint.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Model API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_completion(&json)
    }
}

fn parse_completion(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Invalid completion response: missing choices[0].message.content"))
}
