//! Boundary to the text-generation model.
//!
//! The model is an opaque call: prompt text in, response text out. The app
//! crate implements [`GenerationGateway`] over an OpenAI-compatible chat
//! completions endpoint.

use anyhow::Result;
use async_trait::async_trait;

/// Per-request model selection.
///
/// When both `api_key` and `base_url` are set the request goes to the
/// user's own endpoint; otherwise the gateway's built-in default model is
/// used. `model` only applies to user endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

impl ModelConfig {
    pub fn uses_user_endpoint(&self) -> bool {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        set(&self.api_key) && set(&self.base_url)
    }
}

/// A text-completion backend.
///
/// No timeout or retry is implied by this trait; a returned error is
/// terminal for the request that triggered it.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    async fn complete(&self, prompt: &str, config: &ModelConfig) -> Result<String>;
}
