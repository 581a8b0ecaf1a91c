//! TOML configuration parsing and validation.
//!
//! Only `[db]` is required; every other section falls back to defaults
//! that match the retrieval core's constants.

use anyhow::{bail, Context, Result};
use novel_muse_core::chunk::ChunkParams;
use novel_muse_core::context::{RetrievalParams, DEFAULT_RECENT_CHAPTERS, DEFAULT_TOP_K};
use novel_muse_core::embedding::EMBEDDING_DIMS;
use novel_muse_core::generate::DEFAULT_EXPANSION_RECENT;
use novel_muse_core::prompt::DEFAULT_TARGET_WORDS;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkParams,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_recent_chapters")]
    pub recent_chapters: usize,
    #[serde(default = "default_expansion_recent")]
    pub expansion_recent: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            recent_chapters: DEFAULT_RECENT_CHAPTERS,
            expansion_recent: DEFAULT_EXPANSION_RECENT,
        }
    }
}

impl RetrievalConfig {
    pub fn params(&self) -> RetrievalParams {
        RetrievalParams {
            top_k: self.top_k,
            recent_chapters: self.recent_chapters,
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}
fn default_recent_chapters() -> usize {
    DEFAULT_RECENT_CHAPTERS
}
fn default_expansion_recent() -> usize {
    DEFAULT_EXPANSION_RECENT
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_openai_url")]
    pub url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: EMBEDDING_DIMS,
            url: default_openai_url(),
            api_key_env: default_api_key_env(),
            max_retries: default_max_retries(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

fn default_provider() -> String {
    "hash".to_string()
}
fn default_dims() -> usize {
    EMBEDDING_DIMS
}
fn default_openai_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_embedding_timeout() -> u64 {
    30
}

/// Built-in model used when the user has not configured their own endpoint.
#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_openai_url")]
    pub base_url: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_target_words")]
    pub default_target_words: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_url(),
            model: default_generation_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_generation_timeout(),
            temperature: default_temperature(),
            default_target_words: DEFAULT_TARGET_WORDS,
        }
    }
}

fn default_generation_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_generation_timeout() -> u64 {
    120
}
fn default_temperature() -> f64 {
    0.7
}
fn default_target_words() -> usize {
    DEFAULT_TARGET_WORDS
}

impl Config {
    /// A config with every default and the given database path.
    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig { path: path.into() },
            chunking: ChunkParams::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            bail!(
                "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.overlap,
                self.chunking.chunk_size
            );
        }

        if self.retrieval.top_k < 1 {
            bail!("retrieval.top_k must be >= 1");
        }

        if self.embedding.dims == 0 {
            bail!("embedding.dims must be > 0");
        }
        match self.embedding.provider.as_str() {
            "hash" => {}
            "openai" => {
                if self.embedding.model.is_none() {
                    bail!("embedding.model must be specified when provider is 'openai'");
                }
            }
            other => bail!(
                "Unknown embedding provider: '{}'. Must be hash or openai.",
                other
            ),
        }

        if !(0.0..=2.0).contains(&self.generation.temperature) {
            bail!("generation.temperature must be in [0.0, 2.0]");
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = toml::from_str("[db]\npath = \"muse.sqlite\"\n").unwrap();
        config.validate().unwrap();
        assert_eq!(config.chunking, ChunkParams::default());
        assert_eq!(config.retrieval.params(), RetrievalParams::default());
        assert_eq!(config.retrieval.expansion_recent, 2);
        assert_eq!(config.embedding.provider, "hash");
        assert_eq!(config.embedding.dims, 1536);
        assert_eq!(config.generation.default_target_words, 4000);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let config: Config = toml::from_str(
            "[db]\npath = \"x\"\n[chunking]\nchunk_size = 100\noverlap = 100\n",
        )
        .unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("overlap"), "{}", err);
    }

    #[test]
    fn test_openai_embedding_requires_model() {
        let config: Config =
            toml::from_str("[db]\npath = \"x\"\n[embedding]\nprovider = \"openai\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config: Config =
            toml::from_str("[db]\npath = \"x\"\n[embedding]\nprovider = \"magic\"\n").unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("magic"));
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("/nonexistent/muse.toml")).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read config file"));
    }
}
