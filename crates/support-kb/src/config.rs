//! TOML configuration parsing and validation.
//!
//! The configuration file (default `config/skb.toml`) has these sections:
//!
//! ```toml
//! [db]
//! path = "./data/skb.sqlite"
//!
//! [documents]
//! root = "./docs"
//! include_globs = ["**/*.txt", "**/*.md", "**/*.pdf"]
//!
//! [chunking]
//! max_chars = 1600
//! min_paragraph_chars = 40
//!
//! [embedding]
//! provider = "http"            # disabled | http | openai | ollama
//! url = "https://example.supabase.co/functions/v1/embed"
//! model = "gte-small"
//! dims = 384
//! api_key_env = "SUPABASE_ANON_KEY"
//!
//! [server]
//! bind = "127.0.0.1:7440"
//! ```
//!
//! Only `[db]` is required. API keys are read from the environment, which
//! `main` populates from a `.env` file when one exists.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use support_kb_core::chunk::{ChunkLimits, MAX_CHUNK_CHARS, MIN_PARAGRAPH_CHARS};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    #[serde(default = "default_docs_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            root: default_docs_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_docs_root() -> PathBuf {
    PathBuf::from("./docs")
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.txt".to_string(),
        "**/*.md".to_string(),
        "**/*.pdf".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_min_paragraph_chars")]
    pub min_paragraph_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: MAX_CHUNK_CHARS,
            min_paragraph_chars: MIN_PARAGRAPH_CHARS,
        }
    }
}

impl ChunkingConfig {
    pub fn limits(&self) -> ChunkLimits {
        ChunkLimits {
            max_chars: self.max_chars,
            min_paragraph_chars: self.min_paragraph_chars,
        }
    }
}

fn default_max_chars() -> usize {
    MAX_CHUNK_CHARS
}
fn default_min_paragraph_chars() -> usize {
    MIN_PARAGRAPH_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Endpoint for the `http` and `ollama` providers.
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the API key for the `http` provider.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            api_key_env: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_max_retries() -> u32 {
    0
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7440".to_string()
}

/// Read, parse, and validate a configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.chunking.max_chars == 0 {
        bail!("chunking.max_chars must be > 0");
    }

    if config.documents.include_globs.is_empty() {
        bail!("documents.include_globs must not be empty");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        "http" => {
            if config.embedding.url.is_none() {
                bail!("embedding.url must be specified when provider is 'http'");
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, http, openai, or ollama.",
            other
        ),
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    Ok(config)
}
