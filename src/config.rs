//! TOML configuration.
//!
//! Every section except `[db]` is optional and falls back to defaults.
//! API keys are never read from the file; providers take them from the
//! environment (`OPENAI_API_KEY`, `RAPIDAPI_KEY`).
//!
//! ```toml
//! [db]
//! path = "./data/aqa.sqlite"
//!
//! [corpus]
//! path = "./data/corpus.json"
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//!
//! [completion]
//! provider = "openai"
//! model = "gpt-3.5-turbo-instruct"
//!
//! [prompt]
//! top_k = 5
//! max_context_tokens = 2000
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use article_qa_core::chunk::{DEFAULT_CHARS_PER_TOKEN, DEFAULT_CHUNK_TOKENS};
use article_qa_core::models::CompletionParams;
use article_qa_core::pipeline::{PipelineOptions, DEFAULT_INSTRUCTIONS};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub source: SourceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default = "default_corpus_path")]
    pub path: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            path: default_corpus_path(),
        }
    }
}

fn default_corpus_path() -> PathBuf {
    PathBuf::from("./data/corpus.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,
    #[serde(default = "default_chunk_tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chars_per_token: default_chars_per_token(),
            max_tokens: default_chunk_tokens(),
        }
    }
}

fn default_chars_per_token() -> usize {
    DEFAULT_CHARS_PER_TOKEN
}
fn default_chunk_tokens() -> usize {
    DEFAULT_CHUNK_TOKENS
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL override (OpenAI-compatible servers, Ollama host).
    #[serde(default)]
    pub url: Option<String>,
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
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_completion_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default)]
    pub presence_penalty: f32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_completion_model(),
            url: None,
            max_tokens: default_completion_max_tokens(),
            temperature: 0.0,
            presence_penalty: 0.0,
            max_retries: default_max_retries(),
            timeout_secs: default_completion_timeout_secs(),
        }
    }
}

impl CompletionConfig {
    pub fn params(&self) -> CompletionParams {
        CompletionParams {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            presence_penalty: self.presence_penalty,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_completion_model() -> String {
    CompletionParams::default().model
}
fn default_completion_max_tokens() -> u32 {
    2000
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_completion_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromptConfig {
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
    #[serde(default)]
    pub cite_sources: bool,
    #[serde(default = "default_persist")]
    pub persist: bool,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            instructions: None,
            top_k: default_top_k(),
            max_context_tokens: default_max_context_tokens(),
            cite_sources: false,
            persist: default_persist(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_max_context_tokens() -> usize {
    2000
}
fn default_persist() -> bool {
    true
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
    "127.0.0.1:7340".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourceConfig {
    pub medium: Option<MediumSourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MediumSourceConfig {
    pub publication_id: String,
    #[serde(default = "default_from_date")]
    pub from_date: String,
    #[serde(default = "default_medium_url")]
    pub url: String,
    #[serde(default = "default_medium_host")]
    pub api_host: String,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_from_date() -> String {
    "2020-01-01".to_string()
}
fn default_medium_url() -> String {
    "https://medium2.p.rapidapi.com".to_string()
}
fn default_medium_host() -> String {
    "medium2.p.rapidapi.com".to_string()
}
fn default_max_pages() -> usize {
    1000
}

impl Config {
    /// Pipeline settings derived from `[chunking]`, `[prompt]`, and `[completion]`.
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            top_k: self.prompt.top_k,
            max_context_tokens: self.prompt.max_context_tokens,
            chars_per_token: self.chunking.chars_per_token,
            instructions: self
                .prompt
                .instructions
                .clone()
                .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
            cite_sources: self.prompt.cite_sources,
            params: self.completion.params(),
            persist: self.prompt.persist,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.chars_per_token == 0 {
        bail!("chunking.chars_per_token must be > 0");
    }
    if config.chunking.max_tokens == 0 {
        bail!("chunking.max_tokens must be > 0");
    }

    // Validate prompt
    if config.prompt.top_k == 0 {
        bail!("prompt.top_k must be >= 1");
    }
    if config.prompt.max_context_tokens == 0 {
        bail!("prompt.max_context_tokens must be > 0");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if config.embedding.is_enabled() && config.embedding.model.is_none() {
        bail!(
            "embedding.model must be specified when provider is '{}'",
            config.embedding.provider
        );
    }

    // Validate completion
    match config.completion.provider.as_str() {
        "disabled" | "openai" => {}
        other => bail!(
            "Unknown completion provider: '{}'. Must be disabled or openai.",
            other
        ),
    }
    if !(0.0..=2.0).contains(&config.completion.temperature) {
        bail!("completion.temperature must be in [0.0, 2.0]");
    }
    if !(-2.0..=2.0).contains(&config.completion.presence_penalty) {
        bail!("completion.presence_penalty must be in [-2.0, 2.0]");
    }

    if let Some(medium) = &config.source.medium {
        if medium.publication_id.trim().is_empty() {
            bail!("source.medium.publication_id must not be empty");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = parse("[db]\npath = \"./data/aqa.sqlite\"\n").unwrap();
        assert_eq!(config.corpus.path, PathBuf::from("./data/corpus.json"));
        assert_eq!(config.chunking.chars_per_token, 4);
        assert_eq!(config.chunking.max_tokens, 400);
        assert!(!config.embedding.is_enabled());
        assert_eq!(config.completion.provider, "disabled");
        assert_eq!(config.prompt.top_k, 5);
        assert!(config.prompt.persist);

        let opts = config.pipeline_options();
        assert_eq!(opts.max_context_tokens, 2000);
        assert_eq!(opts.instructions, DEFAULT_INSTRUCTIONS);
        assert_eq!(opts.params.max_tokens, 2000);
    }

    #[test]
    fn test_rejects_zero_chars_per_token() {
        let err = parse("[db]\npath = \"x\"\n[chunking]\nchars_per_token = 0\n").unwrap_err();
        assert!(err.to_string().contains("chars_per_token"));
    }

    #[test]
    fn test_enabled_embedding_requires_model() {
        let err = parse("[db]\npath = \"x\"\n[embedding]\nprovider = \"openai\"\n").unwrap_err();
        assert!(err.to_string().contains("embedding.model"));
    }

    #[test]
    fn test_unknown_completion_provider() {
        let err = parse("[db]\npath = \"x\"\n[completion]\nprovider = \"magic\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown completion provider"));
    }

    #[test]
    fn test_prompt_overrides() {
        let config = parse(
            r#"
[db]
path = "x"

[prompt]
instructions = "Use an excited tone!"
top_k = 3
cite_sources = true
persist = false

[completion]
model = "my-model"
temperature = 0.7
"#,
        )
        .unwrap();
        let opts = config.pipeline_options();
        assert_eq!(opts.instructions, "Use an excited tone!");
        assert_eq!(opts.top_k, 3);
        assert!(opts.cite_sources);
        assert!(!opts.persist);
        assert_eq!(opts.params.model, "my-model");
        assert!((opts.params.temperature - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_medium_source_defaults() {
        let config = parse("[db]\npath = \"x\"\n[source.medium]\npublication_id = \"98111c9905da\"\n")
            .unwrap();
        let medium = config.source.medium.unwrap();
        assert_eq!(medium.from_date, "2020-01-01");
        assert_eq!(medium.api_host, "medium2.p.rapidapi.com");
        assert_eq!(medium.max_pages, 1000);

        let err = parse("[db]\npath = \"x\"\n[source.medium]\npublication_id = \" \"\n").unwrap_err();
        assert!(err.to_string().contains("publication_id"));
    }
}
