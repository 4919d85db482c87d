//! Completion provider implementations.
//!
//! - **[`DisabledCompleter`]**: returns errors; used when no completion model is configured.
//! - **[`OpenAICompleter`]**: calls `POST /v1/completions` on the OpenAI API
//!   (or a compatible server set via `completion.url`).

use anyhow::{bail, Result as AnyResult};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;

use article_qa_core::completion::CompletionProvider;
use article_qa_core::error::{QaError, Result};
use article_qa_core::models::{CompletionChoice, CompletionParams};

use crate::config::CompletionConfig;
use crate::http;

const OPENAI_URL: &str = "https://api.openai.com";

/// Instantiate the completion provider named in the configuration.
pub fn create_completer(config: &CompletionConfig) -> AnyResult<Arc<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledCompleter)),
        "openai" => Ok(Arc::new(OpenAICompleter::new(config)?)),
        other => bail!("Unknown completion provider: {}", other),
    }
}

/// A completion provider that always fails.
pub struct DisabledCompleter;

#[async_trait]
impl CompletionProvider for DisabledCompleter {
    async fn complete(
        &self,
        _prompt: &str,
        _params: &CompletionParams,
    ) -> Result<Vec<CompletionChoice>> {
        Err(QaError::CompletionProvider(
            "completion provider is disabled; set [completion] provider in config".to_string(),
        ))
    }
}

/// Completion provider using the OpenAI completions API.
pub struct OpenAICompleter {
    client: Client,
    url: String,
    api_key: Option<String>,
    max_retries: u32,
}

impl OpenAICompleter {
    pub fn new(config: &CompletionConfig) -> AnyResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok();
        if api_key.is_none() && config.url.is_none() {
            bail!("OPENAI_API_KEY environment variable not set");
        }

        Ok(Self {
            client: http::client(config.timeout_secs).map_err(anyhow::Error::msg)?,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAICompleter {
    async fn complete(
        &self,
        prompt: &str,
        params: &CompletionParams,
    ) -> Result<Vec<CompletionChoice>> {
        let body = serde_json::json!({
            "model": params.model,
            "prompt": prompt,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
            "presence_penalty": params.presence_penalty,
        });
        let endpoint = format!("{}/v1/completions", self.url);

        let json = http::send_json_with_retry("OpenAI", self.max_retries, || {
            let req = self.client.post(&endpoint).json(&body);
            match &self.api_key {
                Some(key) => req.bearer_auth(key),
                None => req,
            }
        })
        .await
        .map_err(QaError::CompletionProvider)?;

        parse_choices(&json)
    }
}

/// Extract `choices[]` from a completions response, in index order.
fn parse_choices(json: &serde_json::Value) -> Result<Vec<CompletionChoice>> {
    let choices = json
        .get("choices")
        .cloned()
        .ok_or_else(|| QaError::CompletionProvider("invalid response: missing choices".into()))?;
    let mut choices: Vec<CompletionChoice> = serde_json::from_value(choices)
        .map_err(|e| QaError::CompletionProvider(format!("invalid choices: {}", e)))?;
    choices.sort_by_key(|c| c.index);
    Ok(choices)
}
