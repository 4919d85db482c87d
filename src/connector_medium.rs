//! Medium publication connector (via the RapidAPI Medium API).
//!
//! Lists a publication's article ids page by page and fetches each
//! article's metadata and text. Requests carry the `X-RapidAPI-Key`
//! header (from the `RAPIDAPI_KEY` environment variable) and the
//! configured `X-RapidAPI-Host`.
//!
//! # Endpoints
//!
//! | Call | Path |
//! |------|------|
//! | listing | `GET /publication/{id}/articles?from={cursor}` |
//! | metadata | `GET /article/{id}` |
//! | text | `GET /article/{id}/content` |

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use article_qa_core::models::ArticleInfo;

use crate::config::MediumSourceConfig;
use crate::http;
use crate::ingest::{ArticlePage, ArticleSource, FetchedArticle};

const DEFAULT_URL: &str = "https://medium2.p.rapidapi.com";

/// [`ArticleSource`] backed by the RapidAPI Medium API.
pub struct MediumSource {
    client: Client,
    name: String,
    url: String,
    api_host: String,
    api_key: Option<String>,
    publication_id: String,
    max_retries: u32,
}

impl MediumSource {
    /// Build a source from config, reading `RAPIDAPI_KEY` from the environment.
    ///
    /// The key may be omitted only when `url` points somewhere other than
    /// the public RapidAPI host.
    pub fn new(config: &MediumSourceConfig) -> Result<Self> {
        Self::with_api_key(config, std::env::var("RAPIDAPI_KEY").ok())
    }

    pub fn with_api_key(config: &MediumSourceConfig, api_key: Option<String>) -> Result<Self> {
        let url = config.url.trim_end_matches('/').to_string();
        if api_key.is_none() && url == DEFAULT_URL {
            bail!("RAPIDAPI_KEY environment variable not set");
        }

        Ok(Self {
            client: http::client(config.timeout_secs).map_err(anyhow::Error::msg)?,
            name: format!("medium:{}", config.publication_id),
            url,
            api_host: config.api_host.clone(),
            api_key,
            publication_id: config.publication_id.clone(),
            max_retries: config.max_retries,
        })
    }

    fn listing_url(&self) -> String {
        format!("{}/publication/{}/articles", self.url, self.publication_id)
    }

    fn article_url(&self, id: &str) -> String {
        format!("{}/article/{}", self.url, id)
    }

    async fn get_json(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value> {
        debug!(endpoint, ?query, "GET");
        http::send_json_with_retry("Medium", self.max_retries, || {
            let req = self
                .client
                .get(endpoint)
                .query(query)
                .header("X-RapidAPI-Host", &self.api_host);
            match &self.api_key {
                Some(key) => req.header("X-RapidAPI-Key", key),
                None => req,
            }
        })
        .await
        .map_err(anyhow::Error::msg)
    }
}

#[async_trait]
impl ArticleSource for MediumSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_page(&self, from: &str) -> Result<ArticlePage> {
        let json = self
            .get_json(&self.listing_url(), &[("from", from)])
            .await?;
        serde_json::from_value(json).context("invalid publication listing")
    }

    async fn fetch_article(&self, id: &str) -> Result<FetchedArticle> {
        let info_url = self.article_url(id);
        let info = self.get_json(&info_url, &[]).await?;
        let content = self
            .get_json(&format!("{}/content", info_url), &[])
            .await?;
        parse_article(info, &content)
    }
}

/// Combine the metadata and content responses for one article.
fn parse_article(info: serde_json::Value, content: &serde_json::Value) -> Result<FetchedArticle> {
    let info: ArticleInfo = serde_json::from_value(info).context("invalid article metadata")?;
    let Some(content) = content.get("content").and_then(|c| c.as_str()) else {
        bail!("article content response has no `content` field");
    };
    Ok(FetchedArticle {
        info,
        content: content.to_string(),
    })
}
