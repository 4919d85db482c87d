//! Wiring for the query pipeline and the `aqa ask` command.
//!
//! [`build_pipeline`] assembles a [`QueryPipeline`] from configuration:
//! the JSON corpus file, the configured embedding and completion
//! providers, and (when persistence is on) the SQLite query log.

use anyhow::{bail, Result};
use sqlx::SqlitePool;
use std::sync::Arc;

use article_qa_core::pack::PackStatus;
use article_qa_core::pipeline::{PipelineOptions, QueryPipeline};

use crate::completion::create_completer;
use crate::config::Config;
use crate::corpus_file::JsonFileCorpusStore;
use crate::db;
use crate::embedding::create_embedder;
use crate::history::SqliteQueryLog;
use crate::migrate;

/// Longest accepted question, in characters.
pub const MAX_QUESTION_CHARS: usize = 200;
/// Longest accepted per-request instructions, in characters.
pub const MAX_CONTEXT_CHARS: usize = 200;

/// Check a question and optional instructions before they reach the pipeline.
pub fn validate_question(question: &str, context: Option<&str>) -> Result<(), String> {
    if question.trim().is_empty() {
        return Err("question must not be empty".to_string());
    }
    if question.chars().count() > MAX_QUESTION_CHARS {
        return Err(format!(
            "question must be at most {} characters",
            MAX_QUESTION_CHARS
        ));
    }
    if let Some(context) = context {
        if context.chars().count() > MAX_CONTEXT_CHARS {
            return Err(format!(
                "context must be at most {} characters",
                MAX_CONTEXT_CHARS
            ));
        }
    }
    Ok(())
}

/// A pipeline plus the database pool backing its query log, if any.
pub struct PipelineHandle {
    pub pipeline: QueryPipeline,
    pub pool: Option<SqlitePool>,
}

impl PipelineHandle {
    pub async fn close(self) {
        if let Some(pool) = self.pool {
            pool.close().await;
        }
    }
}

/// Assemble the query pipeline described by `config`.
///
/// With `persist` off (in config or via `no_persist`) no database is
/// opened and answers are not recorded.
pub async fn build_pipeline(config: &Config, no_persist: bool) -> Result<PipelineHandle> {
    let mut options = config.pipeline_options();
    if no_persist {
        options.persist = false;
    }

    let persist = options.persist;
    let mut pipeline = pipeline_from_config(config, options)?;
    let mut pool = None;
    if persist {
        let p = db::connect(config).await?;
        migrate::apply(&p).await?;
        pipeline = pipeline.with_query_log(Arc::new(SqliteQueryLog::new(p.clone())));
        pool = Some(p);
    }

    Ok(PipelineHandle { pipeline, pool })
}

/// Pipeline over the configured corpus file and providers, without a query log.
pub fn pipeline_from_config(config: &Config, options: PipelineOptions) -> Result<QueryPipeline> {
    let corpus = Arc::new(JsonFileCorpusStore::new(&config.corpus.path));
    let embedder = create_embedder(&config.embedding)?;
    let completer = create_completer(&config.completion)?;
    Ok(QueryPipeline::new(corpus, embedder, completer, options))
}

/// `aqa ask`: answer one question and print the result.
pub async fn run_ask(
    config: &Config,
    question: &str,
    instructions: Option<&str>,
    no_persist: bool,
) -> Result<()> {
    if let Err(msg) = validate_question(question, instructions) {
        bail!(msg);
    }

    let handle = build_pipeline(config, no_persist).await?;
    let result = handle.pipeline.answer(question, instructions).await;
    handle.close().await;
    let answer = result?;

    println!("{}", answer.text.trim());
    println!();
    if answer.contexts.is_empty() {
        println!("sources: none");
    } else {
        println!("sources:");
        for ctx in &answer.contexts {
            let label = if ctx.metadata.url.is_empty() {
                ctx.id.as_str()
            } else {
                ctx.metadata.url.as_str()
            };
            println!("  {:.3}  {}", ctx.similarity, label);
        }
    }
    if let PackStatus::BudgetExhausted { dropped } = answer.pack_status {
        println!("  ({} more contexts dropped by the token budget)", dropped);
    }
    if let Some(id) = &answer.record_id {
        println!("recorded: {}", id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_question() {
        assert!(validate_question("What is staking?", None).is_ok());
        assert!(validate_question("   ", None)
            .unwrap_err()
            .contains("must not be empty"));
        assert!(validate_question(&"q".repeat(201), None).is_err());
        assert!(validate_question(&"é".repeat(200), None).is_ok());
        assert!(validate_question("ok", Some(&"c".repeat(201)))
            .unwrap_err()
            .contains("context"));
    }
}
