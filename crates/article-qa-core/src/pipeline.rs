//! The question-answering pipeline.
//!
//! One call to [`QueryPipeline::answer`] runs these stages strictly in
//! order, with no retries or branching:
//!
//! ```text
//! LoadingCorpus → EmbeddingQuery → Ranking → Packing → Completing → Persisting → Done
//!        └───────────────┴────────────┴─────────┴──────────┴────────────┴──→ Failed
//! ```
//!
//! A failure in any stage aborts the call and returns the originating
//! error unchanged. Nothing is persisted for a failed call.
//!
//! All collaborators are injected at construction, so tests can swap in
//! fakes for the embedder, corpus store, completion model, and query log.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::chunk::DEFAULT_CHARS_PER_TOKEN;
use crate::completion::CompletionProvider;
use crate::embedding::Embedder;
use crate::error::{QaError, Result};
use crate::models::{CompletionChoice, CompletionParams, QueryRecord, RankedContext};
use crate::pack::{pack, PackStatus};
use crate::rank::rank;
use crate::store::{CorpusStore, QueryLog};

/// Instructions used when the caller supplies none.
pub const DEFAULT_INSTRUCTIONS: &str = "The provided contexts are from the indexed articles.\n\
Answer with as much content as you can.\n\
Answer as truthfully as possible, if you're not sure, say \"I don't know\".\n";

/// Extra instruction line added when `cite_sources` is on.
pub const CITATION_INSTRUCTIONS: &str =
    "After the answer, list the CONTEXT_URL and DATE of every context you used.\n";

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadingCorpus,
    EmbeddingQuery,
    Ranking,
    Packing,
    Completing,
    Persisting,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::LoadingCorpus => "loading_corpus",
            Stage::EmbeddingQuery => "embedding_query",
            Stage::Ranking => "ranking",
            Stage::Packing => "packing",
            Stage::Completing => "completing",
            Stage::Persisting => "persisting",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Retrieval and prompt settings for a [`QueryPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Number of top-ranked contexts handed to the packer.
    pub top_k: usize,
    /// Token budget for the context block.
    pub max_context_tokens: usize,
    /// Characters per token used for budget estimates.
    pub chars_per_token: usize,
    /// Instructions block placed before the contexts.
    pub instructions: String,
    /// Ask the model to cite the contexts it used.
    pub cite_sources: bool,
    /// Completion request settings, recorded verbatim in each [`QueryRecord`].
    pub params: CompletionParams,
    /// Append a [`QueryRecord`] to the query log after each answer.
    pub persist: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_context_tokens: 2000,
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            cite_sources: false,
            params: CompletionParams::default(),
            persist: true,
        }
    }
}

/// Result of a successful [`QueryPipeline::answer`] call.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// Text of the first completion choice.
    pub text: String,
    /// Every choice the model returned.
    pub choices: Vec<CompletionChoice>,
    /// Contexts included in the prompt, in packing order.
    pub contexts: Vec<RankedContext>,
    pub pack_status: PackStatus,
    /// Id assigned by the query log, when the answer was persisted.
    pub record_id: Option<String>,
}

/// Orchestrates retrieval, prompt packing, completion, and persistence.
pub struct QueryPipeline {
    corpus: Arc<dyn CorpusStore>,
    embedder: Arc<dyn Embedder>,
    completer: Arc<dyn CompletionProvider>,
    log: Option<Arc<dyn QueryLog>>,
    options: PipelineOptions,
}

impl QueryPipeline {
    pub fn new(
        corpus: Arc<dyn CorpusStore>,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn CompletionProvider>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            corpus,
            embedder,
            completer,
            log: None,
            options,
        }
    }

    /// Attach the sink that receives a [`QueryRecord`] per answer.
    pub fn with_query_log(mut self, log: Arc<dyn QueryLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// Answer `question` from the corpus.
    ///
    /// `instructions` replaces the configured instructions block for this
    /// call only. The question is assumed to be validated and non-empty.
    pub async fn answer(&self, question: &str, instructions: Option<&str>) -> Result<Answer> {
        let mut stage = Stage::LoadingCorpus;
        let result = self.run(question, instructions, &mut stage).await;
        match &result {
            Ok(answer) => info!(
                contexts = answer.contexts.len(),
                choices = answer.choices.len(),
                record_id = answer.record_id.as_deref().unwrap_or("-"),
                "question answered"
            ),
            Err(e) => {
                warn!(stage = %stage, code = e.code(), error = %e, "pipeline failed");
                debug!(stage = %Stage::Failed, "transition");
            }
        }
        result
    }

    async fn run(
        &self,
        question: &str,
        instructions: Option<&str>,
        stage: &mut Stage,
    ) -> Result<Answer> {
        let opts = &self.options;

        enter(stage, Stage::LoadingCorpus);
        let corpus = self.corpus.load().await?;

        enter(stage, Stage::EmbeddingQuery);
        let query_vec = self.embedder.embed(question).await?;

        enter(stage, Stage::Ranking);
        let mut ranked = rank(&query_vec, &corpus);
        debug!(
            corpus = corpus.len(),
            ranked = ranked.len(),
            top = ranked.first().map(|c| c.similarity).unwrap_or(0.0),
            "ranked corpus"
        );
        ranked.truncate(opts.top_k);

        enter(stage, Stage::Packing);
        let mut block = instructions.unwrap_or(&opts.instructions).to_string();
        if opts.cite_sources {
            if !block.is_empty() && !block.ends_with('\n') {
                block.push('\n');
            }
            block.push_str(CITATION_INSTRUCTIONS);
        }
        let packed = pack(
            &ranked,
            opts.max_context_tokens,
            opts.chars_per_token,
            &block,
            question,
        );
        if let PackStatus::BudgetExhausted { dropped } = packed.status {
            debug!(included = packed.included, dropped, "context budget exhausted");
        }
        ranked.truncate(packed.included);

        enter(stage, Stage::Completing);
        let choices = self.completer.complete(&packed.prompt, &opts.params).await?;
        let text = choices
            .first()
            .map(|c| c.text.clone())
            .ok_or_else(|| QaError::CompletionProvider("response contained no choices".into()))?;

        let mut record_id = None;
        if opts.persist {
            if let Some(log) = &self.log {
                enter(stage, Stage::Persisting);
                let record = QueryRecord {
                    query: question.to_string(),
                    contexts: ranked.clone(),
                    response: text.clone(),
                    choices: choices.clone(),
                    parameters: opts.params.clone(),
                };
                record_id = Some(log.append(&record).await?);
            }
        }

        enter(stage, Stage::Done);
        Ok(Answer {
            text,
            choices,
            contexts: ranked,
            pack_status: packed.status,
            record_id,
        })
    }
}

fn enter(current: &mut Stage, next: Stage) {
    debug!(from = %current, to = %next, "transition");
    *current = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArticleInfo, Corpus, CorpusEntry, QuerySummary};
    use crate::store::memory::{InMemoryCorpusStore, InMemoryQueryLog};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Embeds by keyword: "cat" → [1, 0], "dog" → [0, 1], else [1, 1].
    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        fn model_name(&self) -> &str {
            "keyword"
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let t = text.to_lowercase();
            Ok(if t.contains("cat") {
                vec![1.0, 0.0]
            } else if t.contains("dog") {
                vec![0.0, 1.0]
            } else {
                vec![1.0, 1.0]
            })
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "broken"
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(QaError::EmbeddingProvider("connection refused".into()))
        }
    }

    /// Records every prompt and returns fixed choices.
    struct RecordingCompleter {
        prompts: Mutex<Vec<String>>,
        choices: Vec<CompletionChoice>,
    }

    impl RecordingCompleter {
        fn new(answers: &[&str]) -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                choices: answers
                    .iter()
                    .enumerate()
                    .map(|(i, a)| CompletionChoice {
                        text: a.to_string(),
                        index: i as u32,
                        finish_reason: Some("stop".into()),
                    })
                    .collect(),
            }
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl CompletionProvider for RecordingCompleter {
        async fn complete(
            &self,
            prompt: &str,
            _params: &CompletionParams,
        ) -> Result<Vec<CompletionChoice>> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.choices.clone())
        }
    }

    struct FailingCompleter;

    #[async_trait]
    impl CompletionProvider for FailingCompleter {
        async fn complete(
            &self,
            _prompt: &str,
            _params: &CompletionParams,
        ) -> Result<Vec<CompletionChoice>> {
            Err(QaError::CompletionProvider("503 Service Unavailable".into()))
        }
    }

    /// Corpus store whose backing file cannot be read.
    struct UnreadableCorpusStore;

    #[async_trait]
    impl CorpusStore for UnreadableCorpusStore {
        async fn load(&self) -> Result<Corpus> {
            Err(QaError::StorageUnavailable("corpus.json: permission denied".into()))
        }
        async fn save(&self, _corpus: &Corpus) -> Result<()> {
            Err(QaError::StorageUnavailable("corpus.json: permission denied".into()))
        }
        async fn exists(&self) -> Result<bool> {
            Ok(true)
        }
    }

    /// Query log whose database is gone.
    struct UnwritableQueryLog;

    #[async_trait]
    impl QueryLog for UnwritableQueryLog {
        async fn append(&self, _record: &QueryRecord) -> Result<String> {
            Err(QaError::StorageUnavailable("database is locked".into()))
        }
        async fn list(&self, _limit: Option<usize>) -> Result<Vec<QuerySummary>> {
            Ok(Vec::new())
        }
        async fn get(&self, _id: &str) -> Result<Option<QueryRecord>> {
            Ok(None)
        }
    }

    fn pets_corpus() -> Corpus {
        let info = |url: &str| ArticleInfo {
            url: url.to_string(),
            published_at: "2021-06-01".to_string(),
            ..Default::default()
        };
        vec![
            CorpusEntry::new("a", info("https://x/cats"), "cats are great")
                .with_embedding(vec![1.0, 0.0]),
            CorpusEntry::new("b", info("https://x/dogs"), "dogs are great")
                .with_embedding(vec![0.0, 1.0]),
        ]
        .into_iter()
        .collect()
    }

    fn pipeline(
        corpus: Corpus,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn CompletionProvider>,
        log: Arc<InMemoryQueryLog>,
    ) -> QueryPipeline {
        QueryPipeline::new(
            Arc::new(InMemoryCorpusStore::with_corpus(corpus)),
            embedder,
            completer,
            PipelineOptions::default(),
        )
        .with_query_log(log)
    }

    #[tokio::test]
    async fn test_answer_persists_ranked_contexts() {
        let completer = Arc::new(RecordingCompleter::new(&["Cats rule.", "Alt."]));
        let log = Arc::new(InMemoryQueryLog::new());
        let p = pipeline(pets_corpus(), Arc::new(KeywordEmbedder), completer.clone(), log.clone());

        let answer = p.answer("Tell me about cats", None).await.unwrap();
        assert_eq!(answer.text, "Cats rule.");
        assert_eq!(answer.choices.len(), 2);
        assert_eq!(answer.contexts[0].id, "a");
        assert_eq!(answer.contexts[1].id, "b");

        let prompt = completer.last_prompt();
        let cats = prompt.find("cats are great").unwrap();
        let dogs = prompt.find("dogs are great").unwrap();
        assert!(cats < dogs);
        assert!(prompt.contains("CONTEXT_URL: https://x/cats"));
        assert!(prompt.ends_with("Q: Tell me about cats\nA: "));

        let id = answer.record_id.unwrap();
        let record = log.get(&id).await.unwrap().unwrap();
        assert_eq!(record.query, "Tell me about cats");
        assert_eq!(record.contexts, answer.contexts);
        assert_eq!(record.parameters, CompletionParams::default());
    }

    #[tokio::test]
    async fn test_no_embedded_entries_gives_context_free_prompt() {
        let corpus: Corpus = vec![CorpusEntry::new("a", ArticleInfo::default(), "unembedded")]
            .into_iter()
            .collect();
        let completer = Arc::new(RecordingCompleter::new(&["I don't know."]));
        let log = Arc::new(InMemoryQueryLog::new());
        let p = pipeline(corpus, Arc::new(KeywordEmbedder), completer.clone(), log);

        let answer = p.answer("What is X?", Some("Be brief.")).await.unwrap();
        assert!(answer.contexts.is_empty());
        assert_eq!(completer.last_prompt(), "Be brief.\nQ: What is X?\nA: ");
    }

    #[tokio::test]
    async fn test_embedding_failure_persists_nothing() {
        let completer = Arc::new(RecordingCompleter::new(&["unused"]));
        let log = Arc::new(InMemoryQueryLog::new());
        let p = pipeline(pets_corpus(), Arc::new(FailingEmbedder), completer.clone(), log.clone());

        let err = p.answer("cats?", None).await.unwrap_err();
        assert!(matches!(err, QaError::EmbeddingProvider(_)));
        assert!(log.is_empty());
        assert!(completer.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_completion_failure_persists_nothing() {
        let log = Arc::new(InMemoryQueryLog::new());
        let p = pipeline(
            pets_corpus(),
            Arc::new(KeywordEmbedder),
            Arc::new(FailingCompleter),
            log.clone(),
        );
        let err = p.answer("dogs?", None).await.unwrap_err();
        assert!(matches!(err, QaError::CompletionProvider(_)));
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_empty_choices_is_completion_error() {
        let log = Arc::new(InMemoryQueryLog::new());
        let p = pipeline(
            pets_corpus(),
            Arc::new(KeywordEmbedder),
            Arc::new(RecordingCompleter::new(&[])),
            log.clone(),
        );
        let err = p.answer("cats?", None).await.unwrap_err();
        assert!(matches!(err, QaError::CompletionProvider(_)));
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_persist_disabled() {
        let log = Arc::new(InMemoryQueryLog::new());
        let p = QueryPipeline::new(
            Arc::new(InMemoryCorpusStore::with_corpus(pets_corpus())),
            Arc::new(KeywordEmbedder),
            Arc::new(RecordingCompleter::new(&["ok"])),
            PipelineOptions {
                persist: false,
                ..Default::default()
            },
        )
        .with_query_log(log.clone());
        let answer = p.answer("cats?", None).await.unwrap();
        assert!(answer.record_id.is_none());
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_budget_limits_recorded_contexts() {
        let completer = Arc::new(RecordingCompleter::new(&["ok"]));
        let log = Arc::new(InMemoryQueryLog::new());
        let p = QueryPipeline::new(
            Arc::new(InMemoryCorpusStore::with_corpus(pets_corpus())),
            Arc::new(KeywordEmbedder),
            completer.clone(),
            PipelineOptions {
                max_context_tokens: 20,
                cite_sources: true,
                ..Default::default()
            },
        )
        .with_query_log(log.clone());

        let answer = p.answer("cats?", None).await.unwrap();
        assert_eq!(answer.contexts.len(), 1);
        assert_eq!(answer.pack_status, PackStatus::BudgetExhausted { dropped: 1 });
        let prompt = completer.last_prompt();
        assert!(prompt.contains(CITATION_INSTRUCTIONS));
        assert!(!prompt.contains("dogs are great"));
        assert!(prompt.contains("CONTEXT_URL: https://x/dogs"));
        let record = log.get(answer.record_id.as_deref().unwrap()).await.unwrap().unwrap();
        assert_eq!(record.contexts.len(), 1);
        assert_eq!(record.contexts[0].id, "a");
    }

    #[tokio::test]
    async fn test_top_k_slice() {
        let corpus: Corpus = (0..10)
            .map(|i| {
                CorpusEntry::new(format!("e{}", i), ArticleInfo::default(), format!("text {}", i))
                    .with_embedding(vec![1.0, i as f32 * 0.1])
            })
            .collect();
        let log = Arc::new(InMemoryQueryLog::new());
        let p = pipeline(
            corpus,
            Arc::new(KeywordEmbedder),
            Arc::new(RecordingCompleter::new(&["ok"])),
            log,
        );
        let answer = p.answer("cat facts", None).await.unwrap();
        assert_eq!(answer.contexts.len(), 5);
        assert_eq!(answer.contexts[0].id, "e0");
    }

    #[tokio::test]
    async fn test_unreadable_corpus_stops_before_completion() {
        let completer = Arc::new(RecordingCompleter::new(&["unused"]));
        let log = Arc::new(InMemoryQueryLog::new());
        let p = QueryPipeline::new(
            Arc::new(UnreadableCorpusStore),
            Arc::new(KeywordEmbedder),
            completer.clone(),
            PipelineOptions::default(),
        )
        .with_query_log(log.clone());

        let err = p.answer("cats?", None).await.unwrap_err();
        assert!(matches!(err, QaError::StorageUnavailable(_)));
        assert!(completer.prompts.lock().unwrap().is_empty());
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_log_append_failure_is_returned() {
        let completer = Arc::new(RecordingCompleter::new(&["Cats rule."]));
        let p = QueryPipeline::new(
            Arc::new(InMemoryCorpusStore::with_corpus(pets_corpus())),
            Arc::new(KeywordEmbedder),
            completer.clone(),
            PipelineOptions::default(),
        )
        .with_query_log(Arc::new(UnwritableQueryLog));

        match p.answer("cats?", None).await {
            Err(QaError::StorageUnavailable(msg)) => assert_eq!(msg, "database is locked"),
            other => panic!("expected storage error, got {:?}", other),
        }
        assert_eq!(completer.prompts.lock().unwrap().len(), 1);
    }
}
