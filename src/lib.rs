//! # Article QA
//!
//! Retrieval-augmented question answering over a corpus of articles.
//!
//! Articles are pulled from a publication into a JSON corpus file, split
//! into token-sized chunks and embedded. A question is embedded the same
//! way, ranked against the corpus by cosine similarity, and the best
//! passages are packed into a token-budgeted prompt for a completion
//! model. Every answer can be recorded in SQLite for later review.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌─────────────┐
//! │   Source    │──▶│ corpus.json  │──▶│ Chunk+Embed │
//! │  (Medium)   │   │              │◀──│             │
//! └─────────────┘   └──────┬───────┘   └─────────────┘
//!                          │
//!                          ▼
//!   question ──▶ embed ──▶ rank ──▶ pack ──▶ complete ──▶ SQLite log
//!                          │
//!                 ┌────────┴─────────┐
//!                 ▼                  ▼
//!            ┌──────────┐       ┌──────────┐
//!            │   CLI    │       │   HTTP   │
//!            │  (aqa)   │       │  (axum)  │
//!            └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! aqa init                      # create database
//! aqa sync                      # fetch new articles
//! aqa embed pending             # chunk and embed them
//! aqa ask "What is staking?"
//! aqa serve                     # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`corpus_file`] | JSON file corpus store |
//! | [`ingest`] | Paginated article sync |
//! | [`connector_medium`] | Medium (RapidAPI) article source |
//! | [`embed_cmd`] | Embedding backfill |
//! | [`embedding`] | Embedding providers |
//! | [`completion`] | Completion providers |
//! | [`ask`] | Pipeline wiring and the `ask` command |
//! | [`history`] | SQLite query log |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//!
//! The retrieval algorithms themselves live in the `article-qa-core` crate.

pub mod ask;
pub mod completion;
pub mod config;
pub mod connector_medium;
pub mod corpus_file;
pub mod db;
pub mod embed_cmd;
pub mod embedding;
pub mod history;
mod http;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod server;
