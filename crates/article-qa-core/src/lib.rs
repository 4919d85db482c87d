//! # article-qa core
//!
//! Pure retrieval-and-prompt-assembly logic for article-qa: corpus models,
//! fixed-window chunking, cosine ranking, token-budgeted prompt packing,
//! and the query pipeline that ties them together.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or HTTP clients.
//! Every external collaborator (corpus storage, embedding model,
//! completion model, query log) is a trait that the application crate
//! implements and injects into [`pipeline::QueryPipeline`].

pub mod chunk;
pub mod completion;
pub mod embedding;
pub mod error;
pub mod models;
pub mod pack;
pub mod pipeline;
pub mod rank;
pub mod store;

pub use error::{QaError, Result};
