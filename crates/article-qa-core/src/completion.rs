//! Completion model abstraction.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CompletionChoice, CompletionParams};

/// Sends a packed prompt to a text-completion model.
///
/// Returns the candidate completions in the order the model produced
/// them. Failures surface as
/// [`QaError::CompletionProvider`](crate::error::QaError::CompletionProvider).
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        params: &CompletionParams,
    ) -> Result<Vec<CompletionChoice>>;
}
