//! Token-budgeted prompt packing.
//!
//! Greedily concatenates ranked contexts, each followed by a citation
//! line, until the approximate token count would exceed the budget.
//! Token counts are approximated as `characters / chars_per_token`, and
//! the same ratio is used for the stop check and the truncation slice.
//!
//! # Algorithm
//!
//! 1. `budget = max_tokens × chars_per_token` characters.
//! 2. For each context, in the given order, form
//!    `candidate = text + citation`.
//! 3. If `running + len(candidate) > budget`, append the triggering
//!    context's citation only, and stop. The accumulated block needs no
//!    truncation: step 4 only appends candidates that fit, so it is
//!    already within `budget` characters.
//! 4. Otherwise append the candidate and continue.
//!
//! The packed block therefore never exceeds `budget` characters plus one
//! citation suffix. Packing is pure: identical inputs give byte-identical
//! output.

use serde::Serialize;

use crate::models::{ArticleInfo, RankedContext};

/// Whether every provided context made it into the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PackStatus {
    /// All contexts were included.
    Complete,
    /// Packing stopped at the budget; `dropped` contexts were left out.
    BudgetExhausted { dropped: usize },
}

/// The context block produced by [`pack_contexts`].
#[derive(Debug, Clone, PartialEq)]
pub struct PackedContexts {
    pub text: String,
    /// Number of leading contexts whose full text was included.
    pub included: usize,
    pub status: PackStatus,
}

/// A complete prompt ready for the completion model.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedPrompt {
    pub prompt: String,
    pub included: usize,
    pub status: PackStatus,
}

/// Citation suffix appended after each context.
pub fn citation(info: &ArticleInfo) -> String {
    format!(
        "\n\nCONTEXT_URL: {}\nDATE: {}\n\n",
        info.url, info.published_at
    )
}

/// Pack `contexts` into a single block of at most `max_tokens` tokens.
pub fn pack_contexts(
    contexts: &[RankedContext],
    max_tokens: usize,
    chars_per_token: usize,
) -> PackedContexts {
    let budget = max_tokens.saturating_mul(chars_per_token);
    let mut text = String::new();
    let mut running = 0usize;

    for (i, ctx) in contexts.iter().enumerate() {
        let cite = citation(&ctx.metadata);
        let candidate_len = ctx.text.chars().count() + cite.chars().count();

        if running + candidate_len > budget {
            text.push_str(&cite);
            return PackedContexts {
                text,
                included: i,
                status: PackStatus::BudgetExhausted {
                    dropped: contexts.len() - i,
                },
            };
        }

        text.push_str(&ctx.text);
        text.push_str(&cite);
        running += candidate_len;
    }

    PackedContexts {
        text,
        included: contexts.len(),
        status: PackStatus::Complete,
    }
}

/// Assemble the final prompt: instructions, optional context block, question.
///
/// The `Context:` section is left out entirely when `context_block` is empty.
pub fn build_prompt(instructions: &str, context_block: &str, question: &str) -> String {
    let instructions = instructions.trim_end();
    if context_block.is_empty() {
        format!("{}\nQ: {}\nA: ", instructions, question)
    } else {
        format!(
            "{}\nContext:\n{}\nQ: {}\nA: ",
            instructions, context_block, question
        )
    }
}

/// Pack contexts and assemble the prompt in one step.
pub fn pack(
    contexts: &[RankedContext],
    max_tokens: usize,
    chars_per_token: usize,
    instructions: &str,
    question: &str,
) -> PackedPrompt {
    let packed = pack_contexts(contexts, max_tokens, chars_per_token);
    PackedPrompt {
        prompt: build_prompt(instructions, &packed.text, question),
        included: packed.included,
        status: packed.status,
    }
}
