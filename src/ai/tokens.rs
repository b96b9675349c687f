//! Token counting for providers that do not report usage.
//!
//! Uses the model's own BPE when `tiktoken-rs` knows the model, otherwise
//! `cl100k_base`. If no encoding can be loaded the count is zero.

use tiktoken_rs::CoreBPE;

/// Generic encoding used for unrecognized models.
pub const FALLBACK_ENCODING: &str = "cl100k_base";

fn bpe_for_model(model: &str) -> Option<CoreBPE> {
    match tiktoken_rs::get_bpe_from_model(model) {
        Ok(bpe) => Some(bpe),
        Err(_) => {
            tracing::debug!(model, "Unknown model for tokenizer, using {FALLBACK_ENCODING}");
            tiktoken_rs::cl100k_base()
                .inspect_err(|e| tracing::warn!(error = %e, "Tokenizer unavailable"))
                .ok()
        }
    }
}

/// Count the tokens of `text` as `model` would see them.
#[must_use]
pub fn count_tokens(text: &str, model: &str) -> u64 {
    if text.is_empty() {
        return 0;
    }
    bpe_for_model(model).map_or(0, |bpe| {
        u64::try_from(bpe.encode_with_special_tokens(text).len()).unwrap_or(u64::MAX)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_is_zero() {
        assert_eq!(count_tokens("", "gpt-4o-mini"), 0);
    }

    #[test]
    fn test_known_model_uses_its_encoding() {
        let text = "Refactoring authentication middleware, deployment pipeline broken.";
        let o200k = tiktoken_rs::o200k_base().unwrap();
        assert_eq!(
            count_tokens(text, "gpt-4o-mini"),
            o200k.encode_with_special_tokens(text).len() as u64
        );
    }

    #[test]
    fn test_unknown_model_falls_back_to_cl100k() {
        let text = "Fix the failing test in the parser.";
        let cl100k = tiktoken_rs::cl100k_base().unwrap();
        assert_eq!(
            count_tokens(text, "qwen2.5-coder"),
            cl100k.encode_with_special_tokens(text).len() as u64
        );
    }

    #[test]
    fn test_common_words_are_single_tokens() {
        assert_eq!(count_tokens("hello world", "gpt-4o-mini"), 2);
        assert_eq!(count_tokens("hello world", "gpt-4"), 2);
    }
}
