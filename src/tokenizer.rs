use crate::providers::openai::Message;

/// Token counting seam. The gateway only needs a count per (text, encoding
/// family); the actual encoder is supplied by the embedder.
pub trait Tokenizer {
    fn count_tokens(&self, text: &str, model_family: &str) -> usize;
}

/// Encoding family for a model name. Everything the upstream serves today
/// bills against cl100k_base; newer `gpt-4o`/`o1` ids use o200k_base.
pub fn model_family(model: &str) -> &'static str {
    if model.starts_with("gpt-4o") || model.starts_with("o1") {
        "o200k_base"
    } else {
        "cl100k_base"
    }
}

/// Prompt text for usage accounting: all inbound message contents, in order.
pub fn prompt_text(messages: &[Message]) -> String {
    messages.iter().map(|m| m.content.as_str()).collect()
}

/// Fallback counter when no real encoder is wired in: one token per four
/// characters, rounded up. Tracks cl100k_base within ~20% on English text.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatingTokenizer;

impl Tokenizer for EstimatingTokenizer {
    fn count_tokens(&self, text: &str, _model_family: &str) -> usize {
        text.chars().count().div_ceil(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_is_zero_for_empty_text() {
        assert_eq!(EstimatingTokenizer.count_tokens("", "cl100k_base"), 0);
    }

    #[test]
    fn estimate_rounds_up() {
        assert_eq!(EstimatingTokenizer.count_tokens("hi", "cl100k_base"), 1);
        assert_eq!(EstimatingTokenizer.count_tokens("hello", "cl100k_base"), 2);
    }

    #[test]
    fn prompt_text_concatenates_in_order() {
        let messages = vec![
            Message {
                role: "system".into(),
                content: "be brief".into(),
            },
            Message {
                role: "user".into(),
                content: "hi".into(),
            },
        ];
        assert_eq!(prompt_text(&messages), "be briefhi");
    }

    #[test]
    fn family_defaults_to_cl100k() {
        assert_eq!(model_family("GPT-4"), "cl100k_base");
        assert_eq!(model_family("gpt-4o-mini"), "o200k_base");
    }
}
