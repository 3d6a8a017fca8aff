//! Exact token accounting with a byte-pair-encoding tokenizer.
//!
//! Budgets are enforced against the model's hard context limit, so counts
//! come from the real BPE and never from a character heuristic.

use thiserror::Error;
use tiktoken_rs::CoreBPE;

use crate::llm::ChatMessage;

/// Marker appended to text that was cut short.
pub const ELLIPSIS: &str = "...";

/// The BPE vocabularies we know how to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Cl100kBase,
    O200kBase,
}

impl Encoding {
    /// Pick the vocabulary a model was trained with. Unknown models,
    /// including local ones, fall back to `cl100k_base`.
    pub fn for_model(model: &str) -> Self {
        let model = model.to_ascii_lowercase();
        let o200k_families = ["gpt-4o", "gpt-4.1", "gpt-5", "chatgpt-4o", "o1", "o3", "o4"];
        if o200k_families.iter().any(|f| model.starts_with(f)) {
            Encoding::O200kBase
        } else {
            Encoding::Cl100kBase
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Cl100kBase => "cl100k_base",
            Encoding::O200kBase => "o200k_base",
        }
    }
}

#[derive(Debug, Error)]
#[error("failed to initialize {encoding} tokenizer: {reason}")]
pub struct TokenizerError {
    encoding: &'static str,
    reason: String,
}

/// Measures and trims text in tokens.
pub struct TokenAccountant {
    bpe: CoreBPE,
    encoding: Encoding,
}

impl TokenAccountant {
    pub fn new(encoding: Encoding) -> Result<Self, TokenizerError> {
        let bpe = match encoding {
            Encoding::Cl100kBase => tiktoken_rs::cl100k_base(),
            Encoding::O200kBase => tiktoken_rs::o200k_base(),
        }
        .map_err(|e| TokenizerError {
            encoding: encoding.as_str(),
            reason: e.to_string(),
        })?;

        log::trace!("loaded {} tokenizer", encoding.as_str());
        Ok(TokenAccountant { bpe, encoding })
    }

    pub fn for_model(model: &str) -> Result<Self, TokenizerError> {
        Self::new(Encoding::for_model(model))
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn count_text(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Sum of the content tokens of every message. Additive over
    /// concatenation; role framing is not counted.
    pub fn count(&self, messages: &[ChatMessage]) -> usize {
        messages.iter().map(|m| self.count_text(&m.content)).sum()
    }

    pub fn ellipsis_cost(&self) -> usize {
        self.count_text(ELLIPSIS)
    }

    /// Return `text` unchanged if it fits in `max_tokens`, otherwise its
    /// first `max_tokens` tokens followed by [`ELLIPSIS`].
    pub fn truncate(&self, text: &str, max_tokens: usize) -> String {
        self.cut(text, max_tokens, max_tokens, |_| true)
    }

    /// Like [`truncate`](Self::truncate), but the result including the
    /// marker never measures more than `budget` tokens.
    pub fn fit(&self, text: &str, budget: usize) -> String {
        let start = budget.saturating_sub(self.ellipsis_cost());
        self.cut(text, budget, start, |out| self.count_text(out) <= budget)
    }

    /// A cut can land inside a multi-byte character. Such a prefix does not
    /// decode, so it is shortened token by token until it does and `accept`
    /// agrees.
    fn cut(&self, text: &str, limit: usize, start: usize, accept: impl Fn(&str) -> bool) -> String {
        let tokens = self.bpe.encode_ordinary(text);
        if tokens.len() <= limit {
            return text.to_owned();
        }

        let mut end = start.min(tokens.len());
        loop {
            if let Ok(prefix) = self.bpe.decode(tokens[..end].to_vec()) {
                let out = format!("{prefix}{ELLIPSIS}");
                if end == 0 || accept(&out) {
                    return out;
                }
            }
            if end == 0 {
                return ELLIPSIS.to_owned();
            }
            end -= 1;
        }
    }
}
