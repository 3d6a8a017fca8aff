use anyhow::Result;

use super::{ChatMessage, Completion, LlmClient, Usage};
use crate::tokens::TokenAccountant;

/// No-op / dummy model client for development with --no-model or model=none.
pub struct NoopClient {
    tokens: TokenAccountant,
}

impl NoopClient {
    pub fn new(tokens: TokenAccountant) -> Self {
        NoopClient { tokens }
    }
}

impl LlmClient for NoopClient {
    fn stream_chat(
        &self,
        messages: &[ChatMessage],
        on_delta: &mut dyn FnMut(&str) -> Result<()>,
    ) -> Result<Completion> {
        let roles = messages
            .iter()
            .map(|m| m.role.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let prompt_tokens = self.tokens.count(messages);

        let text = format!(
            "Dummy commit message (LLM disabled)\n\nPrompt: {} messages [{}], {} tokens ({})",
            messages.len(),
            roles,
            prompt_tokens,
            self.tokens.encoding().as_str()
        );
        on_delta(&text)?;

        let prompt_tokens = u32::try_from(prompt_tokens).unwrap_or(u32::MAX);
        let completion_tokens = u32::try_from(self.tokens.count_text(&text)).unwrap_or(u32::MAX);
        let usage = Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        };

        Ok(Completion {
            text,
            usage: Some(usage),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::Encoding;

    #[test]
    fn describes_the_prompt_it_was_given() {
        let tokens = TokenAccountant::new(Encoding::Cl100kBase).unwrap();
        let msgs = vec![ChatMessage::system("rules"), ChatMessage::user("hello world")];
        let expected_tokens = tokens.count(&msgs);

        let mut streamed = String::new();
        let out = NoopClient::new(tokens)
            .stream_chat(&msgs, &mut |d| {
                streamed.push_str(d);
                Ok(())
            })
            .unwrap();

        assert!(out.text.ends_with(&format!(
            "Prompt: 2 messages [system, user], {expected_tokens} tokens (cl100k_base)"
        )));
        assert_eq!(streamed, out.text);

        let usage = out.usage.unwrap();
        assert_eq!(usage.prompt_tokens as usize, expected_tokens);
        assert_eq!(usage.total_tokens, usage.prompt_tokens + usage.completion_tokens);
    }
}
