use anyhow::{Result, anyhow};
use musli::json;
use musli::{Decode, Encode};
use reqwest::blocking::Client;
use std::io::BufReader;

use super::stream::{StreamEvent, read_stream};
use super::{ChatMessage, Completion, LlmClient, Usage};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug, Encode, Decode)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Encode)]
struct OllamaChatRequest {
    model: String,
    stream: bool,
    messages: Vec<OllamaMessage>,
}

#[derive(Debug, Decode)]
struct OllamaStreamResponse {
    #[musli(default)]
    message: Option<OllamaMessage>,
    #[musli(default)]
    done: Option<bool>,
    #[musli(default)]
    prompt_eval_count: Option<u32>,
    #[musli(default)]
    eval_count: Option<u32>,
}

/// Synchronous Ollama client using /api/chat.
pub struct OllamaClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .build()
            .map_err(|e| anyhow!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }
}

fn parse_stream_line(line: &str) -> Result<Option<StreamEvent>> {
    let parsed: OllamaStreamResponse =
        json::from_str(line).map_err(|e| anyhow!("Failed to decode Ollama stream JSON: {e}"))?;

    if parsed.done.unwrap_or(false) {
        let prompt_tokens = parsed.prompt_eval_count.unwrap_or(0);
        let completion_tokens = parsed.eval_count.unwrap_or(0);
        return Ok(Some(StreamEvent::Usage(Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        })));
    }

    Ok(parsed
        .message
        .filter(|m| !m.content.is_empty())
        .map(|m| StreamEvent::Delta(m.content)))
}

impl LlmClient for OllamaClient {
    fn stream_chat(
        &self,
        messages: &[ChatMessage],
        on_delta: &mut dyn FnMut(&str) -> Result<()>,
    ) -> Result<Completion> {
        let req_body = OllamaChatRequest {
            model: self.model.clone(),
            stream: true,
            messages: messages
                .iter()
                .map(|m| OllamaMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
        };

        let body_str = json::to_string(&req_body)
            .map_err(|e| anyhow!("Failed to encode Ollama JSON request: {e}"))?;

        log::trace!("Ollama request body: {body_str}");
        log::info!("Streaming Ollama model {:?}", &self.model);

        let url = format!("{}/api/chat", self.base_url);

        let resp = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body_str)
            .send()
            .map_err(|e| anyhow!("Error calling Ollama at {url}: {e}"))?
            .error_for_status()
            .map_err(|e| anyhow!("Ollama HTTP error from {url}: {e}"))?;

        let reader = BufReader::new(resp);
        let completion = read_stream(reader, parse_stream_line, on_delta)?;

        if let Some(usage) = &completion.usage {
            log::info!(
                "Token usage: prompt={}, completion={}, total={}",
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens
            );
        }

        Ok(completion)
    }
}
