use anyhow::{Result, anyhow};
use log::debug;

use crate::config::{Config, Provider};
use crate::llm::LlmClient;
use crate::llm::noop::NoopClient;
use crate::llm::ollama::OllamaClient;
use crate::llm::openai::OpenAiClient;
use crate::tokens::TokenAccountant;

/// Build the LLM client based on CLI + config.
pub fn build_llm_client(cfg: &Config) -> Result<Box<dyn LlmClient>> {
    if cfg.no_model {
        debug!("Using NoopClient (no model calls)");
        return Ok(Box::new(NoopClient::new(TokenAccountant::for_model(&cfg.model)?)));
    }

    match cfg.provider {
        Provider::OpenAi => {
            let key = cfg
                .api_key
                .clone()
                .ok_or_else(|| anyhow!("$OPENAI_API_KEY is not set"))?;
            debug!("Using OpenAiClient with model {} at {}", cfg.model, cfg.base_url);
            Ok(Box::new(OpenAiClient::new(key, cfg.model.clone(), cfg.base_url.clone())?))
        }
        Provider::Ollama => {
            debug!("Using OllamaClient with model {} at {}", cfg.model, cfg.base_url);
            Ok(Box::new(OllamaClient::new(cfg.base_url.clone(), cfg.model.clone())?))
        }
    }
}
