use anyhow::{Result, anyhow};
use clap::ValueEnum;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::cli_args::Cli;
use crate::llm::prompt_builder::DEFAULT_MAX_TOKENS;
use crate::llm::{ollama, openai};

pub const DEFAULT_MODEL: &str = "gpt-4o-2024-08-06";

/// Which chat backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[value(name = "openai")]
    OpenAi,
    Ollama,
}

impl Provider {
    fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => openai::DEFAULT_BASE_URL,
            Provider::Ollama => ollama::DEFAULT_BASE_URL,
        }
    }
}

/// Where the value of `--openai-key` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    Flag,
    Env,
    Absent,
}

/// Final resolved configuration for commitsmith.
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: Provider,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub max_tokens: usize,
    pub no_model: bool,
}

impl Config {
    /// Build the final config from CLI flags, environment, TOML file, and defaults.
    ///
    /// Precedence:
    ///   1. CLI flags (`--model`, `--provider`, ...)
    ///   2. Env vars `COMMITSMITH_MODEL`, `COMMITSMITH_PROVIDER`, `COMMITSMITH_BASE_URL`
    ///   3. TOML `~/.config/commitsmith.toml`
    ///   4. Hardcoded defaults
    ///
    /// The API key is the exception: a key saved with `--save-key` beats
    /// `$OPENAI_API_KEY`, and only an explicit `--openai-key` beats the saved key.
    pub fn from_sources(
        cli: &Cli,
        key_origin: KeyOrigin,
        saved_key: Option<String>,
    ) -> Result<Self> {
        let file_cfg = load_file_config().unwrap_or_default();
        resolve(cli, |name| env::var(name).ok(), file_cfg, key_origin, saved_key)
    }
}

fn resolve(
    cli: &Cli,
    env: impl Fn(&str) -> Option<String>,
    file_cfg: FileConfig,
    key_origin: KeyOrigin,
    saved_key: Option<String>,
) -> Result<Config> {
    let provider = match cli.provider {
        Some(p) => p,
        None => match env("COMMITSMITH_PROVIDER") {
            Some(raw) => Provider::from_str(raw.trim(), true)
                .map_err(|_| anyhow!("unknown provider {raw:?} in $COMMITSMITH_PROVIDER"))?,
            None => file_cfg.provider.unwrap_or(Provider::OpenAi),
        },
    };

    let model = cli
        .model
        .clone()
        .or_else(|| env("COMMITSMITH_MODEL"))
        .or(file_cfg.model)
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let base_url = cli
        .base_url
        .clone()
        .or_else(|| env("COMMITSMITH_BASE_URL"))
        .or(file_cfg.base_url)
        .unwrap_or_else(|| provider.default_base_url().to_string());

    let max_tokens = cli
        .max_tokens
        .or(file_cfg.max_tokens)
        .unwrap_or(DEFAULT_MAX_TOKENS);

    let api_key = resolve_api_key(
        non_empty(cli.openai_key.clone()),
        key_origin,
        non_empty(saved_key),
        non_empty(file_cfg.openai_api_key),
    );

    let no_model = cli.no_model || model.eq_ignore_ascii_case("none");

    Ok(Config {
        provider,
        model,
        api_key,
        base_url,
        max_tokens,
        no_model,
    })
}

fn resolve_api_key(
    cli_key: Option<String>,
    origin: KeyOrigin,
    saved: Option<String>,
    file: Option<String>,
) -> Option<String> {
    match (cli_key, saved) {
        (Some(key), _) if origin == KeyOrigin::Flag => Some(key),
        (_, Some(saved)) => Some(saved),
        (Some(key), None) => Some(key),
        (None, None) => file,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    pub provider: Option<Provider>,
    /// Default model to use when not provided via CLI or env.
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: Option<usize>,
    pub openai_api_key: Option<String>,
}

/// Return `~/.config/commitsmith.toml`
fn config_path() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    Some(home.join(".config").join("commitsmith.toml"))
}

fn load_file_config() -> Option<FileConfig> {
    let path = config_path()?;
    if !path.exists() {
        return None;
    }

    let data = fs::read_to_string(&path).ok()?;
    match toml::from_str::<FileConfig>(&data) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            log::warn!("ignoring {}: {e}", path.display());
            None
        }
    }
}
