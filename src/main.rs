mod cli_args;
mod config;
mod credentials;
mod error;
mod git;
mod llm;
mod logging;
mod output;
mod setup;
mod tokens;

use std::env;
use std::process;

use anyhow::{Context, Result, anyhow, bail};
use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches};
use log::{debug, info};

use crate::cli_args::{Cli, Command};
use crate::config::{Config, KeyOrigin};
use crate::credentials::KeyStore;
use crate::git::{GitCli, Vcs};
use crate::llm::prompt_builder::PromptBuilder;
use crate::llm::{ChatMessage, Completion, LlmClient};
use crate::tokens::TokenAccountant;

fn main() {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    logging::init_logger(cli.verbose);

    if let Err(err) = run(&cli, &matches) {
        output::print_error(&err);
        process::exit(1);
    }
}

fn run(cli: &Cli, matches: &ArgMatches) -> Result<()> {
    if let Some(Command::Version) = cli.command {
        println!("commitsmith {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let store = KeyStore::default_location()?;

    if cli.save_key {
        let path = store.save(cli.openai_key.as_deref().unwrap_or_default())?;
        println!("Saved OpenAI API key to {}", path.display());
        return Ok(());
    }

    let cfg = Config::from_sources(cli, key_origin(matches), store.load()?)?;
    debug!(
        "Resolved config: provider={:?} model={} max_tokens={}",
        cfg.provider, cfg.model, cfg.max_tokens
    );

    let llm = setup::build_llm_client(&cfg)?;

    let workdir = env::current_dir().context("failed to read the current directory")?;
    let vcs = GitCli::new(workdir);

    match &cli.command {
        Some(Command::Lint { message }) => {
            run_lint(cli, &cfg, &vcs, llm.as_ref(), message.as_deref())
        }
        _ => run_commit(cli, &cfg, &vcs, llm.as_ref()),
    }
}

/// Whether `--openai-key` was typed or filled in from `$OPENAI_API_KEY`.
fn key_origin(matches: &ArgMatches) -> KeyOrigin {
    // Global args are propagated to the innermost subcommand.
    let mut m = matches;
    while let Some((_, sub)) = m.subcommand() {
        m = sub;
    }

    match m.value_source("openai_key") {
        Some(ValueSource::EnvVariable) => KeyOrigin::Env,
        Some(_) => KeyOrigin::Flag,
        None => KeyOrigin::Absent,
    }
}

fn run_commit(cli: &Cli, cfg: &Config, vcs: &GitCli, llm: &dyn LlmClient) -> Result<()> {
    if cli.reference.is_some() && cli.amend {
        bail!("cannot use both [ref] and --amend");
    }

    let target = if cli.amend {
        let head = vcs
            .head_commit()?
            .ok_or_else(|| anyhow!("no commit to amend"))?;
        Some(head)
    } else if let Some(reference) = &cli.reference {
        let hash = vcs
            .resolve_ref(reference)
            .with_context(|| format!("failed to resolve {reference:?}"))?;
        Some(hash)
    } else {
        None
    };

    let messages = PromptBuilder::new(vcs, TokenAccountant::for_model(&cfg.model)?)
        .max_tokens(cfg.max_tokens)
        .home_dir(dirs::home_dir())
        .context(cli.context.clone())
        .build(target.as_deref(), cli.amend)?;

    let completion = stream_to_terminal(llm, &messages, "Generating commit message...")?;
    let message = output::clean_message(&completion.text);
    if message.is_empty() {
        bail!("the model returned an empty commit message");
    }

    let args = git::commit_args(&message, cli.amend);

    if cli.dry_run {
        println!("Run the following command to commit:");
        println!("{}", git::format_shell_command("git", &args));
        return Ok(());
    }

    if cli.reference.is_some() {
        info!("Not committing: message was generated for an existing commit");
        return Ok(());
    }

    println!();
    git::run_commit(vcs.workdir(), &message, cli.amend)
}

fn run_lint(
    cli: &Cli,
    cfg: &Config,
    vcs: &GitCli,
    llm: &dyn LlmClient,
    message: Option<&str>,
) -> Result<()> {
    let message = match message {
        Some(message) => message.to_string(),
        None => {
            let head = vcs
                .head_commit()?
                .ok_or_else(|| anyhow!("no commits to lint"))?;
            vcs.recent_commits(&head, 1)?
                .into_iter()
                .next()
                .map(|commit| commit.message)
                .ok_or_else(|| anyhow!("no commits to lint"))?
        }
    };

    let messages = PromptBuilder::new(vcs, TokenAccountant::for_model(&cfg.model)?)
        .max_tokens(cfg.max_tokens)
        .home_dir(dirs::home_dir())
        .context(cli.context.clone())
        .build_lint(&message)?;

    stream_to_terminal(llm, &messages, "Checking commit message...")?;
    Ok(())
}

/// Stream the reply to stdout, showing a spinner until the first chunk.
fn stream_to_terminal(
    llm: &dyn LlmClient,
    messages: &[ChatMessage],
    waiting: &str,
) -> Result<Completion> {
    let spinner = output::spinner(waiting)?;

    let result = llm.stream_chat(messages, &mut |chunk: &str| {
        if !spinner.is_finished() {
            spinner.finish_and_clear();
        }
        output::print_delta(chunk)
    });
    spinner.finish_and_clear();

    let completion = result?;
    println!();

    if let Some(usage) = completion.usage {
        debug!(
            "Token usage: prompt={} completion={} total={}",
            usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
        );
    }
    Ok(completion)
}
