use clap::{ArgAction, ArgGroup, Parser, Subcommand};

use crate::config::Provider;

/// CLI options
#[derive(Parser, Debug)]
#[command(
    name = "commitsmith",
    version,
    about = "LLM-assisted Git commit message generator"
)]
#[command(group(
    ArgGroup::new("model_group")
        .args(["model", "no_model"])
        .multiple(false)
))]
pub struct Cli {
    /// Generate a message for this commit instead of the staged changes (never commits)
    #[arg(value_name = "REF")]
    pub reference: Option<String>,

    /// The OpenAI API key to use
    #[arg(
        long = "openai-key",
        visible_alias = "api-key",
        env = "OPENAI_API_KEY",
        hide_env_values = true,
        global = true
    )]
    pub openai_key: Option<String>,

    /// Model name to use (e.g. gpt-4o-mini). If 'none', acts like --no-model.
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Disable model calls; return dummy responses instead
    #[arg(long, global = true)]
    pub no_model: bool,

    /// Chat backend to talk to
    #[arg(long, value_enum, global = true)]
    pub provider: Option<Provider>,

    /// Base URL of the chat backend
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Token budget for the whole prompt
    #[arg(long, global = true)]
    pub max_tokens: Option<usize>,

    /// Save the OpenAI API key to persistent local configuration and exit
    #[arg(long)]
    pub save_key: bool,

    /// Print the git command instead of committing
    #[arg(short = 'd', long = "dry")]
    pub dry_run: bool,

    /// Amend the last commit
    #[arg(short, long)]
    pub amend: bool,

    /// Extra context beyond the diff to consider (repeatable)
    #[arg(short, long, global = true)]
    pub context: Vec<String>,

    /// Increase log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands, e.g. `commitsmith lint`
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check a commit message against the repository style guide
    Lint {
        /// Message to check; defaults to the message of HEAD
        message: Option<String>,
    },

    /// Print build version information
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_commit_flags() {
        let cli = Cli::try_parse_from([
            "commitsmith",
            "-d",
            "--amend",
            "-c",
            "Closes #12",
            "-c",
            "Reviewed in standup",
            "-vv",
        ])
        .unwrap();

        assert!(cli.dry_run);
        assert!(cli.amend);
        assert_eq!(cli.context, ["Closes #12", "Reviewed in standup"]);
        assert_eq!(cli.verbose, 2);
        assert!(cli.reference.is_none());
    }

    #[test]
    fn positional_ref_and_lint_subcommand() {
        let cli = Cli::try_parse_from(["commitsmith", "HEAD~2"]).unwrap();
        assert_eq!(cli.reference.as_deref(), Some("HEAD~2"));

        let cli =
            Cli::try_parse_from(["commitsmith", "lint", "fix stuff", "--model", "gpt-4o"]).unwrap();
        match cli.command {
            Some(Command::Lint { message }) => assert_eq!(message.as_deref(), Some("fix stuff")),
            other => panic!("expected lint, got {other:?}"),
        }
        assert_eq!(cli.model.as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn model_and_no_model_conflict() {
        assert!(Cli::try_parse_from(["commitsmith", "--model", "x", "--no-model"]).is_err());
    }
}
