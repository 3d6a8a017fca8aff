//! Errors surfaced while assembling a prompt.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::git::VcsError;

/// Every variant is terminal for the current invocation; nothing is retried.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("open repository {path:?}")]
    RepositoryOpen {
        path: PathBuf,
        #[source]
        source: VcsError,
    },

    #[error("generate diff")]
    Diff(#[source] VcsError),

    #[error("{}", no_changes_message(.reference))]
    NoChanges { reference: Option<String> },

    #[error("enumerate commit history")]
    HistoryEnumeration(#[source] VcsError),

    #[error("maxTokens must be at least {floor}, got {requested}")]
    BudgetTooSmall { requested: usize, floor: usize },

    #[error("token budget of {budget} exhausted by {consumed} tokens of context before the diff")]
    BudgetExhausted { budget: usize, consumed: usize },

    #[error("read style guide {path:?}")]
    StyleGuideRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("commit message to lint is empty")]
    EmptyMessage,
}

fn no_changes_message(reference: &Option<String>) -> String {
    match reference {
        None => "no staged changes, nothing to commit".to_string(),
        Some(r) => format!("no changes detected for {r:?}"),
    }
}
