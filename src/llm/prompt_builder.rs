use std::path::PathBuf;

use log::{debug, info, trace};

use crate::error::PromptError;
use crate::git::Vcs;
use crate::llm::prompts;
use crate::llm::style_guide::StyleGuide;
use crate::llm::ChatMessage;
use crate::tokens::TokenAccountant;

/// Smallest budget that still holds the instructions and a useful diff.
pub const MIN_TOKENS: usize = 5000;
pub const DEFAULT_MAX_TOKENS: usize = 128_000;
/// Commits read from history before self-exclusion.
pub const HISTORY_LIMIT: usize = 300;
/// Cap for each historical commit message.
pub const HISTORY_MESSAGE_TOKENS: usize = 1000;
/// The history summary may use at most `max_tokens / HISTORY_SHARE`.
const HISTORY_SHARE: usize = 2;

/// Assembles the conversation sent to the model for one invocation.
///
/// Messages are emitted in a fixed order: instructions, history summary,
/// style guide, user context, and finally the text under consideration as
/// the only user message. Everything before the last message is fixed cost;
/// the last message is trimmed to whatever budget remains.
pub struct PromptBuilder<'a, V: Vcs + ?Sized> {
    vcs: &'a V,
    tokens: TokenAccountant,
    max_tokens: usize,
    home: Option<PathBuf>,
    context: Vec<String>,
}

impl<'a, V: Vcs + ?Sized> PromptBuilder<'a, V> {
    pub fn new(vcs: &'a V, tokens: TokenAccountant) -> Self {
        PromptBuilder {
            vcs,
            tokens,
            max_tokens: DEFAULT_MAX_TOKENS,
            home: None,
            context: Vec::new(),
        }
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Directory searched for a user-level style guide.
    pub fn home_dir(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    /// Extra lines the user wants reflected in the output.
    pub fn context(mut self, lines: Vec<String>) -> Self {
        self.context = lines.into_iter().filter(|l| !l.trim().is_empty()).collect();
        self
    }

    /// Build the commit-message prompt.
    ///
    /// `target` is the resolved hash of the commit whose message is being
    /// (re)generated; `None` means the staged changes.
    pub fn build(self, target: Option<&str>, amend: bool) -> Result<Vec<ChatMessage>, PromptError> {
        let mut messages = vec![ChatMessage::system(prompts::SYSTEM_INSTRUCTIONS)];

        let root = self.open_repo()?;

        let diff = self.vcs.diff(target, amend).map_err(PromptError::Diff)?;
        if diff.trim().is_empty() {
            return Err(PromptError::NoChanges {
                reference: target.map(str::to_owned),
            });
        }

        self.check_budget()?;

        let head = self
            .vcs
            .head_commit()
            .map_err(PromptError::HistoryEnumeration)?;

        match head {
            None => info!("no commits yet"),
            Some(head) => {
                if let Some(history) = self.history_message(&head, target)? {
                    messages.push(history);
                }
                // After the history so it wins when the two disagree.
                let guide = StyleGuide::find(&root, self.home.as_deref())?;
                messages.push(ChatMessage::system(guide.render()));
            }
        }

        self.finish(messages, &diff)
    }

    /// Build a prompt asking the model to review `message` against the
    /// style guide.
    pub fn build_lint(self, message: &str) -> Result<Vec<ChatMessage>, PromptError> {
        let mut messages = vec![ChatMessage::system(prompts::LINT_INSTRUCTIONS)];

        let root = self.open_repo()?;

        if message.trim().is_empty() {
            return Err(PromptError::EmptyMessage);
        }

        self.check_budget()?;

        let guide = StyleGuide::find(&root, self.home.as_deref())?;
        messages.push(ChatMessage::system(guide.render()));

        self.finish(messages, message)
    }

    fn open_repo(&self) -> Result<PathBuf, PromptError> {
        self.vcs
            .repo_root()
            .map_err(|source| PromptError::RepositoryOpen {
                path: self.vcs.workdir().to_path_buf(),
                source,
            })
    }

    fn check_budget(&self) -> Result<(), PromptError> {
        if self.max_tokens < MIN_TOKENS {
            return Err(PromptError::BudgetTooSmall {
                requested: self.max_tokens,
                floor: MIN_TOKENS,
            });
        }
        Ok(())
    }

    /// Summarise recent history, oldest first, leaving out `target`.
    fn history_message(
        &self,
        head: &str,
        target: Option<&str>,
    ) -> Result<Option<ChatMessage>, PromptError> {
        let mut commits = self
            .vcs
            .recent_commits(head, HISTORY_LIMIT)
            .map_err(PromptError::HistoryEnumeration)?;

        // The target is the commit being regenerated, not context.
        commits.retain(|c| Some(c.hash.as_str()) != target);
        commits.reverse();

        let mut summaries: Vec<String> = commits
            .iter()
            .map(|c| self.tokens.truncate(&c.message, HISTORY_MESSAGE_TOKENS))
            .collect();

        let dropped = self.fit_history(&mut summaries);
        if dropped > 0 {
            debug!("dropped {dropped} oldest commit messages to stay within the history budget");
        }

        if summaries.is_empty() {
            return Ok(None);
        }

        info!("prompt includes {} commits", summaries.len());

        let json = serde_json::Value::from(summaries).to_string();
        Ok(Some(ChatMessage::system(format!(
            "{}\n{json}",
            prompts::HISTORY_PREAMBLE
        ))))
    }

    /// Drop the oldest summaries until the rest fit in the history share of
    /// the budget. Returns how many were dropped.
    fn fit_history(&self, summaries: &mut Vec<String>) -> usize {
        let cap = self.max_tokens / HISTORY_SHARE;
        let mut used = 0;
        let mut keep_from = summaries.len();

        for (i, summary) in summaries.iter().enumerate().rev() {
            // Quoted and comma-separated as it will appear in the JSON array.
            let encoded = serde_json::Value::from(summary.as_str()).to_string();
            let cost = self.tokens.count_text(&encoded) + 1;
            if used + cost > cap {
                break;
            }
            used += cost;
            keep_from = i;
        }

        summaries.drain(..keep_from);
        keep_from
    }

    /// Append user context and the final user message, cut to the
    /// remaining budget.
    fn finish(
        self,
        mut messages: Vec<ChatMessage>,
        body: &str,
    ) -> Result<Vec<ChatMessage>, PromptError> {
        if !self.context.is_empty() {
            let lines: Vec<String> = self.context.iter().map(|l| format!("- {l}")).collect();
            messages.push(ChatMessage::system(format!(
                "{}\n{}",
                prompts::CONTEXT_PREAMBLE,
                lines.join("\n")
            )));
        }

        let consumed = self.tokens.count(&messages);
        if consumed >= self.max_tokens {
            return Err(PromptError::BudgetExhausted {
                budget: self.max_tokens,
                consumed,
            });
        }

        let remaining = self.max_tokens - consumed;
        messages.push(ChatMessage::user(self.tokens.fit(body, remaining)));

        self.log_prompt(&messages);
        Ok(messages)
    }

    fn log_prompt(&self, messages: &[ChatMessage]) {
        for msg in messages {
            debug!(
                "{}: ({} tokens)",
                msg.role.as_str(),
                self.tokens.count(std::slice::from_ref(msg))
            );
            trace!("{}", msg.content);
        }
        debug!(
            "prompt total: {} of {} tokens ({})",
            self.tokens.count(messages),
            self.max_tokens,
            self.tokens.encoding().as_str()
        );
    }
}
