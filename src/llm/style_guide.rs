use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::prompts;
use crate::error::PromptError;

pub const STYLE_GUIDE_FILE: &str = "COMMITS.md";

/// Where the style guide in effect came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleSource {
    Repository(PathBuf),
    User(PathBuf),
    BuiltIn,
}

#[derive(Debug, Clone)]
pub struct StyleGuide {
    pub source: StyleSource,
    pub text: String,
}

impl StyleGuide {
    /// Look for `COMMITS.md` at the repository root, then in `home`, and
    /// fall back to the built-in conventions.
    pub fn find(repo_root: &Path, home: Option<&Path>) -> Result<Self, PromptError> {
        let repo_file = repo_root.join(STYLE_GUIDE_FILE);
        if let Some(text) = read_optional(&repo_file)? {
            return Ok(StyleGuide {
                source: StyleSource::Repository(repo_file),
                text,
            });
        }

        if let Some(home) = home {
            let user_file = home.join(STYLE_GUIDE_FILE);
            if let Some(text) = read_optional(&user_file)? {
                return Ok(StyleGuide {
                    source: StyleSource::User(user_file),
                    text,
                });
            }
        }

        Ok(StyleGuide {
            source: StyleSource::BuiltIn,
            text: prompts::DEFAULT_STYLE_GUIDE.to_string(),
        })
    }

    /// Text of the system message that carries this guide.
    pub fn render(&self) -> String {
        let preamble = match self.source {
            StyleSource::Repository(_) => prompts::REPO_STYLE_GUIDE_PREAMBLE,
            StyleSource::User(_) => prompts::USER_STYLE_GUIDE_PREAMBLE,
            StyleSource::BuiltIn => prompts::DEFAULT_STYLE_GUIDE_PREAMBLE,
        };
        format!("{preamble}\n{}", self.text)
    }
}

/// A missing or blank file is `None`; any other read failure is an error.
fn read_optional(path: &Path) -> Result<Option<String>, PromptError> {
    match fs::read_to_string(path) {
        Ok(text) if text.trim().is_empty() => Ok(None),
        Ok(text) => {
            log::debug!("using style guide {}", path.display());
            Ok(Some(text))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(PromptError::StyleGuideRead {
            path: path.to_path_buf(),
            source,
        }),
    }
}
