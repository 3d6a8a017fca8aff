use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::execute;
use crossterm::tty::IsTty;
use indicatif::{ProgressBar, ProgressStyle};

const SKY_BLUE: Color = Color::Rgb {
    r: 0x2F,
    g: 0xA8,
    b: 0xFF,
};

/// Print a chunk of model output as it arrives. Colored only on a terminal.
pub fn print_delta(chunk: &str) -> Result<()> {
    let mut stdout = io::stdout();
    if stdout.is_tty() {
        execute!(stdout, SetForegroundColor(SKY_BLUE), Print(chunk), ResetColor)?;
    } else {
        stdout.write_all(chunk.as_bytes())?;
        stdout.flush()?;
    }
    Ok(())
}

pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "err:".red().bold(), err);
}

/// Spinner on stderr while waiting for the first token.
pub fn spinner(message: &str) -> Result<ProgressBar> {
    let style = ProgressStyle::default_spinner()
        .tick_strings(&["-", "\\", "|", "/", "-"])
        .template("{spinner:.blue} {msg}")
        .context("failed to create spinner style")?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

/// Strip a surrounding Markdown code fence, if the model added one.
pub fn clean_message(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);

    // ```text\n... carries an info string on the opening line
    let inner = match inner.split_once('\n') {
        Some((info, rest))
            if !info.is_empty() && info.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            rest
        }
        _ => inner,
    };
    inner.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_message_is_trimmed() {
        assert_eq!(clean_message("\n  Add parser\n\n"), "Add parser");
    }

    #[test]
    fn strips_code_fences() {
        assert_eq!(
            clean_message("```\nAdd parser\n\nBody\n```"),
            "Add parser\n\nBody"
        );
        assert_eq!(
            clean_message("```text\nFix crash on empty input\n```\n"),
            "Fix crash on empty input"
        );
    }

    #[test]
    fn keeps_subject_on_fence_line() {
        assert_eq!(clean_message("```Fix the build```"), "Fix the build");
    }
}
