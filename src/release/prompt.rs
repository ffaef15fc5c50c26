//! Operator interaction during a release
//!
//! Release targets talk to the operator only through [`Prompt`], so tests
//! can script the answers.

use crate::core::error::{PkgResult, ResultExt};
use crate::core::interrupt;
use crate::core::process::{Runner, ToolCommand};
use std::io::{self, BufRead, Write};
use std::path::Path;

/// Answers that count as "yes"
const AFFIRMATIVE: &[&str] = &["y", "yes", "ok", "sure"];

pub fn is_affirmative(answer: &str) -> bool {
  AFFIRMATIVE.contains(&answer.trim().to_lowercase().as_str())
}

pub trait Prompt {
  /// Show a diff under a banner naming where it was produced
  fn show_diff(&mut self, banner: &str, diff: &str);

  /// Ask a yes/no question
  fn confirm(&mut self, question: &str) -> PkgResult<bool>;

  /// Let the operator edit the message stored in `path`
  fn edit_message(&mut self, path: &Path) -> PkgResult<()>;
}

/// stdin/stdout prompt; edits with `$EDITOR` (default `vi`)
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
  fn show_diff(&mut self, banner: &str, diff: &str) {
    println!();
    println!("{}", "#".repeat(banner.len()));
    println!("{}", banner);
    println!("{}", "#".repeat(banner.len()));
    println!();
    println!("{}", diff);
    println!();
    println!("##### Please review the above diff #####");
  }

  fn confirm(&mut self, question: &str) -> PkgResult<bool> {
    print!("{} [y/n] ", question);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin()
      .lock()
      .read_line(&mut answer)
      .context("Failed to read answer from stdin")?;
    interrupt::check(question)?;
    Ok(is_affirmative(&answer))
  }

  fn edit_message(&mut self, path: &Path) -> PkgResult<()> {
    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    let cmd = ToolCommand::new(editor).arg(path.to_string_lossy());
    Runner::new(false).run_interactive(&cmd)
  }
}

/// Scripted answers for tests
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
  answers: Vec<bool>,
  /// Every diff shown, in order
  pub diffs: Vec<String>,
  /// Text appended to the message on each edit
  pub edit_suffix: Option<String>,
}

#[cfg(test)]
impl ScriptedPrompt {
  /// Answers are consumed in order; running out means "no"
  pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
    let mut answers: Vec<bool> = answers.into_iter().collect();
    answers.reverse();
    Self {
      answers,
      ..Default::default()
    }
  }
}

#[cfg(test)]
impl Prompt for ScriptedPrompt {
  fn show_diff(&mut self, _banner: &str, diff: &str) {
    self.diffs.push(diff.to_string());
  }

  fn confirm(&mut self, _question: &str) -> PkgResult<bool> {
    Ok(self.answers.pop().unwrap_or(false))
  }

  fn edit_message(&mut self, path: &Path) -> PkgResult<()> {
    if let Some(suffix) = &self.edit_suffix {
      let mut message = std::fs::read_to_string(path)?;
      message.push_str(suffix);
      std::fs::write(path, message)?;
    }
    Ok(())
  }
}
