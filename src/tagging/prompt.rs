//! Interactive prompts for manual tag mode

use crate::error::{Result, TagError};
use std::io::{BufRead, Write};

/// Source of answers for manual tagging
///
/// Prompts are only ever issued during the sequential enqueue phase, never
/// from a worker.
pub trait Prompter: Send + Sync {
    /// Print a header before a group of questions
    fn announce(&self, message: &str);

    /// Ask for `field`, showing `default` (the remote value) when there is one.
    ///
    /// Returns the trimmed answer; an empty string means "use the default".
    fn ask(&self, field: &str, default: Option<&str>) -> Result<String>;
}

/// Prompter reading answers from standard input
///
/// In quiet mode the headers are suppressed; the questions themselves are
/// always printed since an answer is required.
#[derive(Debug, Default)]
pub struct StdioPrompter {
    quiet: bool,
}

impl StdioPrompter {
    /// Create a prompter
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl Prompter for StdioPrompter {
    fn announce(&self, message: &str) {
        if !self.quiet {
            println!("[*] {}", message);
        }
    }

    fn ask(&self, field: &str, default: Option<&str>) -> Result<String> {
        let question = match default {
            Some(d) => format!("[i] {} ({}): ", field, d),
            None => format!("[i] {}: ", field),
        };

        let prompt_failed = |e: std::io::Error| TagError::PromptFailed {
            field: field.to_string(),
            reason: e.to_string(),
        };

        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(question.as_bytes())
            .and_then(|_| stdout.flush())
            .map_err(prompt_failed)?;

        let mut answer = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut answer)
            .map_err(prompt_failed)?;

        Ok(answer.trim().to_string())
    }
}

/// Prompter replaying canned answers, for tests
#[cfg(test)]
pub(crate) struct ScriptedPrompter {
    answers: std::sync::Mutex<std::collections::VecDeque<String>>,
    asked: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
impl ScriptedPrompter {
    pub(crate) fn new(answers: &[&str]) -> Self {
        Self {
            answers: std::sync::Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
            asked: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Fields asked so far, in order
    pub(crate) fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
impl Prompter for ScriptedPrompter {
    fn announce(&self, _message: &str) {}

    fn ask(&self, field: &str, _default: Option<&str>) -> Result<String> {
        self.asked.lock().unwrap().push(field.to_string());
        Ok(self
            .answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default()
            .trim()
            .to_string())
    }
}
