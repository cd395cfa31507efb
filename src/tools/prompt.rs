//! Operator Prompts

use anyhow::{Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm, Input};

/// Interactive questions to the operator
pub trait Prompter: Send + Sync {
    /// Free-text answer, possibly empty.
    fn ask(&self, question: &str) -> Result<String>;

    fn confirm(&self, question: &str, default: bool) -> Result<bool>;
}

/// Prompts on the controlling terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask(&self, question: &str) -> Result<String> {
        let answer: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(question)
            .allow_empty(true)
            .interact_text()
            .context("Failed to read answer from terminal")?;
        Ok(answer.trim().to_string())
    }

    fn confirm(&self, question: &str, default: bool) -> Result<bool> {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(question)
            .default(default)
            .interact()
            .context("Failed to read confirmation from terminal")
    }
}
