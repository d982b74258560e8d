//! Interactive questions. The orchestrator only sees [`PromptProvider`];
//! [`DialoguerPrompt`] is the terminal implementation.

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Password, Select};

use crate::error::Result;

/// Prompt Provider.
pub trait PromptProvider {
    /// Free text answer, trimmed. `required` is a hint for rendering; the
    /// caller enforces it.
    fn free_text(&mut self, question: &str, required: bool) -> Result<String>;

    /// Index into `options` of the chosen entry.
    fn single_choice(&mut self, question: &str, options: &[&str]) -> Result<usize>;

    fn yes_no(&mut self, question: &str) -> Result<bool>;

    /// A single masked entry; never echoed.
    fn masked_text(&mut self, question: &str) -> Result<String>;

    /// Shows a diagnostic to the user.
    fn notify(&mut self, message: &str);
}

/// Terminal prompts on stderr.
pub struct DialoguerPrompt {
    theme: ColorfulTheme,
}

impl DialoguerPrompt {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for DialoguerPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptProvider for DialoguerPrompt {
    fn free_text(&mut self, question: &str, required: bool) -> Result<String> {
        let prompt = if required {
            question.to_string()
        } else {
            format!("{question} (optional)")
        };
        let answer: String = Input::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?;
        Ok(answer.trim().to_string())
    }

    fn single_choice(&mut self, question: &str, options: &[&str]) -> Result<usize> {
        Ok(Select::with_theme(&self.theme)
            .with_prompt(question)
            .items(options)
            .default(0)
            .interact()?)
    }

    fn yes_no(&mut self, question: &str) -> Result<bool> {
        Ok(Confirm::with_theme(&self.theme)
            .with_prompt(question)
            .default(false)
            .interact()?)
    }

    fn masked_text(&mut self, question: &str) -> Result<String> {
        Ok(Password::with_theme(&self.theme)
            .with_prompt(question)
            .allow_empty_password(true)
            .interact()?)
    }

    fn notify(&mut self, message: &str) {
        eprintln!("{message}");
    }
}
