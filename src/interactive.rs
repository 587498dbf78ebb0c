//! Interactive terminal prompts for mount and target selection.
//!
//! Whether prompts may be shown at all is decided once, at the CLI edge, and
//! carried around as an [`Interaction`] value. Nothing below this module looks
//! at the terminal to find out.
//!
//! Prompts go through the [`Prompt`] trait so the workflow can be driven by a
//! scripted implementation in tests. [`TerminalPrompt`] is the dialoguer-backed
//! one used by the binary.

use std::fmt;

use colored::Colorize;
use dialoguer::{Confirm, Input, Select, theme::ColorfulTheme};

// =============================================================================
// Capability
// =============================================================================

/// What the current invocation allows in terms of user interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interaction {
    /// Prompts may be shown and answered.
    pub interactive: bool,
    /// Confirmations are answered "yes" without asking.
    pub assume_yes: bool,
}

impl Interaction {
    pub fn interactive() -> Self {
        Self {
            interactive: true,
            assume_yes: false,
        }
    }

    pub fn non_interactive() -> Self {
        Self {
            interactive: false,
            assume_yes: false,
        }
    }

    /// Non-interactive, accepting every confirmation.
    pub fn assume_yes() -> Self {
        Self {
            interactive: false,
            assume_yes: true,
        }
    }

    /// Ask for confirmation, honoring `assume_yes` and non-interactive mode.
    ///
    /// `what` names the flag a non-interactive caller should pass instead.
    pub fn confirm(
        &self,
        prompt: &dyn Prompt,
        message: &str,
        what: &'static str,
    ) -> Result<bool, InteractiveError> {
        if self.assume_yes {
            tracing::info!(question = %message.trim(), "assuming yes");
            return Ok(true);
        }
        if !self.interactive {
            return Err(InteractiveError::Unavailable(what));
        }
        prompt.confirm(message, true)
    }
}

// =============================================================================
// Prompt
// =============================================================================

/// The prompts the download workflow needs.
pub trait Prompt {
    /// Pick one of `options`; returns its index.
    fn choose(&self, options: &[String], message: &str) -> Result<usize, InteractiveError>;

    /// Free-form answer, pre-filled with `default` when given.
    fn ask(&self, message: &str, default: Option<&str>) -> Result<String, InteractiveError>;

    /// Yes/no question.
    fn confirm(&self, message: &str, default: bool) -> Result<bool, InteractiveError>;
}

/// Prompts rendered on the terminal with dialoguer.
pub struct TerminalPrompt {
    theme: ColorfulTheme,
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalPrompt {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Prompt for TerminalPrompt {
    fn choose(&self, options: &[String], message: &str) -> Result<usize, InteractiveError> {
        if options.is_empty() {
            return Err(InteractiveError::NoOptions);
        }

        let items = numbered(options);

        eprintln!();
        eprintln!("{}", message.bold());

        Select::with_theme(&self.theme)
            .items(&items)
            .default(0)
            .interact_opt()
            .map_err(|e| InteractiveError::IoError(e.to_string()))?
            .ok_or(InteractiveError::Cancelled)
    }

    fn ask(&self, message: &str, default: Option<&str>) -> Result<String, InteractiveError> {
        let mut input = Input::<String>::with_theme(&self.theme)
            .with_prompt(message)
            .allow_empty(true);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        input
            .interact_text()
            .map(|answer| answer.trim().to_string())
            .map_err(|e| InteractiveError::IoError(e.to_string()))
    }

    fn confirm(&self, message: &str, default: bool) -> Result<bool, InteractiveError> {
        Confirm::with_theme(&self.theme)
            .with_prompt(message)
            .default(default)
            .interact()
            .map_err(|e| InteractiveError::IoError(e.to_string()))
    }
}

/// Prefix options with their 1-based position: `[1] web/uploads`.
pub fn numbered(options: &[String]) -> Vec<String> {
    options
        .iter()
        .enumerate()
        .map(|(i, option)| format!("[{}] {}", (i + 1).to_string().cyan(), option))
        .collect()
}

// =============================================================================
// Errors
// =============================================================================

/// Errors from interactive prompts.
#[derive(Debug)]
pub enum InteractiveError {
    /// User cancelled the prompt
    Cancelled,
    /// Nothing to choose from
    NoOptions,
    /// A prompt was needed but the run is non-interactive; names the flag to pass instead
    Unavailable(&'static str),
    /// IO error during prompt
    IoError(String),
}

impl fmt::Display for InteractiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InteractiveError::Cancelled => write!(f, "Operation cancelled by user"),
            InteractiveError::NoOptions => write!(f, "No options available for selection"),
            InteractiveError::Unavailable(what) => {
                write!(f, "{what} must be specified in non-interactive mode")
            }
            InteractiveError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for InteractiveError {}

// =============================================================================
// Tests
// =============================================================================
