use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use plugins_core::Reporter;

/// Spinner driven by core status messages.
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    pub fn start(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        bar.set_message(message.to_string());
        Self { bar }
    }

    pub fn succeed(&self, message: &str) {
        self.bar
            .finish_with_message(format!("{} {}", style("✓").green().bold(), message));
    }

    pub fn fail(&self, message: &str) {
        self.bar
            .finish_with_message(format!("{} {}", style("✗").red().bold(), message));
    }
}

impl Reporter for Spinner {
    fn step(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn note(&self, message: &str) {
        self.bar
            .suspend(|| println!("{} {}", style("!").yellow(), message));
    }
}

pub fn success(message: impl std::fmt::Display) {
    println!("{} {}", style("✓").green().bold(), message);
}

pub fn warn(message: impl std::fmt::Display) {
    println!("{} {}", style("!").yellow(), message);
}

pub fn hint(message: impl std::fmt::Display) {
    println!("  {}", style(message).dim());
}

/// Asks before a destructive step. `assume_yes` skips the prompt.
pub fn confirm(prompt: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to read confirmation")
}
