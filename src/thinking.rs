use indicatif::{ProgressBar, ProgressStyle};
use colored::*;
use std::time::Duration;

pub struct ThinkingIndicator {
    spinner: ProgressBar,
}

impl ThinkingIndicator {
    pub fn new(message: &str) -> Self {
        let spinner = ProgressBar::new_spinner();

        let style = ProgressStyle::with_template("{spinner:.bright_cyan} {msg}")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);

        spinner.set_style(style);
        spinner.set_message(message.dimmed().to_string());
        spinner.enable_steady_tick(Duration::from_millis(80));

        Self { spinner }
    }

    pub fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

// Clears the line even when a handler bails out early.
impl Drop for ThinkingIndicator {
    fn drop(&mut self) {
        self.spinner.finish_and_clear();
    }
}

pub fn show_model_thinking() -> ThinkingIndicator {
    ThinkingIndicator::new("Thinking...")
}
