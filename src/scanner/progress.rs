//! Progress reporting handle passed to the engine and the analyzers

use indicatif::{ProgressBar, ProgressStyle};

/// Receives progress updates during a scan
pub trait ProgressReporter: Send + Sync {
    /// A step finished; `percent` is 0-100
    fn update_progress(&self, step: &str, percent: u8);

    /// Free-text status line
    fn update_status(&self, message: &str);
}

/// Terminal progress bar
pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.cyan} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Self { bar }
    }

    /// Reporter that renders nothing, for library use and tests
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ConsoleProgress {
    fn update_progress(&self, step: &str, percent: u8) {
        self.bar.set_position(u64::from(percent.min(100)));
        self.bar.set_message(step.to_string());
        if percent >= 100 {
            self.bar.finish_with_message(step.to_string());
        }
    }

    fn update_status(&self, message: &str) {
        self.bar.println(format!("  {message}"));
    }
}
