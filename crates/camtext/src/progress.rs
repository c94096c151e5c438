use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Live counters on stderr while frames stream through recognition.
pub struct StatusLine {
    bar: ProgressBar,
    recognized: u64,
    skipped: u64,
}

impl StatusLine {
    pub fn new(enabled: bool) -> Self {
        let bar = if enabled && std::io::stderr().is_terminal() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::with_template(
                    "{spinner:.cyan.bold} [{elapsed_precise}] {prefix} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
            );
            spinner.enable_steady_tick(Duration::from_millis(100));
            spinner
        } else {
            ProgressBar::hidden()
        };
        Self {
            bar,
            recognized: 0,
            skipped: 0,
        }
    }

    pub fn set_source(&self, description: String) {
        self.bar.set_prefix(description);
    }

    pub fn recognized(&mut self, discarded: u64) {
        self.recognized += 1;
        self.refresh(discarded);
    }

    pub fn skipped(&mut self, discarded: u64) {
        self.skipped += 1;
        self.refresh(discarded);
    }

    /// Writes a line above the spinner without tearing it.
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.bar.suspend(f)
    }

    pub fn finish(&self, discarded: u64) {
        self.bar.finish_with_message(self.summary(discarded));
    }

    pub fn counts(&self) -> (u64, u64) {
        (self.recognized, self.skipped)
    }

    fn refresh(&self, discarded: u64) {
        self.bar.set_message(self.summary(discarded));
    }

    fn summary(&self, discarded: u64) -> String {
        format!(
            "recognized {} • skipped {} • late frames dropped {}",
            self.recognized, self.skipped, discarded
        )
    }
}
