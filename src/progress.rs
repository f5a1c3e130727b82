//! Progress reporting utilities

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter for long-running CLI steps
#[derive(Debug)]
pub struct ProgressReporter {
    pub bar: Option<ProgressBar>,
}

impl ProgressReporter {
    /// Bar over the base rows scored by the matching engine
    pub fn new_for_matching(base_rows: u64) -> Self {
        Self {
            bar: Some(create_progress_bar(base_rows, "Scoring candidate pairs")),
        }
    }

    /// Spinner shown while a file is parsed
    pub fn new_for_loading(filename: &str) -> Self {
        Self {
            bar: Some(create_spinner(&format!("Loading {}...", filename))),
        }
    }

    /// Reporter that draws nothing, for machine-readable output
    pub fn new_minimal() -> Self {
        Self { bar: None }
    }

    /// Record `done` of `total` units
    pub fn update(&self, done: u64, total: u64) {
        if let Some(pb) = &self.bar {
            if pb.length() != Some(total) {
                pb.set_length(total);
            }
            pb.set_position(done);
        }
    }

    pub fn finish(&mut self, message: &str) {
        if let Some(pb) = self.bar.take() {
            pb.finish_with_message(message.to_string());
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.finish_and_clear();
        }
    }
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.green} {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>7}/{len:7} ({per_sec}) {eta} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(message.to_string());
    pb
}
