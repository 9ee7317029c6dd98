//! Terminal progress for pack attempts
//!
//! Spinners are drawn with indicatif; status lines are styled with
//! console. When stderr is not a terminal every indicator is hidden.

use console::{style, Term};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

const TICK: Duration = Duration::from_millis(80);

/// Style presets for the pack phases
pub struct ProgressStyles;

impl ProgressStyles {
    /// Indeterminate operations (fetching, rendering)
    pub fn spinner() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}]")
            .expect("valid spinner template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
    }

    /// Finished step
    pub fn success() -> ProgressStyle {
        ProgressStyle::with_template("{prefix:.green} {msg}").expect("valid success template")
    }

    /// Failed step
    pub fn error() -> ProgressStyle {
        ProgressStyle::with_template("{prefix:.red} {msg}").expect("valid error template")
    }
}

/// Progress display for one pack attempt
pub struct PackProgress {
    multi: MultiProgress,
    enabled: bool,
}

impl PackProgress {
    /// Progress drawn to stderr when it is a terminal
    pub fn new() -> Self {
        let enabled = Term::stderr().is_term();
        Self::with_enabled(enabled)
    }

    /// Progress that never draws anything
    pub fn hidden() -> Self {
        Self::with_enabled(false)
    }

    fn with_enabled(enabled: bool) -> Self {
        let multi = if enabled {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };
        Self { multi, enabled }
    }

    /// Whether indicators are drawn
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Spinner for one phase
    pub fn spinner(&self, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(ProgressStyles::spinner());
        pb.set_message(msg.to_string());
        if self.enabled {
            pb.enable_steady_tick(TICK);
        }
        pb
    }

    /// Print an informational line
    pub fn info(&self, msg: &str) {
        if self.enabled {
            self.multi
                .println(format!("  {} {}", style("ℹ").cyan(), msg))
                .ok();
        }
    }

    /// Print a warning line
    pub fn warn(&self, msg: &str) {
        if self.enabled {
            self.multi
                .println(format!("  {} {}", style("⚠").yellow(), style(msg).yellow()))
                .ok();
        }
    }
}

impl Default for PackProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Completion helpers for progress bars
pub trait ProgressExt {
    /// Finish with a success message
    fn finish_success(&self, msg: &str);

    /// Finish with an error message
    fn finish_error(&self, msg: &str);
}

impl ProgressExt for ProgressBar {
    fn finish_success(&self, msg: &str) {
        self.set_style(ProgressStyles::success());
        self.set_prefix("✓");
        self.finish_with_message(msg.to_string());
    }

    fn finish_error(&self, msg: &str) {
        self.set_style(ProgressStyles::error());
        self.set_prefix("✗");
        self.finish_with_message(msg.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_styles() {
        let _ = ProgressStyles::spinner();
        let _ = ProgressStyles::success();
        let _ = ProgressStyles::error();
    }

    #[test]
    fn test_hidden_progress() {
        let progress = PackProgress::hidden();
        assert!(!progress.is_enabled());
        let pb = progress.spinner("Fetching...");
        pb.finish_success("Fetched");
        progress.spinner("Deploying").finish_error("Deploying: rejected");
        progress.info("nothing is drawn");
    }
}
