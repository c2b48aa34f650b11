//! Progress helpers using indicatif

use indicatif::{ProgressBar, ProgressStyle};

use crate::pipeline::{Stage, StageObserver};
use crate::report::StageEntry;

/// Create a spinner for indeterminate progress
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    // The template is a constant; fall back to the default style if it is rejected
    let style = ProgressStyle::default_spinner()
        .template("    {spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Finish a progress bar with a success message
pub fn finish_with_success(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(format!("✅ {}", message));
}

/// Finish a progress bar with a warning message
pub fn finish_with_warning(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(format!("⚠️  {}", message));
}

/// One spinner per pipeline stage
#[derive(Default)]
pub struct StageSpinner {
    current: Option<ProgressBar>,
}

impl StageObserver for StageSpinner {
    fn stage_started(&mut self, stage: Stage) {
        self.current = Some(create_spinner(&format!("{}...", stage.activity())));
    }

    fn stage_finished(&mut self, entry: &StageEntry) {
        if let Some(pb) = self.current.take() {
            let message = format!(
                "{} ({} → {} records, {} ms)",
                entry.stage.activity(),
                entry.rows_before,
                entry.rows_after,
                entry.elapsed_ms
            );
            if entry.rows_after == 0 {
                finish_with_warning(&pb, &format!("{}; no records left", message));
            } else {
                finish_with_success(&pb, &message);
            }
        }
    }
}
