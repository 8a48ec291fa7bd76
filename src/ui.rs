use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Spinner that ticks once per parsed build step.
pub struct StepProgress {
    bar: ProgressBar,
}

impl StepProgress {
    pub fn new(visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };

        let style =
            ProgressStyle::with_template("  {spinner:.cyan} {elapsed_precise} {pos} steps {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(120));
        bar.set_message("BUILD");

        Self { bar }
    }

    pub fn step(&self, kind: &str, failed: bool) {
        self.bar.inc(1);
        if failed {
            self.bar.println(format!("  ❌ {kind}"));
        }
        self.bar.set_message(kind.to_string());
    }

    pub fn succeed(&self) {
        self.bar.set_style(
            ProgressStyle::with_template("  {elapsed_precise} DONE {pos} steps {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        self.bar.finish_with_message("✅");
    }

    pub fn fail(&self, msg: &str) {
        self.bar.set_style(
            ProgressStyle::with_template("  {elapsed_precise} ERROR {pos} steps {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        self.bar.abandon_with_message(format!("❌ {msg}"));
    }
}
