use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Single progress line on stderr: a bar when the run has a wall-clock bound, a spinner otherwise.
pub(crate) struct HumanProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl HumanProgress {
    pub(crate) fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    pub(crate) fn update(
        &self,
        scenario: &str,
        total_duration_opt: Option<Duration>,
        elapsed: Duration,
        message: String,
    ) {
        let mut inner = self
            .bar
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let pb = inner.get_or_insert_with(|| new_bar(scenario, total_duration_opt));
        pb.set_message(message);

        match total_duration_opt {
            Some(total_d) => {
                let total_ms = u64::try_from(total_d.as_millis()).unwrap_or(u64::MAX);
                let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
                pb.set_length(total_ms);
                pb.set_position(elapsed_ms.min(total_ms));
            }
            None => {
                pb.tick();
            }
        }
    }

    pub(crate) fn finish(&self) {
        let mut inner = self
            .bar
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(pb) = inner.take() {
            pb.finish_and_clear();
        }
    }
}

fn new_bar(scenario: &str, total_duration_opt: Option<Duration>) -> ProgressBar {
    let pb = match total_duration_opt {
        Some(_) => {
            let pb = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr_with_hz(5));
            pb.set_style(bar_style());
            pb
        }
        None => {
            let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr_with_hz(5));
            pb.set_style(spinner_style());
            pb.enable_steady_tick(Duration::from_millis(120));
            pb
        }
    };
    pb.set_prefix(scenario.to_string());
    pb
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix} [ {bar:20.cyan/blue} ] {percent:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█░")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix} {spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}
