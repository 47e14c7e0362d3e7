//! Progress display shared across a whole run
//!
//! One [`RunProgress`] is created per run and cloned into every context, so
//! concurrently dispatched subroutines each add their own bar to the same
//! terminal view.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

#[derive(Clone)]
pub struct RunProgress {
    multi: MultiProgress,
}

impl RunProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
        }
    }

    /// A progress view that draws nothing; used by tests.
    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
        }
    }

    /// Add a bar for a routine with `steps` steps.
    pub fn start(&self, name: &str, steps: usize) -> RoutineProgress {
        let bar = self.multi.add(ProgressBar::new(steps as u64));
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("█▓▒░ "));
        }
        bar.set_message(name.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        RoutineProgress { bar }
    }
}

impl Default for RunProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RunProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunProgress").finish_non_exhaustive()
    }
}

pub struct RoutineProgress {
    bar: ProgressBar,
}

impl RoutineProgress {
    pub fn increment(&self) {
        self.bar.inc(1);
    }

    pub fn finish(&self) {
        self.bar.finish();
    }

    /// Leave the bar where it stopped and mark it failed.
    pub fn abandon(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}
