//! Progress indicators for patch application.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use patchkit::{ApplyOutcome, ApplyProgress, Error, PatchFile};
use std::time::Duration;

/// Progress bar style used while applying a module
fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} {prefix:.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

/// A spinner for operations without a known length
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// One bar per module, all drawn by a shared [`MultiProgress`]
pub struct ModuleBar {
    bar: ProgressBar,
}

impl ModuleBar {
    pub fn new(multi: &MultiProgress, quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            multi.add(ProgressBar::new(0))
        };
        bar.set_style(bar_style());
        Self { bar }
    }
}

impl ApplyProgress for ModuleBar {
    fn on_start(&mut self, module: &str, total: usize) {
        self.bar.set_prefix(module.to_string());
        self.bar.set_length(total as u64);
        self.bar.set_message("resetting onto upstream");
        self.bar.enable_steady_tick(Duration::from_millis(100));
    }

    fn on_patch(&mut self, _module: &str, patch: &PatchFile) {
        // position counts finished patches
        self.bar.set_position(patch.index.saturating_sub(1) as u64);
        self.bar.set_message(patch.subject.clone());
    }

    fn on_finish(&mut self, _module: &str, outcome: &ApplyOutcome) {
        match outcome {
            ApplyOutcome::Applied { count } | ApplyOutcome::DryRun { count } => {
                self.bar.set_position(*count as u64);
            }
            ApplyOutcome::Conflict { .. } => {}
        }
        self.bar.finish_and_clear();
    }

    fn on_error(&mut self, _module: &str, _error: &Error) {
        // the caller prints the error itself
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_cleared_after_error() {
        let multi = MultiProgress::new();
        let mut bar = ModuleBar::new(&multi, true);
        bar.on_start("server", 3);
        bar.on_error("server", &Error::GitNotFound);
        assert!(bar.bar.is_finished());
    }

    #[test]
    fn test_bar_position_after_apply() {
        let multi = MultiProgress::new();
        let mut bar = ModuleBar::new(&multi, true);
        bar.on_start("server", 2);
        bar.on_finish("server", &ApplyOutcome::Applied { count: 2 });
        assert_eq!(bar.bar.position(), 2);
        assert!(bar.bar.is_finished());
    }
}
