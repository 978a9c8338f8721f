//! Terminal progress reporting for the orchestrator's phases, silenced
//! entirely under `--quiet` rather than merely hidden.

use indicatif::{ProgressBar as IndicatifProgressBar, ProgressStyle};
use std::time::Duration;

/// Common interface for a progress indicator; callers drive it with
/// `init`/`inc`/`finish` without caring whether it renders anything.
pub trait ProgressTrait: Send + Sync {
	fn init(&mut self, message: &str, max_value: u64);
	fn set_max_value(&mut self, max_value: u64);
	fn set_position(&mut self, value: u64);
	fn inc(&mut self, value: u64);
	fn finish(&mut self);
}

/// A terminal progress bar backed by `indicatif`.
pub struct ProgressBar {
	bar: IndicatifProgressBar,
}

impl ProgressBar {
	#[must_use]
	pub fn new() -> Self {
		Self {
			bar: IndicatifProgressBar::new(0),
		}
	}
}

impl Default for ProgressBar {
	fn default() -> Self {
		Self::new()
	}
}

impl ProgressTrait for ProgressBar {
	fn init(&mut self, message: &str, max_value: u64) {
		self.bar.set_length(max_value);
		self.bar.enable_steady_tick(Duration::from_millis(250));
		self.bar.set_message(message.to_string());
		if let Ok(style) = ProgressStyle::default_bar().template("{msg}▕{wide_bar}▏{pos}/{len} ({percent}%) {per_sec} {eta_precise}") {
			self.bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
		}
	}

	fn set_max_value(&mut self, max_value: u64) {
		self.bar.set_length(max_value);
	}

	fn set_position(&mut self, value: u64) {
		self.bar.set_position(value);
	}

	fn inc(&mut self, value: u64) {
		self.bar.inc(value);
	}

	fn finish(&mut self) {
		self.bar.finish();
	}
}

/// A progress indicator that does nothing, used under `--quiet`.
#[derive(Default)]
pub struct SilentProgress;

impl ProgressTrait for SilentProgress {
	fn init(&mut self, _message: &str, _max_value: u64) {}
	fn set_max_value(&mut self, _max_value: u64) {}
	fn set_position(&mut self, _value: u64) {}
	fn inc(&mut self, _value: u64) {}
	fn finish(&mut self) {}
}

/// Builds a progress indicator: a rendered bar normally, or a no-op under `quiet`.
#[must_use]
pub fn get_progress_bar(quiet: bool, message: &str, max_value: u64) -> Box<dyn ProgressTrait> {
	let mut progress: Box<dyn ProgressTrait> = if quiet { Box::new(SilentProgress) } else { Box::new(ProgressBar::new()) };
	progress.init(message, max_value);
	progress
}
