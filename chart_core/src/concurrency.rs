//! Concurrency limit tuning for the orchestrator's default worker counts.
//!
//! - **I/O-bound**: archive/file operations benefit from 2-4x CPU count.
//! - **CPU-bound**: warp/encode kernels limited to 1x CPU count.
//! - **Mixed**: balanced workload at 1.5x CPU count.

/// Default worker-count tiers derived from the available CPU count, used when
/// `--jobs`/`--tile-workers` are omitted from the CLI.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyLimits {
	/// Concurrency for I/O-bound operations (archive reads, tile file writes).
	pub io_bound: usize,
	/// Concurrency for CPU-bound operations (warp, encode).
	pub cpu_bound: usize,
	/// Concurrency for mixed workloads (dataset pipeline: IO + warp).
	pub mixed: usize,
}

impl ConcurrencyLimits {
	pub fn new(io_bound: usize, cpu_bound: usize, mixed: usize) -> Self {
		Self {
			io_bound: io_bound.max(1),
			cpu_bound: cpu_bound.max(1),
			mixed: mixed.max(1),
		}
	}

	pub fn cpu_count() -> usize {
		num_cpus::get()
	}
}

impl Default for ConcurrencyLimits {
	fn default() -> Self {
		let cpus = num_cpus::get();
		Self {
			io_bound: cpus * 3,
			cpu_bound: cpus,
			mixed: cpus + (cpus / 2),
		}
	}
}
