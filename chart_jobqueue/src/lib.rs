//! A thread pool that dispatches a fixed list of jobs through a shared atomic
//! claim counter, standing in for the process pool described in the design notes.
//!
//! Each worker thread repeatedly claims the next job index and runs the caller's
//! closure for it. A panicking job is caught with `catch_unwind` and treated like
//! a worker process dying: that job is marked failed and the thread retires. If
//! every worker thread dies, the run is reported as `AllWorkersDied`.

use chart_core::ErrorKind;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Outcome of a single job.
#[derive(Debug, Clone)]
pub enum JobStatus {
	Ok,
	Failed(String),
}

/// Per-job outcomes, indexed the same as the input job list.
pub struct JobReport {
	pub statuses: Vec<Option<JobStatus>>,
	pub workers_died: usize,
}

impl JobReport {
	#[must_use]
	pub fn failed_indices(&self) -> Vec<usize> {
		self.statuses
			.iter()
			.enumerate()
			.filter_map(|(i, s)| match s {
				Some(JobStatus::Failed(_)) | None => Some(i),
				Some(JobStatus::Ok) => None,
			})
			.collect()
	}

	#[must_use]
	pub fn all_failed(&self) -> bool {
		self.statuses.iter().all(|s| !matches!(s, Some(JobStatus::Ok)))
	}
}

/// Runs `job_count` jobs across `worker_count` threads, calling `run_job(index)` once
/// per job index in `0..job_count`. Jobs are claimed via a shared `fetch_add` counter,
/// so completion order is arbitrary even though indices are issued ascending.
pub fn run_job_queue<F>(job_count: usize, worker_count: usize, run_job: F) -> Result<JobReport, ErrorKind>
where
	F: Fn(usize) -> anyhow::Result<()> + Sync,
{
	if job_count == 0 {
		return Ok(JobReport {
			statuses: vec![],
			workers_died: 0,
		});
	}
	let worker_count = worker_count.max(1);

	let next = AtomicUsize::new(0);
	let statuses: Mutex<Vec<Option<JobStatus>>> = Mutex::new(vec![None; job_count]);
	let workers_died = AtomicUsize::new(0);

	std::thread::scope(|scope| {
		let handles: Vec<_> = (0..worker_count)
			.map(|worker_id| {
				let next = &next;
				let statuses = &statuses;
				let workers_died = &workers_died;
				let run_job = &run_job;
				scope.spawn(move || {
					loop {
						let index = next.fetch_add(1, Ordering::SeqCst);
						if index >= job_count {
							break;
						}
						let result = catch_unwind(AssertUnwindSafe(|| run_job(index)));
						let status = match result {
							Ok(Ok(())) => JobStatus::Ok,
							Ok(Err(e)) => {
								log::warn!("job {index} failed on worker {worker_id}: {e:#}");
								JobStatus::Failed(format!("{e:#}"))
							}
							Err(panic) => {
								let message = panic_message(&panic);
								log::warn!("worker {worker_id} died handling job {index}: {message}");
								workers_died.fetch_add(1, Ordering::SeqCst);
								statuses.lock().unwrap()[index] = Some(JobStatus::Failed(message));
								return;
							}
						};
						statuses.lock().unwrap()[index] = Some(status);
					}
				})
			})
			.collect();
		for handle in handles {
			let _ = handle.join();
		}
	});

	let workers_died = workers_died.into_inner();
	let statuses = statuses.into_inner().unwrap();
	if workers_died >= worker_count {
		return Err(ErrorKind::AllWorkersDied);
	}
	Ok(JobReport { statuses, workers_died })
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
	if let Some(s) = panic.downcast_ref::<&str>() {
		(*s).to_string()
	} else if let Some(s) = panic.downcast_ref::<String>() {
		s.clone()
	} else {
		"unknown panic".to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn runs_every_job_exactly_once() {
		let seen = Mutex::new(vec![0u8; 20]);
		let report = run_job_queue(20, 4, |i| {
			seen.lock().unwrap()[i] += 1;
			Ok(())
		})
		.unwrap();
		assert!(seen.into_inner().unwrap().iter().all(|&c| c == 1));
		assert_eq!(report.failed_indices().len(), 0);
	}

	#[test]
	fn isolates_a_panicking_job_to_its_own_status() {
		let report = run_job_queue(5, 2, |i| {
			if i == 2 {
				panic!("boom");
			}
			Ok(())
		})
		.unwrap();
		assert_eq!(report.failed_indices(), vec![2]);
	}

	#[test]
	fn propagates_ordinary_errors_without_killing_the_worker() {
		let report = run_job_queue(4, 1, |i| {
			if i == 1 {
				anyhow::bail!("bad job");
			}
			Ok(())
		})
		.unwrap();
		assert_eq!(report.failed_indices(), vec![1]);
	}

	#[test]
	fn all_workers_dying_is_reported_as_fatal() {
		let result = run_job_queue(3, 2, |_| panic!("always dies"));
		assert!(matches!(result, Err(ErrorKind::AllWorkersDied)));
	}

	#[test]
	fn zero_jobs_is_a_trivial_success() {
		let report = run_job_queue(0, 4, |_| Ok(())).unwrap();
		assert_eq!(report.statuses.len(), 0);
	}
}
