use std::fmt;

/// Taxonomy of failure kinds surfaced across the pipeline, manifest, and job
/// queue. Carried as the innermost link of an `anyhow` context chain rather
/// than as the error type itself — call sites attach this to logged failures
/// for counting and classification, not for matching control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	ConfigInvalid,
	ArchiveOpenFailed,
	RasterOpenFailed,
	InvalidMask,
	GCPSolveFailed,
	CRSUnavailable,
	WarpFailed,
	ClipFailed,
	SaveFailed,
	EncoderFailed,
	WorkerDied,
	AllWorkersDied,
}

impl ErrorKind {
	/// `ConfigInvalid` and `AllWorkersDied` abort the whole run; everything
	/// else is logged, counted, and the run continues with exit code 0.
	#[must_use]
	pub fn is_fatal(self) -> bool {
		matches!(self, ErrorKind::ConfigInvalid | ErrorKind::AllWorkersDied)
	}
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			ErrorKind::ConfigInvalid => "config invalid",
			ErrorKind::ArchiveOpenFailed => "archive open failed",
			ErrorKind::RasterOpenFailed => "raster open failed",
			ErrorKind::InvalidMask => "invalid mask",
			ErrorKind::GCPSolveFailed => "GCP solve failed",
			ErrorKind::CRSUnavailable => "CRS unavailable",
			ErrorKind::WarpFailed => "warp failed",
			ErrorKind::ClipFailed => "clip failed",
			ErrorKind::SaveFailed => "save failed",
			ErrorKind::EncoderFailed => "encoder failed",
			ErrorKind::WorkerDied => "worker died",
			ErrorKind::AllWorkersDied => "all workers died",
		};
		f.write_str(s)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn only_config_and_all_workers_died_are_fatal() {
		assert!(ErrorKind::ConfigInvalid.is_fatal());
		assert!(ErrorKind::AllWorkersDied.is_fatal());
		assert!(!ErrorKind::WorkerDied.is_fatal());
		assert!(!ErrorKind::SaveFailed.is_fatal());
	}
}
