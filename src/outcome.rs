//! Batch results: converted files, per-file failures, and run statistics.

use crate::error::JobError;
use serde::Serialize;

/// One successfully converted file, ready for archiving.
#[derive(Debug, Clone)]
pub struct ConvertedFile {
    /// Archive entry name, `<base>.<target>` (deduplicated within the batch).
    pub output_name: String,
    /// Original uploaded filename this output was derived from.
    pub source_filename: String,
    /// Converted bytes as downloaded from the service.
    pub bytes: Vec<u8>,
}

/// One file whose conversion job failed.
///
/// Failures are recorded, not thrown, so the rest of the batch still ships.
#[derive(Debug, Clone)]
pub struct FailedFile {
    pub filename: String,
    pub error: JobError,
}

/// Aggregate statistics for one batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchStats {
    pub total_files: usize,
    pub converted_files: usize,
    pub failed_files: usize,
    /// Total converted bytes across all successful files.
    pub output_bytes: u64,
    pub total_duration_ms: u64,
}

/// The result of one conversion batch.
///
/// Success of the batch means *at least one* file converted; check
/// [`failed`](Self::failed) for partial failures.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Collision-resistant identifier for this batch (also names the
    /// scratch folder and the download archive).
    pub batch_id: String,
    /// Successfully converted files, in input order.
    pub succeeded: Vec<ConvertedFile>,
    /// Files whose jobs failed, in input order.
    pub failed: Vec<FailedFile>,
    pub stats: BatchStats,
}

impl BatchOutcome {
    /// True when every file in the batch converted.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_complete_reflects_failures() {
        let outcome = BatchOutcome {
            batch_id: "b".into(),
            succeeded: vec![],
            failed: vec![FailedFile {
                filename: "a.png".into(),
                error: JobError::Processing {
                    detail: "bad input".into(),
                },
            }],
            stats: BatchStats::default(),
        };
        assert!(!outcome.is_complete());
    }
}
