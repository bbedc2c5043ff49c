//! Progress-callback trait for per-file batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::ConvertConfigBuilder::progress_callback`] to receive
//! events as the orchestrator processes each file. The server uses this to
//! emit structured per-file request logs; library callers can forward events
//! to a channel, a WebSocket, or a database record without the library
//! knowing how the host application communicates.

use std::sync::Arc;

/// Called by the orchestrator as it processes each file in a batch.
///
/// Implementations must be `Send + Sync`: files are converted concurrently,
/// so `on_file_start`, `on_file_complete`, and `on_file_error` may be called
/// from different tasks at the same time. All methods have default no-op
/// implementations so callers only override what they care about.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after validation, before any job is created.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called just before a file's conversion job is created.
    fn on_file_start(&self, filename: &str, total_files: usize) {
        let _ = (filename, total_files);
    }

    /// Called when a file's converted bytes have been downloaded.
    fn on_file_complete(&self, filename: &str, output_bytes: usize) {
        let _ = (filename, output_bytes);
    }

    /// Called when a file's job fails terminally (no retries follow).
    fn on_file_error(&self, filename: &str, error: &str) {
        let _ = (filename, error);
    }

    /// Called once after every file has been attempted.
    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let _ = (total_files, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConvertConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
