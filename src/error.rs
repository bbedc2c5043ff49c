//! Error types for the batch-convert library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ConvertError`] is fatal: the batch cannot proceed at all
//!   (empty request, missing credential, scratch-storage failure, archive
//!   failure). Returned as `Err(ConvertError)` from [`crate::batch::run_batch`].
//!
//! * [`JobError`] is non-fatal: a single file's remote conversion job
//!   failed (rejected submission, service-side error, poll timeout) but all
//!   other files in the batch are unaffected. Stored inside
//!   [`crate::outcome::FailedFile`] so callers can inspect partial success
//!   rather than losing the whole batch to one bad file.
//!
//! The separation lets callers decide their own tolerance: surface every
//! failure, log and ship the partial archive, or collect errors for a report.

use thiserror::Error;

/// All fatal errors returned by the batch-convert library.
///
/// Per-file failures use [`JobError`] and are recorded in
/// [`crate::outcome::BatchOutcome::failed`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// The request contained no files. Rejected before any external call.
    #[error("No files uploaded")]
    EmptyBatch,

    /// The request exceeded the configured batch-size ceiling.
    #[error("Too many files: {count} uploaded, the limit is {max}")]
    BatchTooLarge { count: usize, max: usize },

    /// The requested output format is not one of the supported set.
    #[error("Unsupported target format '{format}' (supported: pdf, jpg, png, webp, docx)")]
    UnsupportedFormat { format: String },

    // ── Configuration errors ──────────────────────────────────────────────
    /// No service credential is configured. Fatal for every request until
    /// fixed; detected before any file is read from scratch storage.
    #[error("Conversion service API key is not configured")]
    MissingCredential,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Batch errors ──────────────────────────────────────────────────────
    /// Every file in the batch failed; there is nothing to archive.
    #[error("All {total} files failed conversion.\nFirst error: {first_error}")]
    AllFilesFailed { total: usize, first_error: String },

    // ── Storage errors ────────────────────────────────────────────────────
    /// Scratch-storage read or write failed.
    #[error("Scratch storage failure at '{path}': {source}")]
    Storage {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // ── Archive errors ────────────────────────────────────────────────────
    /// Writing the zip archive failed.
    #[error("Failed to assemble archive: {0}")]
    Archive(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single file's remote conversion job.
///
/// Stored in [`crate::outcome::FailedFile`] when a job fails. The batch
/// continues unless ALL files fail.
///
/// Error messages never contain the service credential.
#[derive(Debug, Clone, Error)]
pub enum JobError {
    /// The service rejected our credential (401/403).
    #[error("Conversion service rejected the credential (HTTP {status})")]
    Auth { status: u16 },

    /// Job creation or file upload was rejected by the service.
    #[error("Job submission failed during {stage}: {detail}")]
    Submission { stage: &'static str, detail: String },

    /// The service reported the job as errored.
    #[error("Conversion failed remotely: {detail}")]
    Processing { detail: String },

    /// The job did not reach a terminal state within the poll budget.
    #[error("Job {job_id} still not finished after {attempts} polls")]
    Timeout { job_id: String, attempts: u32 },

    /// Fetching the converted bytes failed.
    #[error("Failed to download converted file: {detail}")]
    Download { detail: String },
}
