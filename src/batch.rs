//! Batch orchestration: one remote conversion job per source file.
//!
//! ## Failure policy
//!
//! Per-file failures are isolated. One bad file is recorded in
//! [`BatchOutcome::failed`] and the remaining files still convert; only when
//! *every* file fails does the batch itself error (there would be nothing to
//! archive). Validation and configuration problems, by contrast, abort the
//! batch before any job is created.
//!
//! ## Concurrency
//!
//! Files fan out through `buffer_unordered` bounded by
//! [`ConvertConfig::concurrency`]. The poll ceiling (60 × 2 s by default)
//! applies per file, so without the bound a batch of N files could serialise
//! N × 2 minutes of worst-case wall time; with it, independent files overlap
//! their polling while staying inside the service's rate limits.

use crate::client::ConvertClient;
use crate::config::ConvertConfig;
use crate::error::{ConvertError, JobError};
use crate::outcome::{BatchOutcome, BatchStats, ConvertedFile, FailedFile};
use crate::request::ConversionRequest;
use crate::storage::new_batch_id;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Run one conversion batch to completion.
///
/// # Returns
/// `Ok(BatchOutcome)` when at least one file converted; check
/// `outcome.failed` for partial failures.
///
/// # Errors
/// Returns `Err(ConvertError)` only for batch-fatal conditions:
/// - empty or oversized request (no external calls are made)
/// - missing service credential (no external calls are made)
/// - every file failed and no output was produced
pub async fn run_batch(
    request: ConversionRequest,
    config: &ConvertConfig,
) -> Result<BatchOutcome, ConvertError> {
    let total_start = Instant::now();

    // ── Step 1: validate before any side effect ──────────────────────────
    request.validate(config)?;

    // ── Step 2: construct the client (credential check happens here) ─────
    let client = Arc::new(ConvertClient::new(config)?);

    let batch_id = new_batch_id();
    let total_files = request.files.len();
    let target = request.target;
    info!(
        batch_id,
        files = total_files,
        %target,
        concurrency = config.concurrency,
        "Starting conversion batch"
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total_files);
    }

    // ── Step 3: assign output names (deterministic, input order) ─────────
    let output_names = assign_output_names(&request, target.extension());

    // ── Step 4: fan out one job per file, bounded ────────────────────────
    let results: Vec<(usize, FileResult)> =
        stream::iter(request.files.into_iter().zip(output_names).enumerate().map(
            |(index, (file, output_name))| {
                let client = Arc::clone(&client);
                let config = config.clone();
                async move {
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_file_start(&file.filename, total_files);
                    }
                    let result = client
                        .convert(&file.filename, file.bytes, target)
                        .await;
                    if let Some(ref cb) = config.progress_callback {
                        match &result {
                            Ok(bytes) => cb.on_file_complete(&file.filename, bytes.len()),
                            Err(e) => cb.on_file_error(&file.filename, &e.to_string()),
                        }
                    }
                    (
                        index,
                        FileResult {
                            filename: file.filename,
                            output_name,
                            result,
                        },
                    )
                }
            },
        ))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

    // ── Step 5: split outcomes, restoring input order ────────────────────
    let mut results = results;
    results.sort_by_key(|(index, _)| *index);

    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    for (_, file_result) in results {
        match file_result.result {
            Ok(bytes) => succeeded.push(ConvertedFile {
                output_name: file_result.output_name,
                source_filename: file_result.filename,
                bytes,
            }),
            Err(error) => {
                warn!(batch_id, file = %file_result.filename, %error, "File failed");
                failed.push(FailedFile {
                    filename: file_result.filename,
                    error,
                });
            }
        }
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total_files, succeeded.len());
    }

    // ── Step 6: zero successes is a batch-level error ────────────────────
    if succeeded.is_empty() {
        let first_error = failed
            .first()
            .map(|f| f.error.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(ConvertError::AllFilesFailed {
            total: total_files,
            first_error,
        });
    }

    let stats = BatchStats {
        total_files,
        converted_files: succeeded.len(),
        failed_files: failed.len(),
        output_bytes: succeeded.iter().map(|f| f.bytes.len() as u64).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        batch_id,
        converted = stats.converted_files,
        failed = stats.failed_files,
        duration_ms = stats.total_duration_ms,
        "Batch complete"
    );

    Ok(BatchOutcome {
        batch_id,
        succeeded,
        failed,
        stats,
    })
}

struct FileResult {
    filename: String,
    output_name: String,
    result: Result<Vec<u8>, JobError>,
}

/// Compute `<base>.<ext>` output names for every file in input order,
/// disambiguating duplicate base names with `-2`, `-3`, … suffixes.
///
/// Two sources can share a base name after extension normalisation
/// (`report.png` + `report.jpg` both want `report.pdf`); a silent overwrite
/// would drop data, so the later file gets a numbered name instead.
fn assign_output_names(request: &ConversionRequest, ext: &str) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::with_capacity(request.files.len());
    request
        .files
        .iter()
        .map(|file| {
            let base = file.base_name();
            let mut candidate = format!("{base}.{ext}");
            let mut n = 2;
            while !taken.insert(candidate.clone()) {
                candidate = format!("{base}-{n}.{ext}");
                n += 1;
            }
            candidate
        })
        .collect()
}
