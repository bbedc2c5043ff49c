//! HTTP request boundary for the conversion service.
//!
//! Thin by design: parse the multipart upload into a
//! [`ConversionRequest`], hand it to the orchestrator, stage and archive
//! the results, stream the zip back. All conversion logic lives in the
//! library modules; this file only translates between HTTP and the core
//! types.
//!
//! The zip is fully assembled before any success header is committed, so
//! every failure (including archive assembly) reaches the caller as the
//! structured JSON payload `{"status": "error", "message": …}` rather than
//! a truncated binary stream.

use crate::archive;
use crate::batch::run_batch;
use crate::config::ConvertConfig;
use crate::error::ConvertError;
use crate::request::{ConversionRequest, SourceFile, TargetFormat};
use crate::storage::BatchDir;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Multipart uploads are capped well above the 20-file batch limit but
/// below anything that would exhaust memory.
const MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

/// Shared state for all request handlers.
pub struct AppState {
    pub config: ConvertConfig,
    /// Root directory for per-batch output staging folders.
    pub output_root: PathBuf,
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/convert", post(convert_handler))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

/// The JSON error payload: `{"status": "error", "message": …}`.
fn error_response(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(ErrorBody {
            status: "error",
            message,
        }),
    )
        .into_response()
}

/// Map a batch-fatal error to its HTTP status class.
///
/// Validation problems are the caller's fault; an all-failed batch is
/// reported as unprocessable input; everything else (configuration,
/// storage, archive) is a server-side failure.
fn status_for(error: &ConvertError) -> StatusCode {
    match error {
        ConvertError::EmptyBatch
        | ConvertError::BatchTooLarge { .. }
        | ConvertError::UnsupportedFormat { .. } => StatusCode::BAD_REQUEST,
        ConvertError::AllFilesFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `POST /convert`: multipart upload of up to 20 `files` parts plus a
/// `format` field; responds with a zip of the converted files.
async fn convert_handler(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    let request = match parse_upload(multipart, &state.config).await {
        Ok(request) => request,
        Err(response) => return response,
    };

    let outcome = match run_batch(request, &state.config).await {
        Ok(outcome) => outcome,
        Err(e) => return error_response(status_for(&e), e.to_string()),
    };

    // Stage converted bytes in the batch folder, read them back, and zip.
    // The folder is released on every path out of this block; `BatchDir`'s
    // drop guard covers the panic path.
    let mut dir = match BatchDir::allocate(&state.output_root, &outcome.batch_id).await {
        Ok(dir) => dir,
        Err(e) => return error_response(status_for(&e), e.to_string()),
    };

    let archive_bytes = stage_and_assemble(&dir, &outcome.succeeded).await;
    dir.release().await;

    let archive_bytes = match archive_bytes {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(batch_id = %outcome.batch_id, %e, "Failed to produce archive");
            return error_response(status_for(&e), e.to_string());
        }
    };

    info!(
        batch_id = %outcome.batch_id,
        entries = outcome.succeeded.len(),
        failed = outcome.failed.len(),
        archive_bytes = archive_bytes.len(),
        "Serving archive"
    );

    (
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"CONVERTED-{}.zip\"", outcome.batch_id),
            ),
        ],
        archive_bytes,
    )
        .into_response()
}

/// Persist each converted file into the batch folder, then read the folder
/// back and assemble the zip from what is actually on disk.
async fn stage_and_assemble(
    dir: &BatchDir,
    files: &[crate::outcome::ConvertedFile],
) -> Result<Vec<u8>, ConvertError> {
    for file in files {
        dir.persist(&file.output_name, &file.bytes).await?;
    }
    let entries = dir.read_all().await?;
    archive::assemble(&entries)
}

/// Parse the multipart payload into a [`ConversionRequest`].
///
/// Accepts `files` parts (one per uploaded file) and a `format` text field;
/// a missing format defaults to `pdf`. Parts beyond the batch limit are
/// still drained so the validation error reports the true count.
async fn parse_upload(
    mut multipart: Multipart,
    config: &ConvertConfig,
) -> Result<ConversionRequest, Response> {
    let mut files: Vec<SourceFile> = Vec::new();
    let mut format: Option<String> = None;
    let mut file_count = 0usize;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return Err(error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Malformed multipart payload: {e}"),
                ));
            }
        };

        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("files") => {
                let filename = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("upload-{}", file_count + 1));
                file_count += 1;
                // Past the limit we only count, to report the real total.
                if file_count > config.max_batch_size {
                    continue;
                }
                let bytes = match field.bytes().await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        return Err(error_response(
                            StatusCode::BAD_REQUEST,
                            format!("Failed to read upload '{filename}': {e}"),
                        ));
                    }
                };
                files.push(SourceFile::new(filename, bytes.to_vec()));
            }
            Some("format") => match field.text().await {
                Ok(text) => format = Some(text),
                Err(e) => {
                    return Err(error_response(
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read format field: {e}"),
                    ));
                }
            },
            _ => {} // unknown fields are ignored, matching the original form
        }
    }

    if file_count > config.max_batch_size {
        let e = ConvertError::BatchTooLarge {
            count: file_count,
            max: config.max_batch_size,
        };
        return Err(error_response(status_for(&e), e.to_string()));
    }

    let target: TargetFormat = match format.as_deref().unwrap_or("pdf").parse() {
        Ok(target) => target,
        Err(e) => return Err(error_response(StatusCode::BAD_REQUEST, e.to_string())),
    };

    Ok(ConversionRequest::new(files, target))
}
