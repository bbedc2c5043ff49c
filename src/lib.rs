//! # batch-convert
//!
//! Convert a batch of uploaded files to a single target format through the
//! CloudConvert API, and package the results as one downloadable zip.
//!
//! ## Why this crate?
//!
//! Format conversion itself is delegated entirely to the external service.
//! The hard part is the orchestration around it: turning N independent
//! uploads into N remote jobs, tracking each job to completion or failure,
//! keeping one bad file from sinking its siblings, and cleaning up scratch
//! storage on every exit path. That orchestration is what this crate
//! implements.
//!
//! ## Pipeline Overview
//!
//! ```text
//! uploads
//!  │
//!  ├─ 1. Validate  batch size and target format, before any network call
//!  ├─ 2. Fan out   one remote job per file, bounded concurrency
//!  │                (create job → upload → poll → download, per file)
//!  ├─ 3. Stage     converted bytes into a per-batch scratch folder
//!  ├─ 4. Archive   zip of every successful output, one entry per file
//!  └─ 5. Cleanup   scratch folder released on every path, even panics
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batch_convert::{run_batch, ConversionRequest, ConvertConfig, SourceFile, TargetFormat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConvertConfig::builder()
//!         .api_key(std::env::var("CLOUDCONVERT_API_KEY")?)
//!         .concurrency(4)
//!         .build()?;
//!
//!     let request = ConversionRequest::new(
//!         vec![SourceFile::new("photo.png", std::fs::read("photo.png")?)],
//!         TargetFormat::Pdf,
//!     );
//!
//!     let outcome = run_batch(request, &config).await?;
//!     for file in &outcome.succeeded {
//!         println!("{} ({} bytes)", file.output_name, file.bytes.len());
//!     }
//!     for failure in &outcome.failed {
//!         eprintln!("{}: {}", failure.filename, failure.error);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | Enables the `convertd` HTTP server binary (axum + clap + tracing-subscriber) |
//!
//! Disable `server` when using only the library:
//! ```toml
//! batch-convert = { version = "0.3", default-features = false }
//! ```
//!
//! ## Failure model
//!
//! A single file's remote job failing is *not* an error: it is recorded in
//! [`BatchOutcome::failed`] and the remaining files still ship in the
//! archive. Only validation problems, configuration problems, storage or
//! archive failures, and the all-files-failed case abort a batch; see
//! [`ConvertError`] vs [`JobError`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod archive;
pub mod batch;
pub mod client;
pub mod config;
pub mod error;
pub mod outcome;
pub mod progress;
pub mod request;
#[cfg(feature = "server")]
pub mod server;
pub mod storage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::run_batch;
pub use client::{ConvertClient, JobState};
pub use config::{ConvertConfig, ConvertConfigBuilder, DEFAULT_API_BASE};
pub use error::{ConvertError, JobError};
pub use outcome::{BatchOutcome, BatchStats, ConvertedFile, FailedFile};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use request::{ConversionRequest, SourceFile, TargetFormat};
pub use storage::{new_batch_id, BatchDir};
