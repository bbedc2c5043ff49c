//! HTTP server binary for batch-convert.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConvertConfig`, prepares the scratch directories, and serves the
//! axum router.

use anyhow::{Context, Result};
use batch_convert::server::{router, AppState};
use batch_convert::{BatchProgressCallback, ConvertConfig};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on the default port
  CLOUDCONVERT_API_KEY=cc_live_... convertd

  # Custom port and scratch location
  convertd --port 8080 --output-dir /var/lib/convertd/output

  # Faster polling against a self-hosted service
  convertd --api-base http://convert.internal/v2 --poll-interval-ms 500

USAGE FROM A CLIENT:
  curl -F files=@a.png -F files=@b.png -F format=pdf \
       -o converted.zip http://localhost:3000/convert

ENVIRONMENT VARIABLES:
  CLOUDCONVERT_API_KEY   Bearer credential for the conversion service.
                         Read once at startup; requests fail with a
                         configuration error while it is unset.
"#;

/// Batch file conversion server backed by the CloudConvert API.
#[derive(Parser, Debug)]
#[command(
    name = "convertd",
    version,
    about = "Accept file uploads, convert them remotely, respond with a zip",
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Port to listen on.
    #[arg(short, long, env = "CONVERTD_PORT", default_value_t = 3000)]
    port: u16,

    /// Root directory for per-batch output staging folders.
    #[arg(long, env = "CONVERTD_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Conversion service API key.
    #[arg(long, env = "CLOUDCONVERT_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the conversion service API.
    #[arg(long, env = "CONVERTD_API_BASE")]
    api_base: Option<String>,

    /// Files converted concurrently within one batch.
    #[arg(short, long, env = "CONVERTD_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Interval between job-status polls, in milliseconds.
    #[arg(long, env = "CONVERTD_POLL_INTERVAL_MS", default_value_t = 2000)]
    poll_interval_ms: u64,

    /// Maximum status polls per job before the job times out.
    #[arg(long, env = "CONVERTD_MAX_POLL_ATTEMPTS", default_value_t = 60)]
    max_poll_attempts: u32,

    /// Maximum files accepted in one batch.
    #[arg(long, env = "CONVERTD_MAX_BATCH_SIZE", default_value_t = 20)]
    max_batch_size: usize,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CONVERTD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CONVERTD_QUIET")]
    quiet: bool,
}

/// Forwards per-file batch events to the tracing subscriber so every
/// request leaves a structured per-file trail in the server log.
struct LogProgress;

impl BatchProgressCallback for LogProgress {
    fn on_file_complete(&self, filename: &str, output_bytes: usize) {
        info!(file = filename, output_bytes, "Converted");
    }

    fn on_file_error(&self, filename: &str, error: &str) {
        tracing::warn!(file = filename, error, "Conversion failed");
    }

    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        info!(total_files, success_count, "Batch finished");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if cli.api_key.is_none() {
        // Startup proceeds (the key may arrive with a restart), but every
        // conversion request will fail until it is configured.
        tracing::warn!("CLOUDCONVERT_API_KEY is not set; /convert will reject all requests");
    }

    // ── Build config ─────────────────────────────────────────────────────
    let mut builder = ConvertConfig::builder()
        .concurrency(cli.concurrency)
        .poll_interval_ms(cli.poll_interval_ms)
        .max_poll_attempts(cli.max_poll_attempts)
        .max_batch_size(cli.max_batch_size)
        .progress_callback(Arc::new(LogProgress));
    if let Some(key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(base) = cli.api_base {
        builder = builder.api_base(base);
    }
    let config = builder.build().context("Invalid configuration")?;

    // ── Scratch storage must exist before the first request ──────────────
    tokio::fs::create_dir_all(&cli.output_dir)
        .await
        .with_context(|| format!("Failed to create output dir {:?}", cli.output_dir))?;

    // ── Serve ────────────────────────────────────────────────────────────
    let state = Arc::new(AppState {
        config,
        output_root: cli.output_dir,
    });
    let app = router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on http://{addr}");

    axum::serve(listener, app)
        .await
        .context("Server terminated")?;

    Ok(())
}
