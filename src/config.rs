//! Configuration for batch conversion.
//!
//! All behaviour is controlled through [`ConvertConfig`], built via its
//! [`ConvertConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share the config across handlers, log it (the credential is
//! redacted), and diff two deployments to understand why they behave
//! differently.
//!
//! The config is constructed once at process start and passed by reference
//! into the client and orchestrator; nothing deeper in the call tree reads
//! the environment.

use crate::error::ConvertError;
use crate::progress::ProgressCallback;
use std::fmt;

/// Default public endpoint of the conversion service.
pub const DEFAULT_API_BASE: &str = "https://api.cloudconvert.com/v2";

/// Configuration for the conversion pipeline.
///
/// Built via [`ConvertConfig::builder()`] or [`ConvertConfig::default()`].
///
/// # Example
/// ```rust
/// use batch_convert::ConvertConfig;
///
/// let config = ConvertConfig::builder()
///     .api_key("cc_live_example")
///     .concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConvertConfig {
    /// Bearer credential for the conversion service. `None` means every
    /// conversion attempt fails with a configuration error, a deliberate
    /// fail-fast rather than a per-request surprise.
    pub api_key: Option<String>,

    /// Base URL of the conversion service API. Default: [`DEFAULT_API_BASE`].
    ///
    /// Overridable so tests can point the client at a local mock server.
    pub api_base: String,

    /// Interval between job-status polls, in milliseconds. Default: 2000.
    pub poll_interval_ms: u64,

    /// Maximum number of status polls per job before giving up. Default: 60.
    ///
    /// Together with the 2 s interval this gives each file a ~2 minute
    /// ceiling. The budget applies per file, not per batch.
    pub max_poll_attempts: u32,

    /// Number of files converted concurrently within one batch. Default: 4.
    ///
    /// Conversion is network-bound; without a bound a 20-file batch would
    /// open 20 simultaneous jobs against the service's rate limits, and with
    /// concurrency 1 the same batch could serialise 20 × 2 minutes of
    /// worst-case polling.
    pub concurrency: usize,

    /// Maximum number of files accepted in one batch. Default: 20.
    pub max_batch_size: usize,

    /// Per-request HTTP timeout in seconds (job creation, upload, poll,
    /// download are each one request). Default: 30.
    pub request_timeout_secs: u64,

    /// Optional per-file progress callback. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            poll_interval_ms: 2000,
            max_poll_attempts: 60,
            concurrency: 4,
            max_batch_size: 20,
            request_timeout_secs: 30,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConvertConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvertConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .field("concurrency", &self.concurrency)
            .field("max_batch_size", &self.max_batch_size)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

impl ConvertConfig {
    /// Create a new builder for `ConvertConfig`.
    pub fn builder() -> ConvertConfigBuilder {
        ConvertConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConvertConfig`].
pub struct ConvertConfigBuilder {
    config: ConvertConfig,
}

impl ConvertConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        // Trailing slashes double up when joined with "/jobs" etc.
        self.config.api_base = base.trim_end_matches('/').to_string();
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn max_poll_attempts(mut self, n: u32) -> Self {
        self.config.max_poll_attempts = n;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_batch_size(mut self, n: usize) -> Self {
        self.config.max_batch_size = n;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConvertConfig, ConvertError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(ConvertError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.max_poll_attempts == 0 {
            return Err(ConvertError::InvalidConfig(
                "Poll attempt budget must be ≥ 1".into(),
            ));
        }
        if c.max_batch_size == 0 {
            return Err(ConvertError::InvalidConfig(
                "Batch size limit must be ≥ 1".into(),
            ));
        }
        if c.api_base.is_empty() {
            return Err(ConvertError::InvalidConfig("API base URL is empty".into()));
        }
        Ok(self.config)
    }
}
