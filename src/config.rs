use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://www.guilded.gg/api";
pub const DEFAULT_TARGET_DIR: &str = "guilded-export";
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Environment override for the inter-page delay, in milliseconds.
pub const PAGE_DELAY_ENV: &str = "GUILDED_EXPORT_PAGE_DELAY_MS";

/// How captured data is written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    /// Raw API responses, untouched apart from CDN URL rewriting.
    Raw,
    /// Discord takeout layout, translated from the raw capture.
    Translated,
}

impl ExportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportMode::Raw => "raw",
            ExportMode::Translated => "translated",
        }
    }
}

impl std::fmt::Display for ExportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when a page request fails mid-loop.
///
/// `max_retries == 0` keeps the historical behaviour: stop on the first
/// failure and keep what was already captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Up to `max_retries` retries with the default linear backoff.
    pub const fn with_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Configuration required to run an export.
/// This decouples the logic from how the arguments were parsed (CLI/Config file).
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub target_dir: PathBuf,
    pub api_url: String,
    pub token: String,
    pub mode: ExportMode,
    /// Servers to export. Empty means every server the account belongs to.
    pub servers: Vec<String>,
    pub page_delay: Duration,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub include_dms: bool,
    pub quiet: bool,
}

impl ExportConfig {
    pub fn new(target_dir: impl Into<PathBuf>, token: impl Into<String>, mode: ExportMode) -> Self {
        Self {
            target_dir: target_dir.into(),
            api_url: DEFAULT_API_URL.to_string(),
            token: token.into(),
            mode,
            servers: Vec::new(),
            page_delay: DEFAULT_PAGE_DELAY,
            retry: RetryPolicy::none(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            include_dms: false,
            quiet: false,
        }
    }

    /// Directory holding raw captures, page artifacts and checkpoints.
    pub fn raw_dir(&self) -> PathBuf {
        self.target_dir.join("raw")
    }
}

/// Resolve the inter-page delay: explicit value > environment > config file > default.
pub fn resolve_page_delay(
    cli_ms: Option<u64>,
    env_value: Option<&str>,
    file_ms: Option<u64>,
) -> Duration {
    let env_ms = env_value.and_then(|v| match v.trim().parse::<u64>() {
        Ok(ms) => Some(ms),
        Err(_) => {
            tracing::warn!(value = v, "ignoring unparsable {}", PAGE_DELAY_ENV);
            None
        }
    });
    cli_ms
        .or(env_ms)
        .or(file_ms)
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_PAGE_DELAY)
}
