use clap::Parser;
use eyre::{Context, Result, eyre};
use guilded_chat_export::client::HttpApi;
use guilded_chat_export::config::{
    DEFAULT_API_URL, DEFAULT_TARGET_DIR, ExportConfig, ExportMode, PAGE_DELAY_ENV, RetryPolicy,
    resolve_page_delay,
};
use guilded_chat_export::{ExportError, ExportSummary};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Export Guilded servers to raw JSON or a Discord-style takeout.
/// Interrupted runs resume where they stopped.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory to write the export into.
    /// Defaults to ./guilded-export if not set in config.
    #[arg(value_name = "TARGET_DIR")]
    target_dir: Option<PathBuf>,

    /// Value of the `hmac_signed_session` cookie from a logged-in browser.
    #[arg(long, env = "GUILDED_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Output format.
    #[arg(long, value_enum)]
    format: Option<ExportMode>,

    /// Server id to export (repeatable). Defaults to every server on the account.
    #[arg(long = "server", value_name = "ID")]
    servers: Vec<String>,

    /// Path to a specific configuration file.
    /// Defaults to $XDG_CONFIG_HOME/guilded-chat-export/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Delay between page requests, in milliseconds (default 500).
    #[arg(long, value_name = "MS")]
    page_delay_ms: Option<u64>,

    /// Retries for a failed page request before the channel is left for a later run.
    #[arg(long, value_name = "N")]
    retries: Option<u32>,

    /// Base URL of the Guilded API.
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    /// Also list direct message channels.
    #[arg(long)]
    include_dms: bool,

    /// Log every page request.
    #[arg(short, long)]
    verbose: bool,

    /// Only log warnings and errors; no progress bars.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Deserialize, Default)]
struct FileConfig {
    target_dir: Option<PathBuf>,
    token: Option<String>,
    format: Option<ExportMode>,
    servers: Option<Vec<String>>,
    page_delay_ms: Option<u64>,
    retries: Option<u32>,
    api_url: Option<String>,
}

fn load_file_config(explicit_path: Option<&Path>) -> Result<FileConfig> {
    let path = if let Some(p) = explicit_path {
        if !p.exists() {
            return Err(eyre!("Config file not found: {}", p.display()));
        }
        Some(p.to_path_buf())
    } else {
        dirs::config_dir()
            .map(|d| d.join("guilded-chat-export/config.toml"))
            .filter(|p| p.exists())
    };

    match path {
        None => Ok(FileConfig::default()),
        Some(p) => {
            let content = fs::read_to_string(&p)
                .wrap_err_with(|| format!("Failed to read config: {}", p.display()))?;
            toml::from_str(&content)
                .wrap_err_with(|| format!("Failed to parse config: {}", p.display()))
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn print_summary(summary: &ExportSummary) {
    let mut line = format!(
        "Done. {} channels captured, {} already done, {} skipped, {} messages.",
        summary.captured, summary.already_done, summary.skipped, summary.messages
    );
    if summary.partial > 0 {
        line.push_str(&format!(
            " {} channel(s) incomplete; run again to resume.",
            summary.partial
        ));
    }
    if summary.errors > 0 {
        line.push_str(&format!(" Completed with {} error(s).", summary.errors));
    }
    eprintln!("{}", line);
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    // 1. Load config file (CLI path > default path)
    let file_cfg = load_file_config(cli.config.as_deref())?;

    // 2. Resolve target_dir (CLI > Config > Default)
    let target_dir = cli
        .target_dir
        .or(file_cfg.target_dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TARGET_DIR));

    // 3. Resolve token (CLI/env > Config)
    let token = cli.token.or(file_cfg.token).ok_or_else(|| {
        eyre!("No session token.\nPass --token, set GUILDED_TOKEN, or set token in config.toml.")
    })?;

    // 4. Build the Export Config
    let mut config = ExportConfig::new(
        target_dir,
        token,
        cli.format.or(file_cfg.format).unwrap_or(ExportMode::Raw),
    );
    config.servers = if cli.servers.is_empty() {
        file_cfg.servers.unwrap_or_default()
    } else {
        cli.servers
    };
    config.api_url = cli
        .api_url
        .or(file_cfg.api_url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    config.page_delay = resolve_page_delay(
        cli.page_delay_ms,
        std::env::var(PAGE_DELAY_ENV).ok().as_deref(),
        file_cfg.page_delay_ms,
    );
    config.retry = match cli.retries.or(file_cfg.retries) {
        Some(n) if n > 0 => RetryPolicy::with_retries(n),
        _ => RetryPolicy::none(),
    };
    config.include_dms = cli.include_dms;
    config.quiet = cli.quiet;

    // 5. Run the Business Logic
    let api = HttpApi::from_config(&config).wrap_err("Failed to set up the HTTP client")?;
    let summary = match guilded_chat_export::run(&config, api) {
        Ok(summary) => summary,
        Err(e @ ExportError::Auth(_)) => {
            return Err(eyre!(
                "{e}\nThe session token was rejected; copy a fresh hmac_signed_session cookie."
            ));
        }
        Err(e) => return Err(e).wrap_err("Export failed"),
    };

    if !config.quiet {
        print_summary(&summary);
    }
    Ok(())
}
