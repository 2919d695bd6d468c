//! # guilded-chat-export
//!
//! A CLI tool that exports [Guilded](https://www.guilded.gg) servers to local JSON files,
//! either as raw API captures or as a Discord-style data takeout.
//!
//! ## What it does
//!
//! Guilded serves message history through a cursor-paginated REST API with no total
//! count. This tool walks every channel of every server the account belongs to, fifty
//! messages at a time, and writes each page to disk before requesting the next one.
//! When a channel is complete its pages are merged into a single file.
//!
//! In translated mode the raw capture is then converted: message bodies (a Slate.js
//! rich-text tree) become Discord markdown, role permissions become Discord bitmasks,
//! and channels, guilds and the account are written in Discord's takeout layout.
//!
//! ## Resuming
//!
//! Progress is kept in a per-server checkpoint next to the page files. If a run is
//! interrupted or a request fails, running the same command again continues after the
//! last page on disk. The result is identical to an uninterrupted run.
//!
//! ## Usage
//!
//! ```sh
//! # Raw capture of every server
//! GUILDED_TOKEN=... guilded-chat-export ~/backups/guilded
//!
//! # Discord takeout of one server
//! guilded-chat-export ~/backups/guilded --format translated --server abc123
//! ```
//!
//! Preferences can be persisted in `~/.config/guilded-chat-export/config.toml`.
//!
//! ## Compatibility
//!
//! Tracks Guilded's internal (undocumented) web API. Endpoints and payload shapes
//! may change without notice.

pub mod capture;
pub mod checkpoint;
pub mod client;
pub mod config;
pub mod document;
pub mod error;
pub mod export;
pub mod paginate;
pub mod permissions;
pub mod renderer;
pub mod schema;
pub mod spool;
pub mod utils;

pub use config::{ExportConfig, ExportMode, RetryPolicy};
pub use error::{ApiError, ExportError};
pub use export::{ExportSummary, run};
