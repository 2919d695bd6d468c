//! Durable per-server capture progress.
//!
//! The checkpoint lives at `server_<id>_checkpoint.json` and is rewritten with
//! write-then-rename after every page, so a crash leaves either the previous
//! or the new version on disk, never a torn file.

use crate::config::ExportMode;
use crate::error::{ExportError, Result};
use crate::utils::{read_json, write_json_atomic};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const CHECKPOINT_VERSION: u32 = 1;

/// Capture status of one channel. Ordered; it only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Pending,
    InProgress,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelProgress {
    pub status: ChannelStatus,
    #[serde(default)]
    pub pages_fetched: usize,
    #[serde(default)]
    pub messages_exported: usize,
    /// Cursor for the next page: the id of the last captured message.
    #[serde(default, rename = "last_message_id")]
    pub last_cursor: Option<String>,
    /// Pinned messages and thread listing were fetched after the history.
    #[serde(default)]
    pub extras_captured: bool,
}

impl ChannelProgress {
    fn pending() -> Self {
        Self {
            status: ChannelStatus::Pending,
            pages_fetched: 0,
            messages_exported: 0,
            last_cursor: None,
            extras_captured: false,
        }
    }

    fn advance(&mut self, to: ChannelStatus) {
        if to > self.status {
            self.status = to;
        }
    }
}

/// One server capture attempt, as persisted in the checkpoint file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportJob {
    pub version: u32,
    pub server_id: String,
    pub server_name: String,
    pub export_format: ExportMode,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelProgress>,
}

impl ExportJob {
    fn new(server_id: &str, server_name: &str, mode: ExportMode) -> Self {
        let now = Utc::now();
        Self {
            version: CHECKPOINT_VERSION,
            server_id: server_id.to_string(),
            server_name: server_name.to_string(),
            export_format: mode,
            created_at: now,
            last_updated_at: now,
            channels: BTreeMap::new(),
        }
    }
}

/// Owner of a server's checkpoint file. Only the active export task writes it.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    job: ExportJob,
}

impl CheckpointStore {
    pub fn path_for(dir: &Path, server_id: &str) -> PathBuf {
        dir.join(format!("server_{server_id}_checkpoint.json"))
    }

    /// Load the checkpoint for `server_id` from `dir`, or start a fresh job.
    ///
    /// A fresh job is not written until something is recorded.
    pub fn open(dir: &Path, server_id: &str, server_name: &str, mode: ExportMode) -> Result<Self> {
        let path = Self::path_for(dir, server_id);
        if !path.exists() {
            return Ok(Self {
                path,
                job: ExportJob::new(server_id, server_name, mode),
            });
        }

        let mut job: ExportJob = read_json(&path)?;
        if job.server_id != server_id {
            return Err(ExportError::CheckpointMismatch {
                path,
                expected: server_id.to_string(),
                found: job.server_id,
            });
        }
        if job.version > CHECKPOINT_VERSION {
            warn!(
                path = %path.display(),
                version = job.version,
                "checkpoint written by a newer version; reading it anyway"
            );
        }
        if job.export_format != mode {
            info!(
                server_id,
                previous = %job.export_format,
                current = %mode,
                "export format changed since last run; raw capture progress is reused"
            );
            job.export_format = mode;
        }
        let done = job
            .channels
            .values()
            .filter(|c| c.status == ChannelStatus::Done)
            .count();
        info!(
            server_id,
            channels = job.channels.len(),
            done,
            "resuming from checkpoint"
        );
        Ok(Self { path, job })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn progress(&self, channel_id: &str) -> Option<&ChannelProgress> {
        self.job.channels.get(channel_id)
    }

    pub fn is_done(&self, channel_id: &str) -> bool {
        self.progress(channel_id)
            .is_some_and(|p| p.status == ChannelStatus::Done)
    }

    /// Add a pending entry for every channel not seen before.
    pub fn register_channels<'a, I>(&mut self, channel_ids: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut added = false;
        for id in channel_ids {
            if !self.job.channels.contains_key(id) {
                self.job
                    .channels
                    .insert(id.to_string(), ChannelProgress::pending());
                added = true;
            }
        }
        if added { self.save() } else { Ok(()) }
    }

    /// Record capture state after a page artifact has been written.
    pub fn record_page(
        &mut self,
        channel_id: &str,
        pages_fetched: usize,
        messages_exported: usize,
        last_cursor: Option<String>,
    ) -> Result<()> {
        let entry = self.entry(channel_id);
        entry.advance(ChannelStatus::InProgress);
        entry.pages_fetched = pages_fetched;
        entry.messages_exported = messages_exported;
        entry.last_cursor = last_cursor;
        self.save()
    }

    /// Finalize a channel after its pages were merged.
    pub fn mark_done(
        &mut self,
        channel_id: &str,
        pages_fetched: usize,
        messages_exported: usize,
        last_cursor: Option<String>,
    ) -> Result<()> {
        let entry = self.entry(channel_id);
        entry.advance(ChannelStatus::Done);
        entry.pages_fetched = pages_fetched;
        entry.messages_exported = messages_exported;
        entry.last_cursor = last_cursor;
        self.save()
    }

    pub fn extras_captured(&self, channel_id: &str) -> bool {
        self.progress(channel_id).is_some_and(|p| p.extras_captured)
    }

    pub fn mark_extras_captured(&mut self, channel_id: &str) -> Result<()> {
        self.entry(channel_id).extras_captured = true;
        self.save()
    }

    fn entry(&mut self, channel_id: &str) -> &mut ChannelProgress {
        self.job
            .channels
            .entry(channel_id.to_string())
            .or_insert_with(ChannelProgress::pending)
    }

    pub fn save(&mut self) -> Result<()> {
        self.job.last_updated_at = Utc::now();
        write_json_atomic(&self.path, &self.job)
    }
}
