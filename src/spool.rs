//! Per-page persistence for channel captures.
//!
//! Every fetched page lands in `channel_<id>_page_<n>.json` before the next
//! request goes out. Once the channel is fully captured the pages are merged
//! into `channel_<id>_messages.json` and deleted.

use crate::error::{ExportError, Result};
use crate::paginate::CursorKind;
use crate::utils::{read_json, write_json_atomic};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One API response worth of raw messages. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePage {
    pub channel_id: String,
    pub page: usize,
    pub messages: Vec<Value>,
}

/// The merged artifact for a fully captured channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedChannel {
    pub channel: Value,
    pub messages: Vec<Value>,
    pub export_timestamp: DateTime<Utc>,
    pub total_messages: usize,
}

/// State reconstructed from page artifacts left by an earlier run.
#[derive(Debug, Default)]
pub struct SpooledPages {
    pub pages: usize,
    pub messages: usize,
    pub last_cursor: Option<String>,
    /// Length of the highest page; a short page means the capture had finished.
    pub last_page_len: usize,
}

pub struct PageSpool {
    dir: PathBuf,
    channel_id: String,
}

impl PageSpool {
    pub fn new(dir: impl Into<PathBuf>, channel_id: &str) -> Self {
        Self {
            dir: dir.into(),
            channel_id: channel_id.to_string(),
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn page_path(&self, page: usize) -> PathBuf {
        self.dir
            .join(format!("channel_{}_page_{}.json", self.channel_id, page))
    }

    pub fn merged_path(&self) -> PathBuf {
        self.dir
            .join(format!("channel_{}_messages.json", self.channel_id))
    }

    fn parse_page_index(&self, file_name: &str) -> Option<usize> {
        let prefix = format!("channel_{}_page_", self.channel_id);
        file_name
            .strip_prefix(&prefix)?
            .strip_suffix(".json")?
            .parse()
            .ok()
    }

    /// Page artifacts currently on disk, ascending by page index.
    pub fn existing_pages(&self) -> Result<Vec<(usize, PathBuf)>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ExportError::io(&self.dir, e)),
        };
        let mut pages: Vec<(usize, PathBuf)> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name();
                let index = self.parse_page_index(&name.to_string_lossy())?;
                Some((index, entry.path()))
            })
            .collect();
        pages.sort_by_key(|(index, _)| *index);
        Ok(pages)
    }

    /// Pages forming the unbroken run 1..=n. Anything past a gap is removed,
    /// since it cannot be ordered relative to the missing page.
    fn contiguous_pages(&self) -> Result<Vec<(usize, PathBuf)>> {
        let mut pages = self.existing_pages()?;
        let run = pages
            .iter()
            .enumerate()
            .take_while(|(i, (index, _))| *index == i + 1)
            .count();
        for (index, path) in pages.drain(run..) {
            warn!(
                channel_id = %self.channel_id,
                page = index,
                "discarding page artifact outside the contiguous run"
            );
            fs::remove_file(&path).map_err(|e| ExportError::io(&path, e))?;
        }
        Ok(pages)
    }

    fn read_page(&self, path: &Path) -> Result<MessagePage> {
        read_json(path)
    }

    /// Rebuild capture state from pages written by an interrupted run.
    pub fn load_existing(&self, cursor: CursorKind) -> Result<SpooledPages> {
        let pages = self.contiguous_pages()?;
        let mut state = SpooledPages::default();
        for (index, path) in &pages {
            let page = self.read_page(path)?;
            state.pages = *index;
            state.messages += page.messages.len();
            state.last_page_len = page.messages.len();
            if let Some(last) = page.messages.last() {
                state.last_cursor = cursor.extract(last);
            }
        }
        if state.pages > 0 {
            debug!(
                channel_id = %self.channel_id,
                pages = state.pages,
                messages = state.messages,
                "found spooled pages"
            );
        }
        Ok(state)
    }

    pub fn write_page(&self, page: usize, messages: &[Value]) -> Result<()> {
        let record = MessagePage {
            channel_id: self.channel_id.clone(),
            page,
            messages: messages.to_vec(),
        };
        write_json_atomic(&self.page_path(page), &record)
    }

    /// Concatenate every page in index order into the merged artifact, then
    /// delete the pages. Returns the merged message count.
    pub fn merge(&self, channel: &Value) -> Result<usize> {
        let pages = self.contiguous_pages()?;
        let mut messages = Vec::new();
        for (_, path) in &pages {
            messages.extend(self.read_page(path)?.messages);
        }

        let merged = MergedChannel {
            channel: channel.clone(),
            total_messages: messages.len(),
            messages,
            export_timestamp: Utc::now(),
        };
        write_json_atomic(&self.merged_path(), &merged)?;

        for (_, path) in &pages {
            fs::remove_file(path).map_err(|e| ExportError::io(path, e))?;
        }
        Ok(merged.total_messages)
    }

    pub fn read_merged(&self) -> Result<MergedChannel> {
        read_json(&self.merged_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn msgs(ids: &[&str]) -> Vec<Value> {
        ids.iter().map(|id| json!({ "id": id })).collect()
    }

    #[test]
    fn load_reconstructs_cursor_from_last_page() {
        let dir = TempDir::new().unwrap();
        let spool = PageSpool::new(dir.path(), "c1");
        spool.write_page(1, &msgs(&["m5", "m4"])).unwrap();
        spool.write_page(2, &msgs(&["m3", "m2"])).unwrap();

        let state = spool.load_existing(CursorKind::BeforeId).unwrap();
        assert_eq!(state.pages, 2);
        assert_eq!(state.messages, 4);
        assert_eq!(state.last_cursor.as_deref(), Some("m2"));
    }

    #[test]
    fn pages_sort_numerically() {
        let dir = TempDir::new().unwrap();
        let spool = PageSpool::new(dir.path(), "c1");
        for n in [10, 2, 1, 3, 4, 5, 6, 7, 8, 9] {
            spool.write_page(n, &msgs(&[&format!("p{n}")])).unwrap();
        }
        let order: Vec<usize> = spool
            .existing_pages()
            .unwrap()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(order, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn other_channels_are_ignored() {
        let dir = TempDir::new().unwrap();
        PageSpool::new(dir.path(), "c1").write_page(1, &msgs(&["a"])).unwrap();
        PageSpool::new(dir.path(), "c10").write_page(1, &msgs(&["b"])).unwrap();
        let pages = PageSpool::new(dir.path(), "c1").existing_pages().unwrap();
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn pages_after_a_gap_are_dropped() {
        let dir = TempDir::new().unwrap();
        let spool = PageSpool::new(dir.path(), "c1");
        spool.write_page(1, &msgs(&["a"])).unwrap();
        spool.write_page(3, &msgs(&["c"])).unwrap();
        let state = spool.load_existing(CursorKind::BeforeId).unwrap();
        assert_eq!(state.pages, 1);
        assert!(!spool.page_path(3).exists());
    }

    #[test]
    fn merge_preserves_order_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let spool = PageSpool::new(dir.path(), "c1");
        spool.write_page(1, &msgs(&["m4", "m3"])).unwrap();
        spool.write_page(2, &msgs(&["m2", "m1"])).unwrap();

        let total = spool.merge(&json!({"id": "c1", "name": "general"})).unwrap();
        assert_eq!(total, 4);
        assert!(spool.existing_pages().unwrap().is_empty());

        let merged = spool.read_merged().unwrap();
        let ids: Vec<&str> = merged
            .messages
            .iter()
            .map(|m| m["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["m4", "m3", "m2", "m1"]);
        assert_eq!(merged.total_messages, 4);
        assert_eq!(merged.channel["name"], "general");
    }

    #[test]
    fn merge_with_no_pages_writes_empty_artifact() {
        let dir = TempDir::new().unwrap();
        let spool = PageSpool::new(dir.path(), "c1");
        assert_eq!(spool.merge(&json!({"id": "c1"})).unwrap(), 0);
        assert!(spool.merged_path().exists());
    }
}
