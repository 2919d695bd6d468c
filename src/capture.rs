//! Resumable message capture for a single channel.
//!
//! Page artifacts on disk are the source of truth for where a capture stands.
//! The checkpoint mirrors them and is updated after each page lands.

use crate::checkpoint::CheckpointStore;
use crate::client::Api;
use crate::error::{ApiError, Result};
use crate::paginate::{FetchOutcome, PaginatedFetcher, Resource};
use crate::spool::PageSpool;
use serde_json::Value;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum CaptureOutcome {
    /// Finished in an earlier run; nothing was requested.
    AlreadyDone { messages: usize },
    /// Every page was captured and merged.
    Complete { pages: usize, messages: usize },
    /// A request failed. Pages captured so far stay spooled for the next run.
    Partial {
        pages: usize,
        messages: usize,
        error: ApiError,
    },
}

/// Capture the full message history of `channel` into `spool`.
///
/// Picks up after the last spooled page, so running this again after a
/// failure yields the same merged artifact as an uninterrupted run.
pub fn capture_channel<A: Api>(
    fetcher: &PaginatedFetcher<A>,
    spool: &PageSpool,
    store: &mut CheckpointStore,
    channel: &Value,
) -> Result<CaptureOutcome> {
    let channel_id = spool.channel_id();

    if store.is_done(channel_id) {
        if spool.merged_path().exists() {
            let messages = store
                .progress(channel_id)
                .map(|p| p.messages_exported)
                .unwrap_or_default();
            debug!(channel_id, "already captured");
            return Ok(CaptureOutcome::AlreadyDone { messages });
        }
        warn!(
            channel_id,
            path = %spool.merged_path().display(),
            "checkpoint says done but the merged file is missing; capturing again"
        );
    }

    let resource = Resource::channel_messages(channel_id);
    let spooled = spool.load_existing(resource.cursor)?;
    let mut pages = spooled.pages;
    let mut messages = spooled.messages;
    let mut cursor = spooled.last_cursor;

    // The checkpoint may lag one page behind the spool after a crash.
    if pages > 0 {
        store.record_page(channel_id, pages, messages, cursor.clone())?;
    }

    let outcome = if pages > 0 && spooled.last_page_len < resource.page_size {
        info!(channel_id, pages, "capture had already reached the end; merging");
        FetchOutcome::Complete
    } else if pages > 0 && cursor.is_none() {
        // Requesting without a cursor would start over from the newest message.
        warn!(channel_id, pages, "last spooled page has no cursor; cannot resume");
        FetchOutcome::Partial(ApiError::Decode {
            endpoint: resource.endpoint.clone(),
            message: format!("last spooled record has no `{}`", resource.cursor.field()),
        })
    } else {
        if pages > 0 {
            info!(channel_id, pages, messages, "resuming capture");
        }
        let report = fetcher.fetch_pages(&resource, cursor.clone(), |page: &[Value]| -> Result<()> {
            pages += 1;
            messages += page.len();
            spool.write_page(pages, page)?;
            cursor = page.last().and_then(|m| resource.cursor.extract(m));
            store.record_page(channel_id, pages, messages, cursor.clone())
        })?;
        report.outcome
    };

    match outcome {
        FetchOutcome::Complete => {
            let total = spool.merge(channel)?;
            store.mark_done(channel_id, pages, total, cursor)?;
            Ok(CaptureOutcome::Complete {
                pages,
                messages: total,
            })
        }
        FetchOutcome::Partial(error) => Ok(CaptureOutcome::Partial {
            pages,
            messages,
            error,
        }),
    }
}
