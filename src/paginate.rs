//! Cursor-based "fetch until short page" pagination.
//!
//! The API exposes no total count and no "has more" flag. A page holding
//! fewer records than the endpoint's fixed page size is the last one.

use crate::client::Api;
use crate::config::RetryPolicy;
use crate::error::ApiError;
use serde_json::Value;
use std::convert::Infallible;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, warn};

pub const MESSAGE_PAGE_SIZE: usize = 50;
pub const THREAD_PAGE_SIZE: usize = 50;
pub const DM_CHANNEL_PAGE_SIZE: usize = 25;

/// How the next page's cursor is derived from the last record of the previous page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorKind {
    /// `beforeId=<last record id>`
    BeforeId,
    /// `beforeDate=<last record createdAt>`
    BeforeDate,
}

impl CursorKind {
    pub fn param(&self) -> &'static str {
        match self {
            CursorKind::BeforeId => "beforeId",
            CursorKind::BeforeDate => "beforeDate",
        }
    }

    /// Record field the cursor is read from.
    pub fn field(&self) -> &'static str {
        match self {
            CursorKind::BeforeId => "id",
            CursorKind::BeforeDate => "createdAt",
        }
    }

    pub fn extract(&self, record: &Value) -> Option<String> {
        match record.get(self.field())? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// A paginated REST collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub endpoint: String,
    /// Key of the record array in the response body.
    pub items_key: &'static str,
    pub page_size: usize,
    pub cursor: CursorKind,
}

impl Resource {
    pub fn channel_messages(channel_id: &str) -> Self {
        Self {
            endpoint: format!("channels/{channel_id}/messages"),
            items_key: "messages",
            page_size: MESSAGE_PAGE_SIZE,
            cursor: CursorKind::BeforeId,
        }
    }

    pub fn channel_threads(channel_id: &str) -> Self {
        Self {
            endpoint: format!("channels/{channel_id}/threads"),
            items_key: "threads",
            page_size: THREAD_PAGE_SIZE,
            cursor: CursorKind::BeforeDate,
        }
    }

    pub fn dm_channels(user_id: &str) -> Self {
        Self {
            endpoint: format!("users/{user_id}/channels"),
            items_key: "channels",
            page_size: DM_CHANNEL_PAGE_SIZE,
            cursor: CursorKind::BeforeId,
        }
    }
}

/// How a pagination loop ended.
#[derive(Debug)]
pub enum FetchOutcome {
    /// An empty or short page was seen.
    Complete,
    /// A request failed; every page before it was already delivered.
    Partial(ApiError),
}

impl FetchOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, FetchOutcome::Complete)
    }
}

#[derive(Debug)]
pub struct FetchReport {
    pub pages: usize,
    pub records: usize,
    /// Cursor derived from the last delivered record (or the starting cursor).
    pub last_cursor: Option<String>,
    pub outcome: FetchOutcome,
}

/// Drives one paginated resource at a time, sequentially.
pub struct PaginatedFetcher<A> {
    api: A,
    delay: Duration,
    retry: RetryPolicy,
}

impl<A: Api> PaginatedFetcher<A> {
    pub fn new(api: A, delay: Duration, retry: RetryPolicy) -> Self {
        Self { api, delay, retry }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Fetch every remaining page of `resource`, starting after `start_cursor`.
    ///
    /// `on_page` runs for each non-empty page before the next request is issued.
    /// Its error aborts the loop and is returned as-is; request failures do not
    /// produce `Err` but end the loop with [`FetchOutcome::Partial`].
    pub fn fetch_pages<F, E>(
        &self,
        resource: &Resource,
        start_cursor: Option<String>,
        mut on_page: F,
    ) -> Result<FetchReport, E>
    where
        F: FnMut(&[Value]) -> Result<(), E>,
    {
        let mut cursor = start_cursor;
        let mut pages = 0usize;
        let mut records = 0usize;

        let outcome = loop {
            let items = match self.request_page(resource, cursor.as_deref()) {
                Ok(items) => items,
                Err(e) => {
                    error!(
                        resource = %resource.endpoint,
                        pages,
                        "pagination stopped early: {e}"
                    );
                    break FetchOutcome::Partial(e);
                }
            };

            if items.is_empty() {
                break FetchOutcome::Complete;
            }

            on_page(&items)?;
            pages += 1;
            records += items.len();
            debug!(resource = %resource.endpoint, page = pages, count = items.len(), "fetched page");

            match items.last().and_then(|last| resource.cursor.extract(last)) {
                Some(next) => cursor = Some(next),
                None if items.len() < resource.page_size => {}
                None => {
                    warn!(resource = %resource.endpoint, pages, "last record has no cursor field; stopping");
                    break FetchOutcome::Partial(ApiError::Decode {
                        endpoint: resource.endpoint.clone(),
                        message: format!("last record of a full page has no `{}`", resource.cursor.field()),
                    });
                }
            }

            if items.len() < resource.page_size {
                break FetchOutcome::Complete;
            }

            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
        };

        Ok(FetchReport {
            pages,
            records,
            last_cursor: cursor,
            outcome,
        })
    }

    /// Collect a whole resource in memory.
    pub fn fetch_all(&self, resource: &Resource) -> (Vec<Value>, FetchOutcome) {
        let mut all = Vec::new();
        let Ok(report) = self.fetch_pages(resource, None, |page| -> Result<(), Infallible> {
            all.extend_from_slice(page);
            Ok(())
        });
        (all, report.outcome)
    }

    fn request_page(&self, resource: &Resource, cursor: Option<&str>) -> Result<Vec<Value>, ApiError> {
        let mut params = Vec::new();
        if let Some(c) = cursor {
            params.push((resource.cursor.param(), c.to_string()));
        }

        let mut attempt = 0u32;
        loop {
            let result = self
                .api
                .get(&resource.endpoint, &params)
                .and_then(|body| extract_items(&resource.endpoint, resource.items_key, body));
            match result {
                Ok(items) => return Ok(items),
                Err(e) if e.is_auth() || attempt >= self.retry.max_retries => return Err(e),
                Err(e) => {
                    attempt += 1;
                    let wait = self.retry.delay_for(attempt);
                    warn!(
                        resource = %resource.endpoint,
                        attempt,
                        max = self.retry.max_retries,
                        "page request failed, retrying in {wait:?}: {e}"
                    );
                    thread::sleep(wait);
                }
            }
        }
    }
}

fn extract_items(endpoint: &str, key: &str, body: Value) -> Result<Vec<Value>, ApiError> {
    match body {
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(other) => Err(ApiError::Decode {
                endpoint: endpoint.to_string(),
                message: format!("`{key}` is not an array: {other}"),
            }),
        },
        other => Err(ApiError::Decode {
            endpoint: endpoint.to_string(),
            message: format!("expected an object, got {other}"),
        }),
    }
}
