//! In-process object store
//!
//! Mirrors the listing semantics of S3: keys come back in lexicographic
//! order, a delimiter rolls deeper keys up into common prefixes, and long
//! listings are paged with a continuation token. The call counters let
//! tests observe how the pipeline drives the store.

use super::{ListPage, ObjectHandle, ObjectStore};
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Default number of entries per listing page, matching S3
pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Default)]
struct State {
    buckets: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
    failing_prefixes: HashSet<String>,
    downloads: Vec<String>,
}

/// Object store backed by in-memory maps
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
    page_size: usize,
    download_delay: Option<Duration>,
    list_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: DEFAULT_PAGE_SIZE,
            download_delay: None,
            list_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Return at most `page_size` entries per listing call
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Hold every download for `delay` before returning
    pub fn with_download_delay(mut self, delay: Duration) -> Self {
        self.download_delay = Some(delay);
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store an object, replacing any previous content
    pub fn put(&self, bucket: &str, key: &str, data: impl Into<Vec<u8>>) {
        self.state()
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data.into());
    }

    /// Make every listing of exactly `prefix` fail
    pub fn fail_listing(&self, bucket: &str, prefix: &str) {
        self.state().failing_prefixes.insert(format!("{bucket}/{prefix}"));
    }

    /// Keys downloaded so far, in completion order
    pub fn downloaded(&self) -> Vec<String> {
        self.state().downloads.clone()
    }

    /// Number of listing calls served
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Highest number of downloads observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// One listing entry in key order
enum Entry {
    Object(ObjectHandle),
    Prefix(String),
}

impl Entry {
    fn name(&self) -> &str {
        match self {
            Entry::Object(handle) => &handle.key,
            Entry::Prefix(prefix) => prefix,
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation: Option<&str>,
    ) -> Result<ListPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let state = self.state();

        if state.failing_prefixes.contains(&format!("{bucket}/{prefix}")) {
            return Err(IngestError::Listing {
                bucket: bucket.to_string(),
                prefix: prefix.to_string(),
                message: "AccessDenied: Access Denied".to_string(),
            });
        }

        let Some(objects) = state.buckets.get(bucket) else {
            return Err(IngestError::Listing {
                bucket: bucket.to_string(),
                prefix: prefix.to_string(),
                message: "NoSuchBucket: The specified bucket does not exist".to_string(),
            });
        };

        let mut entries = Vec::new();
        let mut rolled_up = BTreeSet::new();
        for (key, data) in objects.range(prefix.to_string()..) {
            let Some(rest) = key.strip_prefix(prefix) else {
                break;
            };
            match delimiter.and_then(|d| rest.find(d).map(|i| i + d.len())) {
                Some(end) => {
                    let common = format!("{prefix}{}", &rest[..end]);
                    if rolled_up.insert(common.clone()) {
                        entries.push(Entry::Prefix(common));
                    }
                },
                None => entries.push(Entry::Object(ObjectHandle::new(key, data.len() as u64))),
            }
        }

        let start = match continuation {
            Some(token) => entries.partition_point(|e| e.name() <= token),
            None => 0,
        };
        let end = (start + self.page_size).min(entries.len());

        let mut page = ListPage::default();
        if end < entries.len() {
            page.next_continuation = entries.get(end - 1).map(|e| e.name().to_string());
        }
        for entry in entries.drain(start..end) {
            match entry {
                Entry::Object(handle) => page.objects.push(handle),
                Entry::Prefix(common) => page.common_prefixes.push(common),
            }
        }

        Ok(page)
    }

    async fn download(&self, bucket: &str, key: &str, _size_hint: u64) -> Result<Vec<u8>> {
        let data = self
            .state()
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .cloned()
            .ok_or_else(|| IngestError::Download {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: "NoSuchKey: The specified key does not exist".to_string(),
            })?;

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.download_delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.state().downloads.push(key.to_string());

        Ok(data)
    }
}
