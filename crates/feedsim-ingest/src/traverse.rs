//! Prefix traversal
//!
//! Walks the key space under a prefix one listing page at a time. Each
//! page's direct objects are handed to a [`PageHandler`] and fully handled
//! before the next page is requested. With recursion enabled, nested
//! prefixes are walked before the objects of the page that listed them.
//!
//! A single [`FileBudget`] is shared by every branch of the walk, so the
//! file cap holds across nested prefixes and concurrent handlers alike.

use crate::error::Result;
use crate::store::{directory_prefix, ObjectHandle, ObjectStore, DELIMITER};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace};

/// Shared count of files considered for one source
#[derive(Debug)]
pub struct FileBudget {
    cap: usize,
    considered: Mutex<usize>,
}

impl FileBudget {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            considered: Mutex::new(0),
        }
    }

    /// Count one more file; `false` once the cap has been passed
    ///
    /// Every call increments, so a rejected file still counts as considered.
    pub fn try_claim(&self) -> bool {
        let mut considered = self.considered.lock().unwrap_or_else(PoisonError::into_inner);
        *considered += 1;
        *considered <= self.cap
    }

    pub fn is_exhausted(&self) -> bool {
        *self.considered.lock().unwrap_or_else(PoisonError::into_inner) >= self.cap
    }

    /// Files claimed so far, never more than the cap
    pub fn claimed(&self) -> usize {
        (*self.considered.lock().unwrap_or_else(PoisonError::into_inner)).min(self.cap)
    }

    pub fn cap(&self) -> usize {
        self.cap
    }
}

/// Receives the claimed objects of each listing page
#[async_trait]
pub trait PageHandler: Send {
    /// Called once per page with at least one object; returns when the page
    /// is done
    async fn handle_page(&mut self, objects: Vec<ObjectHandle>);
}

/// Walks one bucket prefix for one source
pub struct PrefixTraverser {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    recursive: bool,
    budget: Arc<FileBudget>,
}

impl PrefixTraverser {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        recursive: bool,
        budget: Arc<FileBudget>,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            recursive,
            budget,
        }
    }

    pub fn budget(&self) -> &FileBudget {
        &self.budget
    }

    /// Walk `prefix`, feeding claimed objects to `handler`
    ///
    /// A prefix without a trailing delimiter is treated as a directory. The
    /// first listing error ends the walk and is returned; pages already
    /// handled stay handled.
    pub async fn walk(&self, prefix: &str, handler: &mut dyn PageHandler) -> Result<()> {
        let prefix = directory_prefix(prefix);
        self.walk_prefix(&prefix, handler).await
    }

    fn walk_prefix<'a>(
        &'a self,
        prefix: &'a str,
        handler: &'a mut dyn PageHandler,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let mut continuation: Option<String> = None;

            loop {
                if self.budget.is_exhausted() {
                    debug!(prefix, "File cap reached, not listing further");
                    return Ok(());
                }

                let page = self
                    .store
                    .list_page(&self.bucket, prefix, Some(DELIMITER), continuation.as_deref())
                    .await?;

                if self.recursive {
                    for nested in &page.common_prefixes {
                        if nested == prefix {
                            continue;
                        }
                        trace!(prefix = %nested, "Descending");
                        self.walk_prefix(nested, &mut *handler).await?;
                    }
                }

                let mut claimed = Vec::with_capacity(page.objects.len());
                for object in page.objects {
                    if object.is_dir_marker() {
                        trace!(key = %object.key, "Skipping directory marker");
                        continue;
                    }
                    if !self.budget.try_claim() {
                        break;
                    }
                    claimed.push(object);
                }

                if !claimed.is_empty() {
                    handler.handle_page(claimed).await;
                }

                match page.next_continuation {
                    Some(token) => continuation = Some(token),
                    None => return Ok(()),
                }
            }
        }
        .boxed()
    }
}
