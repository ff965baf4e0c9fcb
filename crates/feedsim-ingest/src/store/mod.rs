//! Object store access
//!
//! The pipeline only needs two calls from a store: one page of a delimited
//! listing and a whole-object download. [`S3Store`] serves them from S3 (or
//! any S3-compatible endpoint) and [`MemoryStore`] from an in-process map.

use crate::error::Result;
use async_trait::async_trait;
use std::borrow::Cow;

pub mod memory;
pub mod s3;

pub use memory::MemoryStore;
pub use s3::S3Store;

/// Key delimiter used to group objects into prefixes
pub const DELIMITER: &str = "/";

/// An object listed under a prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHandle {
    pub key: String,
    pub size: u64,
}

impl ObjectHandle {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
        }
    }

    /// Zero-byte placeholder objects created by consoles to represent folders
    pub fn is_dir_marker(&self) -> bool {
        self.key.ends_with(DELIMITER)
    }
}

/// A configured prefix as a directory: non-empty prefixes end with the
/// delimiter, so `trips` lists `trips/...` and never `trips-json/...`
pub fn directory_prefix(prefix: &str) -> Cow<'_, str> {
    if prefix.is_empty() || prefix.ends_with(DELIMITER) {
        Cow::Borrowed(prefix)
    } else {
        Cow::Owned(format!("{prefix}{DELIMITER}"))
    }
}

/// One page of a listing
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<ObjectHandle>,
    /// Nested prefixes, each ending with the delimiter
    pub common_prefixes: Vec<String>,
    /// Token for the next page, `None` on the last one
    pub next_continuation: Option<String>,
}

/// Read access to a bucket of objects
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List one page of keys starting with `prefix`
    ///
    /// With a `delimiter`, keys containing it after the prefix are rolled up
    /// into `common_prefixes` instead of being returned as objects.
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation: Option<&str>,
    ) -> Result<ListPage>;

    /// Download a whole object; `size_hint` comes from the listing
    async fn download(&self, bucket: &str, key: &str, size_hint: u64) -> Result<Vec<u8>>;
}
