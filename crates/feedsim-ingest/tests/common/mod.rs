//! Shared fixtures for feedsim integration tests
//!
//! Everything runs against [`MemoryStore`] and [`MemorySink`], so no external
//! services are needed.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use feedsim_ingest::config::ColumnConfig;
use feedsim_ingest::pipeline::Ingestor;
use feedsim_ingest::sink::MemorySink;
use feedsim_ingest::store::MemoryStore;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::sync::Arc;

pub const BUCKET: &str = "snowflake-workshop-lab";

/// Store, sink and an ingestor wired to both
pub struct TestEnv {
    pub store: Arc<MemoryStore>,
    pub sink: Arc<MemorySink>,
    pub ingestor: Ingestor,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        Self::with(store, MemorySink::new())
    }

    pub fn with(store: MemoryStore, sink: MemorySink) -> Self {
        let store = Arc::new(store);
        let sink = Arc::new(sink);
        let ingestor = Ingestor::new(store.clone(), sink.clone(), BUCKET);
        Self {
            store,
            sink,
            ingestor,
        }
    }

    pub fn put(&self, key: &str, body: impl Into<Vec<u8>>) {
        self.store.put(BUCKET, key, body);
    }
}

/// `count` JSON lines numbered from `start`
pub fn json_lines(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("{{\"rider\":{i},\"name\":\"rider-{i}\"}}\n"))
        .collect()
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Columns named `c0..cN`
pub fn columns(count: usize) -> Vec<ColumnConfig> {
    (0..count).map(|i| ColumnConfig::text(format!("c{i}"))).collect()
}
