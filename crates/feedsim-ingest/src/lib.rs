//! Feedsim Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Replays data files stored in an S3 bucket into Postgres tables, at a
//! controlled volume and pace, to simulate a live feed.
//!
//! # Pipeline
//!
//! - [`traverse`]: lists a prefix page by page, optionally recursing, and
//!   claims objects against a shared file cap
//! - [`pool`]: runs one task per claimed object, with bounded concurrency
//! - [`fetcher`]: downloads an object and frames its (gunzipped) lines
//! - [`parser`]: turns a line into a record, or a skip
//! - [`governor`]: randomized block sizes and pauses for trickled loading
//! - [`sink`]: single-row parameterized inserts
//!
//! # Example
//!
//! ```no_run
//! use feedsim_ingest::config::TableConfig;
//! use feedsim_ingest::pipeline::Ingestor;
//! use feedsim_ingest::sink::MemorySink;
//! use feedsim_ingest::store::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(MemoryStore::new());
//!     store.put("lab", "riders/part-0.json", "{\"name\":\"Ana\"}\n");
//!
//!     let ingestor = Ingestor::new(store, Arc::new(MemorySink::new()), "lab");
//!     let report = ingestor.run(&[TableConfig::json("riders", "riders/")]).await;
//!     assert_eq!(report.total_rows(), 1);
//! }
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod governor;
pub mod parser;
pub mod pipeline;
pub mod pool;
pub mod report;
pub mod sink;
pub mod store;
pub mod traverse;

pub use error::{IngestError, Result};
