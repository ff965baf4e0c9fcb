//! Feedsim Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities used across the feedsim workspace members.
//!
//! # Overview
//!
//! - **Logging**: `tracing` subscriber setup driven by [`logging::LogConfig`]
//! - **Sizes**: human-readable byte counts for log output
//!
//! # Example
//!
//! ```no_run
//! use feedsim_common::logging::{init_logging, LogConfig};
//! use feedsim_common::size::format_size;
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     tracing::info!(size = %format_size(1_048_576), "Downloaded object");
//!     Ok(())
//! }
//! ```

pub mod logging;
pub mod size;

pub use size::format_size;
