//! FDC Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities for the FoodData Central tools.
//!
//! # Overview
//!
//! - **Logging**: `tracing` subscriber setup driven by [`logging::LogConfig`]
//! - **Formatting**: human-readable row counts and byte sizes for console reports
//!
//! # Example
//!
//! ```no_run
//! use fdc_common::logging::{init_logging, LogConfig};
//! use fdc_common::format::format_count;
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(&LogConfig::from_env()?)?;
//!     tracing::info!("Imported {} rows", format_count(1_234_567));
//!     Ok(())
//! }
//! ```

pub mod format;
pub mod logging;

pub use format::{format_bytes, format_count};
