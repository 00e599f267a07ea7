//! tilevm - tile-parallel image filtering through sandboxed WebAssembly guests.
//!
//! An image is split into a grid of tiles, each tile is handed to a guest
//! filter module through an exchange strategy, and the processed tiles are
//! stitched back together. Three strategies are provided so their costs can
//! be compared:
//!
//! - **staged-disk**: files in a staging directory, one runtime process per tile
//! - **streamed-pipe**: stdin/stdout of one runtime process per tile
//! - **zero-copy**: an in-process wasmtime instance per worker, with tile
//!   bytes written straight into guest linear memory
//!
//! # High-Level API
//!
//! ```ignore
//! use tilevm::config::PipelineConfig;
//! use tilevm::log::TracingLogger;
//! use tilevm::pipeline::{ExchangeBackend, TilePipeline};
//! use std::sync::Arc;
//!
//! let config = PipelineConfig::default().with_shared_dir("shared");
//! let logger = Arc::new(TracingLogger);
//! let mut backend = ExchangeBackend::from_config(&config, logger.clone())?;
//! let pipeline = TilePipeline::new(config, logger)?;
//! let reports = pipeline.process_directory(&mut backend)?;
//! ```

pub mod bench;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod exchange;
pub mod guest;
pub mod log;
pub mod logging;
pub mod pipeline;
pub mod tile;

pub use error::PipelineError;

/// Version of the tilevm library and CLI.
///
/// Defined once in the workspace `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
