//! vkserial Core Library
//!
//! Async API for downloading a season of a TV series from a catalog page
//! into a Plex-style library.
//!
//! # Overview
//!
//! A run goes through these stages:
//! - Fetch the catalog page and read the series heading and episode links
//! - Filter links by an optional episode range
//! - For each episode, fetch the hosting page, evaluate its embedded script
//!   in a capability-free sandbox and ask the media API for the available
//!   qualities
//! - Download the best quality of each episode, one file at a time, with
//!   chunked and resumable HTTP transfers
//!
//! Files land in `<root>/<title>/Season NN/<title> - sNNeEE.mp4`.
//!
//! # Example
//!
//! ```no_run
//! use vkserial_core::{RunOptions, SeriesDownloader, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let downloader = SeriesDownloader::new()?;
//!
//!     let report = downloader
//!         .run("https://example.org/serial/42", &RunOptions::default())
//!         .await?;
//!
//!     for (episode, reason) in &report.failed {
//!         println!("Episode {} failed: {}", episode, reason);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Signed URLs
//!
//! Video URLs returned by the media API are signed and expire. They are
//! resolved right before the queue starts and never stored.

pub mod api;
mod client;
mod error;
pub mod orchestrator;
pub mod params;
pub mod parser;
mod pipeline;
pub mod quality;
mod range;
pub mod resolver;
pub mod sandbox;
pub mod title;
pub mod transfer;
mod types;
pub mod url;

// Re-export client types
pub use client::{ClientConfig, SeriesClient};

// Re-export error types
pub use error::{Result, SeriesError};

// Re-export the high-level API
pub use orchestrator::{DownloadOrchestrator, LogProgress, OrchestratorConfig, ProgressSink};
pub use pipeline::{RunOptions, SeriesDownloader, build_context, build_tasks};
pub use range::EpisodeRange;
pub use resolver::{EpisodeResolver, ResolverConfig};
pub use transfer::{HttpTransfer, TransferEngine, TransferEvent, TransferRequest, TransferStats};

// Re-export data types
pub use types::{
    CatalogPage, DownloadTask, EpisodeLink, QualityMap, ResolvedEpisode, RunReport,
    SeriesContext, SignedParams,
};
