//! End-to-end series download
//!
//! Provides the high-level API combining the resolver and the download
//! queue: catalog page in, files on disk out.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::error::{Result, SeriesError};
use crate::orchestrator::DownloadOrchestrator;
use crate::parser::filter_links;
use crate::range::EpisodeRange;
use crate::resolver::EpisodeResolver;
use crate::title::{HeadingDefaults, parse_heading};
use crate::transfer::{HttpTransfer, TransferEngine};
use crate::types::{DownloadTask, ResolvedEpisode, RunReport, SeriesContext};
use crate::url::{episode_file_name, expand_home, season_directory};

/// Per-run choices supplied by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Library root; a leading `~` is expanded (default: `./`)
    pub plex_path: PathBuf,
    /// Season used when the heading has none (default: 1)
    pub season: u32,
    /// Title used when the heading has none
    pub title: Option<String>,
    /// Episodes to download; `None` means all
    pub episode_range: Option<EpisodeRange>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            plex_path: PathBuf::from("./"),
            season: 1,
            title: None,
            episode_range: None,
        }
    }
}

/// Combines the catalog heading with the run options
pub fn build_context(heading: &str, options: &RunOptions) -> SeriesContext {
    let defaults = HeadingDefaults {
        season: options.season,
        title: options.title.clone(),
    };
    let heading = parse_heading(heading, &defaults);

    SeriesContext {
        title: heading.title,
        season: heading.season,
        plex_path: expand_home(&options.plex_path),
        episode_range: options.episode_range.clone(),
    }
}

/// One task per resolved episode, in the same order
pub fn build_tasks(context: &SeriesContext, resolved: &[ResolvedEpisode]) -> Vec<DownloadTask> {
    let directory = season_directory(&context.plex_path, &context.title, context.season);

    resolved
        .iter()
        .map(|episode| DownloadTask {
            episode_number: episode.episode_number,
            url: episode.video_url.clone(),
            file_name: episode_file_name(&context.title, context.season, episode.episode_number),
            target_directory: directory.clone(),
        })
        .collect()
}

/// Downloads a whole season from its catalog page
///
/// # Example
///
/// ```no_run
/// use vkserial_core::{EpisodeRange, RunOptions, SeriesDownloader};
///
/// # async fn example() -> vkserial_core::Result<()> {
/// let downloader = SeriesDownloader::new()?;
/// let options = RunOptions {
///     plex_path: "~/Plex/TV".into(),
///     episode_range: Some(EpisodeRange::parse("1-3,5")?),
///     ..RunOptions::default()
/// };
/// let report = downloader.run("https://example.org/serial/42", &options).await?;
/// println!("{} episodes downloaded", report.downloaded.len());
/// # Ok(())
/// # }
/// ```
pub struct SeriesDownloader<E> {
    resolver: EpisodeResolver,
    orchestrator: DownloadOrchestrator<E>,
}

impl SeriesDownloader<HttpTransfer> {
    /// Create a downloader with default endpoints and HTTP transfers
    pub fn new() -> Result<Self> {
        Ok(Self::with_parts(
            EpisodeResolver::new()?,
            DownloadOrchestrator::new(HttpTransfer::new()?),
        ))
    }
}

impl<E: TransferEngine> SeriesDownloader<E> {
    pub fn with_parts(resolver: EpisodeResolver, orchestrator: DownloadOrchestrator<E>) -> Self {
        Self {
            resolver,
            orchestrator,
        }
    }

    pub fn resolver(&self) -> &EpisodeResolver {
        &self.resolver
    }

    pub fn orchestrator(&self) -> &DownloadOrchestrator<E> {
        &self.orchestrator
    }

    /// Run the whole pipeline for one catalog page
    ///
    /// The range filter is applied before any hosting page is requested.
    ///
    /// # Errors
    /// - `InvalidUrl` if `catalog_url` is not an absolute URL
    /// - Transport or parse errors for the catalog page itself
    ///
    /// Per-episode problems never fail the run; they show up in the
    /// returned [`RunReport`].
    pub async fn run(&self, catalog_url: &str, options: &RunOptions) -> Result<RunReport> {
        reqwest::Url::parse(catalog_url)
            .map_err(|e| SeriesError::InvalidUrl(format!("{}: {}", catalog_url, e)))?;

        let page = self.resolver.fetch_catalog(catalog_url).await?;
        let context = build_context(&page.title, options);
        info!(
            "Series \"{}\", season {:02}, {} episodes listed",
            context.title,
            context.season,
            page.episode_links.len()
        );

        let links = filter_links(page.episode_links, context.episode_range.as_ref());
        if links.is_empty() {
            warn!("No episodes to download");
            return Ok(RunReport::default());
        }

        let resolved = self.resolver.resolve_all(&links).await;
        let tasks = build_tasks(&context, &resolved);
        Ok(self.orchestrator.run(&tasks).await)
    }
}
