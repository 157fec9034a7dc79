use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use vkserial_core::api::{ApiMethod, DEFAULT_API_URL};
use vkserial_core::sandbox::DEFAULT_SLOT;
use vkserial_core::url::DEFAULT_HOSTING_BASE;
use vkserial_core::{
    ClientConfig, DownloadOrchestrator, EpisodeRange, EpisodeResolver, HttpTransfer,
    OrchestratorConfig, ResolverConfig, RunOptions, RunReport, SeriesDownloader,
};

use crate::progress::BarProgress;

/// Download a season of a TV series into a Plex-style library.
#[derive(Debug, Parser)]
#[command(name = "vkserial", version)]
#[command(about = "Download a season of a TV series into a Plex library", long_about = None)]
pub struct Cli {
    /// Catalog page of the series.
    #[arg(env = "VKSERIAL_PAGE")]
    pub page: String,

    /// Library root; files go to <root>/<title>/Season NN/.
    #[arg(long, env = "VKSERIAL_PLEX_PATH", default_value = "./")]
    pub plex_path: PathBuf,

    /// Season number used when the page heading has none.
    #[arg(long, env = "VKSERIAL_SEASON", default_value_t = 1)]
    pub season: u32,

    /// Series title used when the page heading has none.
    #[arg(long, env = "VKSERIAL_TITLE")]
    pub title: Option<String>,

    /// Episodes to download, e.g. "1-3,5,7-9". All when omitted.
    #[arg(long, env = "VKSERIAL_EPISODES")]
    pub episodes: Option<EpisodeRange>,

    /// Byte ranges fetched concurrently per file.
    #[arg(long, env = "VKSERIAL_CHUNKS", default_value_t = 4,
          value_parser = clap::value_parser!(u16).range(1..=32))]
    pub chunks: u16,

    /// HTTP method for the media API (get or post).
    #[arg(long, env = "VKSERIAL_API_METHOD", default_value = "get")]
    pub api_method: ApiMethod,

    /// Media API endpoint.
    #[arg(long, env = "VKSERIAL_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// API version sent as `v`.
    #[arg(long, env = "VKSERIAL_API_VERSION")]
    pub api_version: Option<String>,

    /// Hosting page endpoint.
    #[arg(long, env = "VKSERIAL_HOSTING_URL", default_value = DEFAULT_HOSTING_BASE)]
    pub hosting_url: String,

    /// Script variable holding the signed API parameters.
    #[arg(long, env = "VKSERIAL_SCRIPT_SLOT", default_value = DEFAULT_SLOT)]
    pub script_slot: String,

    /// Timeout in seconds for page and API requests.
    #[arg(long, env = "VKSERIAL_TIMEOUT", default_value_t = 30)]
    pub timeout: u64,

    /// Retries for transient page and API errors.
    #[arg(long, env = "VKSERIAL_RETRIES", default_value_t = 3)]
    pub retries: u32,

    /// Log transfers instead of drawing progress bars.
    #[arg(long)]
    pub no_progress: bool,
}

impl Cli {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout_secs: self.timeout,
            max_retries: self.retries,
            ..ClientConfig::default()
        }
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            hosting_base_url: self.hosting_url.clone(),
            api_url: self.api_url.clone(),
            api_method: self.api_method,
            api_version: self.api_version.clone(),
            script_slot: self.script_slot.clone(),
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            chunk_count: usize::from(self.chunks),
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            plex_path: self.plex_path.clone(),
            season: self.season,
            title: self.title.clone(),
            episode_range: self.episodes.clone(),
        }
    }
}

pub async fn run_from_args() -> Result<()> {
    let cli = Cli::parse();
    tracing::debug!("parsed arguments: {:?}", cli);

    let resolver = EpisodeResolver::with_config(cli.client_config(), cli.resolver_config())
        .context("failed to build HTTP client")?;
    let engine = HttpTransfer::new().context("failed to build transfer client")?;

    let mut orchestrator = DownloadOrchestrator::with_config(engine, cli.orchestrator_config());
    if !cli.no_progress {
        orchestrator = orchestrator.with_sink(BarProgress::new());
    }

    let downloader = SeriesDownloader::with_parts(resolver, orchestrator);
    let options = cli.run_options();

    // Part files only ever hold a prefix of their range, so dropping the
    // run mid-transfer leaves the marker valid for the next invocation.
    let report = tokio::select! {
        result = downloader.run(&cli.page, &options) => {
            result.with_context(|| format!("failed to process {}", cli.page))?
        }
        _ = tokio::signal::ctrl_c() => {
            bail!("interrupted; run again with the same arguments to resume");
        }
    };

    print_summary(&report);
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!(
        "Downloaded {}, skipped {}, failed {}",
        report.downloaded.len(),
        report.skipped.len(),
        report.failed.len()
    );
    for (episode, reason) in &report.failed {
        println!("  Episode {:02}: {}", episode, reason);
    }
}
