//! Episode resolution
//!
//! Turns episode links into direct video URLs: fetch each hosting page,
//! evaluate its embedded script to get the signed API parameters, ask the
//! media API for the quality map, and keep the best quality.
//!
//! Every stage runs concurrently across episodes, and every episode
//! settles on its own. One broken episode never prevents the others from
//! resolving.

use futures::future::join_all;
use tracing::{info, warn};

use crate::api::{ApiMethod, DEFAULT_API_URL, MediaApi};
use crate::client::{ClientConfig, SeriesClient};
use crate::error::{Result, SeriesError};
use crate::parser::{HostingPayload, parse_catalog, parse_hosting_page};
use crate::quality::select_best;
use crate::sandbox::{DEFAULT_SLOT, evaluate_script};
use crate::types::{CatalogPage, EpisodeLink, QualityMap, ResolvedEpisode, SignedParams};
use crate::url::{DEFAULT_HOSTING_BASE, build_hosting_url};

/// Endpoints and conventions used during resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Hosting page endpoint, without query
    pub hosting_base_url: String,
    /// Media info API endpoint
    pub api_url: String,
    pub api_method: ApiMethod,
    /// Sent as `v` when set
    pub api_version: Option<String>,
    /// Name of the script variable holding the signed parameters
    pub script_slot: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            hosting_base_url: DEFAULT_HOSTING_BASE.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            api_method: ApiMethod::default(),
            api_version: None,
            script_slot: DEFAULT_SLOT.to_string(),
        }
    }
}

/// Where an episode's quality map comes from
enum QualitySource {
    Signed(SignedParams),
    Direct(QualityMap),
}

/// Resolves catalog pages and episode links
#[derive(Debug, Clone)]
pub struct EpisodeResolver {
    client: SeriesClient,
    api: MediaApi,
    config: ResolverConfig,
}

impl EpisodeResolver {
    /// Create a resolver with default endpoints and client settings
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default(), ResolverConfig::default())
    }

    pub fn with_config(client_config: ClientConfig, config: ResolverConfig) -> Result<Self> {
        let client = SeriesClient::with_config(client_config)?;
        Ok(Self::with_client(client, config))
    }

    /// Build on an existing client; the API shares its cookie store
    pub fn with_client(client: SeriesClient, config: ResolverConfig) -> Self {
        let api = MediaApi::new(
            client.clone(),
            &config.api_url,
            config.api_method,
            config.api_version.clone(),
        );
        Self {
            client,
            api,
            config,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Fetch and parse the catalog page
    ///
    /// # Errors
    /// Transport errors from the client and `ParseError` from the parser.
    /// Both are fatal for a run.
    pub async fn fetch_catalog(&self, url: &str) -> Result<CatalogPage> {
        let html = self.client.fetch(url).await?;
        parse_catalog(&html)
    }

    /// Resolve every link, preserving order
    ///
    /// All hosting pages are fetched concurrently, then all API requests
    /// run concurrently. Episodes that fail at any stage come back with no
    /// URL after a warning naming the episode.
    pub async fn resolve_all(&self, links: &[EpisodeLink]) -> Vec<ResolvedEpisode> {
        let sources = join_all(links.iter().map(|link| self.load_source(link))).await;

        let lookups = links
            .iter()
            .zip(sources)
            .map(|(link, source)| self.settle(link.episode_number, source));
        join_all(lookups).await
    }

    /// Resolve a single link
    pub async fn resolve(&self, link: &EpisodeLink) -> ResolvedEpisode {
        let source = self.load_source(link).await;
        self.settle(link.episode_number, source).await
    }

    async fn load_source(&self, link: &EpisodeLink) -> Result<QualitySource> {
        let url = build_hosting_url(&self.config.hosting_base_url, link)?;
        let html = self.client.fetch(&url).await?;

        match parse_hosting_page(&html)? {
            HostingPayload::Qualities(map) => Ok(QualitySource::Direct(map)),
            HostingPayload::Script(script) => {
                let signed = evaluate_script(&script, &self.config.script_slot)?;
                Ok(QualitySource::Signed(signed))
            }
        }
    }

    async fn settle(&self, episode: u32, source: Result<QualitySource>) -> ResolvedEpisode {
        let qualities = match source {
            Ok(QualitySource::Direct(map)) => map,
            Ok(QualitySource::Signed(signed)) => match self.api.fetch_qualities(&signed).await {
                Ok(map) => map,
                // Unreadable body: treat like an empty quality list
                Err(SeriesError::ParseError(message)) => {
                    warn!(
                        "Unable to detect video quality for Episode {:02}: {}",
                        episode, message
                    );
                    QualityMap::new()
                }
                Err(e) => {
                    warn!("Media API request for Episode {:02} failed: {}", episode, e);
                    return ResolvedEpisode::unresolved(episode);
                }
            },
            Err(e) => {
                warn!("Unable to resolve Episode {:02}: {}", episode, e);
                return ResolvedEpisode::unresolved(episode);
            }
        };

        let selection = select_best(&qualities);
        match &selection.quality {
            Some(quality) => info!("Selected video quality for Episode {:02}: {}", episode, quality),
            None => warn!("Unable to detect video quality for Episode {:02}", episode),
        }

        ResolvedEpisode {
            episode_number: episode,
            quality: selection.quality,
            video_url: selection.url,
        }
    }
}
