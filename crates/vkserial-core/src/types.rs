//! Core data types for vkserial
//!
//! Contains the data structures passed between pipeline stages.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::range::EpisodeRange;

/// Mapping from a quality identifier (e.g. "720") to a media URL
pub type QualityMap = BTreeMap<String, String>;

/// Parsed catalog page: raw heading plus one link per episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogPage {
    /// Raw heading text, parsed later by [`crate::title::parse_heading`]
    pub title: String,

    /// Episode links in document order
    pub episode_links: Vec<EpisodeLink>,
}

/// A single catalog entry identifying one episode's hosting location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeLink {
    /// Query string as found in the link (e.g. "oid=-1&id=2&hash=abc")
    pub raw_params: String,

    /// Decoded view of `raw_params`
    pub params: BTreeMap<String, String>,

    /// Episode number, used for ordering and file naming
    pub episode_number: u32,
}

/// Signed, short-lived parameters authorizing one media-info API call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedParams {
    pub sig: String,
    pub videos: String,
    pub access_token: String,

    /// JSONP callback name, when the hosting script asks for one
    pub callback: Option<String>,

    /// Any other fields the script assigned
    pub extra: BTreeMap<String, String>,
}

/// An episode after quality selection
///
/// `video_url == None` marks an unresolved episode. That is a degraded but
/// continuable state: the download step skips it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEpisode {
    pub episode_number: u32,
    pub quality: Option<String>,
    pub video_url: Option<String>,
}

impl ResolvedEpisode {
    /// An episode for which no playable URL could be found
    pub fn unresolved(episode_number: u32) -> Self {
        Self {
            episode_number,
            quality: None,
            video_url: None,
        }
    }
}

/// Series-level context, resolved once per run and read-only afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesContext {
    pub title: String,
    pub season: u32,
    pub plex_path: PathBuf,
    pub episode_range: Option<EpisodeRange>,
}

/// One file to retrieve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadTask {
    pub episode_number: u32,
    pub url: Option<String>,
    pub file_name: String,
    pub target_directory: PathBuf,
}

impl DownloadTask {
    /// Full path of the file this task writes
    pub fn target_path(&self) -> PathBuf {
        self.target_directory.join(&self.file_name)
    }

    /// Target directory as a path reference
    pub fn directory(&self) -> &Path {
        &self.target_directory
    }
}

/// Final outcome of a run
///
/// Failures never abort the run; they are counted here instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Episodes written to disk
    pub downloaded: Vec<u32>,

    /// Episodes skipped because no URL was resolved
    pub skipped: Vec<u32>,

    /// Episodes whose transfer failed, with the error message
    pub failed: Vec<(u32, String)>,
}

impl RunReport {
    /// True when every scheduled episode made it to disk
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty()
    }
}
