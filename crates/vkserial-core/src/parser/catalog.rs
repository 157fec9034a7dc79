//! Catalog page parser
//!
//! The series page carries a heading (`.titlfull`) and a `<select>` whose
//! options hold one link per episode, for example
//! `http://vk.com/video_ext.php?oid=-1&id=2&hash=x|7`: the query holds the
//! hosting parameters and the token after `|` is the episode number.

use scraper::{Html, Selector};
use tracing::warn;

use crate::error::{Result, SeriesError};
use crate::params::parse_params;
use crate::range::EpisodeRange;
use crate::types::{CatalogPage, EpisodeLink};

const HEADING_SELECTOR: &str = ".titlfull";
const LINK_SELECTOR: &str = "#video_vk option[value]";

/// Parses catalog page HTML into a heading and episode links
///
/// Links are returned in document order. A link that cannot be split or
/// whose episode token is not a number is dropped with a warning. When two
/// links share an episode number the later one replaces the earlier one at
/// the earlier position.
///
/// # Errors
/// Returns `ParseError` if a selector cannot be built
pub fn parse_catalog(html: &str) -> Result<CatalogPage> {
    let document = Html::parse_document(html);

    let heading_selector = Selector::parse(HEADING_SELECTOR)
        .map_err(|e| SeriesError::ParseError(format!("Invalid selector: {:?}", e)))?;
    let link_selector = Selector::parse(LINK_SELECTOR)
        .map_err(|e| SeriesError::ParseError(format!("Invalid selector: {:?}", e)))?;

    let title = document
        .select(&heading_selector)
        .next()
        .map(|el| el.text().collect::<String>())
        .unwrap_or_default();

    let mut episode_links: Vec<EpisodeLink> = Vec::new();

    for element in document.select(&link_selector) {
        let Some(value) = element.value().attr("value") else {
            continue;
        };

        let Some(link) = parse_episode_link(value) else {
            warn!("Skipping malformed episode link {:?}", value);
            continue;
        };

        match episode_links
            .iter_mut()
            .find(|existing| existing.episode_number == link.episode_number)
        {
            Some(existing) => {
                warn!(
                    "Duplicate link for episode {}, keeping the later one",
                    link.episode_number
                );
                *existing = link;
            }
            None => episode_links.push(link),
        }
    }

    Ok(CatalogPage {
        title,
        episode_links,
    })
}

/// Parses one link value into an [`EpisodeLink`]
///
/// Returns `None` if the link has no `?`, no `|`, or a non-numeric episode.
pub fn parse_episode_link(link: &str) -> Option<EpisodeLink> {
    let (raw_params, episode) = split_episode_link(link)?;
    let episode_number = episode.trim().parse::<u32>().ok()?;

    Some(EpisodeLink {
        raw_params: raw_params.to_string(),
        params: parse_params(raw_params),
        episode_number,
    })
}

/// Splits `"<url>?<params>|<episode>"` into its params and episode token
fn split_episode_link(link: &str) -> Option<(&str, &str)> {
    let (_, rest) = link.split_once('?')?;
    rest.split_once('|')
}

/// Keeps only the links selected by the range, preserving order
pub fn filter_links(links: Vec<EpisodeLink>, range: Option<&EpisodeRange>) -> Vec<EpisodeLink> {
    match range {
        Some(range) => links
            .into_iter()
            .filter(|link| range.contains(link.episode_number))
            .collect(),
        None => links,
    }
}
