//! Series title and season parser
//!
//! Catalog headings come in a handful of loosely structured layouts, for
//! example `Локальное название / Original Title [RU]` or
//! `Original Title / 2 сезон [EN]`. Parsing is best effort: anything that
//! cannot be recognised degrades to the caller's defaults.

use std::sync::LazyLock;

use regex::Regex;

/// Matches `Season 2`, `сезон 2`, `2 season`, `2 сезон`, `2-й сезон`
static SEASON_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:season|сезон)\s*(\d{1,3})\b|\b(\d{1,3})(?:\s*-?\s*(?:й|ый|ой|th|st|nd|rd))?\s*(?:season|сезон)",
    )
    .expect("season marker regex is valid")
});

/// Matches bracketed language/extra tags like `[RU]` or `[720p, subs]`
static BRACKET_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]").expect("bracket tag regex is valid"));

/// Matches empty parentheses left behind after stripping a season marker
static EMPTY_PARENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\s*\)").expect("empty parens regex is valid"));

/// Fallback values used when the heading does not carry them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingDefaults {
    /// Season used when no season marker is found (default: 1)
    pub season: u32,
    /// Title used when no title can be extracted
    pub title: Option<String>,
}

impl Default for HeadingDefaults {
    fn default() -> Self {
        Self {
            season: 1,
            title: None,
        }
    }
}

/// Title and season extracted from a heading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesHeading {
    pub title: String,
    pub season: u32,
}

/// Parses a catalog heading into a title and season number
///
/// The heading is split at `/`. Each segment is stripped of bracketed tags
/// and season markers; when more than one non-empty segment remains the
/// second one (the original-language title) is used.
///
/// # Example
/// ```
/// use vkserial_core::title::{parse_heading, HeadingDefaults};
/// let heading = parse_heading("Шерлок / Sherlock / 3 сезон [RU]", &HeadingDefaults::default());
/// assert_eq!(heading.title, "Sherlock");
/// assert_eq!(heading.season, 3);
/// ```
pub fn parse_heading(raw: &str, defaults: &HeadingDefaults) -> SeriesHeading {
    let raw = raw.trim();

    let season = find_season(raw).unwrap_or(defaults.season);

    let segments: Vec<String> = raw
        .split('/')
        .map(clean_segment)
        .filter(|segment| !segment.is_empty())
        .collect();

    let title = segments
        .get(1)
        .or_else(|| segments.first())
        .cloned()
        .or_else(|| defaults.title.clone())
        .unwrap_or_default();

    SeriesHeading { title, season }
}

/// Returns the first season number found in the text
fn find_season(text: &str) -> Option<u32> {
    let caps = SEASON_MARKER.captures(text)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .and_then(|m| m.as_str().parse::<u32>().ok())
}

/// Removes tags and season markers, then trims separators
fn clean_segment(segment: &str) -> String {
    let without_tags = BRACKET_TAG.replace_all(segment, " ");
    let without_season = SEASON_MARKER.replace_all(&without_tags, " ");
    let without_parens = EMPTY_PARENS.replace_all(&without_season, " ");

    without_parens
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| matches!(c, '-' | '–' | '—' | ':' | ',' | '.' | '|') || c.is_whitespace())
        .to_string()
}
