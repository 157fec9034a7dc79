//! Hosting page parser
//!
//! The per-episode hosting page either embeds a script that assigns the
//! signed API parameters, or (older player layout) exposes the quality URLs
//! directly in a `<param name="flashvars">` element.

use scraper::{Html, Selector};

use crate::error::{Result, SeriesError};
use crate::params::parse_params;
use crate::quality::quality_from_key;
use crate::types::QualityMap;

/// What a hosting page offers for resolving an episode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostingPayload {
    /// Inline script to be evaluated in the sandbox
    Script(String),
    /// Quality URLs found directly in the page
    Qualities(QualityMap),
}

/// Parses a hosting page into the payload used to resolve the episode
///
/// Flashvars qualities win when present since they need no API call.
///
/// # Errors
/// Returns `ElementNotFound` if the page has neither an inline script nor
/// flashvars with quality URLs
pub fn parse_hosting_page(html: &str) -> Result<HostingPayload> {
    let document = Html::parse_document(html);

    if let Some(qualities) = flashvars_qualities(&document)
        && !qualities.is_empty()
    {
        return Ok(HostingPayload::Qualities(qualities));
    }

    first_inline_script(&document)
        .map(HostingPayload::Script)
        .ok_or_else(|| SeriesError::ElementNotFound("inline <script> in hosting page".to_string()))
}

/// Returns the text of the first non-empty inline `<script>` block
pub fn extract_embedded_script(html: &str) -> Option<String> {
    first_inline_script(&Html::parse_document(html))
}

fn first_inline_script(document: &Html) -> Option<String> {
    let selector = Selector::parse("script").ok()?;

    document
        .select(&selector)
        .filter(|el| el.value().attr("src").is_none())
        .map(|el| el.text().collect::<String>())
        .find(|text| !text.trim().is_empty())
}

/// Reads `url240=…&url720=…` from the flashvars param into a quality map
fn flashvars_qualities(document: &Html) -> Option<QualityMap> {
    let selector = Selector::parse(r#"param[name="flashvars"]"#).ok()?;
    let flashvars = document.select(&selector).next()?.value().attr("value")?;

    let qualities = parse_params(flashvars)
        .into_iter()
        .filter_map(|(key, value)| {
            let quality = quality_from_key(&key)?;
            let url = match urlencoding::decode(&value) {
                Ok(decoded) => decoded.into_owned(),
                Err(_) => value.clone(),
            };
            Some((quality.to_string(), url))
        })
        .collect();

    Some(qualities)
}
