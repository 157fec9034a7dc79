//! Quality ranking and selection
//!
//! Quality keys are numeric strings ("240", "720", "1080"). The best
//! quality is the one with the largest number.

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::QualityMap;

/// Field names carrying a media URL for one encoding: `url720`, `mp4_720`
static QUALITY_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:url|mp4_)(\d{3,4})$").expect("quality key regex is valid")
});

/// Result of picking the best encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualitySelection {
    pub quality: Option<String>,
    pub url: Option<String>,
}

/// Extracts the quality identifier from a field name
///
/// Returns `None` for names outside the fixed naming pattern.
///
/// # Example
/// ```
/// use vkserial_core::quality::quality_from_key;
/// assert_eq!(quality_from_key("url720"), Some("720"));
/// assert_eq!(quality_from_key("mp4_1080"), Some("1080"));
/// assert_eq!(quality_from_key("jpg"), None);
/// ```
pub fn quality_from_key(key: &str) -> Option<&str> {
    QUALITY_KEY
        .captures(key)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Picks the highest numeric quality from the map
///
/// Keys that do not parse as numbers rank below every numeric key. Equal
/// numeric values (e.g. "720" and "0720") resolve to the lexicographically
/// first key. An empty map selects nothing.
pub fn select_best(qualities: &QualityMap) -> QualitySelection {
    let best = qualities
        .iter()
        .max_by(|(a, _), (b, _)| compare_keys(a, b));

    match best {
        Some((quality, url)) => QualitySelection {
            quality: Some(quality.clone()),
            url: Some(url.clone()),
        },
        None => QualitySelection {
            quality: None,
            url: None,
        },
    }
}

/// Orders by numeric value, then prefers the lexicographically smaller key
fn compare_keys(a: &str, b: &str) -> Ordering {
    let a_num = a.parse::<u64>().ok();
    let b_num = b.parse::<u64>().ok();
    a_num.cmp(&b_num).then_with(|| b.cmp(a))
}
