//! URL and path helper functions
//!
//! Builds hosting page URLs from episode links and the on-disk layout
//! Plex expects: `<root>/<title>/Season NN/<title> - sNNeEE.mp4`.

use std::path::{Path, PathBuf};

use crate::error::{Result, SeriesError};
use crate::types::EpisodeLink;

/// Default hosting page endpoint
pub const DEFAULT_HOSTING_BASE: &str = "https://vk.com/video_ext.php";

/// Directory/file name used when the series title is empty after sanitizing
const UNTITLED: &str = "Untitled";

/// Builds the hosting page URL for an episode
///
/// Only the object id (`oid`) and item id (`id`) are forwarded.
///
/// # Errors
/// Returns `MissingParam` if either parameter is absent or empty
///
/// # Example
/// ```
/// use vkserial_core::params::parse_params;
/// use vkserial_core::url::build_hosting_url;
/// use vkserial_core::EpisodeLink;
///
/// let link = EpisodeLink {
///     raw_params: "oid=-1&id=2&hash=x".to_string(),
///     params: parse_params("oid=-1&id=2&hash=x"),
///     episode_number: 1,
/// };
/// let url = build_hosting_url("https://vk.com/video_ext.php", &link).unwrap();
/// assert_eq!(url, "https://vk.com/video_ext.php?oid=-1&id=2");
/// ```
pub fn build_hosting_url(base: &str, link: &EpisodeLink) -> Result<String> {
    let oid = required_param(link, "oid")?;
    let id = required_param(link, "id")?;
    Ok(format!(
        "{}?oid={}&id={}",
        base,
        urlencoding::encode(oid),
        urlencoding::encode(id)
    ))
}

fn required_param<'a>(link: &'a EpisodeLink, key: &str) -> Result<&'a str> {
    link.params
        .get(key)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            SeriesError::MissingParam(format!(
                "`{}` in link for episode {}",
                key, link.episode_number
            ))
        })
}

/// Formats a number with at least two digits (`7` → `07`, `123` → `123`)
pub fn format_num(num: u32) -> String {
    format!("{:02}", num)
}

/// Builds the season directory: `<root>/<title>/Season NN`
pub fn season_directory(root: &Path, title: &str, season: u32) -> PathBuf {
    root.join(sanitize_title(title))
        .join(format!("Season {}", format_num(season)))
}

/// Builds the episode file name: `<title> - sNNeEE.mp4`
///
/// # Example
/// ```
/// use vkserial_core::url::episode_file_name;
/// assert_eq!(episode_file_name("Demo", 1, 7), "Demo - s01e07.mp4");
/// ```
pub fn episode_file_name(title: &str, season: u32, episode: u32) -> String {
    format!(
        "{} - s{}e{}.mp4",
        sanitize_title(title),
        format_num(season),
        format_num(episode)
    )
}

/// Makes a title safe to use as a path component
///
/// Replaces path separators, characters Windows and SMB shares reject, and
/// control characters with `_`. Trims surrounding spaces and dots.
pub fn sanitize_title(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = replaced.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        UNTITLED.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Expands a leading `~` to the user's home directory
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };

    match directories::BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(rest),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::parse_params;

    fn link(raw: &str) -> EpisodeLink {
        EpisodeLink {
            raw_params: raw.to_string(),
            params: parse_params(raw),
            episode_number: 5,
        }
    }

    #[test]
    fn test_build_hosting_url() {
        let url = build_hosting_url(DEFAULT_HOSTING_BASE, &link("oid=-1001&id=456&hash=ab"));
        assert_eq!(
            url.unwrap(),
            "https://vk.com/video_ext.php?oid=-1001&id=456"
        );
    }

    #[test]
    fn test_build_hosting_url_missing_id() {
        let result = build_hosting_url(DEFAULT_HOSTING_BASE, &link("oid=-1001&hash=ab"));
        match result {
            Err(SeriesError::MissingParam(msg)) => {
                assert!(msg.contains("`id`"));
                assert!(msg.contains("episode 5"));
            }
            _ => panic!("Expected MissingParam error"),
        }
    }

    #[test]
    fn test_build_hosting_url_empty_oid() {
        let result = build_hosting_url(DEFAULT_HOSTING_BASE, &link("oid=&id=1"));
        assert!(matches!(result, Err(SeriesError::MissingParam(_))));
    }

    #[test]
    fn test_format_num() {
        assert_eq!(format_num(0), "00");
        assert_eq!(format_num(7), "07");
        assert_eq!(format_num(12), "12");
        assert_eq!(format_num(123), "123");
    }

    #[test]
    fn test_episode_file_name() {
        assert_eq!(episode_file_name("Demo", 1, 7), "Demo - s01e07.mp4");
        assert_eq!(episode_file_name("Demo", 10, 112), "Demo - s10e112.mp4");
    }

    #[test]
    fn test_season_directory() {
        let dir = season_directory(Path::new("/media"), "Demo", 1);
        assert_eq!(dir, PathBuf::from("/media/Demo/Season 01"));
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("AC/DC: Live?"), "AC_DC_ Live_");
        assert_eq!(sanitize_title("  ..Dots.. "), "Dots");
        assert_eq!(sanitize_title(""), "Untitled");
        assert_eq!(sanitize_title("Шерлок"), "Шерлок");
    }

    #[test]
    fn test_expand_home_without_tilde() {
        assert_eq!(expand_home(Path::new("./media")), PathBuf::from("./media"));
    }

    #[test]
    fn test_expand_home_with_tilde() {
        let expanded = expand_home(Path::new("~/media"));
        if let Some(dirs) = directories::BaseDirs::new() {
            assert_eq!(expanded, dirs.home_dir().join("media"));
        }
    }
}
