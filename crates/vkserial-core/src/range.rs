//! Episode range filter
//!
//! Parses selections like `"1-3,5,7-9"` into a set of episode numbers.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SeriesError};

/// Widest `start-end` span accepted in one token
const MAX_SPAN: u32 = 10_000;

/// A set of selected episode numbers
///
/// A reversed range such as `"5-3"` selects nothing. Whitespace around
/// tokens is ignored; any other malformed token is an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodeRange {
    episodes: BTreeSet<u32>,
}

impl EpisodeRange {
    /// Parses a comma-separated list of episode numbers and inclusive ranges
    ///
    /// # Errors
    /// Returns `InvalidRange` for empty input or a token that is not a
    /// number or a `start-end` pair.
    ///
    /// # Example
    /// ```
    /// use vkserial_core::EpisodeRange;
    /// let range = EpisodeRange::parse("1-3,5").unwrap();
    /// assert_eq!(range.episodes().collect::<Vec<_>>(), vec![1, 2, 3, 5]);
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        if input.trim().is_empty() {
            return Err(SeriesError::InvalidRange(
                "range cannot be empty".to_string(),
            ));
        }

        let mut episodes = BTreeSet::new();

        for token in input.split(',') {
            let token = token.trim();
            match token.split_once('-') {
                Some((start, end)) => {
                    let start = parse_number(start, token)?;
                    let end = parse_number(end, token)?;
                    if end.saturating_sub(start) > MAX_SPAN {
                        return Err(SeriesError::InvalidRange(format!(
                            "`{}` spans more than {} episodes",
                            token, MAX_SPAN
                        )));
                    }
                    // reversed ranges select nothing
                    episodes.extend(start..=end);
                }
                None => {
                    episodes.insert(parse_number(token, token)?);
                }
            }
        }

        Ok(Self { episodes })
    }

    /// True if the episode is selected
    pub fn contains(&self, episode: u32) -> bool {
        self.episodes.contains(&episode)
    }

    /// Selected episodes in ascending order
    pub fn episodes(&self) -> impl Iterator<Item = u32> + '_ {
        self.episodes.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }
}

impl FromStr for EpisodeRange {
    type Err = SeriesError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for EpisodeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list: Vec<String> = self.episodes.iter().map(u32::to_string).collect();
        write!(f, "{}", list.join(","))
    }
}

fn parse_number(text: &str, token: &str) -> Result<u32> {
    text.trim()
        .parse::<u32>()
        .map_err(|_| SeriesError::InvalidRange(format!("`{}` is not a valid episode", token)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn collect(range: &EpisodeRange) -> Vec<u32> {
        range.episodes().collect()
    }

    #[test]
    fn test_parse_mixed() {
        let range = EpisodeRange::parse("1-3,5").unwrap();
        assert_eq!(collect(&range), vec![1, 2, 3, 5]);
    }

    #[test]
    fn test_parse_multiple_ranges() {
        let range = EpisodeRange::parse("1-3,5,7-9").unwrap();
        assert_eq!(collect(&range), vec![1, 2, 3, 5, 7, 8, 9]);
    }

    #[test]
    fn test_reversed_range_is_empty() {
        let range = EpisodeRange::parse("5-3").unwrap();
        assert!(range.is_empty());
    }

    #[test]
    fn test_single_element_range() {
        let range = EpisodeRange::parse("4-4").unwrap();
        assert_eq!(collect(&range), vec![4]);
    }

    #[test]
    fn test_whitespace_and_duplicates() {
        let range = EpisodeRange::parse(" 2 , 1-2 ,2").unwrap();
        assert_eq!(collect(&range), vec![1, 2]);
    }

    #[test]
    fn test_invalid_tokens() {
        for input in ["", "  ", "a", "1-", "-3", "1,,2", "1-2-3", "x-4", "1-4000000000"] {
            match EpisodeRange::parse(input) {
                Err(SeriesError::InvalidRange(_)) => {}
                other => panic!("Expected InvalidRange for {:?}, got {:?}", input, other),
            }
        }
    }

    #[test]
    fn test_from_str_and_display() {
        let range: EpisodeRange = "3,1-2".parse().unwrap();
        assert!(range.contains(2));
        assert!(!range.contains(4));
        assert_eq!(range.to_string(), "1,2,3");
    }

    proptest! {
        #[test]
        fn prop_range_contains_exactly_its_bounds(start in 0u32..200, len in 0u32..50) {
            let end = start + len;
            let range = EpisodeRange::parse(&format!("{}-{}", start, end)).unwrap();
            prop_assert_eq!(range.episodes().count() as u32, len + 1);
            prop_assert!(range.contains(start));
            prop_assert!(range.contains(end));
            prop_assert!(!range.contains(end + 1));
        }
    }
}
