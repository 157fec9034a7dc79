//! Query-string style parameter codec
//!
//! Catalog links and legacy `flashvars` blobs carry `key=value&key=value`
//! payloads whose values are not necessarily URL-decoded. Parsing is
//! forgiving and never fails.

use std::collections::BTreeMap;

/// Parses a `key=value&key=value` blob into a map
///
/// - the last occurrence of a key wins
/// - a segment without `=` maps its key to an empty string
/// - everything after the first `=` is the value, with further `=` removed
/// - empty segments are skipped
///
/// Values are kept raw, no percent-decoding is applied.
///
/// # Example
/// ```
/// use vkserial_core::params::parse_params;
/// let params = parse_params("oid=-12&id=34&hd");
/// assert_eq!(params["oid"], "-12");
/// assert_eq!(params["hd"], "");
/// ```
pub fn parse_params(query: &str) -> BTreeMap<String, String> {
    let mut result = BTreeMap::new();

    for segment in query.split('&') {
        if segment.is_empty() {
            continue;
        }

        let mut parts = segment.split('=');
        let key = parts.next().unwrap_or_default();
        let value: String = parts.collect();

        result.insert(key.to_string(), value);
    }

    result
}

/// Serializes a map back into a `key=value&key=value` blob
///
/// Keys are emitted in sorted order. Empty values are written as `key=`.
pub fn encode_params(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_simple() {
        let params = parse_params("oid=-1001&id=456239017&hash=0a1b2c");
        assert_eq!(params.len(), 3);
        assert_eq!(params["oid"], "-1001");
        assert_eq!(params["id"], "456239017");
        assert_eq!(params["hash"], "0a1b2c");
    }

    #[test]
    fn test_parse_last_occurrence_wins() {
        let params = parse_params("id=1&id=2");
        assert_eq!(params["id"], "2");
    }

    #[test]
    fn test_parse_key_without_value() {
        let params = parse_params("hd&id=2");
        assert_eq!(params["hd"], "");
        assert_eq!(params["id"], "2");
    }

    #[test]
    fn test_parse_joins_extra_equals() {
        let params = parse_params("token=ab=cd=");
        assert_eq!(params["token"], "abcd");
    }

    #[test]
    fn test_parse_segment_without_key() {
        let params = parse_params("=orphan&id=2");
        assert_eq!(params[""], "orphan");
        assert_eq!(params["id"], "2");
    }

    #[test]
    fn test_parse_empty_and_trailing_separators() {
        assert!(parse_params("").is_empty());

        let params = parse_params("&&id=2&");
        assert_eq!(params.len(), 1);
        assert_eq!(params["id"], "2");
    }

    #[test]
    fn test_parse_keeps_encoded_values() {
        let params = parse_params("url720=https%3A%2F%2Fcdn.example%2F720.mp4");
        assert_eq!(params["url720"], "https%3A%2F%2Fcdn.example%2F720.mp4");
    }

    #[test]
    fn test_encode_sorted() {
        let mut params = BTreeMap::new();
        params.insert("id".to_string(), "2".to_string());
        params.insert("hd".to_string(), String::new());
        params.insert("oid".to_string(), "-1".to_string());
        assert_eq!(encode_params(&params), "hd=&id=2&oid=-1");
    }

    proptest! {
        #[test]
        fn prop_decode_encode_roundtrip(
            params in prop::collection::btree_map("[a-z0-9_]{1,8}", "[^=&]{0,12}", 0..8)
        ) {
            prop_assert_eq!(parse_params(&encode_params(&params)), params);
        }
    }
}
