//! Media info API client
//!
//! Exchanges the signed parameters of one episode for its quality map.
//! The endpoint answers either plain JSON or a JSONP body
//! (`callback({...});`) depending on whether a callback name was sent.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::client::SeriesClient;
use crate::error::{Result, SeriesError};
use crate::quality::quality_from_key;
use crate::types::{QualityMap, SignedParams};

/// Default media info endpoint
pub const DEFAULT_API_URL: &str = "https://api.vk.com/method/video.get";

/// HTTP method used for the API call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApiMethod {
    #[default]
    Get,
    Post,
}

impl FromStr for ApiMethod {
    type Err = SeriesError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Self::Get),
            "post" => Ok(Self::Post),
            other => Err(SeriesError::ParseError(format!(
                "unknown API method `{}` (expected get or post)",
                other
            ))),
        }
    }
}

impl fmt::Display for ApiMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "get"),
            Self::Post => write!(f, "post"),
        }
    }
}

/// Client for the media info endpoint
#[derive(Debug, Clone)]
pub struct MediaApi {
    client: SeriesClient,
    url: String,
    method: ApiMethod,
    version: Option<String>,
}

impl MediaApi {
    /// Create an API client for `url`
    ///
    /// `version` is sent as the `v` parameter when set.
    pub fn new(client: SeriesClient, url: &str, method: ApiMethod, version: Option<String>) -> Self {
        Self {
            client,
            url: url.to_string(),
            method,
            version,
        }
    }

    /// Request the quality map for one episode
    ///
    /// # Errors
    /// - `HttpError` / `NotFound` / `RateLimited` for transport failures
    /// - `ParseError` when the body has no usable quality list
    pub async fn fetch_qualities(&self, signed: &SignedParams) -> Result<QualityMap> {
        let params = self.request_params(signed);
        let body = match self.method {
            ApiMethod::Get => self.client.get_query(&self.url, &params).await?,
            ApiMethod::Post => self.client.post_form(&self.url, &params).await?,
        };

        parse_media_response(&body)
    }

    fn request_params<'a>(&'a self, signed: &'a SignedParams) -> Vec<(&'a str, &'a str)> {
        let mut params = vec![
            ("videos", signed.videos.as_str()),
            ("access_token", signed.access_token.as_str()),
            ("sig", signed.sig.as_str()),
        ];
        if let Some(callback) = signed.callback.as_deref() {
            params.push(("callback", callback));
        }
        if let Some(version) = self.version.as_deref() {
            params.push(("v", version));
        }
        params
    }
}

/// Parses an API response body into a quality map
///
/// Accepts plain JSON or a JSONP wrapper. Files are read from
/// `response[1].files` (legacy shape, `response[0]` is the count) or
/// `response.items[0].files`. Only `url<NNN>`/`mp4_<NNN>` string fields
/// are kept.
///
/// # Errors
/// Returns `ParseError` for malformed JSON or a missing `files` object
pub fn parse_media_response(body: &str) -> Result<QualityMap> {
    let json = unwrap_jsonp(body);
    let value: Value = serde_json::from_str(json)
        .map_err(|e| SeriesError::ParseError(format!("API response is not JSON: {}", e)))?;

    if let Some(error) = value.get("error") {
        let message = error
            .get("error_msg")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(SeriesError::ParseError(format!("API error: {}", message)));
    }

    let files = value
        .pointer("/response/1/files")
        .or_else(|| value.pointer("/response/items/0/files"))
        .and_then(Value::as_object)
        .ok_or_else(|| SeriesError::ParseError("API response has no files".to_string()))?;

    let qualities = files
        .iter()
        .filter_map(|(key, url)| {
            let quality = quality_from_key(key)?;
            let url = url.as_str()?;
            Some((quality.to_string(), url.to_string()))
        })
        .collect();

    Ok(qualities)
}

/// Strips a `callback(...)` / `callback(...);` wrapper, if present
pub fn unwrap_jsonp(body: &str) -> &str {
    let trimmed = body.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return trimmed;
    }

    let Some(open) = trimmed.find('(') else {
        return trimmed;
    };

    let inner = &trimmed[open + 1..];
    let inner = inner.strip_suffix(';').unwrap_or(inner).trim_end();
    inner.strip_suffix(')').unwrap_or(inner)
}
