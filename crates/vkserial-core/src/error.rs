//! Error types for the vkserial pipeline
//!
//! Provides a single error enum with human-readable messages. Script
//! evaluation errors live in [`crate::sandbox`] and convert into it.

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::sandbox::ScriptError;

/// Error type for all vkserial operations
///
/// Implements Display for human-readable messages and Serialize so a run
/// report can be dumped as JSON.
#[derive(Error, Debug)]
pub enum SeriesError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Failed to parse HTML or API content
    #[error("Failed to parse: {0}")]
    ParseError(String),

    /// Expected HTML element was not found
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Invalid URL format
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Rate limited by server (HTTP 429)
    #[error("Rate limited - too many requests")]
    RateLimited,

    /// Resource not found on server
    #[error("Not found: {0}")]
    NotFound(String),

    /// Episode range specification could not be parsed
    #[error("Invalid episode range: {0}")]
    InvalidRange(String),

    /// An episode link lacks a parameter needed to reach its hosting page
    #[error("Missing parameter: {0}")]
    MissingParam(String),

    /// The embedded hosting script could not be evaluated
    #[error("Script evaluation failed: {0}")]
    Script(#[from] ScriptError),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A transfer could not be completed
    #[error("Transfer failed: {0}")]
    Transfer(String),
}

impl Serialize for SeriesError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Result type alias for vkserial operations
pub type Result<T> = std::result::Result<T, SeriesError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_parse_error() {
        let error = SeriesError::ParseError("missing element".to_string());
        assert_eq!(error.to_string(), "Failed to parse: missing element");
    }

    #[test]
    fn test_error_display_element_not_found() {
        let error = SeriesError::ElementNotFound(".titlfull".to_string());
        assert_eq!(error.to_string(), "Element not found: .titlfull");
    }

    #[test]
    fn test_error_display_rate_limited() {
        let error = SeriesError::RateLimited;
        assert_eq!(error.to_string(), "Rate limited - too many requests");
    }

    #[test]
    fn test_error_display_invalid_range() {
        let error = SeriesError::InvalidRange("1-x".to_string());
        assert_eq!(error.to_string(), "Invalid episode range: 1-x");
    }

    #[test]
    fn test_error_display_missing_param() {
        let error = SeriesError::MissingParam("oid".to_string());
        assert_eq!(error.to_string(), "Missing parameter: oid");
    }

    #[test]
    fn test_error_from_script_error() {
        let error: SeriesError = ScriptError::SlotEmpty("params".to_string()).into();
        assert_eq!(
            error.to_string(),
            "Script evaluation failed: output slot `params` was never assigned"
        );
    }

    #[test]
    fn test_error_serialize() {
        let error = SeriesError::Transfer("connection reset".to_string());
        let json = serde_json::to_string(&error).expect("Serialization should succeed");
        assert_eq!(json, "\"Transfer failed: connection reset\"");
    }
}
