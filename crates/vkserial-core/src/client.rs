//! HTTP client with retry logic for catalog, hosting and API requests
//!
//! Wraps `reqwest` with a per-request timeout, browser-like headers and
//! exponential backoff for transient errors. Media transfers do not go
//! through this client; see [`crate::transfer`].

use std::time::Duration;

use tracing::debug;

use crate::error::{Result, SeriesError};

pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Maximum retry attempts for transient errors (default: 3)
    pub max_retries: u32,
    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

/// How a request is sent
#[derive(Debug, Clone, Copy)]
enum Method {
    Get,
    GetQuery,
    PostForm,
}

/// HTTP client wrapper with retry logic
///
/// Handles all page and API communication, including:
/// - Per-request timeout
/// - Automatic retries with exponential backoff for transient errors
/// - Proper headers (User-Agent, Accept-Language)
#[derive(Debug, Clone)]
pub struct SeriesClient {
    client: reqwest::Client,
    max_retries: u32,
}

impl SeriesClient {
    /// Create a new client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("ru-RU,ru;q=0.9,en;q=0.8"),
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent)
            .cookie_store(true)
            .default_headers(headers)
            .build()
            .map_err(SeriesError::HttpError)?;

        Ok(Self {
            client,
            max_retries: config.max_retries,
        })
    }

    /// Fetch a page as text
    ///
    /// # Errors
    /// - `HttpError` - Network or HTTP errors
    /// - `NotFound` - Server returned 404
    /// - `RateLimited` - Server returned 429 after all retries exhausted
    pub async fn fetch(&self, url: &str) -> Result<String> {
        self.send_with_retry(Method::Get, url, &[]).await
    }

    /// Send a GET request with query parameters and return the body
    pub async fn get_query(&self, url: &str, params: &[(&str, &str)]) -> Result<String> {
        self.send_with_retry(Method::GetQuery, url, params).await
    }

    /// Send a form-encoded POST request and return the body
    pub async fn post_form(&self, url: &str, params: &[(&str, &str)]) -> Result<String> {
        self.send_with_retry(Method::PostForm, url, params).await
    }

    /// Internal method to send with retry logic
    async fn send_with_retry(
        &self,
        method: Method,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<String> {
        let mut attempt = 0;

        loop {
            match self.do_send(method, url, params).await {
                Ok(body) => return Ok(body),
                Err(e) if Self::is_retryable(&e) && attempt < self.max_retries => {
                    // Exponential backoff: 1s, 2s, 4s
                    let backoff = Duration::from_secs(1 << attempt);
                    debug!("Retrying {} in {:?} after: {}", url, backoff, e);
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Perform a single request attempt
    async fn do_send(&self, method: Method, url: &str, params: &[(&str, &str)]) -> Result<String> {
        debug!("{:?} {}", method, url);

        let request = match method {
            Method::Get => self.client.get(url),
            Method::GetQuery => self.client.get(url).query(params),
            Method::PostForm => self.client.post(url).form(params),
        };

        let response = request.send().await.map_err(SeriesError::HttpError)?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SeriesError::RateLimited);
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SeriesError::NotFound(url.to_string()));
        }

        let response = response.error_for_status().map_err(SeriesError::HttpError)?;
        response.text().await.map_err(SeriesError::HttpError)
    }

    /// Check if an error is retryable
    fn is_retryable(error: &SeriesError) -> bool {
        match error {
            SeriesError::RateLimited => true,
            SeriesError::HttpError(e) => {
                // Retry on timeout, connection errors, or 5xx status codes
                e.is_timeout()
                    || e.is_connect()
                    || e.status()
                        .map(|s| s.is_server_error())
                        .unwrap_or(false)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_client() -> SeriesClient {
        SeriesClient::with_config(ClientConfig {
            timeout_secs: 5,
            max_retries: 0,
            ..ClientConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_retries, 3);
        assert!(config.user_agent.starts_with("Mozilla/5.0"));
    }

    #[test]
    fn test_client_creation() {
        let client = SeriesClient::new();
        assert!(client.is_ok());
    }

    #[test]
    fn test_is_retryable() {
        assert!(SeriesClient::is_retryable(&SeriesError::RateLimited));
        assert!(!SeriesClient::is_retryable(&SeriesError::NotFound("x".to_string())));
        assert!(!SeriesClient::is_retryable(&SeriesError::ParseError("x".to_string())));
    }

    #[tokio::test]
    async fn test_fetch_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/serial"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let body = fast_client()
            .fetch(&format!("{}/serial", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_fetch_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = fast_client().fetch(&format!("{}/missing", server.uri())).await;
        match result {
            Err(SeriesError::NotFound(url)) => assert!(url.ends_with("/missing")),
            other => panic!("Expected NotFound error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_rate_limited_without_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let result = fast_client().fetch(&server.uri()).await;
        assert!(matches!(result, Err(SeriesError::RateLimited)));
    }

    #[tokio::test]
    async fn test_get_query_and_post_form() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/method"))
            .and(query_param("sig", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("get"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/method"))
            .and(body_string_contains("sig=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("post"))
            .mount(&server)
            .await;

        let client = fast_client();
        let url = format!("{}/method", server.uri());

        assert_eq!(client.get_query(&url, &[("sig", "abc")]).await.unwrap(), "get");
        assert_eq!(client.post_form(&url, &[("sig", "abc")]).await.unwrap(), "post");
    }
}
