//! HTTP session client shared by the scraper and the transfer engine.
//!
//! Wraps a `reqwest` client configured with the session cookie jar and the
//! timeouts appropriate for large media files. All request errors are mapped
//! into the crate [`Error`] with URL context.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, RANGE};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::auth::Session;
use crate::error::Error;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Header carrying the CSRF token on state-changing POSTs.
const CSRF_HEADER: &str = "x-csrftoken";

/// Result of a metadata probe against a media URL.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// The URL after following redirects.
    pub final_url: Url,
    /// Authoritative total size from Content-Length, when the server sent one.
    pub total_size: Option<u64>,
}

/// HTTP client carrying the authenticated session.
///
/// Designed to be created once and reused across scraping and transfers,
/// taking advantage of connection pooling and a shared cookie jar.
#[derive(Clone)]
pub struct SessionClient {
    client: Client,
    csrf_token: Option<String>,
}

// Same redaction rule as the session: the token never reaches logs.
impl std::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("has_csrf", &self.csrf_token.is_some())
            .finish_non_exhaustive()
    }
}

impl SessionClient {
    /// Creates a client from a session with default timeouts.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(session: &Session) -> Self {
        Self::with_timeouts(session, CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a client from a session with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_timeouts(session: &Session, connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .cookie_provider(session.jar.clone())
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self {
            client,
            csrf_token: session.csrf_token.clone(),
        }
    }

    /// Issues a HEAD probe, following redirects, to learn the resolved URL
    /// and the authoritative content length.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Request`]/[`Error::Timeout`] on connection failure
    /// and [`Error::HttpStatus`] on a non-success response.
    pub async fn probe(&self, url: &str) -> Result<ProbeResult, Error> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| Error::request(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::http_status(url, status.as_u16()));
        }

        let total_size = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        debug!(url = %url, final_url = %response.url(), ?total_size, "probe complete");

        Ok(ProbeResult {
            final_url: response.url().clone(),
            total_size,
        })
    }

    /// Issues a ranged GET starting at the given byte offset.
    ///
    /// The response body is left unconsumed for the caller to stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Request`]/[`Error::Timeout`] on connection failure
    /// and [`Error::HttpStatus`] on a non-success response.
    pub async fn fetch_from(&self, url: &Url, offset: u64) -> Result<reqwest::Response, Error> {
        let response = self
            .client
            .get(url.clone())
            .header(RANGE, format!("bytes={offset}-"))
            .send()
            .await
            .map_err(|e| Error::request(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::http_status(url.as_str(), status.as_u16()));
        }

        Ok(response)
    }

    /// Fetches a page body as text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Request`]/[`Error::Timeout`] on connection failure
    /// and [`Error::HttpStatus`] on a non-success response.
    pub async fn get_text(&self, url: &str) -> Result<String, Error> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::request(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::http_status(url, status.as_u16()));
        }

        response.text().await.map_err(|e| Error::request(url, e))
    }

    /// Fetches and deserializes a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`get_text`](Self::get_text), plus
    /// [`Error::UnexpectedResponse`] when the payload does not deserialize.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, Error> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).map_err(|e| Error::unexpected(url, e.to_string()))
    }

    /// Sends a form-encoded POST with the CSRF header attached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Request`]/[`Error::Timeout`] on connection failure
    /// and [`Error::HttpStatus`] on a non-success response.
    pub async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<(), Error> {
        let mut request = self.client.post(url).form(form);
        if let Some(token) = &self.csrf_token {
            request = request.header(CSRF_HEADER, token);
        }

        let response = request.send().await.map_err(|e| Error::request(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::http_status(url, status.as_u16()));
        }
        Ok(())
    }
}
