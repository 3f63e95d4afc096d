//! Minimal HTTP seam shared by the REST channel, the JSON feed and the
//! webhook alerter.
//!
//! Everything above this module speaks [`HttpRequest`]/[`HttpResponse`];
//! only [`reqwest_transport`] touches the network, so adapters are unit
//! tested against an in-memory transport.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// HTTP methods used by feedsync adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        }
    }
}

/// Header list; lookups through [`header_get`] ignore ASCII case.
pub type HttpHeaders = Vec<(String, String)>;

/// An outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Start a request with no headers and an empty body.
    #[must_use]
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url).header("Accept", "application/json")
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add an `Authorization: Bearer` header when a token is present.
    #[must_use]
    pub fn bearer(self, token: Option<&str>) -> Self {
        match token {
            Some(token) if !token.is_empty() => {
                self.header("Authorization", format!("Bearer {token}"))
            }
            _ => self,
        }
    }

    /// Serialize `body` as the JSON payload.
    ///
    /// # Errors
    /// Returns [`HttpError::Encode`] if serialization fails.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, HttpError> {
        self.body = serde_json::to_vec(body).map_err(|e| HttpError::Encode(e.to_string()))?;
        Ok(self
            .header("Content-Type", "application/json")
            .header("Accept", "application/json"))
    }
}

/// A received response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as lossy UTF-8, for error messages.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    /// Returns [`HttpError::Decode`] if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(&self.body).map_err(|e| HttpError::Decode(e.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("http transport error: {0}")]
    Transport(String),

    #[error("http request timed out: {0}")]
    Timeout(String),

    #[error("failed to encode request body: {0}")]
    Encode(String),

    #[error("failed to decode response body: {0}")]
    Decode(String),

    #[error("no mock response registered for {method} {url}")]
    NoMockResponse { method: String, url: String },
}

/// Transport boundary for all HTTP I/O.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// Get the first header value matching `name` (case-insensitive).
#[must_use]
pub fn header_get<'a>(headers: &'a HttpHeaders, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Join a base URL and a path without doubling or dropping the slash.
#[must_use]
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(feature = "reqwest")]
pub mod reqwest_transport {
    use super::*;

    use std::time::Duration as StdDuration;

    /// Network transport backed by reqwest.
    #[derive(Clone)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new(client: reqwest::Client) -> Self {
            Self { client }
        }

        /// Build a client whose requests fail with [`HttpError::Timeout`]
        /// after `timeout`.
        pub fn with_timeout(timeout: StdDuration) -> Result<Self, HttpError> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .user_agent(concat!("feedsync/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| HttpError::Transport(e.to_string()))?;
            Ok(Self { client })
        }
    }

    fn map_reqwest_error(e: reqwest::Error) -> HttpError {
        if e.is_timeout() {
            HttpError::Timeout(e.to_string())
        } else {
            HttpError::Transport(e.to_string())
        }
    }

    #[async_trait]
    impl HttpTransport for ReqwestTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            let method = match request.method {
                HttpMethod::Get => reqwest::Method::GET,
                HttpMethod::Post => reqwest::Method::POST,
                HttpMethod::Put => reqwest::Method::PUT,
            };

            let mut builder = self.client.request(method, &request.url);
            for (k, v) in request.headers {
                builder = builder.header(&k, &v);
            }
            if !request.body.is_empty() {
                builder = builder.body(request.body);
            }

            let resp = builder.send().await.map_err(map_reqwest_error)?;

            let status = resp.status().as_u16();
            let headers: HttpHeaders = resp
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_string(),
                        value.to_str().unwrap_or_default().to_string(),
                    )
                })
                .collect();
            let body = resp.bytes().await.map_err(map_reqwest_error)?.to_vec();

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }
}

// ---------- Test-only mock transport ----------

#[cfg(test)]
pub(crate) use mock::MockTransport;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_get_ignores_case_and_returns_first_match() {
        let headers: HttpHeaders = vec![
            ("Retry-After".to_string(), "30".to_string()),
            ("retry-after".to_string(), "60".to_string()),
        ];
        assert_eq!(header_get(&headers, "RETRY-AFTER"), Some("30"));
        assert_eq!(header_get(&headers, "missing"), None);
    }

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(
            join_url("https://api.example.com/v1/", "/listings"),
            "https://api.example.com/v1/listings"
        );
        assert_eq!(
            join_url("https://api.example.com/v1", "listings"),
            "https://api.example.com/v1/listings"
        );
    }

    #[test]
    fn bearer_skips_missing_or_empty_tokens() {
        let req = HttpRequest::get("https://x").bearer(None).bearer(Some(""));
        assert!(req.headers.iter().all(|(k, _)| k != "Authorization"));

        let req = HttpRequest::get("https://x").bearer(Some("t0k"));
        assert_eq!(header_get(&req.headers, "authorization"), Some("Bearer t0k"));
    }

    #[test]
    fn json_body_sets_content_type() {
        let req = HttpRequest::new(HttpMethod::Post, "https://x")
            .json(&serde_json::json!({"sku": "1001"}))
            .expect("encodes");
        assert_eq!(
            header_get(&req.headers, "content-type"),
            Some("application/json")
        );
        assert_eq!(req.body, br#"{"sku":"1001"}"#.to_vec());
    }

    #[test]
    fn response_json_reports_decode_errors() {
        let resp = HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: b"not json".to_vec(),
        };
        let err = resp.json::<serde_json::Value>().expect_err("invalid json");
        assert!(matches!(err, HttpError::Decode(_)));
        assert!(resp.is_success());
    }

    #[tokio::test]
    async fn mock_transport_replays_fifo_and_records_requests() {
        let transport = MockTransport::new();
        let url = "https://example.com/listings/9/end";
        transport.push(HttpMethod::Post, url, 429, "slow down");
        transport.push(HttpMethod::Post, url, 204, "");

        let first = transport
            .send(HttpRequest::new(HttpMethod::Post, url))
            .await
            .expect("first");
        let second = transport
            .send(HttpRequest::new(HttpMethod::Post, url))
            .await
            .expect("second");

        assert_eq!(first.status, 429);
        assert_eq!(second.status, 204);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn mock_transport_errors_when_route_is_unknown() {
        let transport = MockTransport::new();
        let err = transport
            .send(HttpRequest::get("https://example.com/missing"))
            .await
            .expect_err("missing mock should error");
        match err {
            HttpError::NoMockResponse { method, url } => {
                assert_eq!(method, "GET");
                assert_eq!(url, "https://example.com/missing");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    #[cfg(feature = "reqwest")]
    fn reqwest_transport_with_timeout_builds_client() {
        let transport = reqwest_transport::ReqwestTransport::with_timeout(
            std::time::Duration::from_millis(10),
        )
        .expect("reqwest transport should build");
        let _ = transport;
    }

    #[tokio::test]
    #[cfg(feature = "reqwest")]
    async fn reqwest_transport_rejects_invalid_url() {
        let transport = reqwest_transport::ReqwestTransport::new(reqwest::Client::new());
        let err = transport
            .send(HttpRequest::get("not a url"))
            .await
            .expect_err("expected error");
        assert!(matches!(err, HttpError::Transport(_)));
    }
}
