//! HTTP transport seam.
//!
//! The request authenticator talks to the network through [`Transport`],
//! so the whole coordination layer can be exercised against an in-process
//! fake. [`HttpTransport`] is the production implementation over
//! [`reqwest`].

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

pub use reqwest::Method;

/// Errors raised below the authenticator: the request never produced an
/// HTTP response at all.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request URL could not be resolved against the API base.
    #[error("invalid request url {url}: {reason}")]
    InvalidUrl {
        /// The offending URL or path.
        url: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// Connection, DNS, timeout, or protocol failure.
    #[error("network error: {0}")]
    Network(String),
}

/// One outgoing API call, as described by its caller.
///
/// Kept alive by the coordinator while the call is suspended so it can be
/// replayed verbatim (plus the renewed credential) after re-authentication.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL, or a path resolved against the transport's base URL.
    pub url: String,
    /// Extra headers, name/value. Names are matched case-insensitively.
    pub headers: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    /// A GET request for `url` with no extra headers.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// A POST request for `url` carrying a JSON body.
    #[must_use]
    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body),
        }
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// The response to an [`ApiRequest`].
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, name/value, names lowercased.
    pub headers: Vec<(String, String)>,
    /// Raw response body.
    pub body: String,
}

impl ApiResponse {
    /// Whether the status is in the 2xx range.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// First header value with the given name (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parse the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] if the body is not
    /// valid JSON for `T`.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Executes one API call and returns whatever HTTP response came back.
///
/// Implementations must not interpret authentication failures; status
/// classification is the authenticator's job.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute `request` and collect the response.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] only when no HTTP response was produced;
    /// every status code, including errors, is a successful `execute`.
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// Production [`Transport`] over a shared [`reqwest::Client`].
#[derive(Clone)]
pub struct HttpTransport {
    inner: Arc<HttpTransportInner>,
}

struct HttpTransportInner {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    /// Create a transport resolving relative request paths against
    /// `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidUrl`] if `base_url` is not an
    /// absolute URL.
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let base_url = Url::parse(base_url).map_err(|e| TransportError::InvalidUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            inner: Arc::new(HttpTransportInner {
                client: reqwest::Client::new(),
                base_url,
            }),
        })
    }

    fn resolve(&self, url: &str) -> Result<Url, TransportError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Url::parse(url).map_err(|e| TransportError::InvalidUrl {
                url: url.to_owned(),
                reason: e.to_string(),
            });
        }
        self.inner
            .base_url
            .join(url)
            .map_err(|e| TransportError::InvalidUrl {
                url: url.to_owned(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.resolve(&request.url)?;
        let mut builder = self.inner.client.request(request.method, url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_owned(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_response_header_lookup_is_case_insensitive() {
        let response = ApiResponse {
            status: 200,
            headers: vec![("x-token-expired".to_owned(), "true".to_owned())],
            body: String::new(),
        };
        assert_eq!(response.header("X-Token-Expired"), Some("true"));
        assert_eq!(response.header("x-other"), None);
    }

    #[test]
    fn test_is_success_bounds() {
        let mut response = ApiResponse {
            status: 200,
            headers: vec![],
            body: String::new(),
        };
        assert!(response.is_success());
        response.status = 299;
        assert!(response.is_success());
        response.status = 301;
        assert!(!response.is_success());
        response.status = 401;
        assert!(!response.is_success());
    }

    #[test]
    fn test_resolve_joins_paths_against_base() {
        let transport = HttpTransport::new("https://api.souk.example/v1/").unwrap();
        let resolved = transport.resolve("products/42").unwrap();
        assert_eq!(resolved.as_str(), "https://api.souk.example/v1/products/42");

        let absolute = transport.resolve("https://elsewhere.example/x").unwrap();
        assert_eq!(absolute.as_str(), "https://elsewhere.example/x");
    }

    #[test]
    fn test_new_rejects_relative_base() {
        assert!(HttpTransport::new("/not-absolute").is_err());
    }
}
