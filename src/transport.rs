use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::query::PageRequest;

/// Raw answer of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Sends one page request. The client issues exactly one call per page.
pub trait Transport {
    fn fetch(&self, endpoint: &str, api_key: &str, request: &PageRequest) -> Result<RawResponse>;
}

/// Blocking `reqwest` transport used by default.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: HttpClient,
}

impl HttpTransport {
    pub fn new(timeout: Duration, verify: bool) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("mpds-client-rs/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("mpds-client-rs")),
        );

        let mut builder = HttpClient::builder()
            .default_headers(default_headers)
            .timeout(timeout);

        if !verify {
            tracing::warn!("TLS certificate verification is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, endpoint: &str, api_key: &str, request: &PageRequest) -> Result<RawResponse> {
        let transport_err = |source: reqwest::Error| Error::Transport {
            url: endpoint.to_string(),
            source,
        };

        let resp = self
            .http
            .get(endpoint)
            .query(request)
            .header("Key", api_key.trim())
            .send()
            .map_err(transport_err)?;

        let status = resp.status().as_u16();
        let body = resp.text().map_err(transport_err)?;
        Ok(RawResponse { status, body })
    }
}
