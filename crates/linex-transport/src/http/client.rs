//! reqwest-backed API caller.

use std::time::Duration;

use async_trait::async_trait;
use linex_core::api::{DEFAULT_API_BASE, DEFAULT_DATA_BASE};
use linex_core::{ApiCaller, ApiError, ApiRequest, ApiResponse, ApiResult, HttpMethod};
use reqwest::{Client, ClientBuilder, Method, Url, header::CONTENT_TYPE};
use tracing::{trace, warn};

use crate::error::{TransportError, TransportResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// An [`ApiCaller`] that sends requests with reqwest.
///
/// The bearer token is attached only to requests under the configured API
/// base URLs, so downloads from external content providers never see it.
/// A URL is under a base when scheme, host and port match and its path
/// continues the base path at a `/` boundary.
#[derive(Clone)]
pub struct HttpApiCaller {
    client: Client,
    access_token: String,
    api_bases: Vec<Url>,
}

impl HttpApiCaller {
    /// Creates a caller with the default 30 second timeout.
    pub fn new(access_token: impl Into<String>) -> TransportResult<Self> {
        Self::with_timeout(access_token, DEFAULT_TIMEOUT)
    }

    /// Creates a caller with a custom timeout.
    pub fn with_timeout(access_token: impl Into<String>, timeout: Duration) -> TransportResult<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("linex/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self {
            client,
            access_token: access_token.into(),
            api_bases: Vec::new(),
        }
        .with_api_bases([DEFAULT_API_BASE, DEFAULT_DATA_BASE]))
    }

    /// Replaces the base URLs that receive the bearer token.
    ///
    /// Bases that do not parse as URLs are skipped with a warning.
    pub fn with_api_bases<I, S>(mut self, bases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.api_bases = bases
            .into_iter()
            .filter_map(|base| match Url::parse(base.as_ref()) {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!(base = base.as_ref(), error = %e, "Ignoring invalid API base URL");
                    None
                }
            })
            .collect();
        self
    }

    fn is_authorized(&self, url: &str) -> bool {
        let Ok(url) = Url::parse(url) else {
            return false;
        };
        self.api_bases.iter().any(|base| is_under(&url, base))
    }
}

fn is_under(url: &Url, base: &Url) -> bool {
    if url.scheme() != base.scheme()
        || url.host_str().is_none()
        || url.host_str() != base.host_str()
        || url.port_or_known_default() != base.port_or_known_default()
    {
        return false;
    }

    let prefix = base.path().trim_end_matches('/');
    match url.path().strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

impl std::fmt::Debug for HttpApiCaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApiCaller")
            .field("api_bases", &self.api_bases)
            .finish_non_exhaustive()
    }
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

#[async_trait]
impl ApiCaller for HttpApiCaller {
    async fn call(&self, request: ApiRequest) -> ApiResult<ApiResponse> {
        let mut builder = self.client.request(method(request.method), &request.url);
        if self.is_authorized(&request.url) {
            builder = builder.bearer_auth(&self.access_token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::transport(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::transport(e.to_string()))?;

        trace!(status, len = body.len(), url = %request.url, "API response received");
        Ok(ApiResponse {
            status,
            content_type,
            body,
        })
    }
}
