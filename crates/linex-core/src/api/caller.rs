//! The outbound HTTP seam.
//!
//! [`ApiCaller`] performs exactly one authenticated HTTP request and hands
//! back the raw response. It knows nothing about endpoints, rate limits or
//! response shapes; [`LineApi`](super::LineApi) layers those on top. The
//! reqwest-backed implementation lives in `linex-transport`, and tests swap in
//! a scripted caller.

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::foundation::{ApiError, ApiResult};

/// HTTP method of an API request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl HttpMethod {
    /// Returns the method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// One outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Absolute URL.
    pub url: String,
    /// JSON body, if any.
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Creates a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            body: None,
        }
    }

    /// Creates a POST request with a JSON body.
    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            body: Some(body),
        }
    }

    /// Creates a PUT request with a JSON body.
    pub fn put(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Put,
            url: url.into(),
            body: Some(body),
        }
    }
}

/// The raw response to an [`ApiRequest`].
#[derive(Debug, Clone, Default)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` header, if present.
    pub content_type: Option<String>,
    /// Response body.
    pub body: Bytes,
}

impl ApiResponse {
    /// Creates a JSON response; used by tests and mock callers.
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            content_type: Some("application/json".to_string()),
            body: Bytes::from(body.to_string()),
        }
    }

    /// Returns whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the body as lossy UTF-8 text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserializes the body as JSON.
    pub fn parse<T: DeserializeOwned>(&self) -> ApiResult<T> {
        serde_json::from_slice(&self.body).map_err(|e| ApiError::decode(e.to_string()))
    }

    /// Maps a non-2xx status into [`ApiError::Status`].
    pub fn error_for_status(self) -> ApiResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ApiError::Status {
                status: self.status,
                message: self.text(),
            })
        }
    }
}

/// Performs authenticated HTTP requests against the platform.
///
/// Implementations attach the bearer token to every request. They must not
/// retry: errors go back to the caller unchanged.
#[async_trait]
pub trait ApiCaller: Send + Sync {
    /// Sends one request and returns the response, whatever its status.
    async fn call(&self, request: ApiRequest) -> ApiResult<ApiResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_for_status() {
        let ok = ApiResponse::json(200, &json!({}));
        assert!(ok.error_for_status().is_ok());

        let bad = ApiResponse::json(400, &json!({ "message": "Invalid reply token" }));
        match bad.error_for_status() {
            Err(ApiError::Status { status, message }) => {
                assert_eq!(status, 400);
                assert!(message.contains("Invalid reply token"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_failure_is_decode_error() {
        let response = ApiResponse {
            status: 200,
            content_type: None,
            body: Bytes::from_static(b"not json"),
        };
        let result: ApiResult<Value> = response.parse();
        assert!(matches!(result, Err(ApiError::Decode(_))));
    }
}
