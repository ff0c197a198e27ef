//! Test doubles shared across the workspace.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use crate::api::{ApiCaller, ApiRequest, ApiResponse};
use crate::foundation::ApiResult;

/// An [`ApiCaller`] that records requests and answers from a script.
///
/// Responses are matched by URL substring, first match wins. Unmatched
/// requests get `200 {}`.
#[derive(Default)]
pub struct MockApiCaller {
    requests: Mutex<Vec<ApiRequest>>,
    responses: Mutex<Vec<(String, ApiResponse)>>,
}

impl MockApiCaller {
    /// Creates a mock answering every request with `200 {}`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers requests whose URL contains `url_fragment` with `response`.
    pub fn respond(&self, url_fragment: impl Into<String>, response: ApiResponse) {
        self.responses.lock().push((url_fragment.into(), response));
    }

    /// Returns every request received so far.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    /// Returns the requests whose URL contains `url_fragment`.
    pub fn requests_to(&self, url_fragment: &str) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|request| request.url.contains(url_fragment))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ApiCaller for MockApiCaller {
    async fn call(&self, request: ApiRequest) -> ApiResult<ApiResponse> {
        let response = self
            .responses
            .lock()
            .iter()
            .find(|(fragment, _)| request.url.contains(fragment.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| ApiResponse::json(200, &json!({})));

        self.requests.lock().push(request);
        Ok(response)
    }
}
