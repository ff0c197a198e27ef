//! Typed Messaging API operations.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::trace;

use super::caller::{ApiCaller, ApiRequest, ApiResponse};
use crate::foundation::{ApiError, ApiResult, RateLimit, RateLimits};
use crate::model::{BotUser, Group, Message, MessageContent, User, WebhookEndpoint, WebhookTest};

/// Default host of the Messaging API.
pub const DEFAULT_API_BASE: &str = "https://api.line.me";

/// Default host serving message content.
pub const DEFAULT_DATA_BASE: &str = "https://api-data.line.me";

/// Typed client over an [`ApiCaller`].
///
/// Every operation first acquires its rate bucket, then sends one request.
/// Buckets belong to this instance; two clients never share a budget.
pub struct LineApi {
    caller: Arc<dyn ApiCaller>,
    limits: RateLimits,
    base_url: String,
    data_base_url: String,
}

impl LineApi {
    /// Creates a client using the default hosts.
    pub fn new(caller: Arc<dyn ApiCaller>) -> Self {
        Self::with_base_urls(caller, DEFAULT_API_BASE, DEFAULT_DATA_BASE)
    }

    /// Creates a client against custom hosts.
    pub fn with_base_urls(
        caller: Arc<dyn ApiCaller>,
        base_url: impl Into<String>,
        data_base_url: impl Into<String>,
    ) -> Self {
        Self {
            caller,
            limits: RateLimits::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            data_base_url: data_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Returns the rate limit buckets.
    pub fn limits(&self) -> &RateLimits {
        &self.limits
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, bucket: &RateLimit, request: ApiRequest) -> ApiResult<ApiResponse> {
        bucket.acquire().await;
        trace!(
            bucket = bucket.name(),
            method = request.method.as_str(),
            url = %request.url,
            "Calling Messaging API"
        );
        self.caller.call(request).await
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// Replies to an event using its reply token.
    pub async fn reply(
        &self,
        reply_token: &str,
        messages: Vec<Message>,
        notification_disabled: bool,
    ) -> ApiResult<()> {
        let body = json!({
            "replyToken": reply_token,
            "messages": messages,
            "notificationDisabled": notification_disabled,
        });
        let request = ApiRequest::post(self.url("/v2/bot/message/reply"), body);
        self.send(&self.limits.other, request)
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Pushes messages to a user, group or room.
    pub async fn push(
        &self,
        to: &str,
        messages: Vec<Message>,
        notification_disabled: bool,
    ) -> ApiResult<()> {
        let body = json!({
            "to": to,
            "messages": messages,
            "notificationDisabled": notification_disabled,
        });
        let request = ApiRequest::post(self.url("/v2/bot/message/push"), body);
        self.send(&self.limits.other, request)
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Downloads the content of a media or file message stored by the platform.
    ///
    /// 404 means the message ID is unknown, 410 that the content expired.
    pub async fn message_content(&self, message_id: &str) -> ApiResult<MessageContent> {
        let url = format!("{}/v2/bot/message/{message_id}/content", self.data_base_url);
        let response = self.send(&self.limits.other, ApiRequest::get(url)).await?;

        match response.status {
            404 => Err(ApiError::NotFound(format!("message {message_id}"))),
            410 => Err(ApiError::Gone(format!("content of message {message_id}"))),
            _ => Ok(into_content(response.error_for_status()?)),
        }
    }

    /// Downloads content hosted at an external URL.
    pub async fn fetch_external(&self, url: &str) -> ApiResult<MessageContent> {
        let response = self.send(&self.limits.other, ApiRequest::get(url)).await?;
        if response.status == 404 {
            return Err(ApiError::NotFound(url.to_string()));
        }
        Ok(into_content(response.error_for_status()?))
    }

    // =========================================================================
    // Profiles and groups
    // =========================================================================

    /// Fetches a user profile.
    pub async fn profile(&self, user_id: &str) -> ApiResult<User> {
        let request = ApiRequest::get(self.url(&format!("/v2/bot/profile/{user_id}")));
        self.send(&self.limits.other, request)
            .await?
            .error_for_status()?
            .parse()
    }

    /// Fetches a group summary.
    pub async fn group_summary(&self, group_id: &str) -> ApiResult<Group> {
        let request = ApiRequest::get(self.url(&format!("/v2/bot/group/{group_id}/summary")));
        self.send(&self.limits.other, request)
            .await?
            .error_for_status()?
            .parse()
    }

    /// Counts the members of a group.
    pub async fn group_member_count(&self, group_id: &str) -> ApiResult<u64> {
        #[derive(Deserialize)]
        struct Count {
            count: u64,
        }

        let request = ApiRequest::get(
            self.url(&format!("/v2/bot/group/{group_id}/members/count")),
        );
        let count: Count = self
            .send(&self.limits.other, request)
            .await?
            .error_for_status()?
            .parse()?;
        Ok(count.count)
    }

    /// Fetches the bot's own account information.
    pub async fn bot_info(&self) -> ApiResult<BotUser> {
        let request = ApiRequest::get(self.url("/v2/bot/info"));
        self.send(&self.limits.other, request)
            .await?
            .error_for_status()?
            .parse()
    }

    // =========================================================================
    // Webhook settings
    // =========================================================================

    /// Returns the configured webhook endpoint.
    pub async fn webhook_endpoint(&self) -> ApiResult<WebhookEndpoint> {
        let request = ApiRequest::get(self.url("/v2/bot/channel/webhook/endpoint"));
        self.send(&self.limits.webhook_endpoint, request)
            .await?
            .error_for_status()?
            .parse()
    }

    /// Sets the webhook endpoint URL.
    pub async fn set_webhook_endpoint(&self, endpoint: &str) -> ApiResult<()> {
        let request = ApiRequest::put(
            self.url("/v2/bot/channel/webhook/endpoint"),
            json!({ "endpoint": endpoint }),
        );
        self.send(&self.limits.webhook_endpoint, request)
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Asks the platform to deliver a test event.
    ///
    /// Without an explicit endpoint the configured one is tested.
    pub async fn test_webhook_endpoint(&self, endpoint: Option<&str>) -> ApiResult<WebhookTest> {
        let body = match endpoint {
            Some(endpoint) => json!({ "endpoint": endpoint }),
            None => Value::Object(Default::default()),
        };
        let request = ApiRequest::post(self.url("/v2/bot/channel/webhook/test"), body);
        self.send(&self.limits.stats_and_broadcast, request)
            .await?
            .error_for_status()?
            .parse()
    }
}

fn into_content(response: ApiResponse) -> MessageContent {
    MessageContent {
        bytes: response.body,
        content_type: response.content_type,
    }
}

impl std::fmt::Debug for LineApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineApi")
            .field("base_url", &self.base_url)
            .field("data_base_url", &self.data_base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::caller::HttpMethod;
    use crate::testing::MockApiCaller;

    fn api(mock: &Arc<MockApiCaller>) -> LineApi {
        LineApi::new(Arc::clone(mock) as Arc<dyn ApiCaller>)
    }

    #[tokio::test]
    async fn test_reply_body() {
        let mock = Arc::new(MockApiCaller::new());
        api(&mock)
            .reply("token", vec![Message::text("hi")], true)
            .await
            .unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].url, "https://api.line.me/v2/bot/message/reply");
        assert_eq!(
            requests[0].body,
            Some(json!({
                "replyToken": "token",
                "messages": [{ "type": "text", "text": "hi" }],
                "notificationDisabled": true
            }))
        );
    }

    #[tokio::test]
    async fn test_profile_decodes_user() {
        let mock = Arc::new(MockApiCaller::new());
        mock.respond(
            "/v2/bot/profile/U1",
            ApiResponse::json(200, &json!({ "userId": "U1", "displayName": "Brown" })),
        );

        let user = api(&mock).profile("U1").await.unwrap();
        assert_eq!(user.display_name, "Brown");
    }

    #[tokio::test]
    async fn test_member_count() {
        let mock = Arc::new(MockApiCaller::new());
        mock.respond(
            "/members/count",
            ApiResponse::json(200, &json!({ "count": 42 })),
        );

        assert_eq!(api(&mock).group_member_count("C1").await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_content_status_mapping() {
        let mock = Arc::new(MockApiCaller::new());
        mock.respond("/message/gone/content", ApiResponse::json(410, &json!({})));
        mock.respond("/message/missing/content", ApiResponse::json(404, &json!({})));

        let api = api(&mock);
        assert!(matches!(api.message_content("gone").await, Err(ApiError::Gone(_))));
        assert!(matches!(
            api.message_content("missing").await,
            Err(ApiError::NotFound(_))
        ));
        assert!(
            mock.requests()[0]
                .url
                .starts_with("https://api-data.line.me/v2/bot/message/")
        );
    }

    #[tokio::test]
    async fn test_error_status_passes_through() {
        let mock = Arc::new(MockApiCaller::new());
        mock.respond(
            "/v2/bot/info",
            ApiResponse::json(401, &json!({ "message": "Authentication failed" })),
        );

        match api(&mock).bot_info().await {
            Err(ApiError::Status { status: 401, .. }) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_webhook_test_without_endpoint() {
        let mock = Arc::new(MockApiCaller::new());
        mock.respond(
            "/webhook/test",
            ApiResponse::json(
                200,
                &json!({ "success": true, "statusCode": 200, "reason": "OK", "detail": "200" }),
            ),
        );

        let result = api(&mock).test_webhook_endpoint(None).await.unwrap();
        assert!(result.success);
        assert_eq!(result.status_code, Some(200));
        assert_eq!(mock.requests()[0].body, Some(json!({})));
    }
}
