//! Slack Web API client helpers used by engagement fetches and report delivery.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::slack_helpers::{
    is_retryable_slack_status, is_retryable_transport_error, parse_retry_after, truncate_chars,
    RetryPolicy,
};

const RETRY_ATTEMPT_HEADER: &str = "x-nonengagers-retry-attempt";
const MAX_PAGES: usize = 1_000;
const USERS_PAGE_LIMIT: &str = "200";
const MEMBERS_PAGE_LIMIT: &str = "1000";
const REPLIES_PAGE_LIMIT: &str = "200";

#[derive(Debug, Clone, Default, Deserialize)]
struct SlackResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

impl SlackResponseMetadata {
    fn next_cursor(&self) -> Option<&str> {
        self.next_cursor
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// One cursor-paginated Slack listing response.
trait SlackCursorPage: DeserializeOwned {
    type Item;

    fn ok(&self) -> bool;
    fn error(&self) -> Option<&str>;
    fn next_cursor(&self) -> Option<String>;
    fn into_items(self) -> Vec<Self::Item>;
}

#[derive(Debug, Clone, Deserialize)]
struct SlackAuthTestResponse {
    ok: bool,
    user_id: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackOpenSocketResponse {
    ok: bool,
    url: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackUsersListResponse {
    ok: bool,
    #[serde(default)]
    members: Vec<SlackUser>,
    #[serde(default)]
    response_metadata: SlackResponseMetadata,
    error: Option<String>,
}

impl SlackCursorPage for SlackUsersListResponse {
    type Item = SlackUser;

    fn ok(&self) -> bool {
        self.ok
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn next_cursor(&self) -> Option<String> {
        self.response_metadata.next_cursor().map(str::to_string)
    }

    fn into_items(self) -> Vec<SlackUser> {
        self.members
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SlackConversationMembersResponse {
    ok: bool,
    #[serde(default)]
    members: Vec<String>,
    #[serde(default)]
    response_metadata: SlackResponseMetadata,
    error: Option<String>,
}

impl SlackCursorPage for SlackConversationMembersResponse {
    type Item = String;

    fn ok(&self) -> bool {
        self.ok
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn next_cursor(&self) -> Option<String> {
        self.response_metadata.next_cursor().map(str::to_string)
    }

    fn into_items(self) -> Vec<String> {
        self.members
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SlackConversationMessagesResponse {
    ok: bool,
    #[serde(default)]
    messages: Vec<SlackMessage>,
    #[serde(default)]
    response_metadata: SlackResponseMetadata,
    error: Option<String>,
}

impl SlackCursorPage for SlackConversationMessagesResponse {
    type Item = SlackMessage;

    fn ok(&self) -> bool {
        self.ok
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn next_cursor(&self) -> Option<String> {
        self.response_metadata.next_cursor().map(str::to_string)
    }

    fn into_items(self) -> Vec<SlackMessage> {
        self.messages
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SlackReactionsGetResponse {
    ok: bool,
    message: Option<SlackMessage>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackChannelRef {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackConversationOpenResponse {
    ok: bool,
    channel: Option<SlackChannelRef>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackChatMessageResponse {
    ok: bool,
    ts: Option<String>,
    channel: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackEphemeralResponse {
    ok: bool,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackGetUploadUrlExternalResponse {
    ok: bool,
    upload_url: Option<String>,
    file_id: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackCompleteUploadExternalResponse {
    ok: bool,
    error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(super) struct SlackUserProfile {
    #[serde(default)]
    pub(super) display_name: Option<String>,
    #[serde(default)]
    pub(super) display_name_normalized: Option<String>,
    #[serde(default)]
    pub(super) real_name: Option<String>,
    #[serde(default)]
    pub(super) real_name_normalized: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct SlackUser {
    pub(super) id: String,
    #[serde(default)]
    pub(super) name: Option<String>,
    #[serde(default)]
    pub(super) deleted: bool,
    #[serde(default)]
    pub(super) is_bot: bool,
    #[serde(default)]
    pub(super) profile: SlackUserProfile,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(super) struct SlackReaction {
    #[serde(default)]
    pub(super) users: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(super) struct SlackMessage {
    #[serde(default)]
    pub(super) ts: Option<String>,
    #[serde(default)]
    pub(super) user: Option<String>,
    #[serde(default)]
    pub(super) bot_id: Option<String>,
    #[serde(default)]
    pub(super) subtype: Option<String>,
    #[serde(default)]
    pub(super) reactions: Vec<SlackReaction>,
}

impl SlackMessage {
    /// Human author when present, else the posting bot.
    pub(super) fn author_id(&self) -> Option<&str> {
        self.user
            .as_deref()
            .filter(|value| !value.is_empty())
            .or_else(|| self.bot_id.as_deref().filter(|value| !value.is_empty()))
    }

    pub(super) fn reactor_ids(&self) -> impl Iterator<Item = &str> {
        self.reactions
            .iter()
            .flat_map(|reaction| reaction.users.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone)]
pub(super) struct SlackPostedMessage {
    pub(super) channel: String,
    pub(super) ts: String,
}

#[derive(Debug, Clone)]
pub(super) struct SlackUploadedFile {
    pub(super) file_id: String,
}

fn ensure_ok(operation: &str, ok: bool, error: Option<&str>) -> Result<()> {
    if !ok {
        bail!(
            "slack {operation} failed: {}",
            error.unwrap_or("unknown error")
        );
    }
    Ok(())
}

#[derive(Clone)]
pub(super) struct SlackApiClient {
    http: reqwest::Client,
    api_base: String,
    app_token: String,
    bot_token: String,
    retry: RetryPolicy,
}

impl SlackApiClient {
    pub(super) fn new(
        api_base: String,
        app_token: String,
        bot_token: String,
        request_timeout_ms: u64,
        retry_max_attempts: usize,
        retry_base_delay_ms: u64,
    ) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("nonengagers-slack-runtime"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create slack api client")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            app_token: app_token.trim().to_string(),
            bot_token: bot_token.trim().to_string(),
            retry: RetryPolicy::new(retry_max_attempts, retry_base_delay_ms),
        })
    }

    pub(super) async fn resolve_bot_user_id(&self) -> Result<String> {
        let response: SlackAuthTestResponse = self.post_json("auth.test", &json!({})).await?;
        ensure_ok("auth.test", response.ok, response.error.as_deref())?;
        response
            .user_id
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("slack auth.test did not return user_id"))
    }

    pub(super) async fn open_socket_connection(&self) -> Result<String> {
        let url = format!("{}/apps.connections.open", self.api_base);
        let response: SlackOpenSocketResponse = self
            .request_json("apps.connections.open", || {
                self.http.post(&url).bearer_auth(&self.app_token)
            })
            .await?;
        ensure_ok(
            "apps.connections.open",
            response.ok,
            response.error.as_deref(),
        )?;
        response
            .url
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("slack apps.connections.open did not return url"))
    }

    pub(super) async fn list_users(&self) -> Result<Vec<SlackUser>> {
        self.collect_pages::<SlackUsersListResponse>(
            "users.list",
            vec![("limit", USERS_PAGE_LIMIT.to_string())],
        )
        .await
    }

    pub(super) async fn list_channel_member_ids(&self, channel: &str) -> Result<Vec<String>> {
        self.collect_pages::<SlackConversationMembersResponse>(
            "conversations.members",
            vec![
                ("channel", channel.to_string()),
                ("limit", MEMBERS_PAGE_LIMIT.to_string()),
            ],
        )
        .await
    }

    /// Returns the parent message followed by every reply in its thread.
    pub(super) async fn list_thread_messages(
        &self,
        channel: &str,
        ts: &str,
    ) -> Result<Vec<SlackMessage>> {
        self.collect_pages::<SlackConversationMessagesResponse>(
            "conversations.replies",
            vec![
                ("channel", channel.to_string()),
                ("ts", ts.to_string()),
                ("limit", REPLIES_PAGE_LIMIT.to_string()),
            ],
        )
        .await
    }

    pub(super) async fn fetch_message(&self, channel: &str, ts: &str) -> Result<SlackMessage> {
        let response: SlackConversationMessagesResponse = self
            .get_json(
                "conversations.history",
                &[
                    ("channel", channel.to_string()),
                    ("latest", ts.to_string()),
                    ("inclusive", "true".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        ensure_ok(
            "conversations.history",
            response.ok,
            response.error.as_deref(),
        )?;
        response
            .messages
            .into_iter()
            .next()
            .filter(|message| message.ts.as_deref() == Some(ts))
            .ok_or_else(|| anyhow!("message not found at timestamp {ts} in channel {channel}"))
    }

    /// Reads reactions through `reactions.get`, falling back to the message body.
    pub(super) async fn fetch_reactions(&self, channel: &str, ts: &str) -> Result<SlackMessage> {
        let primary = async {
            let response: SlackReactionsGetResponse = self
                .get_json(
                    "reactions.get",
                    &[
                        ("channel", channel.to_string()),
                        ("timestamp", ts.to_string()),
                        ("full", "true".to_string()),
                    ],
                )
                .await?;
            ensure_ok("reactions.get", response.ok, response.error.as_deref())?;
            Ok::<_, anyhow::Error>(response.message.unwrap_or_default())
        };
        match primary.await {
            Ok(message) => Ok(message),
            Err(error) => {
                tracing::warn!(
                    channel,
                    ts,
                    error = %error,
                    "reactions.get failed; reading reactions from message history"
                );
                self.fetch_message(channel, ts).await
            }
        }
    }

    pub(super) async fn open_direct_message(&self, user_id: &str) -> Result<String> {
        let response: SlackConversationOpenResponse = self
            .post_json("conversations.open", &json!({ "users": user_id }))
            .await?;
        ensure_ok("conversations.open", response.ok, response.error.as_deref())?;
        response
            .channel
            .map(|channel| channel.id)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("slack conversations.open did not return a channel id"))
    }

    pub(super) async fn post_message(&self, channel: &str, text: &str) -> Result<SlackPostedMessage> {
        let payload = json!({
            "channel": channel,
            "text": text,
            "mrkdwn": true,
            "unfurl_links": false,
            "unfurl_media": false,
        });
        let response: SlackChatMessageResponse =
            self.post_json("chat.postMessage", &payload).await?;
        ensure_ok("chat.postMessage", response.ok, response.error.as_deref())?;

        Ok(SlackPostedMessage {
            channel: response.channel.unwrap_or_else(|| channel.to_string()),
            ts: response
                .ts
                .ok_or_else(|| anyhow!("slack chat.postMessage response missing ts"))?,
        })
    }

    pub(super) async fn post_ephemeral(&self, channel: &str, user: &str, text: &str) -> Result<()> {
        let response: SlackEphemeralResponse = self
            .post_json(
                "chat.postEphemeral",
                &json!({
                    "channel": channel,
                    "user": user,
                    "text": text,
                }),
            )
            .await?;
        ensure_ok("chat.postEphemeral", response.ok, response.error.as_deref())
    }

    /// Posts an ephemeral reply to a slash command `response_url`.
    pub(super) async fn respond(&self, response_url: &str, text: &str) -> Result<()> {
        let payload = json!({
            "response_type": "ephemeral",
            "text": text,
        });
        self.request_bytes("response_url", || self.http.post(response_url).json(&payload))
            .await?;
        Ok(())
    }

    pub(super) async fn upload_file_v2(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        filename: &str,
        title: &str,
        bytes: &[u8],
    ) -> Result<SlackUploadedFile> {
        if filename.trim().is_empty() {
            bail!("slack files upload requires non-empty filename");
        }
        let file_size = bytes.len();
        if file_size == 0 {
            bail!("slack files upload requires non-empty payload");
        }

        let get_upload_url = format!("{}/files.getUploadURLExternal", self.api_base);
        let form = [
            ("filename", filename.to_string()),
            ("length", file_size.to_string()),
        ];
        let get_upload: SlackGetUploadUrlExternalResponse = self
            .request_json("files.getUploadURLExternal", || {
                self.http
                    .post(&get_upload_url)
                    .bearer_auth(&self.bot_token)
                    .form(&form)
            })
            .await?;
        ensure_ok(
            "files.getUploadURLExternal",
            get_upload.ok,
            get_upload.error.as_deref(),
        )?;
        let upload_url = get_upload
            .upload_url
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("slack files.getUploadURLExternal missing upload_url"))?;
        let file_id = get_upload
            .file_id
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("slack files.getUploadURLExternal missing file_id"))?;

        self.request_bytes("external file upload", || {
            self.http
                .post(&upload_url)
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(bytes.to_vec())
        })
        .await?;

        let mut complete_payload = json!({
            "files": [{ "id": file_id.clone(), "title": title }],
            "channel_id": channel,
        });
        if let Some(thread_ts) = thread_ts.map(str::trim).filter(|value| !value.is_empty()) {
            complete_payload["thread_ts"] = Value::String(thread_ts.to_string());
        }

        let complete: SlackCompleteUploadExternalResponse = self
            .post_json("files.completeUploadExternal", &complete_payload)
            .await?;
        ensure_ok(
            "files.completeUploadExternal",
            complete.ok,
            complete.error.as_deref(),
        )?;

        Ok(SlackUploadedFile { file_id })
    }

    /// Follows `next_cursor` until Slack reports the listing is complete.
    async fn collect_pages<P>(&self, method: &str, params: Vec<(&str, String)>) -> Result<Vec<P::Item>>
    where
        P: SlackCursorPage,
    {
        let mut items = Vec::new();
        let mut cursor = String::new();
        for page_index in 0..MAX_PAGES {
            let mut query = params.clone();
            query.push(("cursor", cursor.clone()));
            let page: P = self
                .get_json(method, &query)
                .await
                .with_context(|| format!("slack {method} page {} failed", page_index + 1))?;
            ensure_ok(method, page.ok(), page.error())?;
            let next_cursor = page.next_cursor();
            items.extend(page.into_items());
            match next_cursor {
                Some(next_cursor) => cursor = next_cursor,
                None => return Ok(items),
            }
        }
        bail!("slack {method} did not finish paginating within {MAX_PAGES} pages")
    }

    async fn get_json<T>(&self, method: &str, query: &[(&str, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/{method}", self.api_base);
        self.request_json(method, || {
            self.http.get(&url).bearer_auth(&self.bot_token).query(query)
        })
        .await
    }

    async fn post_json<T>(&self, method: &str, payload: &Value) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/{method}", self.api_base);
        self.request_json(method, || {
            self.http.post(&url).bearer_auth(&self.bot_token).json(payload)
        })
        .await
    }

    async fn request_json<T, F>(&self, operation: &str, builder: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response = self.send_with_retry(operation, builder).await?;
        response
            .json::<T>()
            .await
            .with_context(|| format!("failed to decode slack {operation}"))
    }

    async fn request_bytes<F>(&self, operation: &str, builder: F) -> Result<Vec<u8>>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response = self.send_with_retry(operation, builder).await?;
        Ok(response
            .bytes()
            .await
            .with_context(|| format!("failed to read slack {operation} body"))?
            .to_vec())
    }

    async fn send_with_retry<F>(&self, operation: &str, mut builder: F) -> Result<reqwest::Response>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = builder()
                .header(RETRY_ATTEMPT_HEADER, attempt.saturating_sub(1).to_string())
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if self.retry.allows_another_attempt(attempt)
                        && is_retryable_slack_status(status.as_u16())
                    {
                        tracing::debug!(
                            operation,
                            attempt,
                            status = status.as_u16(),
                            "retrying slack api request"
                        );
                        tokio::time::sleep(self.retry.delay(attempt, retry_after)).await;
                        continue;
                    }

                    bail!(
                        "slack api {operation} failed with status {}: {}",
                        status.as_u16(),
                        truncate_chars(&body, 800)
                    );
                }
                Err(error) => {
                    if self.retry.allows_another_attempt(attempt)
                        && is_retryable_transport_error(&error)
                    {
                        tracing::debug!(operation, attempt, error = %error, "retrying slack api request");
                        tokio::time::sleep(self.retry.delay(attempt, None)).await;
                        continue;
                    }
                    return Err(error)
                        .with_context(|| format!("slack api {operation} request failed"));
                }
            }
        }
    }
}
