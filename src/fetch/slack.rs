use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{ChannelFetcher, ChannelInfo};
use crate::config::SlackConfig;
use crate::error::FetchError;
use crate::sources::RawMessageRecord;

const SLACK_API_BASE: &str = "https://slack.com/api";

/// Slack Web API client with a fixed gap between calls and a per-run cache
/// of user display names.
pub struct SlackClient {
    token: String,
    base_url: String,
    client: reqwest::Client,
    page_size: u32,
    max_retries: u32,
    rate_limit: Duration,
    last_call: Mutex<Option<Instant>>,
    user_names: Mutex<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct AuthTest {
    #[serde(default)]
    team: String,
    #[serde(default)]
    user: String,
}

#[derive(Debug, Deserialize)]
struct ConversationInfo {
    channel: ApiChannel,
}

#[derive(Debug, Deserialize)]
struct ApiChannel {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_private: bool,
    #[serde(default)]
    num_members: u32,
}

#[derive(Debug, Deserialize)]
struct MessagePage {
    #[serde(default)]
    messages: Vec<ApiMessage>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

impl MessagePage {
    fn next_cursor(&self) -> Option<String> {
        if !self.has_more {
            return None;
        }
        self.response_metadata
            .as_ref()
            .map(|meta| meta.next_cursor.clone())
            .filter(|cursor| !cursor.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ApiMessage {
    ts: String,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    thread_ts: Option<String>,
}

impl ApiMessage {
    fn is_thread_parent(&self) -> bool {
        self.thread_ts.as_deref() == Some(self.ts.as_str())
    }

    fn author_id(&self) -> String {
        self.user
            .clone()
            .or_else(|| self.bot_id.clone())
            .unwrap_or_default()
    }

    fn into_record(self, username: String) -> RawMessageRecord {
        RawMessageRecord {
            user_id: self.author_id(),
            timestamp: self.ts,
            username,
            message: self.text,
            thread_ts: self.thread_ts,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    user: ApiUser,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    #[serde(default)]
    name: String,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    profile: Option<ApiProfile>,
}

#[derive(Debug, Deserialize)]
struct ApiProfile {
    #[serde(default)]
    display_name: String,
}

impl ApiUser {
    /// Display name, then real name, then handle.
    fn display_name(&self) -> String {
        let display = self.profile.as_ref().map(|p| p.display_name.as_str());
        [display, self.real_name.as_deref(), Some(self.name.as_str())]
            .into_iter()
            .flatten()
            .find(|name| !name.trim().is_empty())
            .unwrap_or_default()
            .to_string()
    }
}

/// Checks the `ok` flag every Web API response carries, then decodes.
fn decode<T: DeserializeOwned>(method: &str, body: Value) -> Result<T, FetchError> {
    if body.get("ok").and_then(Value::as_bool) != Some(true) {
        let code = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error");
        return Err(FetchError::from_code(method, code));
    }

    serde_json::from_value(body).map_err(|source| FetchError::Decode {
        method: method.to_string(),
        source,
    })
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

impl SlackClient {
    pub fn new(token: impl Into<String>, config: &SlackConfig) -> Self {
        Self {
            token: token.into(),
            base_url: SLACK_API_BASE.to_string(),
            client: reqwest::Client::new(),
            page_size: config.page_size,
            max_retries: config.max_retries,
            rate_limit: Duration::from_millis(config.rate_limit_ms),
            last_call: Mutex::new(None),
            user_names: Mutex::new(HashMap::new()),
        }
    }

    /// Points the client at another API root, e.g. a proxy.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn wait_for_rate_limit(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(last) = *last_call {
            let elapsed = last.elapsed();
            if elapsed < self.rate_limit {
                tokio::time::sleep(self.rate_limit - elapsed).await;
            }
        }
        *last_call = Some(Instant::now());
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let url = format!("{}/{}", self.base_url, method);
        let mut attempt = 0;

        loop {
            self.wait_for_rate_limit().await;

            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.token)
                .header("User-Agent", "chatcloud")
                .form(params)
                .send()
                .await
                .map_err(|source| FetchError::Http {
                    method: method.to_string(),
                    source,
                })?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt >= self.max_retries {
                    return Err(FetchError::RateLimited {
                        method: method.to_string(),
                    });
                }
                let wait = retry_after(response.headers()).unwrap_or(self.rate_limit);
                warn!(method, attempt, wait_ms = wait.as_millis() as u64, "rate limited, backing off");
                tokio::time::sleep(wait).await;
                attempt += 1;
                continue;
            }
            if !status.is_success() {
                return Err(FetchError::Status {
                    method: method.to_string(),
                    status,
                });
            }

            let body: Value = response.json().await.map_err(|source| FetchError::Http {
                method: method.to_string(),
                source,
            })?;
            return decode(method, body);
        }
    }

    /// Fails with [`FetchError::InvalidToken`] when the token is rejected.
    pub async fn validate(&self) -> Result<(), FetchError> {
        let auth: AuthTest = self.call("auth.test", &[]).await?;
        debug!(team = %auth.team, user = %auth.user, "token accepted");
        Ok(())
    }

    pub async fn join_channel(&self, channel_id: &str) -> Result<(), FetchError> {
        let joined: ConversationInfo = self
            .call("conversations.join", &[("channel", channel_id)])
            .await?;
        info!(channel = %joined.channel.name, "joined channel");
        Ok(())
    }

    async fn page(
        &self,
        method: &str,
        channel_id: &str,
        thread_ts: Option<&str>,
        cursor: Option<&str>,
    ) -> Result<MessagePage, FetchError> {
        let limit = self.page_size.to_string();
        let mut params = vec![("channel", channel_id), ("limit", limit.as_str())];
        if let Some(ts) = thread_ts {
            params.push(("ts", ts));
        }
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }
        self.call(method, &params).await
    }

    /// Replies of one thread, without the parent Slack repeats on each page.
    async fn thread_replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
    ) -> Result<Vec<ApiMessage>, FetchError> {
        let mut replies = Vec::new();
        let mut cursor = None;

        loop {
            let page = self
                .page("conversations.replies", channel_id, Some(thread_ts), cursor.as_deref())
                .await?;
            cursor = page.next_cursor();
            replies.extend(page.messages.into_iter().filter(|m| m.ts != thread_ts));
            if cursor.is_none() {
                break;
            }
        }

        Ok(replies)
    }

    /// Looked up once per user per run. Unknown users get an empty name.
    async fn username(&self, message: &ApiMessage) -> String {
        let Some(user_id) = message.user.as_deref() else {
            return message.username.clone().unwrap_or_default();
        };

        if let Some(name) = self.user_names.lock().await.get(user_id) {
            return name.clone();
        }

        let name = match self.call::<UserInfo>("users.info", &[("user", user_id)]).await {
            Ok(info) => info.user.display_name(),
            Err(e) => {
                warn!(user = user_id, "user lookup failed: {e}");
                String::new()
            }
        };
        self.user_names
            .lock()
            .await
            .insert(user_id.to_string(), name.clone());
        name
    }

    async fn record(&self, message: ApiMessage) -> RawMessageRecord {
        let username = self.username(&message).await;
        message.into_record(username)
    }
}

#[async_trait]
impl ChannelFetcher for SlackClient {
    async fn channel_info(&self, channel_id: &str) -> Result<ChannelInfo, FetchError> {
        let info: ConversationInfo = self
            .call("conversations.info", &[("channel", channel_id)])
            .await?;

        Ok(ChannelInfo {
            name: if info.channel.name.is_empty() {
                info.channel.id.clone()
            } else {
                info.channel.name
            },
            id: info.channel.id,
            is_private: info.channel.is_private,
            member_count: info.channel.num_members,
        })
    }

    async fn messages(&self, channel_id: &str) -> Result<Vec<RawMessageRecord>, FetchError> {
        let mut records = Vec::new();
        let mut cursor = None;

        loop {
            let page = self
                .page("conversations.history", channel_id, None, cursor.as_deref())
                .await?;
            cursor = page.next_cursor();
            info!(fetched = page.messages.len(), total = records.len(), "fetched history page");

            for message in page.messages {
                let thread = message.is_thread_parent().then(|| message.ts.clone());
                records.push(self.record(message).await);

                if let Some(thread_ts) = thread {
                    debug!(thread = %thread_ts, "fetching thread replies");
                    for reply in self.thread_replies(channel_id, &thread_ts).await? {
                        records.push(self.record(reply).await);
                    }
                }
            }

            if cursor.is_none() {
                break;
            }
        }

        Ok(records)
    }
}
