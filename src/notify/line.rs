//! LINE Messaging API broadcast client

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use super::{NotificationSink, NotifyError};

const BROADCAST_URL: &str = "https://api.line.me/v2/bot/message/broadcast";
const BOT_INFO_URL: &str = "https://api.line.me/v2/bot/info";
const FOLLOWERS_URL: &str = "https://api.line.me/v2/bot/insight/followers";

/// LINE caps a text message at 5000 characters
const MAX_TEXT_CHARS: usize = 5000;

#[derive(Debug, Serialize)]
struct BroadcastRequest<'a> {
    messages: Vec<TextMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotInfo {
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub basic_id: Option<String>,
}

/// Follower insight for one day
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FollowerInsight {
    /// "ready", "unready" or "out_of_service"
    status: String,
    #[serde(default)]
    followers: Option<u64>,
}

impl FollowerInsight {
    fn count(&self) -> Option<u64> {
        if self.status == "ready" {
            self.followers
        } else {
            None
        }
    }
}

/// Broadcasts text messages to every follower of the channel
pub struct LineNotifier {
    client: reqwest::Client,
    access_token: String,
    broadcast_url: String,
    bot_info_url: String,
    followers_url: String,
}

impl LineNotifier {
    pub fn new(access_token: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            access_token: access_token.into(),
            broadcast_url: BROADCAST_URL.to_string(),
            bot_info_url: BOT_INFO_URL.to_string(),
            followers_url: FOLLOWERS_URL.to_string(),
        })
    }

    /// Point the client at another API host (staging, local mock)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        self.broadcast_url = format!("{}/v2/bot/message/broadcast", base);
        self.bot_info_url = format!("{}/v2/bot/info", base);
        self.followers_url = format!("{}/v2/bot/insight/followers", base);
        self
    }

    /// Fetch bot profile to confirm the token works
    pub async fn validate_connection(&self) -> Result<BotInfo, NotifyError> {
        let response = self
            .client
            .get(&self.bot_info_url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let info: BotInfo = response.json().await?;
        info!("LINE bot connection OK: {}", info.display_name);
        Ok(info)
    }

    /// Follower count as of `date`; `None` while LINE has not
    /// aggregated that day yet
    pub async fn follower_count(&self, date: NaiveDate) -> Result<Option<u64>, NotifyError> {
        let response = self
            .client
            .get(&self.followers_url)
            .query(&[("date", date.format("%Y%m%d").to_string())])
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let insight: FollowerInsight = response.json().await?;
        if insight.count().is_none() {
            info!("Follower count for {} is {}", date, insight.status);
        }
        Ok(insight.count())
    }

    pub async fn send_test_message(&self, text: &str) -> Result<(), NotifyError> {
        self.broadcast(text).await
    }
}

/// Truncate to the API's per-message limit
fn clip(text: &str) -> &str {
    match text.char_indices().nth(MAX_TEXT_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[async_trait]
impl NotificationSink for LineNotifier {
    async fn broadcast(&self, message: &str) -> Result<(), NotifyError> {
        if message.trim().is_empty() {
            return Err(NotifyError::EmptyMessage);
        }

        let body = BroadcastRequest {
            messages: vec![TextMessage {
                kind: "text",
                text: clip(message),
            }],
        };

        let response = self
            .client
            .post(&self.broadcast_url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("LINE broadcast failed ({}): {}", status, body);
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!("LINE broadcast sent ({} chars)", message.chars().count());
        Ok(())
    }
}
