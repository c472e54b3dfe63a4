use crate::error::{SlackError, WebhookError};
use crate::model::Menu;
use anyhow::{Context, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::Sha256;
use std::time::Duration;

/// Requests older than this are treated as replays.
const MAX_REQUEST_AGE_SECS: i64 = 60 * 5;
const SIGNATURE_VERSION: &str = "v0";
/// Upper bound Slack accepts for a `static_select`.
const MAX_SELECT_OPTIONS: usize = 100;

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn post_text(&self, channel: &str, text: &str) -> Result<(), SlackError>;

    async fn post_menu(&self, channel: &str, menu: &Menu) -> Result<(), SlackError>;
}

#[derive(Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl SlackClient {
    pub fn new(api_base: &str, bot_token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build slack http client")?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
        })
    }

    async fn post_message(&self, body: Value) -> Result<(), SlackError> {
        let response: ApiResponse = self
            .http
            .post(format!("{}/chat.postMessage", self.api_base))
            .bearer_auth(&self.bot_token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.ok {
            Ok(())
        } else {
            Err(SlackError::Api(
                response.error.unwrap_or_else(|| "unknown_error".to_string()),
            ))
        }
    }
}

#[async_trait]
impl Messenger for SlackClient {
    async fn post_text(&self, channel: &str, text: &str) -> Result<(), SlackError> {
        self.post_message(json!({ "channel": channel, "text": text }))
            .await
    }

    async fn post_menu(&self, channel: &str, menu: &Menu) -> Result<(), SlackError> {
        self.post_message(menu_message(channel, menu)).await
    }
}

/// Slack rejects a select without options, so an empty menu goes out as text.
pub fn menu_message(channel: &str, menu: &Menu) -> Value {
    if menu.is_empty() {
        return json!({
            "channel": channel,
            "text": format!(
                "No {}s available. Please mention me again to start over.",
                menu.step
            ),
        });
    }
    json!({
        "channel": channel,
        "text": menu.prompt,
        "blocks": menu_blocks(menu),
    })
}

/// One mrkdwn section with the prompt followed by a single static select.
pub fn menu_blocks(menu: &Menu) -> Value {
    let options = menu
        .options
        .iter()
        .take(MAX_SELECT_OPTIONS)
        .map(|option| {
            json!({
                "text": { "type": "plain_text", "text": option.label },
                "value": option.value,
            })
        })
        .collect::<Vec<_>>();

    json!([
        {
            "type": "section",
            "text": { "type": "mrkdwn", "text": menu.prompt },
        },
        {
            "type": "actions",
            "elements": [
                {
                    "type": "static_select",
                    "placeholder": { "type": "plain_text", "text": menu.step.placeholder() },
                    "options": options,
                    "action_id": menu.action_id(),
                }
            ],
        },
    ])
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEnvelope {
    UrlVerification {
        challenge: String,
        #[serde(default)]
        token: Option<String>,
    },
    EventCallback {
        event: InnerEvent,
        #[serde(default)]
        token: Option<String>,
    },
    #[serde(other)]
    Other,
}

impl EventEnvelope {
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::UrlVerification { token, .. } | Self::EventCallback { token, .. } => {
                token.as_deref()
            }
            Self::Other => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InnerEvent {
    AppMention(MentionEvent),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize, Eq, PartialEq)]
pub struct MentionEvent {
    pub channel: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InteractionForm {
    pub payload: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InteractionPayload {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub channel: Option<IdRef>,
    pub user: IdRef,
    #[serde(default)]
    pub actions: Vec<BlockAction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockAction {
    pub action_id: String,
    #[serde(default)]
    pub selected_option: Option<SelectedOption>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectedOption {
    pub value: String,
}

/// Checks `X-Slack-Signature` against `v0=hex(hmac_sha256(secret, "v0:{ts}:{body}"))`.
pub fn verify_signature(
    signing_secret: &str,
    timestamp: &str,
    body: &[u8],
    signature: &str,
    now: i64,
) -> Result<(), WebhookError> {
    let sent_at = timestamp
        .trim()
        .parse::<i64>()
        .map_err(|_| WebhookError::StaleTimestamp)?;
    if (now - sent_at).abs() > MAX_REQUEST_AGE_SECS {
        return Err(WebhookError::StaleTimestamp);
    }

    let expected = signature
        .strip_prefix("v0=")
        .and_then(|digest| hex::decode(digest).ok())
        .ok_or(WebhookError::BadSignature)?;

    let mut mac = Hmac::<Sha256>::new_from_slice(signing_secret.as_bytes())
        .map_err(|_| WebhookError::BadSignature)?;
    mac.update(format!("{SIGNATURE_VERSION}:{timestamp}:").as_bytes());
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| WebhookError::BadSignature)
}

/// Produces the signature header value Slack would send for `body`.
#[cfg(test)]
pub(crate) fn sign(signing_secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(signing_secret.as_bytes())
        .expect("hmac accepts keys of any length");
    mac.update(format!("{SIGNATURE_VERSION}:{timestamp}:").as_bytes());
    mac.update(body);
    format!("v0={}", hex::encode(mac.finalize().into_bytes()))
}
