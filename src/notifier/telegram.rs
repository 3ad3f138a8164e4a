use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::DELIVERY_TIMEOUT_SECS;
use crate::error::{AppError, Result};
use crate::notifier::{Button, ButtonAction, DeliveryChannel, OutgoingMessage};

/// Telegram refuses photo captions longer than this (characters).
const CAPTION_LIMIT: usize = 1024;

/// Telegram Bot API delivery: `sendPhoto` when the deal has an image and the
/// caption fits, `sendMessage` otherwise.
pub struct TelegramChannel {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl TelegramChannel {
    pub fn new(api_url: &str, token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DELIVERY_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl DeliveryChannel for TelegramChannel {
    async fn deliver(&self, recipient: i64, message: &OutgoingMessage) -> Result<()> {
        let (method, body) = build_request(recipient, message);
        let url = format!("{}/bot{}/{}", self.api_url, self.token, method);

        let resp: TelegramResponse = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;
        if resp.ok {
            Ok(())
        } else {
            Err(AppError::Delivery(
                resp.description
                    .unwrap_or_else(|| format!("{method} rejected without description")),
            ))
        }
    }
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct InlineButton<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_data: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
}

impl<'a> From<&'a Button> for InlineButton<'a> {
    fn from(b: &'a Button) -> Self {
        match &b.action {
            ButtonAction::Noop => InlineButton {
                text: &b.text,
                callback_data: Some("noop"),
                url: None,
            },
            ButtonAction::Url(u) => InlineButton {
                text: &b.text,
                callback_data: None,
                url: Some(u.as_str()),
            },
        }
    }
}

/// Bot API method name and JSON body for one message.
fn build_request(chat_id: i64, message: &OutgoingMessage) -> (&'static str, serde_json::Value) {
    let keyboard: Vec<Vec<InlineButton>> = message
        .buttons
        .iter()
        .map(|row| row.iter().map(InlineButton::from).collect())
        .collect();
    let reply_markup = json!({ "inline_keyboard": keyboard });

    match message.image.as_deref() {
        Some(photo) if message.text.chars().count() <= CAPTION_LIMIT => (
            "sendPhoto",
            json!({
                "chat_id": chat_id,
                "photo": photo,
                "caption": message.text,
                "parse_mode": "HTML",
                "reply_markup": reply_markup,
            }),
        ),
        _ => (
            "sendMessage",
            json!({
                "chat_id": chat_id,
                "text": message.text,
                "parse_mode": "HTML",
                "reply_markup": reply_markup,
            }),
        ),
    }
}
