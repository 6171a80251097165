//! Telegram Bot channel: long polling + message sending via Bot API.

use async_trait::async_trait;
use futures::stream::Stream;
use pricewatch_core::config::TelegramConfig;
use pricewatch_core::error::{PriceWatchError, Result};
use pricewatch_core::traits::Notifier;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

/// Bot API limit for photo captions.
const CAPTION_LIMIT: usize = 1024;

/// Server-side wait for `getUpdates`.
const LONG_POLL_SECS: u64 = 30;

/// Request bound for sends and `getMe`.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Request bound for `getUpdates`; must outlast the long poll.
const LONG_POLL_TIMEOUT: Duration = Duration::from_secs(LONG_POLL_SECS + 15);

/// A text message addressed to the bot.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub sender_name: String,
    pub text: String,
}

/// Telegram Bot channel. Clones share the HTTP client.
#[derive(Clone)]
pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
    last_update_id: i64,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            last_update_id: 0,
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{}",
            self.config.bot_token, method
        )
    }

    /// Get updates using long polling.
    pub async fn get_updates(&mut self) -> Result<Vec<TelegramUpdate>> {
        let response = self
            .client
            .get(self.api_url("getUpdates"))
            .query(&[
                ("offset", (self.last_update_id + 1).to_string()),
                ("timeout", LONG_POLL_SECS.to_string()),
                ("allowed_updates", "[\"message\"]".into()),
            ])
            .timeout(LONG_POLL_TIMEOUT)
            .send()
            .await
            .map_err(|e| PriceWatchError::Delivery(format!("Telegram getUpdates failed: {e}")))?;

        let body: TelegramApiResponse<Vec<TelegramUpdate>> = response
            .json()
            .await
            .map_err(|e| PriceWatchError::Delivery(format!("Invalid Telegram response: {e}")))?;

        let updates = body.into_result("getUpdates")?;
        if let Some(last) = updates.last() {
            self.last_update_id = last.update_id;
        }
        Ok(updates)
    }

    /// Send a text message.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });
        self.post("sendMessage", &body).await
    }

    /// Send a photo by URL with a caption.
    pub async fn send_photo(&self, chat_id: i64, photo_url: &str, caption: &str) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "photo": photo_url,
            "caption": caption,
        });
        self.post("sendPhoto", &body).await
    }

    async fn post(&self, method: &str, body: &serde_json::Value) -> Result<()> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| PriceWatchError::Delivery(format!("{method} failed: {e}")))?;

        let result: TelegramApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| PriceWatchError::Delivery(format!("Invalid {method} response: {e}")))?;
        result.into_result(method).map(|_| ())
    }

    /// Get bot info.
    pub async fn get_me(&self) -> Result<TelegramUser> {
        let response = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| PriceWatchError::Delivery(format!("getMe failed: {e}")))?;
        let body: TelegramApiResponse<TelegramUser> = response
            .json()
            .await
            .map_err(|e| PriceWatchError::Delivery(format!("Invalid getMe response: {e}")))?;
        body.into_result("getMe")
    }

    /// Start polling loop: returns a stream of IncomingMessages.
    pub fn start_polling(self) -> TelegramPollingStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut channel = self;
            tracing::info!("Telegram polling loop started");

            loop {
                match channel.get_updates().await {
                    Ok(updates) => {
                        for update in updates {
                            if let Some(msg) = update.to_incoming()
                                && tx.send(msg).is_err()
                            {
                                tracing::info!("Telegram polling stopped (receiver dropped)");
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!("Telegram polling error: {e}");
                        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
                    }
                }

                tokio::time::sleep(tokio::time::Duration::from_secs(
                    channel.config.poll_interval,
                ))
                .await;
            }
        });

        TelegramPollingStream { rx }
    }
}

/// Stream of incoming Telegram messages from polling.
pub struct TelegramPollingStream {
    rx: tokio::sync::mpsc::UnboundedReceiver<IncomingMessage>,
}

impl Stream for TelegramPollingStream {
    type Item = IncomingMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[async_trait]
impl Notifier for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    /// Photo with caption when an image is known, plain text otherwise.
    /// A rejected photo falls back to text so the alert still lands.
    async fn send(&self, recipient: &str, text: &str, image: Option<&str>) -> Result<()> {
        let chat_id: i64 = recipient
            .parse()
            .map_err(|_| PriceWatchError::Delivery(format!("Invalid chat_id '{recipient}'")))?;

        if let Some(photo) = image
            && text.chars().count() <= CAPTION_LIMIT
        {
            match self.send_photo(chat_id, photo, text).await {
                Ok(()) => return Ok(()),
                Err(e) => tracing::warn!("sendPhoto to {chat_id} failed, sending text: {e}"),
            }
        }
        self.send_message(chat_id, text).await
    }
}

// --- Telegram API Types ---

#[derive(Debug, Deserialize)]
pub struct TelegramApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

impl<T> TelegramApiResponse<T> {
    fn into_result(self, method: &str) -> Result<T> {
        if !self.ok {
            return Err(PriceWatchError::Delivery(format!(
                "Telegram {method} error: {}",
                self.description.unwrap_or_default()
            )));
        }
        self.result
            .ok_or_else(|| PriceWatchError::Delivery(format!("Telegram {method}: empty result")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub text: Option<String>,
    pub date: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
}

impl TelegramUpdate {
    /// Text messages from humans only.
    pub fn to_incoming(&self) -> Option<IncomingMessage> {
        let msg = self.message.as_ref()?;
        let text = msg.text.as_ref()?;
        let from = msg.from.as_ref()?;

        if from.is_bot {
            return None;
        }

        Some(IncomingMessage {
            chat_id: msg.chat.id,
            sender_name: format!(
                "{}{}",
                from.first_name,
                from.last_name
                    .as_deref()
                    .map(|l| format!(" {l}"))
                    .unwrap_or_default()
            ),
            text: text.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(json: serde_json::Value) -> TelegramUpdate {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_long_poll_bound_outlasts_server_wait() {
        assert!(LONG_POLL_TIMEOUT > Duration::from_secs(LONG_POLL_SECS));
        assert!(REQUEST_TIMEOUT < LONG_POLL_TIMEOUT);
    }

    #[test]
    fn test_text_message_becomes_incoming() {
        let u = update(serde_json::json!({
            "update_id": 10,
            "message": {
                "message_id": 1,
                "from": {"id": 42, "is_bot": false, "first_name": "Asha", "last_name": "R"},
                "chat": {"id": 42, "type": "private"},
                "date": 1700000000,
                "text": "/confirm 1000"
            }
        }));
        let msg = u.to_incoming().unwrap();
        assert_eq!(msg.chat_id, 42);
        assert_eq!(msg.sender_name, "Asha R");
        assert_eq!(msg.text, "/confirm 1000");
    }

    #[test]
    fn test_skips_bots_and_non_text() {
        let from_bot = update(serde_json::json!({
            "update_id": 11,
            "message": {
                "message_id": 2,
                "from": {"id": 7, "is_bot": true, "first_name": "Other"},
                "chat": {"id": 42, "type": "private"},
                "date": 1700000000,
                "text": "hello"
            }
        }));
        assert!(from_bot.to_incoming().is_none());

        let sticker = update(serde_json::json!({
            "update_id": 12,
            "message": {
                "message_id": 3,
                "from": {"id": 42, "is_bot": false, "first_name": "Asha"},
                "chat": {"id": 42, "type": "private"},
                "date": 1700000000
            }
        }));
        assert!(sticker.to_incoming().is_none());

        let edited_only = update(serde_json::json!({"update_id": 13}));
        assert!(edited_only.to_incoming().is_none());
    }

    #[test]
    fn test_api_error_response() {
        let body: TelegramApiResponse<serde_json::Value> = serde_json::from_value(
            serde_json::json!({"ok": false, "description": "Bad Request: chat not found"}),
        )
        .unwrap();
        let err = body.into_result("sendMessage").unwrap_err();
        assert!(err.to_string().contains("chat not found"));
    }

    #[test]
    fn test_api_url() {
        let channel = TelegramChannel::new(TelegramConfig {
            bot_token: "123:abc".into(),
            ..TelegramConfig::default()
        });
        assert_eq!(
            channel.api_url("getMe"),
            "https://api.telegram.org/bot123:abc/getMe"
        );
    }

    #[tokio::test]
    async fn test_rejects_non_numeric_recipient() {
        let channel = TelegramChannel::new(TelegramConfig::default());
        let err = channel.send("web-user", "hi", None).await.unwrap_err();
        assert!(matches!(err, PriceWatchError::Delivery(_)));
    }
}
