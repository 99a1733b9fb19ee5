//! Telegram Bot channel — long polling + message sending via Bot API.

use async_trait::async_trait;
use futures::stream::Stream;
use mecha_core::config::TelegramSettings;
use mecha_core::error::{MechaError, Result};
use mecha_core::traits::{Choice, Transport};
use mecha_core::types::{CallbackEvent, IncomingEvent, IncomingMedia, IncomingMessage, MediaKind, RecipientId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

const API_BASE: &str = "https://api.telegram.org";

/// Telegram Bot channel. Shared behind an `Arc`: one task polls, any task sends.
pub struct TelegramChannel {
    bot_token: String,
    settings: TelegramSettings,
    client: reqwest::Client,
    api_base: String,
    last_update_id: AtomicI64,
}

impl TelegramChannel {
    pub fn new(bot_token: impl Into<String>, settings: TelegramSettings) -> Self {
        Self {
            bot_token: bot_token.into(),
            settings,
            client: reqwest::Client::new(),
            api_base: API_BASE.to_string(),
            last_update_id: AtomicI64::new(0),
        }
    }

    /// Point at a different Bot API server (self-hosted `telegram-bot-api`).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, self.bot_token, file_path)
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.request_timeout_secs)
    }

    /// Decode a Bot API envelope, turning `ok: false` into a channel error.
    async fn parse_response<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> Result<T> {
        let body: TelegramApiResponse<T> = response
            .json()
            .await
            .map_err(|e| MechaError::Channel(format!("Invalid {method} response: {e}")))?;
        if !body.ok {
            return Err(MechaError::Channel(format!(
                "{method} failed: {}",
                body.description.unwrap_or_default()
            )));
        }
        body.result
            .ok_or_else(|| MechaError::Channel(format!("{method} returned no result")))
    }

    /// POST a JSON body to a Bot API method.
    async fn call<T: DeserializeOwned>(&self, method: &str, body: serde_json::Value) -> Result<T> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(&body)
            .timeout(self.request_timeout())
            .send()
            .await
            .map_err(|e| MechaError::Channel(format!("{method} failed: {e}")))?;
        Self::parse_response(method, response).await
    }

    /// Get bot info.
    pub async fn get_me(&self) -> Result<TelegramUser> {
        self.call("getMe", serde_json::json!({})).await
    }

    /// Get updates using long polling.
    pub async fn get_updates(&self) -> Result<Vec<TelegramUpdate>> {
        let offset = self.last_update_id.load(Ordering::SeqCst) + 1;
        let long_poll = self.settings.long_poll_secs;
        let response = self
            .client
            .get(self.api_url("getUpdates"))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", long_poll.to_string()),
                ("allowed_updates", "[\"message\",\"callback_query\"]".into()),
            ])
            .timeout(Duration::from_secs(long_poll + 10))
            .send()
            .await
            .map_err(|e| MechaError::Channel(format!("Telegram getUpdates failed: {e}")))?;

        let updates: Vec<TelegramUpdate> = Self::parse_response("getUpdates", response).await?;
        if let Some(last) = updates.last() {
            self.last_update_id.store(last.update_id, Ordering::SeqCst);
        }
        Ok(updates)
    }

    /// Send an HTML-formatted text message, optionally with an inline keyboard.
    pub async fn send_message(
        &self,
        chat_id: &RecipientId,
        text: &str,
        reply_markup: Option<serde_json::Value>,
    ) -> Result<()> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
        });
        if let Some(markup) = reply_markup {
            body["reply_markup"] = markup;
        }
        let _: serde_json::Value = self.call("sendMessage", body).await?;
        Ok(())
    }

    pub async fn edit_message_text(&self, chat_id: &RecipientId, message_id: i64, text: &str) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
            "parse_mode": "HTML",
        });
        let _: serde_json::Value = self.call("editMessageText", body).await?;
        Ok(())
    }

    pub async fn answer_callback_query(&self, id: &str, text: Option<&str>, show_alert: bool) -> Result<()> {
        let mut body = serde_json::json!({
            "callback_query_id": id,
            "show_alert": show_alert,
        });
        if let Some(text) = text {
            body["text"] = serde_json::Value::String(text.to_string());
        }
        let _: bool = self.call("answerCallbackQuery", body).await?;
        Ok(())
    }

    /// Upload a local file with `sendPhoto` / `sendVideo` / `sendDocument`.
    async fn send_file(&self, method: &str, field: &str, chat_id: &RecipientId, path: &Path) -> Result<()> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            MechaError::Channel(format!("{method}: cannot read {}: {e}", path.display()))
        })?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part(field.to_string(), reqwest::multipart::Part::bytes(bytes).file_name(file_name));

        let response = self
            .client
            .post(self.api_url(method))
            .multipart(form)
            .timeout(self.request_timeout())
            .send()
            .await
            .map_err(|e| MechaError::Channel(format!("{method} failed: {e}")))?;
        let _: serde_json::Value = Self::parse_response(method, response).await?;
        Ok(())
    }

    /// Resolve a `file_id` to its server-side path.
    pub async fn get_file(&self, file_id: &str) -> Result<TelegramFile> {
        self.call("getFile", serde_json::json!({ "file_id": file_id })).await
    }

    /// Start polling loop — returns a stream of incoming events.
    pub fn start_polling(self: Arc<Self>) -> TelegramPollingStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            tracing::info!("Telegram polling loop started");

            loop {
                match self.get_updates().await {
                    Ok(updates) => {
                        for update in updates {
                            if let Some(event) = update.to_event()
                                && tx.send(event).is_err()
                            {
                                tracing::info!("Telegram polling stopped (receiver dropped)");
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!("Telegram polling error: {e}");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }

                tokio::time::sleep(Duration::from_secs(self.settings.poll_interval)).await;
            }
        });

        TelegramPollingStream { rx }
    }
}

/// Inline keyboard markup with `per_row` buttons per line.
pub fn inline_keyboard(choices: &[Choice], per_row: usize) -> serde_json::Value {
    let rows: Vec<Vec<serde_json::Value>> = choices
        .chunks(per_row.max(1))
        .map(|row| {
            row.iter()
                .map(|c| serde_json::json!({ "text": c.label, "callback_data": c.data }))
                .collect()
        })
        .collect();
    serde_json::json!({ "inline_keyboard": rows })
}

/// Stream of incoming Telegram events from polling.
pub struct TelegramPollingStream {
    rx: tokio::sync::mpsc::UnboundedReceiver<IncomingEvent>,
}

impl Stream for TelegramPollingStream {
    type Item = IncomingEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[async_trait]
impl Transport for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_text(&self, to: &RecipientId, text: &str) -> Result<()> {
        self.send_message(to, text, None).await
    }

    async fn send_photo(&self, to: &RecipientId, path: &Path) -> Result<()> {
        self.send_file("sendPhoto", "photo", to, path).await
    }

    async fn send_video(&self, to: &RecipientId, path: &Path) -> Result<()> {
        self.send_file("sendVideo", "video", to, path).await
    }

    async fn send_document(&self, to: &RecipientId, path: &Path) -> Result<()> {
        self.send_file("sendDocument", "document", to, path).await
    }

    async fn download(&self, file_ref: &str) -> Result<Vec<u8>> {
        let file = self.get_file(file_ref).await?;
        let file_path = file
            .file_path
            .ok_or_else(|| MechaError::Channel(format!("getFile: no path for {file_ref}")))?;

        let response = self
            .client
            .get(self.file_url(&file_path))
            .timeout(self.request_timeout())
            .send()
            .await
            .map_err(|e| MechaError::Channel(format!("File download failed: {e}")))?;
        if !response.status().is_success() {
            return Err(MechaError::Channel(format!(
                "File download failed: HTTP {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| MechaError::Channel(format!("File download failed: {e}")))?;
        Ok(bytes.to_vec())
    }

    async fn send_choices(&self, to: &RecipientId, text: &str, choices: &[Choice], per_row: usize) -> Result<()> {
        self.send_message(to, text, Some(inline_keyboard(choices, per_row)))
            .await
    }

    async fn edit_text(&self, chat: &RecipientId, message_id: i64, text: &str) -> Result<()> {
        self.edit_message_text(chat, message_id, text).await
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>, alert: bool) -> Result<()> {
        self.answer_callback_query(callback_id, text, alert).await
    }
}

// --- Telegram API Types ---

#[derive(Debug, Deserialize)]
pub struct TelegramApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
    pub callback_query: Option<TelegramCallbackQuery>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub text: Option<String>,
    pub caption: Option<String>,
    /// Sizes of one photo, smallest first.
    pub photo: Option<Vec<TelegramPhotoSize>>,
    pub video: Option<TelegramFileRef>,
    pub document: Option<TelegramFileRef>,
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
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramPhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
}

/// Video or document attached to a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramFileRef {
    pub file_id: String,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramCallbackQuery {
    pub id: String,
    pub from: TelegramUser,
    pub message: Option<TelegramMessage>,
    pub data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramFile {
    pub file_id: String,
    pub file_path: Option<String>,
}

impl TelegramUser {
    fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {last}", self.first_name),
            None => self.first_name.clone(),
        }
    }
}

impl TelegramMessage {
    /// Largest photo, else video, else document.
    fn media(&self) -> Option<IncomingMedia> {
        if let Some(largest) = self.photo.as_ref().and_then(|sizes| sizes.last()) {
            return Some(IncomingMedia {
                file_ref: largest.file_id.clone(),
                kind: MediaKind::Image,
                file_name: None,
            });
        }
        if let Some(video) = &self.video {
            return Some(IncomingMedia {
                file_ref: video.file_id.clone(),
                kind: MediaKind::Video,
                file_name: video.file_name.clone(),
            });
        }
        self.document.as_ref().map(|doc| IncomingMedia {
            file_ref: doc.file_id.clone(),
            kind: MediaKind::Document,
            file_name: doc.file_name.clone(),
        })
    }
}

impl TelegramUpdate {
    /// Convert to a transport-neutral event. Bot senders and empty messages are dropped.
    pub fn to_event(&self) -> Option<IncomingEvent> {
        if let Some(query) = &self.callback_query {
            if query.from.is_bot {
                return None;
            }
            let message = query.message.as_ref();
            let chat_id = message.map(|m| m.chat.id).unwrap_or(query.from.id);
            return Some(IncomingEvent::Callback(CallbackEvent {
                id: query.id.clone(),
                chat_id: RecipientId::Id(chat_id),
                message_id: message.map(|m| m.message_id),
                sender_id: query.from.id,
                data: query.data.clone().unwrap_or_default(),
            }));
        }

        let msg = self.message.as_ref()?;
        let from = msg.from.as_ref()?;
        if from.is_bot {
            return None;
        }
        let media = msg.media();
        let text = msg.text.as_ref().or(msg.caption.as_ref()).cloned();
        if text.is_none() && media.is_none() {
            return None;
        }

        Some(IncomingEvent::Message(IncomingMessage {
            chat_id: RecipientId::Id(msg.chat.id),
            sender_id: from.id,
            sender_name: Some(from.display_name()),
            text: text.unwrap_or_default(),
            media,
            timestamp: chrono::DateTime::from_timestamp(msg.date, 0).unwrap_or_else(chrono::Utc::now),
        }))
    }
}
