//! Transport trait — the narrow interface to a chat backend.

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;
use crate::types::{MediaKind, RecipientId};

/// An inline button: visible label and the callback payload it sends back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub data: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Outbound operations of a chat backend. Every call may fail on its own;
/// callers decide whether a failure is fatal.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Backend name, used in logs.
    fn name(&self) -> &str;

    async fn send_text(&self, to: &RecipientId, text: &str) -> Result<()>;

    async fn send_photo(&self, to: &RecipientId, path: &Path) -> Result<()>;

    async fn send_video(&self, to: &RecipientId, path: &Path) -> Result<()>;

    async fn send_document(&self, to: &RecipientId, path: &Path) -> Result<()>;

    /// Fetch the bytes of an uploaded file by its transport handle.
    async fn download(&self, file_ref: &str) -> Result<Vec<u8>>;

    /// Send a stored file the way its kind is best displayed.
    async fn send_media(&self, to: &RecipientId, kind: MediaKind, path: &Path) -> Result<()> {
        match kind {
            MediaKind::Image => self.send_photo(to, path).await,
            MediaKind::Video => self.send_video(to, path).await,
            MediaKind::Document => self.send_document(to, path).await,
        }
    }

    /// Send text with inline buttons laid out `per_row` per line.
    /// Backends without buttons fall back to a plain list.
    async fn send_choices(
        &self,
        to: &RecipientId,
        text: &str,
        choices: &[Choice],
        _per_row: usize,
    ) -> Result<()> {
        let list: Vec<&str> = choices.iter().map(|c| c.label.as_str()).collect();
        self.send_text(to, &format!("{text}\n{}", list.join("\n"))).await
    }

    /// Replace the text of a previously sent message.
    async fn edit_text(&self, chat: &RecipientId, _message_id: i64, text: &str) -> Result<()> {
        self.send_text(chat, text).await
    }

    /// Acknowledge a button press, optionally with a popup notice.
    async fn answer_callback(&self, _callback_id: &str, _text: Option<&str>, _alert: bool) -> Result<()> {
        Ok(())
    }
}
