//! Domain types shared across crates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An addressable chat endpoint: a numeric chat id or a public `@name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecipientId {
    Id(i64),
    Name(String),
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecipientId::Id(id) => write!(f, "{id}"),
            RecipientId::Name(name) => f.write_str(name),
        }
    }
}

impl FromStr for RecipientId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s.parse::<i64>() {
            Ok(id) => RecipientId::Id(id),
            Err(_) => RecipientId::Name(s.to_string()),
        })
    }
}

impl From<i64> for RecipientId {
    fn from(id: i64) -> Self {
        RecipientId::Id(id)
    }
}

/// The stored content for one calendar date. The date itself is the map key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl AssignmentRecord {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, file_name: impl Into<String>) -> Self {
        self.attachment = Some(Attachment {
            file_name: file_name.into(),
        });
        self
    }
}

/// Reference to a file in the media directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "fileName")]
    pub file_name: String,
}

impl Attachment {
    pub fn kind(&self) -> MediaKind {
        MediaKind::from_file_name(&self.file_name)
    }
}

/// How a media file is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Video,
    Document,
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi"];

impl MediaKind {
    /// Classify a file by its extension (case-insensitive).
    pub fn from_file_name(name: &str) -> Self {
        let ext = std::path::Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Image
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Video
        } else {
            MediaKind::Document
        }
    }
}

// --- Inbound events from a chat transport ---

/// Something a user did in the chat.
#[derive(Debug, Clone)]
pub enum IncomingEvent {
    Message(IncomingMessage),
    Callback(CallbackEvent),
}

/// A text or media message.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat_id: RecipientId,
    pub sender_id: i64,
    pub sender_name: Option<String>,
    /// Message text, or the media caption when the message carries media.
    pub text: String,
    pub media: Option<IncomingMedia>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Media uploaded with a message, not yet downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMedia {
    /// Transport-specific handle used to download the bytes.
    pub file_ref: String,
    pub kind: MediaKind,
    /// Original name, only known for documents.
    pub file_name: Option<String>,
}

/// An inline button press.
#[derive(Debug, Clone)]
pub struct CallbackEvent {
    pub id: String,
    pub chat_id: RecipientId,
    pub message_id: Option<i64>,
    pub sender_id: i64,
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_from_extension() {
        assert_eq!(MediaKind::from_file_name("2025-03-10_photo.jpg"), MediaKind::Image);
        assert_eq!(MediaKind::from_file_name("scan.PNG"), MediaKind::Image);
        assert_eq!(MediaKind::from_file_name("2025-03-10_video.mp4"), MediaKind::Video);
        assert_eq!(MediaKind::from_file_name("clip.mov"), MediaKind::Video);
        assert_eq!(MediaKind::from_file_name("worksheet.pdf"), MediaKind::Document);
        assert_eq!(MediaKind::from_file_name("README"), MediaKind::Document);
    }

    #[test]
    fn test_recipient_id_json() {
        let ids: Vec<RecipientId> = serde_json::from_str(r#"[42, "@class_chat", -100123]"#).unwrap();
        assert_eq!(ids[0], RecipientId::Id(42));
        assert_eq!(ids[1], RecipientId::Name("@class_chat".into()));
        assert_eq!(ids[2], RecipientId::Id(-100123));
        assert_eq!(serde_json::to_string(&ids).unwrap(), r#"[42,"@class_chat",-100123]"#);
    }

    #[test]
    fn test_recipient_id_parse() {
        assert_eq!("-100500".parse::<RecipientId>().unwrap(), RecipientId::Id(-100500));
        assert_eq!(" @group ".parse::<RecipientId>().unwrap(), RecipientId::Name("@group".into()));
    }

    #[test]
    fn test_record_json_shape() {
        let record = AssignmentRecord::new("Read chapter 4").with_attachment("2025-03-10_photo.jpg");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["text"], "Read chapter 4");
        assert_eq!(json["attachment"]["fileName"], "2025-03-10_photo.jpg");

        let plain = serde_json::to_value(AssignmentRecord::new("x")).unwrap();
        assert!(plain.get("attachment").is_none());
    }
}
