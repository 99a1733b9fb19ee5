//! Chat command router — turns incoming events into store operations and replies.
//!
//! Admin-only commands are gated here by the configured allow-list; the
//! store layer assumes its mutating callers are authorised.

use chrono::NaiveDate;
use mecha_core::error::{MechaError, Result};
use mecha_core::text::escape_html;
use mecha_core::traits::{Choice, Transport};
use mecha_core::types::{AssignmentRecord, CallbackEvent, IncomingEvent, IncomingMessage, RecipientId};
use mecha_store::{
    AddOutcome, AssignmentService, AttachmentUpload, DeleteOutcome, RemoveOutcome, SubscriberRegistry,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

const CALENDAR_PREFIX: &str = "calendar:";

const HELP_TEXT: &str = "📘 MechaHelper commands:\n\
/homework — homework for tomorrow\n\
/calendar — all saved dates\n\
/subscribe — daily reminders on\n\
/unsubscribe — daily reminders off\n\
/help — this list";

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Homework,
    Calendar,
    Subscribe,
    Unsubscribe,
    /// `/delete <args>`
    Delete(String),
    /// `/sethomework <text>`
    SetHomework(String),
}

/// Parse `/name[@bot] args`. Returns `None` for plain text and unknown commands.
pub fn parse_command(text: &str) -> Option<Command> {
    let text = text.trim_start();
    let body = text.strip_prefix('/')?;
    let (head, rest) = match body.find(char::is_whitespace) {
        Some(idx) => (&body[..idx], body[idx..].trim()),
        None => (body, ""),
    };
    let name = head.split('@').next().unwrap_or(head).to_ascii_lowercase();

    Some(match name.as_str() {
        "start" => Command::Start,
        "help" => Command::Help,
        "homework" => Command::Homework,
        "calendar" => Command::Calendar,
        "subscribe" => Command::Subscribe,
        "unsubscribe" => Command::Unsubscribe,
        "delete" => Command::Delete(rest.to_string()),
        "sethomework" => Command::SetHomework(rest.to_string()),
        _ => return None,
    })
}

pub struct CommandRouter {
    assignments: Arc<AssignmentService>,
    subscribers: Arc<Mutex<SubscriberRegistry>>,
    transport: Arc<dyn Transport>,
    admins: HashSet<i64>,
}

impl CommandRouter {
    pub fn new(
        assignments: Arc<AssignmentService>,
        subscribers: Arc<Mutex<SubscriberRegistry>>,
        transport: Arc<dyn Transport>,
        admin_ids: &[i64],
    ) -> Self {
        Self {
            assignments,
            subscribers,
            transport,
            admins: admin_ids.iter().copied().collect(),
        }
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admins.contains(&user_id)
    }

    /// Handle one event. Errors are transport failures while replying.
    pub async fn handle(&self, event: IncomingEvent) -> Result<()> {
        match event {
            IncomingEvent::Message(msg) => self.handle_message(msg).await,
            IncomingEvent::Callback(cb) => self.handle_callback(cb).await,
        }
    }

    async fn handle_message(&self, msg: IncomingMessage) -> Result<()> {
        let Some(command) = parse_command(&msg.text) else {
            return Ok(());
        };
        tracing::debug!(
            "💬 {:?} from {} ({}) sent {}",
            command,
            msg.sender_id,
            msg.sender_name.as_deref().unwrap_or("unknown"),
            msg.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
        let chat = &msg.chat_id;

        match command {
            Command::Start => {
                self.reply(chat, "👋 Hi! I'm MechaHelper. Send /help to see what I can do.")
                    .await
            }
            Command::Help => self.reply(chat, HELP_TEXT).await,
            Command::Homework => self.homework(chat).await,
            Command::Calendar => self.calendar(chat).await,
            Command::Subscribe => self.subscribe(chat, msg.sender_id).await,
            Command::Unsubscribe => self.unsubscribe(chat, msg.sender_id).await,
            Command::Delete(args) => {
                if !self.is_admin(msg.sender_id) {
                    return self.deny(chat).await;
                }
                self.delete(chat, &args).await
            }
            Command::SetHomework(text) => {
                if !self.is_admin(msg.sender_id) {
                    return self.deny(chat).await;
                }
                self.set_homework(&msg, &text).await
            }
        }
    }

    async fn handle_callback(&self, cb: CallbackEvent) -> Result<()> {
        let Some(raw_date) = cb.data.strip_prefix(CALENDAR_PREFIX) else {
            return self.transport.answer_callback(&cb.id, None, false).await;
        };
        let record = raw_date
            .parse::<NaiveDate>()
            .ok()
            .and_then(|date| self.assignments.get_for_date(date).map(|r| (date, r)));
        let Some((date, record)) = record else {
            return self
                .transport
                .answer_callback(&cb.id, Some("⚠️ Assignment not found."), true)
                .await;
        };

        let text = format_assignment(date, &record);
        match cb.message_id {
            Some(message_id) => self.transport.edit_text(&cb.chat_id, message_id, &text).await?,
            None => self.reply(&cb.chat_id, &text).await?,
        }
        self.send_attachment(&cb.chat_id, &record).await?;
        self.transport.answer_callback(&cb.id, None, false).await
    }

    async fn homework(&self, chat: &RecipientId) -> Result<()> {
        match self.assignments.get_for_tomorrow() {
            Some((date, record)) => {
                self.reply(chat, &format_assignment(date, &record)).await?;
                self.send_attachment(chat, &record).await
            }
            None => self.reply(chat, "🏖️ No homework for tomorrow yet.").await,
        }
    }

    async fn calendar(&self, chat: &RecipientId) -> Result<()> {
        let dates = self.assignments.list_dates();
        if dates.is_empty() {
            return self.reply(chat, "📭 No assignments.").await;
        }
        let choices: Vec<Choice> = dates
            .iter()
            .map(|d| {
                let label = d.format("%Y-%m-%d").to_string();
                let data = format!("{CALENDAR_PREFIX}{label}");
                Choice::new(label, data)
            })
            .collect();
        self.transport
            .send_choices(chat, "📅 Pick a date:", &choices, 2)
            .await
    }

    async fn subscribe(&self, chat: &RecipientId, user_id: i64) -> Result<()> {
        let outcome = self.subscribers.lock().await.add(RecipientId::Id(user_id));
        let notice = match outcome {
            Ok(AddOutcome::Added) => "✅ You are subscribed to homework reminders!",
            Ok(AddOutcome::AlreadySubscribed) => "✅ You are already subscribed.",
            Err(e) => {
                tracing::warn!("⚠️ Failed to persist subscription of {user_id}: {e}");
                "❌ Failed to save your subscription."
            }
        };
        self.reply(chat, notice).await
    }

    async fn unsubscribe(&self, chat: &RecipientId, user_id: i64) -> Result<()> {
        let outcome = self.subscribers.lock().await.remove(&RecipientId::Id(user_id));
        let notice = match outcome {
            Ok(RemoveOutcome::Removed) => "❌ You unsubscribed from reminders.",
            Ok(RemoveOutcome::NotSubscribed) => "You were not subscribed.",
            Err(e) => {
                tracing::warn!("⚠️ Failed to persist unsubscription of {user_id}: {e}");
                "❌ Failed to save the change."
            }
        };
        self.reply(chat, notice).await
    }

    async fn delete(&self, chat: &RecipientId, args: &str) -> Result<()> {
        let parts: Vec<&str> = args.split_whitespace().collect();
        let date = match parts.as_slice() {
            [one] => one.parse::<NaiveDate>().ok(),
            _ => None,
        };
        let Some(date) = date else {
            return self.reply(chat, "Usage: /delete YYYY-MM-DD").await;
        };

        let notice = match self.assignments.delete_assignment(date) {
            Ok(DeleteOutcome::Removed) => format!("❌ Homework for {date} deleted."),
            Ok(DeleteOutcome::NotFound) => "No homework saved for that date.".to_string(),
            Err(e) => {
                tracing::warn!("⚠️ Failed to delete homework for {date}: {e}");
                "❌ Failed to save the data.".to_string()
            }
        };
        self.reply(chat, &notice).await
    }

    async fn set_homework(&self, msg: &IncomingMessage, text: &str) -> Result<()> {
        let chat = &msg.chat_id;
        if text.trim().is_empty() && msg.media.is_none() {
            return self
                .reply(chat, "❌ Nothing to save. Add text or a file.")
                .await;
        }

        // Download before touching the store; the store lock is never held across network I/O.
        let upload = match &msg.media {
            Some(media) => match self.transport.download(&media.file_ref).await {
                Ok(bytes) => Some(AttachmentUpload {
                    kind: media.kind,
                    original_name: media.file_name.clone(),
                    bytes,
                }),
                Err(e) => {
                    tracing::warn!("⚠️ Failed to download {}: {e}", media.file_ref);
                    return self.reply(chat, "❌ Could not download the file.").await;
                }
            },
            None => None,
        };

        let notice = match self.assignments.set_assignment_from_text(text, upload) {
            Ok(date) => format!("✅ Homework for {date} saved!"),
            Err(MechaError::EmptyAssignment) => "❌ Nothing to save. Add text or a file.".to_string(),
            Err(e) => {
                tracing::warn!("⚠️ Failed to save homework: {e}");
                "❌ Failed to save the homework.".to_string()
            }
        };
        self.reply(chat, &notice).await
    }

    async fn send_attachment(&self, chat: &RecipientId, record: &AssignmentRecord) -> Result<()> {
        let Some(attachment) = &record.attachment else {
            return Ok(());
        };
        let path = self.assignments.media_path(attachment);
        if let Err(e) = self.transport.send_media(chat, attachment.kind(), &path).await {
            tracing::warn!("⚠️ Failed to send {} to {chat}: {e}", path.display());
            return self.reply(chat, "⚠️ Could not send the file.").await;
        }
        Ok(())
    }

    async fn deny(&self, chat: &RecipientId) -> Result<()> {
        self.reply(chat, "❌ You don't have permission for this command.")
            .await
    }

    async fn reply(&self, chat: &RecipientId, text: &str) -> Result<()> {
        self.transport.send_text(chat, text).await
    }
}

fn format_assignment(date: NaiveDate, record: &AssignmentRecord) -> String {
    format!(
        "📘 Homework for <b>{}</b>:\n\n{}",
        date.format("%Y-%m-%d"),
        escape_html(&record.text)
    )
}
