//! Broadcast dispatch — fans tomorrow's assignment out to the class group and
//! every subscriber. Best-effort: each recipient is tried once, failures are
//! logged and collected, never propagated.

use chrono::NaiveDate;
use mecha_core::text::escape_html;
use mecha_core::traits::Transport;
use mecha_core::types::{AssignmentRecord, MediaKind, RecipientId};
use mecha_store::{AssignmentService, SubscriberRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// What happened during one firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    pub date: NaiveDate,
    /// Recipients whose text message went through.
    pub delivered: Vec<RecipientId>,
    /// Recipients whose text message failed, with the error.
    pub failed: Vec<(RecipientId, String)>,
    /// Recipients who got the text but not the attachment.
    pub attachment_failed: Vec<(RecipientId, String)>,
}

impl BroadcastReport {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            delivered: Vec::new(),
            failed: Vec::new(),
            attachment_failed: Vec::new(),
        }
    }

    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}

/// The notification text for a date.
pub fn format_announcement(date: NaiveDate, record: &AssignmentRecord) -> String {
    format!(
        "📘 Homework for tomorrow (<b>{}</b>):\n\n{}",
        date.format("%Y-%m-%d"),
        escape_html(&record.text)
    )
}

pub struct Broadcaster {
    assignments: Arc<AssignmentService>,
    subscribers: Arc<Mutex<SubscriberRegistry>>,
    transport: Arc<dyn Transport>,
    collective: Option<RecipientId>,
}

impl Broadcaster {
    pub fn new(
        assignments: Arc<AssignmentService>,
        subscribers: Arc<Mutex<SubscriberRegistry>>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            assignments,
            subscribers,
            transport,
            collective: None,
        }
    }

    /// Also notify a fixed group outside the subscriber set, before anyone else.
    pub fn with_collective(mut self, destination: Option<RecipientId>) -> Self {
        self.collective = destination;
        self
    }

    /// Run one firing. Returns `None` when there is nothing for tomorrow.
    pub async fn fire(&self) -> Option<BroadcastReport> {
        let Some((date, record)) = self.assignments.get_for_tomorrow() else {
            tracing::info!("🏖️ No assignment for tomorrow, nothing to broadcast");
            return None;
        };

        let text = format_announcement(date, &record);
        let media = record
            .attachment
            .as_ref()
            .map(|a| (a.kind(), self.assignments.media_path(a)));
        let mut report = BroadcastReport::new(date);

        if let Some(group) = &self.collective {
            self.deliver(group, &text, media.as_ref(), &mut report).await;
        }

        // Snapshot once; later subscribe/unsubscribe affects the next firing only.
        let recipients = self.subscribers.lock().await.snapshot();
        for recipient in &recipients {
            self.deliver(recipient, &text, media.as_ref(), &mut report).await;
        }

        tracing::info!(
            "📣 Broadcast for {date} via {}: {} delivered, {} failed, {} attachment failures",
            self.transport.name(),
            report.delivered.len(),
            report.failed.len(),
            report.attachment_failed.len()
        );
        Some(report)
    }

    async fn deliver(
        &self,
        to: &RecipientId,
        text: &str,
        media: Option<&(MediaKind, PathBuf)>,
        report: &mut BroadcastReport,
    ) {
        if let Err(e) = self.transport.send_text(to, text).await {
            tracing::warn!("⚠️ Failed to send homework to {to}: {e}");
            report.failed.push((to.clone(), e.to_string()));
            return;
        }
        report.delivered.push(to.clone());

        if let Some((kind, path)) = media
            && let Err(e) = self.transport.send_media(to, *kind, path).await
        {
            tracing::warn!("⚠️ Failed to send attachment to {to}: {e}");
            report.attachment_failed.push((to.clone(), e.to_string()));
        }
    }
}
