//! Assignment service — business operations over the record store and the
//! media directory.
//!
//! Each mutating call holds the service lock across its whole
//! load → mutate → save sequence, so concurrent handlers never lose updates.

use chrono::NaiveDate;
use mecha_core::error::{MechaError, Result};
use mecha_core::types::{AssignmentRecord, Attachment, MediaKind};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::date_prefix::{DatePrefix, parse_date_prefix};
use crate::media::MediaStore;
use crate::store::RecordStore;

/// Source of "today". Injected so the binary can pin it to a time zone and tests can fix it.
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Media bytes supplied with a new assignment.
#[derive(Debug, Clone)]
pub struct AttachmentUpload {
    pub kind: MediaKind,
    /// Original file name, used for documents.
    pub original_name: Option<String>,
    pub bytes: Vec<u8>,
}

/// Input of [`AssignmentService::set_assignment`].
#[derive(Debug, Clone, Default)]
pub struct NewAssignment {
    /// Target date; tomorrow when `None`.
    pub date: Option<NaiveDate>,
    pub text: String,
    pub attachment: Option<AttachmentUpload>,
}

/// Result of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Removed,
    NotFound,
}

pub struct AssignmentService {
    store: Mutex<RecordStore>,
    media: MediaStore,
    clock: Clock,
}

impl AssignmentService {
    pub fn new(store: RecordStore, media: MediaStore) -> Self {
        Self {
            store: Mutex::new(store),
            media,
            clock: Arc::new(|| chrono::Local::now().date_naive()),
        }
    }

    /// Replace the default local-date clock.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn today(&self) -> NaiveDate {
        (self.clock)()
    }

    pub fn tomorrow(&self) -> NaiveDate {
        let today = self.today();
        today.succ_opt().unwrap_or(today)
    }

    pub fn media(&self) -> &MediaStore {
        &self.media
    }

    /// Absolute path of an attachment file.
    pub fn media_path(&self, attachment: &Attachment) -> PathBuf {
        self.media.path_of(&attachment.file_name)
    }

    pub fn get_for_date(&self, date: NaiveDate) -> Option<AssignmentRecord> {
        self.lock_store().load().remove(&date)
    }

    /// Tomorrow's assignment together with its date.
    pub fn get_for_tomorrow(&self) -> Option<(NaiveDate, AssignmentRecord)> {
        let date = self.tomorrow();
        self.get_for_date(date).map(|record| (date, record))
    }

    /// All dates with an assignment, ascending.
    pub fn list_dates(&self) -> Vec<NaiveDate> {
        self.lock_store().load().into_keys().collect()
    }

    /// Parse an optional leading `YYYY-MM-DD` from `raw_text` and store the rest.
    /// An unparseable prefix falls back to tomorrow with the text kept whole.
    pub fn set_assignment_from_text(
        &self,
        raw_text: &str,
        attachment: Option<AttachmentUpload>,
    ) -> Result<NaiveDate> {
        let raw_text = raw_text.trim();
        let (date, text) = match parse_date_prefix(raw_text) {
            DatePrefix::Dated { date, rest } => (Some(date), rest),
            DatePrefix::Undated => (None, raw_text),
        };
        self.set_assignment(NewAssignment {
            date,
            text: text.to_string(),
            attachment,
        })
    }

    /// Create or replace the assignment for a date. Returns the date used.
    ///
    /// Attachment bytes are written before the record; they stay on disk if
    /// the record save then fails. A replaced record's old attachment file is
    /// left in place.
    pub fn set_assignment(&self, new: NewAssignment) -> Result<NaiveDate> {
        if new.text.trim().is_empty() && new.attachment.is_none() {
            return Err(MechaError::EmptyAssignment);
        }
        let date = new.date.unwrap_or_else(|| self.tomorrow());

        let store = self.lock_store();

        let mut record = AssignmentRecord::new(new.text);
        if let Some(upload) = new.attachment {
            let file_name =
                MediaStore::file_name_for(date, upload.kind, upload.original_name.as_deref());
            self.media.write(&file_name, &upload.bytes)?;
            record = record.with_attachment(file_name);
        }

        let mut data = store.load();
        if let Some(previous) = data.get(&date).and_then(|r| r.attachment.as_ref()) {
            let replaced = record.attachment.as_ref() != Some(previous);
            if replaced {
                tracing::warn!(
                    "⚠️ Assignment for {date} replaced; media '{}' is no longer referenced",
                    previous.file_name
                );
            }
        }
        data.insert(date, record);
        store.save(&data)?;

        tracing::info!("📘 Assignment saved for {date}");
        Ok(date)
    }

    /// Remove the assignment for a date and, best-effort, its attachment file.
    pub fn delete_assignment(&self, date: NaiveDate) -> Result<DeleteOutcome> {
        let store = self.lock_store();
        let mut data = store.load();
        let Some(record) = data.remove(&date) else {
            return Ok(DeleteOutcome::NotFound);
        };
        store.save(&data)?;
        if let Some(attachment) = &record.attachment {
            self.media.remove(&attachment.file_name);
        }

        tracing::info!("🗑️ Assignment for {date} deleted");
        Ok(DeleteOutcome::Removed)
    }

    fn lock_store(&self) -> MutexGuard<'_, RecordStore> {
        // A panic mid-save cannot leave a half-written file, so a poisoned lock is safe to reuse.
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn service_at(dir: &std::path::Path, today: &str) -> AssignmentService {
        let today = d(today);
        AssignmentService::new(
            RecordStore::new(dir.join("homework.json")),
            MediaStore::new(dir.join("media")),
        )
        .with_clock(Arc::new(move || today))
    }

    fn photo(bytes: &[u8]) -> Option<AttachmentUpload> {
        Some(AttachmentUpload {
            kind: MediaKind::Image,
            original_name: None,
            bytes: bytes.to_vec(),
        })
    }

    #[test]
    fn test_set_then_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service_at(dir.path(), "2025-03-09");
        let date = svc
            .set_assignment(NewAssignment {
                date: Some(d("2025-04-01")),
                text: "  Упражнение 5, стр. 40  ".into(),
                attachment: None,
            })
            .unwrap();
        assert_eq!(date, d("2025-04-01"));
        assert_eq!(svc.get_for_date(date).unwrap().text, "  Упражнение 5, стр. 40  ");
    }

    #[test]
    fn test_date_prefix_from_text() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service_at(dir.path(), "2025-03-01");
        let date = svc.set_assignment_from_text("2025-03-10 Read chapter 4", None).unwrap();
        assert_eq!(date, d("2025-03-10"));
        assert_eq!(svc.get_for_date(date).unwrap().text, "Read chapter 4");
    }

    #[test]
    fn test_unparseable_prefix_falls_back_to_tomorrow() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service_at(dir.path(), "2025-03-01");
        let date = svc.set_assignment_from_text("2025-13-99 typo", None).unwrap();
        assert_eq!(date, d("2025-03-02"));
        assert_eq!(svc.get_for_date(date).unwrap().text, "2025-13-99 typo");
    }

    #[test]
    fn test_default_date_is_tomorrow() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service_at(dir.path(), "2025-12-31");
        let date = svc.set_assignment_from_text("New year essay", None).unwrap();
        assert_eq!(date, d("2026-01-01"));
    }

    #[test]
    fn test_tomorrow_matches_get_for_date() {
        let dir = tempfile::tempdir().unwrap();
        for today in ["2024-02-28", "2024-02-29", "2025-06-30", "2025-12-31"] {
            let svc = service_at(dir.path(), today);
            let tomorrow = d(today).succ_opt().unwrap();
            svc.set_assignment(NewAssignment {
                date: Some(tomorrow),
                text: format!("for {tomorrow}"),
                attachment: None,
            })
            .unwrap();
            let (date, record) = svc.get_for_tomorrow().unwrap();
            assert_eq!(date, tomorrow);
            assert_eq!(Some(record), svc.get_for_date(tomorrow));
        }
    }

    #[test]
    fn test_empty_assignment_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service_at(dir.path(), "2025-03-01");
        assert!(matches!(
            svc.set_assignment_from_text("   ", None),
            Err(MechaError::EmptyAssignment)
        ));
        assert!(svc.list_dates().is_empty());
    }

    #[test]
    fn test_attachment_only_assignment() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service_at(dir.path(), "2025-03-01");
        let date = svc.set_assignment_from_text("", photo(b"img")).unwrap();
        let record = svc.get_for_date(date).unwrap();
        let attachment = record.attachment.unwrap();
        assert_eq!(attachment.file_name, "2025-03-02_photo.jpg");
        assert_eq!(attachment.kind(), MediaKind::Image);
        assert_eq!(std::fs::read(svc.media_path(&attachment)).unwrap(), b"img");
    }

    #[test]
    fn test_delete_removes_record_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service_at(dir.path(), "2025-03-01");
        let upload = AttachmentUpload {
            kind: MediaKind::Document,
            original_name: Some("worksheet.pdf".into()),
            bytes: b"%PDF".to_vec(),
        };
        let date = svc
            .set_assignment_from_text("2025-03-10 Solve the worksheet", Some(upload))
            .unwrap();
        assert!(svc.media().exists("2025-03-10_worksheet.pdf"));

        assert_eq!(svc.delete_assignment(date).unwrap(), DeleteOutcome::Removed);
        assert!(svc.get_for_date(date).is_none());
        assert!(!svc.media().exists("2025-03-10_worksheet.pdf"));
        assert_eq!(svc.delete_assignment(date).unwrap(), DeleteOutcome::NotFound);
    }

    #[test]
    fn test_delete_survives_missing_media_file() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service_at(dir.path(), "2025-03-01");
        let date = svc.set_assignment_from_text("", photo(b"x")).unwrap();
        assert!(svc.media().remove("2025-03-02_photo.jpg"));
        assert_eq!(svc.delete_assignment(date).unwrap(), DeleteOutcome::Removed);
        assert!(svc.get_for_date(date).is_none());
    }

    #[test]
    fn test_replace_keeps_old_attachment_file() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service_at(dir.path(), "2025-03-01");
        let doc = AttachmentUpload {
            kind: MediaKind::Document,
            original_name: Some("old.pdf".into()),
            bytes: b"old".to_vec(),
        };
        svc.set_assignment_from_text("2025-03-10 v1", Some(doc)).unwrap();
        svc.set_assignment_from_text("2025-03-10 v2", None).unwrap();

        let record = svc.get_for_date(d("2025-03-10")).unwrap();
        assert_eq!(record.text, "v2");
        assert!(record.attachment.is_none());
        assert!(svc.media().exists("2025-03-10_old.pdf"));
    }

    #[test]
    fn test_list_dates_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service_at(dir.path(), "2025-03-01");
        for text in ["2025-03-12 c", "2025-03-05 a", "2025-03-08 b"] {
            svc.set_assignment_from_text(text, None).unwrap();
        }
        assert_eq!(
            svc.list_dates(),
            vec![d("2025-03-05"), d("2025-03-08"), d("2025-03-12")]
        );
    }

    #[test]
    fn test_save_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let svc = AssignmentService::new(
            RecordStore::new(blocker.join("homework.json")),
            MediaStore::new(dir.path().join("media")),
        );
        assert!(matches!(
            svc.set_assignment_from_text("anything", None),
            Err(MechaError::Storage(_))
        ));
    }
}
