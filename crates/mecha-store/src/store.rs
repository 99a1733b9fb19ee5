//! File-based record store — the assignment map as one JSON object.
//! Loads never fail (missing or corrupt files read as empty); saves go
//! through a temp file and a rename so a failed write leaves the old file.

use chrono::NaiveDate;
use mecha_core::error::{MechaError, Result};
use mecha_core::types::{AssignmentRecord, Attachment};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// All stored assignments, keyed and ordered by date.
pub type Assignments = BTreeMap<NaiveDate, AssignmentRecord>;

/// Durable date → assignment mapping.
pub struct RecordStore {
    path: PathBuf,
}

/// On-disk record shape. Older files keep the attachment as a bare `file` string.
#[derive(Deserialize)]
struct StoredRecord {
    #[serde(default)]
    text: String,
    #[serde(default)]
    attachment: Option<Attachment>,
    #[serde(default)]
    file: Option<String>,
}

impl From<StoredRecord> for AssignmentRecord {
    fn from(stored: StoredRecord) -> Self {
        let attachment = stored
            .attachment
            .or_else(|| stored.file.map(|file_name| Attachment { file_name }));
        AssignmentRecord {
            text: stored.text,
            attachment,
        }
    }
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all assignments. Absent, unreadable or malformed files yield an empty map.
    pub fn load(&self) -> Assignments {
        let stored: BTreeMap<NaiveDate, StoredRecord> = read_json_or_default(&self.path);
        stored.into_iter().map(|(date, r)| (date, r.into())).collect()
    }

    /// Replace the file with the full mapping.
    pub fn save(&self, assignments: &Assignments) -> Result<()> {
        write_json_atomic(&self.path, assignments)?;
        tracing::debug!(
            "💾 Saved {} assignments to {}",
            assignments.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Read and parse a JSON file, falling back to `T::default()` on any problem.
pub(crate) fn read_json_or_default<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        return T::default();
    }
    match std::fs::read_to_string(path) {
        Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
            tracing::warn!("⚠️ Failed to parse {}: {e}", path.display());
            T::default()
        }),
        Err(e) => {
            tracing::warn!("⚠️ Failed to read {}: {e}", path.display());
            T::default()
        }
    }
}

/// Serialize to pretty JSON and write atomically (temp file → fsync → rename).
pub(crate) fn write_json_atomic<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let json = serde_json::to_string_pretty(value)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            MechaError::Storage(format!(
                "failed to create directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    let tmp_path = temp_path(path);
    let written = std::fs::File::create(&tmp_path).and_then(|mut file| {
        file.write_all(json.as_bytes())?;
        file.sync_all()
    });
    if let Err(e) = written {
        std::fs::remove_file(&tmp_path).ok();
        return Err(MechaError::Storage(format!(
            "failed to write '{}': {e}",
            tmp_path.display()
        )));
    }

    std::fs::rename(&tmp_path, path).map_err(|e| {
        std::fs::remove_file(&tmp_path).ok();
        MechaError::Storage(format!(
            "failed to rename '{}' to '{}': {e}",
            tmp_path.display(),
            path.display()
        ))
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "store".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("homework.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_malformed_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("homework.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(RecordStore::new(&path).load().is_empty());

        std::fs::write(&path, r#"{"not-a-date": {"text": "x"}}"#).unwrap();
        assert!(RecordStore::new(&path).load().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("nested").join("homework.json"));

        let mut data = Assignments::new();
        data.insert(date("2025-03-10"), AssignmentRecord::new("Read chapter 4"));
        data.insert(
            date("2025-03-11"),
            AssignmentRecord::new("").with_attachment("2025-03-11_photo.jpg"),
        );
        store.save(&data).unwrap();

        assert_eq!(store.load(), data);
        assert!(!temp_path(store.path()).exists());

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains(r#""2025-03-10""#));
        assert!(raw.contains(r#""fileName": "2025-03-11_photo.jpg""#));
    }

    #[test]
    fn test_loads_legacy_file_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("homework.json");
        std::fs::write(
            &path,
            r#"{"2025-03-10": {"text": "Лабораторная №2", "file": "2025-03-10_lab.pdf"}}"#,
        )
        .unwrap();

        let data = RecordStore::new(&path).load();
        let record = &data[&date("2025-03-10")];
        assert_eq!(record.text, "Лабораторная №2");
        assert_eq!(record.attachment.as_ref().unwrap().file_name, "2025-03-10_lab.pdf");
    }

    #[test]
    fn test_failed_save_keeps_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("homework.json");
        let store = RecordStore::new(&path);

        let mut data = Assignments::new();
        data.insert(date("2025-03-10"), AssignmentRecord::new("old"));
        store.save(&data).unwrap();

        // A directory squatting on the temp name makes the write fail.
        std::fs::create_dir(temp_path(&path)).unwrap();
        data.insert(date("2025-03-10"), AssignmentRecord::new("new"));
        assert!(store.save(&data).is_err());

        assert_eq!(store.load()[&date("2025-03-10")].text, "old");
    }
}
