//! Subscriber registry — the set of recipients of the daily broadcast.
//!
//! The in-memory set is authoritative for the life of the process; the JSON
//! array on disk is a snapshot rewritten after every mutation. A failed
//! write is reported but the in-memory change is kept.

use mecha_core::error::Result;
use mecha_core::types::RecipientId;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::store::{read_json_or_default, write_json_atomic};

/// Result of a subscribe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadySubscribed,
}

/// Result of an unsubscribe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotSubscribed,
}

/// Durable set of recipient ids.
pub struct SubscriberRegistry {
    path: PathBuf,
    subscribers: HashSet<RecipientId>,
}

impl SubscriberRegistry {
    /// Open the registry, loading whatever the file holds.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let subscribers = Self::load(&path);
        tracing::info!(
            "👥 Loaded {} subscribers from {}",
            subscribers.len(),
            path.display()
        );
        Self { path, subscribers }
    }

    /// Read the persisted set. Absent or malformed files yield an empty set.
    pub fn load(path: &Path) -> HashSet<RecipientId> {
        let ids: Vec<RecipientId> = read_json_or_default(path);
        ids.into_iter().collect()
    }

    /// Write the current set to disk.
    pub fn save(&self) -> Result<()> {
        let mut ids: Vec<&RecipientId> = self.subscribers.iter().collect();
        ids.sort();
        write_json_atomic(&self.path, &ids)
    }

    /// Subscribe a recipient. Idempotent; the snapshot is refreshed either way.
    pub fn add(&mut self, id: RecipientId) -> Result<AddOutcome> {
        let outcome = if self.subscribers.insert(id.clone()) {
            tracing::info!("➕ Subscribed {id}");
            AddOutcome::Added
        } else {
            AddOutcome::AlreadySubscribed
        };
        self.save()?;
        Ok(outcome)
    }

    /// Unsubscribe a recipient. Absent ids are a no-op.
    pub fn remove(&mut self, id: &RecipientId) -> Result<RemoveOutcome> {
        if !self.subscribers.remove(id) {
            return Ok(RemoveOutcome::NotSubscribed);
        }
        tracing::info!("➖ Unsubscribed {id}");
        self.save()?;
        Ok(RemoveOutcome::Removed)
    }

    pub fn contains(&self, id: &RecipientId) -> bool {
        self.subscribers.contains(id)
    }

    /// Copy of the current set, for iteration without holding the registry.
    pub fn snapshot(&self) -> Vec<RecipientId> {
        self.subscribers.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
