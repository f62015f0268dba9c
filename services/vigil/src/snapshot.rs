//! Saved engine state across restarts

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use crate::history::History;
use crate::item::{ItemId, MonitoredItem, NotificationRule};

/// Persisted record of one monitored item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub id: ItemId,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    pub interval_seconds: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub notifications: Vec<NotificationRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<History>,
}

fn default_enabled() -> bool {
    true
}

/// Everything the engine persists between runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub items: Vec<ItemSnapshot>,
}

impl Snapshot {
    /// Capture the current items, with history only when asked for
    pub fn capture<'a>(
        items: impl Iterator<Item = &'a MonitoredItem>,
        include_history: bool,
    ) -> Self {
        Self {
            items: items
                .map(|item| ItemSnapshot {
                    id: item.id,
                    url: item.url.clone(),
                    title: item.title.clone(),
                    interval_seconds: item.interval,
                    enabled: item.enabled,
                    notifications: item.notifications.clone(),
                    history: include_history.then(|| item.history.clone()),
                })
                .collect(),
        }
    }
}

/// Merge saved state into freshly built config items
///
/// Snapshot records are matched by url and each is consumed by at most one
/// item. A match restores the stored id and history, re-bounded to
/// `history_size`. Items without a match keep their fresh id and empty
/// history, which is how a url edit between runs resets its history.
pub fn restore_items(
    mut items: Vec<MonitoredItem>,
    snapshot: Snapshot,
    history_size: usize,
) -> Vec<MonitoredItem> {
    let mut records = snapshot.items;
    for item in &mut items {
        let Some(pos) = records.iter().position(|r| r.url == item.url) else {
            continue;
        };
        let record = records.remove(pos);
        item.id = record.id;
        if let Some(mut history) = record.history {
            // reduce alone covers bounds too small for the gap-aware pass
            history.reduce(history_size);
            history.reduce_including_gaps(history_size);
            item.history = history;
        }
    }
    items
}

/// Abstraction over snapshot persistence
#[cfg_attr(test, mockall::automock)]
pub trait SnapshotStore: Send + Sync {
    /// Load the saved snapshot; Ok(None) when nothing was saved yet
    fn load(&self) -> crate::Result<Option<Snapshot>>;

    /// Persist the snapshot, replacing any previous one
    fn save(&self, snapshot: &Snapshot) -> crate::Result<()>;
}

/// Snapshot store backed by a single pretty-printed JSON file
///
/// Saves are serialized through a lock and land via a temp file plus
/// rename, so the file at `path` always holds one complete snapshot even
/// while checks complete concurrently.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> crate::Result<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let snapshot = serde_json::from_str(&content)?;
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &Snapshot) -> crate::Result<()> {
        let json = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.path.with_extension("tmp");
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        tracing::debug!("Saved {} item(s) to {:?}", snapshot.items.len(), self.path);
        Ok(())
    }
}
