//! Per-item polling state machine
//!
//! The scheduler owns every monitored item together with its countdown,
//! in-flight flag, generation counter and revalidation cache. `tick` is
//! synchronous and deterministic; the async engine drives it once per
//! second and runs the dispatched checks elsewhere. A result is applied
//! only if its generation still matches, so disabling, deleting or editing
//! an item while a check is running silently discards the late result.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::checker::RevalidationCache;
use crate::history::{EntryId, HistoryEntry};
use crate::item::{dedupe_rules, validate_url, ItemId, MonitoredItem, NotificationRule};
use crate::matcher;
use crate::notifier::Notification;
use crate::outcome::RequestResult;

/// A check the caller should run now
#[derive(Debug, Clone)]
pub struct CheckDispatch {
    pub item_id: ItemId,
    pub generation: u64,
    pub url: String,
    pub cache: Option<RevalidationCache>,
}

/// What became of a delivered check result
#[derive(Debug, PartialEq)]
pub enum CheckCompletion {
    /// The item is gone or changed underneath the check
    Discarded,
    /// Result recorded; the notification, if any, is the caller's to send
    Applied { notification: Option<Notification> },
}

/// Requested changes to an item's editable fields
#[derive(Debug, Clone)]
pub struct ItemEdit {
    pub url: String,
    pub title: Option<String>,
    pub interval: u64,
    pub notifications: Vec<NotificationRule>,
}

struct ItemRuntime {
    item: MonitoredItem,
    /// Seconds until the next check; at or below zero means due
    remaining: i64,
    in_flight: bool,
    generation: u64,
    cache: Option<RevalidationCache>,
}

/// Owns all per-item polling state
pub struct Scheduler {
    items: Vec<ItemRuntime>,
    paused: bool,
    history_size: usize,
}

impl Scheduler {
    pub fn new(history_size: usize) -> Self {
        Self {
            items: Vec::new(),
            paused: false,
            history_size,
        }
    }

    /// Admit an already validated item; its first check is due after one
    /// full interval
    pub fn add_item(&mut self, item: MonitoredItem) {
        tracing::info!("Monitoring '{}' every {}s", item.display_title(), item.interval);
        self.items.push(ItemRuntime {
            remaining: item.interval as i64,
            item,
            in_flight: false,
            generation: 0,
            cache: None,
        });
    }

    /// Remove an item and all its state; false if the id is unknown
    pub fn remove_item(&mut self, item_id: ItemId) -> bool {
        let before = self.items.len();
        self.items.retain(|r| r.item.id != item_id);
        before != self.items.len()
    }

    pub fn items(&self) -> impl Iterator<Item = &MonitoredItem> {
        self.items.iter().map(|r| &r.item)
    }

    pub fn item(&self, item_id: ItemId) -> Option<&MonitoredItem> {
        self.items
            .iter()
            .find(|r| r.item.id == item_id)
            .map(|r| &r.item)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Freeze all countdowns; in-flight checks complete normally
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Advance every enabled item's countdown by one second
    ///
    /// Items that become due with no check outstanding are dispatched and
    /// their countdown restarts immediately. A due item whose previous
    /// check is still running is skipped; it fires on the first tick after
    /// the check completes.
    pub fn tick(&mut self) -> Vec<CheckDispatch> {
        if self.paused {
            return Vec::new();
        }
        let mut dispatches = Vec::new();
        for runtime in &mut self.items {
            if !runtime.item.enabled {
                continue;
            }
            runtime.remaining -= 1;
            if runtime.remaining > 0 || runtime.in_flight {
                continue;
            }
            runtime.in_flight = true;
            runtime.remaining = runtime.item.interval as i64;
            dispatches.push(CheckDispatch {
                item_id: runtime.item.id,
                generation: runtime.generation,
                url: runtime.item.url.clone(),
                cache: runtime.cache.clone(),
            });
        }
        dispatches
    }

    /// Apply a finished check
    ///
    /// The result is dropped when the item is gone or its generation moved
    /// since dispatch. Otherwise the cache is stored, the notification
    /// rules are evaluated and the result joins the history, marked when a
    /// rule fired.
    pub fn complete_check(
        &mut self,
        item_id: ItemId,
        generation: u64,
        result: RequestResult,
        cache: Option<RevalidationCache>,
    ) -> CheckCompletion {
        let history_size = self.history_size;
        let Some(runtime) = self.runtime_mut(item_id) else {
            tracing::debug!("Discarding check result for removed item {}", item_id);
            return CheckCompletion::Discarded;
        };
        if runtime.generation != generation {
            tracing::debug!("Discarding stale check result for '{}'", runtime.item.display_title());
            return CheckCompletion::Discarded;
        }

        runtime.in_flight = false;
        runtime.cache = cache;

        let matched = matcher::evaluate(&runtime.item.notifications, &result);
        let notification =
            matched.map(|rule| Notification::for_result(&runtime.item, rule, &result));
        runtime
            .item
            .history
            .append(HistoryEntry::new(result, matched.is_some()), history_size);

        CheckCompletion::Applied { notification }
    }

    /// Enable or disable an item; false if the id is unknown
    ///
    /// Disabling bumps the generation so an in-flight check is discarded
    /// on arrival. Re-enabling restarts the countdown from a full
    /// interval. History and cache survive both.
    pub fn set_enabled(&mut self, item_id: ItemId, enabled: bool) -> bool {
        let Some(runtime) = self.runtime_mut(item_id) else {
            return false;
        };
        if runtime.item.enabled == enabled {
            return true;
        }
        runtime.item.enabled = enabled;
        if enabled {
            runtime.remaining = runtime.item.interval as i64;
        } else {
            runtime.generation += 1;
            runtime.in_flight = false;
        }
        tracing::info!(
            "Item '{}' {}",
            runtime.item.display_title(),
            if enabled { "enabled" } else { "disabled" }
        );
        true
    }

    /// Replace an item's editable fields; Ok(false) if the id is unknown
    ///
    /// A url change clears the history and cache and bumps the generation.
    /// Interval and notification edits leave both intact. Every edit
    /// restarts the countdown.
    pub fn apply_edit(&mut self, item_id: ItemId, edit: ItemEdit) -> crate::Result<bool> {
        validate_url(&edit.url)?;
        if edit.interval == 0 {
            return Err(crate::VigilError::Validation(
                "poll interval must be at least 1 second".to_string(),
            ));
        }
        let Some(runtime) = self.runtime_mut(item_id) else {
            return Ok(false);
        };

        let url_changed = runtime.item.url != edit.url;
        runtime.item.url = edit.url;
        runtime.item.title = edit.title;
        runtime.item.interval = edit.interval;
        runtime.item.notifications = dedupe_rules(edit.notifications);
        if url_changed {
            runtime.item.history.clear();
            runtime.cache = None;
            runtime.generation += 1;
            runtime.in_flight = false;
        }
        runtime.remaining = runtime.item.interval as i64;
        Ok(true)
    }

    /// Toggle the marked flag on a history entry; false if item or entry
    /// is unknown
    pub fn set_marked(&mut self, item_id: ItemId, entry_id: EntryId, marked: bool) -> bool {
        let Some(runtime) = self.runtime_mut(item_id) else {
            return false;
        };
        match runtime.item.history.index_of(entry_id) {
            Some(index) => runtime.item.history.set_marked(index, marked),
            None => false,
        }
    }

    fn runtime_mut(&mut self, item_id: ItemId) -> Option<&mut ItemRuntime> {
        self.items.iter_mut().find(|r| r.item.id == item_id)
    }
}

/// Thread-safe shared scheduler handle
pub type SchedulerHandle = Arc<RwLock<Scheduler>>;

pub fn new_scheduler_handle(items: Vec<MonitoredItem>, history_size: usize) -> SchedulerHandle {
    let mut scheduler = Scheduler::new(history_size);
    for item in items {
        scheduler.add_item(item);
    }
    Arc::new(RwLock::new(scheduler))
}
