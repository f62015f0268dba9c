//! Bounded result history with mark-aware eviction and gap compaction
//!
//! A history is an ordered list of result entries interleaved with gap
//! markers. Entries are only ever appended; shrinking evicts entries and
//! leaves a single gap per contiguous evicted run, so the record stays
//! honest about where results went missing. Two gaps are never adjacent.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::outcome::RequestResult;

/// Stable identifier for a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One slot in a history: a recorded result or a gap left by eviction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryEntry {
    Entry {
        id: EntryId,
        marked: bool,
        result: RequestResult,
    },
    Gap,
}

impl HistoryEntry {
    /// Wrap a result in a fresh entry
    pub fn new(result: RequestResult, marked: bool) -> Self {
        Self::Entry {
            id: EntryId::new(),
            marked,
            result,
        }
    }

    pub fn is_gap(&self) -> bool {
        matches!(self, Self::Gap)
    }
}

/// Ordered, bounded history of check results for one monitored item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Number of result entries, gaps excluded
    pub fn result_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_gap()).count()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Position of the entry with the given id, if present
    pub fn index_of(&self, id: EntryId) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| matches!(e, HistoryEntry::Entry { id: eid, .. } if *eid == id))
    }

    /// Append at the end, then shrink to the configured bound
    pub fn append(&mut self, entry: HistoryEntry, max_size: usize) {
        if entry.is_gap() && self.entries.last().is_some_and(HistoryEntry::is_gap) {
            return;
        }
        self.entries.push(entry);
        self.reduce(max_size);
    }

    /// Set or clear the marked flag on the entry at `index`
    ///
    /// Returns false for gaps and out-of-range indices. Marking never
    /// triggers eviction.
    pub fn set_marked(&mut self, index: usize, marked: bool) -> bool {
        match self.entries.get_mut(index) {
            Some(HistoryEntry::Entry { marked: m, .. }) => {
                *m = marked;
                true
            }
            _ => false,
        }
    }

    /// Shrink so that at most `max_size` result entries remain
    ///
    /// Eviction removes unmarked entries oldest-first and falls back to the
    /// oldest marked entries only when unmarked ones run out. Each
    /// contiguous evicted run collapses to a single gap and adjacent gaps
    /// merge. Surviving entries keep their order and content. Gaps do not
    /// count toward `max_size`; see [`History::reduce_including_gaps`] for
    /// a bound on the total length.
    pub fn reduce(&mut self, max_size: usize) {
        match max_size {
            0 => self.entries.clear(),
            1 => {
                let last = self.entries.iter().rev().find(|e| !e.is_gap()).cloned();
                self.entries = last.into_iter().collect();
            }
            2 => {
                let last = self.entries.iter().rev().find(|e| !e.is_gap()).cloned();
                self.entries = match last {
                    Some(entry) => vec![HistoryEntry::Gap, entry],
                    None => Vec::new(),
                };
            }
            _ => {
                let count = self.result_count();
                if count <= max_size {
                    return;
                }
                let victims = self.pick_victims(count - max_size);
                self.evict(&victims);
            }
        }
    }

    /// Shrink until the total length, gaps included, fits `max_size`
    ///
    /// No-op for `max_size <= 2`. Otherwise retries [`History::reduce`]
    /// with a target lowered by one per round; each round turns evicted
    /// runs into fewer, merged gaps until everything fits.
    pub fn reduce_including_gaps(&mut self, max_size: usize) {
        if max_size <= 2 {
            return;
        }
        let mut target = max_size;
        while self.entries.len() > max_size {
            self.reduce(target);
            if target == 0 {
                break;
            }
            target -= 1;
        }
    }

    /// Indices of the `excess` entries to evict, in ascending order
    fn pick_victims(&self, excess: usize) -> Vec<usize> {
        let mut victims: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, HistoryEntry::Entry { marked: false, .. }))
            .map(|(i, _)| i)
            .take(excess)
            .collect();
        if victims.len() < excess {
            let remaining = excess - victims.len();
            victims.extend(
                self.entries
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| matches!(e, HistoryEntry::Entry { marked: true, .. }))
                    .map(|(i, _)| i)
                    .take(remaining),
            );
        }
        victims.sort_unstable();
        victims
    }

    /// Remove the entries at `victims` (sorted), collapsing runs into gaps
    fn evict(&mut self, victims: &[usize]) {
        let mut out = Vec::with_capacity(self.entries.len());
        let mut pending_gap = false;
        for (i, entry) in self.entries.drain(..).enumerate() {
            if victims.binary_search(&i).is_ok() || entry.is_gap() {
                pending_gap = true;
                continue;
            }
            if pending_gap {
                out.push(HistoryEntry::Gap);
                pending_gap = false;
            }
            out.push(entry);
        }
        if pending_gap {
            out.push(HistoryEntry::Gap);
        }
        self.entries = out;
    }
}
