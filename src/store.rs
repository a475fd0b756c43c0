use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

use crate::error::Result;
use crate::model::{Record, SortKey, Timestamp};

/// Lazy single-record lookups against the backing store.
pub trait StoreAdapter {
    /// Least record whose start is strictly after `after`.
    fn fetch_next(&self, after: Timestamp) -> Result<Option<Record>>;

    /// Greatest record whose end is at or before `before`. Ongoing records
    /// never qualify.
    fn fetch_prev(&self, before: Timestamp) -> Result<Option<Record>>;
}

impl<S: StoreAdapter + ?Sized> StoreAdapter for &S {
    fn fetch_next(&self, after: Timestamp) -> Result<Option<Record>> {
        (**self).fetch_next(after)
    }

    fn fetch_prev(&self, before: Timestamp) -> Result<Option<Record>> {
        (**self).fetch_prev(before)
    }
}

impl<S: StoreAdapter + ?Sized> StoreAdapter for Box<S> {
    fn fetch_next(&self, after: Timestamp) -> Result<Option<Record>> {
        (**self).fetch_next(after)
    }

    fn fetch_prev(&self, before: Timestamp) -> Result<Option<Record>> {
        (**self).fetch_prev(before)
    }
}

/// Start- and end-ordered lookup over record locators (a slot in memory, a
/// file offset on disk).
#[derive(Debug, Clone)]
pub(crate) struct TimeIndex<L> {
    by_start: BTreeMap<SortKey, Vec<L>>,
    // (end, start): only finite ends are indexed.
    by_end: BTreeMap<(Timestamp, Timestamp), Vec<L>>,
}

impl<L> Default for TimeIndex<L> {
    fn default() -> Self {
        Self { by_start: BTreeMap::new(), by_end: BTreeMap::new() }
    }
}

impl<L: Copy + PartialEq> TimeIndex<L> {
    pub(crate) fn insert(&mut self, record: &Record, loc: L) {
        self.by_start.entry(record.sort_key()).or_default().push(loc);
        if let Some(end) = record.end.finite() {
            self.by_end.entry((end, record.start)).or_default().push(loc);
        }
    }

    pub(crate) fn remove(&mut self, record: &Record, loc: L) {
        let key = record.sort_key();
        if let Some(locs) = self.by_start.get_mut(&key) {
            locs.retain(|l| *l != loc);
            if locs.is_empty() {
                self.by_start.remove(&key);
            }
        }
        if let Some(end) = record.end.finite() {
            let key = (end, record.start);
            if let Some(locs) = self.by_end.get_mut(&key) {
                locs.retain(|l| *l != loc);
                if locs.is_empty() {
                    self.by_end.remove(&key);
                }
            }
        }
    }

    pub(crate) fn next_after(&self, after: Timestamp) -> Option<L> {
        // probe(after) is the greatest key starting at `after`.
        self.by_start
            .range((Excluded(SortKey::probe(after)), Unbounded))
            .next()
            .and_then(|(_, locs)| locs.first().copied())
    }

    pub(crate) fn prev_before(&self, before: Timestamp) -> Option<L> {
        self.by_end
            .range(..=(before, Timestamp::MAX))
            .next_back()
            .and_then(|(_, locs)| locs.last().copied())
    }

    pub(crate) fn len(&self) -> usize {
        self.by_start.values().map(Vec::len).sum()
    }
}

/// A backing store held entirely in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    records: Vec<Record>,
    index: TimeIndex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: Record) {
        let slot = self.records.len();
        self.index.insert(&record, slot);
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<Record> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        let mut store = MemoryStore::new();
        for record in iter {
            store.insert(record);
        }
        store
    }
}

impl StoreAdapter for MemoryStore {
    fn fetch_next(&self, after: Timestamp) -> Result<Option<Record>> {
        Ok(self.index.next_after(after).map(|slot| self.records[slot].clone()))
    }

    fn fetch_prev(&self, before: Timestamp) -> Result<Option<Record>> {
        Ok(self.index.prev_before(before).map(|slot| self.records[slot].clone()))
    }
}
