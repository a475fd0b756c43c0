use std::fmt;
use std::ops::Index;

use crate::model::{EndTime, Record, SortKey, Timestamp};

/// A sorted, contiguous run of records. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedGroup {
    records: Vec<Record>,
}

impl OrderedGroup {
    /// Builds a group from `records`, sorting them by sort key.
    ///
    /// Panics if `records` is empty.
    pub fn new(mut records: Vec<Record>) -> Self {
        assert!(!records.is_empty(), "an ordered group needs at least one record");
        records.sort_by_key(Record::sort_key);
        Self { records }
    }

    pub fn singleton(record: Record) -> Self {
        Self { records: vec![record] }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn first(&self) -> &Record {
        &self.records[0]
    }

    pub fn last(&self) -> &Record {
        &self.records[self.records.len() - 1]
    }

    pub fn time_since(&self) -> Timestamp {
        self.first().start
    }

    pub fn time_until(&self) -> EndTime {
        self.last().end
    }

    pub fn sort_key(&self) -> SortKey {
        SortKey::new(self.time_since(), self.time_until())
    }

    pub fn is_ongoing(&self) -> bool {
        self.time_until().is_open()
    }

    /// True if `at` lies within `[time_since, time_until]`.
    pub fn covers(&self, at: Timestamp) -> bool {
        self.time_since() <= at && EndTime::Finite(at) <= self.time_until()
    }

    /// Left-biased insertion point of `key` among the records.
    pub fn bisect_key_left(&self, key: &SortKey) -> usize {
        self.records.partition_point(|r| r.sort_key() < *key)
    }

    /// Inserts keeping sort order; returns the position used.
    pub fn insert(&mut self, record: Record) -> usize {
        let at = self.bisect_key_left(&record.sort_key());
        self.records.insert(at, record);
        at
    }

    /// Moves every record of `other` into this group.
    pub fn absorb(&mut self, other: OrderedGroup) {
        for record in other.records {
            self.insert(record);
        }
    }

    /// True if `record` ends exactly where this group starts, or starts
    /// exactly where it ends.
    pub fn abuts(&self, record: &Record) -> bool {
        self.time_until() == EndTime::Finite(record.start)
            || record.end == EndTime::Finite(self.time_since())
    }
}

impl Index<usize> for OrderedGroup {
    type Output = Record;

    fn index(&self, i: usize) -> &Record {
        &self.records[i]
    }
}

impl fmt::Display for OrderedGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{} records]", self.sort_key(), self.records.len())
    }
}
