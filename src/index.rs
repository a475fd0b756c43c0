use std::collections::HashMap;
use std::ops::Index;

use tracing::debug;

use crate::group::OrderedGroup;
use crate::model::{EndTime, Record, SortKey};

/// The working set: sorted, non-overlapping groups, at most one of them
/// ongoing and, if so, the last.
#[derive(Debug, Default, Clone)]
pub struct GroupIndex {
    groups: Vec<OrderedGroup>,
    by_key: HashMap<u128, SortKey>,
}

impl GroupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of groups built by the edit session.
    ///
    /// Panics if the groups overlap or an ongoing group is not last.
    pub fn from_groups(mut groups: Vec<OrderedGroup>) -> Self {
        groups.sort_by_key(OrderedGroup::sort_key);
        let mut by_key = HashMap::new();
        for group in &groups {
            for record in group.records() {
                if let Some(key) = record.key {
                    by_key.insert(key, record.sort_key());
                }
            }
        }
        let index = Self { groups, by_key };
        index.assert_invariants();
        index
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[OrderedGroup] {
        &self.groups
    }

    pub fn record_count(&self) -> usize {
        self.groups.iter().map(OrderedGroup::len).sum()
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.groups.iter().flat_map(|g| g.records().iter())
    }

    /// Left-biased insertion point of `key` among the group sort keys.
    pub fn locate(&self, key: &SortKey) -> usize {
        self.groups.partition_point(|g| g.sort_key() < *key)
    }

    pub fn contains_key(&self, key: u128) -> bool {
        self.by_key.contains_key(&key)
    }

    /// True if `record` would overlap a group's window. Touching at a
    /// boundary is not overlap.
    pub fn overlaps(&self, record: &Record) -> bool {
        let at = self.locate(&record.sort_key());
        let hits_prev = at > 0 && self.groups[at - 1].time_until() > EndTime::Finite(record.start);
        let hits_next = at < self.groups.len() && record.end > EndTime::Finite(self.groups[at].time_since());
        hits_prev || hits_next
    }

    /// Adds `record` to the working set. A record that abuts an existing
    /// group joins it; otherwise it becomes a singleton group. Returns
    /// false if a record with the same key is already present.
    pub fn insert(&mut self, record: Record) -> bool {
        if let Some(key) = record.key {
            if self.by_key.contains_key(&key) {
                return false;
            }
            self.by_key.insert(key, record.sort_key());
        }

        let at = self.locate(&record.sort_key());
        let joins_prev = at > 0 && self.groups[at - 1].abuts(&record);
        let joins_next = at < self.groups.len() && self.groups[at].abuts(&record);

        match (joins_prev, joins_next) {
            (true, true) => {
                debug!(record = %record.short(), "bridging groups {} and {}", at - 1, at);
                let next = self.groups.remove(at);
                let prev = &mut self.groups[at - 1];
                prev.insert(record);
                prev.absorb(next);
            }
            (true, false) => {
                self.groups[at - 1].insert(record);
            }
            (false, true) => {
                self.groups[at].insert(record);
            }
            (false, false) => {
                debug!(record = %record.short(), "new singleton group at {}", at);
                self.groups.insert(at, OrderedGroup::singleton(record));
            }
        }
        self.assert_invariants();
        true
    }

    /// Panics unless groups are ordered, non-overlapping, and only the
    /// last may be ongoing.
    pub fn assert_invariants(&self) {
        for pair in self.groups.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(
                !a.is_ongoing(),
                "ongoing group {} is followed by {}",
                a,
                b
            );
            assert!(
                a.time_until() <= EndTime::Finite(b.time_since()),
                "group {} overlaps {}",
                a,
                b
            );
        }
    }
}

impl Index<usize> for GroupIndex {
    type Output = OrderedGroup;

    fn index(&self, i: usize) -> &OrderedGroup {
        &self.groups[i]
    }
}
