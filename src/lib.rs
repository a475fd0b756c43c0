pub mod model;
pub mod error;
pub mod group;
pub mod index;
pub mod store;
pub mod storage;
pub mod resolver;
pub mod cursor;
pub mod parser;

use std::fmt;

use tracing::{debug, info};

use crate::cursor::JumpCursor;
use crate::error::Result;
use crate::index::GroupIndex;
use crate::model::{Direction, JumpReason, Record, Timestamp, SECONDS_PER_DAY};
use crate::store::StoreAdapter;

pub use crate::error::Error;
pub use crate::group::OrderedGroup;
pub use crate::model::EndTime;
pub use crate::resolver::{Nearest, Source};

/// Tunables for a navigation session.
#[derive(Debug, Clone)]
pub struct NavigatorConfig {
    /// Length of one day step, in seconds.
    pub day_seconds: u64,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self { day_seconds: SECONDS_PER_DAY }
    }
}

/// A jump target. Exactly one bound is given: `Since` looks forward from
/// the time, `Until` looks backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpQuery {
    Since(Timestamp),
    Until(Timestamp),
}

impl JumpQuery {
    /// Panics unless exactly one of `since` and `until` is given.
    pub fn from_bounds(since: Option<Timestamp>, until: Option<Timestamp>) -> Self {
        match (since, until) {
            (Some(since), None) => JumpQuery::Since(since),
            (None, Some(until)) => JumpQuery::Until(until),
            (since, until) => panic!("need exactly one jump bound, got since={:?} until={:?}", since, until),
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            JumpQuery::Since(_) => Direction::Forward,
            JumpQuery::Until(_) => Direction::Backward,
        }
    }

    pub fn time(&self) -> Timestamp {
        match self {
            JumpQuery::Since(t) | JumpQuery::Until(t) => *t,
        }
    }
}

/// One navigation session: the working set, the store behind it, and the
/// jump cursor.
pub struct Navigator<S> {
    groups: GroupIndex,
    store: S,
    cursor: JumpCursor,
}

impl<S> fmt::Debug for Navigator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Navigator")
        .field("groups", &self.groups.len())
        .field("records", &self.groups.record_count())
        .field("cursor", &self.cursor)
        .finish()
    }
}

impl<S: StoreAdapter> Navigator<S> {
    pub fn new(store: S, config: NavigatorConfig) -> Self {
        Self::with_groups(store, GroupIndex::new(), config)
    }

    pub fn with_groups(store: S, groups: GroupIndex, config: NavigatorConfig) -> Self {
        info!(groups = groups.len(), records = groups.record_count(), "navigator ready");
        Self { groups, store, cursor: JumpCursor::new(config.day_seconds) }
    }

    pub fn groups(&self) -> &GroupIndex {
        &self.groups
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn cursor(&self) -> &JumpCursor {
        &self.cursor
    }

    pub fn current_record(&self) -> Option<&Record> {
        self.cursor.current()
    }

    /// Adds an edited record to the working set. Returns false if its key
    /// is already present.
    pub fn add_record(&mut self, record: Record) -> bool {
        self.groups.insert(record)
    }

    /// Lets the edit session move the active record.
    pub fn set_current(&mut self, record: Record) {
        self.cursor.set_current(record);
    }

    /// Starts over unanchored, keeping the working set.
    pub fn reset(&mut self) {
        self.cursor.reset();
    }

    /// Jumps to the record nearest `query`. `on_jumped` runs once if a
    /// record is found; the cursor is re-anchored either way.
    pub fn jump_to_nearest<F>(&mut self, query: JumpQuery, on_jumped: F) -> Result<Option<Record>>
    where
        F: FnMut(&Record, JumpReason),
    {
        let reason = match query {
            JumpQuery::Since(_) => JumpReason::Next,
            JumpQuery::Until(_) => JumpReason::Prev,
        };
        self.jump(query, reason, on_jumped)
    }

    pub fn jump_next<F>(&mut self, since: Timestamp, on_jumped: F) -> Result<Option<Record>>
    where
        F: FnMut(&Record, JumpReason),
    {
        self.jump_to_nearest(JumpQuery::Since(since), on_jumped)
    }

    pub fn jump_prev<F>(&mut self, until: Timestamp, on_jumped: F) -> Result<Option<Record>>
    where
        F: FnMut(&Record, JumpReason),
    {
        self.jump_to_nearest(JumpQuery::Until(until), on_jumped)
    }

    /// Jumps backward from one day before the reference time. Does nothing
    /// when there is neither an anchor nor an active record.
    pub fn step_day_backward<F>(&mut self, on_jumped: F) -> Result<Option<Record>>
    where
        F: FnMut(&Record, JumpReason),
    {
        match self.cursor.day_before() {
            Some(prev_day) => self.jump(JumpQuery::Until(prev_day), JumpReason::DayPrev, on_jumped),
            None => {
                debug!("no reference time to step back from");
                Ok(None)
            }
        }
    }

    /// Jumps forward from one day after the reference time.
    pub fn step_day_forward<F>(&mut self, on_jumped: F) -> Result<Option<Record>>
    where
        F: FnMut(&Record, JumpReason),
    {
        match self.cursor.day_after() {
            Some(next_day) => self.jump(JumpQuery::Since(next_day), JumpReason::DayNext, on_jumped),
            None => {
                debug!("no reference time to step forward from");
                Ok(None)
            }
        }
    }

    fn jump<F>(&mut self, query: JumpQuery, reason: JumpReason, mut on_jumped: F) -> Result<Option<Record>>
    where
        F: FnMut(&Record, JumpReason),
    {
        let direction = query.direction();
        let reference = query.time();
        let nearest = resolver::resolve(&self.groups, &self.store, direction, reference)?;

        let jumped = match nearest {
            Some(Nearest { record, source }) => {
                // Unsaved records only ever come from the working set.
                let known = record.key.map_or(true, |key| self.groups.contains_key(key));
                if !known {
                    debug!(source = source.as_str(), "adding {} to working set", record.short());
                    self.groups.insert(record.clone());
                }
                self.cursor.set_current(record.clone());
                on_jumped(&record, reason);
                self.log_state(reason);
                Some(record)
            }
            None => None,
        };

        self.cursor.re_anchor(direction, reference);
        Ok(jumped)
    }

    fn log_state(&self, reason: JumpReason) {
        debug!(
            %reason,
            groups = self.groups.len(),
            records = self.groups.record_count(),
            current = %self.cursor.current().map_or("-".to_string(), Record::short),
            "jumped"
        );
        for (i, group) in self.groups.groups().iter().enumerate() {
            debug!("  grp {}: {}", i, group);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use uuid::Uuid;

    fn rec(start: Timestamp, end: Option<Timestamp>) -> Record {
        Record::new(Uuid::new_v4(), start, end, vec![]).unwrap()
    }

    #[test]
    fn test_query_from_bounds() {
        assert_eq!(JumpQuery::from_bounds(Some(3), None), JumpQuery::Since(3));
        assert_eq!(JumpQuery::from_bounds(None, Some(4)).direction(), Direction::Backward);
    }

    #[test]
    #[should_panic(expected = "exactly one")]
    fn test_query_from_both_bounds_panics() {
        JumpQuery::from_bounds(Some(3), Some(4));
    }

    #[test]
    #[should_panic(expected = "exactly one")]
    fn test_query_from_no_bounds_panics() {
        JumpQuery::from_bounds(None, None);
    }

    #[test]
    fn test_jump_materializes_store_record_once() {
        let far = rec(1_000, Some(2_000));
        let store: MemoryStore = [far.clone()].into_iter().collect();
        let mut nav = Navigator::new(store, NavigatorConfig::default());

        let mut seen = Vec::new();
        let got = nav.jump_next(0, |r, why| seen.push((r.clone(), why))).unwrap();
        assert_eq!(got, Some(far.clone()));
        assert_eq!(seen, vec![(far.clone(), JumpReason::Next)]);
        assert_eq!(nav.groups().record_count(), 1);
        assert_eq!(nav.current_record(), Some(&far));

        // Second time round the record comes from the working set.
        nav.jump_next(0, |_, _| {}).unwrap();
        assert_eq!(nav.groups().record_count(), 1);
    }

    #[test]
    fn test_no_result_is_silent_but_anchors() {
        let mut nav = Navigator::new(MemoryStore::new(), NavigatorConfig::default());
        let mut calls = 0;
        let got = nav.jump_prev(500, |_, _| calls += 1).unwrap();
        assert!(got.is_none());
        assert_eq!(calls, 0);
        assert!(nav.groups().is_empty());
        assert!(nav.cursor().is_anchored());
        assert_eq!(nav.cursor().reference_time(), Some(500));
    }

    #[test]
    fn test_day_step_without_reference_is_noop() {
        let mut nav = Navigator::new(MemoryStore::new(), NavigatorConfig::default());
        assert!(nav.step_day_forward(|_, _| panic!("no jump expected")).unwrap().is_none());
        assert!(!nav.cursor().is_anchored());
    }

    struct FailingStore;

    impl StoreAdapter for FailingStore {
        fn fetch_next(&self, _after: Timestamp) -> Result<Option<Record>> {
            Err(Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk gone")))
        }

        fn fetch_prev(&self, _before: Timestamp) -> Result<Option<Record>> {
            Err(Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk gone")))
        }
    }

    #[test]
    fn test_store_failure_reaches_caller_untouched() {
        let a = rec(100, Some(200));
        let groups = GroupIndex::from_groups(vec![OrderedGroup::new(vec![a.clone()])]);
        let mut nav = Navigator::with_groups(FailingStore, groups, NavigatorConfig::default());

        let mut calls = 0;
        let err = nav.jump_next(300, |_, _| calls += 1).unwrap_err();
        assert!(matches!(&err, Error::Io(e) if e.to_string() == "disk gone"));
        let err = nav.jump_prev(50, |_, _| calls += 1).unwrap_err();
        assert!(matches!(err, Error::Io(_)));

        assert_eq!(calls, 0);
        assert_eq!(nav.groups().record_count(), 1);
        assert_eq!(nav.groups()[0].first(), &a);
        assert!(nav.current_record().is_none());
        assert!(!nav.cursor().is_anchored());

        // A perfect match inside the window never touches the store.
        assert_eq!(nav.jump_next(150, |_, _| calls += 1).unwrap(), Some(a));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_day_step_reason_tags() {
        let day = 100;
        let store: MemoryStore = [rec(50, Some(60)), rec(260, Some(270))].into_iter().collect();
        let mut nav = Navigator::new(store, NavigatorConfig { day_seconds: day });
        nav.set_current(rec(150, Some(160)));

        let mut reasons = Vec::new();
        nav.step_day_forward(|_, why| reasons.push(why)).unwrap();
        nav.reset();
        nav.step_day_backward(|_, why| reasons.push(why)).unwrap();
        assert_eq!(reasons, vec![JumpReason::DayNext, JumpReason::DayPrev]);
    }
}
