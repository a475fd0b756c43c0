//! Nearest-record resolution across the working set and the backing store.
//!
//! The working set is searched first. A hit inside a group's window is
//! authoritative; otherwise the store is asked for at most one record, and
//! the two candidates are weighed against the candidate group's window.

use tracing::debug;

use crate::error::Result;
use crate::group::OrderedGroup;
use crate::index::GroupIndex;
use crate::model::{Direction, EndTime, Record, SortKey, Timestamp};
use crate::store::StoreAdapter;

/// Where a candidate group sits relative to the reference time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The reference falls inside the group's window.
    Covering,
    /// The group lies entirely after the reference.
    Ahead,
    /// The group lies entirely before the reference.
    Behind,
}

/// Outcome of the working-set search.
#[derive(Debug, Clone, Copy)]
pub struct GroupCandidate<'a> {
    pub group: Option<&'a OrderedGroup>,
    pub record: Option<&'a Record>,
    pub placement: Placement,
    /// A perfect match makes the store lookup unnecessary.
    pub is_perfect: bool,
}

impl<'a> GroupCandidate<'a> {
    fn perfect(group: &'a OrderedGroup, record: &'a Record) -> Self {
        Self { group: Some(group), record: Some(record), placement: Placement::Covering, is_perfect: true }
    }

    fn fallback(group: &'a OrderedGroup, record: Option<&'a Record>, placement: Placement) -> Self {
        Self { group: Some(group), record, placement, is_perfect: false }
    }

    fn nothing() -> Self {
        Self { group: None, record: None, placement: Placement::Covering, is_perfect: false }
    }
}

/// Which source the chosen record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Group,
    Store,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Group => "group",
            Source::Store => "store",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Nearest {
    pub record: Record,
    pub source: Source,
}

/// Searches the working set for the record nearest `reference`.
pub fn find_nearest_group_record(
    groups: &GroupIndex,
    direction: Direction,
    reference: Timestamp,
) -> GroupCandidate<'_> {
    if groups.is_empty() {
        return GroupCandidate::nothing();
    }

    // Probing with an open end places the insertion point one past the
    // matching group, except for an ongoing group starting at `reference`.
    let probe = SortKey::probe(reference);
    let inserts_at = groups.locate(&probe);
    let last = groups.len() - 1;

    if inserts_at == last && probe == groups[last].sort_key() {
        let ongoing = &groups[last];
        return GroupCandidate::perfect(ongoing, ongoing.first());
    }

    if inserts_at == 0 {
        let first = &groups[0];
        if reference == first.time_since() {
            return GroupCandidate::perfect(first, first.first());
        }
        return match direction {
            Direction::Forward => GroupCandidate::fallback(first, Some(first.first()), Placement::Ahead),
            Direction::Backward => GroupCandidate::fallback(first, None, Placement::Ahead),
        };
    }

    let try_group = &groups[inserts_at - 1];
    assert!(reference >= try_group.time_since(), "probe {} landed after {}", probe, try_group);
    assert_ne!(probe, try_group.sort_key());

    if EndTime::Finite(reference) <= try_group.time_until() {
        let at = try_group.bisect_key_left(&probe);
        return GroupCandidate::perfect(try_group, match_within_group(try_group, at, reference));
    }

    // Between groups, so momentum decides.
    match direction {
        Direction::Forward if inserts_at < groups.len() => {
            let next = &groups[inserts_at];
            GroupCandidate::fallback(next, Some(next.first()), Placement::Ahead)
        }
        Direction::Forward => GroupCandidate::fallback(try_group, None, Placement::Behind),
        Direction::Backward => GroupCandidate::fallback(try_group, Some(try_group.last()), Placement::Behind),
    }
}

fn match_within_group(group: &OrderedGroup, at: usize, reference: Timestamp) -> &Record {
    if at >= group.len() {
        // On or after the start of the last record, still inside the window.
        return group.last();
    }
    if group[at].start == reference {
        return &group[at];
    }
    let containing = &group[at - 1];
    assert!(containing.start <= reference);
    containing
}

/// Weighs the working-set candidate against the store candidate. The store
/// record only wins when it lies strictly outside the candidate group's
/// window, on the reference's side of it.
pub fn choose_nearest(candidate: &GroupCandidate<'_>, store_record: Option<Record>) -> Option<Nearest> {
    let from_group = |record: &Record| Nearest { record: record.clone(), source: Source::Group };

    let Some(store_record) = store_record else {
        return candidate.record.map(from_group);
    };
    let Some(group) = candidate.group else {
        return Some(Nearest { record: store_record, source: Source::Store });
    };

    if clears_window(group, candidate.placement, &store_record) {
        Some(Nearest { record: store_record, source: Source::Store })
    } else {
        candidate.record.map(from_group)
    }
}

fn clears_window(group: &OrderedGroup, placement: Placement, record: &Record) -> bool {
    match placement {
        Placement::Behind => group.time_until() < EndTime::Finite(record.start),
        Placement::Ahead => record.end < EndTime::Finite(group.time_since()),
        Placement::Covering => false,
    }
}

/// Finds the record nearest `reference` in `direction`, consulting `store`
/// only when the working set has no perfect match. Never mutates anything.
pub fn resolve<S: StoreAdapter + ?Sized>(
    groups: &GroupIndex,
    store: &S,
    direction: Direction,
    reference: Timestamp,
) -> Result<Option<Nearest>> {
    let candidate = find_nearest_group_record(groups, direction, reference);

    let store_record = if candidate.is_perfect {
        None
    } else {
        match direction {
            Direction::Forward => store.fetch_next(reference)?,
            Direction::Backward => store.fetch_prev(reference)?,
        }
    };

    debug!(
        reference,
        ?direction,
        near_group = %candidate.group.map_or("-".to_string(), |g| g.sort_key().to_string()),
        group_record = %candidate.record.map_or("-".to_string(), Record::short),
        store_record = %store_record.as_ref().map_or("-".to_string(), Record::short),
        perfect = candidate.is_perfect,
        "nearest candidates"
    );

    let nearest = choose_nearest(&candidate, store_record);
    debug!(
        chosen_from = nearest.as_ref().map_or("neither", |n| n.source.as_str()),
        "nearest chosen"
    );
    Ok(nearest)
}
