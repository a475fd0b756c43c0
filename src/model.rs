use std::fmt;

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Unix timestamp, seconds.
pub type Timestamp = u64;

pub const SECONDS_PER_DAY: u64 = 86_400;

/// End of an interval. `Open` means time never stops, and sorts after
/// every finite timestamp.
#[derive(Archive, RkyvDeserialize, RkyvSerialize, Serialize, Deserialize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[archive(check_bytes)]
pub enum EndTime {
    Finite(Timestamp),
    Open,
}

impl EndTime {
    pub fn finite(self) -> Option<Timestamp> {
        match self {
            EndTime::Finite(ts) => Some(ts),
            EndTime::Open => None,
        }
    }

    pub fn is_open(self) -> bool {
        matches!(self, EndTime::Open)
    }
}

impl From<Option<Timestamp>> for EndTime {
    fn from(end: Option<Timestamp>) -> Self {
        end.map_or(EndTime::Open, EndTime::Finite)
    }
}

impl fmt::Display for EndTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndTime::Finite(ts) => write!(f, "{}", ts),
            EndTime::Open => write!(f, "ONGOING"),
        }
    }
}

/// Bisection key shared by records and groups: start first, then end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortKey {
    pub start: Timestamp,
    pub end: EndTime,
}

impl SortKey {
    pub fn new(start: Timestamp, end: EndTime) -> Self {
        Self { start, end }
    }

    /// Key used to probe for `at`: sorts after every key that starts at `at`
    /// except an ongoing one.
    pub fn probe(at: Timestamp) -> Self {
        Self { start: at, end: EndTime::Open }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.start, self.end)
    }
}

/// One time interval, as loaded from the store or produced by an edit.
#[derive(Archive, RkyvDeserialize, RkyvSerialize, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[archive(check_bytes)]
pub struct Record {
    /// Stable identity. `None` until the record has been saved.
    pub key: Option<u128>,

    pub start: Timestamp,

    pub end: EndTime,

    /// Raw binary payload
    pub payload: Vec<u8>,
}

impl Record {
    pub fn new(key: Uuid, start: Timestamp, end: Option<Timestamp>, payload: Vec<u8>) -> Result<Self> {
        Self::build(Some(key.as_u128()), start, end.into(), payload)
    }

    /// A record the edit session has created but not yet saved.
    pub fn unsaved(start: Timestamp, end: Option<Timestamp>, payload: Vec<u8>) -> Result<Self> {
        Self::build(None, start, end.into(), payload)
    }

    fn build(key: Option<u128>, start: Timestamp, end: EndTime, payload: Vec<u8>) -> Result<Self> {
        if let EndTime::Finite(end) = end {
            if end < start {
                return Err(Error::InvalidInterval { start, end });
            }
        }
        Ok(Self { key, start, end, payload })
    }

    pub fn sort_key(&self) -> SortKey {
        SortKey::new(self.start, self.end)
    }

    pub fn is_ongoing(&self) -> bool {
        self.end.is_open()
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.key.map(Uuid::from_u128)
    }

    /// One-line rendering for logs.
    pub fn short(&self) -> String {
        let key = match self.uuid() {
            Some(id) => id.to_string()[..8].to_string(),
            None => "unsaved".to_string(),
        };
        format!("{} {} -> {} \"{}\"", key, self.start, self.end, String::from_utf8_lossy(&self.payload))
    }
}

/// Which way a jump moves through time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Toward the future: nearest record starting after the reference.
    Forward,
    /// Toward the past: nearest record ending at or before the reference.
    Backward,
}

/// Tag handed to `on_jumped` describing what kind of navigation happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpReason {
    Next,
    Prev,
    DayNext,
    DayPrev,
}

impl JumpReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            JumpReason::Next => "jump-next",
            JumpReason::Prev => "jump-prev",
            JumpReason::DayNext => "jump-day-next",
            JumpReason::DayPrev => "jump-day-prev",
        }
    }
}

impl fmt::Display for JumpReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_sorts_after_finite() {
        assert!(EndTime::Finite(u64::MAX) < EndTime::Open);
        assert!(EndTime::Finite(3) < EndTime::Finite(4));
    }

    #[test]
    fn test_sort_key_orders_start_then_end() {
        let a = SortKey::new(10, EndTime::Finite(20));
        let b = SortKey::new(10, EndTime::Open);
        let c = SortKey::new(11, EndTime::Finite(12));
        assert!(a < b);
        assert!(b < c);
        assert_eq!(SortKey::probe(10), b);
    }

    #[test]
    fn test_record_rejects_inverted_interval() {
        let err = Record::unsaved(100, Some(99), vec![]).unwrap_err();
        assert!(matches!(err, Error::InvalidInterval { start: 100, end: 99 }));
        assert!(Record::unsaved(100, Some(100), vec![]).is_ok());
    }

    #[test]
    fn test_missing_end_is_ongoing() {
        let r = Record::new(Uuid::new_v4(), 5, None, b"x".to_vec()).unwrap();
        assert!(r.is_ongoing());
        assert_eq!(r.sort_key(), SortKey::new(5, EndTime::Open));
    }

    #[test]
    fn test_reason_tags() {
        assert_eq!(JumpReason::Next.to_string(), "jump-next");
        assert_eq!(JumpReason::Prev.as_str(), "jump-prev");
        assert_eq!(JumpReason::DayPrev.as_str(), "jump-day-prev");
    }
}
