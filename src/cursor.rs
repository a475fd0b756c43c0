use tracing::debug;

use crate::model::{Direction, Record, Timestamp, SECONDS_PER_DAY};

/// Navigation state carried between jumps: the active record and the time
/// the next day step is measured from.
#[derive(Debug, Clone)]
pub struct JumpCursor {
    reference_time: Option<Timestamp>,
    current: Option<Record>,
    day_seconds: u64,
}

impl Default for JumpCursor {
    fn default() -> Self {
        Self::new(SECONDS_PER_DAY)
    }
}

impl JumpCursor {
    pub fn new(day_seconds: u64) -> Self {
        assert!(day_seconds > 0, "day length must be positive");
        Self { reference_time: None, current: None, day_seconds }
    }

    pub fn current(&self) -> Option<&Record> {
        self.current.as_ref()
    }

    /// Makes `record` the active record without touching the anchor.
    pub fn set_current(&mut self, record: Record) {
        self.current = Some(record);
    }

    pub fn is_anchored(&self) -> bool {
        self.reference_time.is_some()
    }

    /// The anchored time, or the active record's start when unanchored.
    pub fn reference_time(&self) -> Option<Timestamp> {
        self.reference_time.or_else(|| self.current.as_ref().map(|r| r.start))
    }

    /// Back to unanchored, as at the start of a session.
    pub fn reset(&mut self) {
        self.reference_time = None;
    }

    pub fn day_before(&self) -> Option<Timestamp> {
        self.reference_time().map(|t| t.saturating_sub(self.day_seconds))
    }

    pub fn day_after(&self) -> Option<Timestamp> {
        self.reference_time().map(|t| t.saturating_add(self.day_seconds))
    }

    /// Anchors the cursor near `queried` in whole-day steps so that the
    /// active record is not left behind by the next day step.
    ///
    /// Going backward, days are subtracted while the active record ends
    /// before the adjusted time; going forward, days are added while it
    /// starts after it.
    pub fn re_anchor(&mut self, direction: Direction, queried: Timestamp) -> Timestamp {
        let day = self.day_seconds;
        let adjusted = match (&self.current, direction) {
            (Some(current), Direction::Backward) => match current.end.finite() {
                Some(end) if end < queried => {
                    let days = (queried - end).div_ceil(day);
                    queried.saturating_sub(days.saturating_mul(day))
                }
                _ => queried,
            },
            (Some(current), Direction::Forward) if current.start > queried => {
                let days = (current.start - queried).div_ceil(day);
                queried.saturating_add(days.saturating_mul(day))
            }
            _ => queried,
        };
        debug!(queried, adjusted, "jump reference set");
        self.reference_time = Some(adjusted);
        adjusted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: u64 = SECONDS_PER_DAY;

    fn rec(start: Timestamp, end: Option<Timestamp>) -> Record {
        Record::unsaved(start, end, vec![]).unwrap()
    }

    #[test]
    fn test_unanchored_falls_back_to_current_start() {
        let mut cursor = JumpCursor::default();
        assert_eq!(cursor.reference_time(), None);
        cursor.set_current(rec(5 * DAY, Some(5 * DAY + 60)));
        assert!(!cursor.is_anchored());
        assert_eq!(cursor.reference_time(), Some(5 * DAY));
        assert_eq!(cursor.day_before(), Some(4 * DAY));
        assert_eq!(cursor.day_after(), Some(6 * DAY));
    }

    #[test]
    fn test_backward_walks_back_to_current_end() {
        // Active record ends at day 8 17:00; queried day 9 09:00.
        let mut cursor = JumpCursor::default();
        cursor.set_current(rec(8 * DAY + 9 * 3600, Some(8 * DAY + 17 * 3600)));
        let adjusted = cursor.re_anchor(Direction::Backward, 9 * DAY + 9 * 3600);
        assert_eq!(adjusted, 8 * DAY + 9 * 3600);
        assert!(cursor.is_anchored());
        assert_eq!(cursor.reference_time(), Some(adjusted));
    }

    #[test]
    fn test_backward_over_several_days() {
        let mut cursor = JumpCursor::default();
        cursor.set_current(rec(DAY, Some(DAY + 100)));
        let adjusted = cursor.re_anchor(Direction::Backward, 5 * DAY + 50);
        // Largest t = queried - k*DAY with t <= end.
        assert_eq!(adjusted, DAY + 50);
    }

    #[test]
    fn test_backward_keeps_time_for_ongoing_or_later_end() {
        let mut cursor = JumpCursor::default();
        cursor.set_current(rec(DAY, None));
        assert_eq!(cursor.re_anchor(Direction::Backward, 9 * DAY), 9 * DAY);

        cursor.set_current(rec(DAY, Some(10 * DAY)));
        assert_eq!(cursor.re_anchor(Direction::Backward, 9 * DAY), 9 * DAY);
    }

    #[test]
    fn test_forward_walks_up_to_current_start() {
        let mut cursor = JumpCursor::default();
        cursor.set_current(rec(10 * DAY + 3600, Some(10 * DAY + 7200)));
        let adjusted = cursor.re_anchor(Direction::Forward, 7 * DAY);
        assert_eq!(adjusted, 11 * DAY);
        assert_eq!(cursor.re_anchor(Direction::Forward, 12 * DAY), 12 * DAY);
    }

    #[test]
    fn test_without_current_keeps_queried() {
        let mut cursor = JumpCursor::new(10);
        assert_eq!(cursor.re_anchor(Direction::Forward, 42), 42);
        assert_eq!(cursor.day_after(), Some(52));
        cursor.reset();
        assert!(!cursor.is_anchored());
        assert_eq!(cursor.reference_time(), None);
    }
}
