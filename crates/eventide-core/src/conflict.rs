// Conflict detection and alternative-slot suggestion
//
// Overlap is the standard half-open interval test: touching endpoints do
// not conflict. Slot probing walks same-duration windows after the
// candidate and is bounded so a densely booked calendar surfaces
// SuggestionExhausted instead of looping forever.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EventideError, Result};
use crate::event::Event;

/// Number of alternative slots returned with a conflict rejection
pub const SUGGESTION_COUNT: usize = 3;

/// Probe bound for slot suggestion (covers a day of 15-minute meetings)
pub const MAX_SLOT_PROBES: u32 = 96;

/// A half-open `[start, end)` time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl Interval {
    pub fn new(start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Self {
        Self {
            start_date,
            end_date,
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end_date - self.start_date
    }

    /// `self.start < other.end && self.end > other.start`
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start_date < other.end_date && self.end_date > other.start_date
    }
}

impl From<&Event> for Interval {
    fn from(event: &Event) -> Self {
        Interval::new(event.start_date, event.end_date)
    }
}

/// Summary of an existing event that overlaps a candidate slot, carried in
/// the structured conflict rejection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictingEvent {
    pub id: Uuid,
    pub title: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl From<&Event> for ConflictingEvent {
    fn from(event: &Event) -> Self {
        ConflictingEvent {
            id: event.id,
            title: event.title.clone(),
            start_date: event.start_date,
            end_date: event.end_date,
        }
    }
}

/// Probe consecutive same-duration windows starting at `candidate.end_date`
/// and collect `count` that overlap nothing in `busy`. The cursor advances by
/// the candidate duration on every probe, free or not. Exceeding
/// `MAX_SLOT_PROBES` before collecting `count` slots fails with
/// `SuggestionExhausted`.
pub fn suggest_slots(candidate: &Interval, busy: &[Interval], count: usize) -> Result<Vec<Interval>> {
    let duration = candidate.duration();
    let mut suggestions = Vec::with_capacity(count);
    let mut cursor = candidate.end_date;

    for _ in 0..MAX_SLOT_PROBES {
        if suggestions.len() >= count {
            break;
        }
        let probe = Interval::new(cursor, cursor + duration);
        if !busy.iter().any(|b| b.overlaps(&probe)) {
            suggestions.push(probe);
        }
        cursor += duration;
    }

    if suggestions.len() < count {
        return Err(EventideError::SuggestionExhausted(MAX_SLOT_PROBES));
    }
    Ok(suggestions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, hour, min, 0).unwrap()
    }

    fn interval(start: (u32, u32), end: (u32, u32)) -> Interval {
        Interval::new(at(start.0, start.1), at(end.0, end.1))
    }

    #[test]
    fn touching_endpoints_do_not_conflict() {
        let a = interval((10, 0), (11, 0));
        let b = interval((11, 0), (12, 0));
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn partial_overlap_conflicts() {
        let a = interval((10, 0), (11, 0));
        let b = interval((10, 30), (11, 30));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn containment_conflicts() {
        let outer = interval((9, 0), (12, 0));
        let inner = interval((10, 0), (10, 30));
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
    }

    #[test]
    fn suggestions_start_at_candidate_end() {
        let candidate = interval((9, 30), (10, 30));
        let busy = vec![interval((9, 0), (10, 0))];

        let slots = suggest_slots(&candidate, &busy, SUGGESTION_COUNT).unwrap();
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].start_date, at(10, 30));
        assert_eq!(slots[0].end_date, at(11, 30));
        assert_eq!(slots[1].start_date, at(11, 30));
        assert_eq!(slots[2].start_date, at(12, 30));
        for slot in &slots {
            assert!(!busy.iter().any(|b| b.overlaps(slot)));
        }
    }

    #[test]
    fn suggestions_skip_busy_windows() {
        let candidate = interval((9, 0), (10, 0));
        // The first two probe windows are taken.
        let busy = vec![interval((10, 0), (11, 0)), interval((11, 0), (12, 0))];

        let slots = suggest_slots(&candidate, &busy, 1).unwrap();
        assert_eq!(slots[0].start_date, at(12, 0));
    }

    #[test]
    fn dense_calendar_exhausts_probes() {
        let candidate = interval((9, 0), (10, 0));
        let start = at(9, 0);
        let busy = Interval::new(start, start + chrono::Duration::days(30));

        let err = suggest_slots(&candidate, &[busy], 1).unwrap_err();
        assert!(matches!(err, EventideError::SuggestionExhausted(_)));
    }
}
