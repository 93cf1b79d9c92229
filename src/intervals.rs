//! Interval utilities
//!
//! Shared helpers for reasoning about meeting intervals: start ordering, gaps
//! between consecutive meetings and merging of back-to-back runs into blocks.

use chrono::{DateTime, FixedOffset};

use crate::types::CalendarEvent;

/// Meetings closer together than this count as one continuous run (minutes)
pub const CONTIGUITY_THRESHOLD_MINUTES: f64 = 15.0;

/// Events ordered by start instant
///
/// Ordering is stable: events starting at the same instant keep their input
/// order, so gap computations are deterministic.
#[derive(Debug, Clone)]
pub struct SortedEvents<'a> {
    events: Vec<&'a CalendarEvent>,
}

impl<'a> SortedEvents<'a> {
    pub fn as_slice(&self) -> &[&'a CalendarEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn first(&self) -> Option<&'a CalendarEvent> {
        self.events.first().copied()
    }

    pub fn last(&self) -> Option<&'a CalendarEvent> {
        self.events.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a CalendarEvent> + '_ {
        self.events.iter().copied()
    }

    /// Consecutive (earlier, later) pairs in start order
    pub fn pairs(&self) -> impl Iterator<Item = (&'a CalendarEvent, &'a CalendarEvent)> + '_ {
        self.events.windows(2).map(|w| (w[0], w[1]))
    }
}

/// Sort events ascending by start instant (stable)
pub fn sorted_by_start(events: &[CalendarEvent]) -> SortedEvents<'_> {
    let mut sorted: Vec<&CalendarEvent> = events.iter().collect();
    sorted.sort_by_key(|e| e.start_time);
    SortedEvents { events: sorted }
}

/// Seconds from `from` to `to`, negative if `to` is earlier
pub(crate) fn seconds_between(from: &DateTime<FixedOffset>, to: &DateTime<FixedOffset>) -> f64 {
    let delta = *to - *from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_seconds() as f64,
    }
}

/// Minutes between the end of `a` and the start of `b`
///
/// Negative when the meetings overlap, which callers treat as no gap at all.
pub fn gap_minutes(a: &CalendarEvent, b: &CalendarEvent) -> f64 {
    seconds_between(&a.end_time, &b.start_time) / 60.0
}

/// Whether two meetings `gap` minutes apart belong to the same run
pub fn is_contiguous(gap: f64) -> bool {
    gap < CONTIGUITY_THRESHOLD_MINUTES
}

/// A maximal run of back-to-back meetings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeetingBlock {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub event_count: usize,
}

impl MeetingBlock {
    fn open(event: &CalendarEvent) -> Self {
        Self {
            start: event.start_time,
            end: event.end_time,
            event_count: 1,
        }
    }

    pub fn duration_hours(&self) -> f64 {
        seconds_between(&self.start, &self.end) / 3600.0
    }
}

/// Merge start-sorted events into continuous meeting blocks
///
/// An event joins the current block when it starts less than the contiguity
/// threshold after the latest end seen so far in that block.
pub fn merge_blocks(sorted: &SortedEvents<'_>) -> Vec<MeetingBlock> {
    let mut blocks = Vec::new();
    let mut events = sorted.iter();

    let Some(first) = events.next() else {
        return blocks;
    };
    let mut current = MeetingBlock::open(first);

    for event in events {
        let gap = seconds_between(&current.end, &event.start_time) / 60.0;
        if is_contiguous(gap) {
            current.end = current.end.max(event.end_time);
            current.event_count += 1;
        } else {
            blocks.push(current);
            current = MeetingBlock::open(event);
        }
    }
    blocks.push(current);

    blocks
}
