//! Workload metric calculators
//!
//! Each metric is an independent pure function over a batch of events:
//! - Total meeting hours and free-time ratio
//! - Back-to-back meetings and longest continuous block
//! - After-hours meetings
//! - Meeting-load trend and average daily load
//!
//! The public functions accept events in any order and sort internally. The
//! `compute_*` variants take an already sorted batch so the aggregator only
//! sorts once.

use chrono::{DateTime, Datelike, FixedOffset, Timelike};

use crate::intervals::{gap_minutes, is_contiguous, merge_blocks, sorted_by_start, SortedEvents};
use crate::types::CalendarEvent;

/// Default working-hours budget per day
pub const DEFAULT_WORK_HOURS: f64 = 8.0;

/// First hour of the working day (local wall clock)
pub const WORKDAY_START_HOUR: u32 = 9;

/// Hour at which the working day ends (local wall clock)
pub const WORKDAY_END_HOUR: u32 = 18;

/// Floor for the first-half average in the trend denominator (hours)
pub const TREND_BASELINE_FLOOR_HOURS: f64 = 0.1;

/// Sum of meeting durations in hours
pub fn total_meeting_hours(events: &[CalendarEvent]) -> f64 {
    compute_total_meeting_hours(&sorted_by_start(events))
}

/// Fraction of `work_hours` not consumed by meetings, in [0, 1]
pub fn free_time_ratio(events: &[CalendarEvent], work_hours: f64) -> f64 {
    compute_free_time_ratio(&sorted_by_start(events), work_hours)
}

/// Number of consecutive meeting pairs separated by less than 15 minutes
pub fn back_to_back_count(events: &[CalendarEvent]) -> u32 {
    compute_back_to_back_count(&sorted_by_start(events))
}

/// Longest merged block of back-to-back meetings, in hours (2 decimals)
pub fn longest_meeting_block(events: &[CalendarEvent]) -> f64 {
    compute_longest_meeting_block(&sorted_by_start(events))
}

/// Number of meetings starting on a weekend or outside 09:00-18:00
pub fn after_hours_count(events: &[CalendarEvent]) -> u32 {
    events.iter().filter(|e| is_after_hours(&e.start_time)).count() as u32
}

/// Percentage change in average meeting length between the earlier and later
/// half of the batch (2 decimals)
pub fn meeting_load_trend(events: &[CalendarEvent]) -> f64 {
    compute_meeting_load_trend(&sorted_by_start(events))
}

/// Meeting hours per calendar day spanned by the batch
pub fn avg_meeting_hours_per_day(events: &[CalendarEvent]) -> f64 {
    compute_avg_meeting_hours_per_day(&sorted_by_start(events))
}

/// Whether a meeting starting at `start` falls outside working time
///
/// Evaluated on the wall clock of the offset the instant carries.
pub fn is_after_hours(start: &DateTime<FixedOffset>) -> bool {
    let is_weekend = start.weekday().num_days_from_monday() >= 5;
    let hour = start.hour();
    is_weekend || hour < WORKDAY_START_HOUR || hour >= WORKDAY_END_HOUR
}

/// Round to two decimals, ties to even on the exact binary value
pub(crate) fn round2(value: f64) -> f64 {
    format!("{value:.2}").parse().unwrap_or(value)
}

fn sum_hours<'a>(events: impl IntoIterator<Item = &'a CalendarEvent>) -> f64 {
    events
        .into_iter()
        .fold(0.0, |acc, event| acc + event.duration_hours())
}

pub(crate) fn compute_total_meeting_hours(sorted: &SortedEvents<'_>) -> f64 {
    sum_hours(sorted.iter())
}

pub(crate) fn compute_free_time_ratio(sorted: &SortedEvents<'_>, work_hours: f64) -> f64 {
    if sorted.is_empty() {
        return 1.0;
    }
    // no usable budget leaves no free time
    if !(work_hours.is_finite() && work_hours > 0.0) {
        return 0.0;
    }

    let total = compute_total_meeting_hours(sorted);
    if total >= work_hours {
        return 0.0;
    }

    ((work_hours - total) / work_hours).clamp(0.0, 1.0)
}

pub(crate) fn compute_back_to_back_count(sorted: &SortedEvents<'_>) -> u32 {
    sorted
        .pairs()
        .filter(|(earlier, later)| is_contiguous(gap_minutes(earlier, later)))
        .count() as u32
}

pub(crate) fn compute_longest_meeting_block(sorted: &SortedEvents<'_>) -> f64 {
    let longest = merge_blocks(sorted)
        .iter()
        .map(|block| block.duration_hours())
        .fold(0.0, f64::max);
    round2(longest)
}

pub(crate) fn compute_after_hours_count(sorted: &SortedEvents<'_>) -> u32 {
    sorted.iter().filter(|e| is_after_hours(&e.start_time)).count() as u32
}

/// Compare average meeting length of the first and second half
///
/// Formula: `(second_avg - first_avg) / max(first_avg, 0.1) * 100`
/// The split index is `len / 2`; an odd batch puts the extra event in the
/// second half. A single event is compared against an empty first half.
pub(crate) fn compute_meeting_load_trend(sorted: &SortedEvents<'_>) -> f64 {
    let total = sorted.len();
    if total == 0 {
        return 0.0;
    }

    let mid = total / 2;
    let (first_half, second_half) = sorted.as_slice().split_at(mid);

    let first_avg = sum_hours(first_half.iter().copied()) / mid.max(1) as f64;
    let second_avg = sum_hours(second_half.iter().copied()) / (total - mid).max(1) as f64;

    round2((second_avg - first_avg) / first_avg.max(TREND_BASELINE_FLOOR_HOURS) * 100.0)
}

pub(crate) fn compute_avg_meeting_hours_per_day(sorted: &SortedEvents<'_>) -> f64 {
    let (Some(first), Some(last)) = (sorted.first(), sorted.last()) else {
        return 0.0;
    };

    let days_span = ((last.start_time - first.start_time).num_days() + 1).max(1);
    compute_total_meeting_hours(sorted) / days_span as f64
}
