//! Feature aggregation
//!
//! Runs every metric calculator over one batch of events and assembles the
//! immutable `FeatureRecord`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::anonymizer::anonymize;
use crate::error::AnalysisError;
use crate::features::{
    compute_after_hours_count, compute_avg_meeting_hours_per_day, compute_back_to_back_count,
    compute_free_time_ratio, compute_longest_meeting_block, compute_meeting_load_trend, round2,
    DEFAULT_WORK_HOURS,
};
use crate::intervals::sorted_by_start;
use crate::types::{CalendarEvent, FeatureRecord, FeatureValues};

/// Explicit analysis parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisParams {
    /// Working-hours budget the free-time ratio is measured against
    pub work_hours: f64,
}

impl AnalysisParams {
    /// Reject budgets no ratio can be measured against
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.work_hours.is_finite() && self.work_hours > 0.0 {
            Ok(())
        } else {
            Err(AnalysisError::InvalidParams(format!(
                "work_hours must be a positive number of hours, got {}",
                self.work_hours
            )))
        }
    }
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            work_hours: DEFAULT_WORK_HOURS,
        }
    }
}

/// Builds feature records from event batches
#[derive(Debug, Clone, Default)]
pub struct FeatureAggregator {
    params: AnalysisParams,
}

impl FeatureAggregator {
    pub fn new(params: AnalysisParams) -> Self {
        Self { params }
    }

    pub fn with_work_hours(work_hours: f64) -> Self {
        Self::new(AnalysisParams { work_hours })
    }

    pub fn params(&self) -> &AnalysisParams {
        &self.params
    }

    /// Aggregate a batch, stamping the record with the current time
    pub fn aggregate(
        &self,
        events: &[CalendarEvent],
        raw_identifier: &str,
    ) -> Result<FeatureRecord, AnalysisError> {
        self.aggregate_at(events, raw_identifier, Utc::now())
    }

    /// Aggregate a batch with an explicit computation timestamp
    ///
    /// Parameters and every event are validated first; a single malformed
    /// event rejects the whole batch.
    pub fn aggregate_at(
        &self,
        events: &[CalendarEvent],
        raw_identifier: &str,
        computed_at: DateTime<Utc>,
    ) -> Result<FeatureRecord, AnalysisError> {
        self.params.validate()?;
        let employee_id = anonymize(raw_identifier);

        for event in events {
            event.validate()?;
        }

        if events.is_empty() {
            return Ok(FeatureRecord::new(
                employee_id,
                computed_at,
                FeatureValues::no_data(),
            ));
        }

        let sorted = sorted_by_start(events);

        let values = FeatureValues {
            avg_meeting_hours_per_day: round2(compute_avg_meeting_hours_per_day(&sorted)),
            back_to_back_meetings_count: compute_back_to_back_count(&sorted),
            free_time_ratio: round2(compute_free_time_ratio(&sorted, self.params.work_hours)),
            after_hours_meeting_frequency: compute_after_hours_count(&sorted),
            meeting_load_trend: compute_meeting_load_trend(&sorted),
            total_meetings: sorted.len() as u32,
            longest_meeting_block: compute_longest_meeting_block(&sorted),
        };

        Ok(FeatureRecord::new(employee_id, computed_at, values))
    }
}

/// Aggregate one batch with the given work-hours budget
pub fn aggregate(
    events: &[CalendarEvent],
    raw_identifier: &str,
    work_hours: f64,
) -> Result<FeatureRecord, AnalysisError> {
    FeatureAggregator::with_work_hours(work_hours).aggregate(events, raw_identifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ValidationError;
    use chrono::TimeZone;

    fn event(id: &str, start: &str, end: &str) -> CalendarEvent {
        CalendarEvent::new(
            id,
            DateTime::parse_from_rfc3339(start).unwrap(),
            DateTime::parse_from_rfc3339(end).unwrap(),
            id,
        )
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 20, 12, 0, 0).unwrap()
    }

    fn aggregate_fixed(events: &[CalendarEvent]) -> FeatureRecord {
        FeatureAggregator::default()
            .aggregate_at(events, "alice@example.com", fixed_now())
            .unwrap()
    }

    #[test]
    fn test_empty_input_is_no_data_record() {
        let record = aggregate_fixed(&[]);

        assert_eq!(record.employee_id(), &anonymize("alice@example.com"));
        assert_eq!(record.timestamp(), fixed_now());
        assert_eq!(record.total_meetings(), 0);
        assert_eq!(record.free_time_ratio(), 1.0);
        assert_eq!(record.avg_meeting_hours_per_day(), 0.0);
        assert_eq!(record.back_to_back_meetings_count(), 0);
        assert_eq!(record.after_hours_meeting_frequency(), 0);
        assert_eq!(record.meeting_load_trend(), 0.0);
        assert_eq!(record.longest_meeting_block(), 0.0);
    }

    #[test]
    fn test_scenario_two_back_to_back_meetings() {
        // Monday, 09:00-10:00 then 10:05-11:00
        let events = vec![
            event("a", "2024-01-15T09:00:00Z", "2024-01-15T10:00:00Z"),
            event("b", "2024-01-15T10:05:00Z", "2024-01-15T11:00:00Z"),
        ];
        let record = aggregate_fixed(&events);

        assert_eq!(record.total_meetings(), 2);
        assert_eq!(record.back_to_back_meetings_count(), 1);
        assert_eq!(record.longest_meeting_block(), 2.0);
        assert_eq!(record.after_hours_meeting_frequency(), 0);
        // 1h55m of an 8h day
        assert_eq!(record.avg_meeting_hours_per_day(), 1.92);
        assert_eq!(record.free_time_ratio(), 0.76);
        assert_eq!(record.meeting_load_trend(), -8.33);
    }

    #[test]
    fn test_scenario_short_back_to_back_pair() {
        // Monday, 09:00-09:30 then 09:35-10:00
        let events = vec![
            event("a", "2024-01-15T09:00:00Z", "2024-01-15T09:30:00Z"),
            event("b", "2024-01-15T09:35:00Z", "2024-01-15T10:00:00Z"),
        ];
        let record = aggregate_fixed(&events);

        assert_eq!(record.total_meetings(), 2);
        assert_eq!(record.back_to_back_meetings_count(), 1);
        assert_eq!(record.longest_meeting_block(), 1.0);
        assert_eq!(record.after_hours_meeting_frequency(), 0);
    }

    #[test]
    fn test_scenario_saturday_working_day() {
        // 2024-01-20 is a Saturday
        let events = vec![event("sat", "2024-01-20T09:00:00Z", "2024-01-20T18:00:00Z")];
        let record = aggregate_fixed(&events);

        assert_eq!(record.total_meetings(), 1);
        assert_eq!(record.after_hours_meeting_frequency(), 1);
        assert_eq!(record.longest_meeting_block(), 9.0);
        assert_eq!(record.free_time_ratio(), 0.0);
    }

    #[test]
    fn test_scenario_separated_meetings() {
        let events = vec![
            event("a", "2024-01-15T09:00:00Z", "2024-01-15T10:00:00Z"),
            event("b", "2024-01-15T10:30:00Z", "2024-01-15T11:00:00Z"),
        ];
        let record = aggregate_fixed(&events);

        assert_eq!(record.back_to_back_meetings_count(), 0);
        assert_eq!(record.longest_meeting_block(), 1.0);
        assert_eq!(record.free_time_ratio(), 0.81);
        assert_eq!(record.meeting_load_trend(), -50.0);
    }

    #[test]
    fn test_scenario_after_hours_and_weekend() {
        let events = vec![
            event("early", "2024-01-15T07:00:00Z", "2024-01-15T08:00:00Z"),
            event("evening", "2024-01-15T19:00:00Z", "2024-01-15T20:00:00Z"),
            event("saturday", "2024-01-20T11:00:00Z", "2024-01-20T12:00:00Z"),
            event("normal", "2024-01-16T11:00:00Z", "2024-01-16T12:00:00Z"),
        ];
        let record = aggregate_fixed(&events);

        assert_eq!(record.after_hours_meeting_frequency(), 3);
        // 4 hours over 15th..20th: 5 whole days between first and last start, 6 days spanned
        assert_eq!(record.avg_meeting_hours_per_day(), 0.67);
        assert_eq!(record.free_time_ratio(), 0.5);
        assert_eq!(record.meeting_load_trend(), 0.0);
    }

    #[test]
    fn test_scenario_overbooked_day() {
        let events = vec![
            event("a", "2024-01-15T08:00:00Z", "2024-01-15T12:00:00Z"),
            event("b", "2024-01-15T12:00:00Z", "2024-01-15T17:00:00Z"),
        ];
        let record = FeatureAggregator::with_work_hours(8.0)
            .aggregate_at(&events, "bob", fixed_now())
            .unwrap();

        assert_eq!(record.free_time_ratio(), 0.0);
        assert_eq!(record.longest_meeting_block(), 9.0);
        assert_eq!(record.back_to_back_meetings_count(), 1);
        assert_eq!(record.after_hours_meeting_frequency(), 1);
        assert_eq!(record.meeting_load_trend(), 25.0);
    }

    #[test]
    fn test_scenario_single_meeting() {
        let events = vec![event("solo", "2024-01-15T14:00:00Z", "2024-01-15T14:30:00Z")];
        let record = aggregate_fixed(&events);

        assert_eq!(record.total_meetings(), 1);
        assert_eq!(record.back_to_back_meetings_count(), 0);
        assert_eq!(record.longest_meeting_block(), 0.5);
        assert_eq!(record.avg_meeting_hours_per_day(), 0.5);
        assert_eq!(record.free_time_ratio(), 0.94);
        assert_eq!(record.meeting_load_trend(), 500.0);
    }

    #[test]
    fn test_custom_work_hours() {
        let events = vec![event("a", "2024-01-15T09:00:00Z", "2024-01-15T11:00:00Z")];
        let record = FeatureAggregator::with_work_hours(4.0)
            .aggregate_at(&events, "carol", fixed_now())
            .unwrap();
        assert_eq!(record.free_time_ratio(), 0.5);
    }

    #[test]
    fn test_result_independent_of_input_order() {
        let events = vec![
            event("a", "2024-01-15T09:00:00Z", "2024-01-15T09:30:00Z"),
            event("b", "2024-01-15T09:40:00Z", "2024-01-15T10:30:00Z"),
            event("c", "2024-01-16T19:00:00Z", "2024-01-16T20:15:00Z"),
            event("d", "2024-01-17T13:00:00Z", "2024-01-17T13:05:00Z"),
        ];
        let expected = aggregate_fixed(&events);

        let mut reversed = events.clone();
        reversed.reverse();
        pretty_assertions::assert_eq!(aggregate_fixed(&reversed), expected);
    }

    #[test]
    fn test_ratio_bounds() {
        let batches = vec![
            vec![],
            vec![event("a", "2024-01-15T00:00:00Z", "2024-01-16T00:00:00Z")],
            vec![event("a", "2024-01-15T09:00:00Z", "2024-01-15T09:00:00Z")],
            vec![
                event("a", "2024-01-15T09:00:00Z", "2024-01-15T12:00:00Z"),
                event("b", "2024-01-15T10:00:00Z", "2024-01-15T15:00:00Z"),
            ],
        ];

        for events in batches {
            let ratio = aggregate_fixed(&events).free_time_ratio();
            assert!((0.0..=1.0).contains(&ratio), "ratio {ratio} out of range");
        }
    }

    #[test]
    fn test_rejects_unusable_work_hours() {
        let events = vec![event("a", "2024-01-15T09:00:00Z", "2024-01-15T10:00:00Z")];

        for work_hours in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 0.0, -8.0] {
            let err = FeatureAggregator::with_work_hours(work_hours)
                .aggregate_at(&events, "x", fixed_now())
                .unwrap_err();
            assert!(
                matches!(err, AnalysisError::InvalidParams(_)),
                "work_hours {work_hours} should be rejected"
            );
        }

        // also rejected for an empty batch
        assert!(FeatureAggregator::with_work_hours(f64::NAN)
            .aggregate_at(&[], "x", fixed_now())
            .is_err());
    }

    #[test]
    fn test_rejects_malformed_event() {
        let events = vec![
            event("ok", "2024-01-15T09:00:00Z", "2024-01-15T10:00:00Z"),
            event("bad", "2024-01-15T12:00:00Z", "2024-01-15T11:00:00Z"),
        ];

        let err = FeatureAggregator::default()
            .aggregate(&events, "dave")
            .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InvalidEvent(ValidationError::EndBeforeStart { ref event_id, .. })
                if event_id == "bad"
        ));
    }

    #[test]
    fn test_free_function_uses_work_hours() {
        let events = vec![event("a", "2024-01-15T09:00:00Z", "2024-01-15T10:00:00Z")];
        let record = aggregate(&events, "erin", 2.0).unwrap();
        assert_eq!(record.free_time_ratio(), 0.5);
        assert_eq!(record.employee_id().as_str().len(), 16);
    }
}
