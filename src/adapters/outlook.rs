//! Outlook (Microsoft Graph) adapter
//!
//! Parses Graph `calendarView` responses and maps them to calendar events.
//! Graph reports naive local date-times next to a zone name; only UTC is
//! accepted here, since no timezone database is consulted.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::Deserialize;
use tracing::debug;

use super::{parse_rfc3339, ProviderPayloadAdapter};
use crate::error::AnalysisError;
use crate::types::CalendarEvent;

/// Outlook payload adapter
pub struct OutlookAdapter;

impl ProviderPayloadAdapter for OutlookAdapter {
    fn parse(&self, raw_json: &str) -> Result<Vec<CalendarEvent>, AnalysisError> {
        let payload: GraphEventList = serde_json::from_str(raw_json)?;
        let mut events = Vec::with_capacity(payload.value.len());

        for item in payload.value {
            if item.is_cancelled {
                debug!(event_id = %item.id, "skipping cancelled outlook event");
                continue;
            }
            if item.is_all_day {
                debug!(event_id = %item.id, "skipping all-day outlook event");
                continue;
            }

            let start_time = parse_graph_time(&item.id, &item.start)?;
            let end_time = parse_graph_time(&item.id, &item.end)?;

            let attendees_count = item
                .attendees
                .iter()
                .filter(|a| !a.kind.eq_ignore_ascii_case("resource"))
                .count() as u32;
            let is_recurring = item.series_master_id.is_some()
                || matches!(item.kind.as_deref(), Some("occurrence" | "exception"));

            events.push(CalendarEvent {
                event_id: item.id,
                start_time,
                end_time,
                title: item.subject.unwrap_or_default(),
                attendees_count,
                is_recurring,
            });
        }

        Ok(events)
    }
}

fn parse_graph_time(
    event_id: &str,
    time: &GraphDateTime,
) -> Result<DateTime<FixedOffset>, AnalysisError> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(&time.date_time) {
        return Ok(instant);
    }

    match time.time_zone.as_deref() {
        Some(zone) if zone.eq_ignore_ascii_case("UTC") => {
            let naive = NaiveDateTime::parse_from_str(&time.date_time, "%Y-%m-%dT%H:%M:%S%.f")
                .map_err(|e| {
                    AnalysisError::ParseError(format!(
                        "event {event_id}: invalid timestamp {:?}: {e}",
                        time.date_time
                    ))
                })?;
            Ok(naive.and_utc().fixed_offset())
        }
        Some(zone) => Err(AnalysisError::InvalidTimezone(format!(
            "event {event_id}: {zone}"
        ))),
        // No zone at all: the value has to carry its own offset
        None => parse_rfc3339(event_id, &time.date_time),
    }
}

// Microsoft Graph API structures

#[derive(Debug, Deserialize)]
struct GraphEventList {
    #[serde(default)]
    value: Vec<GraphEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphEvent {
    id: String,
    subject: Option<String>,
    #[serde(default)]
    is_cancelled: bool,
    #[serde(default)]
    is_all_day: bool,
    start: GraphDateTime,
    end: GraphDateTime,
    #[serde(default)]
    attendees: Vec<GraphAttendee>,
    series_master_id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphDateTime {
    date_time: String,
    time_zone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphAttendee {
    #[serde(rename = "type", default)]
    kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_graph_json() -> &'static str {
        r#"{
            "@odata.context": "https://graph.microsoft.com/v1.0/$metadata#users('x')/calendarView",
            "value": [
                {
                    "id": "o-1",
                    "subject": "1:1",
                    "type": "occurrence",
                    "seriesMasterId": "master-1",
                    "start": {"dateTime": "2024-01-15T09:00:00.0000000", "timeZone": "UTC"},
                    "end": {"dateTime": "2024-01-15T09:30:00.0000000", "timeZone": "UTC"},
                    "attendees": [
                        {"type": "required", "emailAddress": {"address": "a@example.com"}},
                        {"type": "optional", "emailAddress": {"address": "b@example.com"}},
                        {"type": "resource", "emailAddress": {"address": "room@example.com"}}
                    ]
                },
                {
                    "id": "o-2",
                    "subject": "Cancelled sync",
                    "isCancelled": true,
                    "start": {"dateTime": "2024-01-15T10:00:00.0000000", "timeZone": "UTC"},
                    "end": {"dateTime": "2024-01-15T11:00:00.0000000", "timeZone": "UTC"}
                },
                {
                    "id": "o-3",
                    "subject": "Holiday",
                    "isAllDay": true,
                    "start": {"dateTime": "2024-01-16T00:00:00.0000000", "timeZone": "UTC"},
                    "end": {"dateTime": "2024-01-17T00:00:00.0000000", "timeZone": "UTC"}
                },
                {
                    "id": "o-4",
                    "subject": "Review",
                    "type": "singleInstance",
                    "start": {"dateTime": "2024-01-16T15:00:00+02:00", "timeZone": "FLE Standard Time"},
                    "end": {"dateTime": "2024-01-16T16:00:00+02:00", "timeZone": "FLE Standard Time"}
                }
            ]
        }"#
    }

    #[test]
    fn test_parse_graph_payload() {
        let events = OutlookAdapter.parse(sample_graph_json()).unwrap();
        let ids: Vec<&str> = events.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(ids, vec!["o-1", "o-4"]);

        let one_on_one = &events[0];
        assert_eq!(one_on_one.title, "1:1");
        assert_eq!(one_on_one.attendees_count, 2);
        assert!(one_on_one.is_recurring);
        assert_eq!(one_on_one.start_time.offset().local_minus_utc(), 0);
        assert_eq!(one_on_one.duration_hours(), 0.5);

        let review = &events[1];
        assert!(!review.is_recurring);
        assert_eq!(review.start_time.offset().local_minus_utc(), 2 * 3600);
    }

    #[test]
    fn test_naive_time_outside_utc_is_rejected() {
        let json = r#"{"value": [{
            "id": "o-9",
            "start": {"dateTime": "2024-01-15T09:00:00.0000000", "timeZone": "Pacific Standard Time"},
            "end": {"dateTime": "2024-01-15T10:00:00.0000000", "timeZone": "Pacific Standard Time"}
        }]}"#;

        let err = OutlookAdapter.parse(json).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidTimezone(ref msg) if msg.contains("Pacific")));
    }

    #[test]
    fn test_exception_counts_as_recurring() {
        let json = r#"{"value": [{
            "id": "o-5",
            "type": "exception",
            "start": {"dateTime": "2024-01-15T09:00:00Z"},
            "end": {"dateTime": "2024-01-15T10:00:00Z"}
        }]}"#;

        let events = OutlookAdapter.parse(json).unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_recurring);
        assert_eq!(events[0].title, "");
    }
}
