//! Google Calendar adapter
//!
//! Parses Google Calendar `events.list` responses and maps them to calendar
//! events.

use serde::Deserialize;
use tracing::debug;

use super::{parse_rfc3339, ProviderPayloadAdapter};
use crate::error::AnalysisError;
use crate::types::CalendarEvent;

/// Google Calendar payload adapter
pub struct GoogleAdapter;

impl ProviderPayloadAdapter for GoogleAdapter {
    fn parse(&self, raw_json: &str) -> Result<Vec<CalendarEvent>, AnalysisError> {
        let payload: GoogleEventList = serde_json::from_str(raw_json)?;
        let mut events = Vec::with_capacity(payload.items.len());

        for item in payload.items {
            if item.status.as_deref() == Some("cancelled") {
                debug!(event_id = %item.id, "skipping cancelled google event");
                continue;
            }

            let (Some(start), Some(end)) = (
                item.start.as_ref().and_then(|t| t.date_time.as_deref()),
                item.end.as_ref().and_then(|t| t.date_time.as_deref()),
            ) else {
                debug!(event_id = %item.id, "skipping all-day google event");
                continue;
            };

            let start_time = parse_rfc3339(&item.id, start)?;
            let end_time = parse_rfc3339(&item.id, end)?;

            let attendees_count = item
                .attendees
                .iter()
                .filter(|a| !a.resource)
                .count() as u32;
            let is_recurring = item.recurring_event_id.is_some() || item.recurrence.is_some();

            events.push(CalendarEvent {
                event_id: item.id,
                start_time,
                end_time,
                title: item.summary.unwrap_or_default(),
                attendees_count,
                is_recurring,
            });
        }

        Ok(events)
    }
}

// Google Calendar API structures

#[derive(Debug, Deserialize)]
struct GoogleEventList {
    #[serde(default)]
    items: Vec<GoogleEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEvent {
    id: String,
    status: Option<String>,
    summary: Option<String>,
    start: Option<GoogleEventTime>,
    end: Option<GoogleEventTime>,
    #[serde(default)]
    attendees: Vec<GoogleAttendee>,
    recurring_event_id: Option<String>,
    recurrence: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventTime {
    date_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleAttendee {
    #[serde(default)]
    resource: bool,
}
