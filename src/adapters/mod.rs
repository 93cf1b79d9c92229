//! Calendar provider payload adapters
//!
//! This module provides adapters that parse raw provider JSON payloads and map
//! them to canonical, provider-agnostic calendar events.

mod google;
mod outlook;

pub use google::GoogleAdapter;
pub use outlook::OutlookAdapter;

use chrono::{DateTime, FixedOffset};

use crate::error::AnalysisError;
use crate::types::{CalendarEvent, CalendarProvider};

/// Trait for provider payload adapters
pub trait ProviderPayloadAdapter: Send + Sync {
    /// Parse a raw provider response into calendar events
    ///
    /// Cancelled and all-day entries are skipped, never reported as errors.
    fn parse(&self, raw_json: &str) -> Result<Vec<CalendarEvent>, AnalysisError>;
}

/// Adapter for the given provider
pub fn adapter_for(provider: CalendarProvider) -> Box<dyn ProviderPayloadAdapter> {
    match provider {
        CalendarProvider::Google => Box::new(GoogleAdapter),
        CalendarProvider::Outlook => Box::new(OutlookAdapter),
    }
}

fn parse_rfc3339(event_id: &str, value: &str) -> Result<DateTime<FixedOffset>, AnalysisError> {
    DateTime::parse_from_rfc3339(value).map_err(|e| {
        AnalysisError::ParseError(format!("event {event_id}: invalid timestamp {value:?}: {e}"))
    })
}
