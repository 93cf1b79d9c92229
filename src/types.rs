//! Core types for the calendar analysis pipeline
//!
//! This module defines the data that flows through each stage: calendar events
//! coming in from a provider, and the feature record going out to analytics.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::anonymizer::AnonymizedId;
use crate::error::AnalysisError;
use crate::schema::ValidationError;

/// Calendar provider the events were fetched from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarProvider {
    Google,
    Outlook,
}

impl CalendarProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarProvider::Google => "google",
            CalendarProvider::Outlook => "outlook",
        }
    }

    pub fn all() -> [CalendarProvider; 2] {
        [CalendarProvider::Google, CalendarProvider::Outlook]
    }
}

impl fmt::Display for CalendarProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalendarProvider {
    type Err = AnalysisError;

    /// Only the exact lowercase names are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(CalendarProvider::Google),
            "outlook" => Ok(CalendarProvider::Outlook),
            other => Err(AnalysisError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// A single calendar meeting occurrence
///
/// Instants keep the UTC offset they were normalized to, so wall-clock checks
/// (working hours, weekends) are evaluated in that offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Provider event identifier, unique within a batch
    pub event_id: String,
    /// Meeting start
    pub start_time: DateTime<FixedOffset>,
    /// Meeting end (never before start in a valid event)
    pub end_time: DateTime<FixedOffset>,
    /// Display title
    pub title: String,
    /// Number of invited attendees
    #[serde(default)]
    pub attendees_count: u32,
    /// Whether the event is an occurrence of a recurring series
    #[serde(default)]
    pub is_recurring: bool,
}

impl CalendarEvent {
    pub fn new(
        event_id: impl Into<String>,
        start_time: DateTime<FixedOffset>,
        end_time: DateTime<FixedOffset>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            start_time,
            end_time,
            title: title.into(),
            attendees_count: 0,
            is_recurring: false,
        }
    }

    pub fn with_attendees(mut self, attendees_count: u32) -> Self {
        self.attendees_count = attendees_count;
        self
    }

    pub fn recurring(mut self) -> Self {
        self.is_recurring = true;
        self
    }

    /// Meeting length in hours
    pub fn duration_hours(&self) -> f64 {
        crate::intervals::seconds_between(&self.start_time, &self.end_time) / 3600.0
    }

    /// Check the event invariants
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.event_id.trim().is_empty() {
            return Err(ValidationError::EmptyEventId);
        }

        if self.end_time < self.start_time {
            return Err(ValidationError::EndBeforeStart {
                event_id: self.event_id.clone(),
                start: self.start_time.to_rfc3339(),
                end: self.end_time.to_rfc3339(),
            });
        }

        Ok(())
    }
}

/// Workload features derived from one batch of calendar events
///
/// Built once by the aggregator and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    employee_id: AnonymizedId,
    timestamp: DateTime<Utc>,
    avg_meeting_hours_per_day: f64,
    back_to_back_meetings_count: u32,
    free_time_ratio: f64,
    after_hours_meeting_frequency: u32,
    meeting_load_trend: f64,
    total_meetings: u32,
    longest_meeting_block: f64,
}

/// Metric values of a feature record, before it is stamped
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FeatureValues {
    pub avg_meeting_hours_per_day: f64,
    pub back_to_back_meetings_count: u32,
    pub free_time_ratio: f64,
    pub after_hours_meeting_frequency: u32,
    pub meeting_load_trend: f64,
    pub total_meetings: u32,
    pub longest_meeting_block: f64,
}

impl FeatureValues {
    /// Values reported when there are no events at all
    pub(crate) fn no_data() -> Self {
        Self {
            avg_meeting_hours_per_day: 0.0,
            back_to_back_meetings_count: 0,
            free_time_ratio: 1.0,
            after_hours_meeting_frequency: 0,
            meeting_load_trend: 0.0,
            total_meetings: 0,
            longest_meeting_block: 0.0,
        }
    }
}

impl FeatureRecord {
    pub(crate) fn new(
        employee_id: AnonymizedId,
        timestamp: DateTime<Utc>,
        values: FeatureValues,
    ) -> Self {
        Self {
            employee_id,
            timestamp,
            avg_meeting_hours_per_day: values.avg_meeting_hours_per_day,
            back_to_back_meetings_count: values.back_to_back_meetings_count,
            free_time_ratio: values.free_time_ratio,
            after_hours_meeting_frequency: values.after_hours_meeting_frequency,
            meeting_load_trend: values.meeting_load_trend,
            total_meetings: values.total_meetings,
            longest_meeting_block: values.longest_meeting_block,
        }
    }

    /// Pseudonymous employee identifier
    pub fn employee_id(&self) -> &AnonymizedId {
        &self.employee_id
    }

    /// When the record was computed
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn avg_meeting_hours_per_day(&self) -> f64 {
        self.avg_meeting_hours_per_day
    }

    pub fn back_to_back_meetings_count(&self) -> u32 {
        self.back_to_back_meetings_count
    }

    /// Share of the work-hours budget not spent in meetings (0-1)
    pub fn free_time_ratio(&self) -> f64 {
        self.free_time_ratio
    }

    pub fn after_hours_meeting_frequency(&self) -> u32 {
        self.after_hours_meeting_frequency
    }

    /// Percentage change of average meeting length, second half vs first half
    pub fn meeting_load_trend(&self) -> f64 {
        self.meeting_load_trend
    }

    pub fn total_meetings(&self) -> u32 {
        self.total_meetings
    }

    /// Longest continuous meeting block (hours)
    pub fn longest_meeting_block(&self) -> f64 {
        self.longest_meeting_block
    }
}

/// Payload sent to the central analytics API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePayload {
    pub employee_id: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    /// Flat metric name to value mapping
    pub features: BTreeMap<String, f64>,
}
