//! Feature payload encoding
//!
//! This module encodes feature records into the flat JSON payload accepted by
//! the central analytics API.

use std::collections::BTreeMap;

use crate::error::AnalysisError;
use crate::types::{FeaturePayload, FeatureRecord};
use crate::SOURCE_NAME;

/// Names of the features carried by every payload, in wire order
pub const FEATURE_NAMES: [&str; 7] = [
    "avg_meeting_hours_per_day",
    "back_to_back_meetings_count",
    "free_time_ratio",
    "after_hours_meeting_frequency",
    "meeting_load_trend",
    "total_meetings",
    "longest_meeting_block",
];

/// Encoder for analytics payloads
pub struct FeatureEncoder {
    source: String,
}

impl Default for FeatureEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureEncoder {
    pub fn new() -> Self {
        Self {
            source: SOURCE_NAME.to_string(),
        }
    }

    /// Create an encoder reporting a different source name
    pub fn with_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Encode a feature record into a payload
    pub fn encode(&self, record: &FeatureRecord) -> FeaturePayload {
        let values = [
            record.avg_meeting_hours_per_day(),
            f64::from(record.back_to_back_meetings_count()),
            record.free_time_ratio(),
            f64::from(record.after_hours_meeting_frequency()),
            record.meeting_load_trend(),
            f64::from(record.total_meetings()),
            record.longest_meeting_block(),
        ];

        let features: BTreeMap<String, f64> = FEATURE_NAMES
            .iter()
            .zip(values)
            .map(|(name, value)| (name.to_string(), value))
            .collect();

        FeaturePayload {
            employee_id: record.employee_id().to_string(),
            timestamp: record.timestamp(),
            source: self.source.clone(),
            features,
        }
    }

    /// Encode to JSON string
    pub fn encode_to_json(&self, record: &FeatureRecord) -> Result<String, AnalysisError> {
        let payload = self.encode(record);
        serde_json::to_string_pretty(&payload).map_err(AnalysisError::JsonError)
    }
}
