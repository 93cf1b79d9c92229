//! Readers for canonical event batches

use crate::error::AnalysisError;
use crate::types::CalendarEvent;

/// Reader for batches of canonical calendar events
pub struct EventReader;

impl EventReader {
    /// Parse a JSON string containing an array of events
    pub fn parse_array(json: &str) -> Result<Vec<CalendarEvent>, AnalysisError> {
        let events: Vec<CalendarEvent> = serde_json::from_str(json)?;
        Ok(events)
    }

    /// Parse NDJSON (one event per line, blank lines ignored)
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<CalendarEvent>, AnalysisError> {
        let mut events = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<CalendarEvent>(trimmed) {
                Ok(event) => events.push(event),
                Err(e) => {
                    return Err(AnalysisError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(events)
    }
}
