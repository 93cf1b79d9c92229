//! Event batch validation

use std::collections::HashSet;

use crate::types::CalendarEvent;

/// Validation errors for calendar events
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Event {event_id} ends ({end}) before it starts ({start})")]
    EndBeforeStart {
        event_id: String,
        start: String,
        end: String,
    },

    #[error("Event identifier is empty")]
    EmptyEventId,

    #[error("Duplicate event identifier: {0}")]
    DuplicateEventId(String),
}

/// Validation outcome for one event of a batch
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub event_id: Option<String>,
    pub error: ValidationError,
}

/// Validate every event of a batch, returning only the failures
///
/// Besides the per-event checks, event identifiers must be unique within the
/// batch; every repeat after the first occurrence is reported.
pub fn validate_events(events: &[CalendarEvent]) -> Vec<ValidationResult> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut failures = Vec::new();

    for (index, event) in events.iter().enumerate() {
        let event_id = (!event.event_id.trim().is_empty()).then(|| event.event_id.clone());

        if let Err(error) = event.validate() {
            failures.push(ValidationResult {
                index,
                event_id,
                error,
            });
            continue;
        }

        if !seen.insert(event.event_id.as_str()) {
            failures.push(ValidationResult {
                index,
                event_id,
                error: ValidationError::DuplicateEventId(event.event_id.clone()),
            });
        }
    }

    failures
}
