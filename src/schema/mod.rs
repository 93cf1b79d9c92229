//! Canonical calendar event input
//!
//! This module reads already-normalized calendar events (the `CalendarEvent`
//! JSON shape) from arrays or newline-delimited JSON, and validates batches
//! before they reach the analytics engine.

mod reader;
mod validation;

pub use reader::*;
pub use validation::*;
