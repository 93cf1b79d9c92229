//! Event retrieval
//!
//! The pipeline talks to calendar providers only through [`EventFetcher`].
//! [`PayloadDirFetcher`] is the bundled implementation: it reads provider
//! responses that were already downloaded to disk, laid out as
//! `<root>/<provider>/<identifier>.json`.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use tracing::{info, warn};

use crate::adapters::adapter_for;
use crate::anonymizer::anonymize;
use crate::error::FetchError;
use crate::types::{CalendarEvent, CalendarProvider};

/// Half-open time window `[start, end)` events are fetched for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl AnalysisWindow {
    /// Window covering the `days` days before `end`
    ///
    /// Returns `None` when the start would fall outside the representable
    /// date range.
    pub fn lookback(end: DateTime<Utc>, days: u32) -> Option<Self> {
        let start = end.checked_sub_signed(Duration::days(i64::from(days)))?;
        Some(Self { start, end })
    }

    pub fn contains(&self, instant: &DateTime<FixedOffset>) -> bool {
        let instant = instant.with_timezone(&Utc);
        self.start <= instant && instant < self.end
    }
}

/// Source of calendar events for one identifier
#[async_trait]
pub trait EventFetcher: Send + Sync {
    async fn fetch(
        &self,
        identifier: &str,
        provider: CalendarProvider,
        window: &AnalysisWindow,
    ) -> Result<Vec<CalendarEvent>, FetchError>;
}

/// Fetcher reading provider payloads from a directory tree
#[derive(Debug, Clone)]
pub struct PayloadDirFetcher {
    root: PathBuf,
}

impl PayloadDirFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the payload for an identifier
    pub fn payload_path(&self, identifier: &str, provider: CalendarProvider) -> PathBuf {
        self.root
            .join(provider.as_str())
            .join(format!("{identifier}.json"))
    }
}

#[async_trait]
impl EventFetcher for PayloadDirFetcher {
    async fn fetch(
        &self,
        identifier: &str,
        provider: CalendarProvider,
        window: &AnalysisWindow,
    ) -> Result<Vec<CalendarEvent>, FetchError> {
        if identifier.is_empty()
            || identifier.contains(['/', '\\'])
            || identifier.starts_with('.')
        {
            return Err(FetchError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "identifier cannot name a payload file",
            )));
        }

        let path = self.payload_path(identifier, provider);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(
                    employee_id = %anonymize(identifier),
                    %provider,
                    dir = %self.root.display(),
                    "no calendar payload found"
                );
                return Ok(Vec::new());
            }
            Err(e) => return Err(FetchError::Io(e)),
        };

        let parsed = adapter_for(provider).parse(&raw)?;
        let total = parsed.len();
        let events: Vec<CalendarEvent> = parsed
            .into_iter()
            .filter(|event| window.contains(&event.start_time))
            .collect();

        info!(
            %provider,
            fetched = events.len(),
            outside_window = total - events.len(),
            "fetched calendar events"
        );

        Ok(events)
    }
}
