//! In-memory collaborators shared by unit tests

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::DateTime;
use tracing_subscriber::fmt::MakeWriter;

use crate::error::{DeliveryError, FetchError};
use crate::fetcher::{AnalysisWindow, EventFetcher};
use crate::sender::FeatureSender;
use crate::types::{CalendarEvent, CalendarProvider, FeatureRecord};

pub(crate) fn event(id: &str, start: &str, end: &str) -> CalendarEvent {
    CalendarEvent::new(
        id,
        DateTime::parse_from_rfc3339(start).unwrap(),
        DateTime::parse_from_rfc3339(end).unwrap(),
        id,
    )
}

/// Fetcher returning a fixed batch, optionally failing the first calls
pub(crate) struct StubFetcher {
    events: Vec<CalendarEvent>,
    failures_before_success: usize,
    calls: AtomicUsize,
}

impl StubFetcher {
    pub(crate) fn returning(events: Vec<CalendarEvent>) -> Self {
        Self::failing_first(0, events)
    }

    pub(crate) fn failing_first(failures: usize, events: Vec<CalendarEvent>) -> Self {
        Self {
            events,
            failures_before_success: failures,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn always_failing() -> Self {
        Self::failing_first(usize::MAX, Vec::new())
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventFetcher for StubFetcher {
    async fn fetch(
        &self,
        _identifier: &str,
        _provider: CalendarProvider,
        _window: &AnalysisWindow,
    ) -> Result<Vec<CalendarEvent>, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures_before_success {
            return Err(FetchError::Upstream("calendar API unavailable".to_string()));
        }
        Ok(self.events.clone())
    }
}

/// Sender keeping every delivered record in memory
#[derive(Default)]
pub(crate) struct RecordingSender {
    fail: bool,
    sent: Mutex<Vec<FeatureRecord>>,
}

impl RecordingSender {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn sent(&self) -> Vec<FeatureRecord> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeatureSender for RecordingSender {
    async fn send(&self, record: &FeatureRecord) -> Result<(), DeliveryError> {
        if self.fail {
            return Err(DeliveryError::Status {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        self.sent.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Log sink collecting formatted tracing output
#[derive(Clone, Default)]
pub(crate) struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub(crate) fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
        tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish()
    }

    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
