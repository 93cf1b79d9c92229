//! Pipeline orchestration
//!
//! This module provides the public API of the calendar agent. It orchestrates
//! a run from event retrieval to feature delivery:
//!
//! `Idle → Fetching → Analyzing → Delivered | Failed`

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::adapters::adapter_for;
use crate::aggregator::{AnalysisParams, FeatureAggregator};
use crate::anonymizer::anonymize;
use crate::encoder::FeatureEncoder;
use crate::error::{AnalysisError, PipelineError};
use crate::fetcher::{AnalysisWindow, EventFetcher};
use crate::schema::EventReader;
use crate::sender::FeatureSender;
use crate::types::{CalendarProvider, FeatureRecord};

/// Days of history analyzed when a request does not say otherwise
pub const DEFAULT_LOOKBACK_DAYS: u32 = 7;

/// Longest history a single request may cover
pub const MAX_LOOKBACK_DAYS: u32 = 3660;

/// Stage of a single pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    Fetching,
    Analyzing,
    Delivered,
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Fetching => "fetching",
            PipelineStage::Analyzing => "analyzing",
            PipelineStage::Delivered => "delivered",
            PipelineStage::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_lookback_days() -> u32 {
    DEFAULT_LOOKBACK_DAYS
}

/// A request to analyze one person's calendar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Raw personal identifier (e.g. an email address), never logged
    pub identifier: String,
    /// Provider selector, `"google"` or `"outlook"`
    pub provider: String,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
}

impl AnalysisRequest {
    pub fn new(identifier: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            provider: provider.into(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }

    pub fn with_lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = days;
        self
    }
}

/// Analyze a JSON array of canonical events and return the encoded payload.
///
/// # Example
/// ```ignore
/// let payload_json = analyze_events_to_json(
///     events_json,
///     "alice@example.com",
///     AnalysisParams::default(),
/// )?;
/// ```
pub fn analyze_events_to_json(
    events_json: &str,
    raw_identifier: &str,
    params: AnalysisParams,
) -> Result<String, AnalysisError> {
    let events = EventReader::parse_array(events_json)?;
    let record = FeatureAggregator::new(params).aggregate(&events, raw_identifier)?;
    FeatureEncoder::new().encode_to_json(&record)
}

/// Analyze a raw provider response and return the encoded payload.
///
/// Pipeline stages:
/// 1. ProviderPayloadAdapter - Parse the provider response into events
/// 2. FeatureAggregator - Compute the workload features
/// 3. FeatureEncoder - Encode to the analytics payload
pub fn analyze_provider_payload(
    raw_json: &str,
    provider: &str,
    raw_identifier: &str,
    params: AnalysisParams,
) -> Result<String, AnalysisError> {
    let provider: CalendarProvider = provider.parse()?;
    let events = adapter_for(provider).parse(raw_json)?;
    let record = FeatureAggregator::new(params).aggregate(&events, raw_identifier)?;
    FeatureEncoder::new().encode_to_json(&record)
}

/// Fetch, analyze and deliver features for one identifier at a time.
///
/// The pipeline holds no per-run state; concurrent calls are independent.
pub struct AnalysisPipeline {
    fetcher: Arc<dyn EventFetcher>,
    sender: Arc<dyn FeatureSender>,
    aggregator: FeatureAggregator,
}

impl AnalysisPipeline {
    pub fn new(
        fetcher: Arc<dyn EventFetcher>,
        sender: Arc<dyn FeatureSender>,
        params: AnalysisParams,
    ) -> Self {
        Self {
            fetcher,
            sender,
            aggregator: FeatureAggregator::new(params),
        }
    }

    pub fn params(&self) -> &AnalysisParams {
        self.aggregator.params()
    }

    /// Run the pipeline for one request
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<FeatureRecord, PipelineError> {
        self.analyze_at(request, Utc::now()).await
    }

    /// Run the pipeline with an explicit "now"
    ///
    /// The analysis window ends at `now`, and the record is stamped with it.
    pub async fn analyze_at(
        &self,
        request: &AnalysisRequest,
        now: DateTime<Utc>,
    ) -> Result<FeatureRecord, PipelineError> {
        let employee_id = anonymize(&request.identifier);

        let result = self.run(request, now).await;
        match &result {
            Ok(record) => info!(
                %employee_id,
                stage = %PipelineStage::Delivered,
                total_meetings = record.total_meetings(),
                "calendar analysis delivered"
            ),
            Err(err @ PipelineError::Delivery(_)) => error!(
                %employee_id,
                stage = %PipelineStage::Failed,
                failed_during = %err.stage(),
                error = %err,
                "calendar analysis failed"
            ),
            Err(err) => warn!(
                %employee_id,
                stage = %PipelineStage::Failed,
                failed_during = %err.stage(),
                error = %err,
                "calendar analysis failed"
            ),
        }
        result
    }

    async fn run(
        &self,
        request: &AnalysisRequest,
        now: DateTime<Utc>,
    ) -> Result<FeatureRecord, PipelineError> {
        let provider: CalendarProvider = request
            .provider
            .parse()
            .map_err(|_| PipelineError::UnsupportedProvider(request.provider.clone()))?;

        if request.lookback_days > MAX_LOOKBACK_DAYS {
            return Err(PipelineError::InvalidRequest(format!(
                "lookback of {} days exceeds {MAX_LOOKBACK_DAYS}",
                request.lookback_days
            )));
        }
        let window = AnalysisWindow::lookback(now, request.lookback_days).ok_or_else(|| {
            PipelineError::InvalidRequest(format!(
                "lookback of {} days is outside the supported date range",
                request.lookback_days
            ))
        })?;

        debug!(stage = %PipelineStage::Fetching, %provider, "pipeline stage");
        let events = self
            .fetcher
            .fetch(&request.identifier, provider, &window)
            .await?;

        debug!(stage = %PipelineStage::Analyzing, events = events.len(), "pipeline stage");
        let record = self
            .aggregator
            .aggregate_at(&events, &request.identifier, now)?;

        self.sender.send(&record).await?;
        debug!(stage = %PipelineStage::Delivered, "pipeline stage");

        Ok(record)
    }
}
