//! Periodic calendar analysis scheduler
//!
//! Runs the analysis pipeline for every scheduled identifier at a fixed
//! interval. Each identifier gets its own task; runs never coordinate with
//! each other. Fetch and delivery failures are retried with exponential
//! backoff, other failures are reported as-is.
//!
//! # Example
//!
//! ```ignore
//! let mut scheduler = AnalysisScheduler::new(pipeline, SchedulerConfig::default());
//! scheduler.schedule(["alice@example.com".to_string()]).await;
//! scheduler.start()?;
//! // ... application runs ...
//! scheduler.stop().await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::anonymizer::{anonymize, AnonymizedId};
use crate::error::SchedulerError;
use crate::pipeline::{AnalysisPipeline, AnalysisRequest, PipelineStage, DEFAULT_LOOKBACK_DAYS};

/// Configuration for the analysis scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between two runs; the first run happens one interval after start.
    pub interval: Duration,
    /// Provider selector used for every scheduled identifier
    pub provider: String,
    pub lookback_days: u32,
    /// Total attempts per identifier and run (initial try + retries)
    pub max_attempts: u32,
    /// Delay before the first retry, doubled for each further retry
    pub base_backoff: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
            provider: "google".to_string(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
        }
    }
}

/// Acknowledgement for an identifier added to the schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledTask {
    pub task_id: Uuid,
    pub employee_id: AnonymizedId,
}

/// How a single identifier's run ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Delivered { total_meetings: u32 },
    Failed { stage: PipelineStage, error: String },
}

/// Result of analyzing one identifier during a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub employee_id: AnonymizedId,
    pub attempts: u32,
    #[serde(flatten)]
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn is_delivered(&self) -> bool {
        matches!(self.outcome, RunOutcome::Delivered { .. })
    }
}

/// Periodic scheduler with explicit lifecycle management
pub struct AnalysisScheduler {
    pipeline: Arc<AnalysisPipeline>,
    config: SchedulerConfig,
    identifiers: Arc<RwLock<Vec<String>>>,
    cancellation: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl AnalysisScheduler {
    pub fn new(pipeline: Arc<AnalysisPipeline>, config: SchedulerConfig) -> Self {
        Self {
            pipeline,
            config,
            identifiers: Arc::new(RwLock::new(Vec::new())),
            cancellation: CancellationToken::new(),
            handle: None,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Add identifiers to the schedule
    ///
    /// Every identifier gets a task acknowledgement; identifiers that are
    /// already scheduled are not added twice.
    pub async fn schedule<I>(&self, identifiers: I) -> Vec<ScheduledTask>
    where
        I: IntoIterator<Item = String>,
    {
        let mut scheduled = self.identifiers.write().await;
        let mut tasks = Vec::new();

        for identifier in identifiers {
            let employee_id = anonymize(&identifier);
            if !scheduled.contains(&identifier) {
                scheduled.push(identifier);
            }
            let task = ScheduledTask {
                task_id: Uuid::new_v4(),
                employee_id,
            };
            debug!(task_id = %task.task_id, employee_id = %task.employee_id, "scheduled calendar analysis");
            tasks.push(task);
        }

        tasks
    }

    /// Number of distinct identifiers on the schedule
    pub async fn scheduled_count(&self) -> usize {
        self.identifiers.read().await.len()
    }

    /// Analyze every scheduled identifier now, without waiting for the timer
    pub async fn run_once(&self) -> Vec<RunReport> {
        let identifiers = self.identifiers.read().await.clone();
        run_all(self.pipeline.clone(), self.config.clone(), identifiers).await
    }

    /// Start the periodic loop
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let cancel = self.cancellation.clone();
        let pipeline = self.pipeline.clone();
        let config = self.config.clone();
        let identifiers = self.identifiers.clone();

        let handle = tokio::spawn(async move {
            let interval = config.interval;
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("analysis scheduler cancelled");
                        break;
                    }
                    _ = ticker.tick() => {}
                }

                let snapshot = identifiers.read().await.clone();
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("analysis scheduler cancelled during a run");
                        break;
                    }
                    reports = run_all(pipeline.clone(), config.clone(), snapshot) => {
                        let delivered = reports.iter().filter(|r| r.is_delivered()).count();
                        info!(
                            total = reports.len(),
                            delivered,
                            failed = reports.len() - delivered,
                            "scheduled calendar analysis completed"
                        );
                    }
                }
            }
        });

        self.handle = Some(handle);
        info!(interval_secs = self.config.interval.as_secs(), "analysis scheduler started");
        Ok(())
    }

    /// Stop the periodic loop and wait for it to finish
    pub async fn stop(&mut self) -> Result<(), SchedulerError> {
        let Some(handle) = self.handle.take() else {
            return Err(SchedulerError::NotRunning);
        };

        self.cancellation.cancel();
        handle.await?;

        info!("analysis scheduler stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

async fn run_all(
    pipeline: Arc<AnalysisPipeline>,
    config: SchedulerConfig,
    identifiers: Vec<String>,
) -> Vec<RunReport> {
    if identifiers.is_empty() {
        debug!("no identifiers scheduled for calendar analysis");
        return Vec::new();
    }

    let mut set = JoinSet::new();
    for (index, identifier) in identifiers.into_iter().enumerate() {
        let request = AnalysisRequest::new(identifier, config.provider.clone())
            .with_lookback_days(config.lookback_days);
        let pipeline = pipeline.clone();
        let max_attempts = config.max_attempts;
        let base_backoff = config.base_backoff;

        set.spawn(async move {
            let report = run_with_retry(&pipeline, &request, max_attempts, base_backoff).await;
            (index, report)
        });
    }

    let mut reports = Vec::with_capacity(set.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(entry) => reports.push(entry),
            Err(err) => error!(error = %err, "calendar analysis task failed"),
        }
    }

    reports.sort_by_key(|(index, _)| *index);
    reports.into_iter().map(|(_, report)| report).collect()
}

async fn run_with_retry(
    pipeline: &AnalysisPipeline,
    request: &AnalysisRequest,
    max_attempts: u32,
    base_backoff: Duration,
) -> RunReport {
    let employee_id = anonymize(&request.identifier);
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match pipeline.analyze(request).await {
            Ok(record) => {
                return RunReport {
                    employee_id,
                    attempts: attempt,
                    outcome: RunOutcome::Delivered {
                        total_meetings: record.total_meetings(),
                    },
                };
            }
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = backoff_delay(base_backoff, attempt);
                warn!(
                    %employee_id,
                    attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %err,
                    "calendar analysis failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                return RunReport {
                    employee_id,
                    attempts: attempt,
                    outcome: RunOutcome::Failed {
                        stage: err.stage(),
                        error: err.to_string(),
                    },
                };
            }
        }
    }
}

fn backoff_delay(base: Duration, retry_number: u32) -> Duration {
    let shift = retry_number.saturating_sub(1).min(8);
    base.saturating_mul(1u32 << shift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::AnalysisParams;
    use crate::testing::{event, RecordingSender, StubFetcher};
    use pretty_assertions::assert_eq;

    fn events() -> Vec<crate::types::CalendarEvent> {
        vec![
            event("a", "2024-01-15T09:00:00Z", "2024-01-15T10:00:00Z"),
            event("b", "2024-01-15T10:05:00Z", "2024-01-15T11:00:00Z"),
        ]
    }

    fn scheduler_with(
        fetcher: Arc<StubFetcher>,
        sender: Arc<RecordingSender>,
        config: SchedulerConfig,
    ) -> AnalysisScheduler {
        let pipeline = AnalysisPipeline::new(fetcher, sender, AnalysisParams::default());
        AnalysisScheduler::new(Arc::new(pipeline), config)
    }

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_backoff_delay_doubles() {
        let base = Duration::from_millis(200);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(200));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(400));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(800));
        assert_eq!(backoff_delay(base, 20), Duration::from_millis(200 * 256));
    }

    #[tokio::test]
    async fn test_schedule_returns_task_per_identifier() {
        let scheduler = scheduler_with(
            Arc::new(StubFetcher::returning(events())),
            Arc::new(RecordingSender::default()),
            SchedulerConfig::default(),
        );

        let tasks = scheduler
            .schedule(ids(&["alice@example.com", "bob@example.com", "alice@example.com"]))
            .await;

        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].employee_id, anonymize("alice@example.com"));
        assert_ne!(tasks[0].task_id, tasks[2].task_id);
        assert_eq!(scheduler.scheduled_count().await, 2);
    }

    #[tokio::test]
    async fn test_run_once_fans_out_in_schedule_order() {
        let sender = Arc::new(RecordingSender::default());
        let scheduler = scheduler_with(
            Arc::new(StubFetcher::returning(events())),
            sender.clone(),
            SchedulerConfig::default(),
        );
        scheduler
            .schedule(ids(&["alice@example.com", "bob@example.com", "carol@example.com"]))
            .await;

        let reports = scheduler.run_once().await;

        let employees: Vec<AnonymizedId> = reports.iter().map(|r| r.employee_id.clone()).collect();
        assert_eq!(
            employees,
            vec![
                anonymize("alice@example.com"),
                anonymize("bob@example.com"),
                anonymize("carol@example.com"),
            ]
        );
        for report in &reports {
            assert_eq!(report.attempts, 1);
            assert_eq!(report.outcome, RunOutcome::Delivered { total_meetings: 2 });
        }
        assert_eq!(sender.sent().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_once_retries_fetch_failures() {
        let fetcher = Arc::new(StubFetcher::failing_first(2, events()));
        let scheduler = scheduler_with(
            fetcher.clone(),
            Arc::new(RecordingSender::default()),
            SchedulerConfig {
                max_attempts: 3,
                ..SchedulerConfig::default()
            },
        );
        scheduler.schedule(ids(&["alice@example.com"])).await;

        let started = Instant::now();
        let reports = scheduler.run_once().await;

        assert_eq!(reports.len(), 1);
        assert!(reports[0].is_delivered());
        assert_eq!(reports[0].attempts, 3);
        assert_eq!(fetcher.calls(), 3);
        // 1s before the first retry, 2s before the second
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_once_gives_up_after_max_attempts() {
        let fetcher = Arc::new(StubFetcher::always_failing());
        let scheduler = scheduler_with(
            fetcher.clone(),
            Arc::new(RecordingSender::default()),
            SchedulerConfig {
                max_attempts: 2,
                ..SchedulerConfig::default()
            },
        );
        scheduler.schedule(ids(&["alice@example.com"])).await;

        let reports = scheduler.run_once().await;

        assert_eq!(reports[0].attempts, 2);
        assert!(matches!(
            reports[0].outcome,
            RunOutcome::Failed { stage: PipelineStage::Fetching, .. }
        ));
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_unsupported_provider_is_not_retried() {
        let fetcher = Arc::new(StubFetcher::returning(events()));
        let scheduler = scheduler_with(
            fetcher.clone(),
            Arc::new(RecordingSender::default()),
            SchedulerConfig {
                provider: "icloud".to_string(),
                ..SchedulerConfig::default()
            },
        );
        scheduler.schedule(ids(&["alice@example.com"])).await;

        let reports = scheduler.run_once().await;

        assert_eq!(reports[0].attempts, 1);
        assert!(matches!(
            reports[0].outcome,
            RunOutcome::Failed { stage: PipelineStage::Idle, .. }
        ));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_runs_every_interval_until_stopped() {
        let sender = Arc::new(RecordingSender::default());
        let interval = Duration::from_secs(60);
        let mut scheduler = scheduler_with(
            Arc::new(StubFetcher::returning(events())),
            sender.clone(),
            SchedulerConfig {
                interval,
                ..SchedulerConfig::default()
            },
        );
        scheduler
            .schedule(ids(&["alice@example.com", "bob@example.com"]))
            .await;

        scheduler.start().unwrap();
        assert!(scheduler.is_running());
        assert!(matches!(scheduler.start(), Err(SchedulerError::AlreadyRunning)));

        tokio::time::sleep(interval - Duration::from_millis(1)).await;
        assert!(sender.sent().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(sender.sent().len(), 2);

        tokio::time::sleep(interval).await;
        assert_eq!(sender.sent().len(), 4);

        scheduler.stop().await.unwrap();
        assert!(!scheduler.is_running());
        assert!(matches!(scheduler.stop().await, Err(SchedulerError::NotRunning)));

        tokio::time::sleep(interval * 3).await;
        assert_eq!(sender.sent().len(), 4);
    }
}
