//! Calendar Agent - Anonymized workload features from calendar events
//!
//! The agent turns a person's meetings into a small set of workload indicators
//! through a deterministic pipeline: provider adaptation → interval analysis →
//! metric calculation → feature aggregation → payload encoding. Identities are
//! replaced by a stable pseudonymous handle before anything leaves the agent.
//!
//! ## Modules
//!
//! - **Engine**: `anonymizer`, `intervals`, `features` and `aggregator` are pure
//!   and synchronous
//! - **Pipeline**: `pipeline` runs fetch → analyze → send against the `fetcher`
//!   and `sender` collaborators; `scheduler` repeats it periodically

pub mod adapters;
pub mod aggregator;
pub mod anonymizer;
pub mod config;
pub mod encoder;
pub mod error;
pub mod features;
pub mod fetcher;
pub mod intervals;
pub mod pipeline;
pub mod scheduler;
pub mod schema;
pub mod sender;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::{aggregate, AnalysisParams, FeatureAggregator};
pub use anonymizer::{anonymize, AnonymizedId};
pub use config::AgentConfig;
pub use error::{AnalysisError, PipelineError};
pub use pipeline::{
    analyze_events_to_json, analyze_provider_payload, AnalysisPipeline, AnalysisRequest,
    PipelineStage,
};
pub use types::{CalendarEvent, CalendarProvider, FeaturePayload, FeatureRecord};

/// Agent version reported by the CLI
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Source name stamped on every feature payload
pub const SOURCE_NAME: &str = "calendar_agent";
