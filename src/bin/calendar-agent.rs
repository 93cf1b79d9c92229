//! Calendar Agent CLI - Command-line interface for the calendar agent
//!
//! Commands:
//! - analyze: Compute features from a local event file (batch mode)
//! - run: Fetch, analyze and deliver features for one identifier
//! - schedule: Analyze identifiers periodically (or once)
//! - validate: Validate canonical event input
//! - anonymize: Print the pseudonymous handle for an identifier
//! - doctor: Diagnose configuration and environment
//! - schema: Print input/output schema information

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use calendar_agent::adapters::adapter_for;
use calendar_agent::config::AgentConfig;
use calendar_agent::encoder::{FeatureEncoder, FEATURE_NAMES};
use calendar_agent::error::{ConfigError, DeliveryError, SchedulerError};
use calendar_agent::fetcher::PayloadDirFetcher;
use calendar_agent::scheduler::AnalysisScheduler;
use calendar_agent::schema::{validate_events, EventReader};
use calendar_agent::sender::HttpFeatureSender;
use calendar_agent::types::CalendarEvent;
use calendar_agent::{
    anonymize, AnalysisError, AnalysisParams, AnalysisPipeline, AnalysisRequest,
    CalendarProvider, FeatureAggregator, PipelineError, AGENT_VERSION, SOURCE_NAME,
};

/// Calendar Agent - Anonymized workload features from calendar events
#[derive(Parser)]
#[command(name = "calendar-agent")]
#[command(version = AGENT_VERSION)]
#[command(about = "Turn calendar events into anonymized workload features", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute features from a local event file (batch mode)
    Analyze {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Raw identifier of the calendar owner (anonymized before output)
        #[arg(long)]
        identifier: String,

        /// Daily work-hours budget (defaults to STANDARD_WORK_HOURS)
        #[arg(long)]
        work_hours: Option<f64>,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,
    },

    /// Fetch, analyze and deliver features for one identifier
    Run {
        /// Raw identifier of the calendar owner
        #[arg(long)]
        identifier: String,

        /// Calendar provider (defaults to CALENDAR_PROVIDER)
        #[arg(long)]
        provider: Option<String>,

        /// Days of history to analyze (defaults to ANALYSIS_DAYS_BACK)
        #[arg(long)]
        lookback_days: Option<u32>,
    },

    /// Analyze identifiers periodically until interrupted
    Schedule {
        /// Raw identifiers to analyze (repeatable)
        #[arg(long = "identifier", required = true)]
        identifiers: Vec<String>,

        /// Run a single round immediately and exit
        #[arg(long)]
        once: bool,
    },

    /// Validate canonical event input
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: EventFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the pseudonymous handle for an identifier
    Anonymize {
        identifier: String,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum EventFormat {
    /// JSON array of canonical events
    Json,
    /// Newline-delimited JSON (one canonical event per line)
    Ndjson,
}

#[derive(Clone, Copy, ValueEnum)]
enum InputFormat {
    /// JSON array of canonical events
    Json,
    /// Newline-delimited JSON (one canonical event per line)
    Ndjson,
    /// Google Calendar events.list response
    Google,
    /// Microsoft Graph calendarView response
    Outlook,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (canonical calendar event)
    Input,
    /// Output schema (feature payload)
    Output,
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let config = AgentConfig::from_env();
    init_tracing(
        config
            .as_ref()
            .map(|c| c.log_level.as_str())
            .unwrap_or("info"),
    );

    let cli = Cli::parse();

    match run(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(log_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run(cli: Cli, config: Result<AgentConfig, ConfigError>) -> Result<(), AgentCliError> {
    match cli.command {
        Commands::Analyze {
            input,
            input_format,
            identifier,
            work_hours,
            output,
        } => {
            let params = match work_hours {
                Some(work_hours) => AnalysisParams { work_hours },
                None => config?.analysis_params(),
            };
            params.validate()?;
            cmd_analyze(&input, input_format, &identifier, params, &output)
        }
        Commands::Run {
            identifier,
            provider,
            lookback_days,
        } => cmd_run(config?, identifier, provider, lookback_days),
        Commands::Schedule { identifiers, once } => cmd_schedule(config?, identifiers, once),
        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),
        Commands::Anonymize { identifier } => {
            println!("{}", anonymize(&identifier));
            Ok(())
        }
        Commands::Doctor { json } => cmd_doctor(config, json),
        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

fn cmd_analyze(
    input: &Path,
    input_format: InputFormat,
    identifier: &str,
    params: AnalysisParams,
    output: &Path,
) -> Result<(), AgentCliError> {
    let input_data = read_input(input)?;

    let events: Vec<CalendarEvent> = match input_format {
        InputFormat::Json => EventReader::parse_array(&input_data)?,
        InputFormat::Ndjson => EventReader::parse_ndjson(&input_data)?,
        InputFormat::Google => adapter_for(CalendarProvider::Google).parse(&input_data)?,
        InputFormat::Outlook => adapter_for(CalendarProvider::Outlook).parse(&input_data)?,
    };

    let record = FeatureAggregator::new(params).aggregate(&events, identifier)?;
    let output_data = FeatureEncoder::new().encode_to_json(&record)?;

    if output.to_string_lossy() == "-" {
        println!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn build_pipeline(config: &AgentConfig) -> Result<AnalysisPipeline, AgentCliError> {
    let fetcher = PayloadDirFetcher::new(config.events_dir.clone());
    let sender = HttpFeatureSender::new(config.central_api_url.clone(), config.request_timeout())?;
    Ok(AnalysisPipeline::new(
        Arc::new(fetcher),
        Arc::new(sender),
        config.analysis_params(),
    ))
}

fn runtime() -> Result<tokio::runtime::Runtime, AgentCliError> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

fn cmd_run(
    config: AgentConfig,
    identifier: String,
    provider: Option<String>,
    lookback_days: Option<u32>,
) -> Result<(), AgentCliError> {
    let pipeline = build_pipeline(&config)?;
    let request = AnalysisRequest::new(
        identifier,
        provider.unwrap_or_else(|| config.calendar_provider.clone()),
    )
    .with_lookback_days(lookback_days.unwrap_or(config.analysis_days_back));

    let record = runtime()?.block_on(pipeline.analyze(&request))?;
    println!("{}", FeatureEncoder::new().encode_to_json(&record)?);
    Ok(())
}

fn cmd_schedule(
    config: AgentConfig,
    identifiers: Vec<String>,
    once: bool,
) -> Result<(), AgentCliError> {
    let pipeline = Arc::new(build_pipeline(&config)?);
    let mut scheduler = AnalysisScheduler::new(pipeline, config.scheduler_config());

    runtime()?.block_on(async move {
        let tasks = scheduler.schedule(identifiers).await;

        if once {
            let reports = scheduler.run_once().await;
            println!("{}", serde_json::to_string_pretty(&reports)?);
            let failed = reports.iter().filter(|r| !r.is_delivered()).count();
            return if failed > 0 {
                Err(AgentCliError::RunFailed(failed))
            } else {
                Ok(())
            };
        }

        println!("{}", serde_json::to_string_pretty(&tasks)?);
        scheduler.start()?;
        tokio::signal::ctrl_c().await?;
        scheduler.stop().await?;
        Ok::<(), AgentCliError>(())
    })
}

fn cmd_validate(input: &Path, input_format: EventFormat, json: bool) -> Result<(), AgentCliError> {
    let input_data = read_input(input)?;

    let events = match input_format {
        EventFormat::Json => EventReader::parse_array(&input_data)?,
        EventFormat::Ndjson => EventReader::parse_ndjson(&input_data)?,
    };

    let results = validate_events(&events);

    let report = ValidationReport {
        total_events: events.len(),
        valid_events: events.len() - results.len(),
        invalid_events: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                event_id: r.event_id.clone(),
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total events:   {}", report.total_events);
        println!("Valid events:   {}", report.valid_events);
        println!("Invalid events: {}", report.invalid_events);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Event {} (index {}): {}",
                    err.event_id.as_deref().unwrap_or("unknown"),
                    err.index,
                    err.error
                );
            }
        }
    }

    if report.invalid_events > 0 {
        Err(AgentCliError::ValidationFailed(report.invalid_events))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config: Result<AgentConfig, ConfigError>, json: bool) -> Result<(), AgentCliError> {
    let report = DoctorReport {
        source: SOURCE_NAME.to_string(),
        version: AGENT_VERSION.to_string(),
        checks: doctor_checks(&config),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Calendar Agent Doctor Report");
        println!("============================");
        println!("Source:  {}", report.source);
        println!("Version: {}", report.version);
        println!("\nChecks:");
        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(AgentCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn doctor_checks(config: &Result<AgentConfig, ConfigError>) -> Vec<DoctorCheck> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "agent_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Calendar agent version {}", AGENT_VERSION),
    });

    match config {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Provider {}, {} days back, {} work hours, every {} min",
                    config.calendar_provider,
                    config.analysis_days_back,
                    config.standard_work_hours,
                    config.scraping_interval_minutes
                ),
            });

            checks.push(DoctorCheck {
                name: "central_api_url".to_string(),
                status: if config.central_api_url.starts_with("http://")
                    || config.central_api_url.starts_with("https://")
                {
                    CheckStatus::Ok
                } else {
                    CheckStatus::Warning
                },
                message: format!(
                    "{} (timeout {}s)",
                    config.central_api_url, config.request_timeout_secs
                ),
            });

            let provider_dir = config.events_dir.join(&config.calendar_provider);
            checks.push(if provider_dir.is_dir() {
                DoctorCheck {
                    name: "events_dir".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("Reading payloads from {}", provider_dir.display()),
                }
            } else {
                DoctorCheck {
                    name: "events_dir".to_string(),
                    status: CheckStatus::Warning,
                    message: format!(
                        "{} does not exist; every run will report no meetings",
                        provider_dir.display()
                    ),
                }
            });
        }
        Err(e) => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            });
        }
    }

    checks
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), AgentCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", get_input_json_schema());
            } else {
                println!("Input Schema: calendar event");
                println!();
                println!("Each event is one meeting occurrence:");
                println!();
                println!("- event_id: Identifier, unique within a batch");
                println!("- start_time, end_time: RFC 3339 instants with offset (end >= start)");
                println!("- title: Display title");
                println!("- attendees_count: Invited attendees (default 0)");
                println!("- is_recurring: Part of a recurring series (default false)");
                println!();
                println!("Working hours are 09:00-18:00 on weekdays, evaluated in each");
                println!("event's own UTC offset.");
                println!();
                println!("Provider payloads: google (events.list), outlook (Graph calendarView)");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", get_output_json_schema());
            } else {
                println!("Output Schema: feature payload");
                println!();
                println!("- employee_id: 16-hex-character pseudonymous handle");
                println!("- timestamp: UTC computation time");
                println!("- source: {}", SOURCE_NAME);
                println!("- features:");
                for name in FEATURE_NAMES {
                    println!("  - {}", name);
                }
            }
        }
    }
    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, AgentCliError> {
    if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            return Err(AgentCliError::StdinIsTerminal);
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn get_input_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "calendar_event",
        "description": "Canonical calendar event",
        "type": "object",
        "required": ["event_id", "start_time", "end_time", "title"],
        "properties": {
            "event_id": { "type": "string", "minLength": 1 },
            "start_time": { "type": "string", "format": "date-time" },
            "end_time": { "type": "string", "format": "date-time" },
            "title": { "type": "string" },
            "attendees_count": { "type": "integer", "minimum": 0, "default": 0 },
            "is_recurring": { "type": "boolean", "default": false }
        }
    })
    .to_string()
}

fn get_output_json_schema() -> String {
    let features: serde_json::Map<String, serde_json::Value> = FEATURE_NAMES
        .iter()
        .map(|name| (name.to_string(), serde_json::json!({ "type": "number" })))
        .collect();

    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "calendar_features",
        "description": "Anonymized calendar workload features",
        "type": "object",
        "required": ["employee_id", "timestamp", "source", "features"],
        "properties": {
            "employee_id": { "type": "string", "pattern": "^[0-9a-f]{16}$" },
            "timestamp": { "type": "string", "format": "date-time" },
            "source": { "type": "string", "const": SOURCE_NAME },
            "features": {
                "type": "object",
                "required": FEATURE_NAMES,
                "properties": features
            }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum AgentCliError {
    Io(io::Error),
    Analysis(AnalysisError),
    Json(serde_json::Error),
    Config(ConfigError),
    Pipeline(PipelineError),
    Delivery(DeliveryError),
    Scheduler(SchedulerError),
    ValidationFailed(usize),
    RunFailed(usize),
    StdinIsTerminal,
    DoctorFailed,
}

impl From<io::Error> for AgentCliError {
    fn from(e: io::Error) -> Self {
        AgentCliError::Io(e)
    }
}

impl From<AnalysisError> for AgentCliError {
    fn from(e: AnalysisError) -> Self {
        AgentCliError::Analysis(e)
    }
}

impl From<serde_json::Error> for AgentCliError {
    fn from(e: serde_json::Error) -> Self {
        AgentCliError::Json(e)
    }
}

impl From<ConfigError> for AgentCliError {
    fn from(e: ConfigError) -> Self {
        AgentCliError::Config(e)
    }
}

impl From<PipelineError> for AgentCliError {
    fn from(e: PipelineError) -> Self {
        AgentCliError::Pipeline(e)
    }
}

impl From<DeliveryError> for AgentCliError {
    fn from(e: DeliveryError) -> Self {
        AgentCliError::Delivery(e)
    }
}

impl From<SchedulerError> for AgentCliError {
    fn from(e: SchedulerError) -> Self {
        AgentCliError::Scheduler(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<AgentCliError> for CliError {
    fn from(e: AgentCliError) -> Self {
        match e {
            AgentCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            AgentCliError::Analysis(AnalysisError::InvalidEvent(e)) => CliError {
                code: "VALIDATION_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'calendar-agent validate' for details".to_string()),
            },
            AgentCliError::Analysis(e @ AnalysisError::InvalidParams(_)) => CliError {
                code: "PARAM_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Pass a positive --work-hours or fix STANDARD_WORK_HOURS".to_string()),
            },
            AgentCliError::Analysis(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Ensure input matches the selected --input-format".to_string()),
            },
            AgentCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            AgentCliError::Config(e) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check the environment or .env file".to_string()),
            },
            AgentCliError::Pipeline(e) => CliError {
                code: format!("PIPELINE_{}", e.stage().as_str().to_uppercase()),
                message: e.to_string(),
                hint: Some(
                    if e.is_retryable() {
                        "Transient failure; retry later or use 'schedule' for automatic retries"
                    } else {
                        "Check the provider name and calendar payload"
                    }
                    .to_string(),
                ),
            },
            AgentCliError::Delivery(e) => CliError {
                code: "DELIVERY_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check CENTRAL_API_URL and REQUEST_TIMEOUT_SECS".to_string()),
            },
            AgentCliError::Scheduler(e) => CliError {
                code: "SCHEDULER_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            AgentCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} events failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            AgentCliError::RunFailed(count) => CliError {
                code: "RUN_FAILED".to_string(),
                message: format!("{} identifiers could not be analyzed", count),
                hint: Some("Review the run report for details".to_string()),
            },
            AgentCliError::StdinIsTerminal => CliError {
                code: "STDIN_IS_TERMINAL".to_string(),
                message: "No input piped to stdin".to_string(),
                hint: Some("Pipe events into '-i -' or pass a file path".to_string()),
            },
            AgentCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_events: usize,
    valid_events: usize,
    invalid_events: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    event_id: Option<String>,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    source: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
