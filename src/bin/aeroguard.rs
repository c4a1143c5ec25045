//! AeroGuard CLI - Command-line interface for AeroGuard Prep
//!
//! Commands:
//! - forecast: Fit and persist scaler params, emit forecast training windows
//! - risk: Emit labeled daily aggregates for the risk classifier
//! - score: Score an exposure profile
//! - validate: Validate measurement rows
//! - doctor: Check persisted artifacts and configuration

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use aeroguard_prep::pipeline::{forecast_feature_names, limit_history};
use aeroguard_prep::schema::RawMeasurement;
use aeroguard_prep::types::{EntitySeries, ExposureProfile};
use aeroguard_prep::{
    prepare_classification_dataset, prepare_forecast_dataset, ClassifierMetadata, ExposureScorer,
    MeasurementAdapter, PrepConfig, PrepError, ScalerParams, PREP_VERSION, PRODUCER_NAME,
    SCHEMA_VERSION,
};

/// AeroGuard - Feature preparation for air-quality forecasting and health risk
#[derive(Parser)]
#[command(name = "aeroguard")]
#[command(author = "AeroGuard AI")]
#[command(version = PREP_VERSION)]
#[command(about = "Prepare sensor data for AQI forecasting and health-risk models", long_about = None)]
struct Cli {
    /// Settings file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit scaler params and emit forecast training windows
    Forecast {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for windows (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Historical steps per window
        #[arg(long)]
        lookback: Option<usize>,

        /// Future steps per window
        #[arg(long)]
        horizon: Option<usize>,

        /// Days of history to keep, counted back from the newest row
        #[arg(long)]
        history_days: Option<u32>,

        /// Directory for the persisted scaler params
        #[arg(long)]
        models_dir: Option<PathBuf>,

        /// Write a run report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Emit labeled daily aggregates for the risk classifier
    Risk {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for aggregates (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Days of history to keep, counted back from the newest row
        #[arg(long)]
        history_days: Option<u32>,

        /// Write a run report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Score an exposure profile (JSON object)
    Score {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Pretty-print the scores
        #[arg(long)]
        pretty: bool,
    },

    /// Validate measurement rows
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check persisted artifacts and configuration
    Doctor {
        /// Directory holding persisted artifacts
        #[arg(long)]
        models_dir: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one row per line)
    Ndjson,
    /// JSON array of rows
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PrepCliError> {
    let config = match &cli.config {
        Some(path) => PrepConfig::load(path)?,
        None => PrepConfig::default(),
    };

    match cli.command {
        Commands::Forecast {
            input,
            output,
            input_format,
            output_format,
            lookback,
            horizon,
            history_days,
            models_dir,
            report,
        } => {
            let config = PrepConfig {
                lookback: lookback.unwrap_or(config.lookback),
                horizon: horizon.unwrap_or(config.horizon),
                history_days: history_days.unwrap_or(config.history_days),
                models_dir: models_dir.unwrap_or(config.models_dir),
                ..config
            };
            cmd_forecast(&input, &output, input_format, output_format, &config, report.as_deref())
        }

        Commands::Risk {
            input,
            output,
            input_format,
            output_format,
            history_days,
            report,
        } => {
            let config = PrepConfig {
                history_days: history_days.unwrap_or(config.history_days),
                ..config
            };
            cmd_risk(&input, &output, input_format, output_format, &config, report.as_deref())
        }

        Commands::Score { input, pretty } => cmd_score(&input, pretty),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor { models_dir, json } => {
            let config = PrepConfig {
                models_dir: models_dir.unwrap_or(config.models_dir),
                ..config
            };
            cmd_doctor(&config, json)
        }
    }
}

fn cmd_forecast(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: &PrepConfig,
    report: Option<&Path>,
) -> Result<(), PrepCliError> {
    let (series, rows) = load_series(input, input_format)?;

    let dataset = prepare_forecast_dataset(&series, config)?;
    dataset.params.save(&config.scaler_params_path())?;

    write_output(output, &format_output(&dataset.windows.windows, &output_format)?)?;

    if let Some(path) = report {
        let mut run = RunReport::new("forecast", rows, series.len());
        run.records = dataset.windows.len();
        run.skipped_entities = dataset
            .windows
            .skipped
            .iter()
            .map(|s| s.entity_id.clone())
            .collect();
        run.artifacts = vec![config.scaler_params_path().display().to_string()];
        fs::write(path, serde_json::to_string_pretty(&run)?)?;
    }

    Ok(())
}

fn cmd_risk(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: &PrepConfig,
    report: Option<&Path>,
) -> Result<(), PrepCliError> {
    config.validate()?;
    let (series, rows) = load_series(input, input_format)?;
    let series = limit_history(&series, config.history_days);

    let dataset = prepare_classification_dataset(&series)?;
    write_output(output, &format_output(&dataset.aggregates, &output_format)?)?;

    if let Some(path) = report {
        let mut run = RunReport::new("risk", rows, series.len());
        run.records = dataset.aggregates.len();
        run.risk_distribution = Some(dataset.distribution);
        fs::write(path, serde_json::to_string_pretty(&run)?)?;
    }

    Ok(())
}

fn cmd_score(input: &Path, pretty: bool) -> Result<(), PrepCliError> {
    let profile: ExposureProfile = serde_json::from_str(&read_input(input)?)?;
    let scores = ExposureScorer::score(&profile)?;

    if pretty {
        println!("{}", serde_json::to_string_pretty(&scores)?);
    } else {
        println!("{}", serde_json::to_string(&scores)?);
    }
    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), PrepCliError> {
    let rows = parse_rows(&read_input(input)?, input_format)?;
    let results = MeasurementAdapter::validate_rows(&rows);

    let report = ValidationReport {
        schema_version: SCHEMA_VERSION.to_string(),
        total_rows: rows.len(),
        valid_rows: rows.len() - results.len(),
        invalid_rows: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                device_id: r.device_id.clone(),
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report ({})", report.schema_version);
        println!("=================");
        println!("Total rows:   {}", report.total_rows);
        println!("Valid rows:   {}", report.valid_rows);
        println!("Invalid rows: {}", report.invalid_rows);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Row {} (device {}): {}",
                    err.index,
                    err.device_id.as_deref().unwrap_or("unknown"),
                    err.error
                );
            }
        }
    }

    if report.invalid_rows > 0 {
        Err(PrepCliError::ValidationFailed(report.invalid_rows))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config: &PrepConfig, json: bool) -> Result<(), PrepCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "prep_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("AeroGuard Prep version {}", PREP_VERSION),
    });

    checks.push(match config.validate() {
        Ok(()) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "lookback {}, horizon {}, history {} days",
                config.lookback, config.horizon, config.history_days
            ),
        },
        Err(e) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    });

    let scaler_path = config.scaler_params_path();
    checks.push(check_artifact("scaler_params", &scaler_path, |path| {
        let params = ScalerParams::load(path)?;
        params.check_features(forecast_feature_names().as_slice())?;
        Ok(format!("{} features, schema {}", params.len(), params.schema_version))
    }));

    let metadata_path = config.classifier_metadata_path();
    checks.push(check_artifact("classifier_metadata", &metadata_path, |path| {
        let metadata = ClassifierMetadata::load(path)?;
        let top = metadata
            .feature_importance
            .first()
            .map(|f| f.feature.as_str())
            .unwrap_or("none");
        Ok(format!(
            "{} features, {} classes, top feature {}",
            metadata.feature_names.len(),
            metadata.classes.len(),
            top
        ))
    }));

    let stdin_message = if atty::is(atty::Stream::Stdin) {
        "stdin is a TTY (interactive mode)"
    } else {
        "stdin is a pipe (ready for '-i -')"
    };
    checks.push(DoctorCheck {
        name: "stdin".to_string(),
        status: CheckStatus::Ok,
        message: stdin_message.to_string(),
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: PREP_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("AeroGuard Doctor Report");
        println!("=======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
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
        Err(PrepCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn check_artifact(
    name: &str,
    path: &Path,
    inspect: impl Fn(&Path) -> Result<String, PrepError>,
) -> DoctorCheck {
    if !path.exists() {
        return DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: format!("{} does not exist", path.display()),
        };
    }

    match inspect(path) {
        Ok(message) => DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message,
        },
        Err(e) => DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    }
}

fn read_input(input: &Path) -> Result<String, PrepCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn write_output(output: &Path, data: &str) -> Result<(), PrepCliError> {
    if output.to_string_lossy() == "-" {
        print!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

fn parse_rows(data: &str, format: InputFormat) -> Result<Vec<RawMeasurement>, PrepCliError> {
    let rows = match format {
        InputFormat::Ndjson => MeasurementAdapter::parse_ndjson(data)?,
        InputFormat::Json => MeasurementAdapter::parse_array(data)?,
    };
    if rows.is_empty() {
        return Err(PrepCliError::NoRows);
    }
    Ok(rows)
}

fn load_series(
    input: &Path,
    format: InputFormat,
) -> Result<(Vec<EntitySeries>, usize), PrepCliError> {
    let rows = parse_rows(&read_input(input)?, format)?;
    let count = rows.len();
    let series = MeasurementAdapter::to_series(rows)?;
    log::info!("Loaded {} rows from {} entities", count, series.len());
    Ok((series, count))
}

fn format_output<T: Serialize>(records: &[T], format: &OutputFormat) -> Result<String, PrepCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for record in records {
                lines.push(serde_json::to_string(record)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(records)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(records)?),
    }
}

// Error types

#[derive(Debug)]
enum PrepCliError {
    Io(io::Error),
    Prep(PrepError),
    Json(serde_json::Error),
    NoRows,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for PrepCliError {
    fn from(e: io::Error) -> Self {
        PrepCliError::Io(e)
    }
}

impl From<PrepError> for PrepCliError {
    fn from(e: PrepError) -> Self {
        PrepCliError::Prep(e)
    }
}

impl From<serde_json::Error> for PrepCliError {
    fn from(e: serde_json::Error) -> Self {
        PrepCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PrepCliError> for CliError {
    fn from(e: PrepCliError) -> Self {
        match e {
            PrepCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PrepCliError::Prep(PrepError::InsufficientData(msg)) => CliError {
                code: "INSUFFICIENT_DATA".to_string(),
                message: msg,
                hint: Some("Supply more history or reduce --lookback/--horizon".to_string()),
            },
            PrepCliError::Prep(PrepError::InvalidArgument(msg)) => CliError {
                code: "INVALID_ARGUMENT".to_string(),
                message: msg,
                hint: Some("Exposure values must be non-negative".to_string()),
            },
            PrepCliError::Prep(e) => CliError {
                code: "PREP_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(format!("Ensure input matches {}", SCHEMA_VERSION)),
            },
            PrepCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PrepCliError::NoRows => CliError {
                code: "NO_ROWS".to_string(),
                message: "No measurement rows found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            PrepCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} rows failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            PrepCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(Serialize)]
struct RunReport {
    run_id: String,
    producer: String,
    version: String,
    generated_at: DateTime<Utc>,
    command: String,
    input_rows: usize,
    entities: usize,
    records: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    skipped_entities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    risk_distribution: Option<[usize; 4]>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    artifacts: Vec<String>,
}

impl RunReport {
    fn new(command: &str, input_rows: usize, entities: usize) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            producer: PRODUCER_NAME.to_string(),
            version: PREP_VERSION.to_string(),
            generated_at: Utc::now(),
            command: command.to_string(),
            input_rows,
            entities,
            records: 0,
            skipped_entities: Vec::new(),
            risk_distribution: None,
            artifacts: Vec::new(),
        }
    }
}

#[derive(Serialize)]
struct ValidationReport {
    schema_version: String,
    total_rows: usize,
    valid_rows: usize,
    invalid_rows: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(Serialize)]
struct ValidationErrorDetail {
    index: usize,
    device_id: Option<String>,
    error: String,
}

#[derive(Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
