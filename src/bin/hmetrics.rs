//! hmetrics CLI - Command-line interface for Health Metrics Core
//!
//! Commands:
//! - consolidate: Resolve cross-source overlaps in a sample dump
//! - payload: Consolidate and encode an outbound metrics payload

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use health_metrics_core::{
    consolidate_if_needed, MetricType, MetricsError, MobilePlatform, RecordEncoder, Sample,
    CORE_VERSION,
};

/// hmetrics - sample consolidation and record encoding for health metrics
#[derive(Parser)]
#[command(name = "hmetrics")]
#[command(version = CORE_VERSION)]
#[command(about = "Consolidate multi-source health samples", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve cross-source overlaps in a JSON array of samples
    Consolidate {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Pretty-print the output JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Consolidate samples and encode an outbound metrics payload
    Payload {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Backend metric name (STEP, SLEEP, WORKOUT, ...)
        #[arg(long, default_value = "STEP")]
        metric: String,

        /// Payload platform tag
        #[arg(long, value_enum, default_value = "android")]
        platform: Platform,

        /// Pretty-print the output JSON
        #[arg(long)]
        pretty: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Platform {
    Android,
    Ios,
}

impl From<Platform> for MobilePlatform {
    fn from(platform: Platform) -> Self {
        match platform {
            Platform::Android => MobilePlatform::Android,
            Platform::Ios => MobilePlatform::Ios,
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Consolidate {
            input,
            output,
            pretty,
        } => {
            let samples = read_samples(&input)?;
            let consolidated = consolidate_if_needed(samples);
            let json = to_json(&consolidated, pretty)?;
            write_output(&output, &json)
        }
        Commands::Payload {
            input,
            output,
            metric,
            platform,
            pretty,
        } => {
            let metric = MetricType::parse(&metric)?;
            let samples = read_samples(&input)?;
            let consolidated = consolidate_if_needed(samples);
            let payload = RecordEncoder::new(platform.into()).payload(metric, &consolidated);
            let json = to_json(&payload, pretty)?;
            write_output(&output, &json)
        }
    }
}

fn read_samples(input: &PathBuf) -> Result<Vec<Sample>, CliError> {
    let raw = if input.as_os_str() == "-" {
        if atty::is(atty::Stream::Stdin) {
            eprintln!("reading samples from stdin (pipe a JSON array, or pass --input)...");
        }
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(input)?
    };
    Ok(serde_json::from_str(&raw)?)
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String, CliError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

fn write_output(output: &PathBuf, json: &str) -> Result<(), CliError> {
    if output.as_os_str() == "-" {
        let mut stdout = io::stdout().lock();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    } else {
        fs::write(output, format!("{json}\n"))?;
        Ok(())
    }
}

#[derive(Debug)]
enum CliError {
    Io(io::Error),
    Json(serde_json::Error),
    Metrics(MetricsError),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Io(e) => write!(f, "{e}"),
            CliError::Json(e) => write!(f, "{e}"),
            CliError::Metrics(e) => write!(f, "{e}"),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}

impl From<MetricsError> for CliError {
    fn from(e: MetricsError) -> Self {
        CliError::Metrics(e)
    }
}
