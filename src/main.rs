//! amas-services - rate limit operations tool
//!
//! Inspect and manage rate limit state in the configured backing store.

#![allow(missing_docs)]

use amas_services::utils::logging::init_tracing;
use amas_services::{
    BuildInfo, Config, DEFAULT_ENDPOINT, DeduplicationConfig, RateLimiter, RateLimiterStats,
    ServiceError,
};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ")"
);

#[derive(Debug, Parser)]
#[command(name = "amas-services", version, long_version = LONG_VERSION)]
#[command(about = "Inspect and manage sliding-window rate limits")]
struct Cli {
    /// YAML config file; environment variables are used when omitted
    #[arg(short, long, env = "AMAS_CONFIG")]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Check an identity and consume one unit of quota if allowed
    Check {
        identity: String,
        #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
        endpoint: String,
    },
    /// Show an identity's quota without consuming any
    Status {
        identity: String,
        #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
        endpoint: String,
    },
    /// Clear all window state of an identity
    Reset { identity: String },
    /// Print limiter statistics and the deduplication settings
    Stats,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(&cli.log_level, cli.json_logs) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn load_config(path: Option<&PathBuf>) -> Result<Config, ServiceError> {
    match path {
        Some(path) => Config::from_file(path).await,
        None => Config::from_env(),
    }
}

async fn run(cli: Cli) -> Result<(), ServiceError> {
    let config = load_config(cli.config.as_ref()).await?;
    debug!("Loaded configuration: {:?}", config);

    let limiter = RateLimiter::connect(config.rate_limiter.clone(), &config.redis).await?;

    let output = match cli.command {
        Commands::Check { identity, endpoint } => {
            serde_json::to_value(limiter.check_endpoint(&identity, &endpoint).await)?
        }
        Commands::Status { identity, endpoint } => {
            serde_json::to_value(limiter.status(&identity, &endpoint).await)?
        }
        Commands::Reset { identity } => {
            let cleared = limiter.reset(&identity).await?;
            json!({ "identity": identity, "endpoints_cleared": cleared })
        }
        Commands::Stats => stats_report(limiter.stats().await, &config.dedup),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

// Deduplication state lives inside the serving process, so only its settings
// are known here
fn stats_report(limiter: RateLimiterStats, dedup: &DeduplicationConfig) -> Value {
    json!({
        "build": BuildInfo::default(),
        "rate_limiter": limiter,
        "deduplication": dedup,
    })
}
