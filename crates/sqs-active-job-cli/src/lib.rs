//! # SQS Active Job CLI
//!
//! Command-line interface for inspecting a resolved SQS Active Job
//! configuration.
//!
//! This module provides CLI commands for:
//! - Showing the resolved configuration
//! - Looking up the queue URL for a job queue
//! - Checking that an SQS client can be provisioned
//!
//! Logs go to stderr so command output on stdout stays machine-readable.

use clap::{Parser, Subcommand};
use serde_json::Value;
use sqs_active_job::{
    AppEnvironment, ClientError, ConfigFileError, ConfigOptions, ConfigurationError,
    ConfigurationResolver, ResolvedConfiguration, SqsActiveJobError, APP_ENV_VAR,
    DEFAULT_APP_ENV,
};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Log filter used when neither `--log-level` nor `RUST_LOG` is given
pub const DEFAULT_LOG_FILTER: &str = "sqs_active_job=info,sqs_active_job_cli=info";

// ============================================================================
// CLI Structure
// ============================================================================

/// SQS Active Job CLI - Inspect job queue configuration
#[derive(Debug, Parser)]
#[command(name = "sqs-active-job")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect SQS Active Job configuration")]
#[command(
    long_about = "Resolves SQS Active Job configuration from defaults, the YAML configuration file and command-line overrides"
)]
pub struct Cli {
    /// Configuration file to load instead of the default locations
    #[arg(short, long, global = true)]
    pub config_file: Option<PathBuf>,

    /// Application environment used to pick the default configuration file
    #[arg(short, long, global = true, env = APP_ENV_VAR, default_value = DEFAULT_APP_ENV)]
    pub environment: String,

    /// Application root containing the `config/` directory
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Queue mapping override as NAME=URL; replaces all configured queues
    #[arg(short, long = "queue", global = true, value_parser = parse_queue_mapping)]
    pub queues: Vec<(String, String)>,

    /// Override for the polling batch size
    #[arg(long, global = true)]
    pub max_messages: Option<u32>,

    /// Log filter, for example `debug` or `sqs_active_job=trace`
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the resolved configuration
    Show {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the SQS queue URL for a job queue
    QueueUrl {
        /// Job queue name
        queue: String,
    },

    /// Provision the SQS client and report its region
    Check,
}

/// Output format options
#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// One `key = value` line per option
    Text,
    /// Pretty-printed JSON
    Json,
    /// YAML document
    Yaml,
}

fn parse_queue_mapping(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, url)) if !name.is_empty() && !url.is_empty() => {
            Ok((name.to_string(), url.to_string()))
        }
        _ => Err(format!("expected NAME=URL, got '{}'", raw)),
    }
}

impl Cli {
    /// Explicit option layer built from the command-line overrides
    pub fn explicit_options(&self) -> ConfigOptions {
        let mut options = ConfigOptions::new();
        if let Some(path) = &self.config_file {
            options = options.with_config_file(path);
        }
        for (name, url) in &self.queues {
            options = options.with_queue(name, url);
        }
        if let Some(max_messages) = self.max_messages {
            options = options.with_max_messages(max_messages);
        }
        options
    }

    /// Application environment from `--environment` and `--root`
    pub fn app_environment(&self) -> Result<AppEnvironment, CliError> {
        let root = match &self.root {
            Some(root) => root.clone(),
            None => std::env::current_dir()?,
        };
        Ok(AppEnvironment::new(&self.environment, root))
    }
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Configuration file error: {0}")]
    ConfigFile(#[from] ConfigFileError),

    #[error("SQS client error: {0}")]
    Client(#[from] ClientError),

    #[error("Output error: {message}")]
    Output { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 1,
            Self::ConfigFile(_) => 2,
            Self::Client(_) => 3,
            Self::Output { .. } => 4,
            Self::Io(_) => 5,
        }
    }
}

impl From<SqsActiveJobError> for CliError {
    fn from(error: SqsActiveJobError) -> Self {
        match error {
            SqsActiveJobError::Configuration(e) => Self::Configuration(e),
            SqsActiveJobError::ConfigFile(e) => Self::ConfigFile(e),
            SqsActiveJobError::Client(e) => Self::Client(e),
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    initialize_logging(&cli);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(&cli, &mut out).await
}

/// Initialize logging based on CLI arguments
///
/// `--log-level` wins over `RUST_LOG`, which wins over
/// [`DEFAULT_LOG_FILTER`].
pub fn initialize_logging(cli: &Cli) {
    let filter = match &cli.log_level {
        Some(level) => tracing_subscriber::EnvFilter::new(level),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
    };

    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Resolve the configuration and run the selected command
pub async fn execute<W: Write>(cli: &Cli, out: &mut W) -> Result<(), CliError> {
    let environment = cli.app_environment()?;
    debug!(
        environment = %environment.name(),
        root = %environment.root().display(),
        "Resolving configuration"
    );

    let config = ConfigurationResolver::new(environment).resolve(cli.explicit_options())?;

    match &cli.command {
        Commands::Show { format } => execute_show_command(&config, format, out),
        Commands::QueueUrl { queue } => execute_queue_url_command(&config, queue, out),
        Commands::Check => execute_check_command(&config, out).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Execute show command
fn execute_show_command<W: Write>(
    config: &ResolvedConfiguration,
    format: &OutputFormat,
    out: &mut W,
) -> Result<(), CliError> {
    let map = config.to_h();
    let rendered = match format {
        OutputFormat::Text => render_text(&map),
        OutputFormat::Json => serde_json::to_string_pretty(&map).map_err(|e| CliError::Output {
            message: e.to_string(),
        })?,
        OutputFormat::Yaml => serde_yaml::to_string(&map).map_err(|e| CliError::Output {
            message: e.to_string(),
        })?,
    };

    writeln!(out, "{}", rendered.trim_end())?;
    Ok(())
}

/// Execute queue-url command
fn execute_queue_url_command<W: Write>(
    config: &ResolvedConfiguration,
    queue: &str,
    out: &mut W,
) -> Result<(), CliError> {
    let url = config.queue_url_for(queue)?;
    info!(queue = %queue, fifo = url.is_fifo(), "Resolved queue URL");

    writeln!(out, "{}", url)?;
    Ok(())
}

/// Execute check command
async fn execute_check_command<W: Write>(
    config: &ResolvedConfiguration,
    out: &mut W,
) -> Result<(), CliError> {
    let client = config.client().await?;
    let sdk_config = client.config();

    let region = sdk_config
        .region()
        .map(|region| region.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let app_name = sdk_config
        .app_name()
        .map(|name| name.to_string())
        .unwrap_or_default();

    writeln!(out, "SQS client ready")?;
    writeln!(out, "region = {}", region)?;
    writeln!(out, "app_name = {}", app_name)?;
    Ok(())
}

/// Render one `key = value` line per option, strings unquoted
pub fn render_text(map: &BTreeMap<String, Value>) -> String {
    map.iter()
        .map(|(key, value)| match value {
            Value::String(text) => format!("{} = {}", key, text),
            other => format!("{} = {}", key, other),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
