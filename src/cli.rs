//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// EvalDash - evaluation dashboard for AI agents
///
/// Ingest evaluation events, tune per-user evaluation settings and review
/// score and latency trends from the terminal.
///
/// Examples:
///   evaldash --user alice ingest --file eval.json
///   evaldash --user alice dashboard --window 30
///   evaldash --user alice dashboard --format json --output dash.json
///   evaldash --user alice show 3f0c9a7e-...
///   evaldash --user alice settings --obfuscate-pii true
///   evaldash init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .evaldash.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Path to the JSON evaluation store
    #[arg(long, value_name = "FILE", env = "EVALDASH_STORE", global = true)]
    pub store: Option<PathBuf>,

    /// Owner whose evaluations are read and written
    #[arg(short, long, value_name = "ID", env = "EVALDASH_USER", global = true)]
    pub user: Option<String>,

    /// Store call timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Show summary statistics, daily trends and recent evaluations
    Dashboard {
        /// Trailing window in days (e.g. 7 or 30)
        #[arg(short, long, value_name = "DAYS")]
        window: Option<u32>,

        /// Output format (markdown, json)
        #[arg(long, default_value = "markdown", value_name = "FORMAT")]
        format: OutputFormat,

        /// Write the report to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Number of recent evaluations to list
        #[arg(long, value_name = "COUNT")]
        recent: Option<usize>,
    },

    /// Show a single evaluation, redacting PII if enabled in settings
    Show {
        /// Evaluation id
        id: String,

        /// Output format (markdown, json)
        #[arg(long, default_value = "markdown", value_name = "FORMAT")]
        format: OutputFormat,
    },

    /// Ingest one evaluation from a JSON payload
    Ingest {
        /// Payload file, or "-" for stdin
        #[arg(short, long, default_value = "-", value_name = "FILE")]
        file: PathBuf,
    },

    /// Show or update evaluation settings
    ///
    /// Without flags the current settings are printed.
    Settings {
        /// When to run evaluations
        #[arg(long, value_name = "POLICY")]
        run_policy: Option<PolicyArg>,

        /// Percentage of interactions evaluated when sampled (0-100)
        #[arg(long, value_name = "PCT")]
        sample_rate: Option<u8>,

        /// Redact PII in displayed prompts and responses
        #[arg(long, value_name = "BOOL")]
        obfuscate_pii: Option<bool>,

        /// Maximum number of evaluations per day
        #[arg(long, value_name = "COUNT")]
        max_eval_per_day: Option<u32>,
    },

    /// Redact PII from text given as an argument or on stdin
    Obfuscate {
        /// Text to redact; read from stdin when omitted
        text: Option<String>,

        /// Treat stdin as a JSON value that must be a string
        #[arg(long, conflicts_with = "text")]
        json: bool,
    },

    /// Generate a default .evaldash.toml configuration file
    InitConfig,
}

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Run policy values for --run-policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PolicyArg {
    Always,
    Sampled,
}

impl Command {
    /// Whether the command reads or writes a user's data.
    pub fn needs_user(&self) -> bool {
        !matches!(self, Command::InitConfig | Command::Obfuscate { .. })
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(ref user) = self.user {
            if user.trim().is_empty() {
                return Err("User id must not be empty".to_string());
            }
        }

        match &self.command {
            Command::Dashboard {
                recent: Some(0), ..
            } => Err("Recent evaluation count must be at least 1".to_string()),
            Command::Settings {
                sample_rate: Some(rate),
                ..
            } if *rate > 100 => Err("Sample rate must be between 0 and 100".to_string()),
            Command::Settings {
                max_eval_per_day: Some(0),
                ..
            } => Err("Max evaluations per day must be at least 1".to_string()),
            _ => Ok(()),
        }
    }

    /// Returns the log level based on verbosity flags and the config file's
    /// `general.verbose`. `--quiet` wins over both.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
