//! EvalDash - evaluation dashboard for AI agents
//!
//! A CLI that ingests agent evaluation events into a store, keeps
//! per-user evaluation settings, and reports score and latency trends
//! with optional PII obfuscation of displayed text.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (store, config, malformed stored record, etc.)
//!   2 - Rejected input (invalid payload, settings or arguments)

mod analysis;
mod cli;
mod config;
mod error;
mod ingest;
mod models;
mod privacy;
mod report;
mod store;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, Command, OutputFormat, PolicyArg};
use config::{Config, CONFIG_FILE};
use error::DashError;
use models::{DashboardReport, EvaluationView, ReportMetadata, RunPolicy, UserSettings};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use store::{EvaluationStore, JsonFileStore};
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    // Handle init-config early (no logging needed)
    if args.command == Command::InitConfig {
        return handle_init_config();
    }

    // Config is loaded before logging so `general.verbose` can take effect
    let (mut config, config_source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(&args, config.general.verbose);

    info!("EvalDash v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match config_source {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => debug!("No config file loaded, using defaults"),
    }

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(exit_code_for(&e));
        }
    }
}

/// Map a failure to an exit code: 2 for caller mistakes, 1 otherwise.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<DashError>() {
        Some(e) if e.is_client_error() => 2,
        _ => 1,
    }
}

/// Handle init-config: generate a default .evaldash.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set your user id, store path and dashboard window.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so reports printed on stdout stay machine-readable.
fn init_logging(args: &Args, config_verbose: bool) {
    let level = args.log_level(config_verbose);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Dispatch the selected command. Returns the process exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    let command = args.command.clone();

    if let Command::Obfuscate { text, json } = &command {
        return handle_obfuscate(text.clone(), *json).await;
    }

    let user_id = if command.needs_user() {
        config.general.user_id.clone().context(
            "No user id given. Pass --user, set EVALDASH_USER, or set general.user_id in .evaldash.toml",
        )?
    } else {
        String::new()
    };

    let store = JsonFileStore::new(config.store.path.clone());
    let timeout = Duration::from_secs(config.store.timeout_seconds);
    debug!("Using store at {}", store.path().display());

    match command {
        Command::Dashboard {
            window,
            format,
            output,
            recent,
        } => {
            let options = DashboardOptions {
                window_days: window.unwrap_or(config.dashboard.window_days),
                recent_limit: recent.unwrap_or(config.dashboard.recent_limit),
                format,
                output: output.or_else(|| config.dashboard.output.clone()),
                quiet: args.quiet,
            };
            handle_dashboard(&store, timeout, &user_id, options).await
        }
        Command::Show { id, format } => handle_show(&store, timeout, &user_id, &id, format).await,
        Command::Ingest { file } => handle_ingest(&store, timeout, &user_id, &file).await,
        Command::Settings {
            run_policy,
            sample_rate,
            obfuscate_pii,
            max_eval_per_day,
        } => {
            let changes = SettingsChanges {
                run_policy: run_policy.map(policy_from_arg),
                sample_rate_pct: sample_rate,
                obfuscate_pii,
                max_eval_per_day,
            };
            handle_settings(&store, timeout, &user_id, changes).await
        }
        Command::Obfuscate { .. } | Command::InitConfig => Ok(0),
    }
}

struct DashboardOptions {
    window_days: u32,
    recent_limit: usize,
    format: OutputFormat,
    output: Option<PathBuf>,
    quiet: bool,
}

/// Fetch the window, aggregate it and emit the dashboard.
async fn handle_dashboard(
    store: &JsonFileStore,
    timeout: Duration,
    user_id: &str,
    options: DashboardOptions,
) -> Result<i32> {
    let since = analysis::window_start(Utc::now(), options.window_days);
    info!(
        "Building dashboard for {} over the last {} days",
        user_id, options.window_days
    );

    let records = store::with_timeout(timeout, store.evaluations_since(user_id, since))
        .await
        .context("Failed to fetch evaluations")?;

    let aggregation = analysis::compute_aggregation(&records, options.window_days)
        .context("Failed to aggregate evaluations")?;
    let settings = store::with_timeout(timeout, store.settings(user_id))
        .await
        .context("Failed to load settings")?;
    let recent = analysis::recent_evaluations(&records, options.recent_limit)?
        .into_iter()
        .map(|record| EvaluationView::new(record.clone(), settings.obfuscate_pii))
        .collect();

    let report = DashboardReport {
        metadata: ReportMetadata {
            user_id: user_id.to_string(),
            window_days: options.window_days,
            generated_at: Utc::now(),
            source: store.path().display().to_string(),
        },
        aggregation,
        recent,
    };

    let content = match options.format {
        OutputFormat::Json => report::generate_json_dashboard(&report)?,
        OutputFormat::Markdown => report::generate_markdown_dashboard(&report),
    };

    match options.output {
        Some(path) => {
            std::fs::write(&path, &content)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;

            if !options.quiet {
                let summary = &report.aggregation.summary;
                println!("📊 Dashboard Summary:");
                println!("   Evaluations: {}", summary.total);
                println!("   Avg score: {:.2}", summary.avg_score);
                println!("   Avg latency: {}ms", summary.avg_latency_ms.round() as u64);
                println!("   Success rate: {:.1}%", summary.success_rate_pct);
                println!("\n✅ Report saved to: {}", path.display());
            }
        }
        None => print!("{}", content),
    }

    Ok(0)
}

/// Show one evaluation, applying the owner's obfuscation setting.
async fn handle_show(
    store: &JsonFileStore,
    timeout: Duration,
    user_id: &str,
    id: &str,
    format: OutputFormat,
) -> Result<i32> {
    let record = store::with_timeout(timeout, store.evaluation(user_id, id)).await?;
    let settings = store::with_timeout(timeout, store.settings(user_id))
        .await
        .context("Failed to load settings")?;

    let view = EvaluationView::new(record, settings.obfuscate_pii);

    let content = match format {
        OutputFormat::Json => report::generate_json_detail(&view)?,
        OutputFormat::Markdown => report::generate_markdown_detail(&view),
    };
    print!("{}", content);

    Ok(0)
}

/// Validate and store one evaluation payload.
async fn handle_ingest(
    store: &JsonFileStore,
    timeout: Duration,
    user_id: &str,
    file: &Path,
) -> Result<i32> {
    let raw = read_input(file).await?;

    let body: Value = serde_json::from_str(&raw)
        .map_err(|e| DashError::invalid_field("body", format!("invalid JSON: {}", e)))?;

    let evaluation = match ingest::parse_payload(&body) {
        Ok(evaluation) => evaluation,
        Err(e) => {
            warn!("Rejected ingest payload: {}", e);
            return Err(e.into());
        }
    };

    let record = store::with_timeout(timeout, store.insert_evaluation(user_id, evaluation))
        .await
        .context("Failed to insert evaluation")?;

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(0)
}

/// Requested changes to a user's settings.
struct SettingsChanges {
    run_policy: Option<RunPolicy>,
    sample_rate_pct: Option<u8>,
    obfuscate_pii: Option<bool>,
    max_eval_per_day: Option<u32>,
}

impl SettingsChanges {
    fn is_empty(&self) -> bool {
        self.run_policy.is_none()
            && self.sample_rate_pct.is_none()
            && self.obfuscate_pii.is_none()
            && self.max_eval_per_day.is_none()
    }

    fn apply(self, current: UserSettings) -> UserSettings {
        UserSettings {
            run_policy: self.run_policy.unwrap_or(current.run_policy),
            sample_rate_pct: self.sample_rate_pct.unwrap_or(current.sample_rate_pct),
            obfuscate_pii: self.obfuscate_pii.unwrap_or(current.obfuscate_pii),
            max_eval_per_day: self.max_eval_per_day.unwrap_or(current.max_eval_per_day),
            updated_at: current.updated_at,
        }
    }
}

/// Print settings, or update them when any change was requested.
async fn handle_settings(
    store: &JsonFileStore,
    timeout: Duration,
    user_id: &str,
    changes: SettingsChanges,
) -> Result<i32> {
    let current = store::with_timeout(timeout, store.settings(user_id))
        .await
        .context("Failed to load settings")?;

    if changes.is_empty() {
        print_settings(user_id, &current);
        return Ok(0);
    }

    let saved = store::with_timeout(timeout, store.save_settings(user_id, changes.apply(current)))
        .await
        .context("Failed to save settings")?;

    println!("✅ Settings saved successfully!");
    print_settings(user_id, &saved);
    Ok(0)
}

fn print_settings(user_id: &str, settings: &UserSettings) {
    println!("⚙️  Evaluation settings for {}", user_id);
    println!("   Run policy: {}", settings.run_policy);
    if settings.run_policy == RunPolicy::Sampled {
        println!("   Sample rate: {}%", settings.sample_rate_pct);
    }
    println!(
        "   Obfuscate PII: {}",
        if settings.obfuscate_pii { "on" } else { "off" }
    );
    println!("   Max evaluations per day: {}", settings.max_eval_per_day);
    if let Some(updated_at) = settings.updated_at {
        println!("   Updated: {}", updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
}

/// Redact free text or a JSON string value and print the result.
async fn handle_obfuscate(text: Option<String>, json: bool) -> Result<i32> {
    let input = match text {
        Some(text) => text,
        None => read_input(Path::new("-")).await?,
    };

    let redacted = if json {
        let value: Value = serde_json::from_str(&input)
            .map_err(|e| DashError::InvalidInput(format!("invalid JSON: {}", e)))?;
        privacy::obfuscate_value(Some(&value), true)?
    } else {
        let text = input.trim_end_matches(|c: char| c == '\r' || c == '\n');
        let redaction = privacy::redact(text);
        info!("Redacted {} PII token(s)", redaction.total());
        redaction.text
    };

    println!("{}", redacted);
    Ok(0)
}

/// Read a file, or stdin when the path is "-".
async fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("Failed to read stdin")?;
        return Ok(buf);
    }

    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Convert PolicyArg to RunPolicy.
fn policy_from_arg(arg: PolicyArg) -> RunPolicy {
    match arg {
        PolicyArg::Always => RunPolicy::Always,
        PolicyArg::Sampled => RunPolicy::Sampled,
    }
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so problems are reported on stderr
/// directly. Returns the path the config was read from, if any.
fn load_config(args: &Args) -> Result<(Config, Option<PathBuf>)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, Some(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, Some(PathBuf::from(CONFIG_FILE)))),
        Ok(None) => Ok((Config::default(), None)),
        Err(e) => {
            eprintln!("⚠️  Failed to load {}: {:#}. Using defaults.", CONFIG_FILE, e);
            Ok((Config::default(), None))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let client: anyhow::Error = DashError::MissingField("score".to_string()).into();
        assert_eq!(exit_code_for(&client), 2);

        let wrapped = anyhow::Error::from(DashError::InvalidSettings("bad".to_string()))
            .context("Failed to save settings");
        assert_eq!(exit_code_for(&wrapped), 2);

        let runtime: anyhow::Error = DashError::Store("timeout".to_string()).into();
        assert_eq!(exit_code_for(&runtime), 1);

        assert_eq!(exit_code_for(&anyhow::anyhow!("plain failure")), 1);
    }

    #[test]
    fn test_settings_changes() {
        let current = UserSettings::default();
        let changes = SettingsChanges {
            run_policy: Some(RunPolicy::Sampled),
            sample_rate_pct: Some(40),
            obfuscate_pii: None,
            max_eval_per_day: None,
        };
        assert!(!changes.is_empty());

        let updated = changes.apply(current);
        assert_eq!(updated.run_policy, RunPolicy::Sampled);
        assert_eq!(updated.sample_rate_pct, 40);
        assert!(!updated.obfuscate_pii);
        assert_eq!(updated.max_eval_per_day, 1000);

        let none = SettingsChanges {
            run_policy: None,
            sample_rate_pct: None,
            obfuscate_pii: None,
            max_eval_per_day: None,
        };
        assert!(none.is_empty());
    }

    #[test]
    fn test_policy_from_arg() {
        assert_eq!(policy_from_arg(PolicyArg::Always), RunPolicy::Always);
        assert_eq!(policy_from_arg(PolicyArg::Sampled), RunPolicy::Sampled);
    }
}
