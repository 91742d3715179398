//! Tripwire CLI - Metric alarm reconciliation
//!
//! Runs one reconciliation pass per invocation:
//! - `validate` checks a configuration file without touching the cloud
//! - `plan` computes what would change
//! - `apply` converges the owned alarms and saves the resulting state
//!
//! Exit codes: 0 when everything succeeded, 2 when the pass finished with
//! discovery or item failures, 1 on fatal errors.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tripwire_engine::{EngineError, InMemoryCloud, PassOptions, PassReport, ReconciliationPass};

mod error;
mod loader;
mod output;
mod settings;
mod state;

use error::{CliError, CliResult};
use output::OutputFormat;
use settings::Settings;

/// Tripwire CLI
#[derive(Parser)]
#[command(name = "tripwire")]
#[command(about = "Tripwire - Keep metric alarms in step with your resources", long_about = None)]
#[command(version)]
struct Cli {
    /// Runtime settings file (logging, retries, state path)
    #[arg(long, env = "TRIPWIRE_SETTINGS", global = true)]
    settings: Option<String>,

    /// Log level or filter directive; overrides RUST_LOG and the settings file
    #[arg(long, env = "TRIPWIRE_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "TRIPWIRE_LOG_JSON", global = true)]
    log_json: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Check a configuration file
    Validate {
        /// Alarm configuration file (.yaml, .yml, .json, .toml)
        #[arg(short, long, env = "TRIPWIRE_CONFIG")]
        config: PathBuf,
    },

    /// Show what a pass would create and delete
    Plan(PassArgs),

    /// Create and delete alarms to match the configuration
    Apply(PassArgs),
}

#[derive(Args)]
struct PassArgs {
    /// Alarm configuration file (.yaml, .yml, .json, .toml)
    #[arg(short, long, env = "TRIPWIRE_CONFIG")]
    config: PathBuf,

    /// JSON state file holding resources and alarms
    #[arg(short, long, env = "TRIPWIRE_STATE")]
    state: Option<PathBuf>,

    /// Extra alarm action ARN; may be repeated
    #[arg(long = "alarm-action", value_name = "ARN")]
    alarm_actions: Vec<String>,

    /// Abort the pass after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load(cli.settings.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            output::print_error(&CliError::from(e).to_string());
            return ExitCode::from(1);
        }
    };

    init_tracing(&cli, &settings);

    match run(cli, settings).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "tripwire failed");
            output::print_error(&e.to_string());
            ExitCode::from(1)
        }
    }
}

fn init_tracing(cli: &Cli, settings: &Settings) {
    let directive = log_directive(
        cli.log_level.as_deref(),
        std::env::var(tracing_subscriber::EnvFilter::DEFAULT_ENV).ok(),
        &settings.logging.level,
    );
    let env_filter = tracing_subscriber::EnvFilter::new(directive);

    // Logs go to stderr so JSON reports on stdout stay parseable
    if cli.log_json || settings.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// `--log-level` wins over `RUST_LOG`, which wins over the settings file
fn log_directive(flag: Option<&str>, rust_log: Option<String>, configured: &str) -> String {
    flag.map(str::to_string)
        .or(rust_log.filter(|directive| !directive.trim().is_empty()))
        .unwrap_or_else(|| configured.to_string())
}

async fn run(cli: Cli, settings: Settings) -> CliResult<ExitCode> {
    match cli.command {
        Commands::Validate { config } => {
            let model = loader::load_config(&config)?;
            output::print_success(&format!(
                "{} is valid: {} resource rule(s), prefix {:?}",
                config.display(),
                model.resources.len(),
                model.globals.prefix()
            ));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Plan(args) => run_pass(args, true, &settings, cli.output).await,
        Commands::Apply(args) => run_pass(args, false, &settings, cli.output).await,
    }
}

async fn run_pass(
    args: PassArgs,
    dry_run: bool,
    settings: &Settings,
    format: OutputFormat,
) -> CliResult<ExitCode> {
    let config = loader::load_config(&args.config)?;
    let state_path = args
        .state
        .or_else(|| settings.state_path.clone())
        .ok_or(CliError::MissingState)?;

    let cloud = Arc::new(InMemoryCloud::from_state(state::load_state(&state_path).await?));

    let options = PassOptions {
        dry_run,
        additional_actions: args.alarm_actions,
        timeout: args
            .timeout_secs
            .or(settings.apply.timeout_secs)
            .map(Duration::from_secs),
        retry: settings.apply.retry_policy(),
    };
    let pass = ReconciliationPass::new(cloud.clone(), cloud.clone()).with_options(options);

    let result = pass.run(&config).await;

    if !dry_run {
        state::save_state(&state_path, &cloud.snapshot().await).await?;
        info!(path = %state_path.display(), "Saved state");
    }

    match result {
        Ok(report) => {
            println!("{}", output::render_report(&report, format)?);
            Ok(exit_code_for(&report))
        }
        Err(EngineError::DeadlineExceeded {
            phase,
            partial: Some(partial),
        }) => {
            output::print_error(&format!(
                "Deadline exceeded during {}: {} created, {} deleted, {} failed before stopping",
                phase,
                partial.created.len(),
                partial.deleted.len(),
                partial.failures.len()
            ));
            Ok(ExitCode::from(1))
        }
        Err(e) => Err(e.into()),
    }
}

fn exit_code_for(report: &PassReport) -> ExitCode {
    if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_flag_beats_rust_log() {
        let directive = log_directive(Some("debug"), Some("off".to_string()), "info");
        assert_eq!(directive, "debug");
    }

    #[test]
    fn test_rust_log_beats_settings() {
        assert_eq!(log_directive(None, Some("warn".to_string()), "info"), "warn");
        assert_eq!(log_directive(None, Some(" ".to_string()), "info"), "info");
        assert_eq!(log_directive(None, None, "info"), "info");
    }
}
