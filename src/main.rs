//! PlanCheck - concurrent compliance checking for building plan submissions
//!
//! A CLI tool that runs the architectural compliance checkers over a
//! project data file and writes an aggregate compliance report.
//!
//! Exit codes:
//!   0 - Success (verdict below threshold, or no --fail-on set)
//!   1 - Runtime error (unreadable input, bad config, invalid project id, etc.)
//!   2 - Overall status at or above the --fail-on threshold

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use plancheck::analysis::summary_text;
use plancheck::cli::{Args, FailOnLevel, OutputFormat};
use plancheck::config::{Config, DEFAULT_CONFIG_FILE};
use plancheck::report::{self, ReportMetadata};
use plancheck::{default_checkers, CheckerRegistry, EnrichmentClient, Orchestrator, OverallStatus};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config and --list-checkers early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }
    if args.list_checkers {
        handle_list_checkers();
        return Ok(());
    }

    init_logging(&args);

    info!("PlanCheck v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_checks(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Compliance run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .plancheck.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize concurrency, retries, checkers and enrichment.");
    Ok(())
}

/// Handle --list-checkers: print every built-in checker and its rule table.
fn handle_list_checkers() {
    for checker in default_checkers() {
        let descriptor = checker.descriptor();
        println!("📋 {} - {}", descriptor.name, descriptor.description);
        for rule in &descriptor.rules {
            println!(
                "     {} {} [{}] ({})",
                rule.id, rule.name, rule.category, rule.code_reference
            );
        }
        println!();
    }
}

/// Initialize logging; `RUST_LOG` wins over the verbosity flags when set.
fn init_logging(args: &Args) {
    let level = args.log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete compliance workflow. Returns exit code (0 or 2).
async fn run_checks(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let input = args
        .input
        .clone()
        .context("An input file is required")?;
    let project = load_project(&input)?;
    let project_id = args.effective_project_id();

    println!("📥 Loaded project data: {}", input.display());
    info!("Project id: {}", project_id);

    let enrichment = init_enrichment(&config);

    println!("🏗️  Running compliance checkers...");
    println!("   Checkers: {}", config.orchestrator.checkers.join(", "));
    println!(
        "   Concurrency: {} | Retries: {} | Timeout: {}s",
        config.orchestrator.max_concurrent_checkers,
        config.orchestrator.retry_count,
        config.orchestrator.timeout_seconds
    );
    match enrichment {
        Some(ref client) => println!("   Enrichment: {}", client.model()),
        None => println!("   Enrichment: disabled"),
    }

    let registry = Arc::new(CheckerRegistry::with_defaults());
    let orchestrator = Orchestrator::new(
        config.orchestrator.clone(),
        registry,
        enrichment.clone(),
    );

    let spinner = create_spinner(args.quiet);
    let outcome = orchestrator.execute_session(&project_id, &project).await;
    spinner.finish_and_clear();
    let session = outcome?;
    let aggregate = session
        .final_report
        .clone()
        .context("Completed session carries no report")?;

    println!("\n📝 Generating report...");

    let metadata = ReportMetadata {
        project_id: project_id.clone(),
        session_id: session.session_id.clone(),
        enrichment_model: enrichment.as_ref().map(|c| c.model().to_string()),
        duration_seconds: start_time.elapsed().as_secs_f64(),
        timed_out: session.timed_out,
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&aggregate, &metadata)?,
        OutputFormat::Markdown => report::generate_markdown_report(&aggregate, &metadata),
    };

    let output_path = output_path(&args, &config);
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    println!("\n📊 Compliance Summary:");
    for line in summary_text(&aggregate).lines() {
        println!("   {}", line);
    }
    if session.timed_out {
        println!("   ⏱️  Timed out after {}s", config.orchestrator.timeout_seconds);
    }
    println!("   Duration: {:.1}s", metadata.duration_seconds);
    println!(
        "\n✅ Compliance check complete! Report saved to: {}",
        output_path.display()
    );

    if let Some(fail_level) = args.fail_on {
        if threshold_reached(aggregate.overall_status, fail_level) {
            eprintln!(
                "\n⛔ Overall status {} is at or above {:?}. Failing (exit code 2).",
                aggregate.overall_status, fail_level
            );
            return Ok(2);
        }
    }

    Ok(0)
}

fn threshold_reached(status: OverallStatus, level: FailOnLevel) -> bool {
    match level {
        FailOnLevel::Warning => status != OverallStatus::Pass,
        FailOnLevel::Fail => status == OverallStatus::Fail,
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}

fn load_project(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read project file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse project file: {}", path.display()))
}

/// Build the enrichment client. A construction failure disables enrichment
/// rather than the run.
fn init_enrichment(config: &Config) -> Option<Arc<EnrichmentClient>> {
    if !config.enrichment.enabled {
        debug!("Enrichment disabled");
        return None;
    }

    match EnrichmentClient::new(config.enrichment.clone()) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!("Enrichment unavailable, continuing without it: {}", e);
            None
        }
    }
}

/// The configured output path, with the extension following `--format`
/// unless the path was given explicitly.
fn output_path(args: &Args, config: &Config) -> PathBuf {
    match args.output {
        Some(ref output) => output.clone(),
        None => PathBuf::from(&config.general.output).with_extension(args.format.extension()),
    }
}

fn create_spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed}] {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("Checking plan compliance...");
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}
