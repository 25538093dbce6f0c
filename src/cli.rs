//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// PlanCheck - concurrent compliance checking for building plan submissions
///
/// Runs the wall, dimension, window/door, area, energy, council and
/// formatter checkers over a project JSON file and writes a
/// Markdown/JSON compliance report.
///
/// Examples:
///   plancheck --input project.json
///   plancheck --input project.json --format json --output report.json
///   plancheck --input project.json --checkers wall_agent,area_agent --no-enrichment
///   plancheck --input project.json --fail-on warning
///   plancheck --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Project data file (JSON)
    #[arg(
        short,
        long,
        value_name = "FILE",
        required_unless_present_any = ["init_config", "list_checkers"]
    )]
    pub input: Option<PathBuf>,

    /// Project identifier used for the session id
    ///
    /// Defaults to the input file stem.
    #[arg(short, long, value_name = "ID")]
    pub project_id: Option<String>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .plancheck.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Maximum number of checkers running at once
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Attempts per checker before its failure is recorded
    #[arg(long, value_name = "NUM")]
    pub retries: Option<u32>,

    /// Workflow timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Checkers to run (comma-separated, in order)
    ///
    /// Example: --checkers wall_agent,area_agent
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub checkers: Option<Vec<String>>,

    /// Skip the enrichment step entirely
    #[arg(long)]
    pub no_enrichment: bool,

    /// Enrichment model name
    #[arg(long, value_name = "MODEL", env = "OPENROUTER_MODEL")]
    pub model: Option<String>,

    /// Enrichment API key
    ///
    /// Without a key, enrichment falls back to canned responses.
    #[arg(long, value_name = "KEY", env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Fail if the overall status is at or above this level
    ///
    /// Useful for CI pipelines. Exit code 2 when threshold is reached.
    /// Values: warning, fail
    #[arg(long, value_name = "LEVEL")]
    pub fail_on: Option<FailOnLevel>,

    /// Generate a default .plancheck.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// List the built-in checkers and their rules, then exit
    #[arg(long)]
    pub list_checkers: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }
}

/// Overall status threshold for --fail-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum FailOnLevel {
    Warning,
    Fail,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config || self.list_checkers {
            return Ok(());
        }

        if let Some(ref input) = self.input {
            if !input.is_file() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
        }

        if let Some(ref project_id) = self.project_id {
            if project_id.is_empty() || project_id.chars().any(char::is_whitespace) {
                return Err("Project id must be non-empty and contain no whitespace".to_string());
            }
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.retries == Some(0) {
            return Err("Retries must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if let Some(ref checkers) = self.checkers {
            if checkers.iter().all(|c| c.trim().is_empty()) {
                return Err("At least one checker must be named".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// The explicit project id, else the input file stem.
    pub fn effective_project_id(&self) -> String {
        self.project_id.clone().unwrap_or_else(|| {
            self.input
                .as_ref()
                .and_then(|p| p.file_stem())
                .map(|s| s.to_string_lossy().replace(char::is_whitespace, "_"))
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "project".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            input: None,
            project_id: None,
            output: None,
            format: OutputFormat::Markdown,
            config: None,
            verbose: false,
            quiet: false,
            concurrency: None,
            retries: None,
            timeout: None,
            checkers: None,
            no_enrichment: false,
            model: None,
            api_key: None,
            fail_on: None,
            init_config: false,
            list_checkers: false,
        }
    }

    #[test]
    fn test_parse_checker_list() {
        let args = Args::parse_from([
            "plancheck",
            "--input",
            "p.json",
            "--checkers",
            "wall_agent,area_agent",
            "--fail-on",
            "warning",
        ]);
        assert_eq!(
            args.checkers,
            Some(vec!["wall_agent".to_string(), "area_agent".to_string()])
        );
        assert_eq!(args.fail_on, Some(FailOnLevel::Warning));
    }

    #[test]
    fn test_validation_missing_input_file() {
        let mut args = make_args();
        args.input = Some(PathBuf::from("/definitely/not/here.json"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_concurrency() {
        let mut args = make_args();
        args.concurrency = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_whitespace_project_id() {
        let mut args = make_args();
        args.project_id = Some("house a".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_effective_project_id() {
        let mut args = make_args();
        args.input = Some(PathBuf::from("plans/erf 1234.json"));
        assert_eq!(args.effective_project_id(), "erf_1234");

        args.project_id = Some("p42".to_string());
        assert_eq!(args.effective_project_id(), "p42");
    }

    #[test]
    fn test_fail_on_ordering() {
        assert!(FailOnLevel::Warning < FailOnLevel::Fail);
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
