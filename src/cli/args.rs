//! CLI argument definitions
//!
//! All Clap derive structs for `timekeeper` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

// ============================================================================
// Root CLI
// ============================================================================

/// Tick-driven timer scheduler.
#[derive(Parser, Debug)]
#[command(name = "timekeeper", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "TIMEKEEPER_COLOR")]
    pub color: ColorChoice,

    /// Log line format on stderr.
    #[arg(long, default_value = "human", global = true, env = "TIMEKEEPER_LOG_FORMAT")]
    pub log_format: OutputFormat,
}

// ============================================================================
// Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a schedule against a simulated world.
    Run(RunArgs),

    /// Validate schedule files without running them.
    Validate(ValidateArgs),

    /// Display version information.
    Version(VersionArgs),
}

/// Arguments for `run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the YAML schedule.
    #[arg(short, long, env = "TIMEKEEPER_CONFIG")]
    pub config: PathBuf,

    /// Override the schedule's tick rate (ticks per second).
    #[arg(long)]
    pub tick_rate: Option<f64>,

    /// Override the schedule's run time (e.g. `5s`, `1m`).
    #[arg(long, value_parser = humantime::parse_duration)]
    pub run_for: Option<std::time::Duration>,

    /// Write JSONL events to this file instead of stderr.
    #[arg(long, env = "TIMEKEEPER_EVENTS_FILE")]
    pub events_file: Option<PathBuf>,

    /// Serve Prometheus metrics on `127.0.0.1:<port>`.
    #[arg(long, env = "TIMEKEEPER_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Print the timers still live at the end.
    #[arg(long)]
    pub dump: bool,

    /// Format of the end-of-run summary on stdout.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Schedule files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Treat warnings as errors.
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for `version`.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_with_config() {
        let cli = Cli::try_parse_from(["timekeeper", "run", "--config", "s.yaml"]);
        assert!(cli.is_ok(), "Failed to parse: {cli:?}");
    }

    #[test]
    fn test_run_requires_config() {
        let cli = Cli::try_parse_from(["timekeeper", "run"]);
        if std::env::var_os("TIMEKEEPER_CONFIG").is_none() {
            assert!(cli.is_err());
        }
    }

    #[test]
    fn test_run_overrides() {
        let cli = Cli::try_parse_from([
            "timekeeper",
            "run",
            "-c",
            "s.yaml",
            "--tick-rate",
            "120",
            "--run-for",
            "1m 30s",
            "--dump",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected RunArgs");
        };
        assert_eq!(args.tick_rate, Some(120.0));
        assert_eq!(args.run_for, Some(std::time::Duration::from_secs(90)));
        assert!(args.dump);
    }

    #[test]
    fn test_bad_run_for_rejected() {
        let cli = Cli::try_parse_from(["timekeeper", "run", "-c", "s.yaml", "--run-for", "later"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_validate_requires_files() {
        assert!(Cli::try_parse_from(["timekeeper", "validate"]).is_err());
        let cli = Cli::try_parse_from(["timekeeper", "validate", "a.yaml", "b.yaml", "--strict"])
            .unwrap();
        let Commands::Validate(args) = cli.command else {
            panic!("expected ValidateArgs");
        };
        assert_eq!(args.files.len(), 2);
        assert!(args.strict);
        assert_eq!(args.format, OutputFormat::Human);
    }

    #[test]
    fn test_help_output() {
        let err = Cli::try_parse_from(["timekeeper", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_version_flag() {
        let err = Cli::try_parse_from(["timekeeper", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "timekeeper",
            "version",
            "-vv",
            "--color",
            "never",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.color, ColorChoice::Never);
        assert_eq!(cli.log_format, OutputFormat::Json);
    }
}
