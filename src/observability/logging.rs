//! Logging initialization.
//!
//! Structured logging via `tracing` with human-readable and JSON output,
//! verbosity from the command line, and an environment override via
//! `TIMEKEEPER_LOG_LEVEL`.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

use crate::cli::args::ColorChoice;

/// Environment variable holding an `EnvFilter` directive.
pub const LOG_LEVEL_ENV: &str = "TIMEKEEPER_LOG_LEVEL";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable format with optional ANSI colors.
    #[default]
    Human,
    /// Newline-delimited JSON for machine consumption.
    Json,
}

/// Maps a verbosity level to a tracing directive string.
///
/// - 0 → `"warn"`
/// - 1 → `"info"`
/// - 2 → `"debug"`
/// - 3+ → `"trace"` (saturates)
#[must_use]
pub const fn verbosity_to_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Picks the filter: a parseable, non-empty `env_directive` wins over
/// `verbosity`.
#[must_use]
pub fn build_filter(env_directive: Option<&str>, verbosity: u8) -> EnvFilter {
    env_directive
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(verbosity_to_directive(verbosity)))
}

/// Installs the global tracing subscriber on stderr.
///
/// `TIMEKEEPER_LOG_LEVEL`, when set, takes precedence over `verbosity`.
/// Uses `try_init()`, so repeated calls are harmless.
pub fn init_logging(format: LogFormat, verbosity: u8, color: ColorChoice) {
    let env_directive = std::env::var(LOG_LEVEL_ENV).ok();
    let filter = build_filter(env_directive.as_deref(), verbosity);

    let show_target = verbosity >= 2;

    let use_ansi = match color {
        ColorChoice::Auto => {
            std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
        }
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    match format {
        LogFormat::Human => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(use_ansi)
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
        LogFormat::Json => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_current_span(false)
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}
