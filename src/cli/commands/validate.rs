//! `validate` command handler
//!
//! Loads each schedule through the full pipeline and reports the outcome
//! per file. Nothing is registered or run.

use std::path::Path;

use serde::Serialize;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::{ConfigLoader, LoadWarning};
use crate::error::{ConfigError, Severity, TimekeeperError, ValidationIssue};

/// Outcome for one schedule file.
#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    valid: bool,
    timers: usize,
    errors: Vec<String>,
    warnings: Vec<String>,
}

/// Validate schedule files.
///
/// Every file is checked before returning, so all problems are reported
/// in one pass.
///
/// # Errors
///
/// Returns an I/O error if a file does not exist, or the first
/// configuration error when any file fails (or has warnings under
/// `--strict`).
pub fn run(args: &ValidateArgs) -> Result<(), TimekeeperError> {
    for file in &args.files {
        if !file.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("schedule file not found: {}", file.display()),
            )
            .into());
        }
    }

    let loader = ConfigLoader::with_defaults();
    let mut reports = Vec::with_capacity(args.files.len());
    let mut first_error: Option<ConfigError> = None;

    for file in &args.files {
        let (report, error) = check_file(&loader, file, args.strict);
        if first_error.is_none() {
            first_error = error;
        }
        reports.push(report);
    }

    match args.format {
        OutputFormat::Human => {
            for report in &reports {
                print_human(report);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
    }

    first_error.map_or(Ok(()), |e| Err(e.into()))
}

fn check_file(loader: &ConfigLoader, file: &Path, strict: bool) -> (FileReport, Option<ConfigError>) {
    let name = file.display().to_string();

    match loader.load(file) {
        Ok(loaded) => {
            let warnings: Vec<String> = loaded.warnings.iter().map(ToString::to_string).collect();
            let error = (strict && !loaded.warnings.is_empty()).then(|| {
                ConfigError::ValidationError {
                    path: name.clone(),
                    errors: loaded.warnings.iter().map(promote).collect(),
                }
            });
            let report = FileReport {
                file: name,
                valid: error.is_none(),
                timers: loaded.schedule.timers.len(),
                errors: Vec::new(),
                warnings,
            };
            (report, error)
        }
        Err(error) => {
            let errors = match &error {
                ConfigError::ValidationError { errors, .. } => {
                    errors.iter().map(ToString::to_string).collect()
                }
                other => vec![other.to_string()],
            };
            let report = FileReport {
                file: name,
                valid: false,
                timers: 0,
                errors,
                warnings: Vec::new(),
            };
            (report, Some(error))
        }
    }
}

/// Turns a load warning into an error-severity issue for `--strict`.
fn promote(warning: &LoadWarning) -> ValidationIssue {
    ValidationIssue {
        path: warning.location.clone().unwrap_or_default(),
        message: warning.message.clone(),
        severity: Severity::Error,
    }
}

fn print_human(report: &FileReport) {
    if report.valid {
        println!("✓ {} ({} timers)", report.file, report.timers);
    } else {
        eprintln!("✗ {}", report.file);
    }
    for error in &report.errors {
        eprintln!("  {error}");
    }
    for warning in &report.warnings {
        eprintln!("  warning: {warning}");
    }
}
