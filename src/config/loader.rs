//! Schedule loader
//!
//! Loading pipeline:
//! 1. Size limit check
//! 2. UTF-8 BOM strip
//! 3. Environment variable expansion (pre-parse, on raw text)
//! 4. YAML parsing and typed deserialization
//! 5. Validation
//! 6. Freeze with `Arc`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::schema::Schedule;
use crate::config::validation::Validator;
use crate::error::ConfigError;

// ============================================================================
// Public API
// ============================================================================

/// Limits that protect the loader from oversized schedules.
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    /// Maximum number of timers.
    pub max_timers: usize,

    /// Maximum schedule file size in bytes.
    pub max_config_size: usize,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_timers: env_or("TIMEKEEPER_MAX_TIMERS", 10_000),
            max_config_size: env_or("TIMEKEEPER_MAX_CONFIG_SIZE", 1024 * 1024),
        }
    }
}

/// Result of loading a schedule file.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated schedule.
    pub schedule: Arc<Schedule>,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Warning during schedule loading.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Location where the warning occurred.
    pub location: Option<String>,
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} at {location}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Schedule loader.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    limits: ConfigLimits,
}

impl ConfigLoader {
    /// Creates a loader with the given limits.
    #[must_use]
    pub const fn new(limits: ConfigLimits) -> Self {
        Self { limits }
    }

    /// Creates a loader with limits taken from the environment.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(ConfigLimits::default())
    }

    /// Loads, validates and freezes a schedule file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read or exceeds the size limit
    /// - An environment reference is malformed or a required one is unset
    /// - YAML parsing or deserialization fails
    /// - Validation reports errors
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        let file_size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if file_size > self.limits.max_config_size {
            return Err(ConfigError::InvalidValue {
                field: "file_size".to_string(),
                value: format!("{file_size} bytes"),
                expected: format!("at most {} bytes", self.limits.max_config_size),
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        self.load_str(&raw, path)
    }

    /// Runs the pipeline on already-read text; `path` is used for messages.
    ///
    /// # Errors
    ///
    /// Same as [`ConfigLoader::load`], minus the file checks.
    pub fn load_str(&self, raw: &str, path: &Path) -> Result<LoadResult, ConfigError> {
        let mut warnings = Vec::new();

        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

        let mut env_sub = EnvSubstitution::new();
        let substituted = env_sub.substitute(raw, path)?;
        warnings.extend(env_sub.warnings);

        let root: serde_yaml::Value =
            serde_yaml::from_str(&substituted).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?;

        if root.is_null() {
            return Err(ConfigError::ParseError {
                path: path.to_path_buf(),
                line: None,
                message: "Schedule file is empty".to_string(),
            });
        }

        let schedule: Schedule =
            serde_yaml::from_value(root).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                line: None,
                message: format!("Failed to deserialize schedule: {e}"),
            })?;

        let result = Validator::new().validate(&schedule, &self.limits);
        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: path.display().to_string(),
                errors: result.errors,
            });
        }

        warnings.extend(result.warnings.into_iter().map(|issue| LoadWarning {
            message: issue.message,
            location: Some(issue.path),
        }));

        Ok(LoadResult {
            schedule: Arc::new(schedule),
            warnings,
        })
    }
}

// ============================================================================
// Environment Variable Substitution
// ============================================================================

/// Pre-parse environment variable substitution.
///
/// Runs on raw YAML text before parsing so substituted values still go
/// through YAML type inference.
struct EnvSubstitution {
    warnings: Vec<LoadWarning>,
}

impl EnvSubstitution {
    const fn new() -> Self {
        Self {
            warnings: Vec::new(),
        }
    }

    /// Substitutes environment variables in raw YAML text.
    ///
    /// Supports:
    /// - `${VAR}` - expand to value (empty string if unset, with a warning)
    /// - `${VAR:-default}` - expand to default if unset
    /// - `${VAR:?message}` - fail if unset
    /// - `$$` - literal `$`
    fn substitute(&mut self, raw_yaml: &str, source_path: &Path) -> Result<String, ConfigError> {
        let mut result = String::with_capacity(raw_yaml.len());
        let mut chars = raw_yaml.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' {
                result.push(c);
                continue;
            }
            match chars.peek() {
                Some('$') => {
                    chars.next();
                    result.push('$');
                }
                Some('{') => {
                    chars.next();
                    let var_ref = Self::parse_var_ref(&mut chars, source_path)?;
                    match std::env::var(&var_ref.name) {
                        Ok(value) => result.push_str(&value),
                        Err(_) => match var_ref.fallback {
                            Fallback::Default(default) => result.push_str(&default),
                            Fallback::Required(message) => {
                                return Err(ConfigError::EnvVarNotSet {
                                    var: var_ref.name,
                                    location: message,
                                });
                            }
                            Fallback::Empty => self.warnings.push(LoadWarning {
                                message: format!(
                                    "Environment variable '{}' is not set, using empty string",
                                    var_ref.name
                                ),
                                location: Some(source_path.display().to_string()),
                            }),
                        },
                    }
                }
                _ => result.push(c),
            }
        }

        Ok(result)
    }

    /// Parses the body of `${...}` after the opening brace.
    fn parse_var_ref(
        chars: &mut std::iter::Peekable<std::str::Chars>,
        source_path: &Path,
    ) -> Result<VarRef, ConfigError> {
        let mut name = String::new();

        while let Some(c) = chars.next() {
            match c {
                '}' => {
                    return Ok(VarRef {
                        name,
                        fallback: Fallback::Empty,
                    });
                }
                ':' => match chars.peek() {
                    Some('-') => {
                        chars.next();
                        let default = Self::read_until_close(chars, source_path)?;
                        return Ok(VarRef {
                            name,
                            fallback: Fallback::Default(default),
                        });
                    }
                    Some('?') => {
                        chars.next();
                        let message = Self::read_until_close(chars, source_path)?;
                        return Ok(VarRef {
                            name,
                            fallback: Fallback::Required(message),
                        });
                    }
                    _ => name.push(':'),
                },
                _ => name.push(c),
            }
        }

        Err(unclosed(source_path, &name))
    }

    /// Reads up to the matching `}`, allowing nested braces.
    fn read_until_close(
        chars: &mut std::iter::Peekable<std::str::Chars>,
        source_path: &Path,
    ) -> Result<String, ConfigError> {
        let mut value = String::new();
        let mut depth = 1;

        for c in chars.by_ref() {
            match c {
                '{' => {
                    depth += 1;
                    value.push(c);
                }
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(value);
                    }
                    value.push(c);
                }
                _ => value.push(c),
            }
        }

        Err(unclosed(source_path, &value))
    }
}

/// A parsed `${...}` reference.
struct VarRef {
    name: String,
    fallback: Fallback,
}

/// What to do when the variable is unset.
enum Fallback {
    Empty,
    Default(String),
    Required(String),
}

fn unclosed(path: &Path, fragment: &str) -> ConfigError {
    ConfigError::ParseError {
        path: PathBuf::from(path),
        line: None,
        message: format!("Unclosed environment variable reference: ${{{fragment}"),
    }
}

/// Parses an environment variable, falling back to `default`.
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ============================================================================
// Tests
// ============================================================================
