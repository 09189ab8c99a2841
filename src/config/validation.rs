//! Schedule validation
//!
//! Runs on the fully deserialized [`Schedule`]. Every issue is collected
//! rather than stopping at the first, so a single pass reports everything
//! wrong with a file.

use std::collections::HashSet;

use crate::config::loader::ConfigLimits;
use crate::config::schema::{Schedule, TimerConfig, parse_seconds};
use crate::error::{Severity, ValidationIssue};
use crate::timer::DilationMode;

/// Highest accepted tick rate.
pub const MAX_TICK_RATE_HZ: f64 = 1000.0;

// ============================================================================
// Public API
// ============================================================================

/// Result of schedule validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Schedule validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a schedule and returns every issue found.
    pub fn validate(&mut self, schedule: &Schedule, limits: &ConfigLimits) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_scheduler(schedule);
        self.validate_world(schedule);
        let actors = self.validate_actors(schedule);
        self.validate_timers(&schedule.timers, &actors);
        self.validate_limits(schedule, limits);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    // ========================================================================
    // Sections
    // ========================================================================

    fn validate_scheduler(&mut self, schedule: &Schedule) {
        let rate = schedule.scheduler.tick_rate_hz;
        if !(rate > 0.0 && rate <= MAX_TICK_RATE_HZ) {
            self.add_error(
                "scheduler.tick_rate_hz",
                &format!("Tick rate {rate} must be greater than 0 and at most {MAX_TICK_RATE_HZ}"),
            );
        }
        self.validate_duration(&schedule.scheduler.run_for, "scheduler.run_for");
    }

    fn validate_world(&mut self, schedule: &Schedule) {
        let dilation = schedule.world.global_time_dilation;
        if dilation <= 0.0 {
            self.add_warning(
                "world.global_time_dilation",
                &format!("Global dilation {dilation} is not positive; global timers will stall or run backwards"),
            );
        }

        for (i, window) in schedule.world.pause_windows.iter().enumerate() {
            let path = format!("world.pause_windows[{i}]");
            let from = self.validate_duration(&window.from, &format!("{path}.from"));
            let until = self.validate_duration(&window.until, &format!("{path}.until"));
            if let (Some(from), Some(until)) = (from, until) {
                if from >= until {
                    self.add_error(&path, "Pause window must end after it starts");
                }
            }
        }
    }

    /// Checks actor entries and returns the set of declared names.
    fn validate_actors<'a>(&mut self, schedule: &'a Schedule) -> HashSet<&'a str> {
        let mut names = HashSet::new();
        for (i, actor) in schedule.actors.iter().enumerate() {
            let path = format!("actors[{i}]");
            if actor.name.trim().is_empty() {
                self.add_error(&format!("{path}.name"), "Actor name cannot be empty");
            } else if !names.insert(actor.name.as_str()) {
                self.add_error(
                    &format!("{path}.name"),
                    &format!("Duplicate actor name '{}'", actor.name),
                );
            }
            if actor.time_dilation <= 0.0 {
                self.add_warning(
                    &format!("{path}.time_dilation"),
                    &format!(
                        "Actor dilation {} is not positive; it will be floored to a tiny positive scale",
                        actor.time_dilation
                    ),
                );
            }
        }
        names
    }

    fn validate_timers(&mut self, timers: &[TimerConfig], actors: &HashSet<&str>) {
        let mut names = HashSet::new();
        for (i, timer) in timers.iter().enumerate() {
            let path = format!("timers[{i}]");

            if timer.name.trim().is_empty() {
                self.add_error(&format!("{path}.name"), "Timer name cannot be empty");
            } else if !names.insert(timer.name.as_str()) {
                self.add_error(
                    &format!("{path}.name"),
                    &format!("Duplicate timer name '{}'", timer.name),
                );
            }

            if timer.next_tick {
                self.validate_next_tick(timer, &path);
            } else {
                match &timer.duration {
                    Some(d) => {
                        self.validate_duration(d, &format!("{path}.duration"));
                    }
                    None => self.add_error(
                        &format!("{path}.duration"),
                        "Duration is required unless next_tick is set",
                    ),
                }
                if let Some(d) = &timer.start_delay {
                    self.validate_duration(d, &format!("{path}.start_delay"));
                }
                if let Some(d) = &timer.start_delay_variation {
                    self.validate_duration(d, &format!("{path}.start_delay_variation"));
                }
            }

            self.validate_timer_actor(timer, actors, &path);
        }
    }

    fn validate_next_tick(&mut self, timer: &TimerConfig, path: &str) {
        let ignored: Vec<&str> = [
            ("loop", timer.looping),
            ("duration", timer.duration.is_some()),
            ("start_delay", timer.start_delay.is_some()),
            ("start_delay_variation", timer.start_delay_variation.is_some()),
        ]
        .into_iter()
        .filter_map(|(field, set)| set.then_some(field))
        .collect();

        if !ignored.is_empty() {
            self.add_warning(
                path,
                &format!(
                    "next_tick timers fire once on the next tick; ignoring {}",
                    ignored.join(", ")
                ),
            );
        }
    }

    fn validate_timer_actor(&mut self, timer: &TimerConfig, actors: &HashSet<&str>, path: &str) {
        match (timer.dilation, &timer.actor) {
            (DilationMode::Actor, Some(actor)) if !actors.contains(actor.as_str()) => {
                self.add_error(
                    &format!("{path}.actor"),
                    &format!("Unknown actor '{actor}'"),
                );
            }
            (DilationMode::Actor, None) => {
                self.add_error(
                    &format!("{path}.actor"),
                    "dilation: actor requires an actor name",
                );
            }
            (DilationMode::Ignore | DilationMode::Global, Some(_)) => {
                self.add_warning(
                    &format!("{path}.actor"),
                    "actor is only used with dilation: actor; ignoring",
                );
            }
            _ => {}
        }
    }

    fn validate_limits(&mut self, schedule: &Schedule, limits: &ConfigLimits) {
        if schedule.timers.len() > limits.max_timers {
            self.add_error(
                "timers",
                &format!(
                    "Too many timers: {} (max {})",
                    schedule.timers.len(),
                    limits.max_timers
                ),
            );
        }
    }

    /// Validates a humantime duration string and returns it in seconds.
    fn validate_duration(&mut self, duration: &str, path: &str) -> Option<f64> {
        if duration.trim().is_empty() {
            self.add_error(path, "Duration cannot be empty");
            return None;
        }
        let parsed = parse_seconds(duration);
        if parsed.is_none() {
            self.add_error(
                path,
                &format!("Invalid duration '{duration}'. Expected a duration such as 500ms, 2s or 1m 30s"),
            );
        }
        parsed
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
