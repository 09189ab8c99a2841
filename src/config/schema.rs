//! Schedule schema types
//!
//! A schedule describes a set of timers plus the simulated world and
//! actors they run against. Durations are humantime strings (`"1s"`,
//! `"250ms"`, `"1m 30s"`) and are checked by the validator before use.

use serde::{Deserialize, Serialize};

use crate::timer::{DilationMode, ScratchCapacity};

// ============================================================================
// Top-Level Schedule
// ============================================================================

/// Root of a schedule file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Schedule {
    /// Tick loop settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Simulated world state.
    #[serde(default)]
    pub world: WorldConfig,

    /// Named dilation sources for actor-scoped timers.
    #[serde(default)]
    pub actors: Vec<ActorConfig>,

    /// Timers to register, in registration order.
    #[serde(default)]
    pub timers: Vec<TimerConfig>,
}

// ============================================================================
// Scheduler
// ============================================================================

/// Tick loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Ticks per second.
    #[serde(default = "default_tick_rate")]
    pub tick_rate_hz: f64,

    /// How long to run, as a humantime duration.
    #[serde(default = "default_run_for")]
    pub run_for: String,

    /// Seed for start-delay jitter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter_seed: Option<u64>,

    /// Pre-reserved buffer capacities.
    #[serde(default)]
    pub capacity: ScratchCapacity,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: default_tick_rate(),
            run_for: default_run_for(),
            jitter_seed: None,
            capacity: ScratchCapacity::default(),
        }
    }
}

const fn default_tick_rate() -> f64 {
    60.0
}

fn default_run_for() -> String {
    "10s".to_string()
}

// ============================================================================
// World and Actors
// ============================================================================

/// Simulated world state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorldConfig {
    /// Global dilation applied to `global` timers.
    #[serde(default = "default_dilation")]
    pub global_time_dilation: f32,

    /// Spans of simulated time during which the world is paused.
    #[serde(default)]
    pub pause_windows: Vec<PauseWindow>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            global_time_dilation: default_dilation(),
            pause_windows: Vec::new(),
        }
    }
}

/// A half-open span `[from, until)` of simulated time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PauseWindow {
    /// Start, as a humantime offset from the start of the run.
    pub from: String,
    /// End, as a humantime offset from the start of the run.
    pub until: String,
}

/// A named dilation source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActorConfig {
    /// Name referenced by `timers[].actor`.
    pub name: String,

    /// Dilation factor.
    #[serde(default = "default_dilation")]
    pub time_dilation: f32,
}

const fn default_dilation() -> f32 {
    1.0
}

// ============================================================================
// Timers
// ============================================================================

/// One timer to register.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimerConfig {
    /// Unique name, used in events and the summary.
    pub name: String,

    /// Running-phase duration. Required unless `next_tick` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,

    /// Restart after firing.
    #[serde(default, rename = "loop")]
    pub looping: bool,

    /// Dilation policy.
    #[serde(default)]
    pub dilation: DilationMode,

    /// Actor name, for `dilation: actor`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,

    /// Keep running while the world is paused.
    #[serde(default)]
    pub affected_by_game_pause: bool,

    /// Base start delay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_delay: Option<String>,

    /// Random spread added on top of the start delay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_delay_variation: Option<String>,

    /// Fire once on the first tick instead of after a duration.
    #[serde(default)]
    pub next_tick: bool,

    /// Register the timer already paused.
    #[serde(default)]
    pub start_paused: bool,
}

/// Parses a humantime duration into seconds.
#[must_use]
pub fn parse_seconds(text: &str) -> Option<f64> {
    humantime::parse_duration(text.trim())
        .ok()
        .map(|d| d.as_secs_f64())
}

/// Parses an optional humantime duration; absent means zero.
#[allow(clippy::cast_possible_truncation)]
fn optional_secs(text: Option<&String>) -> f32 {
    text.and_then(|t| parse_seconds(t)).unwrap_or(0.0) as f32
}

impl TimerConfig {
    /// Duration in seconds (0 when absent or unparseable).
    #[must_use]
    pub fn duration_secs(&self) -> f32 {
        optional_secs(self.duration.as_ref())
    }

    /// Start delay in seconds.
    #[must_use]
    pub fn start_delay_secs(&self) -> f32 {
        optional_secs(self.start_delay.as_ref())
    }

    /// Start delay variation in seconds.
    #[must_use]
    pub fn start_delay_variation_secs(&self) -> f32 {
        optional_secs(self.start_delay_variation.as_ref())
    }
}

impl PauseWindow {
    /// `(from, until)` in seconds, if both parse.
    #[must_use]
    pub fn bounds(&self) -> Option<(f64, f64)> {
        Some((parse_seconds(&self.from)?, parse_seconds(&self.until)?))
    }
}

impl SchedulerConfig {
    /// `run_for` in seconds, if it parses.
    #[must_use]
    pub fn run_for_secs(&self) -> Option<f64> {
        parse_seconds(&self.run_for)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
scheduler:
  tick_rate_hz: 30
  run_for: "2s"
  jitter_seed: 7
  capacity: { timers: 16 }
world:
  global_time_dilation: 0.5
  pause_windows:
    - { from: "500ms", until: "1s" }
actors:
  - { name: slowmo, time_dilation: 0.25 }
timers:
  - name: heartbeat
    duration: "1s"
    loop: true
  - name: slow
    duration: "250ms"
    dilation: actor
    actor: slowmo
    start_delay: "100ms"
    start_delay_variation: "50ms"
  - name: kick
    next_tick: true
"#;

    #[test]
    fn test_parse_full_schedule() {
        let schedule: Schedule = serde_yaml::from_str(SAMPLE).unwrap();
        assert!((schedule.scheduler.tick_rate_hz - 30.0).abs() < f64::EPSILON);
        assert_eq!(schedule.scheduler.jitter_seed, Some(7));
        assert_eq!(schedule.scheduler.capacity.timers, 16);
        assert_eq!(schedule.scheduler.capacity.fired, 128);
        assert_eq!(schedule.world.pause_windows[0].bounds(), Some((0.5, 1.0)));
        assert_eq!(schedule.actors[0].name, "slowmo");

        let heartbeat = &schedule.timers[0];
        assert!(heartbeat.looping);
        assert_eq!(heartbeat.dilation, DilationMode::Ignore);
        assert!((heartbeat.duration_secs() - 1.0).abs() < f32::EPSILON);

        let slow = &schedule.timers[1];
        assert_eq!(slow.dilation, DilationMode::Actor);
        assert!((slow.start_delay_secs() - 0.1).abs() < 1e-6);
        assert!((slow.start_delay_variation_secs() - 0.05).abs() < 1e-6);

        assert!(schedule.timers[2].next_tick);
        assert!(schedule.timers[2].duration.is_none());
    }

    #[test]
    fn test_defaults() {
        let schedule: Schedule = serde_yaml::from_str("timers: []").unwrap();
        assert!((schedule.scheduler.tick_rate_hz - 60.0).abs() < f64::EPSILON);
        assert_eq!(schedule.scheduler.run_for_secs(), Some(10.0));
        assert!((schedule.world.global_time_dilation - 1.0).abs() < f32::EPSILON);
        assert!(schedule.actors.is_empty());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<Schedule, _> =
            serde_yaml::from_str("timers:\n  - name: a\n    duraton: 1s\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_seconds() {
        assert_eq!(parse_seconds("1m 30s"), Some(90.0));
        assert_eq!(parse_seconds(" 250ms "), Some(0.25));
        assert_eq!(parse_seconds("soon"), None);
        assert_eq!(parse_seconds(""), None);
    }
}
