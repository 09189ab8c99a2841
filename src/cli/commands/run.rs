//! `run` command handler
//!
//! Loads a schedule, registers its timers against a [`SimulatedWorld`]
//! and drives [`TimerManager::tick`] from a fixed-rate tokio interval
//! until `run_for` of simulated time has elapsed or a signal arrives.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use indexmap::IndexMap;
use tokio::time::{Instant, MissedTickBehavior};

use super::Shutdown;
use crate::cli::args::{OutputFormat, RunArgs};
use crate::config::validation::MAX_TICK_RATE_HZ;
use crate::config::{ConfigLoader, Schedule, TimerConfig};
use crate::error::TimekeeperError;
use crate::observability::{Event, EventEmitter, RunSummary, StopReason, init_metrics};
use crate::timer::{
    DilationMode, DilationScale, ManagerSettings, SimulatedWorld, TimerCallback, TimerHandle,
    TimerManager, TimerOptions,
};

/// Run a schedule.
///
/// # Errors
///
/// Returns an error if the schedule fails to load, an override is out of
/// range, the metrics exporter cannot start, or the events file cannot
/// be created.
pub async fn run(args: &RunArgs, shutdown: &Shutdown) -> Result<StopReason, TimekeeperError> {
    let loaded = ConfigLoader::with_defaults().load(&args.config)?;
    for warning in &loaded.warnings {
        tracing::warn!(%warning, "schedule warning");
    }
    let schedule = loaded.schedule;

    let plan = RunPlan::resolve(&schedule, args)?;

    if args.metrics_port.is_some() {
        init_metrics(args.metrics_port)?;
    }

    let emitter = match &args.events_file {
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::stderr(),
    };
    let state = Arc::new(RunState::new(emitter, &schedule.timers));

    let world = Arc::new(SimulatedWorld::new());
    world.set_global_time_dilation(schedule.world.global_time_dilation);

    let actors: IndexMap<String, Arc<DilationScale>> = schedule
        .actors
        .iter()
        .map(|a| (a.name.clone(), Arc::new(DilationScale::new(a.time_dilation))))
        .collect();

    let manager = TimerManager::initialize(
        ManagerSettings {
            capacity: schedule.scheduler.capacity,
            jitter_seed: schedule.scheduler.jitter_seed,
        },
        world.clone(),
    );

    for (index, entry) in schedule.timers.iter().enumerate() {
        let handle = register(&manager, entry, &actors, state.callback(index));
        state.ids[index].store(handle.id(), Ordering::Relaxed);
        state.emitter.emit(Event::TimerRegistered {
            timestamp: Utc::now(),
            name: entry.name.clone(),
            timer_id: handle.id(),
        });
    }

    tracing::info!(
        config = %args.config.display(),
        tick_rate_hz = plan.tick_rate_hz,
        run_for = ?plan.run_for,
        timers = schedule.timers.len(),
        actors = actors.len(),
        "starting scheduler"
    );
    state.emitter.emit(Event::SchedulerStarted {
        timestamp: Utc::now(),
        tick_rate_hz: plan.tick_rate_hz,
        timers: schedule.timers.len(),
    });

    let period = Duration::from_secs_f64(1.0 / plan.tick_rate_hz);
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = interval.tick().await;

    let mut ticks: u64 = 0;
    let mut simulated = Duration::ZERO;

    let reason = loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                break shutdown.reason().unwrap_or(StopReason::Interrupted);
            }
            now = interval.tick() => {
                let delta = step(now, &mut last, simulated, plan.run_for);
                world.set_paused(plan.is_paused_at(simulated.as_secs_f64()));
                simulated += delta;
                state.set_sim_time(simulated);

                manager.tick(delta.as_secs_f32());
                ticks += 1;

                if simulated >= plan.run_for {
                    break StopReason::Completed;
                }
            }
        }
    };

    let summary = RunSummary {
        ticks,
        simulated_secs: simulated.as_secs_f64(),
        fires: state.fire_counts(&schedule.timers),
        active_timers: manager.active_timer_count(),
    };

    tracing::info!(%reason, %summary, "scheduler stopped");
    state.emitter.emit(Event::SchedulerStopped {
        timestamp: Utc::now(),
        reason,
        summary: Some(summary.clone()),
    });

    print_summary(&summary, args.format)?;
    if args.dump {
        let live = manager.dump_active_timers();
        println!("{}", serde_json::to_string_pretty(&live)?);
    }

    manager.deinitialize();
    Ok(reason)
}

// ============================================================================
// Run Plan
// ============================================================================

/// Tick rate, run length and pause windows after CLI overrides.
#[derive(Debug, Clone)]
struct RunPlan {
    tick_rate_hz: f64,
    run_for: Duration,
    pause_windows: Vec<(f64, f64)>,
}

impl RunPlan {
    fn resolve(schedule: &Schedule, args: &RunArgs) -> Result<Self, TimekeeperError> {
        let tick_rate_hz = args.tick_rate.unwrap_or(schedule.scheduler.tick_rate_hz);
        if !(tick_rate_hz > 0.0 && tick_rate_hz <= MAX_TICK_RATE_HZ) {
            return Err(TimekeeperError::Usage(format!(
                "--tick-rate must be in (0, {MAX_TICK_RATE_HZ}], got {tick_rate_hz}"
            )));
        }

        let run_for = match args.run_for {
            Some(run_for) => run_for,
            None => schedule
                .scheduler
                .run_for_secs()
                .map(Duration::from_secs_f64)
                .ok_or_else(|| {
                    TimekeeperError::Usage(format!(
                        "invalid run_for '{}'",
                        schedule.scheduler.run_for
                    ))
                })?,
        };
        if run_for.is_zero() {
            return Err(TimekeeperError::Usage("--run-for must be positive".into()));
        }

        let pause_windows = schedule
            .world
            .pause_windows
            .iter()
            .filter_map(crate::config::PauseWindow::bounds)
            .collect();

        Ok(Self {
            tick_rate_hz,
            run_for,
            pause_windows,
        })
    }

    /// Whether `at` seconds falls inside any `[from, until)` window.
    fn is_paused_at(&self, at: f64) -> bool {
        self.pause_windows
            .iter()
            .any(|&(from, until)| at >= from && at < until)
    }
}

/// Wall time since the previous tick, clamped so the run never overshoots.
fn step(now: Instant, last: &mut Instant, simulated: Duration, run_for: Duration) -> Duration {
    let delta = now.saturating_duration_since(*last);
    *last = now;
    delta.min(run_for.saturating_sub(simulated))
}

// ============================================================================
// Registration
// ============================================================================

fn register(
    manager: &TimerManager,
    entry: &TimerConfig,
    actors: &IndexMap<String, Arc<DilationScale>>,
    callback: TimerCallback,
) -> TimerHandle {
    let handle = if entry.next_tick {
        manager.set_timer_next_tick(callback)
    } else {
        manager.set_timer(callback, options_for(entry, actors))
    };

    if entry.start_paused {
        handle.pause();
    }
    tracing::debug!(name = %entry.name, id = handle.id(), "registered schedule entry");
    handle
}

fn options_for(entry: &TimerConfig, actors: &IndexMap<String, Arc<DilationScale>>) -> TimerOptions {
    let mut options = if entry.looping {
        TimerOptions::looping(entry.duration_secs())
    } else {
        TimerOptions::once(entry.duration_secs())
    };
    options = options
        .with_dilation(entry.dilation)
        .affected_by_game_pause(entry.affected_by_game_pause)
        .with_start_delay(entry.start_delay_secs(), entry.start_delay_variation_secs());

    if entry.dilation == DilationMode::Actor
        && let Some(scale) = entry.actor.as_ref().and_then(|name| actors.get(name))
    {
        options = options.with_dilation_source(scale);
    }
    options
}

// ============================================================================
// Shared Run State
// ============================================================================

/// State shared between the tick loop and timer callbacks.
struct RunState {
    emitter: EventEmitter,
    /// Simulated time in microseconds.
    sim_micros: AtomicU64,
    /// Manager ids by schedule index, filled in after registration.
    ids: Vec<AtomicU64>,
    /// Fire counts by schedule index.
    fires: Vec<AtomicU64>,
    names: Vec<String>,
}

impl RunState {
    fn new(emitter: EventEmitter, timers: &[TimerConfig]) -> Self {
        Self {
            emitter,
            sim_micros: AtomicU64::new(0),
            ids: timers.iter().map(|_| AtomicU64::new(0)).collect(),
            fires: timers.iter().map(|_| AtomicU64::new(0)).collect(),
            names: timers.iter().map(|t| t.name.clone()).collect(),
        }
    }

    fn set_sim_time(&self, simulated: Duration) {
        let micros = u64::try_from(simulated.as_micros()).unwrap_or(u64::MAX);
        self.sim_micros.store(micros, Ordering::Relaxed);
    }

    fn callback(self: &Arc<Self>, index: usize) -> TimerCallback {
        let state = Arc::clone(self);
        TimerCallback::new(move || state.on_fire(index))
    }

    #[allow(clippy::cast_precision_loss)]
    fn on_fire(&self, index: usize) {
        let fire_count = self.fires[index].fetch_add(1, Ordering::Relaxed) + 1;
        let sim_time_secs = self.sim_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        let name = &self.names[index];
        let timer_id = self.ids[index].load(Ordering::Relaxed);

        tracing::debug!(%name, timer_id, fire_count, sim_time_secs, "timer fired");
        self.emitter.emit(Event::TimerFired {
            timestamp: Utc::now(),
            name: name.clone(),
            timer_id,
            sim_time_secs,
            fire_count,
        });
    }

    fn fire_counts(&self, timers: &[TimerConfig]) -> IndexMap<String, u64> {
        timers
            .iter()
            .zip(&self.fires)
            .map(|(t, count)| (t.name.clone(), count.load(Ordering::Relaxed)))
            .collect()
    }
}

fn print_summary(summary: &RunSummary, format: OutputFormat) -> Result<(), TimekeeperError> {
    match format {
        OutputFormat::Human => {
            println!("{summary}");
            for (name, count) in &summary.fires {
                println!("  {name}: {count}");
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(summary)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PauseWindow;
    use std::path::PathBuf;

    fn args() -> RunArgs {
        RunArgs {
            config: PathBuf::from("s.yaml"),
            tick_rate: None,
            run_for: None,
            events_file: None,
            metrics_port: None,
            dump: false,
            format: OutputFormat::Human,
        }
    }

    #[test]
    fn test_plan_uses_schedule_values() {
        let mut schedule = Schedule::default();
        schedule.scheduler.run_for = "2s".into();
        schedule.world.pause_windows.push(PauseWindow {
            from: "500ms".into(),
            until: "1s".into(),
        });

        let plan = RunPlan::resolve(&schedule, &args()).unwrap();
        assert!((plan.tick_rate_hz - 60.0).abs() < f64::EPSILON);
        assert_eq!(plan.run_for, Duration::from_secs(2));
        assert!(!plan.is_paused_at(0.4));
        assert!(plan.is_paused_at(0.5));
        assert!(plan.is_paused_at(0.99));
        assert!(!plan.is_paused_at(1.0));
    }

    #[test]
    fn test_plan_overrides() {
        let mut overrides = args();
        overrides.tick_rate = Some(10.0);
        overrides.run_for = Some(Duration::from_millis(300));

        let plan = RunPlan::resolve(&Schedule::default(), &overrides).unwrap();
        assert!((plan.tick_rate_hz - 10.0).abs() < f64::EPSILON);
        assert_eq!(plan.run_for, Duration::from_millis(300));
    }

    #[test]
    fn test_plan_rejects_bad_tick_rate() {
        for rate in [0.0, -5.0, MAX_TICK_RATE_HZ + 1.0, f64::NAN] {
            let mut overrides = args();
            overrides.tick_rate = Some(rate);
            let err = RunPlan::resolve(&Schedule::default(), &overrides).unwrap_err();
            assert!(matches!(err, TimekeeperError::Usage(_)), "rate {rate}");
        }
    }

    #[test]
    fn test_plan_rejects_zero_run_for() {
        let mut overrides = args();
        overrides.run_for = Some(Duration::ZERO);
        assert!(RunPlan::resolve(&Schedule::default(), &overrides).is_err());
    }

    #[test]
    fn test_step_clamps_to_remaining() {
        let start = Instant::now();
        let mut last = start;
        let now = start + Duration::from_millis(100);

        let delta = step(now, &mut last, Duration::from_millis(950), Duration::from_secs(1));
        assert_eq!(delta, Duration::from_millis(50));
        assert_eq!(last, now);
    }

    #[test]
    fn test_options_bind_actor() {
        let actors: IndexMap<String, Arc<DilationScale>> =
            [("slowmo".to_string(), Arc::new(DilationScale::new(0.5)))]
                .into_iter()
                .collect();
        let entry = TimerConfig {
            name: "slow".into(),
            duration: Some("1s".into()),
            dilation: DilationMode::Actor,
            actor: Some("slowmo".into()),
            ..TimerConfig::default()
        };

        let options = options_for(&entry, &actors);
        assert_eq!(options.dilation_mode, DilationMode::Actor);
        assert!(options.dilation_source.is_some());
        assert!((options.duration - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_callbacks_count_fires() {
        let timers = vec![
            TimerConfig {
                name: "a".into(),
                ..TimerConfig::default()
            },
            TimerConfig {
                name: "b".into(),
                ..TimerConfig::default()
            },
        ];
        let state = Arc::new(RunState::new(EventEmitter::noop(), &timers));
        state.set_sim_time(Duration::from_millis(1500));

        let cb = state.callback(1);
        assert!(cb.invoke());
        assert!(cb.invoke());

        let counts = state.fire_counts(&timers);
        assert_eq!(counts["a"], 0);
        assert_eq!(counts["b"], 2);
        assert_eq!(state.emitter.event_count(), 2);
    }
}
