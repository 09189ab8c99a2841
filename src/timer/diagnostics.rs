//! Introspection for the timer manager
//!
//! Counters describing the last tick and a serializable view of live
//! records. Nothing here feeds back into scheduling.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use super::manager::TimerManager;
use super::record::TimerData;
use super::types::{DilationMode, TimerPhase};

/// Per-tick counters, updated at the end of every tick.
#[derive(Debug, Default)]
pub struct TickStats {
    ticks: AtomicU64,
    last_tick_nanos: AtomicU64,
    processed_last_tick: AtomicUsize,
    fired_last_tick: AtomicUsize,
}

impl TickStats {
    /// Stores the results of one completed tick.
    pub fn record(&self, elapsed: Duration, processed: usize, fired: usize) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.last_tick_nanos.store(nanos, Ordering::Relaxed);
        self.processed_last_tick.store(processed, Ordering::Relaxed);
        self.fired_last_tick.store(fired, Ordering::Relaxed);
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Wall-clock time spent in the last tick.
    #[must_use]
    pub fn last_tick_duration(&self) -> Duration {
        Duration::from_nanos(self.last_tick_nanos.load(Ordering::Relaxed))
    }

    /// Timers advanced by the last tick's mutate pass.
    ///
    /// Next-tick timers and timers that left their start delay on that
    /// tick are not counted.
    #[must_use]
    pub fn processed_last_tick(&self) -> usize {
        self.processed_last_tick.load(Ordering::Relaxed)
    }

    /// Callbacks attempted by the last tick.
    #[must_use]
    pub fn fired_last_tick(&self) -> usize {
        self.fired_last_tick.load(Ordering::Relaxed)
    }

    /// Ticks completed since the session started.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Zeroes every counter.
    pub fn reset(&self) {
        self.ticks.store(0, Ordering::Relaxed);
        self.last_tick_nanos.store(0, Ordering::Relaxed);
        self.processed_last_tick.store(0, Ordering::Relaxed);
        self.fired_last_tick.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time view of one live timer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerSnapshot {
    /// Timer id.
    pub id: u64,
    /// Lifecycle phase.
    pub phase: TimerPhase,
    /// Seconds accumulated in the phase.
    pub phase_elapsed: f32,
    /// Running-phase duration.
    pub duration: f32,
    /// Start delay.
    pub initial_delay: f32,
    /// Looping flag.
    pub looping: bool,
    /// Explicit pause flag.
    pub paused: bool,
    /// Runs through world pauses.
    pub affected_by_game_pause: bool,
    /// Pending next-tick fire.
    pub next_tick_only: bool,
    /// Dilation policy.
    pub dilation_mode: DilationMode,
    /// Whether a callback is bound.
    pub bound: bool,
}

impl From<&TimerData> for TimerSnapshot {
    fn from(t: &TimerData) -> Self {
        Self {
            id: t.id,
            phase: t.phase,
            phase_elapsed: t.phase_elapsed,
            duration: t.duration,
            initial_delay: t.initial_delay,
            looping: t.looping,
            paused: t.paused,
            affected_by_game_pause: t.affected_by_game_pause,
            next_tick_only: t.next_tick_only,
            dilation_mode: t.dilation_mode,
            bound: t.callback.is_bound(),
        }
    }
}

impl TimerManager {
    /// Number of live timers.
    #[must_use]
    pub fn active_timer_count(&self) -> usize {
        self.store.len()
    }

    /// Wall-clock time the last tick took.
    #[must_use]
    pub fn last_tick_duration(&self) -> Duration {
        self.stats.last_tick_duration()
    }

    /// See [`TickStats::processed_last_tick`].
    #[must_use]
    pub fn timers_processed_last_tick(&self) -> usize {
        self.stats.processed_last_tick()
    }

    /// Callbacks attempted in the last tick.
    #[must_use]
    pub fn timers_fired_last_tick(&self) -> usize {
        self.stats.fired_last_tick()
    }

    /// Ticks completed since the session started.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.stats.tick_count()
    }

    /// Copies every live record and logs each one at `info`.
    pub fn dump_active_timers(&self) -> Vec<TimerSnapshot> {
        let mut out = Vec::with_capacity(self.store.len());
        self.store.for_each(|_, t| out.push(TimerSnapshot::from(t)));

        info!(count = out.len(), "active timers");
        for t in &out {
            info!(
                timer_id = t.id,
                phase = ?t.phase,
                elapsed = t.phase_elapsed,
                duration = t.duration,
                delay = t.initial_delay,
                looping = t.looping,
                paused = t.paused,
                next_tick = t.next_tick_only,
                mode = %t.dilation_mode,
                "timer"
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::record::TimerOptions;
    use crate::timer::types::TimerCallback;

    #[test]
    fn test_record_and_reset() {
        let stats = TickStats::default();
        stats.record(Duration::from_micros(250), 4, 1);
        stats.record(Duration::from_micros(100), 3, 0);

        assert_eq!(stats.tick_count(), 2);
        assert_eq!(stats.last_tick_duration(), Duration::from_micros(100));
        assert_eq!(stats.processed_last_tick(), 3);
        assert_eq!(stats.fired_last_tick(), 0);

        stats.reset();
        assert_eq!(stats.tick_count(), 0);
        assert_eq!(stats.last_tick_duration(), Duration::ZERO);
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut data = TimerData::new(TimerCallback::new(|| {}), TimerOptions::looping(2.0), 0.0);
        data.id = 9;
        let snap = TimerSnapshot::from(&data);
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["id"], 9);
        assert_eq!(json["phase"], "running");
        assert_eq!(json["looping"], true);
        assert_eq!(json["bound"], true);
        assert_eq!(json["dilation_mode"], "ignore");
    }

    #[test]
    fn test_dump_lists_live_timers_in_order() {
        use crate::timer::manager::ManagerSettings;
        use crate::timer::world::SimulatedWorld;
        use std::sync::Arc;

        let m = TimerManager::initialize(ManagerSettings::default(), Arc::new(SimulatedWorld::new()));
        let a = m.set_timer(TimerCallback::unbound(), TimerOptions::once(1.0));
        let b = m.set_timer(TimerCallback::unbound(), TimerOptions::looping(3.0));
        m.tick(0.5);

        let dump = m.dump_active_timers();
        assert_eq!(m.active_timer_count(), 2);
        assert_eq!(dump.iter().map(|t| t.id).collect::<Vec<_>>(), vec![a.id(), b.id()]);
        assert!((dump[0].phase_elapsed - 0.5).abs() < 1e-5);
        assert!(!dump[1].bound);
        assert_eq!(m.tick_count(), 1);
        assert_eq!(m.timers_processed_last_tick(), 2);
        assert_eq!(m.timers_fired_last_tick(), 0);
    }
}
