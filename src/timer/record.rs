//! Timer records and their phase arithmetic
//!
//! [`TimerData`] is the store's per-timer state. Its methods are pure
//! given their inputs: the tick engine supplies the raw delta and the
//! global dilation, and the record works out how far to advance and
//! whether it changed phase or is due to fire.

use std::sync::{Arc, Weak};

use rand::Rng;

use super::types::{
    DilationMode, DilationSource, INVALID_TIMER_ID, MIN_ACTOR_TIME_DILATION, PHASE_TOLERANCE,
    TimerCallback, TimerPhase,
};

// ============================================================================
// Registration Options
// ============================================================================

/// Parameters for registering a timer.
///
/// Everything except the callback. Defaults describe a one-shot,
/// real-time timer that is suspended by the world pause and starts
/// counting immediately.
#[derive(Clone, Default)]
pub struct TimerOptions {
    /// Seconds the timer must spend running before it fires.
    pub duration: f32,
    /// Time-scaling policy.
    pub dilation_mode: DilationMode,
    /// Source consulted when `dilation_mode` is [`DilationMode::Actor`].
    pub dilation_source: Option<Weak<dyn DilationSource>>,
    /// Keep running while the world is paused.
    pub affected_by_game_pause: bool,
    /// Restart after firing instead of being removed.
    pub looping: bool,
    /// Base seconds to wait before the duration starts counting.
    pub start_delay: f32,
    /// Random spread applied on top of `start_delay`.
    pub start_delay_variation: f32,
}

impl TimerOptions {
    /// A one-shot timer firing after `duration` seconds.
    #[must_use]
    pub fn once(duration: f32) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    /// A timer firing every `duration` seconds until invalidated.
    #[must_use]
    pub fn looping(duration: f32) -> Self {
        Self {
            duration,
            looping: true,
            ..Self::default()
        }
    }

    /// Sets the dilation mode.
    #[must_use]
    pub const fn with_dilation(mut self, mode: DilationMode) -> Self {
        self.dilation_mode = mode;
        self
    }

    /// Scales the timer by `source`, switching to [`DilationMode::Actor`].
    ///
    /// Only a weak reference is kept.
    #[must_use]
    pub fn with_dilation_source<S>(mut self, source: &Arc<S>) -> Self
    where
        S: DilationSource + 'static,
    {
        let weak: Weak<S> = Arc::downgrade(source);
        self.dilation_source = Some(weak);
        self.dilation_mode = DilationMode::Actor;
        self
    }

    /// Sets whether the timer keeps running during a world pause.
    #[must_use]
    pub const fn affected_by_game_pause(mut self, affected: bool) -> Self {
        self.affected_by_game_pause = affected;
        self
    }

    /// Delays the start of the countdown by `base` plus up to `variation`.
    #[must_use]
    pub const fn with_start_delay(mut self, base: f32, variation: f32) -> Self {
        self.start_delay = base;
        self.start_delay_variation = variation;
        self
    }
}

impl std::fmt::Debug for TimerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerOptions")
            .field("duration", &self.duration)
            .field("dilation_mode", &self.dilation_mode)
            .field("has_dilation_source", &self.dilation_source.is_some())
            .field("affected_by_game_pause", &self.affected_by_game_pause)
            .field("looping", &self.looping)
            .field("start_delay", &self.start_delay)
            .field("start_delay_variation", &self.start_delay_variation)
            .finish()
    }
}

/// Resolves the start delay for a new timer.
///
/// The random roll is drawn from `[-variation, variation]` and floored at
/// zero before being added, so the result is never below `base`. A
/// negative variation is taken by magnitude. Huge or infinite variations
/// saturate at `f32::MAX`.
pub fn jittered_start_delay<R: Rng + ?Sized>(base: f32, variation: f32, rng: &mut R) -> f32 {
    let spread = variation.abs();
    // Only the upper half of the symmetric roll survives the floor.
    let unit = (2.0 * rng.random::<f32>() - 1.0).max(0.0);
    let roll = if spread > 0.0 && unit > 0.0 {
        spread * unit
    } else {
        0.0
    };
    (base + roll).max(0.0).min(f32::MAX)
}

// ============================================================================
// Timer Record
// ============================================================================

/// Configuration and live phase state of a single timer.
#[derive(Clone)]
pub struct TimerData {
    /// Store-assigned id; never [`INVALID_TIMER_ID`] once stored.
    pub id: u64,
    /// Invoked on fire.
    pub callback: TimerCallback,
    /// Current lifecycle phase.
    pub phase: TimerPhase,
    /// Seconds accumulated in the current phase.
    pub phase_elapsed: f32,
    /// Seconds required in [`TimerPhase::Running`] before firing.
    pub duration: f32,
    /// Seconds required in [`TimerPhase::InitialDelay`].
    pub initial_delay: f32,
    /// Survives firing and restarts.
    pub looping: bool,
    /// Explicitly paused.
    pub paused: bool,
    /// Keeps running while the world is paused.
    pub affected_by_game_pause: bool,
    /// Time-scaling policy.
    pub dilation_mode: DilationMode,
    /// Weak link to the dilation source for actor-scoped timers.
    pub dilation_source: Option<Weak<dyn DilationSource>>,
    /// Fires on the first tick that observes it, ignoring phase and duration.
    pub next_tick_only: bool,
}

impl TimerData {
    /// Builds an unstored record from registration options.
    ///
    /// `initial_delay` is the already-resolved start delay; a strictly
    /// positive value starts the timer in [`TimerPhase::InitialDelay`].
    #[must_use]
    pub fn new(callback: TimerCallback, options: TimerOptions, initial_delay: f32) -> Self {
        let initial_delay = initial_delay.max(0.0);
        let phase = if initial_delay > 0.0 {
            TimerPhase::InitialDelay
        } else {
            TimerPhase::Running
        };

        Self {
            id: INVALID_TIMER_ID,
            callback,
            phase,
            phase_elapsed: 0.0,
            duration: options.duration.max(0.0),
            initial_delay,
            looping: options.looping,
            paused: false,
            affected_by_game_pause: options.affected_by_game_pause,
            dilation_mode: options.dilation_mode,
            dilation_source: options.dilation_source,
            next_tick_only: false,
        }
    }

    /// Builds an unstored record that fires on the next tick.
    ///
    /// Such timers run through world pauses and never loop.
    #[must_use]
    pub fn next_tick(callback: TimerCallback) -> Self {
        Self {
            id: INVALID_TIMER_ID,
            callback,
            phase: TimerPhase::Running,
            phase_elapsed: 0.0,
            duration: 0.0,
            initial_delay: 0.0,
            looping: false,
            paused: false,
            affected_by_game_pause: true,
            dilation_mode: DilationMode::Ignore,
            dilation_source: None,
            next_tick_only: true,
        }
    }

    /// Whether this tick should skip the timer entirely.
    #[must_use]
    pub const fn is_suspended(&self, world_paused: bool) -> bool {
        self.paused || (world_paused && !self.affected_by_game_pause)
    }

    /// Scales a raw tick delta according to the dilation mode.
    #[must_use]
    pub fn effective_delta(&self, raw_delta: f32, global_dilation: f32) -> f32 {
        match self.dilation_mode {
            DilationMode::Ignore => raw_delta,
            DilationMode::Global => raw_delta * global_dilation,
            DilationMode::Actor => self
                .dilation_source
                .as_ref()
                .and_then(Weak::upgrade)
                .map_or(raw_delta, |source| {
                    raw_delta * source.time_dilation().max(MIN_ACTOR_TIME_DILATION)
                }),
        }
    }

    /// Accumulates time in the current phase.
    ///
    /// Negative deltas are accepted as given.
    pub fn advance(&mut self, effective_delta: f32) {
        self.phase_elapsed += effective_delta;
    }

    /// Leaves the start delay once it has been served.
    ///
    /// Returns `true` on the tick the transition happens; that tick must
    /// not also fire.
    pub fn try_transition(&mut self) -> bool {
        if self.phase == TimerPhase::InitialDelay
            && self.phase_elapsed + PHASE_TOLERANCE >= self.initial_delay
        {
            self.phase = TimerPhase::Running;
            self.phase_elapsed = 0.0;
            return true;
        }
        false
    }

    /// Whether the running countdown has reached its duration.
    #[must_use]
    pub fn should_fire(&self) -> bool {
        self.phase == TimerPhase::Running && self.phase_elapsed + PHASE_TOLERANCE >= self.duration
    }

    /// Seconds until the current phase completes, never negative.
    #[must_use]
    pub fn time_left(&self) -> f32 {
        match self.phase {
            TimerPhase::InitialDelay => (self.initial_delay - self.phase_elapsed).max(0.0),
            TimerPhase::Running => (self.duration - self.phase_elapsed).max(0.0),
        }
    }

    /// Restarts a looping timer after it fired.
    pub const fn restart(&mut self) {
        self.phase = TimerPhase::Running;
        self.phase_elapsed = 0.0;
        self.next_tick_only = false;
    }
}

impl std::fmt::Debug for TimerData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerData")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .field("phase_elapsed", &self.phase_elapsed)
            .field("duration", &self.duration)
            .field("initial_delay", &self.initial_delay)
            .field("looping", &self.looping)
            .field("paused", &self.paused)
            .field("next_tick_only", &self.next_tick_only)
            .field("dilation_mode", &self.dilation_mode)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
