//! Timer manager session object
//!
//! `TimerManager` owns the store, the scratch buffers reused across ticks,
//! the deferred removal/unpause queues and the owner-thread context. It is
//! always created behind an `Arc` so that handles can hold a `Weak` back to
//! it; dropping the last strong reference ends the session.
//!
//! Mutating entry points run through one owner-thread wrapper: inline on
//! the owner thread, forwarded to it from anywhere else.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::affinity::OwnerContext;
use super::diagnostics::TickStats;
use super::handle::TimerHandle;
use super::record::{TimerData, TimerOptions, jittered_start_delay};
use super::store::TimerStore;
use super::types::{ABSENT_TIME, DilationMode, TimerCallback};
use super::world::WorldContext;

// ============================================================================
// Settings
// ============================================================================

/// Capacities reserved up front for the store and the per-tick buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScratchCapacity {
    /// Expected number of live timers.
    pub timers: usize,
    /// Expected number of timers firing in one tick.
    pub fired: usize,
    /// Expected number of removals queued in one tick.
    pub removals: usize,
    /// Expected number of deferred unpauses queued in one tick.
    pub unpauses: usize,
}

impl Default for ScratchCapacity {
    fn default() -> Self {
        Self {
            timers: 256,
            fired: 128,
            removals: 128,
            unpauses: 64,
        }
    }
}

/// Session settings for [`TimerManager::initialize`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSettings {
    /// Buffer capacities.
    pub capacity: ScratchCapacity,
    /// Seed for start-delay jitter. `None` seeds from the OS.
    pub jitter_seed: Option<u64>,
}

impl ManagerSettings {
    /// Settings with a fixed jitter seed.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            jitter_seed: Some(seed),
            ..Self::default()
        }
    }
}

// ============================================================================
// Scratch State
// ============================================================================

/// Buffers reused by every tick.
#[derive(Debug, Default)]
pub(super) struct TickBuffers {
    /// Copies of every record, taken at the start of the tick.
    pub(super) snapshot: Vec<(u64, TimerData)>,
    /// Ids found due during the quick and mutate passes.
    pub(super) fire_set: Vec<u64>,
    /// Ids whose callbacks are being invoked.
    pub(super) executing: Vec<u64>,
}

impl TickBuffers {
    fn with_capacity(capacity: &ScratchCapacity) -> Self {
        Self {
            snapshot: Vec::with_capacity(capacity.timers),
            fire_set: Vec::with_capacity(capacity.fired),
            executing: Vec::with_capacity(capacity.fired),
        }
    }

    fn clear(&mut self) {
        self.snapshot.clear();
        self.fire_set.clear();
        self.executing.clear();
    }
}

/// Work queued for the cleanup step.
#[derive(Debug, Default)]
pub(super) struct PendingOps {
    pub(super) to_remove: Vec<u64>,
    pub(super) to_unpause: Vec<u64>,
}

// ============================================================================
// Manager
// ============================================================================

/// The timer session: store, tick pipeline state and owner context.
pub struct TimerManager {
    pub(super) store: TimerStore,
    pub(super) buffers: Mutex<TickBuffers>,
    pub(super) pending: Mutex<PendingOps>,
    pub(super) world: Arc<dyn WorldContext>,
    pub(super) owner: OwnerContext,
    pub(super) stats: TickStats,
    pub(super) in_tick: AtomicBool,
    rng: Mutex<StdRng>,
    settings: ManagerSettings,
    self_ref: Weak<Self>,
}

impl TimerManager {
    /// Starts a session owned by the calling thread.
    ///
    /// The returned `Arc` is the only strong reference the manager hands
    /// out; every [`TimerHandle`] it creates holds a `Weak`.
    #[must_use]
    pub fn initialize(settings: ManagerSettings, world: Arc<dyn WorldContext>) -> Arc<Self> {
        let rng = settings
            .jitter_seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        let capacity = settings.capacity;

        debug!(
            timers = capacity.timers,
            fired = capacity.fired,
            seeded = settings.jitter_seed.is_some(),
            "timer manager initialized"
        );

        Arc::new_cyclic(|self_ref| Self {
            store: TimerStore::with_capacity(capacity.timers),
            buffers: Mutex::new(TickBuffers::with_capacity(&capacity)),
            pending: Mutex::new(PendingOps {
                to_remove: Vec::with_capacity(capacity.removals),
                to_unpause: Vec::with_capacity(capacity.unpauses),
            }),
            world,
            owner: OwnerContext::for_current_thread(),
            stats: TickStats::default(),
            in_tick: AtomicBool::new(false),
            rng: Mutex::new(rng),
            settings,
            self_ref: self_ref.clone(),
        })
    }

    /// Ends the session's contents without dropping the manager.
    ///
    /// Drops every record, clears scratch buffers and pending queues,
    /// discards forwarded operations and rewinds ids to 1. Existing
    /// handles become invalid.
    pub fn deinitialize(&self) {
        let timers = self.store.len();
        self.store.reset();
        self.buffers.lock().clear();
        {
            let mut pending = self.pending.lock();
            pending.to_remove.clear();
            pending.to_unpause.clear();
        }
        let discarded = self.owner.discard();
        self.stats.reset();
        debug!(timers, discarded, "timer manager deinitialized");
    }

    /// Settings the session was started with.
    #[must_use]
    pub const fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    /// The host world the tick consults.
    #[must_use]
    pub fn world(&self) -> &dyn WorldContext {
        self.world.as_ref()
    }

    // ------------------------------------------------------------------------
    // Owner thread
    // ------------------------------------------------------------------------

    /// Runs `f` on the owner thread.
    ///
    /// On the owner thread `f` runs now and its result is returned.
    /// Anywhere else `f` is queued for the owner and `fallback` is returned.
    fn on_owner<R, F>(&self, operation: &'static str, fallback: R, f: F) -> R
    where
        R: 'static,
        F: FnOnce(&Self) -> R + Send + 'static,
    {
        if self.owner.is_owner() {
            return f(self);
        }
        self.owner.forward(
            operation,
            Box::new(move |manager: &Self| {
                f(manager);
            }),
        );
        fallback
    }

    /// Returns whether the calling thread owns this manager.
    #[must_use]
    pub fn is_owner_thread(&self) -> bool {
        self.owner.is_owner()
    }

    /// Makes the calling thread the owner.
    pub fn claim_owner_thread(&self) {
        self.owner.claim();
        debug!("timer manager owner thread reassigned");
    }

    /// Runs operations forwarded from other threads.
    ///
    /// `tick` does this on its own; hosts that want forwarded work applied
    /// between ticks call it directly. Returns the number of operations run,
    /// or 0 when called off the owner thread.
    pub fn pump_deferred(&self) -> usize {
        if !self.owner.is_owner() {
            warn!("pump_deferred called off the owner thread; ignoring");
            return 0;
        }
        self.owner.drain(self)
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Registers a timer and returns its handle.
    ///
    /// Off the owner thread the registration is deferred and the returned
    /// handle is invalid; use [`TimerManager::set_timer_async`] to learn
    /// the real handle.
    pub fn set_timer(&self, callback: TimerCallback, options: TimerOptions) -> TimerHandle {
        self.on_owner("set_timer", TimerHandle::invalid(), move |manager| {
            manager.register(callback, options)
        })
    }

    /// Registers a timer that fires on the very next tick, then goes away.
    pub fn set_timer_next_tick(&self, callback: TimerCallback) -> TimerHandle {
        self.on_owner("set_timer_next_tick", TimerHandle::invalid(), move |manager| {
            manager.register_next_tick(callback)
        })
    }

    /// Registers a timer and hands its handle to `on_complete`.
    ///
    /// On the owner thread `on_complete` runs before this returns;
    /// otherwise it runs on the owner thread once the registration does.
    pub fn set_timer_async<F>(&self, callback: TimerCallback, options: TimerOptions, on_complete: F)
    where
        F: FnOnce(TimerHandle) + Send + 'static,
    {
        self.on_owner("set_timer_async", (), move |manager| {
            on_complete(manager.register(callback, options));
        });
    }

    fn register(&self, callback: TimerCallback, options: TimerOptions) -> TimerHandle {
        let delay = jittered_start_delay(
            options.start_delay,
            options.start_delay_variation,
            &mut *self.rng.lock(),
        );
        let duration = options.duration;
        let looping = options.looping;
        let dilation = options.dilation_mode;

        let id = self.store.insert(TimerData::new(callback, options, delay));
        debug!(
            timer_id = id,
            duration,
            initial_delay = delay,
            looping,
            %dilation,
            "timer registered"
        );
        self.handle_for(id)
    }

    fn register_next_tick(&self, callback: TimerCallback) -> TimerHandle {
        let id = self.store.insert(TimerData::next_tick(callback));
        debug!(timer_id = id, "next-tick timer registered");
        self.handle_for(id)
    }

    /// A handle for `id` bound to this manager.
    ///
    /// The id is not checked; an absent id yields a handle that reports
    /// itself invalid.
    #[must_use]
    pub fn handle_for(&self, id: u64) -> TimerHandle {
        TimerHandle::new(id, self.self_ref.clone())
    }

    fn owns(&self, handle: &TimerHandle) -> bool {
        handle.owner_ptr() == std::ptr::from_ref(self)
    }

    // ------------------------------------------------------------------------
    // Per-timer control
    // ------------------------------------------------------------------------

    /// Removes the timer. Safe from inside any callback, including its own.
    pub fn invalidate_timer(&self, handle: &TimerHandle) {
        if !self.owns(handle) {
            return;
        }
        let id = handle.id();
        self.on_owner("invalidate_timer", (), move |manager| {
            if manager.store.remove(id) {
                debug!(timer_id = id, "timer invalidated");
            }
        });
    }

    /// Freezes the timer's elapsed time until it is unpaused.
    pub fn pause_timer(&self, handle: &TimerHandle) {
        self.set_paused(handle, true, "pause_timer");
    }

    /// Resumes a paused timer from where it stopped.
    pub fn unpause_timer(&self, handle: &TimerHandle) {
        self.set_paused(handle, false, "unpause_timer");
    }

    fn set_paused(&self, handle: &TimerHandle, paused: bool, operation: &'static str) {
        if !self.owns(handle) {
            return;
        }
        let id = handle.id();
        self.on_owner(operation, (), move |manager| {
            if manager.store.with_mut(id, |t| t.paused = paused).is_some() {
                debug!(timer_id = id, paused, "timer pause state changed");
            }
        });
    }

    /// Queues the timer to be unpaused by the next cleanup step.
    pub fn unpause_timer_deferred(&self, handle: &TimerHandle) {
        if !self.owns(handle) {
            return;
        }
        let id = handle.id();
        self.on_owner("unpause_timer_deferred", (), move |manager| {
            manager.pending.lock().to_unpause.push(id);
            debug!(timer_id = id, "timer unpause deferred to cleanup");
        });
    }

    // ------------------------------------------------------------------------
    // Bulk control
    // ------------------------------------------------------------------------

    /// Removes every timer.
    pub fn invalidate_all(&self) {
        self.on_owner("invalidate_all", (), |manager| {
            let removed = manager.store.remove_all();
            debug!(removed, "all timers invalidated");
        });
    }

    /// Pauses every timer.
    pub fn pause_all(&self) {
        self.on_owner("pause_all", (), |manager| {
            manager.store.for_each_mut(|_, t| t.paused = true);
            debug!(timers = manager.store.len(), "all timers paused");
        });
    }

    /// Unpauses every timer.
    pub fn unpause_all(&self) {
        self.on_owner("unpause_all", (), |manager| {
            manager.store.for_each_mut(|_, t| t.paused = false);
            debug!(timers = manager.store.len(), "all timers unpaused");
        });
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    fn read<R>(&self, handle: &TimerHandle, f: impl FnOnce(&TimerData) -> R) -> Option<R> {
        if !self.owns(handle) {
            return None;
        }
        self.store.read_with(handle.id(), f)
    }

    /// Whether the handle's timer is live in this manager.
    #[must_use]
    pub fn is_timer_valid(&self, handle: &TimerHandle) -> bool {
        self.owns(handle) && self.store.contains(handle.id())
    }

    /// Paused flag, `false` when absent.
    #[must_use]
    pub fn is_timer_paused(&self, handle: &TimerHandle) -> bool {
        self.read(handle, |t| t.paused).unwrap_or(false)
    }

    /// Looping flag, `false` when absent.
    #[must_use]
    pub fn is_timer_looping(&self, handle: &TimerHandle) -> bool {
        self.read(handle, |t| t.looping).unwrap_or(false)
    }

    /// Whether the timer keeps running through world pauses, `false` when absent.
    #[must_use]
    pub fn is_timer_affected_by_game_pause(&self, handle: &TimerHandle) -> bool {
        self.read(handle, |t| t.affected_by_game_pause)
            .unwrap_or(false)
    }

    /// Dilation mode, [`DilationMode::Ignore`] when absent.
    #[must_use]
    pub fn timer_dilation_mode(&self, handle: &TimerHandle) -> DilationMode {
        self.read(handle, |t| t.dilation_mode).unwrap_or_default()
    }

    /// Running-phase duration, `-1` when absent.
    #[must_use]
    pub fn timer_duration(&self, handle: &TimerHandle) -> f32 {
        self.read(handle, |t| t.duration).unwrap_or(ABSENT_TIME)
    }

    /// Seconds left in the current phase, `-1` when absent.
    #[must_use]
    pub fn timer_time_left(&self, handle: &TimerHandle) -> f32 {
        self.read(handle, TimerData::time_left)
            .unwrap_or(ABSENT_TIME)
    }

    /// Seconds accumulated in the current phase, `-1` when absent.
    #[must_use]
    pub fn timer_elapsed(&self, handle: &TimerHandle) -> f32 {
        self.read(handle, |t| t.phase_elapsed).unwrap_or(ABSENT_TIME)
    }
}

impl std::fmt::Debug for TimerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerManager")
            .field("timers", &self.store.len())
            .field("owner", &self.owner)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
