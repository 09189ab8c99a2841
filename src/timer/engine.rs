//! Tick engine
//!
//! One call to [`TimerManager::tick`] runs the whole evaluation cycle:
//!
//! 1. pause query (once per tick)
//! 2. snapshot of every record under the shared lock
//! 3. quick pass over the snapshot collecting next-tick timers
//! 4. mutate pass over the live store under the exclusive lock
//! 5. execution of the fire set with no lock held
//! 6. cleanup of queued removals and deferred unpauses
//!
//! Scratch buffers are taken out of the manager for the duration of the
//! tick and put back at the end, so callbacks never see them borrowed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{trace, warn};

use super::manager::TimerManager;
use crate::observability::metrics;

/// Clears the in-tick flag on every exit path, including a panicking callback.
struct TickGuard<'a>(&'a AtomicBool);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl TimerManager {
    /// Advances every timer by `delta_seconds` of raw time and fires the
    /// ones that come due.
    ///
    /// Forwarded operations queued by other threads run first. A tick
    /// started while another is in progress (for example from inside a
    /// timer callback) is ignored.
    pub fn tick(&self, delta_seconds: f32) {
        if self.in_tick.swap(true, Ordering::AcqRel) {
            warn!("tick called while a tick is already running; ignoring");
            return;
        }
        let _guard = TickGuard(&self.in_tick);

        if !self.owner.is_owner() {
            warn!("tick called off the owner thread");
        }

        let started = Instant::now();
        self.owner.drain(self);

        let world_paused = self.world.is_paused();
        let global_dilation = self.world.global_time_dilation();

        let mut buffers = std::mem::take(&mut *self.buffers.lock());

        self.store.snapshot_into(&mut buffers.snapshot);

        buffers.fire_set.clear();
        for (id, timer) in &buffers.snapshot {
            if timer.next_tick_only && !timer.is_suspended(world_paused) {
                buffers.fire_set.push(*id);
            }
        }
        buffers.snapshot.clear();

        let processed = self.advance_timers(
            delta_seconds,
            world_paused,
            global_dilation,
            &mut buffers.fire_set,
        );

        std::mem::swap(&mut buffers.fire_set, &mut buffers.executing);
        buffers.fire_set.clear();
        let fired = self.execute_fired(&buffers.executing);
        buffers.executing.clear();

        *self.buffers.lock() = buffers;

        self.cleanup();

        let elapsed = started.elapsed();
        self.stats.record(elapsed, processed, fired);
        metrics::record_tick(elapsed, processed, fired, self.store.len());
    }

    /// Mutate pass. Returns the number of timers that advanced without
    /// leaving their start delay.
    fn advance_timers(
        &self,
        delta_seconds: f32,
        world_paused: bool,
        global_dilation: f32,
        fire_set: &mut Vec<u64>,
    ) -> usize {
        let mut processed = 0;
        self.store.for_each_mut(|id, timer| {
            if timer.next_tick_only || timer.is_suspended(world_paused) {
                return;
            }

            let delta = timer.effective_delta(delta_seconds, global_dilation);
            timer.advance(delta);

            if timer.try_transition() {
                trace!(timer_id = id, "timer left its start delay");
                return;
            }
            processed += 1;
            if timer.should_fire() {
                fire_set.push(id);
            }
        });
        processed
    }

    /// Invokes callbacks for `ids` and applies post-fire transitions.
    ///
    /// Returns the number of timers that were still present when their
    /// turn came.
    fn execute_fired(&self, ids: &[u64]) -> usize {
        let mut fired = 0;
        for &id in ids {
            let Some(timer) = self.store.get(id) else {
                continue;
            };
            fired += 1;

            let bound = timer.callback.invoke();
            trace!(timer_id = id, bound, "timer fired");

            let keep = self.store.with_mut(id, |live| {
                if live.looping {
                    live.restart();
                }
                live.looping
            });
            if keep == Some(false) {
                self.pending.lock().to_remove.push(id);
            }
        }
        fired
    }

    /// Applies queued removals, then deferred unpauses.
    fn cleanup(&self) -> usize {
        let mut pending = self.pending.lock();
        if pending.to_remove.is_empty() && pending.to_unpause.is_empty() {
            return 0;
        }
        let removed = self
            .store
            .apply_cleanup(&pending.to_remove, &pending.to_unpause);
        pending.to_remove.clear();
        pending.to_unpause.clear();
        removed
    }
}
