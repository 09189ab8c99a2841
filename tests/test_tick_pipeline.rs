mod common;

use std::sync::{Arc, Mutex};

use common::{EPS, FireCounter, manager};
use timekeeper::timer::{
    ABSENT_TIME, DilationMode, DilationScale, TimerCallback, TimerHandle, TimerOptions,
};

// ============================================================================
// One-shot and looping
// ============================================================================

#[test]
fn one_shot_fires_after_cumulative_duration() {
    let (m, _) = manager();
    let fires = FireCounter::new();
    let h = m.set_timer(fires.callback(), TimerOptions::once(2.0));

    m.tick(1.0);
    assert_eq!(fires.count(), 0);
    assert!(h.is_valid());
    assert!((h.time_left() - 1.0).abs() < EPS);

    m.tick(1.0);
    assert_eq!(fires.count(), 1);
    assert!(!h.is_valid(), "one-shot timer should be removed after firing");
    assert_eq!(m.active_timer_count(), 0);
    assert!((h.time_left() - ABSENT_TIME).abs() < EPS);

    m.tick(5.0);
    assert_eq!(fires.count(), 1);
}

#[test]
fn zero_duration_fires_on_first_tick() {
    let (m, _) = manager();
    let fires = FireCounter::new();
    let h = m.set_timer(fires.callback(), TimerOptions::once(0.0));

    m.tick(0.0);
    assert_eq!(fires.count(), 1);
    assert!(!h.is_valid());
}

#[test]
fn negative_duration_is_clamped() {
    let (m, _) = manager();
    let h = m.set_timer(TimerCallback::unbound(), TimerOptions::once(-3.0));
    assert!(h.duration().abs() < EPS);
}

#[test]
fn looping_timer_fires_every_period() {
    let (m, _) = manager();
    let fires = FireCounter::new();
    let h = m.set_timer(fires.callback(), TimerOptions::looping(0.5));

    for _ in 0..8 {
        m.tick(0.25);
    }
    assert_eq!(fires.count(), 4);
    assert!(h.is_valid());
    assert!(h.elapsed_time().abs() < EPS, "elapsed resets after each fire");
    assert!((h.time_left() - 0.5).abs() < EPS);
}

#[test]
fn unbound_callback_fire_is_silent() {
    let (m, _) = manager();
    let h = m.set_timer(TimerCallback::unbound(), TimerOptions::once(1.0));

    m.tick(1.0);
    assert!(!h.is_valid());
    assert_eq!(m.timers_fired_last_tick(), 1);
}

// ============================================================================
// Start delay
// ============================================================================

#[test]
fn transition_tick_never_fires() {
    let (m, _) = manager();
    let fires = FireCounter::new();
    let h = m.set_timer(
        fires.callback(),
        TimerOptions::once(0.0).with_start_delay(1.0, 0.0),
    );

    m.tick(0.5);
    assert_eq!(fires.count(), 0);
    assert!((h.time_left() - 0.5).abs() < EPS);

    m.tick(0.5);
    assert_eq!(fires.count(), 0, "the delay-to-running tick must not fire");
    assert!(h.is_valid());

    m.tick(0.0);
    assert_eq!(fires.count(), 1);
}

#[test]
fn start_delay_overshoot_is_discarded() {
    let (m, _) = manager();
    let fires = FireCounter::new();
    let h = m.set_timer(
        fires.callback(),
        TimerOptions::once(1.0).with_start_delay(0.5, 0.0),
    );

    m.tick(2.0);
    assert_eq!(fires.count(), 0);
    assert!(h.elapsed_time().abs() < EPS);
    assert!((h.time_left() - 1.0).abs() < EPS);
}

#[test]
fn jittered_delay_never_below_base() {
    let (m, _) = manager();
    for _ in 0..50 {
        let h = m.set_timer(
            TimerCallback::unbound(),
            TimerOptions::once(1.0).with_start_delay(1.0, 0.5),
        );
        let delay = h.time_left();
        assert!(delay >= 1.0 - EPS, "delay {delay} below base");
        assert!(delay <= 1.5 + EPS, "delay {delay} above base + variation");
    }
}

#[test]
fn unbounded_start_delay_variation_registers() {
    let (m, _) = manager();
    for variation in [f32::MAX, f32::INFINITY] {
        let h = m.set_timer(
            TimerCallback::unbound(),
            TimerOptions::once(1.0).with_start_delay(0.0, variation),
        );
        assert!(h.is_valid());
        let left = h.time_left();
        assert!(left.is_finite() && left >= 0.0, "time left {left}");
        m.tick(1.0);
    }
}

// ============================================================================
// Pause
// ============================================================================

#[test]
fn paused_timer_freezes_and_resumes() {
    let (m, _) = manager();
    let fires = FireCounter::new();
    let h = m.set_timer(fires.callback(), TimerOptions::once(2.0));

    m.tick(0.5);
    h.pause();
    assert!(h.is_paused());

    m.tick(10.0);
    m.tick(10.0);
    assert_eq!(fires.count(), 0);
    assert!((h.elapsed_time() - 0.5).abs() < EPS);

    h.unpause();
    m.tick(0.5);
    assert!((h.elapsed_time() - 1.0).abs() < EPS);

    m.tick(1.0);
    assert_eq!(fires.count(), 1);
}

#[test]
fn deferred_unpause_applies_after_the_tick() {
    let (m, _) = manager();
    let fires = FireCounter::new();
    let h = m.set_timer(fires.callback(), TimerOptions::once(1.0));
    h.pause();
    h.unpause_deferred();
    assert!(h.is_paused(), "deferred unpause waits for cleanup");

    m.tick(1.0);
    assert_eq!(fires.count(), 0);
    assert!(!h.is_paused());
    assert!(h.elapsed_time().abs() < EPS);

    m.tick(1.0);
    assert_eq!(fires.count(), 1);
}

#[test]
fn world_pause_gates_only_unaffected_timers() {
    let (m, world) = manager();
    let frozen = FireCounter::new();
    let running = FireCounter::new();
    let a = m.set_timer(frozen.callback(), TimerOptions::once(1.0));
    let b = m.set_timer(
        running.callback(),
        TimerOptions::once(1.0).affected_by_game_pause(true),
    );

    world.set_paused(true);
    m.tick(1.0);
    assert_eq!(frozen.count(), 0);
    assert_eq!(running.count(), 1);
    assert!(a.elapsed_time().abs() < EPS);
    assert!(!b.is_valid());

    world.set_paused(false);
    m.tick(1.0);
    assert_eq!(frozen.count(), 1);
}

#[test]
fn pause_all_and_unpause_all() {
    let (m, _) = manager();
    let fires = FireCounter::new();
    let handles: Vec<TimerHandle> = (0..3)
        .map(|_| m.set_timer(fires.callback(), TimerOptions::looping(1.0)))
        .collect();

    m.pause_all();
    assert!(handles.iter().all(TimerHandle::is_paused));
    m.tick(5.0);
    assert_eq!(fires.count(), 0);

    m.unpause_all();
    m.tick(1.0);
    assert_eq!(fires.count(), 3);
}

// ============================================================================
// Dilation
// ============================================================================

#[test]
fn global_dilation_scales_delta() {
    let (m, world) = manager();
    world.set_global_time_dilation(2.0);
    let fires = FireCounter::new();
    let global = m.set_timer(
        fires.callback(),
        TimerOptions::once(1.0).with_dilation(DilationMode::Global),
    );
    let ignore = m.set_timer(TimerCallback::unbound(), TimerOptions::once(1.0));

    m.tick(0.5);
    assert_eq!(fires.count(), 1);
    assert!(!global.is_valid());
    assert!((ignore.elapsed_time() - 0.5).abs() < EPS);
}

#[test]
fn dead_actor_falls_back_to_raw_delta() {
    let (m, _) = manager();
    let actor = Arc::new(DilationScale::new(0.5));
    let h = m.set_timer(
        TimerCallback::unbound(),
        TimerOptions::once(10.0).with_dilation_source(&actor),
    );
    assert_eq!(h.dilation_mode(), DilationMode::Actor);

    m.tick(1.0);
    assert!((h.elapsed_time() - 0.5).abs() < EPS);

    drop(actor);
    m.tick(1.0);
    assert!((h.elapsed_time() - 1.5).abs() < EPS);
}

#[test]
fn actor_scale_is_floored_above_zero() {
    let (m, _) = manager();
    let actor = Arc::new(DilationScale::new(-4.0));
    let h = m.set_timer(
        TimerCallback::unbound(),
        TimerOptions::once(1.0).with_dilation_source(&actor),
    );

    m.tick(100.0);
    let elapsed = h.elapsed_time();
    assert!(elapsed >= 0.0, "time must not run backwards: {elapsed}");
    assert!(elapsed < EPS);
}

#[test]
fn actor_scale_changes_apply_next_tick() {
    let (m, _) = manager();
    let actor = Arc::new(DilationScale::new(1.0));
    let h = m.set_timer(
        TimerCallback::unbound(),
        TimerOptions::once(10.0).with_dilation_source(&actor),
    );

    m.tick(1.0);
    actor.set(3.0);
    m.tick(1.0);
    assert!((h.elapsed_time() - 4.0).abs() < EPS);
}

// ============================================================================
// Next tick
// ============================================================================

#[test]
fn next_tick_fires_once_even_with_zero_delta() {
    let (m, _) = manager();
    let fires = FireCounter::new();
    let h = m.set_timer_next_tick(fires.callback());
    assert!(h.is_affected_by_game_pause());
    assert!(!h.is_looping());

    m.tick(0.0);
    assert_eq!(fires.count(), 1);
    assert!(!h.is_valid());

    m.tick(1.0);
    assert_eq!(fires.count(), 1);
}

#[test]
fn next_tick_runs_through_world_pause() {
    let (m, world) = manager();
    world.set_paused(true);
    let fires = FireCounter::new();
    m.set_timer_next_tick(fires.callback());

    m.tick(0.016);
    assert_eq!(fires.count(), 1);
}

#[test]
fn paused_next_tick_waits() {
    let (m, _) = manager();
    let fires = FireCounter::new();
    let h = m.set_timer_next_tick(fires.callback());
    h.pause();

    m.tick(1.0);
    assert_eq!(fires.count(), 0);
    assert!(h.is_valid());

    h.unpause();
    m.tick(0.0);
    assert_eq!(fires.count(), 1);
}

// ============================================================================
// Re-entrancy from callbacks
// ============================================================================

#[test]
fn callback_invalidating_itself() {
    let (m, _) = manager();
    let slot: Arc<Mutex<TimerHandle>> = Arc::new(Mutex::new(TimerHandle::invalid()));
    let fires = FireCounter::new();

    let inner = Arc::clone(&slot);
    let counter = fires.callback();
    let h = m.set_timer(
        TimerCallback::new(move || {
            counter.invoke();
            inner.lock().unwrap().invalidate();
        }),
        TimerOptions::looping(1.0),
    );
    *slot.lock().unwrap() = h.clone();

    m.tick(1.0);
    assert_eq!(fires.count(), 1);
    assert!(!h.is_valid());
    assert_eq!(m.active_timer_count(), 0);

    m.tick(1.0);
    assert_eq!(fires.count(), 1);
}

#[test]
fn callback_cancels_a_timer_later_in_the_fire_set() {
    let (m, _) = manager();
    let victim_fires = FireCounter::new();
    let slot: Arc<Mutex<TimerHandle>> = Arc::new(Mutex::new(TimerHandle::invalid()));

    let inner = Arc::clone(&slot);
    m.set_timer(
        TimerCallback::new(move || inner.lock().unwrap().invalidate()),
        TimerOptions::once(1.0),
    );
    let victim = m.set_timer(victim_fires.callback(), TimerOptions::once(1.0));
    *slot.lock().unwrap() = victim.clone();

    m.tick(1.0);
    assert_eq!(victim_fires.count(), 0);
    assert!(!victim.is_valid());
}

#[test]
fn timer_registered_from_callback_waits_for_next_tick() {
    let (m, _) = manager();
    let child_fires = FireCounter::new();

    let weak = Arc::downgrade(&m);
    let child_cb = child_fires.callback();
    m.set_timer(
        TimerCallback::new(move || {
            if let Some(m) = weak.upgrade() {
                m.set_timer(child_cb.clone(), TimerOptions::once(0.0));
            }
        }),
        TimerOptions::once(1.0),
    );

    m.tick(1.0);
    assert_eq!(child_fires.count(), 0);
    assert_eq!(m.active_timer_count(), 1);

    m.tick(0.0);
    assert_eq!(child_fires.count(), 1);
    assert_eq!(m.active_timer_count(), 0);
}

#[test]
fn nested_tick_from_callback_is_ignored() {
    let (m, _) = manager();
    let other = FireCounter::new();
    m.set_timer(other.callback(), TimerOptions::once(5.0));

    let weak = Arc::downgrade(&m);
    m.set_timer(
        TimerCallback::new(move || {
            if let Some(m) = weak.upgrade() {
                m.tick(100.0);
            }
        }),
        TimerOptions::once(1.0),
    );

    m.tick(1.0);
    assert_eq!(other.count(), 0);
    assert_eq!(m.tick_count(), 1);
}

// ============================================================================
// Diagnostics
// ============================================================================

#[test]
fn diagnostics_track_the_last_tick() {
    let (m, _) = manager();
    m.set_timer(TimerCallback::unbound(), TimerOptions::once(1.0));
    m.set_timer(TimerCallback::unbound(), TimerOptions::looping(0.5));
    let paused = m.set_timer(TimerCallback::unbound(), TimerOptions::once(1.0));
    paused.pause();
    m.set_timer_next_tick(TimerCallback::unbound());

    m.tick(0.5);
    assert_eq!(m.timers_processed_last_tick(), 2);
    assert_eq!(m.timers_fired_last_tick(), 2);
    assert_eq!(m.active_timer_count(), 3);
    assert_eq!(m.tick_count(), 1);

    let dump = m.dump_active_timers();
    assert_eq!(dump.len(), 3);
    assert!(dump.windows(2).all(|w| w[0].id < w[1].id));
}
