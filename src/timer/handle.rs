//! Lightweight timer handles
//!
//! A handle is an id plus a `Weak` back to the manager that issued it. It
//! owns no timer state; every call upgrades the `Weak` and forwards to the
//! manager, falling back to a sentinel once either the manager or the
//! timer is gone.

use std::hash::{Hash, Hasher};
use std::sync::Weak;

use super::manager::TimerManager;
use super::types::{ABSENT_TIME, DilationMode, INVALID_TIMER_ID};

/// Reference to one timer in one manager.
#[derive(Clone, Default)]
pub struct TimerHandle {
    id: u64,
    owner: Weak<TimerManager>,
}

impl TimerHandle {
    /// A handle that refers to nothing.
    #[must_use]
    pub const fn invalid() -> Self {
        Self {
            id: INVALID_TIMER_ID,
            owner: Weak::new(),
        }
    }

    pub(super) const fn new(id: u64, owner: Weak<TimerManager>) -> Self {
        Self { id, owner }
    }

    /// The timer id; 0 for an invalid handle.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    pub(super) fn owner_ptr(&self) -> *const TimerManager {
        self.owner.as_ptr()
    }

    /// Whether the issuing manager is still alive.
    #[must_use]
    pub fn has_owner(&self) -> bool {
        self.owner.strong_count() > 0
    }

    /// Non-zero id, live manager, and the manager still holds the timer.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.id != INVALID_TIMER_ID
            && self
                .owner
                .upgrade()
                .is_some_and(|m| m.is_timer_valid(self))
    }

    /// Removes the timer. No-op when absent.
    pub fn invalidate(&self) {
        if let Some(m) = self.owner.upgrade() {
            m.invalidate_timer(self);
        }
    }

    /// Pauses the timer. No-op when absent.
    pub fn pause(&self) {
        if let Some(m) = self.owner.upgrade() {
            m.pause_timer(self);
        }
    }

    /// Unpauses the timer. No-op when absent.
    pub fn unpause(&self) {
        if let Some(m) = self.owner.upgrade() {
            m.unpause_timer(self);
        }
    }

    /// Unpauses the timer at the next cleanup step. No-op when absent.
    pub fn unpause_deferred(&self) {
        if let Some(m) = self.owner.upgrade() {
            m.unpause_timer_deferred(self);
        }
    }

    /// Paused flag, `false` when absent.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.owner
            .upgrade()
            .is_some_and(|m| m.is_timer_paused(self))
    }

    /// Looping flag, `false` when absent.
    #[must_use]
    pub fn is_looping(&self) -> bool {
        self.owner
            .upgrade()
            .is_some_and(|m| m.is_timer_looping(self))
    }

    /// Keeps running through world pauses; `false` when absent.
    #[must_use]
    pub fn is_affected_by_game_pause(&self) -> bool {
        self.owner
            .upgrade()
            .is_some_and(|m| m.is_timer_affected_by_game_pause(self))
    }

    /// Dilation mode, [`DilationMode::Ignore`] when absent.
    #[must_use]
    pub fn dilation_mode(&self) -> DilationMode {
        self.owner
            .upgrade()
            .map_or(DilationMode::Ignore, |m| m.timer_dilation_mode(self))
    }

    /// Duration in seconds, `-1` when absent.
    #[must_use]
    pub fn duration(&self) -> f32 {
        self.owner
            .upgrade()
            .map_or(ABSENT_TIME, |m| m.timer_duration(self))
    }

    /// Seconds left in the current phase, `-1` when absent.
    #[must_use]
    pub fn time_left(&self) -> f32 {
        self.owner
            .upgrade()
            .map_or(ABSENT_TIME, |m| m.timer_time_left(self))
    }

    /// Seconds elapsed in the current phase, `-1` when absent.
    #[must_use]
    pub fn elapsed_time(&self) -> f32 {
        self.owner
            .upgrade()
            .map_or(ABSENT_TIME, |m| m.timer_elapsed(self))
    }
}

impl PartialEq for TimerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Weak::ptr_eq(&self.owner, &other.owner)
    }
}

impl Eq for TimerHandle {}

impl Hash for TimerHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("id", &self.id)
            .field("has_owner", &self.has_owner())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_handle_sentinels() {
        let h = TimerHandle::invalid();
        assert_eq!(h.id(), INVALID_TIMER_ID);
        assert!(!h.has_owner());
        assert!(!h.is_valid());
        assert!(!h.is_paused());
        assert!(!h.is_looping());
        assert!(!h.is_affected_by_game_pause());
        assert_eq!(h.dilation_mode(), DilationMode::Ignore);
        assert!((h.duration() - ABSENT_TIME).abs() < f32::EPSILON);
        assert!((h.time_left() - ABSENT_TIME).abs() < f32::EPSILON);
        assert!((h.elapsed_time() - ABSENT_TIME).abs() < f32::EPSILON);
        h.invalidate();
        h.pause();
        h.unpause();
        h.unpause_deferred();
    }

    #[test]
    fn test_default_equals_invalid() {
        assert_eq!(TimerHandle::default(), TimerHandle::invalid());
    }

    #[test]
    fn test_debug_output() {
        let text = format!("{:?}", TimerHandle::invalid());
        assert!(text.contains("id: 0"));
        assert!(text.contains("has_owner: false"));
    }
}
