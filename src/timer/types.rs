//! Shared timer vocabulary
//!
//! Dilation policy, the two-phase lifecycle enum, the opaque callback
//! wrapper, and the capability trait used for actor-scoped dilation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Reserved timer id meaning "no timer".
pub const INVALID_TIMER_ID: u64 = 0;

/// Tolerance applied when comparing elapsed time against a threshold.
pub const PHASE_TOLERANCE: f32 = 1.0e-4;

/// Smallest scale an actor-scoped timer will run at.
///
/// Keeps a zero or negative actor dilation from freezing or reversing time.
pub const MIN_ACTOR_TIME_DILATION: f32 = 1.0e-8;

/// Sentinel returned by time queries when the timer no longer exists.
pub const ABSENT_TIME: f32 = -1.0;

/// How a timer scales the raw tick delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DilationMode {
    /// Real elapsed time, unaffected by any dilation.
    #[default]
    Ignore,
    /// Scaled by the host's global time dilation.
    Global,
    /// Scaled by the dilation source attached to the timer.
    ///
    /// Falls back to [`DilationMode::Ignore`] once the source is gone.
    Actor,
}

impl std::fmt::Display for DilationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Ignore => "ignore",
            Self::Global => "global",
            Self::Actor => "actor",
        };
        f.write_str(name)
    }
}

/// Position of a timer in its two-phase lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    /// Waiting out the start delay; the duration is not counting yet.
    InitialDelay,
    /// Counting toward the duration.
    Running,
}

/// Something that exposes a time-dilation factor, such as a game actor.
///
/// Timers only ever hold a `Weak` reference to a source, so dropping the
/// source is how its liveness ends.
pub trait DilationSource: Send + Sync {
    /// Current dilation factor (1.0 is real time).
    fn time_dilation(&self) -> f32;
}

/// The callable a timer invokes when it fires.
///
/// A callback may be unbound, in which case firing is a silent no-op.
/// Clones share the same underlying closure.
#[derive(Clone, Default)]
pub struct TimerCallback(Option<Arc<dyn Fn() + Send + Sync>>);

impl TimerCallback {
    /// Wraps a closure as a bound callback.
    #[must_use]
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self(Some(Arc::new(f)))
    }

    /// A callback with nothing bound.
    #[must_use]
    pub const fn unbound() -> Self {
        Self(None)
    }

    /// Returns whether a closure is bound.
    #[must_use]
    pub const fn is_bound(&self) -> bool {
        self.0.is_some()
    }

    /// Invokes the bound closure.
    ///
    /// Returns `false` without doing anything when unbound.
    pub fn invoke(&self) -> bool {
        self.0.as_ref().is_some_and(|f| {
            f();
            true
        })
    }
}

impl std::fmt::Debug for TimerCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TimerCallback")
            .field(&if self.is_bound() { "bound" } else { "unbound" })
            .finish()
    }
}
