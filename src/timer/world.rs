//! Host-side inputs to the tick
//!
//! The manager asks its [`WorldContext`] once per tick whether the world is
//! paused and what the global dilation is. [`SimulatedWorld`] is a
//! thread-safe stand-in for hosts without their own notion of either, and
//! [`DilationScale`] plays the part of an actor with a custom dilation.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use super::types::DilationSource;

/// Global state the tick engine reads from the host.
pub trait WorldContext: Send + Sync {
    /// Whether the world is currently paused.
    fn is_paused(&self) -> bool;

    /// Global time dilation factor (1.0 is real time).
    fn global_time_dilation(&self) -> f32 {
        1.0
    }
}

/// Atomically stored `f32`.
#[derive(Debug)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    const fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }

    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

/// A world whose pause flag and dilation are set by the caller.
#[derive(Debug)]
pub struct SimulatedWorld {
    paused: AtomicBool,
    dilation: AtomicF32,
}

impl SimulatedWorld {
    /// An unpaused world running at real time.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            paused: AtomicBool::new(false),
            dilation: AtomicF32::new(1.0),
        }
    }

    /// Sets the pause flag.
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    /// Sets the global dilation factor.
    pub fn set_global_time_dilation(&self, dilation: f32) {
        self.dilation.store(dilation);
    }
}

impl Default for SimulatedWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldContext for SimulatedWorld {
    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    fn global_time_dilation(&self) -> f32 {
        self.dilation.load()
    }
}

/// A dilation source with an adjustable factor.
#[derive(Debug)]
pub struct DilationScale {
    scale: AtomicF32,
}

impl DilationScale {
    /// Creates a source running at `scale`.
    #[must_use]
    pub const fn new(scale: f32) -> Self {
        Self {
            scale: AtomicF32::new(scale),
        }
    }

    /// Changes the factor; timers pick it up on their next tick.
    pub fn set(&self, scale: f32) {
        self.scale.store(scale);
    }
}

impl DilationSource for DilationScale {
    fn time_dilation(&self) -> f32 {
        self.scale.load()
    }
}
