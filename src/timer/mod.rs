//! Tick-driven timer core
//!
//! Callers register callbacks with a [`TimerManager`] and get back a
//! [`TimerHandle`]. The host drives everything by calling
//! [`TimerManager::tick`] once per frame with the elapsed real time; timers
//! never fire anywhere else.
//!
//! ```
//! use std::sync::Arc;
//! use timekeeper::timer::{ManagerSettings, SimulatedWorld, TimerCallback, TimerManager, TimerOptions};
//!
//! let manager = TimerManager::initialize(ManagerSettings::default(), Arc::new(SimulatedWorld::new()));
//! let handle = manager.set_timer(TimerCallback::new(|| println!("fired")), TimerOptions::once(2.0));
//!
//! manager.tick(1.0);
//! assert!(handle.is_valid());
//! manager.tick(1.0);
//! assert!(!handle.is_valid());
//! ```

pub mod affinity;
pub mod diagnostics;
pub mod engine;
pub mod handle;
pub mod id;
pub mod manager;
pub mod record;
pub mod store;
pub mod types;
pub mod world;

pub use diagnostics::{TickStats, TimerSnapshot};
pub use handle::TimerHandle;
pub use manager::{ManagerSettings, ScratchCapacity, TimerManager};
pub use record::{TimerData, TimerOptions};
pub use types::{
    ABSENT_TIME, DilationMode, DilationSource, INVALID_TIMER_ID, TimerCallback, TimerPhase,
};
pub use world::{DilationScale, SimulatedWorld, WorldContext};
