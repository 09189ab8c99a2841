//! `timekeeper` - Tick-driven timer scheduler
//!
//! An in-process timer manager advanced by explicit ticks, with per-timer
//! pause control, world-pause gating, time dilation and start-delay
//! jitter. The library also carries the YAML schedule loader and the CLI
//! that runs schedules against a simulated world.

pub mod cli;
pub mod config;
pub mod error;
pub mod observability;
pub mod timer;
