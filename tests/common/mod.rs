//! Shared integration-test helpers: a seeded manager over a simulated
//! world, counting callbacks, and a runner for the `timekeeper` binary.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use timekeeper::timer::{ManagerSettings, SimulatedWorld, TimerCallback, TimerManager};

/// Tolerance for comparing accumulated `f32` seconds.
pub const EPS: f32 = 1e-4;

/// A manager with a fixed jitter seed, plus the world it reads.
pub fn manager() -> (Arc<TimerManager>, Arc<SimulatedWorld>) {
    let world = Arc::new(SimulatedWorld::new());
    let manager = TimerManager::initialize(ManagerSettings::seeded(7), world.clone());
    (manager, world)
}

/// Counts invocations of the callbacks it hands out.
#[derive(Clone, Default)]
pub struct FireCounter(Arc<AtomicUsize>);

impl FireCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> TimerCallback {
        let hits = Arc::clone(&self.0);
        TimerCallback::new(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs the `timekeeper` binary to completion.
pub fn run_cli(args: &[&str]) -> Output {
    run_cli_with_env(args, &[])
}

/// Runs the `timekeeper` binary with extra environment variables.
#[allow(clippy::missing_panics_doc)]
pub fn run_cli_with_env(args: &[&str], env: &[(&str, &str)]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_timekeeper"))
        .args(args)
        .env_remove("TIMEKEEPER_LOG_LEVEL")
        .env_remove("TIMEKEEPER_CONFIG")
        .envs(env.iter().copied())
        .output()
        .expect("failed to run timekeeper")
}

/// Returns the path to a test fixture.
#[must_use]
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}
