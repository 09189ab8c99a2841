//! Structured event stream.
//!
//! Discrete, typed events emitted while a schedule runs. Events are
//! serialized as newline-delimited JSON (JSONL) and carry a monotonically
//! increasing sequence number.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `run_for` elapsed.
    Completed,
    /// Interrupted by SIGINT.
    Interrupted,
    /// Terminated by SIGTERM.
    Terminated,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Terminated => "terminated",
        })
    }
}

/// Totals for a finished run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Ticks executed.
    pub ticks: u64,
    /// Simulated seconds fed to the manager.
    pub simulated_secs: f64,
    /// Fires per timer name, in schedule order.
    pub fires: IndexMap<String, u64>,
    /// Timers still live at the end.
    pub active_timers: usize,
}

impl RunSummary {
    /// Sum of all fires.
    #[must_use]
    pub fn total_fires(&self) -> u64 {
        self.fires.values().sum()
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ticks={} simulated={:.2}s fires={} active={}",
            self.ticks,
            self.simulated_secs,
            self.total_fires(),
            self.active_timers,
        )
    }
}

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during a run.
///
/// Tagged with `"type"` when serialized.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// The scheduler loop is about to start ticking.
    SchedulerStarted {
        /// Wall-clock start time.
        timestamp: DateTime<Utc>,
        /// Ticks per second.
        tick_rate_hz: f64,
        /// Timers in the schedule.
        timers: usize,
    },

    /// A schedule entry was registered with the manager.
    TimerRegistered {
        /// When it was registered.
        timestamp: DateTime<Utc>,
        /// Schedule entry name.
        name: String,
        /// Manager-assigned id.
        timer_id: u64,
    },

    /// A timer callback ran.
    TimerFired {
        /// Wall-clock time of the fire.
        timestamp: DateTime<Utc>,
        /// Schedule entry name.
        name: String,
        /// Manager-assigned id.
        timer_id: u64,
        /// Simulated seconds since the run began.
        sim_time_secs: f64,
        /// How many times this entry has fired, including this one.
        fire_count: u64,
    },

    /// The scheduler loop has stopped.
    SchedulerStopped {
        /// When it stopped.
        timestamp: DateTime<Utc>,
        /// Why it stopped.
        reason: StopReason,
        /// Run totals.
        #[serde(skip_serializing_if = "Option::is_none")]
        summary: Option<RunSummary>,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Each [`emit`](Self::emit) bumps the sequence counter, writes one JSON
/// line and flushes. Serialization or I/O failures are dropped.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates an emitter that discards everything.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
