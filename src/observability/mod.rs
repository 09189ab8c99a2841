//! Observability
//!
//! Logging, metrics and the JSONL event stream used by the `run` command.
//! The timer core only emits `tracing` records and `metrics` samples; both
//! are no-ops until a subscriber or recorder is installed here.

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{Event, EventEmitter, RunSummary, StopReason};
pub use logging::{LogFormat, init_logging};
pub use metrics::init_metrics;
