//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler, and
//! owns the shutdown signal shared between `main` and long-running
//! commands.

pub mod run;
pub mod validate;
pub mod version;

use std::sync::{Arc, OnceLock};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cli::args::{Cli, Commands};
use crate::error::{ExitCode, TimekeeperError};
use crate::observability::StopReason;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// Returns why the command stopped; short commands always report
/// [`StopReason::Completed`].
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli, shutdown: Shutdown) -> Result<StopReason, TimekeeperError> {
    match cli.command {
        Commands::Run(args) => run::run(&args, &shutdown).await,
        Commands::Validate(args) => {
            validate::run(&args)?;
            Ok(StopReason::Completed)
        }
        Commands::Version(args) => {
            version::run(&args);
            Ok(StopReason::Completed)
        }
    }
}

// ============================================================================
// Shutdown
// ============================================================================

/// A cancellation token that also remembers why it was cancelled.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
    reason: Arc<OnceLock<StopReason>>,
}

impl Shutdown {
    /// Creates an untriggered shutdown.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown. The first reason recorded wins.
    pub fn trigger(&self, reason: StopReason) {
        let _ = self.reason.set(reason);
        self.token.cancel();
    }

    /// Resolves once shutdown has been requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The recorded reason, if shutdown was requested.
    #[must_use]
    pub fn reason(&self) -> Option<StopReason> {
        self.reason.get().copied()
    }

    /// Spawns a task that triggers shutdown on SIGINT or SIGTERM.
    ///
    /// A second signal exits the process immediately.
    #[must_use]
    pub fn listen_for_signals(&self) -> JoinHandle<()> {
        let shutdown = self.clone();
        tokio::spawn(async move {
            let first = next_signal().await;
            eprintln!("\nShutting down gracefully... (press Ctrl+C again to force)");
            shutdown.trigger(first);

            let code = match next_signal().await {
                StopReason::Terminated => ExitCode::TERMINATED,
                _ => ExitCode::INTERRUPTED,
            };
            std::process::exit(code);
        })
    }
}

/// Waits for the next SIGINT or SIGTERM.
#[cfg(unix)]
async fn next_signal() -> StopReason {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => StopReason::Interrupted,
                _ = sigterm.recv() => StopReason::Terminated,
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to register SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            StopReason::Interrupted
        }
    }
}

#[cfg(not(unix))]
async fn next_signal() -> StopReason {
    let _ = tokio::signal::ctrl_c().await;
    StopReason::Interrupted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_records_first_reason() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_triggered());
        assert_eq!(shutdown.reason(), None);

        shutdown.trigger(StopReason::Terminated);
        shutdown.trigger(StopReason::Interrupted);
        shutdown.cancelled().await;

        assert!(shutdown.is_triggered());
        assert_eq!(shutdown.reason(), Some(StopReason::Terminated));
    }

    #[tokio::test]
    async fn shutdown_clones_share_state() {
        let shutdown = Shutdown::new();
        let clone = shutdown.clone();
        clone.trigger(StopReason::Interrupted);
        assert_eq!(shutdown.reason(), Some(StopReason::Interrupted));
    }
}
