//! `timekeeper` - Tick-driven timer scheduler

use clap::Parser;

use timekeeper::cli::args::{Cli, OutputFormat};
use timekeeper::cli::commands::{self, Shutdown};
use timekeeper::error::ExitCode;
use timekeeper::observability::{LogFormat, StopReason, init_logging};

// The timer manager is bound to the thread that creates it, so the whole
// command runs on one thread.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        let format = match cli.log_format {
            OutputFormat::Human => LogFormat::Human,
            OutputFormat::Json => LogFormat::Json,
        };
        init_logging(format, cli.verbose, cli.color);
    }

    let shutdown = Shutdown::new();
    let _signals = shutdown.listen_for_signals();

    match commands::dispatch(cli, shutdown).await {
        Ok(StopReason::Completed) => std::process::exit(ExitCode::SUCCESS),
        Ok(StopReason::Interrupted) => std::process::exit(ExitCode::INTERRUPTED),
        Ok(StopReason::Terminated) => std::process::exit(ExitCode::TERMINATED),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
