//! Entry point for the desktop supervisor binary
//!
//! Wires the real services into the supervisor, forwards OS termination
//! signals as quit requests and prints shell signals to stdout as JSON
//! lines for the UI wrapper.

use clap::Parser;
use std::process::ExitCode;
use tokio::sync::mpsc;

use shared::{logging, process_debug, process_info, ComponentId};
use supervisor::services::{
    EventLog, FileInstanceLock, FilePidStore, RealProcessLauncher, RealProcessTerminator, RealServiceProbe,
};
use supervisor::{Args, LaunchSpec, RunOutcome, ShellSignal, Supervisor};

/// Exit code when the backend never became ready
const EXIT_STARTUP_FAILED: u8 = 2;
/// Exit code when a ready backend crashed
const EXIT_BACKEND_CRASHED: u8 = 3;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    ComponentId::init_supervisor();
    logging::init_tracing(Some(&args.log_level));

    let config = args.into_config()?;
    logging::log_startup(ComponentId::current(), "desktop backend supervisor");
    process_debug!(ComponentId::current(), "Data directory: {}", config.data_dir.display());

    std::fs::create_dir_all(&config.data_dir)?;
    let event_log = EventLog::open(config.event_log_file());

    let terminator = RealProcessTerminator::for_backend(&LaunchSpec::for_backend(&config));
    let mut supervisor = Supervisor::new(
        config.clone(),
        event_log.clone(),
        FileInstanceLock::new(config.lock_file()),
        FilePidStore::new(config.pid_file()),
        RealServiceProbe::new(),
        RealProcessLauncher::new(event_log.clone()),
        terminator,
    );

    let printer = supervisor.take_shell_signals().map(|signals| tokio::spawn(print_shell_signals(signals)));
    tokio::spawn(forward_termination(supervisor.quit_sender()));

    let outcome = supervisor.run().await;

    // Dropping the supervisor closes the signal channel so the printer drains and ends
    drop(supervisor);
    if let Some(printer) = printer {
        let _ = printer.await;
    }
    event_log.flush().await;

    let code = match outcome {
        RunOutcome::AlreadyRunning { holder } => {
            process_info!(
                ComponentId::current(),
                "👋 Already running{}",
                holder.map(|pid| format!(" as pid {pid}")).unwrap_or_default()
            );
            ExitCode::SUCCESS
        }
        RunOutcome::Quit => {
            logging::log_success(ComponentId::current(), "Supervisor stopped gracefully");
            ExitCode::SUCCESS
        }
        RunOutcome::Failed(error) => {
            logging::log_error(ComponentId::current(), "Backend supervision", &error);
            if error.is_startup_failure() {
                ExitCode::from(EXIT_STARTUP_FAILED)
            } else {
                ExitCode::from(EXIT_BACKEND_CRASHED)
            }
        }
    };
    Ok(code)
}

/// Report each shell signal and print it as one JSON line on stdout
async fn print_shell_signals(mut signals: mpsc::UnboundedReceiver<ShellSignal>) {
    while let Some(signal) = signals.recv().await {
        match &signal {
            ShellSignal::Ready { url } => {
                logging::log_success(ComponentId::current(), &format!("Backend ready at {url}"));
            }
            ShellSignal::Fatal { message } => eprintln!("{message}"),
        }
        match serde_json::to_string(&signal) {
            Ok(line) => println!("{line}"),
            Err(e) => logging::log_error(ComponentId::current(), "Shell signal encoding", &e),
        }
    }
}

/// Turn Ctrl+C and SIGTERM into a quit request
async fn forward_termination(quit: mpsc::Sender<()>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            logging::log_error(ComponentId::current(), "Signal handling", &e);
                            return;
                        }
                        logging::log_shutdown(ComponentId::current(), "Received Ctrl+C signal");
                    }
                    _ = terminate.recv() => {
                        logging::log_shutdown(ComponentId::current(), "Received SIGTERM");
                    }
                }
            }
            Err(e) => {
                logging::log_error(ComponentId::current(), "SIGTERM handler", &e);
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                logging::log_shutdown(ComponentId::current(), "Received Ctrl+C signal");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            logging::log_error(ComponentId::current(), "Signal handling", &e);
            return;
        }
        logging::log_shutdown(ComponentId::current(), "Received Ctrl+C signal");
    }

    let _ = quit.send(()).await;
}
