//! Backend supervisor
//!
//! Drives one backend process through its lifecycle: single-instance lock,
//! cleanup of a backend left behind by an earlier run, port preflight,
//! launch, readiness gate, supervision while ready, and a shutdown that
//! terminates the whole process tree exactly once.
//!
//! Every side effect goes through an injected service, so the state machine
//! runs against mocks in tests.

use tokio::sync::{mpsc, watch};

use shared::{logging, process_debug, process_error, process_info, process_warn, ComponentId};

use crate::config::SupervisorConfig;
use crate::core::{GateOutcome, HealthGate, ManagedProcess, SupervisorState};
use crate::error::{SupervisorError, SupervisorResult};
use crate::services::EventLog;
use crate::traits::{InstanceLock, LaunchSpec, PidStore, ProcessLauncher, ProcessTerminator, ServiceProbe};
use crate::types::{ExitInfo, LockAcquisition, Phase, ProcessOwnership, ShellSignal};

/// How a call to [`Supervisor::run`] ended
#[derive(Debug)]
pub enum RunOutcome {
    /// Another instance holds the lock; nothing was started
    AlreadyRunning { holder: Option<u32> },
    /// Quit was requested and shutdown completed
    Quit,
    /// Startup failed or the backend crashed; shutdown completed
    Failed(SupervisorError),
}

/// Why startup stopped before reaching `Ready`
enum Interrupted {
    Quit,
    Error(SupervisorError),
}

impl From<SupervisorError> for Interrupted {
    fn from(error: SupervisorError) -> Self {
        Interrupted::Error(error)
    }
}

/// Main supervisor with injected services
pub struct Supervisor<I, S, P, L, T>
where
    I: InstanceLock,
    S: PidStore,
    P: ServiceProbe,
    L: ProcessLauncher,
    T: ProcessTerminator,
{
    config: SupervisorConfig,
    state: SupervisorState,
    event_log: EventLog,

    /// Injected services
    instance_lock: I,
    pid_store: S,
    probe: P,
    launcher: L,
    terminator: T,

    /// Outbound signals for the UI shell
    shell_tx: mpsc::UnboundedSender<ShellSignal>,
    shell_rx: Option<mpsc::UnboundedReceiver<ShellSignal>>,
    fatal_sent: bool,

    /// Quit requests from the shell or the OS
    quit_tx: mpsc::Sender<()>,
    quit_rx: mpsc::Receiver<()>,
}

impl<I, S, P, L, T> Supervisor<I, S, P, L, T>
where
    I: InstanceLock,
    S: PidStore,
    P: ServiceProbe,
    L: ProcessLauncher,
    T: ProcessTerminator,
{
    /// Create a new supervisor with injected dependencies
    pub fn new(
        config: SupervisorConfig,
        event_log: EventLog,
        instance_lock: I,
        pid_store: S,
        probe: P,
        launcher: L,
        terminator: T,
    ) -> Self {
        let (shell_tx, shell_rx) = mpsc::unbounded_channel();
        let (quit_tx, quit_rx) = mpsc::channel(4);

        Self {
            config,
            state: SupervisorState::new(),
            event_log,
            instance_lock,
            pid_store,
            probe,
            launcher,
            terminator,
            shell_tx,
            shell_rx: Some(shell_rx),
            fatal_sent: false,
            quit_tx,
            quit_rx,
        }
    }

    /// Sender for external quit requests
    pub fn quit_sender(&self) -> mpsc::Sender<()> {
        self.quit_tx.clone()
    }

    /// Receiver for `Ready`/`Fatal` signals; can be taken once
    pub fn take_shell_signals(&mut self) -> Option<mpsc::UnboundedReceiver<ShellSignal>> {
        self.shell_rx.take()
    }

    pub fn state(&self) -> &SupervisorState {
        &self.state
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Run startup, supervise while ready, and shut down
    ///
    /// Returns once the backend is stopped. The only outcome that skips
    /// shutdown is `AlreadyRunning`, where nothing was started.
    pub async fn run(&mut self) -> RunOutcome {
        self.event_log.record("supervisor starting");

        match self.start().await {
            Ok(()) => {}
            Err(Interrupted::Error(SupervisorError::LockHeld { holder })) => {
                process_info!(
                    ComponentId::current(),
                    "👋 Another instance is already running{}; exiting",
                    holder.map(|pid| format!(" (pid {pid})")).unwrap_or_default()
                );
                self.event_log.record("another instance holds the lock; exiting");
                self.enter(Phase::Stopped);
                return RunOutcome::AlreadyRunning { holder };
            }
            Err(Interrupted::Quit) => {
                process_info!(ComponentId::current(), "🛑 Quit requested during startup");
                self.event_log.record("quit requested during startup");
                self.shutdown().await;
                return RunOutcome::Quit;
            }
            Err(Interrupted::Error(error)) => {
                self.fail(&error);
                self.shutdown().await;
                return RunOutcome::Failed(error);
            }
        }

        let outcome = self.supervise().await;
        self.shutdown().await;
        outcome
    }

    /// Stop the managed backend and move to `Stopped`
    ///
    /// Safe to call any number of times, before, during or after `run`;
    /// only the first call with a live handle terminates anything.
    pub async fn shutdown(&mut self) {
        self.state.request_quit();

        let Some(process) = self.state.begin_stop() else {
            if self.state.phase() != Phase::Stopped {
                self.enter(Phase::Stopped);
            }
            self.event_log.flush().await;
            return;
        };

        self.enter(Phase::Stopping);
        process_info!(ComponentId::current(), "🛑 Stopping backend (PID: {})...", process.pid);
        self.event_log.record(format!("stopping backend pid {}", process.pid));

        let outcome = self
            .terminator
            .terminate_tree(process.pid, self.config.stop_timeout)
            .await;
        self.event_log
            .record(format!("backend pid {} stop outcome: {:?}", process.pid, outcome));

        if let Err(e) = self.pid_store.clear().await {
            process_warn!(ComponentId::current(), "⚠️ Could not clear pid record: {}", e);
        }

        self.state.finish_stop();
        self.enter(Phase::Stopped);
        process_info!(ComponentId::current(), "✅ Backend stopped");
        self.event_log.flush().await;
    }

    async fn start(&mut self) -> Result<(), Interrupted> {
        self.enter(Phase::AcquiringLock);
        match self.instance_lock.try_acquire()? {
            LockAcquisition::Acquired => {}
            LockAcquisition::HeldBy(holder) => return Err(SupervisorError::LockHeld { holder }.into()),
        }
        self.check_quit()?;

        self.enter(Phase::Reconciling);
        self.reconcile().await;
        self.check_quit()?;

        self.enter(Phase::PortPreflight);
        self.preflight().await?;
        self.check_quit()?;

        self.enter(Phase::Launching);
        self.launch().await?;

        self.enter(Phase::AwaitingHealth);
        self.await_health().await?;

        self.enter(Phase::Ready);
        let url = self.config.base_url();
        process_info!(ComponentId::current(), "✅ Backend ready at {}", url);
        let _ = self.shell_tx.send(ShellSignal::Ready { url });
        Ok(())
    }

    /// Consume a pending quit request without waiting
    fn check_quit(&mut self) -> Result<(), Interrupted> {
        match self.quit_rx.try_recv() {
            Ok(()) => Err(Interrupted::Quit),
            Err(_) => Ok(()),
        }
    }

    /// Clean up a backend recorded by a previous run
    ///
    /// Never fails; the record is cleared whatever happened to the process.
    async fn reconcile(&mut self) {
        let Some(pid) = self.pid_store.read().await else {
            process_debug!(ComponentId::current(), "No usable leftover backend record");
            // An unparsable record is stale metadata too
            if let Err(e) = self.pid_store.clear().await {
                process_warn!(ComponentId::current(), "⚠️ Could not clear stale pid record: {}", e);
            }
            return;
        };

        process_info!(ComponentId::current(), "🧹 Found leftover backend record (PID: {})", pid);
        self.event_log.record(format!("reconciling leftover backend pid {pid}"));

        match self.terminator.ownership(pid).await {
            ProcessOwnership::Foreign => {
                process_warn!(
                    ComponentId::current(),
                    "⚠️ PID {} now belongs to an unrelated process; leaving it alone",
                    pid
                );
                self.event_log
                    .record(format!("pid {pid} belongs to an unrelated process; not signalled"));
            }
            ownership => {
                // A dead leader can still leave its group behind
                let outcome = self.terminator.terminate_tree(pid, self.config.stop_timeout).await;
                self.event_log.record(format!(
                    "leftover pid {pid} ({:?}) termination outcome: {:?}",
                    ownership, outcome
                ));
            }
        }

        if let Err(e) = self.pid_store.clear().await {
            process_warn!(ComponentId::current(), "⚠️ Could not clear stale pid record: {}", e);
        }
    }

    /// Refuse to launch onto an occupied port
    async fn preflight(&mut self) -> SupervisorResult<()> {
        let addr = self.config.service_addr();
        let timeout = self.config.probe_timeout;

        if !self.probe.is_port_open(&self.config.host, self.config.port, timeout).await {
            process_debug!(ComponentId::current(), "Port {} is free", addr);
            self.event_log.record(format!("port {addr} is free"));
            return Ok(());
        }

        let status = self.probe.check_health(&self.config.health_url(), timeout).await;
        self.event_log
            .record(format!("port {addr} already in use; health check says {status:?}"));
        if status.is_healthy() {
            Err(SupervisorError::StalePortConflict { addr })
        } else {
            Err(SupervisorError::UnknownPortConflict { addr })
        }
    }

    async fn launch(&mut self) -> SupervisorResult<()> {
        let spec = LaunchSpec::for_backend(&self.config);
        logging::log_progress(ComponentId::current(), "Launching backend", &spec.display());

        let launched = self.launcher.launch(&spec).await?;
        let pid = launched.pid;

        if let Err(e) = self.pid_store.write(pid).await {
            process_warn!(ComponentId::current(), "⚠️ Could not record backend pid {}: {}", pid, e);
            self.event_log.record(format!("failed to record backend pid {pid}: {e}"));
        }
        self.state.set_managed(ManagedProcess::from(launched));
        Ok(())
    }

    async fn await_health(&mut self) -> Result<(), Interrupted> {
        let mut exit = self.exit_watch();
        let gate = HealthGate::new(
            self.config.health_url(),
            self.config.poll_interval,
            self.config.health_timeout,
            self.config.probe_timeout,
        );

        match gate.wait(&self.probe, &mut exit, &mut self.quit_rx).await {
            GateOutcome::Healthy { attempts, waited } => {
                self.event_log.record(format!(
                    "backend healthy after {attempts} health checks ({} ms)",
                    waited.as_millis()
                ));
                Ok(())
            }
            GateOutcome::Exited(exit) => Err(SupervisorError::EarlyExit { exit }.into()),
            GateOutcome::TimedOut { attempts, waited } => {
                Err(SupervisorError::HealthTimeout { waited, attempts }.into())
            }
            GateOutcome::QuitRequested => Err(Interrupted::Quit),
        }
    }

    /// Wait in `Ready` for either a quit request or the backend exiting
    async fn supervise(&mut self) -> RunOutcome {
        let mut exit = self.exit_watch();

        loop {
            tokio::select! {
                biased;
                Some(()) = self.quit_rx.recv() => {
                    process_info!(ComponentId::current(), "🛑 Quit requested");
                    self.event_log.record("quit requested");
                    return RunOutcome::Quit;
                }
                changed = exit.changed() => {
                    if let Some(info) = *exit.borrow_and_update() {
                        return self.on_exit(info);
                    }
                    if changed.is_err() {
                        process_warn!(ComponentId::current(), "⚠️ Lost the backend exit listener; waiting for quit");
                        self.quit_rx.recv().await;
                        return RunOutcome::Quit;
                    }
                }
            }
        }
    }

    fn on_exit(&mut self, exit: ExitInfo) -> RunOutcome {
        if !self.state.is_unexpected_exit() {
            self.event_log.record(format!("backend exited during stop ({exit})"));
            return RunOutcome::Quit;
        }

        let error = SupervisorError::UnexpectedCrash { exit };
        process_error!(ComponentId::current(), "💥 {}", error);
        self.event_log.record(format!("backend crashed ({exit}); shutting down"));
        self.emit_fatal(&error);
        self.state.request_quit();
        RunOutcome::Failed(error)
    }

    fn fail(&mut self, error: &SupervisorError) {
        self.enter(Phase::FailedStartup);
        process_error!(ComponentId::current(), "❌ Startup failed: {}", error);
        self.event_log.record(format!("startup failed: {error}"));
        self.emit_fatal(error);
    }

    fn emit_fatal(&mut self, error: &SupervisorError) {
        if self.fatal_sent {
            return;
        }
        self.fatal_sent = true;
        let _ = self.shell_tx.send(ShellSignal::Fatal {
            message: error.user_message(),
        });
    }

    fn exit_watch(&self) -> watch::Receiver<Option<ExitInfo>> {
        match self.state.managed() {
            Some(process) => process.exit_watch(),
            // Nothing launched: a listener that never fires
            None => watch::channel(None).1,
        }
    }

    fn enter(&mut self, phase: Phase) {
        let previous = self.state.transition(phase);
        if previous != phase {
            self.event_log.record(format!("phase {previous} -> {phase}"));
        }
    }
}
