//! Test helpers and builder patterns for supervisor tests
//!
//! The builder describes each collaborator's behavior as plain values and
//! wires them into mockall mocks that also append to a shared call log, so
//! tests can assert on both what happened and in which order.

use chrono::Utc;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};

use supervisor::error::SupervisorError;
use supervisor::services::EventLog;
use supervisor::traits::{
    MockInstanceLock, MockPidStore, MockProcessLauncher, MockProcessTerminator, MockServiceProbe,
};
use supervisor::{
    ExitInfo, HealthStatus, LaunchedService, LockAcquisition, ProcessOwnership, ShellSignal, Supervisor, SupervisorConfig,
    TerminationOutcome,
};

use super::fixtures::TestFixtures;

/// One observed interaction with a collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    AcquireLock,
    ReadPid,
    WritePid(u32),
    ClearPid,
    PortCheck,
    HealthCheck,
    Ownership(u32),
    Terminate(u32),
    Launch,
}

/// Shared, ordered record of collaborator calls
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn contains(&self, call: &Call) -> bool {
        self.count(call) > 0
    }

    /// Index of the first occurrence of `call`
    pub fn position(&self, call: &Call) -> Option<usize> {
        self.calls().iter().position(|c| c == call)
    }

    pub fn last_position(&self, call: &Call) -> Option<usize> {
        self.calls().iter().rposition(|c| c == call)
    }
}

/// Type alias for a supervisor wired entirely to mocks
pub type TestSupervisor =
    Supervisor<MockInstanceLock, MockPidStore, MockServiceProbe, MockProcessLauncher, MockProcessTerminator>;

type HealthScript = Box<dyn FnMut(u32) -> HealthStatus + Send>;

/// Everything a test needs to drive and observe one supervisor
pub struct Harness {
    pub supervisor: TestSupervisor,
    pub signals: mpsc::UnboundedReceiver<ShellSignal>,
    /// Publishes the mock backend's exit
    pub exit_tx: watch::Sender<Option<ExitInfo>>,
    pub calls: CallLog,
}

/// Builder for test supervisors with sensible defaults
///
/// By default the lock is free, there is no leftover record, the port is
/// free, the launch succeeds and the first health check answers healthy.
pub struct SupervisorBuilder {
    config: SupervisorConfig,
    lock: LockAcquisition,
    leftover: Option<u32>,
    ownership: ProcessOwnership,
    port_open: bool,
    preflight_health: HealthStatus,
    launch_fails: bool,
    health: HealthScript,
    termination: TerminationOutcome,
}

impl SupervisorBuilder {
    pub fn new() -> Self {
        Self {
            config: TestFixtures::config(),
            lock: LockAcquisition::Acquired,
            leftover: None,
            ownership: ProcessOwnership::Owned,
            port_open: false,
            preflight_health: TestFixtures::refused(),
            launch_fails: false,
            health: Box::new(|_| HealthStatus::Healthy),
            termination: TerminationOutcome::Graceful,
        }
    }

    pub fn with_lock_held_by(mut self, holder: Option<u32>) -> Self {
        self.lock = LockAcquisition::HeldBy(holder);
        self
    }

    /// A pid record left behind by an earlier run
    pub fn with_leftover(mut self, pid: u32, ownership: ProcessOwnership) -> Self {
        self.leftover = Some(pid);
        self.ownership = ownership;
        self
    }

    /// Something already listens on the port and answers health checks like this
    pub fn with_port_occupied(mut self, health: HealthStatus) -> Self {
        self.port_open = true;
        self.preflight_health = health;
        self
    }

    pub fn with_launch_failure(mut self) -> Self {
        self.launch_fails = true;
        self
    }

    /// Health answers during startup, given the 1-based attempt number
    pub fn with_health<F>(mut self, script: F) -> Self
    where
        F: FnMut(u32) -> HealthStatus + Send + 'static,
    {
        self.health = Box::new(script);
        self
    }

    pub fn with_termination(mut self, outcome: TerminationOutcome) -> Self {
        self.termination = outcome;
        self
    }

    pub fn build(self) -> Harness {
        let calls = CallLog::default();
        let (exit_tx, exit_rx) = watch::channel(None);

        let mut lock = MockInstanceLock::new();
        let log = calls.clone();
        let acquisition = self.lock;
        lock.expect_try_acquire().returning(move || {
            log.push(Call::AcquireLock);
            Ok(acquisition)
        });

        let mut store = MockPidStore::new();
        let log = calls.clone();
        let leftover = Arc::new(Mutex::new(self.leftover));
        let record = leftover.clone();
        store.expect_read().returning(move || {
            log.push(Call::ReadPid);
            *record.lock().unwrap()
        });
        let log = calls.clone();
        let record = leftover.clone();
        store.expect_write().returning(move |pid| {
            log.push(Call::WritePid(pid));
            *record.lock().unwrap() = Some(pid);
            Ok(())
        });
        let log = calls.clone();
        let record = leftover;
        store.expect_clear().returning(move || {
            log.push(Call::ClearPid);
            *record.lock().unwrap() = None;
            Ok(())
        });

        let mut probe = MockServiceProbe::new();
        let log = calls.clone();
        let port_open = self.port_open;
        probe.expect_is_port_open().returning(move |_, _, _| {
            log.push(Call::PortCheck);
            port_open
        });
        let log = calls.clone();
        let preflight = self.preflight_health;
        let mut script = self.health;
        let mut attempts = 0u32;
        probe.expect_check_health().returning(move |_, _| {
            log.push(Call::HealthCheck);
            // The preflight check only happens when the port is occupied
            if port_open {
                return preflight.clone();
            }
            attempts += 1;
            script(attempts)
        });

        let mut launcher = MockProcessLauncher::new();
        let log = calls.clone();
        let launch_fails = self.launch_fails;
        launcher.expect_launch().returning(move |spec| {
            log.push(Call::Launch);
            if launch_fails {
                return Err(SupervisorError::spawn(
                    spec.program.display().to_string(),
                    "No such file or directory (os error 2)",
                ));
            }
            Ok(LaunchedService {
                pid: TestFixtures::BACKEND_PID,
                launched_at: Utc::now(),
                exit: exit_rx.clone(),
            })
        });

        let mut terminator = MockProcessTerminator::new();
        let log = calls.clone();
        let ownership = self.ownership;
        terminator.expect_ownership().returning(move |pid| {
            log.push(Call::Ownership(pid));
            ownership
        });
        let log = calls.clone();
        let termination = self.termination;
        terminator.expect_terminate_tree().returning(move |pid, _| {
            log.push(Call::Terminate(pid));
            termination
        });

        let mut supervisor = Supervisor::new(
            self.config,
            EventLog::disabled(),
            lock,
            store,
            probe,
            launcher,
            terminator,
        );
        let signals = supervisor
            .take_shell_signals()
            .expect("fresh supervisor has its signal receiver");

        Harness {
            supervisor,
            signals,
            exit_tx,
            calls,
        }
    }
}

impl Default for SupervisorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper functions for common test operations
pub struct TestHelpers;

impl TestHelpers {
    /// Wait for the `Ready` signal, failing on anything else
    pub async fn expect_ready(signals: &mut mpsc::UnboundedReceiver<ShellSignal>) -> String {
        match signals.recv().await {
            Some(ShellSignal::Ready { url }) => url,
            other => panic!("expected Ready signal, got {other:?}"),
        }
    }

    /// Drain whatever signals were emitted so far
    pub fn drain(signals: &mut mpsc::UnboundedReceiver<ShellSignal>) -> Vec<ShellSignal> {
        let mut drained = Vec::new();
        while let Ok(signal) = signals.try_recv() {
            drained.push(signal);
        }
        drained
    }

    pub fn fatal_messages(signals: &[ShellSignal]) -> Vec<String> {
        signals
            .iter()
            .filter_map(|signal| match signal {
                ShellSignal::Fatal { message } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }
}
