//! Supervisor state management
//!
//! Pure state for the lifecycle phase, the quitting/stopping flags and the
//! single managed-process handle. Testable without any process or socket.

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::traits::LaunchedService;
use crate::types::{ExitInfo, Phase};
use shared::{process_debug, ComponentId};

/// The one backend process the supervisor currently owns
#[derive(Debug)]
pub struct ManagedProcess {
    pub pid: u32,
    pub launched_at: DateTime<Utc>,
    exit: watch::Receiver<Option<ExitInfo>>,
}

impl ManagedProcess {
    /// A fresh receiver for the exit notification
    pub fn exit_watch(&self) -> watch::Receiver<Option<ExitInfo>> {
        self.exit.clone()
    }
}

impl From<LaunchedService> for ManagedProcess {
    fn from(launched: LaunchedService) -> Self {
        Self {
            pid: launched.pid,
            launched_at: launched.launched_at,
            exit: launched.exit,
        }
    }
}

/// Core supervisor state
#[derive(Debug)]
pub struct SupervisorState {
    phase: Phase,
    history: Vec<Phase>,
    /// The application has been asked to exit
    quitting: bool,
    /// A termination of the managed process is in flight
    stopping: bool,
    managed: Option<ManagedProcess>,
}

impl SupervisorState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            history: vec![Phase::Idle],
            quitting: false,
            stopping: false,
            managed: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Every phase entered so far, in order, starting with `Idle`
    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    pub fn has_visited(&self, phase: Phase) -> bool {
        self.history.contains(&phase)
    }

    /// Enter `next`, returning the phase that was left
    pub fn transition(&mut self, next: Phase) -> Phase {
        let previous = self.phase;
        if previous != next {
            process_debug!(ComponentId::current(), "🔄 Phase {} → {}", previous, next);
            self.phase = next;
            self.history.push(next);
        }
        previous
    }

    pub fn is_quitting(&self) -> bool {
        self.quitting
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping
    }

    /// Mark the application as exiting; returns false if it already was
    pub fn request_quit(&mut self) -> bool {
        !std::mem::replace(&mut self.quitting, true)
    }

    /// An exit observed now was not caused by us
    pub fn is_unexpected_exit(&self) -> bool {
        !self.quitting && !self.stopping
    }

    pub fn managed(&self) -> Option<&ManagedProcess> {
        self.managed.as_ref()
    }

    /// Install the handle for a freshly launched process
    ///
    /// Any previous handle is replaced; there is never more than one.
    pub fn set_managed(&mut self, process: ManagedProcess) -> Option<ManagedProcess> {
        self.managed.replace(process)
    }

    /// Claim the managed process for termination
    ///
    /// Invalidates the handle and raises `stopping`. Returns `None` when
    /// there is nothing to stop or a stop is already in flight, so exactly
    /// one caller ever terminates a given process.
    pub fn begin_stop(&mut self) -> Option<ManagedProcess> {
        if self.stopping {
            return None;
        }
        let process = self.managed.take()?;
        self.stopping = true;
        Some(process)
    }

    /// Lower `stopping` once the in-flight termination has finished
    pub fn finish_stop(&mut self) {
        self.stopping = false;
    }
}

impl Default for SupervisorState {
    fn default() -> Self {
        Self::new()
    }
}
