//! Readiness gate for a freshly launched backend
//!
//! Polls the health endpoint at a fixed interval until it answers healthy,
//! the process exits, the deadline passes or a quit is requested. On every
//! tick the exit listener is consulted first, then the deadline, then the
//! probe, so a process that died never counts as ready and a probe is never
//! issued after the deadline.

use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::traits::ServiceProbe;
use crate::types::{ExitInfo, HealthStatus};
use shared::{process_debug, ComponentId};

/// How waiting for readiness ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Healthy { attempts: u32, waited: Duration },
    Exited(ExitInfo),
    TimedOut { attempts: u32, waited: Duration },
    QuitRequested,
}

/// Polling parameters for one startup
#[derive(Debug, Clone)]
pub struct HealthGate {
    url: String,
    poll_interval: Duration,
    deadline: Duration,
    probe_timeout: Duration,
}

impl HealthGate {
    pub fn new(url: impl Into<String>, poll_interval: Duration, deadline: Duration, probe_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            poll_interval,
            deadline,
            probe_timeout,
        }
    }

    /// Poll until one of the terminal conditions is reached
    ///
    /// `exit` is the launched process's exit notification and `quit` the
    /// supervisor's quit channel. Both are only borrowed; nothing is consumed
    /// beyond a single quit message when one arrives.
    pub async fn wait<P: ServiceProbe + ?Sized>(
        &self,
        probe: &P,
        exit: &mut watch::Receiver<Option<ExitInfo>>,
        quit: &mut mpsc::Receiver<()>,
    ) -> GateOutcome {
        let started = Instant::now();
        let deadline_at = started + self.deadline;
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut attempts = 0u32;
        let mut exit_open = true;

        loop {
            let ticked = tokio::select! {
                biased;
                Some(()) = quit.recv() => return GateOutcome::QuitRequested,
                changed = exit.changed(), if exit_open => {
                    if changed.is_err() {
                        exit_open = false;
                    }
                    false
                }
                _ = ticker.tick() => true,
            };

            if let Some(info) = *exit.borrow_and_update() {
                return GateOutcome::Exited(info);
            }

            let now = Instant::now();
            if now >= deadline_at {
                return GateOutcome::TimedOut {
                    attempts,
                    waited: now - started,
                };
            }

            if !ticked {
                continue;
            }

            attempts += 1;
            let budget = self.probe_timeout.min(deadline_at - now);
            match probe.check_health(&self.url, budget).await {
                HealthStatus::Healthy => {
                    // A crash racing the answer still loses
                    if let Some(info) = *exit.borrow_and_update() {
                        return GateOutcome::Exited(info);
                    }
                    return GateOutcome::Healthy {
                        attempts,
                        waited: started.elapsed(),
                    };
                }
                status => {
                    process_debug!(ComponentId::current(), "⏳ Health check {} not ready yet: {:?}", attempts, status);
                }
            }
        }
    }
}
