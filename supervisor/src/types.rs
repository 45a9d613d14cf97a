//! Value types exchanged between the supervisor and its services

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a managed process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitInfo {
    pub fn code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn signal(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    pub fn from_status(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(signal)) => write!(f, "terminated by signal {signal}"),
            (None, None) => write!(f, "unknown exit status"),
        }
    }
}

/// Result of a single liveness probe
///
/// An unreachable endpoint and a responsive-but-failing one are kept apart
/// so port conflicts can be diagnosed correctly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Unhealthy { http_status: u16 },
    Unreachable { reason: String },
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Supervisor lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    AcquiringLock,
    Reconciling,
    PortPreflight,
    Launching,
    AwaitingHealth,
    Ready,
    Stopping,
    Stopped,
    FailedStartup,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::AcquiringLock => "acquiring_lock",
            Phase::Reconciling => "reconciling",
            Phase::PortPreflight => "port_preflight",
            Phase::Launching => "launching",
            Phase::AwaitingHealth => "awaiting_health",
            Phase::Ready => "ready",
            Phase::Stopping => "stopping",
            Phase::Stopped => "stopped",
            Phase::FailedStartup => "failed_startup",
        };
        write!(f, "{name}")
    }
}

/// Signals handed outward to the UI shell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum ShellSignal {
    /// Backend is healthy; safe to show the UI
    Ready { url: String },
    /// Terminal failure with a human-readable message
    Fatal { message: String },
}

/// Outcome of a process-tree termination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationOutcome {
    /// Nothing was running under that pid
    NotRunning,
    /// The tree exited after the graceful signal
    Graceful,
    /// The forceful signal was needed
    Forced,
}

/// Whether a recorded pid still belongs to the backend we launched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOwnership {
    Owned,
    Foreign,
    Gone,
}

/// Result of trying to become the single running instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAcquisition {
    Acquired,
    HeldBy(Option<u32>),
}
