//! Trait definitions with mockall annotations for testing
//!
//! Each seam between the supervisor's state machine and the operating system
//! is a trait here. The real implementations live in `services`; tests swap
//! in the generated mocks.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;

use crate::error::SupervisorResult;
use crate::types::{ExitInfo, HealthStatus, LockAcquisition, ProcessOwnership, TerminationOutcome};

/// Fully resolved command line for the backend process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// Overrides applied on top of the inherited environment
    pub env: Vec<(String, String)>,
}

/// Handle returned by a successful launch
///
/// `exit` flips from `None` to `Some` exactly once, when the process has
/// been reaped.
#[derive(Debug)]
pub struct LaunchedService {
    pub pid: u32,
    pub launched_at: DateTime<Utc>,
    pub exit: watch::Receiver<Option<ExitInfo>>,
}

/// Single-instance guard for the application
#[mockall::automock]
pub trait InstanceLock: Send + Sync {
    /// Try to become the only running instance
    ///
    /// # Returns
    /// `Acquired` when this instance now owns the lock, or `HeldBy` with the
    /// holder's pid when another instance already owns it
    fn try_acquire(&self) -> SupervisorResult<LockAcquisition>;
}

/// Durable record of the managed backend's pid
///
/// Survives restarts of the supervisor so a later run can find and clean up
/// a backend left behind by an unclean shutdown.
#[mockall::automock]
#[async_trait::async_trait]
pub trait PidStore: Send + Sync {
    /// Persist the pid of a freshly launched backend
    async fn write(&self, pid: u32) -> SupervisorResult<()>;

    /// Read the recorded pid; a missing or unparsable record is `None`
    async fn read(&self) -> Option<u32>;

    /// Delete the record; deleting an absent record succeeds
    async fn clear(&self) -> SupervisorResult<()>;
}

/// Network checks against the backend's address
#[mockall::automock]
#[async_trait::async_trait]
pub trait ServiceProbe: Send + Sync {
    /// Issue one bounded liveness request against `url`
    ///
    /// Never fails; every failure mode maps onto a `HealthStatus` and the
    /// call returns within `timeout`.
    async fn check_health(&self, url: &str, timeout: Duration) -> HealthStatus;

    /// Whether anything accepts TCP connections on `host:port`
    async fn is_port_open(&self, host: &str, port: u16, timeout: Duration) -> bool;
}

/// Starts the backend process
#[mockall::automock]
#[async_trait::async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Spawn the process described by `spec` and wire up its output and
    /// exit notification
    async fn launch(&self, spec: &LaunchSpec) -> SupervisorResult<LaunchedService>;
}

/// Stops process trees
#[mockall::automock]
#[async_trait::async_trait]
pub trait ProcessTerminator: Send + Sync {
    /// Check whether `pid` is alive and looks like the backend
    async fn ownership(&self, pid: u32) -> ProcessOwnership;

    /// Terminate `pid` and all its descendants
    ///
    /// Sends a graceful signal, waits up to `timeout`, then escalates to a
    /// forceful kill. Always returns; an absent pid is a no-op.
    async fn terminate_tree(&self, pid: u32, timeout: Duration) -> TerminationOutcome;
}
