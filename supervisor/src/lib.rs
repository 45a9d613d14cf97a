//! Desktop backend supervisor
//!
//! This library starts a local Python web backend for a desktop UI shell,
//! waits until it answers its health endpoint, watches it while it runs and
//! stops its whole process tree on the way out. A backend left behind by an
//! earlier crash is found through a pid record and cleaned up first.

pub mod config;
pub mod core;
pub mod error;
pub mod services;
pub mod supervisor;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{Args, SupervisorConfig};
pub use core::{GateOutcome, HealthGate, ManagedProcess, SupervisorState};
pub use error::{SupervisorError, SupervisorResult};
pub use supervisor::{RunOutcome, Supervisor};
pub use traits::{InstanceLock, LaunchSpec, LaunchedService, PidStore, ProcessLauncher, ProcessTerminator, ServiceProbe};
pub use types::{ExitInfo, HealthStatus, LockAcquisition, Phase, ProcessOwnership, ShellSignal, TerminationOutcome};
