//! Supervisor-specific error types

use shared::SharedError;
use std::time::Duration;
use thiserror::Error;

use crate::types::ExitInfo;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Another instance already holds the application lock{}", holder_suffix(.holder))]
    LockHeld { holder: Option<u32> },

    #[error("A backend that is not managed by this application is already serving {addr}")]
    StalePortConflict { addr: String },

    #[error("Port {addr} is held by an unknown process that does not answer health checks")]
    UnknownPortConflict { addr: String },

    #[error("Failed to launch backend '{program}': {message}")]
    SpawnFailure { program: String, message: String },

    #[error("Backend process exited before becoming healthy ({exit})")]
    EarlyExit { exit: ExitInfo },

    #[error("Backend did not become healthy within {waited:?} ({attempts} health checks)")]
    HealthTimeout { waited: Duration, attempts: u32 },

    #[error("Backend process crashed unexpectedly ({exit})")]
    UnexpectedCrash { exit: ExitInfo },

    #[error("Configuration error: {field}")]
    ConfigurationError { field: String },

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

fn holder_suffix(holder: &Option<u32>) -> String {
    match holder {
        Some(pid) => format!(" (pid {pid})"),
        None => String::new(),
    }
}

impl SupervisorError {
    pub fn config(field: impl Into<String>) -> Self {
        Self::ConfigurationError { field: field.into() }
    }

    pub fn spawn(program: impl Into<String>, message: impl ToString) -> Self {
        Self::SpawnFailure {
            program: program.into(),
            message: message.to_string(),
        }
    }

    /// Errors that end a launch attempt before the backend was ever ready
    pub fn is_startup_failure(&self) -> bool {
        // Everything but a lock redirect and a crash after Ready happens before the backend is up
        !matches!(
            self,
            SupervisorError::LockHeld { .. } | SupervisorError::UnexpectedCrash { .. }
        )
    }

    /// The one-shot diagnostic shown to the user through the shell
    pub fn user_message(&self) -> String {
        match self {
            SupervisorError::StalePortConflict { addr } => format!(
                "Another copy of the backend is already running on {addr}. \
                 Stop it (or close the other application using it) and start again."
            ),
            SupervisorError::UnknownPortConflict { addr } => format!(
                "Port {addr} is in use by another program. \
                 Free the port or configure a different one with GEO_ADS_BACKEND_PORT."
            ),
            SupervisorError::SpawnFailure { program, .. } => format!(
                "Could not start the backend ({program}). \
                 Check the installation or set GEO_ADS_BACKEND_EXE."
            ),
            SupervisorError::EarlyExit { exit } => format!(
                "The backend stopped during startup ({exit}). See supervisor.log for its output."
            ),
            SupervisorError::HealthTimeout { waited, .. } => format!(
                "The backend did not respond within {} seconds. See supervisor.log for details.",
                waited.as_secs()
            ),
            SupervisorError::UnexpectedCrash { exit } => format!(
                "The backend stopped unexpectedly ({exit}). The application will close."
            ),
            other => other.to_string(),
        }
    }
}

pub type SupervisorResult<T> = Result<T, SupervisorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_failure_classification() {
        let early = SupervisorError::EarlyExit {
            exit: ExitInfo::code(1),
        };
        let crash = SupervisorError::UnexpectedCrash {
            exit: ExitInfo::code(1),
        };
        let held = SupervisorError::LockHeld { holder: Some(7) };

        let lock_io = SupervisorError::from(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "lock file"));

        assert!(early.is_startup_failure());
        assert!(lock_io.is_startup_failure());
        assert!(!crash.is_startup_failure());
        assert!(!held.is_startup_failure());
    }

    #[test]
    fn test_lock_held_message_includes_holder() {
        let held = SupervisorError::LockHeld { holder: Some(4321) };
        assert!(held.to_string().ends_with("(pid 4321)"));

        let unknown = SupervisorError::LockHeld { holder: None };
        assert!(unknown.to_string().ends_with("application lock"));
    }

    #[test]
    fn test_user_messages_distinguish_port_conflicts() {
        let stale = SupervisorError::StalePortConflict {
            addr: "127.0.0.1:8000".to_string(),
        };
        let unknown = SupervisorError::UnknownPortConflict {
            addr: "127.0.0.1:8000".to_string(),
        };

        assert!(stale.user_message().contains("already running"));
        assert!(unknown.user_message().contains("in use by another program"));
        assert_ne!(stale.user_message(), unknown.user_message());
    }

    #[test]
    fn test_early_exit_embeds_exit_code() {
        let err = SupervisorError::EarlyExit {
            exit: ExitInfo::code(1),
        };
        assert!(err.to_string().contains("exit code 1"));
    }
}
