//! Backend process launcher
//!
//! Resolves the server executable, spawns it in the backend source root
//! with unbuffered output, forwards its output to the event log and reports
//! its exit through a watch channel.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::watch;

use crate::config::SupervisorConfig;
use crate::error::{SupervisorError, SupervisorResult};
use crate::services::event_log::EventLog;
use crate::services::output_handler;
use crate::traits::{LaunchSpec, LaunchedService, ProcessLauncher};
use crate::types::ExitInfo;
use shared::{process_debug, process_warn, ComponentId};

/// Name of the server executable when nothing more specific is found
pub const SERVER_EXECUTABLE: &str = "uvicorn";

/// ASGI application the server is pointed at
pub const APP_MODULE: &str = "app.main:app";

/// Environment override forcing the backend to flush output line by line
pub const UNBUFFERED_ENV: (&str, &str) = ("PYTHONUNBUFFERED", "1");

#[cfg(windows)]
const VENV_BIN: &[&str] = &["Scripts", "uvicorn.exe"];
#[cfg(not(windows))]
const VENV_BIN: &[&str] = &["bin", "uvicorn"];

fn venv_executable(venv: &Path) -> PathBuf {
    VENV_BIN.iter().fold(venv.to_path_buf(), |path, part| path.join(part))
}

/// Ordered list of executable locations to try
///
/// The explicit override comes first, then virtual environments next to the
/// backend sources, then an activated virtual environment.
pub fn executable_candidates(config: &SupervisorConfig, active_venv: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(exe) = &config.backend_exe {
        candidates.push(exe.clone());
    }
    candidates.push(venv_executable(&config.backend_dir.join(".venv")));
    candidates.push(venv_executable(&config.backend_dir.join("venv")));
    if let Some(venv) = active_venv {
        candidates.push(venv_executable(venv));
    }
    candidates
}

/// Pick the executable to launch
///
/// An explicit override is used verbatim even when it does not exist, so a
/// typo surfaces as a spawn failure naming it. Otherwise the first existing
/// candidate wins, falling back to the bare name on the search path.
pub fn resolve_executable(config: &SupervisorConfig) -> PathBuf {
    if let Some(exe) = &config.backend_exe {
        return exe.clone();
    }

    let active_venv = std::env::var_os("VIRTUAL_ENV").map(PathBuf::from);
    executable_candidates(config, active_venv.as_deref())
        .into_iter()
        .find(|candidate| candidate.is_file())
        .unwrap_or_else(|| PathBuf::from(SERVER_EXECUTABLE))
}

impl LaunchSpec {
    /// The backend command line for a configuration
    pub fn for_backend(config: &SupervisorConfig) -> Self {
        let mut args = vec![
            APP_MODULE.to_string(),
            "--host".to_string(),
            config.host.clone(),
            "--port".to_string(),
            config.port.to_string(),
        ];
        if config.reload {
            args.push("--reload".to_string());
        }

        Self {
            program: resolve_executable(config),
            args,
            working_dir: config.backend_dir.clone(),
            env: vec![(UNBUFFERED_ENV.0.to_string(), UNBUFFERED_ENV.1.to_string())],
        }
    }

    /// Human-readable command line for logs
    pub fn display(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Real launcher spawning processes with tokio
pub struct RealProcessLauncher {
    event_log: EventLog,
    source_name: String,
}

impl RealProcessLauncher {
    pub fn new(event_log: EventLog) -> Self {
        Self {
            event_log,
            source_name: ComponentId::Backend.to_string(),
        }
    }
}

#[async_trait]
impl ProcessLauncher for RealProcessLauncher {
    async fn launch(&self, spec: &LaunchSpec) -> SupervisorResult<LaunchedService> {
        let program = spec.program.display().to_string();

        if !spec.working_dir.is_dir() {
            return Err(SupervisorError::spawn(
                program,
                format!("working directory {} does not exist", spec.working_dir.display()),
            ));
        }

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(&spec.working_dir)
            .envs(spec.env.iter().map(|(key, value)| (key.as_str(), value.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);

        // Own process group, so the whole tree can be signalled at once
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| SupervisorError::spawn(program.clone(), e))?;
        let pid = child
            .id()
            .ok_or_else(|| SupervisorError::spawn(program.clone(), "process exited before its pid was known"))?;

        output_handler::spawn_output_forwarders(&mut child, &self.source_name, &self.event_log);

        let (exit_tx, exit_rx) = watch::channel(None);
        let event_log = self.event_log.clone();
        tokio::spawn(async move {
            let exit = match child.wait().await {
                Ok(status) => ExitInfo::from_status(status),
                Err(e) => {
                    process_warn!(ComponentId::current(), "⚠️ Lost track of backend pid {}: {}", pid, e);
                    ExitInfo { code: None, signal: None }
                }
            };
            event_log.record(format!("backend pid {pid} exited ({exit})"));
            let _ = exit_tx.send(Some(exit));
        });

        process_debug!(ComponentId::current(), "🚀 Spawned backend (PID: {}): {}", pid, spec.display());
        self.event_log.record(format!("launched backend pid {pid}: {}", spec.display()));

        Ok(LaunchedService {
            pid,
            launched_at: Utc::now(),
            exit: exit_rx,
        })
    }
}
