//! Process tree terminator
//!
//! Two sequential timeout-bound phases: a graceful signal to the whole tree
//! with a wait of up to the caller's timeout, then a forceful kill of the
//! (re-discovered) tree with a short settle wait. Both phases swallow
//! "no such process".

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;

use crate::services::launcher::{APP_MODULE, SERVER_EXECUTABLE};
use crate::services::process_tree;
use crate::traits::{LaunchSpec, ProcessTerminator};
use crate::types::{ProcessOwnership, TerminationOutcome};
use shared::{process_debug, process_info, process_warn, ComponentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Severity {
    Graceful,
    Forceful,
}

/// Real terminator using process groups and per-process signals
pub struct RealProcessTerminator {
    /// Lowercased substrings identifying the backend in a command line
    service_markers: Vec<String>,
    poll_interval: Duration,
    kill_settle: Duration,
}

impl RealProcessTerminator {
    pub fn new(service_markers: Vec<String>) -> Self {
        Self {
            service_markers: service_markers.into_iter().map(|m| m.to_lowercase()).collect(),
            poll_interval: Duration::from_millis(50),
            kill_settle: Duration::from_millis(500),
        }
    }

    /// Markers derived from the backend command line
    pub fn for_backend(spec: &LaunchSpec) -> Self {
        let mut markers = vec![SERVER_EXECUTABLE.to_string(), APP_MODULE.to_string()];
        if let Some(name) = spec.program.file_stem() {
            markers.push(name.to_string_lossy().into_owned());
        }
        Self::new(markers)
    }

    /// Wait until the known tree and the backend's process group are empty
    async fn wait_for_exit(&self, leader: u32, tree: &[u32], timeout: Duration) -> bool {
        let all_gone = async {
            while tree.iter().any(|pid| process_tree::is_alive(*pid)) || process_tree::group_alive(leader) {
                sleep(self.poll_interval).await;
            }
        };
        tokio::time::timeout(timeout, all_gone).await.is_ok()
    }
}

#[cfg(unix)]
fn send_signal(root: u32, tree: &[u32], severity: Severity) {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, killpg, Signal};
    use nix::unistd::Pid;

    let signal = match severity {
        Severity::Graceful => Signal::SIGTERM,
        Severity::Forceful => Signal::SIGKILL,
    };

    // The backend leads its own process group; ESRCH just means it doesn't
    match killpg(Pid::from_raw(root as i32), signal) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => {
            process_debug!(ComponentId::current(), "killpg({}, {}) failed: {}", root, signal, e);
        }
    }

    for &pid in tree {
        match kill(Pid::from_raw(pid as i32), signal) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => {
                process_warn!(ComponentId::current(), "⚠️ Could not send {} to pid {}: {}", signal, pid, e);
            }
        }
    }
}

#[cfg(not(unix))]
fn send_signal(_root: u32, tree: &[u32], severity: Severity) {
    use sysinfo::{Pid, Signal, System};

    let mut system = System::new();
    system.refresh_processes();
    for &pid in tree {
        if let Some(process) = system.process(Pid::from_u32(pid)) {
            let delivered = match severity {
                Severity::Graceful => process.kill_with(Signal::Term).unwrap_or(false),
                Severity::Forceful => false,
            };
            if !delivered {
                process.kill();
            }
        }
    }
}

#[async_trait]
impl ProcessTerminator for RealProcessTerminator {
    async fn ownership(&self, pid: u32) -> ProcessOwnership {
        if !process_tree::is_signallable(pid) {
            return ProcessOwnership::Foreign;
        }
        if !process_tree::is_alive(pid) {
            return ProcessOwnership::Gone;
        }

        match process_tree::describe(pid) {
            Some(description) if self.service_markers.iter().any(|m| description.contains(m)) => {
                ProcessOwnership::Owned
            }
            Some(description) => {
                process_debug!(ComponentId::current(), "pid {} does not look like the backend: {}", pid, description);
                ProcessOwnership::Foreign
            }
            None => ProcessOwnership::Gone,
        }
    }

    async fn terminate_tree(&self, pid: u32, timeout: Duration) -> TerminationOutcome {
        if !process_tree::is_signallable(pid) {
            process_warn!(ComponentId::current(), "⚠️ Refusing to signal pid {}", pid);
            return TerminationOutcome::NotRunning;
        }

        let leader_alive = process_tree::is_alive(pid);
        let orphaned_group = !leader_alive && process_tree::group_alive(pid);
        if !leader_alive && !orphaned_group {
            process_debug!(ComponentId::current(), "pid {} is not running", pid);
            return TerminationOutcome::NotRunning;
        }

        let tree = if leader_alive { process_tree::collect_tree(pid) } else { Vec::new() };
        process_debug!(ComponentId::current(), "🛑 Sending graceful stop to group {} and tree {:?}", pid, tree);
        send_signal(pid, &tree, Severity::Graceful);

        if self.wait_for_exit(pid, &tree, timeout).await {
            process_info!(ComponentId::current(), "🛑 Backend tree rooted at {} stopped gracefully", pid);
            return TerminationOutcome::Graceful;
        }

        // Pick up anything forked while we were waiting
        let mut survivors = tree;
        for late in process_tree::collect_tree(pid) {
            if !survivors.contains(&late) {
                survivors.push(late);
            }
        }

        process_warn!(
            ComponentId::current(),
            "🔨 Backend tree rooted at {} ignored graceful stop for {:?}, force killing {:?}",
            pid,
            timeout,
            survivors
        );
        send_signal(pid, &survivors, Severity::Forceful);

        if !self.wait_for_exit(pid, &survivors, self.kill_settle).await {
            process_warn!(ComponentId::current(), "⚠️ Some of {:?} still alive after force kill", survivors);
        }
        TerminationOutcome::Forced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_backend_markers_come_from_the_command_line() {
        let spec = LaunchSpec {
            program: PathBuf::from("/srv/backend/.venv/bin/uvicorn"),
            args: vec![APP_MODULE.to_string()],
            working_dir: PathBuf::from("/srv/backend"),
            env: Vec::new(),
        };

        let terminator = RealProcessTerminator::for_backend(&spec);

        assert!(terminator.service_markers.contains(&APP_MODULE.to_string()));
        assert!(terminator.service_markers.contains(&SERVER_EXECUTABLE.to_string()));
        // Any interpreter could reuse the pid, so a bare "python" proves nothing
        assert!(!terminator.service_markers.iter().any(|m| m == "python"));
    }
}
