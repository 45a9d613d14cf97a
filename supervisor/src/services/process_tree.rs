//! Process tree discovery and liveness checks

use std::collections::{HashMap, HashSet, VecDeque};
use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, System, UpdateKind};

/// Pids that may never be signalled: invalid values, init and ourselves
pub fn is_signallable(pid: u32) -> bool {
    pid > 1 && pid <= i32::MAX as u32 && pid != std::process::id()
}

/// `root` followed by all of its descendants, breadth first
///
/// `links` are `(pid, parent)` pairs from a process table snapshot.
pub fn descendants_of(root: u32, links: &[(u32, Option<u32>)]) -> Vec<u32> {
    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    for &(pid, parent) in links {
        if let Some(parent) = parent {
            children.entry(parent).or_default().push(pid);
        }
    }

    let mut tree = vec![root];
    let mut seen: HashSet<u32> = HashSet::from([root]);
    let mut queue = VecDeque::from([root]);
    while let Some(current) = queue.pop_front() {
        for &child in children.get(&current).into_iter().flatten() {
            if seen.insert(child) {
                tree.push(child);
                queue.push_back(child);
            }
        }
    }
    tree
}

/// Snapshot the process table and collect the tree rooted at `root`
pub fn collect_tree(root: u32) -> Vec<u32> {
    let mut system = System::new();
    system.refresh_processes();

    let links: Vec<(u32, Option<u32>)> = system
        .processes()
        .iter()
        .filter(|(_, process)| process.status() != ProcessStatus::Zombie)
        .map(|(pid, process)| (pid.as_u32(), process.parent().map(|p| p.as_u32())))
        .collect();

    descendants_of(root, &links)
        .into_iter()
        .filter(|pid| is_signallable(*pid))
        .collect()
}

/// Name and command line of a live process, lowercased
pub fn describe(pid: u32) -> Option<String> {
    let mut system = System::new();
    let target = Pid::from_u32(pid);
    // A plain refresh leaves the command line empty
    let kind = ProcessRefreshKind::new().with_cmd(UpdateKind::Always);
    if !system.refresh_process_specifics(target, kind) {
        return None;
    }
    system.process(target).map(|process| {
        let mut description = process.name().to_string();
        for arg in process.cmd() {
            description.push(' ');
            description.push_str(arg);
        }
        description.to_lowercase()
    })
}

fn is_zombie(pid: u32) -> bool {
    let mut system = System::new();
    let target = Pid::from_u32(pid);
    system.refresh_process(target)
        && system
            .process(target)
            .map(|process| process.status() == ProcessStatus::Zombie)
            .unwrap_or(false)
}

/// Whether `pid` names a live (non-zombie) process
#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid as NixPid;

    if pid == 0 || pid > i32::MAX as u32 {
        return false;
    }
    match kill(NixPid::from_raw(pid as i32), None) {
        Ok(()) => !is_zombie(pid),
        // Exists but belongs to someone else
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub fn is_alive(pid: u32) -> bool {
    let mut system = System::new();
    system.refresh_process(Pid::from_u32(pid)) && !is_zombie(pid)
}

/// Whether any process is left in the process group led by `leader`
///
/// Catches workers orphaned when the group leader itself already died.
#[cfg(unix)]
pub fn group_alive(leader: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid as NixPid;

    if leader <= 1 || leader > i32::MAX as u32 {
        return false;
    }
    matches!(killpg(NixPid::from_raw(leader as i32), None), Ok(()) | Err(Errno::EPERM))
}

#[cfg(not(unix))]
pub fn group_alive(_leader: u32) -> bool {
    false
}
