//! Service implementations
//!
//! This module contains real implementations of all service traits.
//! These are the production implementations that touch files, sockets and
//! processes.

pub mod event_log;
pub mod instance_lock;
pub mod launcher;
pub mod liveness;
pub mod output_handler;
pub mod pid_store;
pub mod port_check;
pub mod probe;
pub mod process_tree;
pub mod terminator;

#[cfg(test)]
mod tests;

// Re-export all service implementations
pub use event_log::EventLog;
pub use instance_lock::FileInstanceLock;
pub use launcher::RealProcessLauncher;
pub use pid_store::FilePidStore;
pub use probe::RealServiceProbe;
pub use terminator::RealProcessTerminator;
