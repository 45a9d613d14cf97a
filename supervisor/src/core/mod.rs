//! Core supervisor logic
//!
//! State and readiness polling with no direct I/O; everything that touches
//! the OS comes in through the service traits.

pub mod health_gate;
pub mod state;

pub use health_gate::{GateOutcome, HealthGate};
pub use state::{ManagedProcess, SupervisorState};
