//! Test fixtures and data for supervisor tests

use std::path::PathBuf;
use std::time::Duration;

use supervisor::{HealthStatus, SupervisorConfig};

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    pub const HOST: &'static str = "127.0.0.1";
    pub const PORT: u16 = 8000;
    pub const BASE_URL: &'static str = "http://127.0.0.1:8000";

    /// Pid handed out by the mock launcher
    pub const BACKEND_PID: u32 = 5555;
    /// Pid left in the record by an earlier run
    pub const LEFTOVER_PID: u32 = 4321;

    pub const HEALTH_DEADLINE: Duration = Duration::from_millis(1000);
    pub const POLL_INTERVAL: Duration = Duration::from_millis(300);

    /// Configuration with short, deterministic timings
    pub fn config() -> SupervisorConfig {
        SupervisorConfig {
            backend_dir: PathBuf::from("backend"),
            data_dir: PathBuf::from("test-data"),
            probe_timeout: Duration::from_millis(200),
            stop_timeout: Duration::from_millis(500),
            ..SupervisorConfig::default()
        }
        .with_endpoint(Self::HOST, Self::PORT)
        .with_health_timing(Self::HEALTH_DEADLINE, Self::POLL_INTERVAL)
    }

    pub fn refused() -> HealthStatus {
        HealthStatus::Unreachable {
            reason: "connection refused or failed".to_string(),
        }
    }
}
