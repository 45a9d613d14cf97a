//! Supervisor configuration
//!
//! Every setting can be given on the command line or through the
//! environment (a `.env` file is loaded first when present). Command-line
//! flags take precedence over environment variables.
//!
//! | flag                  | environment                  | default            |
//! |-----------------------|------------------------------|--------------------|
//! | `--host`              | `GEO_ADS_BACKEND_HOST`       | `127.0.0.1`        |
//! | `--port`              | `GEO_ADS_BACKEND_PORT`       | `8000`             |
//! | `--backend-exe`       | `GEO_ADS_BACKEND_EXE`        | candidate search   |
//! | `--backend-dir`       | `GEO_ADS_BACKEND_DIR`        | `backend`          |
//! | `--data-dir`          | `GEO_ADS_DATA_DIR`           | user data dir      |
//! | `--health-path`       | `GEO_ADS_HEALTH_PATH`        | `/health`          |
//! | `--health-timeout-ms` | `GEO_ADS_HEALTH_TIMEOUT_MS`  | `15000`            |
//! | `--poll-interval-ms`  | `GEO_ADS_POLL_INTERVAL_MS`   | `300`              |
//! | `--probe-timeout-ms`  | `GEO_ADS_PROBE_TIMEOUT_MS`   | `1000`             |
//! | `--stop-timeout-ms`   | `GEO_ADS_STOP_TIMEOUT_MS`    | `5000`             |
//! | `--reload`            | `GEO_ADS_BACKEND_RELOAD`     | off                |
//! | `--log-level`         | `GEO_ADS_LOG_LEVEL`          | `info`             |

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{SupervisorError, SupervisorResult};
use shared::SharedError;

/// Directory name used under the platform data directory
pub const APP_DIR_NAME: &str = "geo-ads-desktop";

const PID_FILE_NAME: &str = "backend.pid";
const LOCK_FILE_NAME: &str = "supervisor.lock";
const EVENT_LOG_FILE_NAME: &str = "supervisor.log";

/// Desktop launcher for the geo-ads backend
#[derive(Parser, Debug)]
#[command(name = "geo-ads-desktop")]
#[command(about = "Starts, health-checks and cleanly stops the geo-ads backend for the desktop UI")]
pub struct Args {
    /// Host the backend binds to and is probed on
    #[arg(long, env = "GEO_ADS_BACKEND_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port the backend binds to and is probed on
    #[arg(long, env = "GEO_ADS_BACKEND_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Explicit path to the backend server executable
    #[arg(long, env = "GEO_ADS_BACKEND_EXE")]
    pub backend_exe: Option<PathBuf>,

    /// Backend source root, used as the working directory
    #[arg(long, env = "GEO_ADS_BACKEND_DIR", default_value = "backend")]
    pub backend_dir: PathBuf,

    /// Application-private directory for the pid record, lock and event log
    #[arg(long, env = "GEO_ADS_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Liveness endpoint path on the backend
    #[arg(long, env = "GEO_ADS_HEALTH_PATH", default_value = "/health")]
    pub health_path: String,

    /// Overall deadline for the backend to become healthy
    #[arg(long, env = "GEO_ADS_HEALTH_TIMEOUT_MS", default_value_t = 15_000)]
    pub health_timeout_ms: u64,

    /// Interval between liveness probes during startup
    #[arg(long, env = "GEO_ADS_POLL_INTERVAL_MS", default_value_t = 300)]
    pub poll_interval_ms: u64,

    /// Timeout of a single liveness probe or port check
    #[arg(long, env = "GEO_ADS_PROBE_TIMEOUT_MS", default_value_t = 1_000)]
    pub probe_timeout_ms: u64,

    /// Grace period before a stopping backend is force-killed
    #[arg(long, env = "GEO_ADS_STOP_TIMEOUT_MS", default_value_t = 5_000)]
    pub stop_timeout_ms: u64,

    /// Run the backend with its development auto-reload
    #[arg(long, env = "GEO_ADS_BACKEND_RELOAD")]
    pub reload: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "GEO_ADS_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Resolve parsed arguments into a validated configuration
    pub fn into_config(self) -> SupervisorResult<SupervisorConfig> {
        let config = SupervisorConfig {
            host: self.host,
            port: self.port,
            backend_exe: self.backend_exe,
            backend_dir: self.backend_dir,
            data_dir: self.data_dir.unwrap_or_else(default_data_dir),
            health_path: self.health_path,
            health_timeout: Duration::from_millis(self.health_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            stop_timeout: Duration::from_millis(self.stop_timeout_ms),
            reload: self.reload,
            log_level: self.log_level,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Resolved supervisor configuration
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub host: String,
    pub port: u16,
    pub backend_exe: Option<PathBuf>,
    pub backend_dir: PathBuf,
    pub data_dir: PathBuf,
    pub health_path: String,
    pub health_timeout: Duration,
    pub poll_interval: Duration,
    pub probe_timeout: Duration,
    pub stop_timeout: Duration,
    pub reload: bool,
    pub log_level: String,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            backend_exe: None,
            backend_dir: PathBuf::from("backend"),
            data_dir: default_data_dir(),
            health_path: "/health".to_string(),
            health_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_millis(300),
            probe_timeout: Duration::from_secs(1),
            stop_timeout: Duration::from_secs(5),
            reload: false,
            log_level: "info".to_string(),
        }
    }
}

impl SupervisorConfig {
    /// Set the data directory (fluent API)
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Set host and port (fluent API)
    pub fn with_endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Set health deadline and poll interval (fluent API)
    pub fn with_health_timing(mut self, deadline: Duration, poll_interval: Duration) -> Self {
        self.health_timeout = deadline;
        self.poll_interval = poll_interval;
        self
    }

    pub fn validate(&self) -> SupervisorResult<()> {
        if self.host.trim().is_empty() {
            return Err(SupervisorError::config("host must not be empty"));
        }
        if self.port == 0 {
            return Err(SharedError::invalid_config("port", self.port).into());
        }
        if !self.health_path.starts_with('/') {
            return Err(SharedError::invalid_config("health_path", &self.health_path).into());
        }
        if self.poll_interval.is_zero() {
            return Err(SupervisorError::config("poll interval must be greater than zero"));
        }
        if self.poll_interval > self.health_timeout {
            return Err(SupervisorError::config(
                "poll interval must not exceed the health deadline",
            ));
        }
        Ok(())
    }

    /// `host:port` the backend serves on
    pub fn service_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL handed to the UI shell
    pub fn base_url(&self) -> String {
        format!("http://{}", self.service_addr())
    }

    pub fn health_url(&self) -> String {
        format!("{}{}", self.base_url(), self.health_path)
    }

    pub fn pid_file(&self) -> PathBuf {
        self.data_dir.join(PID_FILE_NAME)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.data_dir.join(LOCK_FILE_NAME)
    }

    pub fn event_log_file(&self) -> PathBuf {
        self.data_dir.join(EVENT_LOG_FILE_NAME)
    }
}

/// Platform data directory for the application, falling back to the
/// working directory when the platform has none
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(format!(".{APP_DIR_NAME}")))
}
