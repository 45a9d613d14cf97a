//! Service-specific tests
//!
//! Each service that touches the filesystem, the network or real processes
//! has its own test file here.

#[cfg(test)]
mod network_probe;

// Common test utilities for services
#[cfg(test)]
pub mod common {
    use std::path::Path;
    use std::time::Duration;
    use tokio::time::timeout;

    /// Upper bound for anything that should finish promptly
    pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Run a future, failing the test if it hangs
    pub async fn with_timeout<T, F>(future: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        timeout(TEST_TIMEOUT, future)
            .await
            .expect("operation did not finish in time")
    }

    /// Read the event log file and strip the timestamp column
    pub fn logged_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .map(|line| line.split_once(' ').map(|(_, rest)| rest.to_string()).unwrap_or_default())
            .collect()
    }
}
