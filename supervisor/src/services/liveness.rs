//! Liveness probe against the backend's health endpoint

use reqwest::Client;
use std::time::Duration;

use crate::types::HealthStatus;

/// The only status code that counts as healthy
pub const HEALTHY_STATUS: u16 = 200;

/// Build the HTTP client used for liveness probes
///
/// Proxies are disabled: the backend always lives on a local address and a
/// system proxy would turn "nothing listening" into a proxy error page.
pub fn probe_client() -> Client {
    Client::builder().no_proxy().build().unwrap_or_default()
}

/// Issue a single GET against `url`, bounded by `timeout`
///
/// The timeout is enforced by cancelling the request future, so this
/// returns on time even if the remote end accepts the connection and never
/// answers.
pub async fn check_liveness(client: &Client, url: &str, timeout: Duration) -> HealthStatus {
    let request = client.get(url).timeout(timeout).send();

    match tokio::time::timeout(timeout, request).await {
        Ok(Ok(response)) => {
            let status = response.status().as_u16();
            if status == HEALTHY_STATUS {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy { http_status: status }
            }
        }
        Ok(Err(e)) => HealthStatus::Unreachable {
            reason: describe_error(&e),
        },
        Err(_) => HealthStatus::Unreachable {
            reason: format!("no response within {timeout:?}"),
        },
    }
}

fn describe_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        "connection refused or failed".to_string()
    } else {
        error.to_string()
    }
}
