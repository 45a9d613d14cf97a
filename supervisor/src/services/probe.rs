//! Real network probe service

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::services::{liveness, port_check};
use crate::traits::ServiceProbe;
use crate::types::HealthStatus;
use shared::{process_debug, ComponentId};

/// Real probe implementation using reqwest and tokio sockets
pub struct RealServiceProbe {
    client: Client,
}

impl RealServiceProbe {
    pub fn new() -> Self {
        Self {
            client: liveness::probe_client(),
        }
    }
}

impl Default for RealServiceProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceProbe for RealServiceProbe {
    async fn check_health(&self, url: &str, timeout: Duration) -> HealthStatus {
        let status = liveness::check_liveness(&self.client, url, timeout).await;
        process_debug!(ComponentId::current(), "🩺 Health check {}: {:?}", url, status);
        status
    }

    async fn is_port_open(&self, host: &str, port: u16, timeout: Duration) -> bool {
        port_check::is_port_open(host, port, timeout).await
    }
}
