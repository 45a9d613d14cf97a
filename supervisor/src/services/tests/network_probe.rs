//! Tests for the liveness probe and port check against real sockets

use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

use crate::services::probe::RealServiceProbe;
use crate::services::tests::common::with_timeout;
use crate::traits::ServiceProbe;
use crate::types::HealthStatus;

const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Serve `app` on an ephemeral loopback port
async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// A port that nothing listens on
async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

#[tokio::test]
async fn test_healthy_backend() {
    let app = Router::new().route("/health", get(|| async { Json(json!({ "status": "ok" })) }));
    let addr = serve(app).await;
    let probe = RealServiceProbe::new();

    let status = with_timeout(probe.check_health(&format!("http://{addr}/health"), PROBE_TIMEOUT)).await;

    assert_eq!(status, HealthStatus::Healthy);
    assert!(probe.is_port_open("127.0.0.1", addr.port(), PROBE_TIMEOUT).await);
}

#[tokio::test]
async fn test_error_status_is_unhealthy_not_unreachable() {
    let app = Router::new().route("/health", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
    let addr = serve(app).await;
    let probe = RealServiceProbe::new();

    let status = with_timeout(probe.check_health(&format!("http://{addr}/health"), PROBE_TIMEOUT)).await;

    assert_eq!(status, HealthStatus::Unhealthy { http_status: 503 });
}

#[tokio::test]
async fn test_missing_route_is_unhealthy() {
    let addr = serve(Router::new()).await;
    let probe = RealServiceProbe::new();

    let status = with_timeout(probe.check_health(&format!("http://{addr}/health"), PROBE_TIMEOUT)).await;

    assert_eq!(status, HealthStatus::Unhealthy { http_status: 404 });
}

#[tokio::test]
async fn test_closed_port_is_unreachable() {
    let addr = closed_port().await;
    let probe = RealServiceProbe::new();

    let status = with_timeout(probe.check_health(&format!("http://{addr}/health"), PROBE_TIMEOUT)).await;

    assert!(matches!(status, HealthStatus::Unreachable { .. }), "got {status:?}");
    assert!(!probe.is_port_open("127.0.0.1", addr.port(), PROBE_TIMEOUT).await);
}

#[tokio::test]
async fn test_silent_listener_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    // Accept connections and never answer
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    let probe = RealServiceProbe::new();

    let started = Instant::now();
    let status = probe
        .check_health(&format!("http://{addr}/health"), Duration::from_millis(200))
        .await;

    assert!(matches!(status, HealthStatus::Unreachable { .. }), "got {status:?}");
    assert!(started.elapsed() < Duration::from_secs(2));
    // The port itself is open, which is what makes this an unknown conflict
    assert!(probe.is_port_open("127.0.0.1", addr.port(), PROBE_TIMEOUT).await);
}
