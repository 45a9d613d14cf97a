//! Port occupancy check
//!
//! A bare TCP connect: if anything accepts, the port is occupied, whether
//! or not it speaks HTTP.

use std::time::Duration;
use tokio::net::TcpStream;

/// Whether something accepts connections on `host:port` within `timeout`
pub async fn is_port_open(host: &str, port: u16, timeout: Duration) -> bool {
    let addr = format!("{host}:{port}");
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect(addr.as_str())).await,
        Ok(Ok(_))
    )
}
