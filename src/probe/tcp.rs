//! TCP connect probe.

use std::time::{Duration, Instant};
use tokio::net::TcpStream;

use super::{elapsed_ms, CheckResult, ProbeError};

/// Open a TCP connection to `host:port` and close it as soon as it is
/// established. No application data is exchanged.
pub async fn run_tcp_probe(host: &str, port: u16, timeout: Duration) -> CheckResult {
    let start = Instant::now();

    let outcome = match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => {
            drop(stream);
            Ok(())
        }
        Ok(Err(e)) => Err(ProbeError::Network(e.to_string())),
        Err(_) => Err(ProbeError::Timeout(timeout)),
    };

    let latency = elapsed_ms(start);
    match outcome {
        Ok(()) => CheckResult::up(latency),
        Err(e) => {
            tracing::debug!("TCP probe to {}:{} failed: {}", host, port, e);
            CheckResult::failed(latency, &e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::{TcpListener, TcpSocket};

    #[tokio::test]
    async fn test_tcp_probe_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let result = run_tcp_probe("127.0.0.1", port, Duration::from_secs(5)).await;
        assert!(result.online);
        assert_eq!(result.status, None);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_tcp_probe_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = run_tcp_probe("127.0.0.1", port, Duration::from_secs(5)).await;
        assert!(!result.online);
        assert_eq!(result.status, None);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_tcp_probe_times_out_on_full_backlog() {
        // A listener that never accepts, with its backlog already taken by
        // one held connection: further handshakes stall until the timeout.
        let socket = TcpSocket::new_v4().unwrap();
        socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let listener = socket.listen(0).unwrap();
        let addr = listener.local_addr().unwrap();
        let _held = TcpStream::connect(addr).await.unwrap();

        let timeout = Duration::from_millis(300);
        let result = run_tcp_probe("127.0.0.1", addr.port(), timeout).await;

        assert!(!result.online);
        assert_eq!(result.status, None);
        assert_eq!(result.error.as_deref(), Some("timeout after 300ms"));
        assert!(result.latency_ms >= 300);
        drop(listener);
    }
}
