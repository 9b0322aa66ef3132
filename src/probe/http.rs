//! HTTP probe implementation.

use std::error::Error as _;
use std::time::{Duration, Instant};

use super::{elapsed_ms, CheckResult, ProbeError, USER_AGENT};

/// Run an HTTP GET probe against the given address.
///
/// Latency is measured up to the response head; the body is never read.
pub async fn run_http_probe(address: &str, timeout: Duration) -> CheckResult {
    let url = if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    };

    // Probes measure the path to the service itself, never via a proxy.
    let client = match reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .no_proxy()
        .build()
    {
        Ok(c) => c,
        Err(e) => return CheckResult::failed(0, &ProbeError::Config(e.to_string())),
    };

    let start = Instant::now();

    match client.get(&url).send().await {
        Ok(response) => classify_status(response.status().as_u16(), elapsed_ms(start)),
        Err(e) => {
            let err = if e.is_timeout() {
                ProbeError::Timeout(timeout)
            } else {
                ProbeError::Network(describe(&e))
            };
            tracing::debug!("HTTP probe to {} failed: {}", url, err);
            CheckResult::failed(elapsed_ms(start), &err)
        }
    }
}

/// Map a response code onto a check result. Only 2xx and 3xx count as up.
pub fn classify_status(code: u16, latency_ms: u64) -> CheckResult {
    let online = (200..400).contains(&code);
    CheckResult {
        online,
        status: Some(code),
        latency_ms,
        error: if online { None } else { Some(format!("got {}", code)) },
    }
}

/// reqwest's top-level message hides the cause; append the source chain.
fn describe(err: &reqwest::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}
