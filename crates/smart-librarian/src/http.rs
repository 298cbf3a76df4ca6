//! Shared reqwest plumbing for the hosted embedding and chat providers.

use anyhow::{anyhow, Result};
use reqwest::Client;
use std::time::Duration;

pub fn build_client(connect_timeout: Duration, timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_nodelay(true)
        .build()?)
}

/// Maps transport failures to messages that say what to check.
pub fn describe_send_error(endpoint: &str, e: reqwest::Error) -> anyhow::Error {
    if e.is_timeout() {
        anyhow!(
            "Request to {} timed out — check network connectivity",
            endpoint
        )
    } else if e.is_connect() {
        anyhow!(
            "Failed to connect to {} — check network/firewall/proxy: {}",
            endpoint,
            e
        )
    } else {
        anyhow!("Request to {} failed: {}", endpoint, e)
    }
}

/// Parse a response body as JSON, returning a clear error if the server returned HTML
/// (e.g. a gateway error page) or a non-success status.
pub async fn parse_json_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    endpoint: &str,
) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| anyhow!("Failed to read response body from {}: {}", endpoint, e))?;

    if !status.is_success() {
        let preview: String = body.chars().take(300).collect();
        return Err(anyhow!("API error ({}) from {}: {}", status, endpoint, preview));
    }

    // CDNs/proxies sometimes return 200 with HTML
    let trimmed = body.trim_start();
    if trimmed.starts_with('<') {
        let preview: String = trimmed.chars().take(200).collect();
        return Err(anyhow!(
            "Endpoint {} returned HTML instead of JSON (HTTP {}) — the service may be down or misconfigured. Response: {}",
            endpoint, status, preview
        ));
    }

    serde_json::from_str::<T>(&body).map_err(|e| {
        let preview: String = body.chars().take(300).collect();
        anyhow!(
            "Failed to parse JSON from {} (HTTP {}): {}. Response body: {}",
            endpoint,
            status,
            e,
            preview
        )
    })
}
