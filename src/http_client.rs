use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;

const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Long-lived client shared by every request of the process. Per-call
/// timeouts are set on each request; `default_timeout` covers the rest.
pub fn build_http_client(default_timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(default_timeout)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(default_timeout))
        .user_agent(concat!("scout_rank/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build http client")
}
