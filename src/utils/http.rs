use std::time::Duration;

use anyhow::Result;
use reqwest::Client;

/// Client for outbound model calls. The overall timeout bounds every request
/// so a hung upstream surfaces as an error instead of blocking the caller.
pub fn build_http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10).min(timeout))
        .build()?)
}
