//! Shared HTTP client construction.

use std::time::Duration;

use reqwest::Client;

/// Build the client used for listing, checksum and archive requests.
///
/// Only connection setup is bounded; bulk downloads may take as long as
/// they need. Probes add their own per-request timeout.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn build_client(connect_timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(crate::USER_AGENT)
        .connect_timeout(connect_timeout)
        .build()
}
