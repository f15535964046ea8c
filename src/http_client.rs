use std::time::Duration;

use reqwest::Client;

/// Build the client shared by the link resolver and the report fetcher.
///
/// The report site serves a certificate that does not verify, so certificate
/// checks are off for every request made through this client.
pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(timeout)
        .build()
}
