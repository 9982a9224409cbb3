/// Shared HTTP client construction.
///
/// Both API clients (Open-Meteo, Telegram) use a blocking reqwest client
/// with rustls. The insecure flag disables certificate verification for
/// environments with broken trust stores; it maps straight onto the
/// `--insecure` CLI switch and should stay an emergency escape hatch.

use std::time::Duration;

/// Fixed per-call deadline. No retries happen on top of this; a timed-out
/// call is handled by the caller's error path.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

pub fn build_client(insecure: bool) -> Result<reqwest::blocking::Client, reqwest::Error> {
    reqwest::blocking::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .danger_accept_invalid_certs(insecure)
        .build()
}
