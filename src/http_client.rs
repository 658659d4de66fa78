use std::time::Duration;

use reqwest::Client;

/// Client for long-lived streaming calls: bounded connect, generous read window.
pub fn streaming_client(
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .read_timeout(read_timeout)
        .build()
}

/// Client for one-shot calls with an overall deadline.
pub fn oneshot_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_produce_clients() {
        assert!(streaming_client(Duration::from_secs(10), Duration::from_secs(250)).is_ok());
        assert!(oneshot_client(Duration::from_secs(30)).is_ok());
    }
}
