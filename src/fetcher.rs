use crate::config::ServiceConfig;
use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use rand::Rng;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// User agents for rotation
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} was blocked: {reason}")]
    Blocked { url: String, reason: String },

    #[error("request to {url} failed with status {status}")]
    Http { url: String, status: u16 },

    #[error("failed to fetch {url}: {message}")]
    Network { url: String, message: String },
}

impl FetchError {
    /// Refused connection, 403/429, or an explicit block message.
    pub fn is_block(&self) -> bool {
        matches!(self, FetchError::Blocked { .. })
    }
}

/// Statuses the marketplace uses to turn scrapers away.
fn is_block_status(status: StatusCode) -> bool {
    matches!(status, StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS)
}

/// True when the error chain bottoms out in a refused TCP connection.
/// DNS and TLS failures are also `is_connect()` but are not blocks.
fn is_connection_refused(e: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(e);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        source = err.source();
    }
    false
}

fn classify_send_error(url: &str, e: &reqwest::Error) -> backoff::Error<FetchError> {
    let message = e.to_string();
    if is_connection_refused(e) || message.to_lowercase().contains("blocked") {
        return backoff::Error::permanent(FetchError::Blocked {
            url: url.to_string(),
            reason: message,
        });
    }
    let err = FetchError::Network {
        url: url.to_string(),
        message,
    };
    if e.is_timeout() || e.is_request() {
        backoff::Error::transient(err)
    } else {
        backoff::Error::permanent(err)
    }
}

fn classify_status(url: &str, status: StatusCode) -> backoff::Error<FetchError> {
    if is_block_status(status) {
        return backoff::Error::permanent(FetchError::Blocked {
            url: url.to_string(),
            reason: format!("status {}", status),
        });
    }
    let err = FetchError::Http {
        url: url.to_string(),
        status: status.as_u16(),
    };
    // 5xx transient, others permanent
    if status.is_server_error() {
        backoff::Error::transient(err)
    } else {
        backoff::Error::permanent(err)
    }
}

fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())]
}

fn politeness_delay(base: Duration, jitter: Duration) -> Duration {
    let jitter_ms = jitter.as_millis() as u64;
    if jitter_ms == 0 {
        return base;
    }
    base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
}

/// Fetches search-result and item pages with browser-like headers.
#[derive(Clone)]
pub struct PageFetcher {
    client: Client,
    delay: Duration,
    jitter: Duration,
    max_retry_time: Duration,
}

impl PageFetcher {
    pub fn new(client: Client, config: &ServiceConfig) -> Self {
        Self {
            client,
            delay: config.politeness_delay,
            jitter: config.politeness_jitter,
            max_retry_time: config.fetch_timeout,
        }
    }

    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let wait = politeness_delay(self.delay, self.jitter);
        debug!("Waiting {:?} before fetching {}", wait, url);
        tokio::time::sleep(wait).await;

        info!("Fetching {}", url);
        let client = self.client.clone();
        retry(
            ExponentialBackoffBuilder::new()
                .with_initial_interval(Duration::from_millis(500))
                .with_max_interval(Duration::from_secs(4))
                .with_max_elapsed_time(Some(self.max_retry_time))
                .build(),
            || async {
                let resp = client
                    .get(url)
                    .header("User-Agent", random_user_agent())
                    .header(
                        "Accept",
                        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
                    )
                    .header("Accept-Language", "en-US,en;q=0.9")
                    .header("Referer", "https://www.google.com/")
                    .header("Connection", "keep-alive")
                    .send()
                    .await
                    .map_err(|e| {
                        warn!("Fetch of {} failed: {}", url, e);
                        classify_send_error(url, &e)
                    })?;

                let status = resp.status();
                if !status.is_success() {
                    warn!("Fetch of {} returned {}", url, status);
                    return Err(classify_status(url, status));
                }

                resp.text().await.map_err(|e| {
                    backoff::Error::transient(FetchError::Network {
                        url: url.to_string(),
                        message: format!("failed to read response body: {}", e),
                    })
                })
            },
        )
        .await
    }
}
