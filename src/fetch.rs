//! Blocking page and image fetching with delay and retry.

use log::{error, info, warn};
use std::io::Read;
use std::thread;
use std::time::Duration;
use thiserror::Error;

use crate::config::FetchConfig;

const USER_AGENT: &str = concat!(
    "discography-archive/",
    env!("CARGO_PKG_VERSION"),
    " (metadata archiver)"
);

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {code} for {url}")]
    Status { url: String, code: u16 },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("could not read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    fn from_ureq(url: &str, error: ureq::Error) -> Self {
        match error {
            ureq::Error::Status(code, _) => FetchError::Status { url: url.to_string(), code },
            ureq::Error::Transport(transport) => FetchError::Transport {
                url: url.to_string(),
                message: transport.to_string(),
            },
        }
    }

    /// Rate limiting, server-side hiccups and connection problems are worth
    /// another attempt; other statuses are not.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Status { code, .. } => matches!(code, 408 | 429 | 500..=599),
            FetchError::Transport { .. } | FetchError::Body { .. } => true,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::Status { code: 429, .. })
    }
}

// ============================================================================
// Page Source
// ============================================================================

/// Downloaded image body and its declared content type.
#[derive(Debug, Clone)]
pub struct Image {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Where pages and images come from. The HTTP implementation is
/// [`HttpFetcher`]; tests use in-memory fixtures.
pub trait PageSource {
    fn fetch_page(&self, url: &str) -> Result<String, FetchError>;

    fn fetch_image(&self, url: &str) -> Result<Image, FetchError>;
}

pub struct HttpFetcher {
    agent: ureq::Agent,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(30))
            .timeout_write(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build();
        Self { agent, config }
    }

    fn apply_delay(&self) {
        if let Some(delay) = self.config.delay {
            let pause = delay.sample();
            info!("Delaying for {:.2} ms...", pause.as_secs_f64() * 1000.0);
            thread::sleep(pause);
        }
    }

    /// One delay, then up to `max_retries + 1` attempts with linear backoff.
    fn with_retries<T>(
        &self,
        url: &str,
        mut attempt_once: impl FnMut() -> Result<T, FetchError>,
    ) -> Result<T, FetchError> {
        self.apply_delay();

        let max_retries = self.config.max_retries;
        let mut attempt = 0;
        loop {
            match attempt_once() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < max_retries => {
                    attempt += 1;
                    let wait = self.config.retry_delay * attempt;
                    if e.is_rate_limited() {
                        warn!(
                            "Rate limited (HTTP 429). Retrying in {}s... (Attempt {}/{})",
                            wait.as_secs_f64(),
                            attempt,
                            max_retries
                        );
                    } else {
                        warn!(
                            "Request failed ({}). Retrying in {}s... (Attempt {}/{})",
                            e,
                            wait.as_secs_f64(),
                            attempt,
                            max_retries
                        );
                    }
                    thread::sleep(wait);
                }
                Err(e) => {
                    if e.is_transient() {
                        error!("Max retries reached for {}", url);
                    }
                    return Err(e);
                }
            }
        }
    }

    fn get(&self, url: &str) -> Result<ureq::Response, FetchError> {
        self.agent
            .get(url)
            .call()
            .map_err(|e| FetchError::from_ureq(url, e))
    }
}

impl PageSource for HttpFetcher {
    fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        self.with_retries(url, || {
            self.get(url)?
                .into_string()
                .map_err(|source| FetchError::Body { url: url.to_string(), source })
        })
    }

    fn fetch_image(&self, url: &str) -> Result<Image, FetchError> {
        self.with_retries(url, || {
            let response = self.get(url)?;
            let content_type = response.header("content-type").map(str::to_string);
            let mut bytes = Vec::new();
            response
                .into_reader()
                .read_to_end(&mut bytes)
                .map_err(|source| FetchError::Body { url: url.to_string(), source })?;
            Ok(Image { content_type, bytes })
        })
    }
}
