//! HTTP/HTTPS fetching for runtime libraries.

use crate::config::NetworkSection;
use crate::provision::error::FetchError;
use reqwest::StatusCode;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info};

const BUFFER_SIZE: usize = 8192;
const PROGRESS_STEP_PERCENT: u64 = 20;

/// Transport used by the provisioner to fetch artifacts.
pub trait ArtifactFetcher: Send + Sync {
    /// Stream `url` into `sink` and return the number of bytes written.
    ///
    /// Implementations must fail rather than return short when the source
    /// declared a content length that was not delivered.
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64, FetchError>;
}

/// Blocking HTTP client for fetching runtime libraries.
pub struct HttpFetcher {
    /// reqwest client.
    client: reqwest::blocking::Client,

    /// Whole-transfer timeout, reported on timeout errors.
    read_timeout_secs: u64,
}

impl HttpFetcher {
    /// Create a new HTTP fetcher with the given configuration.
    pub fn new(config: &NetworkSection) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .user_agent(config.user_agent())
            .build()
            .map_err(|e| FetchError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            read_timeout_secs: config.read_timeout_secs,
        })
    }

    /// Create a new HTTP fetcher with default configuration.
    pub fn with_defaults() -> Result<Self, FetchError> {
        Self::new(&NetworkSection::default())
    }

    fn classify(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout {
                seconds: self.read_timeout_secs,
            }
        } else {
            FetchError::Network(error.to_string())
        }
    }
}

impl ArtifactFetcher for HttpFetcher {
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64, FetchError> {
        debug!("GET {}", url);
        let mut response = self.client.get(url).send().map_err(|e| self.classify(e))?;

        if response.status() != StatusCode::OK {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
            });
        }

        let expected = response.content_length();
        let mut progress = Progress::new(expected);
        let mut buffer = [0u8; BUFFER_SIZE];
        let mut received = 0u64;

        loop {
            let read = match response.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    return Err(FetchError::Timeout {
                        seconds: self.read_timeout_secs,
                    });
                }
                Err(e) => return Err(FetchError::Network(format!("Failed to read response: {}", e))),
            };
            sink.write_all(&buffer[..read])?;
            received += read as u64;
            progress.advance(received);
        }
        sink.flush()?;

        if let Some(expected) = expected {
            if expected != received {
                return Err(FetchError::Truncated { expected, received });
            }
        }

        info!("Downloaded {} KB", received / 1024);
        Ok(received)
    }
}

/// Logs transfer progress at fixed percentage steps.
struct Progress {
    total: Option<u64>,
    last_logged: u64,
}

impl Progress {
    fn new(total: Option<u64>) -> Self {
        Self {
            total: total.filter(|t| *t > 0),
            last_logged: 0,
        }
    }

    fn advance(&mut self, received: u64) {
        let Some(total) = self.total else {
            return;
        };
        let percent = received.saturating_mul(100) / total;
        if percent >= self.last_logged + PROGRESS_STEP_PERCENT {
            info!("Progress: {}%", percent);
            self.last_logged = percent;
        }
    }
}
