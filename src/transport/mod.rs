//! Network transport.
//!
//! One shared HTTP session per run with bounded retry on transient status
//! codes. This is the only retry layer; module calls are never re-attempted
//! by the pipeline.
//!
//! Files are written through [`PartialFile`], which deletes the file unless
//! the write completed, so an interrupted run never leaves a truncated file
//! where a later run's existence check would accept it.

mod interrupt;
mod partial;
mod workdir;

pub use interrupt::Interrupt;
pub use partial::PartialFile;
pub use workdir::{WorkDir, append_extension, move_file, random_name};

use async_trait::async_trait;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

/// User agent sent with every request
const USER_AGENT: &str = concat!("MusicFetcher/", env!("CARGO_PKG_VERSION"));

/// Transport failures
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Interrupted, partial file removed")]
    Interrupted,
}

impl TransportError {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

/// Retry schedule for transient HTTP failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Seconds; the n-th retry waits `backoff_factor * 2^(n-1)`
    pub backoff_factor: f64,
    pub statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            backoff_factor: 0.4,
            statuses: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        Duration::from_secs_f64(self.backoff_factor * f64::from(1u32 << exp))
    }

    /// Whether a response with `status` should be retried after `attempts` retries.
    pub fn should_retry(&self, status: u16, attempts: u32) -> bool {
        attempts < self.max_retries && self.statuses.contains(&status)
    }
}

/// Downloads a URL to a file.
///
/// Implemented by [`HttpTransport`]; tests substitute a counting mock.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_to_file(
        &self,
        url: &str,
        headers: &[(String, String)],
        dest: &Path,
    ) -> Result<(), TransportError>;
}

/// Shared reqwest session with retry.
pub struct HttpTransport {
    client: reqwest::Client,
    retry: RetryPolicy,
    interrupt: Interrupt,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_policy(RetryPolicy::default())
    }

    pub fn with_policy(retry: RetryPolicy) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self {
            client,
            retry,
            interrupt: Interrupt::default(),
        })
    }

    /// Abort transfers when `interrupt` is raised.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    async fn send_with_retry(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<reqwest::Response, TransportError> {
        let mut attempts = 0;
        loop {
            let mut request = self.client.get(url);
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status().as_u16();
                    if !self.retry.should_retry(status, attempts) {
                        return Err(TransportError::Status {
                            url: url.to_string(),
                            status,
                        });
                    }
                }
                Err(e)
                    if (e.is_connect() || e.is_timeout()) && attempts < self.retry.max_retries =>
                {
                    tracing::debug!(url, error = %e, "Connection failed");
                }
                Err(e) => return Err(TransportError::Network(e.to_string())),
            }

            attempts += 1;
            let delay = self.retry.delay(attempts);
            tracing::warn!(
                url,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                "Transient failure, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn transfer(
        &self,
        url: &str,
        headers: &[(String, String)],
        file: &mut std::fs::File,
    ) -> Result<(), TransportError> {
        let mut response = self.send_with_retry(url, headers).await?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?
        {
            file.write_all(&chunk)?;
        }
        file.flush()?;
        Ok(())
    }
}

#[async_trait]
impl Fetcher for HttpTransport {
    async fn fetch_to_file(
        &self,
        url: &str,
        headers: &[(String, String)],
        dest: &Path,
    ) -> Result<(), TransportError> {
        if self.interrupt.is_set() {
            return Err(TransportError::Interrupted);
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut partial = PartialFile::create(dest)?;

        tokio::select! {
            biased;
            _ = self.interrupt.wait() => {
                tracing::warn!("Interrupted while writing {:?}", dest);
                return Err(TransportError::Interrupted);
            }
            result = self.transfer(url, headers, partial.file_mut()) => result?,
        }

        partial.commit()?;
        Ok(())
    }
}

/// Fetch `url` into `dest` unless the file is already there.
///
/// Returns `true` when a transfer happened.
pub async fn fetch_if_missing(
    fetcher: &dyn Fetcher,
    url: &str,
    dest: &Path,
) -> Result<bool, TransportError> {
    if dest.exists() {
        return Ok(false);
    }
    fetcher.fetch_to_file(url, &[], dest).await?;
    Ok(true)
}
