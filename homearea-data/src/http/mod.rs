//! Shared plumbing for the HTTP-backed providers.
//!
//! The core provider traits are synchronous so the pipeline stays embeddable
//! in synchronous callers. Providers bridge to async `reqwest` calls through
//! an owned Tokio runtime, pace themselves with a [`RateLimiter`] and retry
//! transient failures according to a [`RetryPolicy`].

mod limit;
mod retry;

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};

pub use limit::{MinIntervalLimiter, NoRateLimit, RateLimiter};
pub use retry::RetryPolicy;

/// Error type for HTTP provider construction failures.
#[derive(Debug, Error)]
pub enum ProviderBuildError {
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    /// Failed to build the Tokio runtime.
    #[error("failed to build Tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// The configured base URL is not a valid URL.
    #[error("invalid base URL: {0}")]
    BaseUrl(#[source] url::ParseError),
}

/// Build a client with the given identity and timeout.
pub(crate) fn build_client(
    user_agent: &str,
    timeout: Duration,
) -> Result<Client, ProviderBuildError> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
        .map_err(ProviderBuildError::HttpClient)
}

/// An owned current-thread runtime used to drive requests from sync code.
///
/// When called from outside any Tokio runtime, futures run on the owned
/// runtime. Inside a multi-threaded runtime the caller's handle is used with
/// [`tokio::task::block_in_place`] to avoid nested runtime panics. Inside a
/// `current_thread` runtime the owned runtime is used, which may deadlock if
/// the caller's runtime drives IO this request depends on.
pub(crate) struct BlockingRuntime(Runtime);

impl std::fmt::Debug for BlockingRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BlockingRuntime(<tokio::runtime::Runtime>)")
    }
}

impl BlockingRuntime {
    pub(crate) fn new() -> Result<Self, ProviderBuildError> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map(Self)
            .map_err(ProviderBuildError::Runtime)
    }

    pub(crate) fn block_on<F: Future>(&self, future: F) -> F::Output {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(future))
            }
            _ => self.0.block_on(future),
        }
    }
}

/// How a failed request should be classified for retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailureKind {
    /// Timeouts, dropped connections, throttling and server errors.
    Transient,
    /// Anything a retry cannot fix.
    Permanent,
}

/// Classify an HTTP status for retrying.
pub(crate) fn classify_status(status: u16) -> FailureKind {
    if status == 429 || (500..600).contains(&status) {
        FailureKind::Transient
    } else {
        FailureKind::Permanent
    }
}
