//! Provider configuration.

use std::time::Duration;

/// Default wait bound for asynchronous invocations.
pub const DEFAULT_ASYNC_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time an unclaimed invocation result is kept.
pub const DEFAULT_RESULT_RETENTION: Duration = Duration::from_secs(300);

/// Provider configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Wait bound for asynchronous invocations that do not carry their own
    pub async_timeout: Duration,
    /// How long finished results wait to be polled before they are purged;
    /// zero keeps them until polled
    pub result_retention: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            async_timeout: DEFAULT_ASYNC_TIMEOUT,
            result_retention: DEFAULT_RESULT_RETENTION,
        }
    }
}

impl ProviderConfig {
    /// Override the asynchronous invocation wait bound.
    #[must_use]
    pub fn with_async_timeout(mut self, timeout: Duration) -> Self {
        self.async_timeout = timeout;
        self
    }

    /// Override how long unclaimed results are kept.
    #[must_use]
    pub fn with_result_retention(mut self, retention: Duration) -> Self {
        self.result_retention = retention;
        self
    }
}
