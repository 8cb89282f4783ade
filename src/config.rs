use std::time::Duration;

/// Tuning for the ledger service.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    /// Extra attempts after a `ConcurrencyConflict` before it is surfaced.
    pub max_retries: u32,
    /// Base delay between attempts; attempt `n` waits `n * retry_backoff`.
    pub retry_backoff: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff: Duration::from_millis(5),
        }
    }
}

impl LedgerConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    /// Delay before retry number `retry`, saturating at `Duration::MAX`.
    pub fn backoff(&self, retry: u32) -> Duration {
        self.retry_backoff
            .checked_mul(retry)
            .unwrap_or(Duration::MAX)
    }
}
