use std::time::Duration;

/// Tuning knobs for a capture run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Upper bound on gateway submissions in flight for one order.
    /// `1` processes payments sequentially.
    pub max_concurrency: usize,
    /// How long a single gateway submission may take before the payment is
    /// recorded as failed.
    pub gateway_timeout: Duration,
}

impl CaptureConfig {
    pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
    pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_gateway_timeout(mut self, gateway_timeout: Duration) -> Self {
        self.gateway_timeout = gateway_timeout;
        self
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_concurrency: Self::DEFAULT_MAX_CONCURRENCY,
            gateway_timeout: Self::DEFAULT_GATEWAY_TIMEOUT,
        }
    }
}
