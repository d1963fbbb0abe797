//! Timeouts and bounded retries for provider calls.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::{instrument, warn};

use storeforge_core::{DnsRecord, Hostname};

use super::{DomainGateway, GatewayError, RegisteredDomain, VerificationReport};
use crate::config::HostingConfig;

/// How provider calls are bounded and retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Upper bound on a single attempt.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles each time.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 2,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Policy from the hosting section of the server config.
    #[must_use]
    pub const fn from_config(config: &HostingConfig) -> Self {
        Self {
            timeout: config.timeout,
            max_retries: config.max_retries,
            base_delay: config.retry_base_delay,
        }
    }

    /// Backoff before retry number `attempt` (0-based), without jitter.
    #[must_use]
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Backoff before retry number `attempt`, plus up to 50% random jitter.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.base_backoff(attempt);
        let max_jitter_ms = u64::try_from(base.as_millis() / 2).unwrap_or(u64::MAX);
        let jitter_ms = if max_jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=max_jitter_ms)
        };
        base.saturating_add(Duration::from_millis(jitter_ms))
    }
}

/// Run `call` under `policy`.
///
/// Each attempt is bounded by `policy.timeout`; an elapsed timeout counts as
/// [`GatewayError::ProviderUnavailable`]. Only retryable errors are retried,
/// at most `policy.max_retries` times.
///
/// # Errors
///
/// Returns the last error once retries are exhausted, or the first
/// non-retryable error.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut call: F,
) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<T, GatewayError>> + Send,
{
    let mut attempt = 0;
    loop {
        let result = tokio::time::timeout(policy.timeout, call())
            .await
            .unwrap_or_else(|_| {
                Err(GatewayError::ProviderUnavailable(format!(
                    "{operation} timed out after {}ms",
                    policy.timeout.as_millis()
                )))
            });

        match result {
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.backoff(attempt);
                attempt += 1;
                warn!(
                    operation,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "Provider call failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            other => return other,
        }
    }
}

/// A gateway decorator that applies a [`RetryPolicy`] to every call.
#[derive(Debug, Clone)]
pub struct RetryingGateway<G> {
    inner: G,
    policy: RetryPolicy,
}

impl<G: DomainGateway> RetryingGateway<G> {
    /// Wrap `inner` with `policy`.
    #[must_use]
    pub const fn new(inner: G, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped gateway.
    #[must_use]
    pub const fn inner(&self) -> &G {
        &self.inner
    }
}

#[async_trait]
impl<G: DomainGateway> DomainGateway for RetryingGateway<G> {
    #[instrument(skip(self), fields(hostname = %hostname))]
    async fn register_domain(&self, hostname: &Hostname) -> Result<RegisteredDomain, GatewayError> {
        let inner = &self.inner;
        with_retry(&self.policy, "register_domain", move || {
            inner.register_domain(hostname)
        })
        .await
    }

    #[instrument(skip(self), fields(hostname = %hostname))]
    async fn fetch_requirements(&self, hostname: &Hostname) -> Result<Vec<DnsRecord>, GatewayError> {
        let inner = &self.inner;
        with_retry(&self.policy, "fetch_requirements", move || {
            inner.fetch_requirements(hostname)
        })
        .await
    }

    #[instrument(skip(self), fields(hostname = %hostname))]
    async fn fetch_verification_status(
        &self,
        hostname: &Hostname,
    ) -> Result<VerificationReport, GatewayError> {
        let inner = &self.inner;
        with_retry(&self.policy, "fetch_verification_status", move || {
            inner.fetch_verification_status(hostname)
        })
        .await
    }

    #[instrument(skip(self), fields(hostname = %hostname))]
    async fn deregister_domain(&self, hostname: &Hostname) -> Result<(), GatewayError> {
        let inner = &self.inner;
        with_retry(&self.policy, "deregister_domain", move || {
            inner.deregister_domain(hostname)
        })
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(50),
            max_retries: 2,
            base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_backoff(0), Duration::from_millis(250));
        assert_eq!(policy.base_backoff(1), Duration::from_millis(500));
        assert_eq!(policy.base_backoff(2), Duration::from_millis(1000));
    }

    #[test]
    fn test_backoff_jitter_is_bounded() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let delay = policy.backoff(1);
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_millis(750));
        }
    }

    #[tokio::test]
    async fn test_retries_transient_failures_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = with_retry(&fast_policy(), "test", move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(GatewayError::ProviderUnavailable("503".to_string()))
                } else {
                    Ok("ok")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), _> = with_retry(&fast_policy(), "test", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(GatewayError::ProviderUnavailable("502".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(GatewayError::ProviderUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_permanent_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), _> = with_retry(&fast_policy(), "test", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(GatewayError::AlreadyRegistered) }
        })
        .await;

        assert_eq!(result, Err(GatewayError::AlreadyRegistered));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_unavailable() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), _> = with_retry(&fast_policy(), "slow", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::pending()
        })
        .await;

        match result {
            Err(GatewayError::ProviderUnavailable(message)) => {
                assert!(message.contains("slow timed out"));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
