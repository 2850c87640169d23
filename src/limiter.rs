//! Per-provider request throttling.
//!
//! Each provider gets a token budget of `requests` per `window`, built on a
//! [`governor`] token bucket. Acquiring a token suspends the caller until one
//! is available -- requests are throttled, never dropped. An optional maximum
//! wait bounds the suspension and surfaces as [`Error::RateLimitExceeded`]
//! instead of blocking indefinitely.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tracing::warn;

use crate::error::{Error, Result};

/// Token budget for a single provider.
///
/// Safe to share across concurrent lookups; governor's limiter state is
/// internally synchronized.
pub struct RequestBudget {
    provider: String,
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    max_wait: Option<Duration>,
}

impl RequestBudget {
    /// Budget of `requests` tokens replenishing over `window`.
    ///
    /// Config validation rejects zero requests and zero windows, so the
    /// clamps here only guard against hand-built values.
    pub fn new(
        provider: impl Into<String>,
        requests: u32,
        window: Duration,
        max_wait: Option<Duration>,
    ) -> Self {
        let burst = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
        let per_token = (window / burst.get()).max(Duration::from_nanos(1));
        let quota = Quota::with_period(per_token)
            .expect("replenish period is non-zero")
            .allow_burst(burst);

        Self {
            provider: provider.into(),
            limiter: RateLimiter::direct(quota),
            max_wait,
        }
    }

    /// Wait for a token, consuming it.
    ///
    /// Suspends until the budget allows another request. With a configured
    /// maximum wait, an elapsed deadline returns
    /// [`Error::RateLimitExceeded`] rather than waiting further.
    pub async fn acquire(&self) -> Result<()> {
        match self.max_wait {
            Some(limit) => {
                if tokio::time::timeout(limit, self.limiter.until_ready())
                    .await
                    .is_err()
                {
                    warn!(
                        provider = %self.provider,
                        max_wait_ms = limit.as_millis() as u64,
                        "rate limit budget exhausted within the allowed wait"
                    );
                    return Err(Error::RateLimitExceeded(self.provider.clone()));
                }
                Ok(())
            }
            None => {
                self.limiter.until_ready().await;
                Ok(())
            }
        }
    }
}
