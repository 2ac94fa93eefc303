//! Outbound call throttling for embedding providers.
//!
//! One [`EmbeddingRateLimiter`] is built at start-up and shared (via `Arc`)
//! with every component that talks to a remote provider. The underlying
//! `governor` limiter is a GCRA token bucket and is safe to use concurrently.

use std::num::NonZeroU32;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::context::RequestContext;
use crate::error::{EmbeddingError, Result};

/// Sustained rate and burst allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Sustained requests per second.
    pub requests_per_second: u32,

    /// Requests that may be sent back to back before throttling.
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 5,
            burst: 2,
        }
    }
}

/// Token-bucket limiter shared by all embedding calls.
pub struct EmbeddingRateLimiter {
    limiter: DefaultDirectRateLimiter,
    config: RateLimitConfig,
}

impl EmbeddingRateLimiter {
    /// Build a limiter, rejecting zero rates or bursts.
    pub fn new(config: RateLimitConfig) -> Result<Self> {
        let rate = NonZeroU32::new(config.requests_per_second).ok_or_else(|| {
            EmbeddingError::InvalidConfig("requests_per_second must be positive".to_string())
        })?;
        let burst = NonZeroU32::new(config.burst)
            .ok_or_else(|| EmbeddingError::InvalidConfig("burst must be positive".to_string()))?;

        let quota = Quota::per_second(rate).allow_burst(burst);
        Ok(Self {
            limiter: RateLimiter::direct(quota),
            config,
        })
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Wait for a permit.
    ///
    /// Fails with [`EmbeddingError::RateLimitExceeded`] without consuming a
    /// permit if `ctx` is already done or fires while waiting.
    pub async fn acquire(&self, ctx: &RequestContext) -> Result<()> {
        match ctx.run(self.limiter.until_ready()).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(error = %err, "rate limiter blocked request");
                Err(EmbeddingError::RateLimitExceeded(err))
            }
        }
    }
}

impl std::fmt::Debug for EmbeddingRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingRateLimiter")
            .field("config", &self.config)
            .finish()
    }
}
