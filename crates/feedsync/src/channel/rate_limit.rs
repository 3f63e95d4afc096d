use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use crate::feed::CanonicalItem;

use super::errors::Result;
use super::types::{ChannelAdapter, RemoteListingRef};

type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default request rates (requests per second).
pub mod rate_limits {
    /// Marketplaces throttle listing writes hard; stay well below typical caps.
    pub const DEFAULT_RPS: u32 = 2;
    /// Upper bound accepted from configuration.
    pub const MAX_RPS: u32 = 50;
}

fn quota(requests_per_second: u32) -> Quota {
    let rps = requests_per_second.clamp(1, rate_limits::MAX_RPS);
    Quota::per_second(NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN))
}

/// A standalone request pacer, for HTTP calls outside the adapter trait.
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
}

impl ApiRateLimiter {
    /// Create a pacer allowing `requests_per_second` (clamped to 1..=50).
    pub fn new(requests_per_second: u32) -> Self {
        Self {
            inner: Arc::new(RateLimiter::direct(quota(requests_per_second))),
        }
    }

    /// Wait until another request may proceed.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}

/// A rate-limited wrapper around any [`ChannelAdapter`].
///
/// Every trait call waits for the governor before delegating, so a burst
/// of actions never exceeds the channel's quota.
///
/// ```ignore
/// use feedsync::channel::{RateLimitedChannel, RestChannel, rate_limits};
///
/// let channel = RateLimitedChannel::new(rest, rate_limits::DEFAULT_RPS);
/// ```
pub struct RateLimitedChannel<C> {
    inner: C,
    limiter: ApiRateLimiter,
}

impl<C> RateLimitedChannel<C> {
    pub fn new(inner: C, requests_per_second: u32) -> Self {
        Self {
            inner,
            limiter: ApiRateLimiter::new(requests_per_second),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: Clone> Clone for RateLimitedChannel<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: self.limiter.clone(),
        }
    }
}

#[async_trait]
impl<C: ChannelAdapter> ChannelAdapter for RateLimitedChannel<C> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn create(&self, item: &CanonicalItem) -> Result<String> {
        self.limiter.wait().await;
        self.inner.create(item).await
    }

    async fn update(&self, remote_id: &str, item: &CanonicalItem) -> Result<()> {
        self.limiter.wait().await;
        self.inner.update(remote_id, item).await
    }

    async fn deactivate(&self, remote_id: &str) -> Result<()> {
        self.limiter.wait().await;
        self.inner.deactivate(remote_id).await
    }

    async fn reactivate(&self, remote_id: &str, item: &CanonicalItem) -> Result<()> {
        self.limiter.wait().await;
        self.inner.reactivate(remote_id, item).await
    }

    async fn list_active(&self) -> Result<Option<Vec<RemoteListingRef>>> {
        self.limiter.wait().await;
        self.inner.list_active().await
    }
}
