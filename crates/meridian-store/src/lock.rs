//! Subscription-scoped mutation locks.
//!
//! A lock is a TTL-bound lease keyed by subscription ID. The holder keeps it
//! alive with [`hold_lock`], which renews shortly before each expiry and
//! cancels a [`CancellationToken`] if a renewal reports the lease gone.
//! Releasing is best effort: the TTL frees a lease whose holder crashed.

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const RENEW_AHEAD: Duration = Duration::from_secs(1);

/// Proof of ownership of a subscription lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle {
    subscription_id: String,
    owner: Uuid,
    etag: String,
    ttl: Duration,
    acquired_at: Instant,
}

impl LockHandle {
    /// Creates a handle. Lock client implementations call this.
    pub fn new(subscription_id: impl Into<String>, owner: Uuid, etag: impl Into<String>, ttl: Duration) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            owner,
            etag: etag.into(),
            ttl,
            acquired_at: Instant::now(),
        }
    }

    /// The locked subscription.
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// Unique owner token.
    pub fn owner(&self) -> Uuid {
        self.owner
    }

    /// Version tag of the lease, changes on every renewal.
    pub fn etag(&self) -> &str {
        &self.etag
    }

    /// Lease duration.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// When the lease was acquired or last renewed.
    pub fn acquired_at(&self) -> Instant {
        self.acquired_at
    }

    /// How long to wait before renewing.
    pub fn renew_after(&self) -> Duration {
        if self.ttl > RENEW_AHEAD {
            self.ttl - RENEW_AHEAD
        } else {
            self.ttl / 2
        }
    }
}

/// A distributed lock table keyed by subscription ID.
#[async_trait]
pub trait LockClient: Send + Sync {
    /// Lease duration for new locks, also the acquisition timeout.
    fn default_ttl(&self) -> Duration;

    /// Delay between acquisition attempts.
    fn retry_interval(&self) -> Duration;

    /// Takes the lock if it is free. `None` means someone else holds it.
    async fn try_acquire(&self, subscription_id: &str) -> StoreResult<Option<LockHandle>>;

    /// Extends the lease. `None` means the lock was lost.
    async fn renew(&self, handle: &LockHandle) -> StoreResult<Option<LockHandle>>;

    /// Gives the lock up. A lease that already expired or changed hands is
    /// not an error.
    async fn release(&self, handle: LockHandle) -> StoreResult<()>;
}

/// Acquires the lock for `subscription_id`, retrying until `timeout` elapses.
pub async fn acquire_lock(
    client: &dyn LockClient,
    subscription_id: &str,
    timeout: Duration,
) -> StoreResult<LockHandle> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(handle) = client.try_acquire(subscription_id).await? {
            return Ok(handle);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(StoreError::Timeout(format!(
                "lock for subscription {subscription_id} not acquired within {}s",
                timeout.as_secs()
            )));
        }
        let wait = client.retry_interval().min(deadline - now);
        tokio::time::sleep(wait).await;
    }
}

/// Keeps `handle` alive until `stop` is cancelled.
///
/// Cancels `lost` and stops renewing when the lease is lost. Returns the most
/// recent handle so the caller can release it.
pub async fn hold_lock(
    client: &dyn LockClient,
    mut handle: LockHandle,
    stop: &CancellationToken,
    lost: &CancellationToken,
) -> LockHandle {
    loop {
        tokio::select! {
            biased;
            () = stop.cancelled() => return handle,
            () = tokio::time::sleep(handle.renew_after()) => {
                match client.renew(&handle).await {
                    Ok(Some(renewed)) => {
                        tracing::debug!(subscription_id = %handle.subscription_id(), "renewed subscription lock");
                        handle = renewed;
                    }
                    Ok(None) => {
                        tracing::warn!(subscription_id = %handle.subscription_id(), "subscription lock lost");
                        lost.cancel();
                        return handle;
                    }
                    Err(err) => {
                        tracing::warn!(
                            subscription_id = %handle.subscription_id(),
                            error = %err,
                            "failed to renew subscription lock"
                        );
                    }
                }
            }
        }
    }
}
