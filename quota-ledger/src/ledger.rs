use std::collections::HashMap;
use std::ops::ControlFlow;
use std::time::Duration;
use std::time::Instant;

use parking_lot::Mutex;

use crate::Reason;
use crate::error::ConfigurationError;
use crate::registry::Quota;
use crate::registry::Registry;

/// Token count and refill clock of one root action's bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuotaState {
    pub tokens: f64,
    pub last_refill: Instant,
}

impl QuotaState {
    fn full(quota: &Quota, now: Instant) -> Self {
        Self {
            tokens: quota.max_quota,
            last_refill: now,
        }
    }

    /// Credit the tokens restored since the last refill, saturating at the burst size.
    ///
    /// An instant earlier than `last_refill` credits nothing and leaves the clock
    /// where it is.
    fn refill(&mut self, quota: &Quota, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        if elapsed.is_zero() {
            return;
        }
        self.tokens =
            (self.tokens + elapsed.as_secs_f64() * quota.restore_rate).min(quota.max_quota);
        self.last_refill = now;
    }
}

#[derive(Debug)]
struct Bucket {
    quota: Quota,
    state: Mutex<QuotaState>,
}

/// Per-root token buckets for every action in a [`Registry`].
///
/// Buckets are created full when the ledger is built and refilled lazily on each
/// access; there is no background timer. Each bucket has its own lock, so
/// reservations against unrelated roots never contend.
#[derive(Debug)]
pub struct Ledger {
    registry: Registry,
    buckets: HashMap<String, Bucket>,
}

impl Ledger {
    pub fn new(registry: Registry) -> Self {
        Self::with_origin(registry, Instant::now())
    }

    /// Build a ledger whose buckets were last refilled at `origin`.
    pub fn with_origin(registry: Registry, origin: Instant) -> Self {
        let buckets = registry
            .roots()
            .map(|(root, quota)| {
                let bucket = Bucket {
                    quota: *quota,
                    state: Mutex::new(QuotaState::full(quota, origin)),
                };
                (root.to_string(), bucket)
            })
            .collect();

        Self { registry, buckets }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn bucket(&self, action: &str) -> Result<(&str, &Bucket), ConfigurationError> {
        let root = self.registry.resolve_root(action)?;
        self.buckets
            .get(root)
            .map(|bucket| (root, bucket))
            .ok_or_else(|| ConfigurationError::UnknownAction(root.to_string()))
    }

    /// Try to take `tokens` from the bucket metering `action` at instant `now`.
    ///
    /// Refill, check and deduction happen under the bucket's lock. On
    /// `ControlFlow::Break` nothing is deducted and `retry_after` is the time until
    /// the bucket will hold enough tokens, rounded up to the next nanosecond.
    ///
    /// # Errors
    ///
    /// `UnknownAction` if `action` is not registered, `InvalidCost` if `tokens`
    /// is not positive or exceeds the bucket's burst size. `InvalidCost` is
    /// raised per call: it rejects the request, not the quota table, and no
    /// amount of waiting would let the request through.
    pub fn reserve(
        &self,
        action: &str,
        tokens: f64,
        now: Instant,
    ) -> Result<ControlFlow<Reason>, ConfigurationError> {
        let (root, bucket) = self.bucket(action)?;
        let quota = &bucket.quota;

        if !(tokens > 0.0 && tokens <= quota.max_quota) {
            return Err(ConfigurationError::InvalidCost {
                action: action.to_string(),
                requested: tokens,
                max_quota: quota.max_quota,
            });
        }

        let mut state = bucket.state.lock();
        state.refill(quota, now);

        if state.tokens >= tokens {
            state.tokens -= tokens;
            tracing::trace!(action, root, remaining = state.tokens, "quota reserved");
            Ok(ControlFlow::Continue(()))
        } else {
            let deficit = tokens - state.tokens;
            let wait_ns = (deficit / quota.restore_rate * 1e9).ceil() as u64;
            let retry_after = Duration::from_nanos(wait_ns);
            tracing::trace!(action, root, ?retry_after, "quota exhausted");
            Ok(ControlFlow::Break(Reason::Exhausted { retry_after }))
        }
    }

    /// Tokens a reservation against `action` would see at `now`.
    ///
    /// The bucket itself is not modified.
    pub fn available(&self, action: &str, now: Instant) -> Result<f64, ConfigurationError> {
        let (_, bucket) = self.bucket(action)?;
        let mut state = *bucket.state.lock();
        state.refill(&bucket.quota, now);
        Ok(state.tokens)
    }

    /// Snapshot of the bucket metering `action`.
    pub fn state(&self, action: &str) -> Result<QuotaState, ConfigurationError> {
        let (_, bucket) = self.bucket(action)?;
        Ok(*bucket.state.lock())
    }
}
