use std::collections::HashMap;
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use quota_ledger::ActionConfig;
use quota_ledger::ConfigurationError;
use quota_ledger::Ledger;
use quota_ledger::QuotaTable;
use quota_ledger::Reason;
use quota_ledger::Registry;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio::time::sleep;
use tokio::time::timeout_at;

use crate::error::CallError;
use crate::error::RemoteError;
use crate::error::ThrottleError;

#[derive(Clone, Debug)]
struct ThrottleMetrics {
    waits: Counter<u64>,
    timeouts: Counter<u64>,
    remote_throttled: Counter<u64>,
}

impl ThrottleMetrics {
    fn new() -> Self {
        let meter = global::meter("quota_throttle");
        Self {
            waits: meter.u64_counter("quota_waits").build(),
            timeouts: meter.u64_counter("quota_timeouts").build(),
            remote_throttled: meter.u64_counter("remote_throttled").build(),
        }
    }
}

#[derive(Debug)]
struct Inner {
    ledger: Ledger,
    // One FIFO queue per root. Async callers hold their root's turnstile while
    // waiting for tokens, so waiters are served in arrival order.
    turnstiles: HashMap<String, Mutex<()>>,
    metrics: ThrottleMetrics,
}

/// Meters calls to a remote service against per-action quotas.
///
/// A manager is built once per client from that client's quota table and cloned
/// cheaply wherever calls are made; clones share the same buckets.
#[derive(Clone, Debug)]
pub struct ThrottleManager {
    inner: Arc<Inner>,
}

/// Implemented by clients that route their calls through a [`ThrottleManager`].
pub trait ThrottleAware {
    fn throttle_manager(&self) -> &ThrottleManager;
}

impl ThrottleManager {
    pub fn new<I>(configs: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = ActionConfig>,
    {
        Ok(Self::from_registry(Registry::build(configs)?))
    }

    pub fn from_table(table: &QuotaTable) -> Result<Self, ConfigurationError> {
        Ok(Self::from_registry(Registry::from_table(table)?))
    }

    pub fn from_registry(registry: Registry) -> Self {
        let turnstiles = registry
            .roots()
            .map(|(root, _)| (root.to_string(), Mutex::new(())))
            .collect();
        // Read the clock through tokio so paused test time and the ledger agree.
        let ledger = Ledger::with_origin(registry, Instant::now().into_std());

        Self {
            inner: Arc::new(Inner {
                ledger,
                turnstiles,
                metrics: ThrottleMetrics::new(),
            }),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.inner.ledger
    }

    pub fn registry(&self) -> &Registry {
        self.inner.ledger.registry()
    }

    /// Tokens currently available to `action`.
    pub fn available(&self, action: &str) -> Result<f64, ConfigurationError> {
        self.inner
            .ledger
            .available(action, Instant::now().into_std())
    }

    fn timed_out(
        &self,
        action: &str,
        root: &str,
        max_wait: Duration,
        retry_after: Option<Duration>,
    ) -> ThrottleError {
        tracing::warn!(action, root, ?max_wait, ?retry_after, "quota wait exceeds deadline");
        self.inner
            .metrics
            .timeouts
            .add(1, &[KeyValue::new("root", root.to_string())]);
        ThrottleError::QuotaExceededTimeout {
            action: action.to_string(),
            max_wait,
            retry_after,
        }
    }

    /// Wait until one token for `action` has been reserved.
    ///
    /// The task sleeps between attempts; the thread is never blocked. With
    /// `max_wait`, fails with `QuotaExceededTimeout` as soon as the required wait
    /// would end past the deadline, without consuming anything. Dropping the
    /// returned future gives up the caller's place in the queue.
    pub async fn acquire(
        &self,
        action: &str,
        max_wait: Option<Duration>,
    ) -> Result<(), ThrottleError> {
        // A wait too long to represent as an instant is no deadline at all.
        let deadline =
            max_wait.and_then(|wait| Instant::now().checked_add(wait).map(|at| (at, wait)));
        let root = self.registry().resolve_root(action)?;
        let turnstile = self
            .inner
            .turnstiles
            .get(root)
            .ok_or_else(|| ConfigurationError::UnknownAction(root.to_string()))?;

        let _turn = match deadline {
            Some((deadline, max_wait)) => timeout_at(deadline, turnstile.lock())
                .await
                .map_err(|_| self.timed_out(action, root, max_wait, None))?,
            None => turnstile.lock().await,
        };

        loop {
            let now = Instant::now();
            match self.inner.ledger.reserve(root, 1.0, now.into_std())? {
                ControlFlow::Continue(()) => return Ok(()),
                ControlFlow::Break(Reason::Exhausted { retry_after }) => {
                    if let Some((deadline, max_wait)) = deadline
                        && now + retry_after > deadline
                    {
                        return Err(self.timed_out(action, root, max_wait, Some(retry_after)));
                    }
                    tracing::debug!(action, root, ?retry_after, "waiting for quota");
                    self.inner
                        .metrics
                        .waits
                        .add(1, &[KeyValue::new("root", root.to_string())]);
                    sleep(retry_after).await;
                }
            }
        }
    }

    /// Blocking counterpart of [`ThrottleManager::acquire`] for thread-based callers.
    ///
    /// Sleeps the calling thread. Blocked callers are not queued, so there is no
    /// ordering guarantee between them.
    pub fn acquire_blocking(
        &self,
        action: &str,
        max_wait: Option<Duration>,
    ) -> Result<(), ThrottleError> {
        let deadline = max_wait.and_then(|wait| {
            std::time::Instant::now()
                .checked_add(wait)
                .map(|at| (at, wait))
        });
        let root = self.registry().resolve_root(action)?;

        loop {
            let now = std::time::Instant::now();
            match self.inner.ledger.reserve(root, 1.0, now)? {
                ControlFlow::Continue(()) => return Ok(()),
                ControlFlow::Break(Reason::Exhausted { retry_after }) => {
                    if let Some((deadline, max_wait)) = deadline
                        && now + retry_after > deadline
                    {
                        return Err(self.timed_out(action, root, max_wait, Some(retry_after)));
                    }
                    tracing::debug!(action, root, ?retry_after, "blocking for quota");
                    self.inner
                        .metrics
                        .waits
                        .add(1, &[KeyValue::new("root", root.to_string())]);
                    std::thread::sleep(retry_after);
                }
            }
        }
    }

    /// Reserve quota for `action`, then hand `payload` to `invoke`.
    ///
    /// Waits as long as it takes. The remote result is returned unchanged; a
    /// remote failure does not refund the token.
    pub async fn throttled_call<P, T, E, F, Fut>(
        &self,
        action: &str,
        payload: P,
        invoke: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnOnce(P) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RemoteError,
    {
        self.acquire(action, None).await?;
        invoke(payload).await.map_err(|err| self.classify(action, err))
    }

    /// Like [`ThrottleManager::throttled_call`], giving up after `max_wait`.
    pub async fn throttled_call_within<P, T, E, F, Fut>(
        &self,
        action: &str,
        max_wait: Duration,
        payload: P,
        invoke: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnOnce(P) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RemoteError,
    {
        self.acquire(action, Some(max_wait)).await?;
        invoke(payload).await.map_err(|err| self.classify(action, err))
    }

    /// Blocking form of the throttled call for hosts without an async runtime.
    pub fn throttled_call_blocking<P, T, E, F>(
        &self,
        action: &str,
        max_wait: Option<Duration>,
        payload: P,
        invoke: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnOnce(P) -> Result<T, E>,
        E: RemoteError,
    {
        self.acquire_blocking(action, max_wait)?;
        invoke(payload).map_err(|err| self.classify(action, err))
    }

    pub(crate) fn classify<E: RemoteError>(&self, action: &str, err: E) -> CallError<E> {
        if err.is_throttled() {
            self.note_remote_throttled(action, &err);
            CallError::RemoteThrottled(err)
        } else {
            tracing::debug!(action, error = %err, "remote call failed");
            CallError::Remote(err)
        }
    }

    pub(crate) fn note_remote_throttled<E: RemoteError>(&self, action: &str, err: &E) {
        let root = self.registry().resolve_root(action).unwrap_or(action);
        tracing::warn!(action, root, error = %err, "remote service throttled the request");
        self.inner
            .metrics
            .remote_throttled
            .add(1, &[KeyValue::new("root", root.to_string())]);
    }
}
