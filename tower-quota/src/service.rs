use std::future::Future;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

use tower::BoxError;
use tower::Service;
use tower::ServiceExt;

use crate::error::RemoteError;
use crate::manager::ThrottleManager;

/// A request that names the action it will be metered against.
pub trait ThrottledRequest {
    fn action(&self) -> &str;
}

/// A signed payload bound for a named remote action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest<P> {
    pub action: String,
    pub payload: P,
}

impl<P> ActionRequest<P> {
    pub fn new(action: impl Into<String>, payload: P) -> Self {
        Self {
            action: action.into(),
            payload,
        }
    }
}

impl<P> ThrottledRequest for ActionRequest<P> {
    fn action(&self) -> &str {
        &self.action
    }
}

/// Meters each request against the quota of its action before calling `inner`.
///
/// The bucket depends on the request, so readiness is decided inside `call`:
/// `poll_ready` always succeeds and the returned future first waits for quota,
/// then drives the inner service to readiness and calls it.
#[derive(Debug)]
pub struct QuotaService<S> {
    inner: S,
    manager: ThrottleManager,
    max_wait: Option<Duration>,
}

impl<S: Clone> Clone for QuotaService<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            manager: self.manager.clone(),
            max_wait: self.max_wait,
        }
    }
}

impl<S> QuotaService<S> {
    pub fn new(inner: S, manager: ThrottleManager) -> Self {
        Self {
            inner,
            manager,
            max_wait: None,
        }
    }

    /// Fail with `ThrottleError::QuotaExceededTimeout` instead of waiting longer
    /// than `max_wait` for quota.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    pub fn manager(&self) -> &ThrottleManager {
        &self.manager
    }
}

impl<S, Req> Service<Req> for QuotaService<S>
where
    S: Service<Req, Error = BoxError> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    Req: ThrottledRequest + Send + 'static,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, BoxError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let manager = self.manager.clone();
        let max_wait = self.max_wait;

        Box::pin(async move {
            let action = req.action().to_string();
            manager.acquire(&action, max_wait).await?;

            match inner.ready().await?.call(req).await {
                Ok(response) => Ok(response),
                Err(err) => {
                    if err.is_throttled() {
                        manager.note_remote_throttled(&action, &err);
                    }
                    Err(err)
                }
            }
        })
    }
}
