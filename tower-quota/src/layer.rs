use std::time::Duration;

use tower::Layer;

use crate::manager::ThrottleManager;
use crate::service::QuotaService;

/// Applies per-action quotas to requests.
#[derive(Clone, Debug)]
pub struct QuotaLayer {
    manager: ThrottleManager,
    max_wait: Option<Duration>,
}

impl QuotaLayer {
    /// Create a QuotaLayer
    pub fn new(manager: ThrottleManager) -> Self {
        QuotaLayer {
            manager,
            max_wait: None,
        }
    }

    /// Set the longest a request may wait for quota.
    ///
    /// If the bucket cannot supply a token in time, the service
    /// will return `ThrottleError::QuotaExceededTimeout`.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }
}

impl<S> Layer<S> for QuotaLayer {
    type Service = QuotaService<S>;

    fn layer(&self, service: S) -> Self::Service {
        let svc = QuotaService::new(service, self.manager.clone());
        match self.max_wait {
            Some(max_wait) => svc.with_max_wait(max_wait),
            None => svc,
        }
    }
}
