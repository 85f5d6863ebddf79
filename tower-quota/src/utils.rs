use std::time::Duration;

use tower::BoxError;
use tower::Service;
use tower::ServiceBuilder;
use tower::layer::util::Stack;
use tower::util::BoxCloneSyncService;

use crate::QuotaLayer;
use crate::ThrottleManager;
use crate::service::ThrottledRequest;

/// Meter a remote invoker, failing requests that would wait longer than `max_wait`.
pub fn make_quota_svc<V, Req, Resp>(
    manager: ThrottleManager,
    max_wait: Duration,
    svc: V,
) -> BoxCloneSyncService<Req, Resp, BoxError>
where
    Req: ThrottledRequest + Send + 'static,
    Resp: Send + 'static,
    V: Service<Req, Response = Resp, Error = BoxError> + Clone + Send + Sync + 'static,
    <V as Service<Req>>::Future: Send + 'static,
{
    BoxCloneSyncService::new(
        ServiceBuilder::new()
            .layer(QuotaLayer::new(manager).with_max_wait(max_wait))
            .service(svc),
    )
}

/// Service Builder Extension with quota metering for tower::ServiceBuilder.
pub trait ServiceBuilderExt<L> {
    /// Add a layer that waits as long as needed for quota
    fn quota(self, manager: ThrottleManager) -> ServiceBuilder<Stack<QuotaLayer, L>>;

    /// Add a layer that gives up after `max_wait`
    fn quota_within(
        self,
        manager: ThrottleManager,
        max_wait: Duration,
    ) -> ServiceBuilder<Stack<QuotaLayer, L>>;
}

impl<L> ServiceBuilderExt<L> for ServiceBuilder<L> {
    fn quota(self, manager: ThrottleManager) -> ServiceBuilder<Stack<QuotaLayer, L>> {
        self.layer(QuotaLayer::new(manager))
    }

    fn quota_within(
        self,
        manager: ThrottleManager,
        max_wait: Duration,
    ) -> ServiceBuilder<Stack<QuotaLayer, L>> {
        self.layer(QuotaLayer::new(manager).with_max_wait(max_wait))
    }
}
