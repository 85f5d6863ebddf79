use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

use quota_ledger::presets;
use quota_ledger::presets::fba_inbound::*;
use tokio::time::Instant;
use tokio::time::advance;
use tower::BoxError;
use tower::Layer;
use tower::Service;
use tower::ServiceBuilder;
use tower::ServiceExt;

use super::*;

use futures::future::Ready;
use futures::future::ready;

type Request = ActionRequest<&'static str>;

#[derive(Clone)]
struct MockService {
    pub count: Arc<AtomicUsize>,
    pub fail_with: Option<ServiceError>,
}

impl MockService {
    fn new() -> Self {
        Self {
            count: Arc::new(AtomicUsize::new(0)),
            fail_with: None,
        }
    }
}

impl Service<Request> for MockService {
    type Response = String;
    type Error = BoxError;
    type Future = Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        self.count.fetch_add(1, Ordering::SeqCst);
        match &self.fail_with {
            Some(err) => ready(Err(BoxError::from(err.clone()))),
            None => ready(Ok(format!("{}:{}", req.action, req.payload))),
        }
    }
}

fn small_manager() -> ThrottleManager {
    ThrottleManager::new(vec![
        ActionConfig::standalone("list", 2.0, 10.0),
        ActionConfig::alias("listByNextToken", "list"),
        ActionConfig::standalone("get", 1.0, 10.0),
    ])
    .unwrap()
}

fn throttle_error(err: &BoxError) -> &ThrottleError {
    err.downcast_ref::<ThrottleError>()
        .expect("expected a ThrottleError")
}

#[tokio::test(start_paused = true)]
async fn test_call_backpressure() {
    let mock = MockService::new();
    let count = mock.count.clone();
    let mut service = QuotaService::new(mock, small_manager());

    for _ in 0..2 {
        let resp = service
            .ready()
            .await
            .unwrap()
            .call(ActionRequest::new("list", "page"))
            .await
            .unwrap();
        assert_eq!(resp, "list:page");
    }

    // The third call must wait for a token.
    let mut fut = service
        .ready()
        .await
        .unwrap()
        .call(ActionRequest::new("list", "page"));
    assert!(futures::poll!(&mut fut).is_pending());
    assert_eq!(count.load(Ordering::SeqCst), 2);

    advance(Duration::from_millis(100)).await;

    fut.await.expect("Should recover");
    assert_eq!(count.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_continuations_wait_on_their_root() {
    let mut service = QuotaService::new(MockService::new(), small_manager());

    service
        .ready()
        .await
        .unwrap()
        .call(ActionRequest::new("list", "first"))
        .await
        .unwrap();
    service
        .ready()
        .await
        .unwrap()
        .call(ActionRequest::new("listByNextToken", "token-1"))
        .await
        .unwrap();

    let mut next = service
        .ready()
        .await
        .unwrap()
        .call(ActionRequest::new("listByNextToken", "token-2"));
    assert!(futures::poll!(&mut next).is_pending());

    // An unrelated action is not held up.
    let start = Instant::now();
    service
        .ready()
        .await
        .unwrap()
        .call(ActionRequest::new("get", "id"))
        .await
        .unwrap();
    assert_eq!(start.elapsed(), Duration::ZERO);

    assert_eq!(next.await.unwrap(), "listByNextToken:token-2");
}

#[tokio::test]
async fn test_layer_integration() {
    let mut service = tower::ServiceBuilder::new()
        .layer(QuotaLayer::new(small_manager()))
        .service(MockService::new());

    // Verify it handles a basic request
    service
        .ready()
        .await
        .unwrap()
        .call(ActionRequest::new("get", "id"))
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shared_state_across_clones() {
    let layer = QuotaLayer::new(small_manager());

    let mut svc1 = layer.layer(MockService::new());
    let mut svc2 = layer.layer(MockService::new());

    svc1.ready()
        .await
        .unwrap()
        .call(ActionRequest::new("get", "id"))
        .await
        .unwrap();

    // svc2 should now be throttled because svc1 used the token
    let mut fut = svc2
        .ready()
        .await
        .unwrap()
        .call(ActionRequest::new("get", "id"));
    assert!(futures::poll!(&mut fut).is_pending());
}

#[tokio::test]
async fn test_unknown_action_is_rejected() {
    let mock = MockService::new();
    let count = mock.count.clone();
    let mut service = QuotaService::new(mock, small_manager());

    let err = service
        .ready()
        .await
        .unwrap()
        .call(ActionRequest::new("delete", "id"))
        .await
        .unwrap_err();

    assert_eq!(
        throttle_error(&err),
        &ThrottleError::Configuration(ConfigurationError::UnknownAction("delete".to_string()))
    );
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_max_wait_times_out_without_calling_inner() {
    let mock = MockService::new();
    let count = mock.count.clone();
    let manager = small_manager();
    let mut service = ServiceBuilder::new()
        .quota_within(manager.clone(), Duration::from_millis(50))
        .service(mock);

    service
        .ready()
        .await
        .unwrap()
        .call(ActionRequest::new("get", "id"))
        .await
        .unwrap();
    let err = service
        .ready()
        .await
        .unwrap()
        .call(ActionRequest::new("get", "id"))
        .await
        .unwrap_err();

    assert!(matches!(
        throttle_error(&err),
        ThrottleError::QuotaExceededTimeout {
            retry_after: Some(wait),
            ..
        } if *wait == Duration::from_millis(100)
    ));
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(manager.available("get").unwrap(), 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_inner_errors_pass_through() {
    let mut mock = MockService::new();
    mock.fail_with = Some(ServiceError::throttled("Request is throttled"));
    let manager = small_manager();
    let mut service = ServiceBuilder::new().quota(manager.clone()).service(mock);

    let err = service
        .ready()
        .await
        .unwrap()
        .call(ActionRequest::new("list", "page"))
        .await
        .unwrap_err();

    assert!(err.is_throttled());
    assert_eq!(
        err.downcast_ref::<ServiceError>(),
        Some(&ServiceError::throttled("Request is throttled"))
    );
    // The remote call still spent its token.
    assert_eq!(manager.available("list").unwrap(), 1.0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_hammer() {
    let capacity = 50;
    let manager = ThrottleManager::new(vec![ActionConfig::standalone(
        "hot",
        capacity as f64,
        1.0,
    )])
    .unwrap();

    let mock = MockService::new();
    let mock_count = mock.count.clone();
    let service = make_quota_svc(manager, Duration::from_millis(10), mock);

    let mut handles = vec![];
    for _ in 0..100 {
        let mut svc = service.clone();
        handles.push(tokio::spawn(async move {
            svc.ready()
                .await?
                .call(ActionRequest::new("hot", "payload"))
                .await
        }));
    }

    let mut success = 0;
    let mut timeouts = 0;
    for h in handles {
        match h.await.expect("Task panicked") {
            Ok(_) => success += 1,
            Err(err) => {
                assert!(matches!(
                    throttle_error(&err),
                    ThrottleError::QuotaExceededTimeout { .. }
                ));
                timeouts += 1;
            }
        }
    }

    assert_eq!(success, capacity, "Should have exactly 50 successes");
    assert_eq!(timeouts, 50, "Remaining 50 should have timed out");
    assert_eq!(
        mock_count.load(Ordering::SeqCst),
        capacity,
        "Inner service should only see 50 hits"
    );
}

// A client pack in the shape the fulfillment clients take: typed calls that
// build a payload and route it through the client's own manager.
struct InboundClientPack {
    manager: ThrottleManager,
    pages: usize,
}

impl ThrottleAware for InboundClientPack {
    fn throttle_manager(&self) -> &ThrottleManager {
        &self.manager
    }
}

impl InboundClientPack {
    fn new(pages: usize) -> Self {
        Self {
            manager: ThrottleManager::new(presets::fba_inbound()).unwrap(),
            pages,
        }
    }

    // Returns the page's items and the token of the next page, if any.
    async fn fetch(&self, page: usize) -> Result<(Vec<String>, Option<usize>), ServiceError> {
        let next = (page + 1 < self.pages).then_some(page + 1);
        Ok((vec![format!("shipment-{page}")], next))
    }

    async fn list_inbound_shipments(
        &self,
    ) -> Result<(Vec<String>, Option<usize>), CallError<ServiceError>> {
        self.throttle_manager()
            .throttled_call(LIST_INBOUND_SHIPMENTS, 0, |page| self.fetch(page))
            .await
    }

    async fn list_inbound_shipments_by_next_token(
        &self,
        token: usize,
    ) -> Result<(Vec<String>, Option<usize>), CallError<ServiceError>> {
        self.throttle_manager()
            .throttled_call(LIST_INBOUND_SHIPMENTS_BY_NEXT_TOKEN, token, |page| {
                self.fetch(page)
            })
            .await
    }
}

#[tokio::test(start_paused = true)]
async fn test_pagination_is_metered_against_the_listing() {
    let client = InboundClientPack::new(40);
    let start = Instant::now();

    let (mut shipments, mut next) = client.list_inbound_shipments().await.unwrap();
    while let Some(token) = next {
        let (page, following) = client
            .list_inbound_shipments_by_next_token(token)
            .await
            .unwrap();
        shipments.extend(page);
        next = following;
    }

    assert_eq!(shipments.len(), 40);
    // 30 calls fit the burst, the remaining 10 each wait 500ms for a token.
    assert_eq!(start.elapsed(), Duration::from_secs(5));
    assert_eq!(
        client
            .throttle_manager()
            .available(LIST_INBOUND_SHIPMENTS)
            .unwrap(),
        0.0
    );
}
