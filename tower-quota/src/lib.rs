//! # Tower Quota
//!
//! `tower-quota` keeps a client of a rate limited remote API inside the quotas the
//! service publishes for each of its actions.
//!
//! ## The Throttle Manager
//! A [`ThrottleManager`] is built once per client from that client's quota table
//! (see [`quota_ledger::presets`]) and is the single entry point for remote calls:
//!
//! 1. **Resolution**: The action is resolved to the root action owning its bucket.
//!    Pagination continuations are aliases and share their listing's budget.
//!    Unknown actions fail with a [`ConfigurationError`]; nothing is unmetered.
//! 2. **Waiting**: When the bucket is empty the caller's task sleeps for exactly the
//!    time the bucket needs to restore a token. Waiters on one bucket are served in
//!    arrival order. An optional `max_wait` turns long waits into
//!    [`ThrottleError::QuotaExceededTimeout`] without consuming quota.
//! 3. **Pass-through**: The remote invoker's result is returned unchanged. Errors the
//!    remote service marks as throttled are reported as
//!    [`CallError::RemoteThrottled`] and logged, never retried.
//!
//! ## Tower
//! [`QuotaLayer`] applies the same metering to any `tower::Service` whose requests
//! implement [`ThrottledRequest`].

mod error;
mod layer;
mod manager;
mod service;
mod utils;

#[cfg(test)]
mod tests;

pub use error::CallError;
pub use error::REQUEST_THROTTLED;
pub use error::RemoteError;
pub use error::ServiceError;
pub use error::ThrottleError;
pub use layer::QuotaLayer;
pub use manager::ThrottleAware;
pub use manager::ThrottleManager;
pub use quota_ledger::ActionConfig;
pub use quota_ledger::ConfigurationError;
pub use quota_ledger::QuotaTable;
pub use service::ActionRequest;
pub use service::QuotaService;
pub use service::ThrottledRequest;
pub use utils::ServiceBuilderExt;
pub use utils::make_quota_svc;
