//! # quota-ledger
//!
//! `quota-ledger` tracks the call budget a remote API grants each of its actions.
//!
//! ## Core Philosophy
//!
//! Remote services publish a burst size and a restore rate per action, and some
//! actions (pagination continuations) are charged against another action's budget.
//! `quota-ledger` models each budget as a token bucket owned by a *root* action and
//! lets any number of *alias* actions draw from it.
//!
//! ## Key Concepts
//!
//! * **Fail Fast**: Unknown alias targets and alias cycles are rejected when the
//!   [`Registry`] is built, never at call time.
//! * **Lazy Evaluation**: Tokens are recalculated at the moment of the request,
//!   eliminating the need for background worker threads or timers.
//! * **Caller Owns Time**: The [`Ledger`] never sleeps. It reports how long to wait
//!   and the caller decides how to suspend.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Instant;
//! use quota_ledger::{ActionConfig, Ledger, Registry};
//!
//! let registry = Registry::build(vec![
//!     ActionConfig::standalone("listInboundShipments", 30.0, 2.0),
//!     ActionConfig::alias("listInboundShipmentsByNextToken", "listInboundShipments"),
//! ])
//! .unwrap();
//! let ledger = Ledger::new(registry);
//!
//! if ledger
//!     .reserve("listInboundShipmentsByNextToken", 1.0, Instant::now())
//!     .unwrap()
//!     .is_continue()
//! {
//!     // Request allowed
//! }
//! ```

use std::time::Duration;

mod error;
mod ledger;
pub mod presets;
mod registry;

pub use error::ConfigurationError;
pub use ledger::Ledger;
pub use ledger::QuotaState;
pub use registry::ActionConfig;
pub use registry::AliasOf;
pub use registry::Quota;
pub use registry::QuotaKind;
pub use registry::QuotaTable;
pub use registry::Registry;

/// Reasons why a reservation might be refused.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reason {
    Exhausted { retry_after: Duration },
}
