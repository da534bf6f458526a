//! Supervision Core adapter contracts.
//!
//! These traits are the seams to collaborators the core treats as external:
//! durable storage, a distributed counter store (rate limiting/quotas), a
//! signing service, and a human notification channel. Real backings
//! (Postgres, Redis, Vault, a notification service) are out of scope for
//! this crate; each trait ships an in-process fallback suitable for `dev_mode`
//! and for tests. Every fallback also implements `Adapter`, so
//! `SupervisionService::health_check` can fan out to whichever
//! implementation is actually wired in and aggregate the result.

pub mod counter_store;
pub mod data_store;
pub mod notifier;
pub mod signing;

pub use counter_store::{CounterStore, InMemoryCounterStore, RateLimitResult};
pub use data_store::{DataStore, InMemoryDataStore};
pub use notifier::{InMemoryNotifier, NotifierAdapter};
pub use signing::{HmacSigningAdapter, SigningAdapter};

#[cfg(feature = "test-util")]
pub use counter_store::MockCounterStore;

use crate::error::Result;
use async_trait::async_trait;

/// Common trait for the adapters above: every one of them is something the
/// core depends on without owning, and every one of them can be unavailable.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Name surfaced in `SupervisionService::health_check` output.
    fn adapter_name(&self) -> &'static str;

    /// Whether the backing collaborator is reachable and accepting work.
    async fn health_check(&self) -> Result<bool>;
}
