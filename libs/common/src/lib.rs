pub mod adapters;
pub mod canonical;
pub mod error;

pub use adapters::{
    Adapter, CounterStore, DataStore, HmacSigningAdapter, InMemoryCounterStore, InMemoryDataStore,
    InMemoryNotifier, NotifierAdapter, RateLimitResult, SigningAdapter,
};
pub use canonical::{canonicalize, chain_hash};
pub use error::{Result, SupervisionError};
