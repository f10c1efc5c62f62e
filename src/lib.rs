//! Cache Pool Adapter - a cache item pool over pluggable key-value storage
//!
//! Exposes get/has/delete/clear/save over cache items and delegates each call
//! to a [`Storage`] backend, translating backend errors into [`PoolError`].

pub mod config;
pub mod error;
pub mod pool;
pub mod storage;

pub use config::Config;
pub use error::{PoolError, Result, StorageError, StorageResult};
pub use pool::{CacheItem, CacheItemPoolAdapter, Item, ItemPool, Lifetime, MissingKeyPolicy};
pub use storage::{Capabilities, MemoryStorage, Storage, StorageOptions};
