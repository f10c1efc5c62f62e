//! Storage Module
//!
//! The outbound contract the pool adapter delegates to, plus an in-memory
//! reference backend.

mod entry;
mod memory;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StorageError, StorageResult};

pub use memory::MemoryStorage;

// == Storage Options ==
/// Backend-wide settings that apply to every write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageOptions {
    /// Namespace reads and writes are scoped to
    pub namespace: Option<String>,
    /// TTL applied by `set_item`, None = never expires
    pub ttl: Option<Duration>,
}

// == Capabilities ==
/// Optional features a backend may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// `clear_by_namespace` is implemented
    pub clear_by_namespace: bool,
    /// `flush` is implemented
    pub flush: bool,
    /// `set_item_with_ttl` is implemented
    pub per_item_ttl: bool,
}

impl Capabilities {
    /// A backend offering none of the optional features.
    pub const fn none() -> Self {
        Self {
            clear_by_namespace: false,
            flush: false,
            per_item_ttl: false,
        }
    }

    /// A backend offering every optional feature.
    pub const fn all() -> Self {
        Self {
            clear_by_namespace: true,
            flush: true,
            per_item_ttl: true,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::none()
    }
}

// == Storage Trait ==
/// A key-value backend the pool adapter can wrap.
///
/// Methods take `&self`; backends that mutate state use interior mutability
/// so a single instance can be shared. Optional operations are advertised
/// through [`Storage::capabilities`] and fail with
/// [`StorageError::Unsupported`] by default.
pub trait Storage: Send + Sync {
    /// Implementation name, used in error messages.
    fn name(&self) -> &str;

    /// Returns the stored value, or None when the key is absent or expired.
    fn get_item(&self, key: &str) -> StorageResult<Option<Value>>;

    /// Returns the values found; absent keys are left out of the map.
    fn get_items(&self, keys: &[String]) -> StorageResult<HashMap<String, Value>>;

    fn has_item(&self, key: &str) -> StorageResult<bool>;

    /// Stores a value using the TTL from the current options.
    fn set_item(&self, key: &str, value: Value) -> StorageResult<bool>;

    /// Stores a value with its own TTL, leaving the options untouched.
    fn set_item_with_ttl(&self, _key: &str, _value: Value, _ttl: Duration) -> StorageResult<bool> {
        Err(unsupported(self.name(), "set_item_with_ttl()"))
    }

    /// Returns true if the key existed and was removed.
    fn remove_item(&self, key: &str) -> StorageResult<bool>;

    /// Returns the keys that were not removed.
    fn remove_items(&self, keys: &[String]) -> StorageResult<Vec<String>>;

    fn options(&self) -> StorageOptions;

    fn set_options(&self, options: StorageOptions) -> StorageResult<()>;

    fn capabilities(&self) -> Capabilities {
        Capabilities::none()
    }

    fn clear_by_namespace(&self, _namespace: &str) -> StorageResult<bool> {
        Err(unsupported(self.name(), "clear_by_namespace()"))
    }

    fn flush(&self) -> StorageResult<bool> {
        Err(unsupported(self.name(), "flush()"))
    }
}

fn unsupported(storage: &str, operation: &'static str) -> StorageError {
    StorageError::Unsupported {
        storage: storage.to_string(),
        operation,
    }
}

// == Shared Storage ==
/// Lets several adapters wrap one backend instance.
impl<T: Storage + ?Sized> Storage for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn get_item(&self, key: &str) -> StorageResult<Option<Value>> {
        (**self).get_item(key)
    }

    fn get_items(&self, keys: &[String]) -> StorageResult<HashMap<String, Value>> {
        (**self).get_items(keys)
    }

    fn has_item(&self, key: &str) -> StorageResult<bool> {
        (**self).has_item(key)
    }

    fn set_item(&self, key: &str, value: Value) -> StorageResult<bool> {
        (**self).set_item(key, value)
    }

    fn set_item_with_ttl(&self, key: &str, value: Value, ttl: Duration) -> StorageResult<bool> {
        (**self).set_item_with_ttl(key, value, ttl)
    }

    fn remove_item(&self, key: &str) -> StorageResult<bool> {
        (**self).remove_item(key)
    }

    fn remove_items(&self, keys: &[String]) -> StorageResult<Vec<String>> {
        (**self).remove_items(keys)
    }

    fn options(&self) -> StorageOptions {
        (**self).options()
    }

    fn set_options(&self, options: StorageOptions) -> StorageResult<()> {
        (**self).set_options(options)
    }

    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }

    fn clear_by_namespace(&self, namespace: &str) -> StorageResult<bool> {
        (**self).clear_by_namespace(namespace)
    }

    fn flush(&self) -> StorageResult<bool> {
        (**self).flush()
    }
}
