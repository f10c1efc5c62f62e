//! Pool Adapter Module
//!
//! Implements [`ItemPool`] by delegating every call to a [`Storage`] backend
//! and translating its results and errors.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use super::{validate_key, CacheItem, Item, ItemPool, MissingKeyPolicy, MAX_KEY_LENGTH};
use crate::config::Config;
use crate::error::{PoolError, Result, StorageError, StorageResult};
use crate::storage::Storage;

// == Cache Item Pool Adapter ==
/// A cache item pool backed by a [`Storage`] implementation.
///
/// The adapter holds no cached state of its own. The only lock it takes
/// serializes saves that must temporarily override the backend TTL option;
/// adapters sharing one backend do not see each other's lock.
#[derive(Debug)]
pub struct CacheItemPoolAdapter<S: Storage> {
    /// Wrapped backend
    storage: S,
    /// How deletes of absent keys are reported
    missing_key_policy: MissingKeyPolicy,
    /// Longest key accepted, in bytes
    max_key_length: usize,
    /// Held while the backend TTL option is overridden
    ttl_override: Mutex<()>,
}

impl<S: Storage> CacheItemPoolAdapter<S> {
    // == Constructor ==
    /// Wraps a backend with the default policy.
    pub fn new(storage: S) -> Self {
        Self::with_policy(storage, MissingKeyPolicy::default())
    }

    pub fn with_policy(storage: S, missing_key_policy: MissingKeyPolicy) -> Self {
        Self {
            storage,
            missing_key_policy,
            max_key_length: MAX_KEY_LENGTH,
            ttl_override: Mutex::new(()),
        }
    }

    /// Wraps a backend using the policy and key limit from configuration.
    pub fn from_config(storage: S, config: &Config) -> Self {
        let mut adapter = Self::with_policy(storage, config.missing_key_policy);
        adapter.max_key_length = config.max_key_length;
        adapter
    }

    /// The wrapped backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn missing_key_policy(&self) -> MissingKeyPolicy {
        self.missing_key_policy
    }

    fn validate_key(&self, key: &str) -> Result<()> {
        validate_key(key, self.max_key_length)
    }

    /// Validates every key and returns them in request order.
    fn validate_keys<K: AsRef<str>>(&self, keys: &[K]) -> Result<Vec<String>> {
        keys.iter()
            .map(|key| {
                let key = key.as_ref();
                self.validate_key(key)?;
                Ok(key.to_string())
            })
            .collect()
    }

    /// Logs and converts a backend error into the pool vocabulary.
    fn translate(&self, operation: &'static str, err: StorageError) -> PoolError {
        warn!(
            storage = self.storage.name(),
            operation,
            error = %err,
            "storage operation failed"
        );
        err.into()
    }

    /// Whether a key the backend did not remove is absent anyway.
    fn is_gone(&self, key: &str) -> StorageResult<bool> {
        Ok(self.missing_key_policy == MissingKeyPolicy::Success && !self.storage.has_item(key)?)
    }

    fn lock_ttl_override(&self) -> MutexGuard<'_, ()> {
        self.ttl_override
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes with a per-write TTL by swapping the backend options.
    ///
    /// The previous options are restored even when the write fails.
    fn set_with_ttl_override(&self, key: &str, value: Value, ttl: Duration) -> StorageResult<bool> {
        let _guard = self.lock_ttl_override();

        let previous = self.storage.options();
        let mut overridden = previous.clone();
        overridden.ttl = Some(ttl);
        debug!(key, ttl_ms = ttl.as_millis() as u64, "overriding storage ttl for save");

        self.storage.set_options(overridden)?;
        let saved = self.storage.set_item(key, value);
        let restored = self.storage.set_options(previous);

        let saved = saved?;
        restored?;
        Ok(saved)
    }

    fn store(&self, item: &CacheItem) -> StorageResult<bool> {
        let key = item.key();
        let value = item.pending_value();
        let per_item_ttl = self.storage.capabilities().per_item_ttl;

        let Some(expiration) = item.expiration() else {
            if per_item_ttl {
                return self.storage.set_item(key, value);
            }
            // Must not observe a ttl overridden by a concurrent save
            let _guard = self.lock_ttl_override();
            return self.storage.set_item(key, value);
        };

        let remaining = expiration - Utc::now();
        if remaining <= TimeDelta::zero() {
            debug!(key, %expiration, "expiration already passed, removing instead of saving");
            self.storage.remove_item(key)?;
            return Ok(true);
        }
        // Positive deltas always convert
        let ttl = remaining.to_std().unwrap_or_default();

        if per_item_ttl {
            self.storage.set_item_with_ttl(key, value, ttl)
        } else {
            warn!(
                storage = self.storage.name(),
                "storage lacks per-item ttl, overriding options for this save"
            );
            self.set_with_ttl_override(key, value, ttl)
        }
    }
}

impl<S: Storage> ItemPool for CacheItemPoolAdapter<S> {
    type Item = CacheItem;

    fn get_item(&self, key: &str) -> Result<CacheItem> {
        self.validate_key(key)?;

        let value = self
            .storage
            .get_item(key)
            .map_err(|e| self.translate("get_item", e))?;
        debug!(key, hit = value.is_some(), "get_item");

        Ok(match value {
            Some(value) => CacheItem::hit(key, value),
            None => CacheItem::miss(key),
        })
    }

    fn get_items<K: AsRef<str>>(&self, keys: &[K]) -> Result<HashMap<String, CacheItem>> {
        let mut keys = self.validate_keys(keys)?;
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let mut seen = HashSet::with_capacity(keys.len());
        keys.retain(|key| seen.insert(key.clone()));

        let mut found = self
            .storage
            .get_items(&keys)
            .map_err(|e| self.translate("get_items", e))?;
        debug!(requested = keys.len(), hits = found.len(), "get_items");

        Ok(keys
            .into_iter()
            .map(|key| {
                let item = match found.remove(&key) {
                    Some(value) => CacheItem::hit(key.clone(), value),
                    None => CacheItem::miss(key.clone()),
                };
                (key, item)
            })
            .collect())
    }

    fn has_item(&self, key: &str) -> Result<bool> {
        self.validate_key(key)?;

        let exists = self
            .storage
            .has_item(key)
            .map_err(|e| self.translate("has_item", e))?;
        debug!(key, exists, "has_item");
        Ok(exists)
    }

    fn clear(&self) -> Result<bool> {
        let capabilities = self.storage.capabilities();
        let namespace = self
            .storage
            .options()
            .namespace
            .filter(|namespace| !namespace.is_empty());

        let cleared = match namespace {
            Some(namespace) if capabilities.clear_by_namespace => {
                debug!(%namespace, "clearing namespace");
                self.storage
                    .clear_by_namespace(&namespace)
                    .map_err(|e| self.translate("clear_by_namespace", e))?
            }
            _ if capabilities.flush => {
                debug!("flushing storage");
                self.storage
                    .flush()
                    .map_err(|e| self.translate("flush", e))?
            }
            _ => {
                warn!(storage = self.storage.name(), "storage cannot be cleared");
                return Err(PoolError::Unsupported {
                    storage: self.storage.name().to_string(),
                });
            }
        };
        Ok(cleared)
    }

    fn delete_item(&self, key: &str) -> Result<bool> {
        self.validate_key(key)?;

        let deleted = self
            .storage
            .remove_item(key)
            .and_then(|removed| Ok(removed || self.is_gone(key)?))
            .map_err(|e| self.translate("remove_item", e))?;
        debug!(key, deleted, "delete_item");
        Ok(deleted)
    }

    fn delete_items<K: AsRef<str>>(&self, keys: &[K]) -> Result<bool> {
        let keys = self.validate_keys(keys)?;
        if keys.is_empty() {
            return Ok(true);
        }

        let failed = self
            .storage
            .remove_items(&keys)
            .and_then(|not_removed| {
                let mut failed = Vec::with_capacity(not_removed.len());
                for key in not_removed {
                    if !self.is_gone(&key)? {
                        failed.push(key);
                    }
                }
                Ok(failed)
            })
            .map_err(|e| self.translate("remove_items", e))?;
        debug!(requested = keys.len(), failed = ?failed, "delete_items");
        Ok(failed.is_empty())
    }

    fn save(&self, item: &dyn Item) -> Result<bool> {
        let item = item.as_any().downcast_ref::<CacheItem>().ok_or_else(|| {
            PoolError::invalid_argument(format!(
                "Item '{}' must be a {}",
                item.key(),
                std::any::type_name::<CacheItem>()
            ))
        })?;
        self.validate_key(item.key())?;

        let saved = self
            .store(item)
            .map_err(|e| self.translate("set_item", e))?;
        debug!(key = item.key(), saved, expiration = ?item.expiration(), "save");
        Ok(saved)
    }

    /// Saves immediately; there is no deferred queue.
    fn save_deferred(&self, item: &dyn Item) -> Result<bool> {
        self.save(item)
    }

    /// Nothing is ever deferred, so there is nothing to commit.
    fn commit(&self) -> Result<bool> {
        Ok(true)
    }
}
