//! Memory Storage Module
//!
//! In-process backend keyed by namespace and key, with lazy TTL checks.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info};

use super::entry::{current_timestamp_ms, StoredEntry};
use super::{unsupported, Capabilities, Storage, StorageOptions};
use crate::config::Config;
use crate::error::{StorageError, StorageResult};
use crate::pool::MAX_KEY_LENGTH;

type EntryKey = (String, String);

// == Memory Storage ==
/// Thread-safe in-memory storage backend.
///
/// Entries written without a namespace share the empty namespace. Expired
/// entries are dropped when read; there is no background sweep.
#[derive(Debug)]
pub struct MemoryStorage {
    /// (namespace, key) -> entry
    entries: RwLock<HashMap<EntryKey, StoredEntry>>,
    /// Options applied to every read and write
    options: RwLock<StorageOptions>,
    /// Optional features this instance advertises
    capabilities: Capabilities,
    /// Longest key accepted, in bytes
    max_key_length: usize,
}

impl MemoryStorage {
    // == Constructor ==
    /// Creates an empty storage with default options and every capability.
    pub fn new() -> Self {
        Self::with_options(StorageOptions::default())
    }

    /// Creates an empty storage with the given options.
    pub fn with_options(options: StorageOptions) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            options: RwLock::new(options),
            capabilities: Capabilities::all(),
            max_key_length: MAX_KEY_LENGTH,
        }
    }

    /// Creates an empty storage from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::with_options(config.storage_options()).with_max_key_length(config.max_key_length)
    }

    /// Restricts the capabilities this instance advertises and implements.
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_max_key_length(mut self, max_key_length: usize) -> Self {
        self.max_key_length = max_key_length;
        self
    }

    // == Length ==
    /// Returns the number of stored entries across all namespaces,
    /// including expired entries not yet read.
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<EntryKey, StoredEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<EntryKey, StoredEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn namespace(&self) -> String {
        self.options().namespace.unwrap_or_default()
    }

    fn validate_key(&self, key: &str) -> StorageResult<()> {
        if key.is_empty() {
            return Err(StorageError::invalid_argument("An empty key isn't allowed"));
        }
        if key.len() > self.max_key_length {
            return Err(StorageError::invalid_argument(format!(
                "Key exceeds maximum length of {} bytes",
                self.max_key_length
            )));
        }
        Ok(())
    }

    /// Looks up a live entry, dropping it if it has expired.
    fn lookup(
        entries: &mut HashMap<EntryKey, StoredEntry>,
        entry_key: &EntryKey,
        now_ms: u64,
    ) -> Option<Value> {
        let expired = entries.get(entry_key)?.is_expired_at(now_ms);
        if expired {
            entries.remove(entry_key);
            debug!(namespace = %entry_key.0, key = %entry_key.1, "dropped expired entry");
            return None;
        }
        entries.get(entry_key).map(|entry| entry.value.clone())
    }

    fn store(&self, key: &str, value: Value, ttl: Option<Duration>) -> StorageResult<bool> {
        self.validate_key(key)?;
        let entry_key = (self.namespace(), key.to_string());
        self.write_entries()
            .insert(entry_key, StoredEntry::new(value, ttl));
        Ok(true)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn name(&self) -> &str {
        "MemoryStorage"
    }

    fn get_item(&self, key: &str) -> StorageResult<Option<Value>> {
        self.validate_key(key)?;
        let entry_key = (self.namespace(), key.to_string());
        let mut entries = self.write_entries();
        Ok(Self::lookup(&mut entries, &entry_key, current_timestamp_ms()))
    }

    fn get_items(&self, keys: &[String]) -> StorageResult<HashMap<String, Value>> {
        for key in keys {
            self.validate_key(key)?;
        }
        let namespace = self.namespace();
        let now_ms = current_timestamp_ms();
        let mut entries = self.write_entries();

        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            let entry_key = (namespace.clone(), key.clone());
            if let Some(value) = Self::lookup(&mut entries, &entry_key, now_ms) {
                found.insert(key.clone(), value);
            }
        }
        Ok(found)
    }

    fn has_item(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get_item(key)?.is_some())
    }

    fn set_item(&self, key: &str, value: Value) -> StorageResult<bool> {
        let ttl = self.options().ttl;
        self.store(key, value, ttl)
    }

    fn set_item_with_ttl(&self, key: &str, value: Value, ttl: Duration) -> StorageResult<bool> {
        if !self.capabilities.per_item_ttl {
            return Err(unsupported(self.name(), "set_item_with_ttl()"));
        }
        self.store(key, value, Some(ttl))
    }

    fn remove_item(&self, key: &str) -> StorageResult<bool> {
        self.validate_key(key)?;
        let entry_key = (self.namespace(), key.to_string());
        let mut entries = self.write_entries();
        let live = Self::lookup(&mut entries, &entry_key, current_timestamp_ms()).is_some();
        Ok(live && entries.remove(&entry_key).is_some())
    }

    fn remove_items(&self, keys: &[String]) -> StorageResult<Vec<String>> {
        let mut not_removed = Vec::new();
        for key in keys {
            if !self.remove_item(key)? {
                not_removed.push(key.clone());
            }
        }
        Ok(not_removed)
    }

    fn options(&self) -> StorageOptions {
        self.options
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_options(&self, options: StorageOptions) -> StorageResult<()> {
        *self.options.write().unwrap_or_else(PoisonError::into_inner) = options;
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn clear_by_namespace(&self, namespace: &str) -> StorageResult<bool> {
        if !self.capabilities.clear_by_namespace {
            return Err(unsupported(self.name(), "clear_by_namespace()"));
        }
        if namespace.is_empty() {
            return Err(StorageError::invalid_argument("No namespace given"));
        }

        let mut entries = self.write_entries();
        let before = entries.len();
        entries.retain(|(entry_namespace, _), _| entry_namespace != namespace);
        info!(namespace, removed = before - entries.len(), "cleared namespace");
        Ok(true)
    }

    fn flush(&self) -> StorageResult<bool> {
        if !self.capabilities.flush {
            return Err(unsupported(self.name(), "flush()"));
        }

        let mut entries = self.write_entries();
        let removed = entries.len();
        entries.clear();
        info!(removed, "flushed storage");
        Ok(true)
    }
}
