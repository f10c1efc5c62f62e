//! Pool Module
//!
//! The cache item pool contract, its item value object and the adapter that
//! implements the contract on top of a [`Storage`](crate::storage::Storage)
//! backend.

mod adapter;
mod item;


use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PoolError, Result};

// Re-export public types
pub use adapter::CacheItemPoolAdapter;
pub use item::{CacheItem, Lifetime};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Characters that may not appear in a key
pub const RESERVED_KEY_CHARACTERS: &str = "{}()/\\@:";

// == Item Contract ==
/// One cache entry as seen by pool callers.
pub trait Item: Any + Send + Sync + fmt::Debug {
    fn key(&self) -> &str;

    /// The value, or None if the item was not a hit.
    fn get(&self) -> Option<&Value>;

    /// Replaces the value to be persisted on the next save.
    fn set(&mut self, value: Value);

    /// Whether the key was found un-expired when the item was built.
    fn is_hit(&self) -> bool;

    /// Sets an absolute expiration, or clears it with None.
    fn expires_at(&mut self, expiration: Option<DateTime<Utc>>);

    /// Sets the expiration relative to now, or clears it with None.
    fn expires_after(&mut self, lifetime: Option<Lifetime>) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}

// == Pool Contract ==
/// Operations every cache item pool offers.
///
/// Key-taking operations fail with [`PoolError::InvalidArgument`] for
/// illegal keys before anything reaches the backend.
pub trait ItemPool {
    type Item: Item;

    /// Returns an item for the key; a missing key is a miss, not an error.
    fn get_item(&self, key: &str) -> Result<Self::Item>;

    /// Returns one item per distinct requested key, hit or miss.
    fn get_items<K: AsRef<str>>(&self, keys: &[K]) -> Result<HashMap<String, Self::Item>>;

    /// Existence check. The answer can be stale by the time the item is
    /// fetched; rely on [`Item::is_hit`] when that matters.
    fn has_item(&self, key: &str) -> Result<bool>;

    fn clear(&self) -> Result<bool>;

    fn delete_item(&self, key: &str) -> Result<bool>;

    fn delete_items<K: AsRef<str>>(&self, keys: &[K]) -> Result<bool>;

    fn save(&self, item: &dyn Item) -> Result<bool>;

    fn save_deferred(&self, item: &dyn Item) -> Result<bool>;

    fn commit(&self) -> Result<bool>;
}

// == Missing Key Policy ==
/// Whether deleting a key that does not exist counts as a failed delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingKeyPolicy {
    /// A missing key makes the delete report false
    #[default]
    Failure,
    /// A key that is absent after the delete counts as deleted
    Success,
}

impl FromStr for MissingKeyPolicy {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "failure" => Ok(MissingKeyPolicy::Failure),
            "success" => Ok(MissingKeyPolicy::Success),
            other => Err(PoolError::invalid_argument(format!(
                "Unknown missing key policy '{}'",
                other
            ))),
        }
    }
}

// == Key Validation ==
/// Checks that a key is legal: non-empty, within `max_length` bytes and
/// free of reserved characters.
pub fn validate_key(key: &str, max_length: usize) -> Result<()> {
    if key.is_empty() {
        return Err(PoolError::invalid_argument("Key must be a non-empty string"));
    }
    if key.len() > max_length {
        return Err(PoolError::invalid_argument(format!(
            "Key exceeds maximum length of {} bytes",
            max_length
        )));
    }
    if let Some(c) = key.chars().find(|c| RESERVED_KEY_CHARACTERS.contains(*c)) {
        return Err(PoolError::invalid_argument(format!(
            "Key '{}' contains reserved character '{}'",
            key, c
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key_accepts_plain_keys() {
        assert!(validate_key("foo", MAX_KEY_LENGTH).is_ok());
        assert!(validate_key("foo.bar_baz-1", MAX_KEY_LENGTH).is_ok());
        assert!(validate_key(&"k".repeat(MAX_KEY_LENGTH), MAX_KEY_LENGTH).is_ok());
    }

    #[test]
    fn test_validate_key_rejects_empty() {
        let err = validate_key("", MAX_KEY_LENGTH).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_validate_key_rejects_too_long() {
        let err = validate_key(&"k".repeat(MAX_KEY_LENGTH + 1), MAX_KEY_LENGTH).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_validate_key_rejects_reserved_characters() {
        for c in RESERVED_KEY_CHARACTERS.chars() {
            let key = format!("foo{}bar", c);
            let err = validate_key(&key, MAX_KEY_LENGTH).unwrap_err();
            assert!(err.is_invalid_argument(), "'{}' should be rejected", key);
        }
    }

    #[test]
    fn test_missing_key_policy_parse() {
        assert_eq!("failure".parse::<MissingKeyPolicy>().unwrap(), MissingKeyPolicy::Failure);
        assert_eq!(" Success ".parse::<MissingKeyPolicy>().unwrap(), MissingKeyPolicy::Success);
        assert!("sometimes".parse::<MissingKeyPolicy>().is_err());
    }

    #[test]
    fn test_missing_key_policy_serde() {
        let json = serde_json::to_string(&MissingKeyPolicy::Success).unwrap();
        assert_eq!(json, r#""success""#);
        let policy: MissingKeyPolicy = serde_json::from_str(r#""failure""#).unwrap();
        assert_eq!(policy, MissingKeyPolicy::Failure);
    }
}
