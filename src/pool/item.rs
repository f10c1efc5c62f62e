//! Cache Item Module
//!
//! The value object handed out by the pool and accepted back on save.

use std::any::Any;

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;

use super::Item;
use crate::error::{PoolError, Result};

// == Lifetime ==
/// A relative expiration accepted by [`Item::expires_after`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// Whole seconds; zero or negative means already expired
    Seconds(i64),
    /// A signed chrono interval
    Delta(TimeDelta),
    /// An unsigned std interval
    Std(std::time::Duration),
}

impl Lifetime {
    /// Converts to a chrono interval, None when out of range.
    fn to_delta(self) -> Option<TimeDelta> {
        match self {
            Lifetime::Seconds(secs) => TimeDelta::try_seconds(secs),
            Lifetime::Delta(delta) => Some(delta),
            Lifetime::Std(duration) => TimeDelta::from_std(duration).ok(),
        }
    }
}

impl From<i64> for Lifetime {
    fn from(secs: i64) -> Self {
        Lifetime::Seconds(secs)
    }
}

impl From<i32> for Lifetime {
    fn from(secs: i32) -> Self {
        Lifetime::Seconds(secs.into())
    }
}

impl From<u32> for Lifetime {
    fn from(secs: u32) -> Self {
        Lifetime::Seconds(secs.into())
    }
}

impl From<TimeDelta> for Lifetime {
    fn from(delta: TimeDelta) -> Self {
        Lifetime::Delta(delta)
    }
}

impl From<std::time::Duration> for Lifetime {
    fn from(duration: std::time::Duration) -> Self {
        Lifetime::Std(duration)
    }
}

// == Cache Item ==
/// A key with its value, hit flag and optional expiration.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheItem {
    key: String,
    /// Held value; never populated from storage on a miss
    value: Option<Value>,
    hit: bool,
    expiration: Option<DateTime<Utc>>,
}

impl CacheItem {
    // == Constructor ==
    /// Creates an item. A value passed with `hit == false` is discarded.
    pub fn new(key: impl Into<String>, value: Option<Value>, hit: bool) -> Self {
        Self {
            key: key.into(),
            value: if hit { value } else { None },
            hit,
            expiration: None,
        }
    }

    /// An item found in storage.
    pub fn hit(key: impl Into<String>, value: Value) -> Self {
        Self::new(key, Some(value), true)
    }

    /// An item not found in storage.
    pub fn miss(key: impl Into<String>) -> Self {
        Self::new(key, None, false)
    }

    /// The absolute expiration, if one was set.
    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.expiration
    }

    /// The value a save would write, set or not, hit or not.
    pub(crate) fn pending_value(&self) -> Value {
        self.value.clone().unwrap_or(Value::Null)
    }
}

impl Item for CacheItem {
    fn key(&self) -> &str {
        &self.key
    }

    fn get(&self) -> Option<&Value> {
        if self.hit {
            self.value.as_ref()
        } else {
            None
        }
    }

    fn set(&mut self, value: Value) {
        self.value = Some(value);
    }

    fn is_hit(&self) -> bool {
        self.hit
    }

    fn expires_at(&mut self, expiration: Option<DateTime<Utc>>) {
        self.expiration = expiration;
    }

    fn expires_after(&mut self, lifetime: Option<Lifetime>) -> Result<()> {
        let Some(lifetime) = lifetime else {
            self.expiration = None;
            return Ok(());
        };

        let expiration = lifetime
            .to_delta()
            .and_then(|delta| Utc::now().checked_add_signed(delta))
            .ok_or_else(|| {
                PoolError::invalid_argument(format!(
                    "Lifetime {:?} cannot be represented as an expiration timestamp",
                    lifetime
                ))
            })?;
        self.expiration = Some(expiration);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_constructor_is_hit() {
        let item = CacheItem::new("key", Some(json!("value")), true);
        assert_eq!(item.key(), "key");
        assert_eq!(item.get(), Some(&json!("value")));
        assert!(item.is_hit());
    }

    #[test]
    fn test_constructor_is_not_hit() {
        let item = CacheItem::new("key", Some(json!("value")), false);
        assert_eq!(item.key(), "key");
        assert_eq!(item.get(), None);
        assert!(!item.is_hit());
        assert_eq!(item.pending_value(), Value::Null);
    }

    #[test]
    fn test_set() {
        let mut item = CacheItem::hit("key", json!("value"));
        item.set(json!("value2"));
        assert_eq!(item.get(), Some(&json!("value2")));
    }

    #[test]
    fn test_set_on_miss_is_pending_but_not_exposed() {
        let mut item = CacheItem::miss("key");
        item.set(json!("bar"));
        assert_eq!(item.get(), None);
        assert_eq!(item.pending_value(), json!("bar"));
    }

    #[test]
    fn test_expires_at_datetime() {
        let mut item = CacheItem::hit("key", json!("value"));
        let at = Utc::now();
        item.expires_at(Some(at));
        assert_eq!(item.expiration(), Some(at));
    }

    #[test]
    fn test_expires_at_none() {
        let mut item = CacheItem::hit("key", json!("value"));
        item.expires_at(Some(Utc::now()));
        item.expires_at(None);
        assert_eq!(item.expiration(), None);
    }

    #[test]
    fn test_expires_after_seconds() {
        let mut item = CacheItem::hit("key", json!("value"));
        let before = Utc::now();
        item.expires_after(Some(Lifetime::Seconds(3600))).unwrap();
        let after = Utc::now();

        let expiration = item.expiration().unwrap();
        assert!(expiration >= before + TimeDelta::seconds(3600));
        assert!(expiration <= after + TimeDelta::seconds(3600));
    }

    #[test]
    fn test_expires_after_interval() {
        let mut item = CacheItem::hit("key", json!("value"));
        item.expires_after(Some(TimeDelta::hours(1).into())).unwrap();

        let remaining = item.expiration().unwrap() - Utc::now();
        assert!(remaining <= TimeDelta::hours(1));
        assert!(remaining > TimeDelta::minutes(59));
    }

    #[test]
    fn test_expires_after_std_duration() {
        let mut item = CacheItem::hit("key", json!("value"));
        item.expires_after(Some(Duration::from_secs(90).into())).unwrap();

        let remaining = item.expiration().unwrap() - Utc::now();
        assert!(remaining <= TimeDelta::seconds(90));
        assert!(remaining > TimeDelta::seconds(85));
    }

    #[test]
    fn test_expires_after_none_clears() {
        let mut item = CacheItem::hit("key", json!("value"));
        item.expires_after(Some(Lifetime::Seconds(60))).unwrap();
        item.expires_after(None).unwrap();
        assert_eq!(item.expiration(), None);
    }

    #[test]
    fn test_expires_after_out_of_range() {
        let mut item = CacheItem::hit("key", json!("value"));

        let err = item.expires_after(Some(Lifetime::Seconds(i64::MAX))).unwrap_err();
        assert!(err.is_invalid_argument());

        let err = item
            .expires_after(Some(Duration::from_secs(u64::MAX).into()))
            .unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(item.expiration(), None, "failed call leaves expiration alone");
    }

    #[test]
    fn test_as_any_downcasts_to_cache_item() {
        let item = CacheItem::miss("key");
        let dyn_item: &dyn Item = &item;
        assert!(dyn_item.as_any().downcast_ref::<CacheItem>().is_some());
    }
}
