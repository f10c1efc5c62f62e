//! Configuration Module
//!
//! Handles loading pool and storage configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::pool::{MissingKeyPolicy, MAX_KEY_LENGTH};
use crate::storage::StorageOptions;

/// Pool and storage configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Namespace the storage writes into, None = the backend default
    pub namespace: Option<String>,
    /// Default TTL in seconds for saved items, 0 = no expiration
    pub default_ttl: u64,
    /// Maximum accepted key length in bytes
    pub max_key_length: usize,
    /// Whether deleting a missing key counts as a failed delete
    pub missing_key_policy: MissingKeyPolicy,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_NAMESPACE` - Storage namespace (default: none)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds, 0 disables (default: 0)
    /// - `CACHE_MAX_KEY_LENGTH` - Maximum key length in bytes (default: 256)
    /// - `CACHE_MISSING_KEY_POLICY` - `failure` or `success` (default: failure)
    pub fn from_env() -> Self {
        Self {
            namespace: env::var("CACHE_NAMESPACE")
                .ok()
                .filter(|v| !v.is_empty()),
            default_ttl: env::var("CACHE_DEFAULT_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            max_key_length: env::var("CACHE_MAX_KEY_LENGTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(MAX_KEY_LENGTH),
            missing_key_policy: env::var("CACHE_MISSING_KEY_POLICY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
        }
    }

    /// Builds the storage options this configuration describes.
    pub fn storage_options(&self) -> StorageOptions {
        StorageOptions {
            namespace: self.namespace.clone(),
            ttl: (self.default_ttl > 0).then(|| Duration::from_secs(self.default_ttl)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: None,
            default_ttl: 0,
            max_key_length: MAX_KEY_LENGTH,
            missing_key_policy: MissingKeyPolicy::Failure,
        }
    }
}
