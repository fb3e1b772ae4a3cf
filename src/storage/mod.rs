//! Storage collaborators for nonces, sessions, users and rate limits.
//!
//! Every durable record lives behind [`ExpiringStore`] or [`UserDirectory`];
//! the auth core never keeps an in-process copy across requests.
//! Records are serialized to JSON before they reach the store.

pub mod memory;
pub mod nonce;
pub mod redis;
pub mod session;
pub mod user;

pub use memory::MemoryStore;
pub use nonce::{NonceError, NonceStore};
pub use redis::RedisStore;
pub use session::SessionStore;
pub use user::{DirectoryError, MemoryUserDirectory, RedisUserDirectory, UserDirectory};

use async_trait::async_trait;
use std::time::Duration;

/// Failure of the backing key-value store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store operation timed out")]
    Timeout,
}

impl From<::redis::RedisError> for StoreError {
    fn from(err: ::redis::RedisError) -> Self {
        StoreError::Backend(format!("Redis error: {}", err))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Expiring key-value store.
///
/// `get_and_delete` must be a single atomic step against the backend: two
/// concurrent callers racing on the same key observe the value at most once.
#[async_trait]
pub trait ExpiringStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value, evicted after `ttl`.
    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Returns true if a live value was deleted.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Fetch and remove `key` atomically.
    async fn get_and_delete(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Increment a counter, starting its expiry window on the first hit.
    ///
    /// Returns the counter value after the increment.
    async fn incr_window(&self, key: &str, window: Duration) -> Result<u64, StoreError>;
}
