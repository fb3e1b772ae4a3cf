//! Single-use sign-in nonces.
//!
//! Key pattern: `nonce:{value}` holding the [`Nonce`] record as JSON, with
//! the store TTL equal to the nonce TTL.

use super::{ExpiringStore, StoreError};
use crate::auth::session::generate_nonce;
use crate::models::Nonce;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum NonceError {
    #[error("Nonce not found")]
    NotFound,

    #[error("Nonce expired")]
    Expired,

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn nonce_key(value: &str) -> String {
    format!("nonce:{}", value)
}

/// Issues nonces and consumes them at most once.
#[derive(Clone)]
pub struct NonceStore {
    store: Arc<dyn ExpiringStore>,
    ttl: Duration,
}

impl NonceStore {
    pub fn new(store: Arc<dyn ExpiringStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Generate and persist a fresh nonce.
    pub async fn issue(&self) -> Result<Nonce, StoreError> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| StoreError::Backend(format!("Nonce TTL out of range: {}", e)))?;
        let created_at = Utc::now();
        let nonce = Nonce {
            value: generate_nonce(),
            created_at,
            expires_at: created_at + ttl,
        };

        let json = serde_json::to_string(&nonce)?;
        self.store
            .set_ex(&nonce_key(&nonce.value), json, self.ttl)
            .await?;

        Ok(nonce)
    }

    /// Atomically fetch and delete a nonce.
    ///
    /// The record is removed in the same store step that reads it, so of
    /// any number of concurrent callers at most one gets `Ok`. A record
    /// that outlived its own `expires_at` is still removed and reported
    /// as expired.
    pub async fn consume(&self, value: &str) -> Result<Nonce, NonceError> {
        if value.is_empty() {
            return Err(NonceError::NotFound);
        }

        let json = self
            .store
            .get_and_delete(&nonce_key(value))
            .await?
            .ok_or(NonceError::NotFound)?;

        let nonce: Nonce = serde_json::from_str(&json).map_err(StoreError::from)?;

        if nonce.value != value {
            return Err(NonceError::NotFound);
        }
        if nonce.is_expired_at(Utc::now()) {
            return Err(NonceError::Expired);
        }

        Ok(nonce)
    }
}
