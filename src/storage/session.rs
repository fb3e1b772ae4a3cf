//! Session records in the expiring store.
//!
//! Key pattern: `session:{id}` holding the [`Session`] record as JSON.
//!
//! ## Zeroizing Sensitive Data
//!
//! Session records carry the bearer token, so the JSON read back from the
//! store is wrapped in `Zeroizing` and cleared once deserialized. The store
//! keeps its own copy; this only covers the application's memory.

use super::{ExpiringStore, StoreError};
use crate::auth::session::generate_session_token;
use crate::models::Session;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use zeroize::Zeroizing;

fn session_key(id: &str) -> String {
    format!("session:{}", id)
}

/// Creates, validates and revokes sessions.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn ExpiringStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn ExpiringStore>) -> Self {
        Self { store }
    }

    /// Create and persist a session expiring `ttl` from now.
    pub async fn create(
        &self,
        user_id: &str,
        wallet_address: &str,
        ttl: Duration,
    ) -> Result<Session, StoreError> {
        let lifetime = chrono::Duration::from_std(ttl)
            .map_err(|e| StoreError::Backend(format!("Session TTL out of range: {}", e)))?;
        let created_at = Utc::now();
        let session = Session {
            id: generate_session_token(),
            user_id: user_id.to_string(),
            wallet_address: wallet_address.to_string(),
            created_at,
            expires_at: created_at + lifetime,
        };

        let json = serde_json::to_string(&session)?;
        self.store
            .set_ex(&session_key(&session.id), json, ttl)
            .await?;

        Ok(session)
    }

    /// Resolve a session id, or `None` if it is absent or expired.
    pub async fn validate(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        self.validate_at(session_id, Utc::now()).await
    }

    /// [`validate`](Self::validate) against an explicit clock.
    ///
    /// An expired record still present in the store is deleted. The
    /// record is never modified otherwise.
    pub async fn validate_at(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, StoreError> {
        if session_id.is_empty() {
            return Ok(None);
        }

        let key = session_key(session_id);
        let Some(json) = self.store.get(&key).await? else {
            return Ok(None);
        };

        let json = Zeroizing::new(json);
        let session: Session = serde_json::from_str(&json)?;

        if session.id != session_id {
            return Ok(None);
        }

        if session.is_expired_at(now) {
            self.store.delete(&key).await?;
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// Delete a session. Revoking an absent session is not an error.
    pub async fn revoke(&self, session_id: &str) -> Result<(), StoreError> {
        self.store.delete(&session_key(session_id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn session_store() -> (SessionStore, MemoryStore) {
        let backing = MemoryStore::new();
        (SessionStore::new(Arc::new(backing.clone())), backing)
    }

    #[tokio::test]
    async fn test_create_and_validate() {
        let (sessions, _) = session_store();
        let session = sessions
            .create("user-1", "0xabc", Duration::from_secs(86_400))
            .await
            .unwrap();

        assert_eq!(
            session.expires_at - session.created_at,
            chrono::Duration::hours(24)
        );

        let found = sessions.validate(&session.id).await.unwrap().unwrap();
        assert_eq!(found, session);
    }

    #[tokio::test]
    async fn test_validate_unknown() {
        let (sessions, _) = session_store();
        assert!(sessions.validate("never-issued").await.unwrap().is_none());
        assert!(sessions.validate("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_validate_does_not_extend_expiry() {
        let (sessions, _) = session_store();
        let session = sessions
            .create("user-1", "0xabc", Duration::from_secs(60))
            .await
            .unwrap();

        let first = sessions.validate(&session.id).await.unwrap().unwrap();
        let second = sessions.validate(&session.id).await.unwrap().unwrap();
        assert_eq!(first.expires_at, session.expires_at);
        assert_eq!(second.expires_at, session.expires_at);
    }

    #[tokio::test]
    async fn test_expired_record_is_deleted() {
        let (sessions, backing) = session_store();
        let session = sessions
            .create("user-1", "0xabc", Duration::from_secs(60))
            .await
            .unwrap();

        let later = session.expires_at + chrono::Duration::seconds(1);
        assert!(sessions
            .validate_at(&session.id, later)
            .await
            .unwrap()
            .is_none());
        assert!(backing.is_empty());

        // Gone for the real clock too
        assert!(sessions.validate(&session.id).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicted_by_store_ttl() {
        let (sessions, _) = session_store();
        let session = sessions
            .create("user-1", "0xabc", Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(sessions.validate(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let (sessions, _) = session_store();
        let session = sessions
            .create("user-1", "0xabc", Duration::from_secs(60))
            .await
            .unwrap();

        sessions.revoke(&session.id).await.unwrap();
        assert!(sessions.validate(&session.id).await.unwrap().is_none());
        sessions.revoke(&session.id).await.unwrap();
    }
}
