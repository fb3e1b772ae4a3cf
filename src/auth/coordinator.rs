//! Wallet sign-in orchestration.
//!
//! `authenticate` runs, short-circuiting on the first failure:
//! parse message → consume nonce → check domain → check message age
//! (optional) → verify signature → find or create user → issue session.
//!
//! The nonce is consumed before the signature is checked, so a rejected
//! signature still burns it and the client must request a new one.
//! Every store and directory call is bounded by `store_timeout`; a call
//! that times out counts as failed.

use super::message::{self, ParseError};
use super::verify::{self, SignatureError};
use crate::config::Config;
use crate::models::{Nonce, Role, Session, User};
use crate::storage::{
    DirectoryError, ExpiringStore, NonceError, NonceStore, SessionStore, StoreError,
    UserDirectory,
};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Tolerated clock skew for an `Issued At` in the future.
const MAX_CLOCK_SKEW: Duration = Duration::from_secs(60);

/// Why an authentication attempt failed.
///
/// The detail is for server-side logs only; see [`crate::error::AppError`]
/// for what reaches the client.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid message: {0}")]
    Parse(#[from] ParseError),

    #[error("invalid signature format: {0}")]
    Format(String),

    #[error("invalid or expired nonce")]
    Nonce,

    #[error("domain mismatch")]
    DomainMismatch,

    #[error("message issued outside the accepted window")]
    StaleMessage,

    #[error("signature verification failed")]
    SignatureMismatch,

    #[error("user resolution failed: {0}")]
    Directory(#[from] DirectoryError),

    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Parse(_) => "invalid_message",
            AuthError::Format(_) => "invalid_signature_format",
            AuthError::Nonce => "invalid_nonce",
            AuthError::DomainMismatch => "domain_mismatch",
            AuthError::StaleMessage => "stale_message",
            AuthError::SignatureMismatch => "signature_mismatch",
            AuthError::Directory(_) => "directory_error",
            AuthError::Store(_) => "store_error",
        }
    }

    /// True for backend trouble rather than a bad credential.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, AuthError::Directory(_) | AuthError::Store(_))
    }
}

impl From<NonceError> for AuthError {
    fn from(err: NonceError) -> Self {
        match err {
            NonceError::NotFound | NonceError::Expired => AuthError::Nonce,
            NonceError::Store(e) => AuthError::Store(e),
        }
    }
}

impl From<SignatureError> for AuthError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::InvalidFormat(msg) => AuthError::Format(msg),
            SignatureError::RecoveryFailed | SignatureError::Mismatch { .. } => {
                AuthError::SignatureMismatch
            }
        }
    }
}

/// Tunables for [`AuthCoordinator`].
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Expected message domain: no scheme, no trailing slash.
    pub domain: String,
    pub nonce_ttl: Duration,
    pub session_ttl: Duration,
    pub store_timeout: Duration,
    /// Reject messages whose `Issued At` is older than this. Off when `None`.
    pub max_message_age: Option<Duration>,
}

impl AuthSettings {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            nonce_ttl: Duration::from_secs(600),
            session_ttl: Duration::from_secs(86_400),
            store_timeout: Duration::from_secs(2),
            max_message_age: None,
        }
    }
}

impl From<&Config> for AuthSettings {
    fn from(config: &Config) -> Self {
        Self {
            domain: config.domain.clone(),
            nonce_ttl: Duration::from_secs(config.nonce_ttl_secs),
            session_ttl: Duration::from_secs(config.session_ttl_secs),
            store_timeout: Duration::from_millis(config.store_timeout_ms),
            max_message_age: config.max_message_age_secs.map(Duration::from_secs),
        }
    }
}

/// Result of a successful sign-in.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub session: Session,
    pub user: User,
}

/// Runs nonce issuance, sign-in, session validation and logout against
/// injected store and directory handles.
#[derive(Clone)]
pub struct AuthCoordinator {
    nonces: NonceStore,
    sessions: SessionStore,
    users: Arc<dyn UserDirectory>,
    settings: AuthSettings,
}

impl AuthCoordinator {
    pub fn new(
        store: Arc<dyn ExpiringStore>,
        users: Arc<dyn UserDirectory>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            nonces: NonceStore::new(store.clone(), settings.nonce_ttl),
            sessions: SessionStore::new(store),
            users,
            settings,
        }
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    /// Bound `fut` by the store deadline, yielding `on_timeout` if it elapses.
    async fn bounded<T, E>(
        &self,
        fut: impl Future<Output = Result<T, E>>,
        on_timeout: E,
    ) -> Result<T, E> {
        match tokio::time::timeout(self.settings.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(on_timeout),
        }
    }

    /// Issue a fresh single-use nonce.
    pub async fn issue_nonce(&self) -> Result<Nonce, AuthError> {
        let nonce = self
            .bounded(self.nonces.issue(), StoreError::Timeout)
            .await?;
        tracing::debug!(action = "nonce_issued", expires_at = %nonce.expires_at, "Nonce issued");
        Ok(nonce)
    }

    /// Verify a signed sign-in message and open a session for its signer.
    pub async fn authenticate(
        &self,
        raw_message: &[u8],
        signature: &str,
    ) -> Result<Authenticated, AuthError> {
        let parsed = message::parse(raw_message)?;

        if parsed.nonce.is_empty() {
            return Err(AuthError::Nonce);
        }
        self.bounded(
            self.nonces.consume(&parsed.nonce),
            NonceError::Store(StoreError::Timeout),
        )
        .await?;

        if parsed.domain != self.settings.domain {
            tracing::warn!(
                action = "auth_failed",
                kind = "domain_mismatch",
                domain = %parsed.domain,
                "Message domain does not match"
            );
            return Err(AuthError::DomainMismatch);
        }

        if let (Some(max_age), Some(issued_at)) = (self.settings.max_message_age, parsed.issued_at)
        {
            let age = Utc::now().signed_duration_since(issued_at);
            let too_old = age.to_std().map(|a| a > max_age).unwrap_or(false);
            let too_new = (-age).to_std().map(|a| a > MAX_CLOCK_SKEW).unwrap_or(false);
            if too_old || too_new {
                return Err(AuthError::StaleMessage);
            }
        }

        if let Err(e) = verify::verify_signature(parsed.raw(), signature, &parsed.address) {
            if let SignatureError::Mismatch { recovered, claimed } = &e {
                tracing::warn!(
                    action = "auth_failed",
                    kind = "signature_mismatch",
                    recovered = %recovered,
                    claimed = %claimed,
                    "Recovered signer does not match claimed address"
                );
            }
            return Err(e.into());
        }

        let wallet_address = parsed.address_lower();
        let user = self.resolve_user(&wallet_address).await?;

        let session = self
            .bounded(
                self.sessions
                    .create(&user.id, &wallet_address, self.settings.session_ttl),
                StoreError::Timeout,
            )
            .await?;

        tracing::info!(
            action = "auth_success",
            user_id = %user.id,
            wallet = %wallet_address,
            role = user.role.as_str(),
            "User authenticated via wallet signature"
        );

        Ok(Authenticated { session, user })
    }

    /// Find the user bound to `address`, creating one on first sign-in.
    ///
    /// A uniqueness conflict on create means a concurrent sign-in created
    /// the user first; it is re-fetched instead of failing.
    async fn resolve_user(&self, address: &str) -> Result<User, DirectoryError> {
        let found = self
            .bounded(
                self.users.find_by_wallet_address(address),
                DirectoryError::Timeout,
            )
            .await?;
        if let Some(user) = found {
            return Ok(user);
        }

        let display_name = format!("user_{}", address.get(..8).unwrap_or(address));
        let created = self
            .bounded(
                self.users.create(&display_name, address, Role::default()),
                DirectoryError::Timeout,
            )
            .await;

        match created {
            Ok(user) => {
                tracing::info!(action = "user_created", user_id = %user.id, wallet = %address, "Created user for new wallet");
                Ok(user)
            }
            Err(DirectoryError::Conflict) => self
                .bounded(
                    self.users.find_by_wallet_address(address),
                    DirectoryError::Timeout,
                )
                .await?
                .ok_or_else(|| {
                    DirectoryError::Backend("user missing after create conflict".to_string())
                }),
            Err(e) => Err(e),
        }
    }

    /// Resolve a session id; `None` means not authenticated.
    pub async fn validate_session(&self, session_id: &str) -> Result<Option<Session>, AuthError> {
        let session = self
            .bounded(self.sessions.validate(session_id), StoreError::Timeout)
            .await?;
        Ok(session)
    }

    /// Revoke a session. Succeeds whether or not it still exists.
    pub async fn logout(&self, session_id: &str) -> Result<(), AuthError> {
        self.bounded(self.sessions.revoke(session_id), StoreError::Timeout)
            .await?;
        tracing::info!(action = "logout", "Session revoked");
        Ok(())
    }
}
