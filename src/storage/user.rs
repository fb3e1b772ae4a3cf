//! User directory: find or create a user by wallet address.
//!
//! Redis key patterns:
//! - `user:{nanoid}` - individual user data (JSON, no TTL)
//! - `wallet:{address}` - wallet lookup to user_id (STRING, no TTL)
//!
//! The wallet index is claimed with `SET NX` in the same Lua step that
//! writes the user record, so two concurrent first logins from one address
//! cannot both bind a user and a failed claim leaves nothing behind.

use crate::models::{Role, User};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The wallet address is already bound to a user.
    #[error("Wallet address already registered")]
    Conflict,

    #[error("Directory backend error: {0}")]
    Backend(String),

    #[error("Directory operation timed out")]
    Timeout,
}

impl From<redis::RedisError> for DirectoryError {
    fn from(err: redis::RedisError) -> Self {
        DirectoryError::Backend(format!("Redis error: {}", err))
    }
}

impl From<serde_json::Error> for DirectoryError {
    fn from(err: serde_json::Error) -> Self {
        DirectoryError::Backend(format!("JSON error: {}", err))
    }
}

/// Persistent user directory keyed by lower-case wallet address.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_wallet_address(&self, address: &str) -> Result<Option<User>, DirectoryError>;

    /// Create a user bound to `address`.
    ///
    /// # Errors
    /// * `DirectoryError::Conflict` - another user already holds `address`
    async fn create(
        &self,
        display_name: &str,
        address: &str,
        role: Role,
    ) -> Result<User, DirectoryError>;
}

fn new_user(display_name: &str, address: &str, role: Role) -> User {
    User {
        id: nanoid::nanoid!(12),
        username: display_name.to_string(),
        wallet_address: address.to_lowercase(),
        role,
        created_at: Utc::now(),
    }
}

// ============================================================================
// Redis
// ============================================================================

/// Claim `wallet:{address}` with `SET NX` and write `user:{id}` in one
/// server-side step. Returns 1 when created, 0 when the wallet is taken.
const CREATE_USER_SCRIPT: &str = r"
if redis.call('SET', KEYS[1], ARGV[1], 'NX') then
    redis.call('SET', KEYS[2], ARGV[2])
    return 1
end
return 0
";

/// User directory stored permanently in Redis.
#[derive(Clone)]
pub struct RedisUserDirectory {
    con: MultiplexedConnection,
}

impl RedisUserDirectory {
    pub fn new(con: MultiplexedConnection) -> Self {
        Self { con }
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, DirectoryError> {
        let mut con = self.con.clone();
        let json: Option<String> = con.get(format!("user:{}", id)).await?;
        match json {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl UserDirectory for RedisUserDirectory {
    async fn find_by_wallet_address(&self, address: &str) -> Result<Option<User>, DirectoryError> {
        let mut con = self.con.clone();
        let wallet_key = format!("wallet:{}", address.to_lowercase());
        let user_id: Option<String> = con.get(&wallet_key).await?;

        match user_id {
            Some(id) => self.get_user(&id).await,
            None => Ok(None),
        }
    }

    async fn create(
        &self,
        display_name: &str,
        address: &str,
        role: Role,
    ) -> Result<User, DirectoryError> {
        let mut con = self.con.clone();
        let user = new_user(display_name, address, role);
        let user_key = format!("user:{}", user.id);
        let wallet_key = format!("wallet:{}", user.wallet_address);
        let json = serde_json::to_string(&user)?;

        // Losing the wallet claim means another login won
        let claimed: i64 = redis::Script::new(CREATE_USER_SCRIPT)
            .key(&wallet_key)
            .key(&user_key)
            .arg(&user.id)
            .arg(json)
            .invoke_async(&mut con)
            .await?;
        if claimed == 0 {
            return Err(DirectoryError::Conflict);
        }

        Ok(user)
    }
}

// ============================================================================
// Memory
// ============================================================================

/// In-process user directory for tests and development.
#[derive(Debug, Clone, Default)]
pub struct MemoryUserDirectory {
    by_wallet: Arc<DashMap<String, User>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_wallet.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_wallet.is_empty()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_wallet_address(&self, address: &str) -> Result<Option<User>, DirectoryError> {
        Ok(self
            .by_wallet
            .get(&address.to_lowercase())
            .map(|u| u.value().clone()))
    }

    async fn create(
        &self,
        display_name: &str,
        address: &str,
        role: Role,
    ) -> Result<User, DirectoryError> {
        let user = new_user(display_name, address, role);
        match self.by_wallet.entry(user.wallet_address.clone()) {
            Entry::Occupied(_) => Err(DirectoryError::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(user.clone());
                Ok(user)
            }
        }
    }
}
