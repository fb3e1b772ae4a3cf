//! Redis implementation of [`ExpiringStore`].

use super::{ExpiringStore, StoreError};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::time::Duration;

/// Lua script for atomic GET + DEL.
///
/// `GETDEL` would do the same on Redis >= 6.2; the script also runs on
/// older servers.
const GET_AND_DELETE_SCRIPT: &str = r"
local val = redis.call('GET', KEYS[1])
if val then
    redis.call('DEL', KEYS[1])
end
return val
";

/// Expiring store backed by a multiplexed Redis connection.
///
/// The connection is cheap to clone; each call works on its own clone.
#[derive(Clone)]
pub struct RedisStore {
    con: MultiplexedConnection,
}

impl RedisStore {
    pub fn new(con: MultiplexedConnection) -> Self {
        Self { con }
    }

    /// Open a client for `url` and establish the multiplexed connection.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let con = client.get_multiplexed_async_connection().await?;
        Ok(Self::new(con))
    }

    pub fn connection(&self) -> MultiplexedConnection {
        self.con.clone()
    }
}

/// Redis rejects a zero expiry, so sub-second TTLs are rounded up.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl ExpiringStore for RedisStore {
    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        let mut con = self.connection();
        con.set_ex::<_, _, ()>(key, value, ttl_secs(ttl)).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut con = self.connection();
        let value: Option<String> = con.get(key).await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut con = self.connection();
        let deleted: i64 = con.del(key).await?;
        Ok(deleted > 0)
    }

    async fn get_and_delete(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut con = self.connection();
        let script = redis::Script::new(GET_AND_DELETE_SCRIPT);
        let value: Option<String> = script.key(key).invoke_async(&mut con).await?;
        Ok(value)
    }

    async fn incr_window(&self, key: &str, window: Duration) -> Result<u64, StoreError> {
        let mut con = self.connection();
        let count: u64 = con.incr(key, 1).await?;

        // Start the window on the first request
        if count == 1 {
            con.expire::<_, ()>(key, ttl_secs(window) as i64).await?;
        }

        Ok(count)
    }
}
