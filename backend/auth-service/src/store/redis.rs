use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;

use crate::error::Result;
use crate::models::StateRecord;

use super::{OAuthStateStore, RateWindowStore};

const STATE_KEY_PREFIX: &str = "beacon:oauth:state:";
const RATE_KEY_PREFIX: &str = "beacon:rate:";

#[derive(Clone)]
pub struct RedisRateWindows {
    conn: ConnectionManager,
}

impl RedisRateWindows {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl RateWindowStore for RedisRateWindows {
    async fn hit(&self, key: &str, window_secs: u64) -> Result<(u64, u64)> {
        let key = format!("{RATE_KEY_PREFIX}{key}");
        let mut conn = self.conn.clone();

        let count: u64 = redis::cmd("INCR").arg(&key).query_async(&mut conn).await?;

        // First hit opens the window; the key then ages out on its own
        if count == 1 {
            let _: i64 = redis::cmd("EXPIRE")
                .arg(&key)
                .arg(window_secs)
                .query_async(&mut conn)
                .await?;
        }

        let ttl: i64 = redis::cmd("TTL").arg(&key).query_async(&mut conn).await?;
        let remaining = if ttl > 0 {
            ttl as u64
        } else {
            // Counter without expiry (lost EXPIRE); re-arm rather than
            // letting the key count forever
            let _: i64 = redis::cmd("EXPIRE")
                .arg(&key)
                .arg(window_secs)
                .query_async(&mut conn)
                .await?;
            window_secs
        };

        Ok((count, remaining))
    }
}

#[derive(Clone)]
pub struct RedisStateStore {
    conn: ConnectionManager,
}

impl RedisStateStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl OAuthStateStore for RedisStateStore {
    async fn put(&self, state: &str, record: &StateRecord, ttl_secs: u64) -> Result<()> {
        let key = format!("{STATE_KEY_PREFIX}{state}");
        let json = serde_json::to_string(record)
            .map_err(|e| crate::error::AuthError::Internal(e.to_string()))?;

        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(&key, json, ttl_secs).await?;

        Ok(())
    }

    async fn take(&self, state: &str) -> Result<Option<StateRecord>> {
        let key = format!("{STATE_KEY_PREFIX}{state}");
        let mut conn = self.conn.clone();

        let json: Option<String> = conn.get_del(&key).await?;
        let Some(json) = json else {
            return Ok(None);
        };

        match serde_json::from_str(&json) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                // A record we cannot read is as good as no record
                warn!("Discarding unreadable OAuth state record: {}", e);
                Ok(None)
            }
        }
    }
}
