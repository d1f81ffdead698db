use crate::auth::session_registry::SessionRegistry;
use crate::config::RedisConfig;
use crate::error::app_error::AppError;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use rocket::fairing::AdHoc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Key/value store with per-key expiry backing the session registry.
#[async_trait::async_trait]
pub trait SessionCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), AppError>;
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, AppError>;
    /// Writes the hash fields and its expiry as one atomic step.
    async fn hash_set_ex(&self, key: &str, fields: &[(&str, String)], ttl_seconds: u64) -> Result<(), AppError>;
    async fn delete(&self, keys: &[String]) -> Result<(), AppError>;
    async fn ping(&self) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(config: &RedisConfig) -> Result<Self, AppError> {
        let client = redis::Client::open(config.url.as_str()).map_err(|e| AppError::cache("Invalid Redis URL", e))?;

        let timeout = Duration::from_secs(config.connection_timeout.max(1));
        let manager = match tokio::time::timeout(timeout, ConnectionManager::new(client)).await {
            Ok(manager) => manager.map_err(|e| AppError::cache("Failed to connect to Redis", e))?,
            Err(_) => return Err(AppError::RequestTimeout),
        };

        Ok(Self { manager })
    }
}

#[async_trait::async_trait]
impl SessionCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(key).await.map_err(|e| AppError::cache("Redis GET failed", e))?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let _: () = conn.set_ex(key, value, ttl_seconds).await.map_err(|e| AppError::cache("Redis SETEX failed", e))?;
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, AppError> {
        let mut conn = self.manager.clone();
        let fields: HashMap<String, String> = conn.hgetall(key).await.map_err(|e| AppError::cache("Redis HGETALL failed", e))?;
        Ok(fields)
    }

    async fn hash_set_ex(&self, key: &str, fields: &[(&str, String)], ttl_seconds: u64) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let ttl = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);
        let _: () = redis::pipe()
            .atomic()
            .hset_multiple(key, fields)
            .ignore()
            .expire(key, ttl)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::cache("Redis HSET/EXPIRE pipeline failed", e))?;
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), AppError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.manager.clone();
        let _: () = conn.del(keys).await.map_err(|e| AppError::cache("Redis DEL failed", e))?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::cache("Redis PING failed", e))?;
        Ok(())
    }
}

pub fn stage_cache(redis_config: RedisConfig, session_ttl_seconds: i64) -> AdHoc {
    AdHoc::try_on_ignite("Redis session cache", move |rocket| async move {
        match RedisCache::connect(&redis_config).await {
            Ok(cache) => {
                info!("Redis connection established");
                let cache: Arc<dyn SessionCache> = Arc::new(cache);
                Ok(rocket.manage(SessionRegistry::new(cache, session_ttl_seconds)))
            }
            Err(e) => {
                error!(error = ?e, "Failed to connect to Redis");
                Err(rocket)
            }
        }
    })
}
