use deadpool_redis::Pool;
use deadpool_redis::redis::AsyncCommands;

use crate::domain::repository::{MethodCache, MethodCacheKey};
use crate::domain::types::{METHOD_CACHE_TTL_SECS, MfaMethod};
use crate::error::MfaServiceError;

#[derive(Clone)]
pub struct RedisMethodCache {
    pub pool: Pool,
}

fn redis_key(key: &MethodCacheKey) -> String {
    match key {
        MethodCacheKey::ById(id) => format!("mfa_method:id:{}", id),
        MethodCacheKey::ByUserAndKind(user_id, kind) => {
            format!("mfa_method:user:{}:{}", user_id, kind)
        }
        MethodCacheKey::UserMethods {
            user_id,
            active_only,
        } => {
            let scope = if *active_only { "active" } else { "all" };
            format!("mfa_methods:user:{}:{}", user_id, scope)
        }
    }
}

impl RedisMethodCache {
    async fn get_bytes(&self, key: &MethodCacheKey) -> Result<Option<Vec<u8>>, MfaServiceError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| MfaServiceError::Internal(e.into()))?;
        let value: Option<Vec<u8>> = conn
            .get(redis_key(key))
            .await
            .map_err(|e| MfaServiceError::Internal(e.into()))?;
        Ok(value)
    }

    async fn put_bytes(&self, key: &MethodCacheKey, bytes: Vec<u8>) -> Result<(), MfaServiceError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| MfaServiceError::Internal(e.into()))?;
        let (): () = conn
            .set_ex(redis_key(key), bytes, METHOD_CACHE_TTL_SECS)
            .await
            .map_err(|e: deadpool_redis::redis::RedisError| MfaServiceError::Internal(e.into()))?;
        Ok(())
    }
}

impl MethodCache for RedisMethodCache {
    async fn get_method(
        &self,
        key: &MethodCacheKey,
    ) -> Result<Option<MfaMethod>, MfaServiceError> {
        // A value that no longer deserializes (schema drift across deploys)
        // is treated as a miss.
        Ok(self
            .get_bytes(key)
            .await?
            .and_then(|bytes| serde_json::from_slice(&bytes).ok()))
    }

    async fn put_method(
        &self,
        key: &MethodCacheKey,
        method: &MfaMethod,
    ) -> Result<(), MfaServiceError> {
        let bytes = serde_json::to_vec(method).map_err(|e| MfaServiceError::Internal(e.into()))?;
        self.put_bytes(key, bytes).await
    }

    async fn get_list(
        &self,
        key: &MethodCacheKey,
    ) -> Result<Option<Vec<MfaMethod>>, MfaServiceError> {
        Ok(self
            .get_bytes(key)
            .await?
            .and_then(|bytes| serde_json::from_slice(&bytes).ok()))
    }

    async fn put_list(
        &self,
        key: &MethodCacheKey,
        methods: &[MfaMethod],
    ) -> Result<(), MfaServiceError> {
        let bytes = serde_json::to_vec(methods).map_err(|e| MfaServiceError::Internal(e.into()))?;
        self.put_bytes(key, bytes).await
    }

    async fn invalidate(&self, keys: &[MethodCacheKey]) -> Result<(), MfaServiceError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| MfaServiceError::Internal(e.into()))?;
        let redis_keys: Vec<String> = keys.iter().map(redis_key).collect();
        let (): () = conn
            .del(redis_keys)
            .await
            .map_err(|e: deadpool_redis::redis::RedisError| MfaServiceError::Internal(e.into()))?;
        Ok(())
    }
}
