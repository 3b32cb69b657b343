use deadpool_redis::Pool as RedisPool;
use sea_orm::DatabaseConnection;

use crate::domain::methods::MethodStore;
use crate::infra::cache::RedisMethodCache;
use crate::infra::db::{
    DbChallengeRepository, DbMethodRepository, DbSettingsRepository, DbUserRepository,
};
use crate::infra::qr::SvgQrRenderer;

/// Shared application state passed to every handler via axum `State`.
/// Usecases are assembled per-request from these accessors.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub redis: RedisPool,
}

impl AppState {
    pub fn user_repo(&self) -> DbUserRepository {
        DbUserRepository {
            db: self.db.clone(),
        }
    }

    pub fn settings_repo(&self) -> DbSettingsRepository {
        DbSettingsRepository {
            db: self.db.clone(),
        }
    }

    pub fn challenge_repo(&self) -> DbChallengeRepository {
        DbChallengeRepository {
            db: self.db.clone(),
        }
    }

    pub fn method_store(&self) -> MethodStore<DbMethodRepository, RedisMethodCache> {
        MethodStore {
            repo: DbMethodRepository {
                db: self.db.clone(),
            },
            cache: RedisMethodCache {
                pool: self.redis.clone(),
            },
        }
    }

    pub fn qr_renderer(&self) -> SvgQrRenderer {
        SvgQrRenderer
    }
}
