//! Cached credential-record store: a DB repository composed with a cache,
//! plus the validation and lifecycle rules for enrollments.

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::domain::repository::{MethodCache, MethodCacheKey, MethodRepository};
use crate::domain::types::{
    MethodKind, MethodKindStats, MethodPatch, MfaMethod, MfaStats,
};
use crate::error::MfaServiceError;

/// Input for enrolling a new second factor.
#[derive(Debug, Clone)]
pub struct NewMethod {
    pub user_id: Uuid,
    pub kind: MethodKind,
    pub secret: Option<String>,
    pub phone_number: Option<String>,
    pub is_active: bool,
}

/// Credential-record store. Reads go through the cache; every write
/// refreshes the affected single-record keys and invalidates both list
/// variants synchronously, so no reader observes a write without its
/// invalidation. Cache read failures degrade to the repository.
pub struct MethodStore<R, C>
where
    R: MethodRepository,
    C: MethodCache,
{
    pub repo: R,
    pub cache: C,
}

impl<R, C> MethodStore<R, C>
where
    R: MethodRepository,
    C: MethodCache,
{
    pub fn new(repo: R, cache: C) -> Self {
        Self { repo, cache }
    }

    /// Enroll a second factor. TOTP requires a secret, SMS a phone number;
    /// a second live record of the same kind fails with `DuplicateMethod`.
    pub async fn create(&self, new: NewMethod) -> Result<MfaMethod, MfaServiceError> {
        match new.kind {
            MethodKind::Totp if new.secret.is_none() => {
                return Err(MfaServiceError::MissingSecret);
            }
            MethodKind::Sms if new.phone_number.is_none() => {
                return Err(MfaServiceError::MissingPhoneNumber);
            }
            _ => {}
        }

        if self
            .repo
            .find_by_user_and_kind(new.user_id, new.kind)
            .await?
            .is_some()
        {
            return Err(MfaServiceError::DuplicateMethod(new.kind));
        }

        let now = Utc::now();
        let method = MfaMethod {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            kind: new.kind,
            secret: new.secret,
            phone_number: new.phone_number,
            is_active: new.is_active,
            created_at: now,
            updated_at: now,
        };
        // A concurrent create between the check above and this insert loses
        // on the partial unique index and surfaces as DuplicateMethod too.
        self.repo.insert(&method).await?;

        self.refresh_cache(&method).await?;
        Ok(method)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<MfaMethod>, MfaServiceError> {
        let key = MethodCacheKey::ById(id);
        if let Some(hit) = self.cache_get(&key).await {
            return Ok(Some(hit));
        }
        let found = self.repo.find_by_id(id).await?;
        if let Some(ref method) = found {
            self.cache_put(&key, method).await;
        }
        Ok(found)
    }

    pub async fn find_by_user_and_kind(
        &self,
        user_id: Uuid,
        kind: MethodKind,
        use_cache: bool,
    ) -> Result<Option<MfaMethod>, MfaServiceError> {
        let key = MethodCacheKey::ByUserAndKind(user_id, kind);
        if use_cache {
            if let Some(hit) = self.cache_get(&key).await {
                return Ok(Some(hit));
            }
        }
        let found = self.repo.find_by_user_and_kind(user_id, kind).await?;
        if let Some(ref method) = found {
            self.cache_put(&key, method).await;
        }
        Ok(found)
    }

    /// A user's records, creation order, optionally active only.
    pub async fn list_by_user(
        &self,
        user_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<MfaMethod>, MfaServiceError> {
        let key = MethodCacheKey::UserMethods {
            user_id,
            active_only,
        };
        match self.cache.get_list(&key).await {
            Ok(Some(hit)) => return Ok(hit),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "method cache read failed, falling back to db"),
        }
        let methods = self.repo.list_by_user(user_id, active_only).await?;
        if let Err(e) = self.cache.put_list(&key, &methods).await {
            warn!(error = %e, "method cache write failed");
        }
        Ok(methods)
    }

    /// Patch a record; refreshes its single-record cache keys and
    /// invalidates both list variants (either may be stale).
    pub async fn update(
        &self,
        id: Uuid,
        patch: &MethodPatch,
    ) -> Result<MfaMethod, MfaServiceError> {
        let updated = self.repo.update(id, patch).await?;
        self.refresh_cache(&updated).await?;
        Ok(updated)
    }

    pub async fn activate(&self, id: Uuid) -> Result<MfaMethod, MfaServiceError> {
        self.update(
            id,
            &MethodPatch {
                is_active: Some(true),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn deactivate(&self, id: Uuid) -> Result<MfaMethod, MfaServiceError> {
        self.update(
            id,
            &MethodPatch {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
    }

    /// Soft-delete a record owned by `user_id`. Active records must be
    /// deactivated first. Returns the deleted record.
    pub async fn delete(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<MfaMethod, MfaServiceError> {
        let method = self
            .repo
            .find_by_id(id)
            .await?
            .filter(|m| m.user_id == user_id)
            .ok_or(MfaServiceError::MethodNotFound)?;
        if method.is_active {
            return Err(MfaServiceError::MethodActive);
        }
        self.repo.soft_delete(id).await?;
        self.cache.invalidate(&MethodCacheKey::all_for(&method)).await?;
        Ok(method)
    }

    /// True iff the user has at least one active record of any kind.
    pub async fn has_active_mfa(&self, user_id: Uuid) -> Result<bool, MfaServiceError> {
        Ok(!self.list_by_user(user_id, true).await?.is_empty())
    }

    /// Distinct active kinds, alphabetically ordered.
    pub async fn active_kinds(&self, user_id: Uuid) -> Result<Vec<MethodKind>, MfaServiceError> {
        let mut kinds: Vec<MethodKind> = self
            .list_by_user(user_id, true)
            .await?
            .into_iter()
            .map(|m| m.kind)
            .collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds.dedup();
        Ok(kinds)
    }

    /// Aggregate over all records (active + inactive), grouped by kind.
    pub async fn stats(&self, user_id: Uuid) -> Result<MfaStats, MfaServiceError> {
        let methods = self.list_by_user(user_id, false).await?;

        let mut per_kind: Vec<MethodKindStats> = Vec::new();
        for method in &methods {
            match per_kind.iter_mut().find(|s| s.kind == method.kind) {
                Some(stats) => {
                    stats.total += 1;
                    stats.active += usize::from(method.is_active);
                    stats.first_created_at = stats.first_created_at.min(method.created_at);
                    stats.last_updated_at = stats.last_updated_at.max(method.updated_at);
                }
                None => per_kind.push(MethodKindStats {
                    kind: method.kind,
                    total: 1,
                    active: usize::from(method.is_active),
                    first_created_at: method.created_at,
                    last_updated_at: method.updated_at,
                }),
            }
        }
        per_kind.sort_by_key(|s| s.kind.as_str());

        let active_of = |kind: MethodKind| {
            per_kind
                .iter()
                .any(|s| s.kind == kind && s.active > 0)
        };
        Ok(MfaStats {
            total_methods: methods.len(),
            active_methods: methods.iter().filter(|m| m.is_active).count(),
            has_totp: active_of(MethodKind::Totp),
            has_sms: active_of(MethodKind::Sms),
            has_email: active_of(MethodKind::Email),
            methods: per_kind,
        })
    }

    async fn cache_get(&self, key: &MethodCacheKey) -> Option<MfaMethod> {
        match self.cache.get_method(key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(error = %e, "method cache read failed, falling back to db");
                None
            }
        }
    }

    async fn cache_put(&self, key: &MethodCacheKey, method: &MfaMethod) {
        if let Err(e) = self.cache.put_method(key, method).await {
            warn!(error = %e, "method cache write failed");
        }
    }

    /// Post-write cache maintenance: re-cache the record under its id and
    /// `(user, kind)` keys, drop both list variants. Invalidation failures
    /// propagate — a stale list after a write is not acceptable.
    async fn refresh_cache(&self, method: &MfaMethod) -> Result<(), MfaServiceError> {
        self.cache
            .invalidate(&[
                MethodCacheKey::UserMethods {
                    user_id: method.user_id,
                    active_only: true,
                },
                MethodCacheKey::UserMethods {
                    user_id: method.user_id,
                    active_only: false,
                },
            ])
            .await?;
        self.cache_put(&MethodCacheKey::ById(method.id), method).await;
        self.cache_put(
            &MethodCacheKey::ByUserAndKind(method.user_id, method.kind),
            method,
        )
        .await;
        Ok(())
    }
}
