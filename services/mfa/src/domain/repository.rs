#![allow(async_fn_in_trait)]

use uuid::Uuid;

use crate::domain::types::{
    ChallengePurpose, MethodKind, MethodPatch, MfaChallenge, MfaMethod, MfaSettings, MfaUser,
    OutboxEvent, SettingsPatch,
};
use crate::error::MfaServiceError;

/// Repository for the service-local user replica (account-level MFA flag).
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<MfaUser>, MfaServiceError>;

    /// Flip the account-level flag the login flow reads. `method` records
    /// which factor flipped it on; cleared when disabled.
    async fn set_mfa_enabled(
        &self,
        user_id: Uuid,
        enabled: bool,
        method: Option<&str>,
    ) -> Result<(), MfaServiceError>;
}

/// Durable store for credential records. One live row per `(user, kind)`;
/// deletion is soft and all finders skip deleted rows.
pub trait MethodRepository: Send + Sync {
    /// Insert a new record. A duplicate-key failure from the partial unique
    /// index surfaces as `DuplicateMethod` (the create race is self-healing
    /// upstream).
    async fn insert(&self, method: &MfaMethod) -> Result<(), MfaServiceError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<MfaMethod>, MfaServiceError>;

    async fn find_by_user_and_kind(
        &self,
        user_id: Uuid,
        kind: MethodKind,
    ) -> Result<Option<MfaMethod>, MfaServiceError>;

    /// Records for a user, ordered by creation time ascending.
    async fn list_by_user(
        &self,
        user_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<MfaMethod>, MfaServiceError>;

    /// Apply a patch and return the updated record. `MethodNotFound` if the
    /// row is missing or deleted.
    async fn update(&self, id: Uuid, patch: &MethodPatch)
    -> Result<MfaMethod, MfaServiceError>;

    /// Stamp `deleted_at`; the row stops matching every finder.
    async fn soft_delete(&self, id: Uuid) -> Result<(), MfaServiceError>;
}

/// Typed cache namespaces for credential records. Replaces string-key
/// conventions: the three read shapes are distinct variants, so "active
/// list" and "all list" can be invalidated explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodCacheKey {
    ById(Uuid),
    ByUserAndKind(Uuid, MethodKind),
    UserMethods { user_id: Uuid, active_only: bool },
}

impl MethodCacheKey {
    /// Every key that can go stale when one of a user's records changes.
    pub fn all_for(method: &MfaMethod) -> [MethodCacheKey; 4] {
        [
            Self::ById(method.id),
            Self::ByUserAndKind(method.user_id, method.kind),
            Self::UserMethods {
                user_id: method.user_id,
                active_only: true,
            },
            Self::UserMethods {
                user_id: method.user_id,
                active_only: false,
            },
        ]
    }
}

/// Cache for credential records (Redis, short TTL). Reads are
/// opportunistic; writes invalidate synchronously.
pub trait MethodCache: Send + Sync {
    async fn get_method(
        &self,
        key: &MethodCacheKey,
    ) -> Result<Option<MfaMethod>, MfaServiceError>;

    async fn put_method(
        &self,
        key: &MethodCacheKey,
        method: &MfaMethod,
    ) -> Result<(), MfaServiceError>;

    async fn get_list(
        &self,
        key: &MethodCacheKey,
    ) -> Result<Option<Vec<MfaMethod>>, MfaServiceError>;

    async fn put_list(
        &self,
        key: &MethodCacheKey,
        methods: &[MfaMethod],
    ) -> Result<(), MfaServiceError>;

    async fn invalidate(&self, keys: &[MethodCacheKey]) -> Result<(), MfaServiceError>;
}

/// Store for the per-user settings aggregate.
pub trait SettingsRepository: Send + Sync {
    async fn find(&self, user_id: Uuid) -> Result<Option<MfaSettings>, MfaServiceError>;

    /// Update only the patched fields of an existing row, or insert a new
    /// row carrying exactly those fields. Safe to call repeatedly with
    /// disjoint patches.
    async fn upsert(&self, user_id: Uuid, patch: &SettingsPatch)
    -> Result<(), MfaServiceError>;

    /// Atomically mark a backup code consumed: appends to the used set and
    /// touches `last_used_at` in one conditional statement, returning false
    /// when the code is unknown, already used, or the user has no settings.
    /// Two concurrent spends of the same code cannot both succeed.
    async fn consume_backup_code(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> Result<bool, MfaServiceError>;

    /// Record a successful verification of any factor.
    async fn touch_last_used(&self, user_id: Uuid) -> Result<(), MfaServiceError>;
}

/// Repository for ephemeral SMS/email codes.
pub trait ChallengeRepository: Send + Sync {
    /// Insert the challenge and its delivery outbox event atomically
    /// (same transaction); the external relay performs the send.
    async fn create_with_outbox(
        &self,
        challenge: &MfaChallenge,
        event: &OutboxEvent,
    ) -> Result<(), MfaServiceError>;

    /// Most recently created unused, unexpired code for `(user, purpose)`.
    /// Older codes are implicitly superseded.
    async fn find_valid(
        &self,
        user_id: Uuid,
        purpose: ChallengePurpose,
    ) -> Result<Option<MfaChallenge>, MfaServiceError>;

    /// Mark a code as used (sets used_at = now).
    async fn mark_used(&self, id: Uuid) -> Result<(), MfaServiceError>;
}

/// Renders an otpauth payload into a scannable image data URL.
pub trait QrRenderer: Send + Sync {
    fn render_data_url(&self, payload: &str) -> Result<String, MfaServiceError>;
}
