use anyhow::Context as _;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseBackend,
    DatabaseConnection, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder, SqlErr,
    Statement, TransactionTrait,
};
use uuid::Uuid;

use bilten_mfa_schema::{mfa_challenges, mfa_methods, mfa_settings, outbox_events, users};

use crate::domain::repository::{
    ChallengeRepository, MethodRepository, SettingsRepository, UserRepository,
};
use crate::domain::types::{
    ChallengePurpose, MethodKind, MethodPatch, MfaChallenge, MfaMethod, MfaSettings, MfaUser,
    OutboxEvent, SettingsPatch,
};
use crate::error::MfaServiceError;

// ── User repository ───────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbUserRepository {
    pub db: DatabaseConnection,
}

impl UserRepository for DbUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<MfaUser>, MfaServiceError> {
        let model = users::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find user by id")?;
        Ok(model.map(|m| MfaUser {
            id: m.id,
            email: m.email,
            mfa_enabled: m.mfa_enabled,
            mfa_method: m.mfa_method,
        }))
    }

    async fn set_mfa_enabled(
        &self,
        user_id: Uuid,
        enabled: bool,
        method: Option<&str>,
    ) -> Result<(), MfaServiceError> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::MfaEnabled, Expr::value(enabled))
            .col_expr(
                users::Column::MfaMethod,
                Expr::value(method.map(str::to_owned)),
            )
            .filter(users::Column::Id.eq(user_id))
            .exec(&self.db)
            .await
            .context("set account mfa flag")?;
        if result.rows_affected == 0 {
            return Err(MfaServiceError::UserNotFound);
        }
        Ok(())
    }
}

// ── Method repository ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbMethodRepository {
    pub db: DatabaseConnection,
}

impl MethodRepository for DbMethodRepository {
    async fn insert(&self, method: &MfaMethod) -> Result<(), MfaServiceError> {
        let result = mfa_methods::ActiveModel {
            id: Set(method.id),
            user_id: Set(method.user_id),
            kind: Set(method.kind.as_str().to_owned()),
            secret: Set(method.secret.clone()),
            phone_number: Set(method.phone_number.clone()),
            is_active: Set(method.is_active),
            created_at: Set(method.created_at),
            updated_at: Set(method.updated_at),
            deleted_at: Set(None),
        }
        .insert(&self.db)
        .await;
        match result {
            Ok(_) => Ok(()),
            // Lost a create race on the partial unique index.
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Err(MfaServiceError::DuplicateMethod(method.kind))
            }
            Err(e) => Err(anyhow::Error::new(e).context("insert mfa method").into()),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<MfaMethod>, MfaServiceError> {
        let model = mfa_methods::Entity::find_by_id(id)
            .filter(mfa_methods::Column::DeletedAt.is_null())
            .one(&self.db)
            .await
            .context("find mfa method by id")?;
        model.map(method_from_model).transpose()
    }

    async fn find_by_user_and_kind(
        &self,
        user_id: Uuid,
        kind: MethodKind,
    ) -> Result<Option<MfaMethod>, MfaServiceError> {
        let model = mfa_methods::Entity::find()
            .filter(mfa_methods::Column::UserId.eq(user_id))
            .filter(mfa_methods::Column::Kind.eq(kind.as_str()))
            .filter(mfa_methods::Column::DeletedAt.is_null())
            .one(&self.db)
            .await
            .context("find mfa method by user and kind")?;
        model.map(method_from_model).transpose()
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<MfaMethod>, MfaServiceError> {
        let mut query = mfa_methods::Entity::find()
            .filter(mfa_methods::Column::UserId.eq(user_id))
            .filter(mfa_methods::Column::DeletedAt.is_null());
        if active_only {
            query = query.filter(mfa_methods::Column::IsActive.eq(true));
        }
        let models = query
            .order_by_asc(mfa_methods::Column::CreatedAt)
            .all(&self.db)
            .await
            .context("list mfa methods by user")?;
        models.into_iter().map(method_from_model).collect()
    }

    async fn update(
        &self,
        id: Uuid,
        patch: &MethodPatch,
    ) -> Result<MfaMethod, MfaServiceError> {
        let model = mfa_methods::Entity::find_by_id(id)
            .filter(mfa_methods::Column::DeletedAt.is_null())
            .one(&self.db)
            .await
            .context("load mfa method for update")?
            .ok_or(MfaServiceError::MethodNotFound)?;

        let mut active: mfa_methods::ActiveModel = model.into();
        if let Some(secret) = &patch.secret {
            active.secret = Set(secret.clone());
        }
        if let Some(phone) = &patch.phone_number {
            active.phone_number = Set(phone.clone());
        }
        if let Some(is_active) = patch.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&self.db).await.context("update mfa method")?;
        method_from_model(updated)
    }

    async fn soft_delete(&self, id: Uuid) -> Result<(), MfaServiceError> {
        let now = Utc::now();
        mfa_methods::Entity::update_many()
            .col_expr(mfa_methods::Column::DeletedAt, Expr::value(Some(now)))
            .col_expr(mfa_methods::Column::UpdatedAt, Expr::value(now))
            .filter(mfa_methods::Column::Id.eq(id))
            .filter(mfa_methods::Column::DeletedAt.is_null())
            .exec(&self.db)
            .await
            .context("soft delete mfa method")?;
        Ok(())
    }
}

fn method_from_model(model: mfa_methods::Model) -> Result<MfaMethod, MfaServiceError> {
    let kind: MethodKind = model
        .kind
        .parse()
        .map_err(|_| anyhow::anyhow!("unknown method kind in storage: {}", model.kind))?;
    Ok(MfaMethod {
        id: model.id,
        user_id: model.user_id,
        kind,
        secret: model.secret,
        phone_number: model.phone_number,
        is_active: model.is_active,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

// ── Settings repository ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbSettingsRepository {
    pub db: DatabaseConnection,
}

impl SettingsRepository for DbSettingsRepository {
    async fn find(&self, user_id: Uuid) -> Result<Option<MfaSettings>, MfaServiceError> {
        let model = mfa_settings::Entity::find_by_id(user_id)
            .one(&self.db)
            .await
            .context("find mfa settings")?;
        Ok(model.map(settings_from_model))
    }

    async fn upsert(
        &self,
        user_id: Uuid,
        patch: &SettingsPatch,
    ) -> Result<(), MfaServiceError> {
        let now = Utc::now();
        let existing = mfa_settings::Entity::find_by_id(user_id)
            .one(&self.db)
            .await
            .context("load mfa settings for upsert")?;

        match existing {
            Some(model) => {
                let mut active: mfa_settings::ActiveModel = model.into();
                apply_settings_patch(&mut active, patch);
                active.updated_at = Set(now);
                active
                    .update(&self.db)
                    .await
                    .context("update mfa settings")?;
            }
            None => {
                let mut active = mfa_settings::ActiveModel {
                    user_id: Set(user_id),
                    totp_secret: Set(None),
                    totp_enabled: Set(false),
                    sms_enabled: Set(false),
                    sms_phone: Set(None),
                    email_enabled: Set(false),
                    mfa_enforced: Set(false),
                    backup_codes: Set(Vec::new()),
                    backup_codes_used: Set(Vec::new()),
                    last_used_at: Set(None),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                apply_settings_patch(&mut active, patch);
                active
                    .insert(&self.db)
                    .await
                    .context("insert mfa settings")?;
            }
        }
        Ok(())
    }

    async fn consume_backup_code(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> Result<bool, MfaServiceError> {
        // Single conditional statement: the append happens only if the code
        // is issued and not yet consumed, so two concurrent spends of the
        // same code cannot both see rows_affected = 1.
        let now = Utc::now();
        let stmt = Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            r#"UPDATE mfa_settings
               SET backup_codes_used = array_append(backup_codes_used, $1),
                   last_used_at = $2,
                   updated_at = $2
               WHERE user_id = $3
                 AND $1 = ANY(backup_codes)
                 AND NOT ($1 = ANY(backup_codes_used))"#,
            [code.into(), now.into(), user_id.into()],
        );
        let result = self
            .db
            .execute(stmt)
            .await
            .context("consume backup code")?;
        Ok(result.rows_affected() > 0)
    }

    async fn touch_last_used(&self, user_id: Uuid) -> Result<(), MfaServiceError> {
        let now = Utc::now();
        mfa_settings::Entity::update_many()
            .col_expr(mfa_settings::Column::LastUsedAt, Expr::value(Some(now)))
            .col_expr(mfa_settings::Column::UpdatedAt, Expr::value(now))
            .filter(mfa_settings::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await
            .context("touch mfa last_used_at")?;
        Ok(())
    }
}

fn apply_settings_patch(active: &mut mfa_settings::ActiveModel, patch: &SettingsPatch) {
    if let Some(secret) = &patch.totp_secret {
        active.totp_secret = Set(secret.clone());
    }
    if let Some(enabled) = patch.totp_enabled {
        active.totp_enabled = Set(enabled);
    }
    if let Some(enabled) = patch.sms_enabled {
        active.sms_enabled = Set(enabled);
    }
    if let Some(phone) = &patch.sms_phone {
        active.sms_phone = Set(phone.clone());
    }
    if let Some(enabled) = patch.email_enabled {
        active.email_enabled = Set(enabled);
    }
    if let Some(enforced) = patch.mfa_enforced {
        active.mfa_enforced = Set(enforced);
    }
    if let Some(codes) = &patch.backup_codes {
        active.backup_codes = Set(codes.clone());
    }
    if let Some(used) = &patch.backup_codes_used {
        active.backup_codes_used = Set(used.clone());
    }
    if let Some(last_used) = patch.last_used_at {
        active.last_used_at = Set(last_used);
    }
}

fn settings_from_model(model: mfa_settings::Model) -> MfaSettings {
    MfaSettings {
        user_id: model.user_id,
        totp_secret: model.totp_secret,
        totp_enabled: model.totp_enabled,
        sms_enabled: model.sms_enabled,
        sms_phone: model.sms_phone,
        email_enabled: model.email_enabled,
        mfa_enforced: model.mfa_enforced,
        backup_codes: model.backup_codes,
        backup_codes_used: model.backup_codes_used,
        last_used_at: model.last_used_at,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

// ── Challenge repository ──────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbChallengeRepository {
    pub db: DatabaseConnection,
}

impl ChallengeRepository for DbChallengeRepository {
    async fn create_with_outbox(
        &self,
        challenge: &MfaChallenge,
        event: &OutboxEvent,
    ) -> Result<(), MfaServiceError> {
        self.db
            .transaction::<_, (), sea_orm::DbErr>(|txn| {
                let challenge = challenge.clone();
                let event = event.clone();
                Box::pin(async move {
                    insert_challenge(txn, &challenge).await?;
                    insert_outbox_event(txn, &event).await?;
                    Ok(())
                })
            })
            .await
            .context("create mfa challenge with outbox")?;
        Ok(())
    }

    async fn find_valid(
        &self,
        user_id: Uuid,
        purpose: ChallengePurpose,
    ) -> Result<Option<MfaChallenge>, MfaServiceError> {
        let now = Utc::now();
        let model = mfa_challenges::Entity::find()
            .filter(mfa_challenges::Column::UserId.eq(user_id))
            .filter(mfa_challenges::Column::Purpose.eq(purpose.as_str()))
            .filter(mfa_challenges::Column::UsedAt.is_null())
            .filter(mfa_challenges::Column::ExpiresAt.gt(now))
            .order_by_desc(mfa_challenges::Column::CreatedAt)
            .one(&self.db)
            .await
            .context("find valid mfa challenge")?;
        Ok(model.map(|m| MfaChallenge {
            id: m.id,
            user_id: m.user_id,
            code: m.code,
            purpose,
            expires_at: m.expires_at,
            used_at: m.used_at,
            created_at: m.created_at,
        }))
    }

    async fn mark_used(&self, id: Uuid) -> Result<(), MfaServiceError> {
        // update_many so an already-consumed or purged row is a no-op.
        let now = Utc::now();
        mfa_challenges::Entity::update_many()
            .col_expr(mfa_challenges::Column::UsedAt, Expr::value(Some(now)))
            .filter(mfa_challenges::Column::Id.eq(id))
            .filter(mfa_challenges::Column::UsedAt.is_null())
            .exec(&self.db)
            .await
            .context("mark mfa challenge used")?;
        Ok(())
    }
}

async fn insert_challenge(
    txn: &DatabaseTransaction,
    challenge: &MfaChallenge,
) -> Result<(), sea_orm::DbErr> {
    mfa_challenges::ActiveModel {
        id: Set(challenge.id),
        user_id: Set(challenge.user_id),
        code: Set(challenge.code.clone()),
        purpose: Set(challenge.purpose.as_str().to_owned()),
        expires_at: Set(challenge.expires_at),
        used_at: Set(None),
        created_at: Set(challenge.created_at),
    }
    .insert(txn)
    .await?;
    Ok(())
}

async fn insert_outbox_event(
    txn: &DatabaseTransaction,
    event: &OutboxEvent,
) -> Result<(), sea_orm::DbErr> {
    let now = Utc::now();
    outbox_events::ActiveModel {
        id: Set(event.id),
        kind: Set(event.kind.clone()),
        payload: Set(event.payload.clone()),
        idempotency_key: Set(event.idempotency_key.clone()),
        attempts: Set(0),
        last_error: Set(None),
        created_at: Set(now),
        next_attempt_at: Set(now),
        processed_at: Set(None),
        failed_at: Set(None),
    }
    .insert(txn)
    .await?;
    Ok(())
}
